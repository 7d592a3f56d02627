//! Conflict explainer
//!
//! Turns a 409 on a create into an error that names the clashing resource
//! and tells the user how to proceed.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{AfterErrorHook, HookContext};
use crate::platform::ApiError;

const REMEDIATION: &str = "To resolve:\n\
    \x20 - Import the existing resource instead of creating it\n\
    \x20 - Use a different name for this resource\n\
    \x20 - Delete the existing resource from the platform first";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Replaces a 409 on any `Create*` call with an actionable conflict error.
///
/// The replacement is returned instead of the generic status error so the
/// caller sees one message, not a transport-failure wrapper around it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictExplainerHook;

#[async_trait]
impl AfterErrorHook for ConflictExplainerHook {
    fn name(&self) -> &'static str {
        "conflict-explainer"
    }

    async fn after_error(&self, ctx: &HookContext<'_>, error: ApiError) -> ApiError {
        let ApiError::Status(response) = &error else {
            return error;
        };
        if response.status != StatusCode::CONFLICT || !ctx.operation.is_create() {
            return error;
        }

        let message = serde_json::from_slice::<ErrorBody>(&response.body)
            .map(|b| b.message)
            .unwrap_or_default();

        tracing::debug!(
            operation = ctx.operation.operation_id,
            "Create rejected with 409: {}",
            crate::platform::http::sanitize_for_log(&message)
        );
        explain_conflict(ctx.operation.operation_id, &message)
    }
}

/// Build the conflict error for a create operation and the platform message
pub fn explain_conflict(operation_id: &str, platform_message: &str) -> ApiError {
    let resource_type = resource_type_for(operation_id);
    let resource_name = quoted_after_first(platform_message, NAME_PHRASES);
    let workspace = quoted_after_last(platform_message, WORKSPACE_PHRASES);

    let message = match (&resource_name, &workspace) {
        (Some(name), Some(ws)) => format!(
            "{} '{}' already exists in workspace '{}'.\n\n{}",
            resource_type, name, ws, REMEDIATION
        ),
        (Some(name), None) => {
            format!("{} '{}' already exists.\n\n{}", resource_type, name, REMEDIATION)
        }
        _ => format!(
            "{} already exists. This may happen if:\n\
             \x20 - A resource with this name already exists in the workspace\n\
             \x20 - The resource was created outside this tool\n\
             \x20 - The managed state is out of sync\n\n{}",
            resource_type, REMEDIATION
        ),
    };

    ApiError::Conflict {
        resource_type,
        resource_name,
        workspace,
        message,
    }
}

fn resource_type_for(operation_id: &str) -> &'static str {
    const NAMES: &[(&str, &str)] = &[
        ("ComputeEnv", "Compute environment"),
        ("Credential", "Credential"),
        ("Pipeline", "Pipeline"),
        ("Action", "Action"),
        ("Studio", "Data studio"),
        ("Workspace", "Workspace"),
    ];

    NAMES
        .iter()
        .find(|(marker, _)| operation_id.contains(marker))
        .map(|(_, name)| *name)
        .unwrap_or("Resource")
}

/// Platform phrasings that introduce the resource name
const NAME_PHRASES: &[&str] = &["with name '", "named '"];

/// Platform phrasings that introduce the workspace; the workspace comes last
const WORKSPACE_PHRASES: &[&str] = &[
    "within the workspace '",
    "in the workspace '",
    "in workspace '",
];

/// Quoted value after the earliest occurrence of any phrase
/// e.g. `... with name 'x' ...` -> `x`
fn quoted_after_first(message: &str, phrases: &[&str]) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    let start = phrases
        .iter()
        .filter_map(|p| lower.find(*p).map(|i| i + p.len()))
        .min()?;
    quoted_value(message, start)
}

/// Quoted value after the latest occurrence of any phrase, so names that
/// contain the phrase's words are skipped
fn quoted_after_last(message: &str, phrases: &[&str]) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    let start = phrases
        .iter()
        .filter_map(|p| lower.rfind(*p).map(|i| i + p.len()))
        .max()?;
    quoted_value(message, start)
}

/// Text from `start` up to the closing quote
fn quoted_value(message: &str, start: usize) -> Option<String> {
    let value = &message[start..];
    let close = value.find('\'')?;
    let value = value[..close].trim();
    (!value.is_empty()).then(|| value.to_string())
}
