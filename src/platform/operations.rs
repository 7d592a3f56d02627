//! Operation Table
//!
//! Descriptors for the platform operations this layer calls or intercepts,
//! plus the parameters used to render a concrete request from them.

use reqwest::Method;
use serde_json::Value;

/// Identifies which remote call is being made or intercepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub operation_id: &'static str,
    pub method: Method,
    pub path_template: &'static str,
}

impl OperationDescriptor {
    pub const fn new(
        operation_id: &'static str,
        method: Method,
        path_template: &'static str,
    ) -> Self {
        Self {
            operation_id,
            method,
            path_template,
        }
    }

    /// Read-only describe call (`Describe*`)
    pub fn is_describe(&self) -> bool {
        self.operation_id.starts_with("Describe")
    }

    /// Create call (`Create*`)
    pub fn is_create(&self) -> bool {
        self.operation_id.starts_with("Create")
    }
}

// =============================================================================
// Compute environments
// =============================================================================

pub const CREATE_COMPUTE_ENV: OperationDescriptor =
    OperationDescriptor::new("CreateComputeEnv", Method::POST, "/compute-envs");
pub const DESCRIBE_COMPUTE_ENV: OperationDescriptor =
    OperationDescriptor::new("DescribeComputeEnv", Method::GET, "/compute-envs/{computeEnvId}");
pub const DELETE_COMPUTE_ENV: OperationDescriptor =
    OperationDescriptor::new("DeleteComputeEnv", Method::DELETE, "/compute-envs/{computeEnvId}");
pub const LIST_COMPUTE_ENVS: OperationDescriptor =
    OperationDescriptor::new("ListComputeEnvs", Method::GET, "/compute-envs");

// =============================================================================
// Credentials and tokens
// =============================================================================

pub const CREATE_CREDENTIALS: OperationDescriptor =
    OperationDescriptor::new("CreateCredentials", Method::POST, "/credentials");
pub const DESCRIBE_CREDENTIALS: OperationDescriptor =
    OperationDescriptor::new("DescribeCredentials", Method::GET, "/credentials/{credentialsId}");
pub const LIST_PIPELINE_SECRETS: OperationDescriptor =
    OperationDescriptor::new("ListPipelineSecrets", Method::GET, "/pipeline-secrets");
/// No `GET /tokens/{id}` exists, the list is the only read path
pub const TOKEN_LIST: OperationDescriptor =
    OperationDescriptor::new("TokenList", Method::GET, "/tokens");

// =============================================================================
// Organizations, workspaces, pipelines
// =============================================================================

pub const LIST_ORGANIZATIONS: OperationDescriptor =
    OperationDescriptor::new("ListOrganizations", Method::GET, "/orgs");
pub const LIST_ORGANIZATION_MEMBERS: OperationDescriptor =
    OperationDescriptor::new("ListOrganizationMembers", Method::GET, "/orgs/{orgId}/members");
pub const LIST_WORKSPACE_PARTICIPANTS: OperationDescriptor = OperationDescriptor::new(
    "ListWorkspaceParticipants",
    Method::GET,
    "/orgs/{orgId}/workspaces/{workspaceId}/participants",
);
pub const LIST_ORGANIZATION_TEAM_MEMBERS: OperationDescriptor = OperationDescriptor::new(
    "ListOrganizationTeamMembers",
    Method::GET,
    "/orgs/{orgId}/teams/{teamId}/members",
);
pub const LIST_WORKSPACES: OperationDescriptor =
    OperationDescriptor::new("ListWorkspaces", Method::GET, "/orgs/{orgId}/workspaces");
pub const CREATE_WORKSPACE: OperationDescriptor =
    OperationDescriptor::new("CreateWorkspace", Method::POST, "/orgs/{orgId}/workspaces");
pub const DESCRIBE_WORKSPACE: OperationDescriptor = OperationDescriptor::new(
    "DescribeWorkspace",
    Method::GET,
    "/orgs/{orgId}/workspaces/{workspaceId}",
);
pub const LIST_PIPELINES: OperationDescriptor =
    OperationDescriptor::new("ListPipelines", Method::GET, "/pipelines");
pub const CREATE_PIPELINE: OperationDescriptor =
    OperationDescriptor::new("CreatePipeline", Method::POST, "/pipelines");
pub const LIST_DATASET_VERSIONS: OperationDescriptor = OperationDescriptor::new(
    "ListDatasetVersionsV2",
    Method::GET,
    "/datasets/{datasetId}/versions",
);
pub const CREATE_ACTION: OperationDescriptor =
    OperationDescriptor::new("CreateAction", Method::POST, "/actions");
pub const CREATE_DATA_STUDIO: OperationDescriptor =
    OperationDescriptor::new("CreateDataStudio", Method::POST, "/studios");

/// Path parameters, query parameters and JSON body for one call
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub path: Vec<(&'static str, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, name: &'static str, value: impl ToString) -> Self {
        self.path.push((name, value.to_string()));
        self
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Render a path template, percent-encoding each substituted segment
///
/// Returns the name of the first placeholder left unfilled as the error.
pub fn render_path(template: &str, params: &[(&'static str, String)]) -> Result<String, String> {
    let mut rendered = template.to_string();
    for (name, value) in params {
        let placeholder = format!("{{{}}}", name);
        rendered = rendered.replace(&placeholder, &urlencoding::encode(value));
    }

    if let Some(start) = rendered.find('{') {
        let missing = rendered[start..]
            .split('}')
            .next()
            .unwrap_or_default()
            .trim_start_matches('{')
            .to_string();
        return Err(missing);
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_path_substitutes_and_encodes() {
        let path = render_path(
            DESCRIBE_COMPUTE_ENV.path_template,
            &[("computeEnvId", "ce 1/x".to_string())],
        )
        .unwrap();
        assert_eq!(path, "/compute-envs/ce%201%2Fx");
    }

    #[test]
    fn test_render_path_reports_missing_placeholder() {
        let params = [("orgId", "1".to_string())];
        let err = render_path(LIST_WORKSPACE_PARTICIPANTS.path_template, &params).unwrap_err();
        assert_eq!(err, "workspaceId");
    }

    #[test]
    fn test_operation_kind_predicates() {
        assert!(DESCRIBE_CREDENTIALS.is_describe());
        assert!(!TOKEN_LIST.is_describe());
        assert!(CREATE_PIPELINE.is_create());
        assert!(!DELETE_COMPUTE_ENV.is_create());
    }

    #[test]
    fn test_request_params_builder() {
        let params = RequestParams::new()
            .path("computeEnvId", "ce-1")
            .query("workspaceId", 42)
            .json(serde_json::json!({"a": 1}));
        assert_eq!(params.path, vec![("computeEnvId", "ce-1".to_string())]);
        assert_eq!(params.query, vec![("workspaceId".to_string(), "42".to_string())]);
        assert!(params.body.is_some());
    }
}
