//! Permission remap
//!
//! Hides the platform's 403-for-deleted answer on describe calls behind a 404.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{AfterSuccessHook, HookContext};
use crate::platform::{ApiError, ApiResponse};

/// Body substituted when a hidden resource is reported as missing
pub const NOT_FOUND_BODY: &str = r#"{"message":"Resource not found or has been deleted"}"#;

/// Rewrites 403 on any `Describe*` call into a 404.
///
/// When a resource is deleted out-of-band the platform answers some describe
/// calls with 403 instead of 404. Turning it into a 404 lets the caller's
/// "not found -> remove from managed state" path handle it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionRemapHook;

#[async_trait]
impl AfterSuccessHook for PermissionRemapHook {
    fn name(&self) -> &'static str {
        "permission-remap"
    }

    async fn after_success(
        &self,
        ctx: &HookContext<'_>,
        mut response: ApiResponse,
    ) -> Result<ApiResponse, ApiError> {
        if response.status != StatusCode::FORBIDDEN || !ctx.operation.is_describe() {
            return Ok(response);
        }

        tracing::debug!(
            operation = ctx.operation.operation_id,
            "Treating 403 on describe as not found"
        );
        response.replace_json_body(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::operations::{CREATE_PIPELINE, DESCRIBE_CREDENTIALS, TOKEN_LIST};
    use crate::platform::{ApiRequest, OperationDescriptor};
    use reqwest::header::HeaderMap;
    use reqwest::Method;
    use tokio_util::sync::CancellationToken;

    fn forbidden() -> ApiResponse {
        ApiResponse {
            status: StatusCode::FORBIDDEN,
            headers: HeaderMap::new(),
            body: br#"{"message":"Forbidden"}"#.to_vec(),
            request: ApiRequest {
                method: Method::GET,
                url: url::Url::parse("https://api.example.com/credentials/c1").unwrap(),
                headers: HeaderMap::new(),
                body: None,
            },
        }
    }

    async fn run(op: &OperationDescriptor, response: ApiResponse) -> ApiResponse {
        let cancel = CancellationToken::new();
        let ctx = HookContext {
            operation: op,
            base_url: "https://api.example.com",
            cancel: &cancel,
        };
        PermissionRemapHook.after_success(&ctx, response).await.unwrap()
    }

    #[tokio::test]
    async fn test_describe_403_becomes_404() {
        let out = run(&DESCRIBE_CREDENTIALS, forbidden()).await;
        assert_eq!(out.status, StatusCode::NOT_FOUND);
        assert_eq!(out.body, NOT_FOUND_BODY.as_bytes());
        assert_eq!(out.headers.get("content-type").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_non_describe_403_passes_through() {
        for op in [&TOKEN_LIST, &CREATE_PIPELINE] {
            let out = run(op, forbidden()).await;
            assert_eq!(out.status, StatusCode::FORBIDDEN);
            assert_eq!(out.body, br#"{"message":"Forbidden"}"#);
        }
    }

    #[tokio::test]
    async fn test_describe_other_status_untouched() {
        let mut ok = forbidden();
        ok.status = StatusCode::OK;
        let out = run(&DESCRIBE_CREDENTIALS, ok).await;
        assert_eq!(out.status, StatusCode::OK);
    }
}
