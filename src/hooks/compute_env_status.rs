//! Compute environment status gate
//!
//! Holds create and delete responses back until the status poller sees the
//! compute environment settle.

use async_trait::async_trait;
use std::sync::Arc;

use super::{AfterSuccessHook, HookContext};
use crate::compute_env::status::CreateComputeEnvResponse;
use crate::compute_env::{
    OperationClass, OperationClassifier, PollError, PollMode, PollPolicy, PollTarget,
    StatusPoller, StatusTransport,
};
use crate::platform::{ApiError, ApiResponse};

/// Blocks compute environment create/delete calls until the platform
/// reports a terminal state.
///
/// - create (200): poll until `AVAILABLE`, fail on `ERRORED`/`INVALID`
/// - delete (200/204): poll until 404 or `deleted: true`
///
/// On success the original create/delete response is returned untouched.
pub struct ComputeEnvStatusHook {
    classifier: OperationClassifier,
    poller: StatusPoller,
}

impl ComputeEnvStatusHook {
    pub fn new(
        classifier: OperationClassifier,
        transport: Arc<dyn StatusTransport>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            classifier,
            poller: StatusPoller::new(transport, policy),
        }
    }
}

#[async_trait]
impl AfterSuccessHook for ComputeEnvStatusHook {
    fn name(&self) -> &'static str {
        "compute-env-status"
    }

    async fn after_success(
        &self,
        ctx: &HookContext<'_>,
        response: ApiResponse,
    ) -> Result<ApiResponse, ApiError> {
        if !matches!(response.status.as_u16(), 200 | 204) {
            return Ok(response);
        }

        let mode = match self.classifier.classify(ctx.operation.operation_id) {
            OperationClass::Create => PollMode::Create,
            OperationClass::Delete => PollMode::Delete,
            OperationClass::Other => return Ok(response),
        };

        let fail = |source: PollError| ApiError::ComputeEnv {
            operation: ctx.operation.operation_id,
            source,
        };

        let target = poll_target(&response, ctx.base_url, mode).map_err(fail)?;
        self.poller.poll(&target, ctx.cancel).await.map_err(fail)?;

        Ok(response)
    }
}

/// Recover what to poll from the triggering request/response
///
/// Create: id from the `computeEnvId` response field. Delete: id from the
/// path segment after `compute-envs`. Both: workspace from the `workspaceId`
/// query parameter and the credential from the request's Authorization.
fn poll_target(
    response: &ApiResponse,
    base_url: &str,
    mode: PollMode,
) -> Result<PollTarget, PollError> {
    let request = &response.request;

    let resource_id = match mode {
        PollMode::Delete => request
            .path_segment_after("compute-envs")
            .ok_or_else(|| {
                PollError::InvalidTarget(format!("no computeEnvId in path {}", request.url.path()))
            })?,
        PollMode::Create => {
            let created: CreateComputeEnvResponse = response
                .json()
                .map_err(|e| PollError::MalformedResponse(format!("create response: {}", e)))?;
            created
                .compute_env_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    PollError::MalformedResponse(
                        "computeEnvId not found in create response".to_string(),
                    )
                })?
        }
    };

    let workspace_id = request
        .query_param("workspaceId")
        .ok_or_else(|| {
            PollError::InvalidTarget("workspaceId not found in query parameters".to_string())
        })?;

    let auth_header = request.authorization().unwrap_or_default().to_string();

    Ok(PollTarget {
        resource_id,
        workspace_id,
        base_url: base_url.to_string(),
        auth_header,
        mode,
    })
}
