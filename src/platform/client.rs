//! Platform Client
//!
//! Main client for calling the platform API. Every call is rendered from an
//! [`OperationDescriptor`], sent through the shared HTTP transport and
//! wrapped by the client's [`HookChain`].

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::auth::Credentials;
use super::error::ApiError;
use super::http::{sanitize_for_log, ApiRequest, ApiResponse, PlatformHttpClient};
use super::operations::{self, render_path, OperationDescriptor, RequestParams};
use crate::compute_env::{HttpStatusTransport, OperationClassifier, PollPolicy};
use crate::hooks::{default_chain, HookChain, HookContext};

/// Main platform client
#[derive(Clone)]
pub struct PlatformClient {
    pub http: PlatformHttpClient,
    credentials: Credentials,
    base_url: String,
    hooks: Arc<HookChain>,
    cancel: CancellationToken,
}

impl PlatformClient {
    /// Create a client with the default hook chain
    pub fn new(base_url: &str, credentials: Credentials, policy: PollPolicy) -> Result<Self> {
        Self::with_classifier(base_url, credentials, policy, OperationClassifier::default())
    }

    pub fn with_classifier(
        base_url: &str,
        credentials: Credentials,
        policy: PollPolicy,
        classifier: OperationClassifier,
    ) -> Result<Self> {
        let http = PlatformHttpClient::new()?;
        // Describes share the client's connection pool
        let transport = Arc::new(HttpStatusTransport::new(http.inner().clone()));
        let hooks = default_chain(classifier, transport, policy);
        Self::with_hooks(base_url, credentials, http, hooks)
    }

    /// Create a client with an explicit hook chain
    pub fn with_hooks(
        base_url: &str,
        credentials: Credentials,
        http: PlatformHttpClient,
        hooks: HookChain,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;

        Ok(Self {
            http,
            credentials,
            base_url,
            hooks: Arc::new(hooks),
            cancel: CancellationToken::new(),
        })
    }

    /// Share an external cancellation token (e.g. process shutdown)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Render the concrete request for an operation
    pub fn build_request(
        &self,
        operation: &OperationDescriptor,
        params: &RequestParams,
    ) -> Result<ApiRequest, ApiError> {
        let invalid = |message: String| ApiError::InvalidRequest {
            operation: operation.operation_id,
            message,
        };

        let path = render_path(operation.path_template, &params.path)
            .map_err(|missing| invalid(format!("missing path parameter {}", missing)))?;

        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| invalid(e.to_string()))?;
        if !params.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&self.credentials.authorization_header())
            .map_err(|_| invalid("access token contains invalid header characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let body = match &params.body {
            Some(value) => Some(serde_json::to_vec(value).map_err(|e| invalid(e.to_string()))?),
            None => None,
        };

        Ok(ApiRequest {
            method: operation.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Run one operation through the hook chain
    pub async fn execute(
        &self,
        operation: &OperationDescriptor,
        params: RequestParams,
    ) -> Result<ApiResponse, ApiError> {
        let ctx = HookContext {
            operation,
            base_url: &self.base_url,
            cancel: &self.cancel,
        };

        let request = self.build_request(operation, &params)?;
        let request = self.hooks.run_before_request(&ctx, request).await?;

        let response = match self.http.send(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.hooks.run_after_error(&ctx, e).await),
        };

        let response = self.hooks.run_after_success(&ctx, response).await?;

        if response.is_error() {
            if response.status.as_u16() == 404 {
                tracing::debug!("{} returned 404", operation.operation_id);
            } else {
                // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
                tracing::error!(
                    "API error: {} {} - {}",
                    operation.operation_id,
                    response.status,
                    sanitize_for_log(&response.text())
                );
            }
            let error = ApiError::Status(Box::new(response));
            return Err(self.hooks.run_after_error(&ctx, error).await);
        }

        Ok(response)
    }

    /// Execute and decode the JSON body
    pub async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &OperationDescriptor,
        params: RequestParams,
    ) -> Result<T, ApiError> {
        let response = self.execute(operation, params).await?;
        response.json().map_err(|source| ApiError::Decode {
            operation: operation.operation_id,
            source,
        })
    }

    // =========================================================================
    // Compute environments
    // =========================================================================

    /// Create a compute environment; returns once it is AVAILABLE
    pub async fn create_compute_env(
        &self,
        workspace_id: &str,
        body: &Value,
    ) -> Result<ApiResponse, ApiError> {
        let params = RequestParams::new()
            .query("workspaceId", workspace_id)
            .json(body.clone());
        self.execute(&operations::CREATE_COMPUTE_ENV, params).await
    }

    pub async fn describe_compute_env(
        &self,
        compute_env_id: &str,
        workspace_id: &str,
    ) -> Result<Value, ApiError> {
        let params = RequestParams::new()
            .path("computeEnvId", compute_env_id)
            .query("workspaceId", workspace_id);
        self.execute_json(&operations::DESCRIBE_COMPUTE_ENV, params).await
    }

    /// Delete a compute environment; returns once it is gone
    pub async fn delete_compute_env(
        &self,
        compute_env_id: &str,
        workspace_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        let params = RequestParams::new()
            .path("computeEnvId", compute_env_id)
            .query("workspaceId", workspace_id);
        self.execute(&operations::DELETE_COMPUTE_ENV, params).await
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// All access tokens; empty when the caller may not list them
    pub async fn list_tokens(&self) -> Result<Value, ApiError> {
        self.execute_json(&operations::TOKEN_LIST, RequestParams::new()).await
    }
}
