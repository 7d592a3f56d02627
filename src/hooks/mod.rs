//! Interceptor chain
//!
//! Hooks run around every API call made by [`PlatformClient`]. There are
//! exactly three kinds, each a handler from (context, request/response/error)
//! to the same shape:
//!
//! - **before-request**: may rewrite the outbound request or refuse it
//! - **after-success**: sees every response the transport received, may
//!   rewrite it or turn it into an error
//! - **after-error**: sees transport errors and error statuses, may replace
//!   the error
//!
//! A [`HookChain`] is assembled once with [`HookChainBuilder`] and is
//! immutable afterwards. Within a kind, hooks run in registration order and
//! each one receives the previous hook's output.
//!
//! [`PlatformClient`]: crate::platform::PlatformClient

mod compute_env_status;
mod conflict;
mod degraded_list;
mod permission;
mod registration;

pub use compute_env_status::ComputeEnvStatusHook;
pub use conflict::{explain_conflict, ConflictExplainerHook};
pub use degraded_list::{DegradedList, DegradedListHook};
pub use permission::{PermissionRemapHook, NOT_FOUND_BODY};
pub use registration::default_chain;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::platform::{ApiError, ApiRequest, ApiResponse, OperationDescriptor};

/// Everything a hook may inspect about the call in flight
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub operation: &'a OperationDescriptor,
    pub base_url: &'a str,
    /// Fires on external cancellation (e.g. process shutdown)
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait BeforeRequestHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn before_request(
        &self,
        ctx: &HookContext<'_>,
        request: ApiRequest,
    ) -> Result<ApiRequest, ApiError>;
}

#[async_trait]
pub trait AfterSuccessHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_success(
        &self,
        ctx: &HookContext<'_>,
        response: ApiResponse,
    ) -> Result<ApiResponse, ApiError>;
}

#[async_trait]
pub trait AfterErrorHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_error(&self, ctx: &HookContext<'_>, error: ApiError) -> ApiError;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeRequest,
    AfterSuccess,
    AfterError,
}

/// One interceptor registration
#[derive(Clone)]
pub enum Hook {
    BeforeRequest(Arc<dyn BeforeRequestHook>),
    AfterSuccess(Arc<dyn AfterSuccessHook>),
    AfterError(Arc<dyn AfterErrorHook>),
}

impl Hook {
    pub fn kind(&self) -> HookKind {
        match self {
            Self::BeforeRequest(_) => HookKind::BeforeRequest,
            Self::AfterSuccess(_) => HookKind::AfterSuccess,
            Self::AfterError(_) => HookKind::AfterError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeRequest(h) => h.name(),
            Self::AfterSuccess(h) => h.name(),
            Self::AfterError(h) => h.name(),
        }
    }
}

/// Ordered, immutable set of hooks for one client
#[derive(Clone, Default)]
pub struct HookChain {
    before_request: Vec<Arc<dyn BeforeRequestHook>>,
    after_success: Vec<Arc<dyn AfterSuccessHook>>,
    after_error: Vec<Arc<dyn AfterErrorHook>>,
}

impl HookChain {
    pub fn builder() -> HookChainBuilder {
        HookChainBuilder::default()
    }

    /// A chain that passes everything through untouched
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registered hook names of one kind, in invocation order
    pub fn names(&self, kind: HookKind) -> Vec<&'static str> {
        match kind {
            HookKind::BeforeRequest => self.before_request.iter().map(|h| h.name()).collect(),
            HookKind::AfterSuccess => self.after_success.iter().map(|h| h.name()).collect(),
            HookKind::AfterError => self.after_error.iter().map(|h| h.name()).collect(),
        }
    }

    pub async fn run_before_request(
        &self,
        ctx: &HookContext<'_>,
        mut request: ApiRequest,
    ) -> Result<ApiRequest, ApiError> {
        for hook in &self.before_request {
            tracing::trace!(
                hook = hook.name(),
                operation = ctx.operation.operation_id,
                "before-request hook"
            );
            request = hook.before_request(ctx, request).await?;
        }
        Ok(request)
    }

    pub async fn run_after_success(
        &self,
        ctx: &HookContext<'_>,
        mut response: ApiResponse,
    ) -> Result<ApiResponse, ApiError> {
        for hook in &self.after_success {
            tracing::trace!(
                hook = hook.name(),
                operation = ctx.operation.operation_id,
                "after-success hook"
            );
            response = hook.after_success(ctx, response).await?;
        }
        Ok(response)
    }

    pub async fn run_after_error(&self, ctx: &HookContext<'_>, mut error: ApiError) -> ApiError {
        for hook in &self.after_error {
            tracing::trace!(
                hook = hook.name(),
                operation = ctx.operation.operation_id,
                "after-error hook"
            );
            error = hook.after_error(ctx, error).await;
        }
        error
    }
}

/// Collects registrations; [`build`](Self::build) freezes them
#[derive(Default)]
pub struct HookChainBuilder {
    hooks: Vec<Hook>,
}

impl HookChainBuilder {
    pub fn register(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn before_request(self, hook: impl BeforeRequestHook + 'static) -> Self {
        self.register(Hook::BeforeRequest(Arc::new(hook)))
    }

    pub fn after_success(self, hook: impl AfterSuccessHook + 'static) -> Self {
        self.register(Hook::AfterSuccess(Arc::new(hook)))
    }

    pub fn after_error(self, hook: impl AfterErrorHook + 'static) -> Self {
        self.register(Hook::AfterError(Arc::new(hook)))
    }

    pub fn build(self) -> HookChain {
        let mut chain = HookChain::default();
        for hook in self.hooks {
            match hook {
                Hook::BeforeRequest(h) => chain.before_request.push(h),
                Hook::AfterSuccess(h) => chain.after_success.push(h),
                Hook::AfterError(h) => chain.after_error.push(h),
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::operations::DESCRIBE_COMPUTE_ENV;
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl AfterSuccessHook for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn after_success(
            &self,
            _ctx: &HookContext<'_>,
            mut response: ApiResponse,
        ) -> Result<ApiResponse, ApiError> {
            self.log.lock().unwrap().push(self.name);
            response.body.extend_from_slice(self.name.as_bytes());
            Ok(response)
        }
    }

    struct Header(&'static str);

    #[async_trait]
    impl BeforeRequestHook for Header {
        fn name(&self) -> &'static str {
            "header"
        }

        async fn before_request(
            &self,
            _ctx: &HookContext<'_>,
            mut request: ApiRequest,
        ) -> Result<ApiRequest, ApiError> {
            request.headers.insert("x-trace", self.0.parse().unwrap());
            Ok(request)
        }
    }

    fn response() -> ApiResponse {
        ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            request: ApiRequest {
                method: Method::GET,
                url: url::Url::parse("https://api.example.com/compute-envs/ce-1").unwrap(),
                headers: HeaderMap::new(),
                body: None,
            },
        }
    }

    #[tokio::test]
    async fn test_after_success_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HookChain::builder()
            .after_success(Recorder { name: "a", log: log.clone() })
            .before_request(Header("t"))
            .after_success(Recorder { name: "b", log: log.clone() })
            .after_success(Recorder { name: "c", log: log.clone() })
            .build();

        assert_eq!(chain.names(HookKind::AfterSuccess), vec!["a", "b", "c"]);
        assert_eq!(chain.names(HookKind::BeforeRequest), vec!["header"]);
        assert!(chain.names(HookKind::AfterError).is_empty());

        let cancel = CancellationToken::new();
        let ctx = HookContext {
            operation: &DESCRIBE_COMPUTE_ENV,
            base_url: "https://api.example.com",
            cancel: &cancel,
        };
        let out = chain.run_after_success(&ctx, response()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(out.body, b"abc");
    }

    #[tokio::test]
    async fn test_empty_chain_passes_through() {
        let chain = HookChain::empty();
        let cancel = CancellationToken::new();
        let ctx = HookContext {
            operation: &DESCRIBE_COMPUTE_ENV,
            base_url: "https://api.example.com",
            cancel: &cancel,
        };
        let original = response();
        let req = chain.run_before_request(&ctx, original.request.clone()).await.unwrap();
        assert!(req.headers.is_empty());
        let out = chain.run_after_success(&ctx, original.clone()).await.unwrap();
        assert_eq!(out.body, original.body);
        assert_eq!(out.status, original.status);
    }

    #[tokio::test]
    async fn test_before_request_hook_mutates_request() {
        let chain = HookChain::builder().before_request(Header("abc")).build();
        let cancel = CancellationToken::new();
        let ctx = HookContext {
            operation: &DESCRIBE_COMPUTE_ENV,
            base_url: "https://api.example.com",
            cancel: &cancel,
        };
        let req = chain.run_before_request(&ctx, response().request).await.unwrap();
        assert_eq!(req.headers.get("x-trace").unwrap(), "abc");
    }
}
