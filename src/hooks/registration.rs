//! Default hook registration.
//!
//! Hooks are registered once per client and stay valid for its lifetime.

use std::sync::Arc;

use super::{
    ComputeEnvStatusHook, ConflictExplainerHook, DegradedListHook, HookChain, PermissionRemapHook,
};
use crate::compute_env::{OperationClassifier, PollPolicy, StatusTransport};

/// The chain every platform client uses unless told otherwise
///
/// After-success order matters: responses are normalized before the status
/// poller sees them, and the poller gates everything registered after it.
pub fn default_chain(
    classifier: OperationClassifier,
    transport: Arc<dyn StatusTransport>,
    policy: PollPolicy,
) -> HookChain {
    HookChain::builder()
        // 403 on describe -> 404 so deleted resources leave managed state
        .after_success(PermissionRemapHook)
        // list-only operations degrade to an empty list on 401/403
        .after_success(DegradedListHook::default())
        // compute env create/delete block until terminal
        .after_success(ComputeEnvStatusHook::new(classifier, transport, policy))
        // 409 on create -> actionable "already exists" error
        .after_error(ConflictExplainerHook)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_env::HttpStatusTransport;
    use crate::hooks::HookKind;

    #[test]
    fn test_default_chain_order() {
        let transport = Arc::new(HttpStatusTransport::new(reqwest::Client::new()));
        let chain = default_chain(OperationClassifier::default(), transport, PollPolicy::default());

        assert!(chain.names(HookKind::BeforeRequest).is_empty());
        assert_eq!(
            chain.names(HookKind::AfterSuccess),
            vec!["permission-remap", "degraded-list", "compute-env-status"]
        );
        assert_eq!(chain.names(HookKind::AfterError), vec!["conflict-explainer"]);
    }
}
