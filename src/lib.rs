//! seqsync
//!
//! Reconciliation layer over the asynchronous Seqera Platform API. Calls go
//! through a hook chain that normalizes responses and turns compute
//! environment create/delete into calls that return only once the platform
//! has finished the work.
//!
//! - [`platform`] - Transport, operation table and the hook-running client
//! - [`hooks`] - Interceptor chain and the built-in hooks
//! - [`compute_env`] - Operation classifier and status poller
//! - [`search`] - Offset-paginated search
//! - [`lookup`] - Member, participant and pipeline lookups
//! - [`config`] - Persistent configuration

pub mod compute_env;
pub mod config;
pub mod hooks;
pub mod lookup;
pub mod platform;
pub mod search;

/// Version injected at compile time via SEQSYNC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SEQSYNC_VERSION") {
    Some(v) => v,
    None => "dev",
};
