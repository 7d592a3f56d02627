//! Compute environment lifecycle
//!
//! Creating or deleting a compute environment returns before the platform
//! has finished the work. This module turns those calls into synchronous
//! ones: the [`classifier`] decides which operations need waiting on and the
//! [`poller`] drives the describe endpoint until a terminal state.
//!
//! - [`classifier`] - Operation id -> create / delete / other
//! - [`status`] - Remote status values and describe payloads
//! - [`poller`] - Bounded polling state machine

pub mod classifier;
pub mod poller;
pub mod status;

pub use classifier::{
    ClassifyStrategy, OperationClass, OperationClassifier, ResourceFamily, COMPUTE_ENV_FAMILY,
};
pub use poller::{
    DescribeError, HttpStatusTransport, PollError, PollMode, PollOutcome, PollPolicy, PollState,
    PollTarget, RetryClassification, StatusPoller, StatusResponse, StatusTransport, TerminalStatus,
};
pub use status::ComputeEnvStatus;
