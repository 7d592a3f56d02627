//! Remote compute environment status and describe/create payloads.

use serde::Deserialize;
use std::fmt;

/// Status reported by the describe endpoint. Owned by the platform.
///
/// Once `Errored` or `Invalid` is observed for a create, the environment
/// cannot recover; it has to be deleted before it can be recreated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeEnvStatus {
    Pending,
    Creating,
    Available,
    Errored,
    Invalid,
    Deleting,
    /// Any other value, treated as still in progress
    Other(String),
}

impl ComputeEnvStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "PENDING" => Self::Pending,
            "CREATING" => Self::Creating,
            "AVAILABLE" => Self::Available,
            "ERRORED" => Self::Errored,
            "INVALID" => Self::Invalid,
            "DELETING" => Self::Deleting,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Creating => "CREATING",
            Self::Available => "AVAILABLE",
            Self::Errored => "ERRORED",
            Self::Invalid => "INVALID",
            Self::Deleting => "DELETING",
            Self::Other(s) => s,
        }
    }

    /// Create ended badly; no further transition without external action
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Errored | Self::Invalid)
    }
}

impl fmt::Display for ComputeEnvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{"computeEnv": {"status": ..., "deleted": ...}}`
#[derive(Debug, Deserialize)]
pub struct DescribeComputeEnvResponse {
    #[serde(rename = "computeEnv")]
    pub compute_env: ComputeEnvState,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ComputeEnvState {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

impl ComputeEnvState {
    pub fn status(&self) -> Option<ComputeEnvStatus> {
        self.status.as_deref().map(ComputeEnvStatus::parse)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted == Some(true)
    }
}

/// `{"computeEnvId": ...}` returned by a create
#[derive(Debug, Deserialize)]
pub struct CreateComputeEnvResponse {
    #[serde(rename = "computeEnvId")]
    pub compute_env_id: Option<String>,
}
