//! Platform Authentication
//!
//! Resolves the bearer token used for every API call. Tokens come from the
//! environment (or an explicit value) and are never written to disk.

use anyhow::{Context, Result};
use std::fmt;

/// Primary environment variable holding the access token
pub const TOKEN_ENV: &str = "SEQERA_ACCESS_TOKEN";

/// Legacy environment variable, still honoured by older deployments
pub const LEGACY_TOKEN_ENV: &str = "TOWER_ACCESS_TOKEN";

/// Bearer credential captured once and reused for the client lifetime
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    /// Wrap an explicit access token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the access token from the environment
    pub fn from_env() -> Result<Self> {
        let token = read_token_env(TOKEN_ENV)
            .or_else(|| read_token_env(LEGACY_TOKEN_ENV))
            .with_context(|| {
                format!("No access token configured. Set {TOKEN_ENV} (or {LEGACY_TOKEN_ENV})")
            })?;

        tracing::debug!("Access token loaded from environment");
        Ok(Self::new(token))
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

// Security: the token never shows up in Debug output or logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"(sensitive)")
            .finish()
    }
}

fn read_token_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
