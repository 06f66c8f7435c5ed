//! Remote collaborators: permission service, gateway public paths, HSM.
//!
//! Permission and public-path lookups go through fail-closed adapters that
//! bound every call with a timeout and a retry budget and turn any remaining
//! failure into the safe fallback. [`RemoteError`] never leaves this module
//! through those adapters.

pub mod cache;
pub mod directory;
pub mod hsm;
pub mod http;
pub mod permission;
pub mod public_paths;
pub mod retry;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use cache::TtlCache;
pub use directory::DirectoryPermissionSource;
pub use hsm::HttpHsmClient;
pub use http::{HttpPermissionSource, HttpPublicPathSource};
pub use permission::{FailClosedPermissionStore, PermissionSource};
pub use public_paths::{FailClosedPublicPaths, PublicPathSource};
pub use retry::{BackoffStrategy, RetryPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Timeout(_) | RemoteError::Transport(_) => true,
            RemoteError::Status(code) => *code >= 500,
            RemoteError::Decode(_) | RemoteError::Backend(_) => false,
        }
    }

    /// Short error class for logs; never includes payloads.
    pub fn class(&self) -> &'static str {
        match self {
            RemoteError::Timeout(_) => "timeout",
            RemoteError::Transport(_) => "transport",
            RemoteError::Status(_) => "status",
            RemoteError::Decode(_) => "decode",
            RemoteError::Backend(_) => "backend",
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::Status(status.as_u16())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Run `op` with a hard per-attempt timeout and bounded retries.
pub async fn call_with_budget<T, F, Fut>(
    timeout: Duration,
    retry: &RetryPolicy,
    mut op: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut retries = 0;
    loop {
        let outcome = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout)),
        };

        match outcome {
            Err(e) if e.is_retryable() && retry.should_retry(retries) => {
                retries += 1;
                tokio::time::sleep(retry.delay_for_retry(retries)).await;
            }
            other => return other,
        }
    }
}
