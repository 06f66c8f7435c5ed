use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use keystone_auth::PublicPathRegistry;

use super::{call_with_budget, RemoteError, RetryPolicy};
use crate::config::RemoteConfig;

#[async_trait]
pub trait PublicPathSource: Send + Sync {
    async fn public_patterns(&self) -> Result<Vec<String>, RemoteError>;
}

#[async_trait]
impl<S> PublicPathSource for Arc<S>
where
    S: PublicPathSource + ?Sized,
{
    async fn public_patterns(&self) -> Result<Vec<String>, RemoteError> {
        (**self).public_patterns().await
    }
}

/// [`PublicPathRegistry`] that answers empty when the gateway is unreachable,
/// so every request goes through full authorization. Never cached.
pub struct FailClosedPublicPaths<S> {
    source: S,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<S> FailClosedPublicPaths<S>
where
    S: PublicPathSource,
{
    pub fn new(source: S, config: &RemoteConfig) -> Self {
        Self {
            source,
            timeout: config.timeout,
            retry: config.retry_policy(),
        }
    }
}

#[async_trait]
impl<S> PublicPathRegistry for FailClosedPublicPaths<S>
where
    S: PublicPathSource,
{
    async fn public_patterns(&self) -> Vec<String> {
        let source = &self.source;
        match call_with_budget(self.timeout, &self.retry, move || source.public_patterns()).await {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!(adapter = "gateway.public_paths", error = e.class(), "public path lookup failed; treating nothing as public");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gateway(Result<Vec<String>, RemoteError>);

    #[async_trait]
    impl PublicPathSource for Gateway {
        async fn public_patterns(&self) -> Result<Vec<String>, RemoteError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn unreachable_gateway_publishes_nothing() {
        let cfg = RemoteConfig {
            retries: 0,
            ..RemoteConfig::default()
        };
        let up = FailClosedPublicPaths::new(Gateway(Ok(vec!["/health".into()])), &cfg);
        assert_eq!(up.public_patterns().await, vec!["/health".to_string()]);

        let down = FailClosedPublicPaths::new(
            Gateway(Err(RemoteError::Transport("refused".into()))),
            &cfg,
        );
        assert!(down.public_patterns().await.is_empty());
    }
}
