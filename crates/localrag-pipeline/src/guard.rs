//! Timeout and bounded retry around model calls.
//!
//! The timeout covers the whole call including any retry, so a caller waits
//! at most `CallPolicy::timeout`. Only errors whose `is_transient()` is true
//! are retried, up to `max_attempts` attempts in total.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use localrag_core::config::{PolicySettings, MAX_ATTEMPTS};
use localrag_core::error::{Error, Result};
use localrag_core::traits::{Embedder, Generator};
use localrag_core::types::Embedding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl CallPolicy {
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self { timeout, max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS) }
    }

    pub fn embedding(settings: &PolicySettings) -> Self { Self::new(settings.embed_timeout(), settings.max_attempts) }
    pub fn generation(settings: &PolicySettings) -> Self {
        Self::new(settings.generate_timeout(), settings.max_attempts)
    }

    /// Run `call` under this policy. `operation` names the call in errors and logs.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = async {
            let mut attempt = 1;
            loop {
                match call().await {
                    Err(e) if e.is_transient() && attempt < self.max_attempts => {
                        warn!(operation, attempt, error = %e, "transient failure, retrying");
                        attempt += 1;
                    }
                    other => return other,
                }
            }
        };
        tokio::time::timeout(self.timeout, attempts)
            .await
            .map_err(|_| Error::Timeout { operation, after: self.timeout })?
    }
}

pub struct GuardedEmbedder {
    inner: Arc<dyn Embedder>,
    policy: CallPolicy,
}

impl GuardedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, policy: CallPolicy) -> Self { Self { inner, policy } }
}

#[async_trait]
impl Embedder for GuardedEmbedder {
    fn id(&self) -> &str { self.inner.id() }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.policy.run("embed", || self.inner.embed(text)).await
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let out = self.policy.run("embed", || self.inner.embed_many(texts)).await?;
        if out.len() != texts.len() {
            return Err(Error::embedding(
                format!("backend returned {} vectors for {} inputs", out.len(), texts.len()),
                false,
            ));
        }
        Ok(out)
    }
}

pub struct GuardedGenerator {
    inner: Arc<dyn Generator>,
    policy: CallPolicy,
}

impl GuardedGenerator {
    pub fn new(inner: Arc<dyn Generator>, policy: CallPolicy) -> Self { Self { inner, policy } }
}

#[async_trait]
impl Generator for GuardedGenerator {
    fn id(&self) -> &str { self.inner.id() }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.policy.run("generate", || self.inner.generate(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> CallPolicy { CallPolicy::new(Duration::from_secs(5), 2) }

    #[test]
    fn attempts_are_capped() {
        assert_eq!(CallPolicy::new(Duration::from_secs(1), 9).max_attempts, MAX_ATTEMPTS);
        assert_eq!(CallPolicy::new(Duration::from_secs(1), 0).max_attempts, 1);
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = policy()
            .run("embed", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::embedding("reset by peer", true))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<()> = policy()
            .run("embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::embedding("503", true))
            })
            .await;
        assert!(out.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<()> = policy()
            .run("generate", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::DimensionMismatch { expected: 3, actual: 4 })
            })
            .await;
        assert!(matches!(out, Err(Error::DimensionMismatch { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_call_times_out_without_retry() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = CallPolicy::new(Duration::from_millis(50), 2);
        let out: Result<()> = policy
            .run("generate", move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::pending()
            })
            .await;
        assert!(matches!(out, Err(Error::Timeout { operation: "generate", .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
