//! Retry decorator for flaky embedder backends.
//!
//! Wraps any [`Embedder`] and retries transient failures with exponential
//! backoff and jitter, up to a configured ceiling. Persistent failures
//! (bad configuration, oversized input) are never retried.

use std::thread::sleep;
use std::time::Duration;

use rand::Rng;

use crate::embedder::{Embedder, EmbedderError, EmbedderInfo};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Whether an [`EmbedderError`] is worth retrying.
///
/// `ProviderFailure` covers transport and server-side failures (the only
/// variant a real ONNX/HTTP backend raises for I/O problems); configuration
/// and input-size errors are a property of the call itself and will fail
/// identically on every retry.
fn is_transient(err: &EmbedderError) -> bool {
    matches!(err, EmbedderError::ProviderFailure { .. })
}

/// Decorates an [`Embedder`] with retry-with-backoff around transient errors.
pub struct RetryingEmbedder<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: Embedder> RetryingEmbedder<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.policy.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let capped = exp.min(self.policy.max_delay.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
        Duration::from_millis(capped + jitter)
    }

    fn with_retry<T>(&self, mut call: impl FnMut() -> Result<T, EmbedderError>) -> Result<T, EmbedderError> {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && attempt < self.policy.max_retries => {
                    sleep(self.backoff_delay(attempt));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.with_retry(|| self.inner.embed(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        self.with_retry(|| self.inner.embed_batch(texts))
    }

    fn info(&self) -> &EmbedderInfo {
        self.inner.info()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::embedder::ProviderKind;

    struct FlakyEmbedder {
        failures_left: Cell<u32>,
        info: EmbedderInfo,
    }

    impl Embedder for FlakyEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
            let left = self.failures_left.get();
            if left > 0 {
                self.failures_left.set(left - 1);
                return Err(EmbedderError::ProviderFailure {
                    message: "simulated transient failure".into(),
                });
            }
            Ok(vec![1.0, 0.0])
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn info(&self) -> &EmbedderInfo {
            &self.info
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn info() -> EmbedderInfo {
        EmbedderInfo {
            provider: ProviderKind::OnnxHttp,
            embedding_model_id: "flaky".into(),
            dimension: 2,
            text_repr_version: "v1".into(),
        }
    }

    #[test]
    fn retries_until_success() {
        let flaky = FlakyEmbedder {
            failures_left: Cell::new(2),
            info: info(),
        };
        let retrying = RetryingEmbedder::new(flaky, fast_policy());
        assert_eq!(retrying.embed("x").unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let flaky = FlakyEmbedder {
            failures_left: Cell::new(100),
            info: info(),
        };
        let retrying = RetryingEmbedder::new(flaky, fast_policy());
        let err = retrying.embed("x").unwrap_err();
        assert!(matches!(err, EmbedderError::ProviderFailure { .. }));
    }

    #[test]
    fn does_not_retry_persistent_errors() {
        struct AlwaysTooLong {
            info: EmbedderInfo,
        }
        impl Embedder for AlwaysTooLong {
            fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
                Err(EmbedderError::InputTooLong {
                    max_length: 10,
                    actual_length: 20,
                })
            }
            fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
                texts.iter().map(|t| self.embed(t)).collect()
            }
            fn info(&self) -> &EmbedderInfo {
                &self.info
            }
        }
        let retrying = RetryingEmbedder::new(AlwaysTooLong { info: info() }, fast_policy());
        assert!(matches!(
            retrying.embed("x").unwrap_err(),
            EmbedderError::InputTooLong { .. }
        ));
    }
}
