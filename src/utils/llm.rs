//! # Endpoint or LLM
//!
//! The endpoint of every chain is a text generator: it consumes a complete prompt and produces a reply.
//! Chains only see the [Generate] trait, so anything from a closure to a hosted model can drive them.

use std::fmt::Display;
use std::thread;
use std::time::Duration;
use anyhow::Result;
use log::warn;

#[cfg(feature = "openai")]
pub mod openai;

/// Trait for turning a complete prompt into generated text.
///
/// Errors are transport or provider failures. Sequential chains retry them, parallel chains isolate them per task.
pub trait Generate {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Blanket impl of Generate for Fn(&str) -> Result<String>.
impl<F> Generate for F where F: Fn(&str) -> Result<String> {
    fn generate(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}

/// Retries of a single provider call, waiting `base_delay * 2^retry` before each retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Wait before retry `retry`, counted from 0.
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Call `op` until it succeeds, fails with an error `is_retryable` rejects, or the retries are used up.
    /// The last error is returned.
    pub fn run<T, E: Display>(&self, is_retryable: impl Fn(&E) -> bool,
                              mut op: impl FnMut() -> std::result::Result<T, E>) -> std::result::Result<T, E> {
        let mut retry = 0;
        loop {
            match op() {
                Err(e) if retry < self.max_retries && is_retryable(&e) => {
                    let delay = self.delay(retry);
                    warn!("Attempt {} failed, retrying in {:.1}s: {}", retry + 1, delay.as_secs_f64(), e);
                    thread::sleep(delay);
                    retry += 1;
                }
                result => return result,
            }
        }
    }
}

/// A generator whose errors are retried under a [RetryPolicy].
///
/// ```
/// use std::cell::Cell;
/// use std::time::Duration;
/// use anyhow::{anyhow, Result};
/// use promptchain::utils::llm::{Generate, RetryPolicy, Retrying};
///
/// let calls = Cell::new(0);
/// let flaky = |prompt: &str| -> Result<String> {
///     calls.set(calls.get() + 1);
///     if calls.get() < 3 { Err(anyhow!("503 service unavailable")) } else { Ok(prompt.to_string()) }
/// };
/// let generator = Retrying::new(flaky, RetryPolicy::new(3, Duration::ZERO));
/// assert_eq!(generator.generate("hi").unwrap(), "hi");
/// assert_eq!(calls.get(), 3);
/// ```
pub struct Retrying<G> {
    inner: G,
    policy: RetryPolicy,
    is_retryable: fn(&anyhow::Error) -> bool,
}

impl<G: Generate> Retrying<G> {
    /// Retry every error.
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            is_retryable: |_: &anyhow::Error| true,
        }
    }

    /// Retry only the errors `is_retryable` accepts.
    pub fn with_retryable(mut self, is_retryable: fn(&anyhow::Error) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<G: Generate> Generate for Retrying<G> {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.policy.run(self.is_retryable, || self.inner.generate(prompt))
    }
}
