// src/retry.rs
//! Bounded retry policy per class of external call.
//!
//! Every class defaults to zero retries: a call either succeeds or the page /
//! entry it belongs to is marked failed. Retrying writes risks duplicate creates.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    Feed,
    IndexPage,
    BankLookup,
    Write,
}

impl CallClass {
    pub fn as_str(self) -> &'static str {
        match self {
            CallClass::Feed => "feed",
            CallClass::IndexPage => "index_page",
            CallClass::BankLookup => "bank_lookup",
            CallClass::Write => "write",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u8,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u8, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::from_millis(500))
    }

    /// Exponential backoff: base, 2*base, 4*base, ...
    pub fn delay_for_attempt(&self, attempt_index: u8) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, class: CallClass, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u8 = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(
                        target: "remote",
                        class = class.as_str(),
                        attempt = attempt + 1,
                        error = %e,
                        "call failed, retrying"
                    );
                    tokio::time::sleep(self.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
