//! Exponential backoff for the batch retry pass

use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxAttemptsExceeded;

impl std::fmt::Display for MaxAttemptsExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxAttemptsExceeded {}

impl ExponentialBackoff {
    pub fn new(initial_ms: u64, max_ms: u64, attempts: u32) -> Self {
        Self {
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
            max_attempts: attempts,
            current_attempt: 0,
        }
    }

    /// Wait out the next delay, doubling each attempt up to the cap.
    pub async fn sleep(&mut self) -> Result<(), MaxAttemptsExceeded> {
        if self.current_attempt >= self.max_attempts {
            return Err(MaxAttemptsExceeded);
        }

        let delay = std::cmp::min(
            self.initial_delay_ms * 2_u64.pow(self.current_attempt),
            self.max_delay_ms,
        );

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_attempts,
            delay
        );

        sleep(Duration::from_millis(delay)).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempts_used(&self) -> u32 {
        self.current_attempt
    }
}
