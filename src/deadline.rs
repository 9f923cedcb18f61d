//! Shared deadline budget for work made of several sub-requests.
//!
//! Every sub-request gets whatever is left of the original budget; nothing
//! ever extends it.

use crate::error::TimeoutError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Time left, or a timeout error once the budget is spent.
    pub fn remaining(&self) -> Result<Duration, TimeoutError> {
        match self.budget.checked_sub(self.elapsed()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(self.timeout_error()),
        }
    }

    /// Run one sub-request bounded by the remaining budget.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, TimeoutError> {
        let left = self.remaining()?;
        tokio::time::timeout(left, fut)
            .await
            .map_err(|_| self.timeout_error())
    }

    fn timeout_error(&self) -> TimeoutError {
        TimeoutError {
            budget_ms: self.budget.as_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_within_budget() {
        let deadline = Deadline::new(Duration::from_secs(5));
        let value = deadline.run(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().unwrap() <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn slow_sub_request_times_out() {
        let deadline = Deadline::new(Duration::from_millis(20));
        let err = deadline
            .run(tokio::time::sleep(Duration::from_millis(500)))
            .await
            .unwrap_err();
        assert_eq!(err.budget_ms, 20);
    }

    #[tokio::test]
    async fn exhausted_budget_fails_fast() {
        let deadline = Deadline::new(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(deadline.is_expired());
        assert!(deadline.remaining().is_err());

        // The future is never polled once the budget is gone.
        let polled = std::sync::atomic::AtomicBool::new(false);
        let result = deadline
            .run(async { polled.store(true, std::sync::atomic::Ordering::SeqCst) })
            .await;
        assert!(result.is_err());
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn zero_budget_is_already_expired() {
        let deadline = Deadline::new(Duration::ZERO);
        assert!(deadline.remaining().is_err());
    }
}
