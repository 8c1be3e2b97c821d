//! Deadline-bearing context shared by a single scrape and every task it spawns.
//!
//! There is no Go-style cancellable context in Tokio; a deadline plus
//! cooperative checks at suspension points gives the same guarantee. Dropping
//! the future returned by [`ScrapeContext::run`] past its deadline cancels
//! everything nested inside it (pagination loops, retries, in-flight HTTP
//! calls) the same way a client disconnect does when axum drops the handler
//! future.

use std::time::Duration;

use tokio::time::{error::Elapsed, Instant};

#[derive(Clone, Copy, Debug)]
pub struct ScrapeContext {
    deadline: Instant,
}

impl ScrapeContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    /// True once the deadline has passed. Checked at loop boundaries so a
    /// pagination or retry loop can bail with [`crate::error::ClientError::Cancelled`]
    /// instead of attempting one more round trip.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Races `fut` against the deadline. Used once, at the top of a scrape,
    /// as the hard backstop; cooperative checks inside do the graceful part.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout_at(self.deadline, fut).await
    }
}
