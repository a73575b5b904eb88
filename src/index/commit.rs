//! Waiting for outstanding writes to become searchable in manual-commit
//! deployments.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitWait {
    /// Counter reached zero (or the backend does not track it).
    Committed,
    /// Counter went negative; logged and treated as done.
    Anomaly(i64),
    TimedOut { outstanding: i64 },
    /// Polling failed; the wait was abandoned.
    Failed,
}

pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

const MIN_INCREMENT: Duration = Duration::from_millis(1);

/// Polls an outstanding-commit counter in bounded sleeps.
#[derive(Clone)]
pub struct CommitWaiter {
    max_wait: Duration,
    increment: Duration,
    sleeper: Sleeper,
}

impl CommitWaiter {
    /// Increments below one millisecond are raised to it.
    pub fn new(max_wait: Duration, increment: Duration) -> Self {
        CommitWaiter { max_wait, increment: increment.max(MIN_INCREMENT), sleeper: Arc::new(std::thread::sleep) }
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// `poll` returns the current count, `None` when the backend has none.
    pub fn wait(&self, account: &str, mut poll: impl FnMut() -> Result<Option<i64>>) -> CommitWait {
        let mut remaining = self.max_wait;
        loop {
            let count = match poll() {
                Ok(count) => count,
                Err(e) => {
                    warn!(target: "mailindex::commit", account = %account, error = %e, "commit count poll failed");
                    return CommitWait::Failed;
                }
            };
            match count {
                None | Some(0) => return CommitWait::Committed,
                Some(n) if n < 0 => {
                    warn!(target: "mailindex::commit", account = %account, count = n, "negative outstanding commit count");
                    return CommitWait::Anomaly(n);
                }
                Some(n) => {
                    if remaining.is_zero() {
                        debug!(target: "mailindex::commit", account = %account, outstanding = n, "gave up waiting for commit");
                        return CommitWait::TimedOut { outstanding: n };
                    }
                    let nap = self.increment.min(remaining);
                    debug!(target: "mailindex::commit", account = %account, outstanding = n, sleep_ms = nap.as_millis() as u64, "waiting for commit");
                    (self.sleeper)(nap);
                    remaining = remaining.saturating_sub(nap);
                }
            }
        }
    }
}
