//! Pieces shared by the map and reduce phases of one job.
pub mod output;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{MrError, Result};

/// Wall-clock budget and cancellation flag of a running job. Tasks call check() once per record
/// (map) or group (reduce).
pub struct JobClock {
    start: Instant,
    limit: Option<Duration>,
    cancelled: AtomicBool,
}

impl JobClock {
    pub fn new(limit: Option<Duration>) -> JobClock {
        JobClock {
            start: Instant::now(),
            limit,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Makes all further check() calls fail.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn check(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(MrError::Cancelled);
        }
        match self.limit {
            Some(limit) if self.start.elapsed() > limit => {
                self.cancel();
                Err(MrError::Timeout { limit })
            }
            _ => Ok(()),
        }
    }
}
