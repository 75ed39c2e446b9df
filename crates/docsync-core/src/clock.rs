//! Time and identity providers injected into the services.
//!
//! Production code uses [`SystemClock`] and [`RandomIdGenerator`]; tests swap
//! in a controllable clock so timestamps and liveness windows are deterministic.

use std::fmt::Debug;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::models::{ChangeId, ConflictId, SessionId};

/// A time provider returning Unix milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_millis(&self) -> i64;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Source of identifiers for queued changes, conflicts, and sessions.
pub trait IdGenerator: Send + Sync + Debug {
    /// Identity for a queued change, unique even for writes in the same millisecond.
    fn change_id(&self, document_id: &str, timestamp: i64) -> ChangeId;

    fn conflict_id(&self) -> ConflictId;

    fn session_id(&self) -> SessionId;
}

/// Generates `<document>-<timestamp>-<random>` change ids and UUID v7 record ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn change_id(&self, document_id: &str, timestamp: i64) -> ChangeId {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|byte| char::from(byte).to_ascii_lowercase())
            .collect();
        ChangeId::from(format!("{document_id}-{timestamp}-{suffix}"))
    }

    fn conflict_id(&self) -> ConflictId {
        ConflictId::new()
    }

    fn session_id(&self) -> SessionId {
        SessionId::new()
    }
}

/// Test clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    millis: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: std::sync::atomic::AtomicI64::new(millis),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.millis
            .fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(std::sync::atomic::Ordering::SeqCst)
    }
}
