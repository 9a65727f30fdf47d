//! Injected time source.
//!
//! Pure logic (quota windows, probe alignment) never reads the wall clock
//! directly; it takes a `DateTime<Utc>` that callers source from a `Clock`.
//! This mirrors the teacher's convention of passing timestamps as plain
//! `chrono::Utc::now()` call sites at the edges (e.g.
//! `daemon/llm_gateway/mod.rs::complete`'s `std::time::Instant::now()`) while
//! keeping the math itself free of hidden clock reads.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed-time double for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
