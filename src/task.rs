//! Per-message context consumed by the scheduler
//!
//! The surrounding pipeline owns the real message, its session and its event
//! loop. The scheduler only needs a narrow view of them: message size,
//! parsed settings, the session's pending-event count and blocked flag, the
//! accumulated score against its budget, and a fast random source for the
//! profiling draw.

use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

/// Narrow view of one in-flight message and its session
pub struct TaskContext {
    /// Message size in bytes
    pub msg_size: u64,

    /// Parsed per-task settings, if the client supplied any
    pub settings: Option<Value>,

    /// Session events currently outstanding for this message's session
    pub pending_events: u32,

    /// Session is blocked or being torn down; no new work may be scheduled
    pub blocked: bool,

    /// Cumulative score accrued by finished checks
    pub score: f64,

    /// Score budget; once reached, non-fine filter symbols are not planned
    pub score_limit: Option<f64>,

    rng: SmallRng,
}

impl TaskContext {
    /// Create a context for a message of the given size
    pub fn new(msg_size: u64) -> Self {
        Self {
            msg_size,
            settings: None,
            pending_events: 0,
            blocked: false,
            score: 0.0,
            score_limit: None,
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Replace the random source with a deterministically seeded one
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Current wall-clock time. Cheap; callers may treat it as cached.
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Fast pseudo-random draw in `[0, 1)`
    pub fn random_double(&mut self) -> f64 {
        self.rng.random()
    }

    /// Whether the message has already scored past its budget
    pub fn score_limit_reached(&self) -> bool {
        self.score_limit.map(|limit| self.score >= limit).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_limit() {
        let mut task = TaskContext::new(100);
        assert!(!task.score_limit_reached());

        task.score_limit = Some(15.0);
        task.score = 10.0;
        assert!(!task.score_limit_reached());

        task.score = 15.0;
        assert!(task.score_limit_reached());

        task.score = 20.0;
        assert!(task.score_limit_reached());
    }

    #[test]
    fn test_random_double_range() {
        let mut task = TaskContext::new(0).with_rng_seed(7);
        for _ in 0..100 {
            let draw = task.random_double();
            assert!((0.0..1.0).contains(&draw));
        }
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let mut a = TaskContext::new(0).with_rng_seed(42);
        let mut b = TaskContext::new(0).with_rng_seed(42);
        assert_eq!(a.random_double(), b.random_double());
    }
}
