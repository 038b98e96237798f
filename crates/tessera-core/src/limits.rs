//! Run limits.
//!
//! Caps on cycles, tests and wall time for a whole run. When a cap is hit
//! the run stops and reports what it found so far rather than failing.

use serde::{Deserialize, Serialize};
use tessera_explore::clock::Clock;

/// Limits for one run over a variants iterator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Full passes every productive mode must complete.
    pub max_cycles: u64,
    /// Hard cap on external cycles, whatever the passes say.
    pub max_external_cycles: Option<u64>,
    /// Maximum tests executed across the run.
    pub max_tests: Option<u64>,
    /// Maximum wall-clock milliseconds.
    pub max_wall_ms: Option<u64>,
    /// Keep going after a failure, looking for a smaller one.
    pub find_best_error: bool,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_cycles: 1,
            max_external_cycles: None,
            max_tests: None,
            max_wall_ms: None,
            find_best_error: true,
        }
    }
}

/// Reason a run was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every productive mode completed the requested passes.
    Complete,
    /// External cycle cap reached.
    CyclesReached,
    /// Test cap reached.
    TestLimitExceeded,
    /// Wall-clock time limit exceeded.
    WallTimeExceeded,
    /// A test failed and best-error search is off.
    FirstError,
    /// Nothing left to enumerate.
    Exhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Complete => "complete",
            StopReason::CyclesReached => "cycle limit reached",
            StopReason::TestLimitExceeded => "test limit exceeded",
            StopReason::WallTimeExceeded => "wall time exceeded",
            StopReason::FirstError => "stopped at first error",
            StopReason::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Checks run progress against limits, timing from construction.
pub struct LimitChecker<'a> {
    limits: RunLimits,
    clock: &'a dyn Clock,
    started_ms: u64,
}

impl<'a> LimitChecker<'a> {
    pub fn new(limits: RunLimits, clock: &'a dyn Clock) -> Self {
        let started_ms = clock.now_ms();
        Self {
            limits,
            clock,
            started_ms,
        }
    }

    /// Returns None if all ok, or the reason for stopping.
    pub fn check(&self, tests: u64, cycles: u64) -> Option<StopReason> {
        if self.wall_time_exceeded() {
            return Some(StopReason::WallTimeExceeded);
        }
        if self.limits.max_tests.is_some_and(|max| tests >= max) {
            return Some(StopReason::TestLimitExceeded);
        }
        if self.limits.max_external_cycles.is_some_and(|max| cycles >= max) {
            return Some(StopReason::CyclesReached);
        }
        None
    }

    pub fn wall_time_exceeded(&self) -> bool {
        self.limits
            .max_wall_ms
            .is_some_and(|max| self.elapsed_ms() >= max)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock.now_ms().saturating_sub(self.started_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_explore::clock::ManualClock;

    #[test]
    fn test_default_limits() {
        let limits = RunLimits::default();
        assert_eq!(limits.max_cycles, 1);
        assert!(limits.find_best_error);
        assert!(limits.max_tests.is_none());
    }

    #[test]
    fn test_checker_all_ok() {
        let clock = ManualClock::new();
        let checker = LimitChecker::new(
            RunLimits {
                max_tests: Some(100),
                max_wall_ms: Some(1000),
                max_external_cycles: Some(5),
                ..Default::default()
            },
            &clock,
        );
        assert!(checker.check(10, 1).is_none());
    }

    #[test]
    fn test_test_limit() {
        let clock = ManualClock::new();
        let checker = LimitChecker::new(
            RunLimits {
                max_tests: Some(100),
                ..Default::default()
            },
            &clock,
        );
        assert_eq!(checker.check(100, 0), Some(StopReason::TestLimitExceeded));
    }

    #[test]
    fn test_wall_time_measured_from_construction() {
        let clock = ManualClock::new();
        clock.set(5_000);
        let checker = LimitChecker::new(
            RunLimits {
                max_wall_ms: Some(200),
                ..Default::default()
            },
            &clock,
        );
        clock.advance(199);
        assert!(checker.check(0, 0).is_none());
        clock.advance(1);
        assert_eq!(checker.elapsed_ms(), 200);
        assert_eq!(checker.check(0, 0), Some(StopReason::WallTimeExceeded));
    }

    #[test]
    fn test_external_cycle_cap() {
        let clock = ManualClock::new();
        let checker = LimitChecker::new(
            RunLimits {
                max_external_cycles: Some(3),
                ..Default::default()
            },
            &clock,
        );
        assert_eq!(checker.check(0, 3), Some(StopReason::CyclesReached));
    }

    #[test]
    fn test_limits_from_partial_json() {
        let limits: RunLimits = serde_json::from_str(r#"{ "max_tests": 50 }"#).unwrap();
        assert_eq!(limits.max_tests, Some(50));
        assert_eq!(limits.max_cycles, 1);
        assert!(limits.find_best_error);
    }
}
