//! Run summary.

use serde::Serialize;
use tessera_explore::traversal::ModeStats;
use tessera_ir::value::Combination;

use crate::limits::StopReason;

/// The smallest failing combination a run found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestError<E> {
    pub combination: Combination,
    pub error: Option<E>,
    /// Tests executed when it was found.
    pub tests: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport<E> {
    pub tests: u64,
    /// External cycles finished.
    pub cycles: u64,
    /// Failing tests seen, including ones that did not improve the best.
    pub failures: u64,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
    pub best: Option<BestError<E>>,
    pub modes: Vec<ModeStats>,
}

impl<E> RunReport<E> {
    pub fn passed(&self) -> bool {
        self.best.is_none()
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} tests in {} cycles ({}ms), {}",
            self.tests, self.cycles, self.elapsed_ms, self.stop_reason
        );
        match &self.best {
            Some(best) => line.push_str(&format!(
                "; smallest failure {} after {} tests",
                best.combination, best.tests
            )),
            None => line.push_str("; no failures"),
        }
        line
    }
}
