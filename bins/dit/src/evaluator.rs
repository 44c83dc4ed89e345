/// Outcome Evaluator - pass/fail rules
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Pure functions: (raw engine result) → outcome, (outcomes) → summary
///
/// **Rules:**
/// - A test passes iff its container exited with code 0
/// - A timeout or engine error is a failed test, never a crashed run
/// - A suite passes iff it was set up and every test passed
/// - A run passes iff every suite passed

use crate::engine::{EngineError, EngineResult};
use dit_common::types::{RunOutcome, TestExit};

/// Classify what waiting on a test container produced
pub fn classify_wait(result: &EngineResult<i64>) -> TestExit {
    match result {
        Ok(code) => TestExit::Exited(*code),
        Err(EngineError::Timeout { .. }) => TestExit::TimedOut,
        Err(_) => TestExit::Errored,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub suites_run: usize,
    pub suites_failed: usize,
    pub tests_run: usize,
    pub tests_failed: usize,
}

/// Count suites and tests of a finished run
pub fn summarize(outcome: &RunOutcome) -> RunSummary {
    let mut summary = RunSummary::default();

    for suite in &outcome.suites {
        summary.suites_run += 1;
        if !suite.passed {
            summary.suites_failed += 1;
        }
        summary.tests_run += suite.tests.len();
        summary.tests_failed += suite.tests.iter().filter(|t| !t.passed).count();
    }

    summary
}

/// Final console line of a run
pub fn verdict_line(outcome: &RunOutcome) -> &'static str {
    if outcome.passed {
        "[SUCCESS]"
    } else {
        "[FAILURE]"
    }
}
