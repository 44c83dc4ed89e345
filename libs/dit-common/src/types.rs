/// Exit code reported for a test whose container could not be created,
/// started or waited on
pub const ERROR_EXIT_CODE: i64 = -10;

/// Exit code reported for a test whose container outlived its timeout
pub const TIMEOUT_EXIT_CODE: i64 = -1;

/// How a test container ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestExit {
    /// Container exited on its own with this code
    Exited(i64),
    /// Container was still running when the test timeout expired
    TimedOut,
    /// Container never produced an exit code (create/start/wait failure)
    Errored,
}

impl TestExit {
    pub fn code(&self) -> i64 {
        match self {
            TestExit::Exited(code) => *code,
            TestExit::TimedOut => TIMEOUT_EXIT_CODE,
            TestExit::Errored => ERROR_EXIT_CODE,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, TestExit::Exited(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    /// 1-based position of the test inside its suite
    pub index: usize,
    pub exit: TestExit,
    pub passed: bool,
}

impl TestOutcome {
    pub fn new(index: usize, exit: TestExit) -> Self {
        Self {
            index,
            exit,
            passed: exit.passed(),
        }
    }

    pub fn exit_code(&self) -> i64 {
        self.exit.code()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOutcome {
    /// 1-based position of the suite inside the plan
    pub index: usize,
    pub name: String,
    pub passed: bool,
    pub tests: Vec<TestOutcome>,
    /// Set when the main container could not be created, started or gated
    pub setup_error: Option<String>,
}

impl SuiteOutcome {
    /// Suite whose tests all ran; fails if any test failed
    pub fn completed(index: usize, name: impl Into<String>, tests: Vec<TestOutcome>) -> Self {
        let passed = tests.iter().all(|t| t.passed);
        Self {
            index,
            name: name.into(),
            passed,
            tests,
            setup_error: None,
        }
    }

    /// Suite that failed before or while running its tests
    pub fn failed(
        index: usize,
        name: impl Into<String>,
        tests: Vec<TestOutcome>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            passed: false,
            tests,
            setup_error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub passed: bool,
    pub suites: Vec<SuiteOutcome>,
}

impl RunOutcome {
    pub fn from_suites(suites: Vec<SuiteOutcome>) -> Self {
        let passed = suites.iter().all(|s| s.passed);
        Self { passed, suites }
    }

    /// Process exit code: 0 when every suite passed, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.passed {
            0
        } else {
            1
        }
    }
}
