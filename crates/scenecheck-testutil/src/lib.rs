//! Test utilities for scenecheck.
//!
//! Runs synchronous validation over scene fixtures and aggregates the outcome:
//! - [`scenes::SceneProvider`]: which scene documents to test
//! - [`scenes::SceneTestRunner`]: one pass/fail per scene, errors fail, warnings do not

pub mod scenes;

use std::fmt;

/// The result of validating a single scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    /// No error-severity issues.
    Pass,
    /// Validation reported errors.
    Fail { errors: usize, report: String },
    /// Scene was skipped.
    Skip { reason: String },
    /// The scene could not be loaded or validated.
    Error { message: String },
}

impl TestResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestResult::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, TestResult::Fail { .. })
    }
}

/// Summary of validating multiple scenes.
#[derive(Debug, Default)]
pub struct TestSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub failures: Vec<TestFailure>,
}

/// A single scene failure with context.
#[derive(Debug, Clone)]
pub struct TestFailure {
    pub name: String,
    pub result: TestResult,
}

impl TestSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, result: TestResult) {
        match &result {
            TestResult::Pass => self.passed += 1,
            TestResult::Fail { .. } => {
                self.failed += 1;
                self.failures.push(TestFailure {
                    name: name.into(),
                    result,
                });
            }
            TestResult::Skip { .. } => {
                self.skipped += 1;
            }
            TestResult::Error { .. } => {
                self.errors += 1;
                self.failures.push(TestFailure {
                    name: name.into(),
                    result,
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errors
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{}", "═".repeat(60))?;
        writeln!(f, "Scene Summary: {} total", self.total())?;
        writeln!(
            f,
            "  ✓ {} passed  ✗ {} failed  ⊘ {} skipped  ⚠ {} errors",
            self.passed, self.failed, self.skipped, self.errors
        )?;

        if !self.failures.is_empty() {
            writeln!(f, "\nFailures:")?;
            for failure in &self.failures {
                writeln!(f, "\n  {}", failure.name)?;
                match &failure.result {
                    TestResult::Fail { report, .. } => {
                        for line in report.lines() {
                            writeln!(f, "    {line}")?;
                        }
                    }
                    TestResult::Error { message } => {
                        writeln!(f, "    error: {}", message)?;
                    }
                    _ => {}
                }
            }
        }
        writeln!(f, "{}", "═".repeat(60))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_and_failures() {
        let mut summary = TestSummary::new();
        summary.record("a", TestResult::Pass);
        summary.record(
            "b",
            TestResult::Fail {
                errors: 1,
                report: "1 check(s) have failed:".into(),
            },
        );
        summary.record("c", TestResult::Skip { reason: "empty".into() });
        summary.record("d", TestResult::Error { message: "bad json".into() });

        assert_eq!(summary.total(), 4);
        assert!(!summary.all_passed());
        assert_eq!(summary.failures.len(), 2);
        let text = summary.to_string();
        assert!(text.contains("1 check(s) have failed:"));
        assert!(text.contains("error: bad json"));
    }
}
