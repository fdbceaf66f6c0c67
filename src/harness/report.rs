use serde::{Deserialize, Serialize};

/// The single JSON document the harness emits on stdout. This is the whole
/// wire contract between the container and the dispatcher; both sides live
/// in this crate so the format cannot drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct HarnessReport {
    pub(crate) results: Vec<TestReport>,
    pub(crate) summary: ReportSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TestReport {
    pub(crate) test: String,
    pub(crate) passed: bool,
    pub(crate) expected: String,
    pub(crate) actual: String,
    pub(crate) error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ReportSummary {
    pub(crate) passed: u32,
    pub(crate) total: u32,
    pub(crate) all_passed: bool,
}

impl HarnessReport {
    /// Builds the summary from the per-test results. `all_passed` is never
    /// vacuously true: an empty result set does not count as a green run.
    pub(crate) fn from_results(results: Vec<TestReport>) -> Self {
        let total = results.len() as u32;
        let passed = results.iter().filter(|result| result.passed).count() as u32;
        let all_passed = total > 0 && passed == total;

        Self { results, summary: ReportSummary { passed, total, all_passed } }
    }
}

impl TestReport {
    pub(crate) fn failed(test: &str, error: String) -> Self {
        Self {
            test: test.to_string(),
            passed: false,
            expected: String::new(),
            actual: String::new(),
            error,
        }
    }
}
