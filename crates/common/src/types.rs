//! Core data model: cases, run results, failure evidence, browser projects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier of a single test case (its spec name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Verdict for a single case in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseStatus::Passed => write!(f, "passed"),
            CaseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Root-cause taxonomy for case failures. Closed set; `Unknown` is the
/// catch-all, never an omission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    SelectorMismatch,
    TimingRace,
    StateIsolation,
    AssertionMismatch,
    EnvironmentOrAuth,
    Unknown,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 6] = [
        FailureCategory::SelectorMismatch,
        FailureCategory::TimingRace,
        FailureCategory::StateIsolation,
        FailureCategory::AssertionMismatch,
        FailureCategory::EnvironmentOrAuth,
        FailureCategory::Unknown,
    ];
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::SelectorMismatch => write!(f, "selector-mismatch"),
            FailureCategory::TimingRace => write!(f, "timing-race"),
            FailureCategory::StateIsolation => write!(f, "state-isolation"),
            FailureCategory::AssertionMismatch => write!(f, "assertion-mismatch"),
            FailureCategory::EnvironmentOrAuth => write!(f, "environment-or-auth"),
            FailureCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Diagnostic evidence captured for a failing case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureEvidence {
    /// Raw error message from the browser driver or assertion.
    pub error_message: String,

    /// Stack trace, when the driver produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    /// Failure screenshot path, when one was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    /// Selector the driver was acting on, when extractable from the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Actual value from a failed comparator, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,

    /// Expected value from a failed comparator, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Browser project the failure was observed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl FailureEvidence {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            ..Default::default()
        }
    }
}

/// Outcome of one case in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub status: CaseStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<FailureEvidence>,
}

impl CaseOutcome {
    pub fn passed(duration_ms: u64) -> Self {
        Self {
            status: CaseStatus::Passed,
            duration_ms,
            evidence: None,
        }
    }

    pub fn failed(duration_ms: u64, evidence: FailureEvidence) -> Self {
        Self {
            status: CaseStatus::Failed,
            duration_ms,
            evidence: Some(evidence),
        }
    }
}

/// Aggregated result of one full suite run. Produced fresh by each run;
/// results are never merged across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Per-case outcomes, keyed by case id. BTreeMap keeps report output
    /// stable across runs.
    pub outcomes: BTreeMap<CaseId, CaseOutcome>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, case: CaseId, outcome: CaseOutcome) {
        self.outcomes.insert(case, outcome);
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes
            .values()
            .all(|o| o.status == CaseStatus::Passed)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| o.status == CaseStatus::Passed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| o.status == CaseStatus::Failed)
            .count()
    }

    /// Failing cases with their evidence, in case-id order. A failed case
    /// with no evidence record still classifies (as Unknown), so it yields an
    /// empty evidence record rather than being dropped.
    pub fn failing(&self) -> Vec<(CaseId, FailureEvidence)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.status == CaseStatus::Failed)
            .map(|(id, o)| (id.clone(), o.evidence.clone().unwrap_or_default()))
            .collect()
    }
}

/// A source-level fix applied in response to a classified failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    pub case: CaseId,
    pub category: FailureCategory,
    pub description: String,
}

/// Browser engine for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Viewport dimensions for a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A named execution environment: browser engine plus device profile. A case
/// failing under any configured project is a failed case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserProject {
    pub name: String,
    pub browser: Browser,
    pub viewport: Viewport,
    #[serde(default)]
    pub mobile: bool,
}

impl BrowserProject {
    pub fn chromium_desktop() -> Self {
        Self {
            name: "chromium-desktop".to_string(),
            browser: Browser::Chromium,
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            mobile: false,
        }
    }

    pub fn mobile_safari() -> Self {
        Self {
            name: "mobile-safari".to_string(),
            browser: Browser::Webkit,
            viewport: Viewport {
                width: 390,
                height: 844,
            },
            mobile: true,
        }
    }

    /// Default project matrix: one desktop engine, one mobile profile.
    pub fn default_matrix() -> Vec<Self> {
        vec![Self::chromium_desktop(), Self::mobile_safari()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_result_counts() {
        let mut result = RunResult::new();
        result.record(CaseId::from("a"), CaseOutcome::passed(10));
        result.record(
            CaseId::from("b"),
            CaseOutcome::failed(20, FailureEvidence::from_message("boom")),
        );

        assert!(!result.all_passed());
        assert_eq!(result.passed_count(), 1);
        assert_eq!(result.failed_count(), 1);
        let failing = result.failing();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].0.as_str(), "b");
    }

    #[test]
    fn test_failing_without_evidence_yields_empty_record() {
        let mut result = RunResult::new();
        result.record(
            CaseId::from("a"),
            CaseOutcome {
                status: CaseStatus::Failed,
                duration_ms: 0,
                evidence: None,
            },
        );

        let failing = result.failing();
        assert_eq!(failing.len(), 1);
        assert!(failing[0].1.error_message.is_empty());
    }

    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&FailureCategory::SelectorMismatch).unwrap();
        assert_eq!(json, "\"selector_mismatch\"");
        assert_eq!(FailureCategory::TimingRace.to_string(), "timing-race");
    }

    #[test]
    fn test_default_project_matrix() {
        let projects = BrowserProject::default_matrix();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "chromium-desktop");
        assert!(projects[1].mobile);
    }
}
