//! Storefront test runner: executes cases across browser projects and
//! aggregates per-project outcomes into one verdict per case.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use shopheal_common::{
    BrowserProject, CaseId, CaseOutcome, CaseStatus, Error, FailureEvidence, Result, RunResult,
};
use shopheal_healer::SuiteRunner;

use crate::playwright::{PlaywrightHandle, ProjectOutcome};
use crate::session::StorefrontSession;
use crate::spec::TestSpec;

/// Configuration for the storefront runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory holding the YAML case specs
    pub specs_dir: PathBuf,

    /// Output directory for results and screenshots
    pub output_dir: PathBuf,

    /// Browser projects every case runs under
    pub projects: Vec<BrowserProject>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
            projects: BrowserProject::default_matrix(),
        }
    }
}

/// Serializable summary of one full suite run, written alongside the
/// healing report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub result: RunResult,
}

/// Playwright-backed implementation of the healing core's `SuiteRunner`.
///
/// Every case runs to completion under every configured project; the
/// runner never retries a case on its own. Retry policy lives entirely in
/// the healing loop.
pub struct StorefrontRunner {
    config: RunnerConfig,
    session: StorefrontSession,
}

impl StorefrontRunner {
    pub fn new(config: RunnerConfig, session: StorefrontSession) -> Result<Self> {
        PlaywrightHandle::check_installed()?;
        Ok(Self { config, session })
    }

    fn handle(&self) -> Result<PlaywrightHandle> {
        PlaywrightHandle::new(
            self.session.base_url(),
            self.config.output_dir.join("screenshots"),
            self.session.storage_state().cloned(),
        )
    }

    /// Resolve case ids to loaded specs, in the requested order.
    fn load_cases(&self, cases: &[CaseId]) -> Result<Vec<TestSpec>> {
        let all = TestSpec::load_all(&self.config.specs_dir)?;
        cases
            .iter()
            .map(|id| {
                all.iter()
                    .find(|s| &s.id() == id)
                    .cloned()
                    .ok_or_else(|| Error::CaseNotFound(id.to_string()))
            })
            .collect()
    }

    /// All case ids discovered under the specs directory.
    pub fn discover_cases(&self) -> Result<Vec<CaseId>> {
        Ok(TestSpec::load_all(&self.config.specs_dir)?
            .iter()
            .map(TestSpec::id)
            .collect())
    }

    /// Case ids matching a tag.
    pub fn discover_tagged(&self, tag: &str) -> Result<Vec<CaseId>> {
        let all = TestSpec::load_all(&self.config.specs_dir)?;
        Ok(TestSpec::filter_by_tag(&all, tag)
            .iter()
            .map(|s| s.id())
            .collect())
    }

    /// Run one case under every configured project.
    async fn run_case(&self, spec: &TestSpec) -> Result<CaseOutcome> {
        let handle = self.handle()?;
        let mut outcomes = Vec::with_capacity(self.config.projects.len());

        for project in &self.config.projects {
            let outcome = handle.run_case(spec, project).await?;
            outcomes.push(outcome);
        }

        Ok(aggregate_project_outcomes(&outcomes))
    }

    /// Write the suite summary as JSON, mirroring the report convention.
    pub fn write_summary(&self, summary: &SuiteSummary) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join("suite-results.json");
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&path, json)?;
        info!("suite results written to {}", path.display());
        Ok(path)
    }

    pub fn summarize(result: RunResult) -> SuiteSummary {
        SuiteSummary {
            total: result.outcomes.len(),
            passed: result.passed_count(),
            failed: result.failed_count(),
            result,
        }
    }
}

#[async_trait]
impl SuiteRunner for StorefrontRunner {
    async fn run(&mut self, cases: &[CaseId]) -> Result<RunResult> {
        let specs = self.load_cases(cases)?;
        let mut result = RunResult::new();

        info!(cases = specs.len(), projects = self.config.projects.len(), "running suite");

        for spec in &specs {
            let outcome = self.run_case(spec).await?;
            match outcome.status {
                CaseStatus::Passed => {
                    info!("✓ {} ({} ms)", spec.name, outcome.duration_ms);
                }
                CaseStatus::Failed => {
                    let message = outcome
                        .evidence
                        .as_ref()
                        .map(|e| e.error_message.as_str())
                        .unwrap_or("unknown error");
                    error!("✗ {} - {}", spec.name, message);
                }
            }
            result.record(spec.id(), outcome);
        }

        info!(
            passed = result.passed_count(),
            failed = result.failed_count(),
            "suite finished"
        );

        Ok(result)
    }
}

/// Collapse per-project outcomes into one case verdict. A failure in any
/// project fails the case even when every other project passed; the evidence
/// comes from the first failing project.
pub fn aggregate_project_outcomes(outcomes: &[ProjectOutcome]) -> CaseOutcome {
    let duration_ms = outcomes.iter().map(|o| o.duration_ms).sum();

    match outcomes.iter().find(|o| !o.success) {
        Some(failing) => {
            let evidence = failing.evidence.clone().unwrap_or_else(|| {
                let mut ev = FailureEvidence::from_message("case failed without evidence");
                ev.project = Some(failing.project.clone());
                ev
            });
            CaseOutcome::failed(duration_ms, evidence)
        }
        None => CaseOutcome::passed(duration_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(project: &str, ms: u64) -> ProjectOutcome {
        ProjectOutcome {
            project: project.to_string(),
            success: true,
            duration_ms: ms,
            evidence: None,
        }
    }

    fn failing(project: &str, message: &str) -> ProjectOutcome {
        let mut evidence = FailureEvidence::from_message(message);
        evidence.project = Some(project.to_string());
        ProjectOutcome {
            project: project.to_string(),
            success: false,
            duration_ms: 80,
            evidence: Some(evidence),
        }
    }

    #[test]
    fn test_partial_project_failure_fails_the_case() {
        // Passing on chromium but failing on mobile-safari is still a failed
        // case.
        let outcome = aggregate_project_outcomes(&[
            passing("chromium-desktop", 100),
            failing("mobile-safari", "waiting for locator('.sticky-header')"),
        ]);

        assert_eq!(outcome.status, CaseStatus::Failed);
        let evidence = outcome.evidence.unwrap();
        assert_eq!(evidence.project.as_deref(), Some("mobile-safari"));
    }

    #[test]
    fn test_all_projects_passing_passes_the_case() {
        let outcome = aggregate_project_outcomes(&[
            passing("chromium-desktop", 100),
            passing("mobile-safari", 150),
        ]);

        assert_eq!(outcome.status, CaseStatus::Passed);
        assert_eq!(outcome.duration_ms, 250);
        assert!(outcome.evidence.is_none());
    }

    #[test]
    fn test_evidence_taken_from_first_failing_project() {
        let outcome = aggregate_project_outcomes(&[
            failing("chromium-desktop", "first failure"),
            failing("mobile-safari", "second failure"),
        ]);

        let evidence = outcome.evidence.unwrap();
        assert_eq!(evidence.error_message, "first failure");
    }

    #[test]
    fn test_failure_without_evidence_still_produces_a_record() {
        let bare = ProjectOutcome {
            project: "chromium-desktop".to_string(),
            success: false,
            duration_ms: 10,
            evidence: None,
        };
        let outcome = aggregate_project_outcomes(&[bare]);

        assert_eq!(outcome.status, CaseStatus::Failed);
        let evidence = outcome.evidence.unwrap();
        assert_eq!(evidence.project.as_deref(), Some("chromium-desktop"));
    }
}
