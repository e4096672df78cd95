//! Healing session report model

use serde::{Deserialize, Serialize};

use shopheal_common::{CaseId, FailureCategory, Remediation};

/// Terminal status of a healing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    AllPassed,
    BudgetExhausted,
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::AllPassed => write!(f, "all-passed"),
            SessionOutcome::BudgetExhausted => write!(f, "budget-exhausted"),
        }
    }
}

/// Why a BudgetExhausted session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCause {
    AttemptsExhausted,
    DeadlineExceeded,
}

/// One full execution of all cases plus the remediations it triggered.
/// Immutable once recorded; remediations only name cases that were in this
/// attempt's failing set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingAttempt {
    pub number: u32,
    pub passed: usize,
    pub failed: usize,
    pub remediations: Vec<Remediation>,
}

/// A case still failing when the budget ran out, with enough evidence for a
/// human to reproduce the failure without re-running the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedCase {
    pub case: CaseId,
    pub last_error: String,
    pub category: FailureCategory,
    pub investigation_suggestions: Vec<String>,
    pub recommended_commands: Vec<String>,
}

/// Complete record of one healing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingSession {
    pub session_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub outcome: SessionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationCause>,
    pub attempts: Vec<HealingAttempt>,
    pub unresolved: Vec<UnresolvedCase>,
}

impl HealingSession {
    pub fn attempts_run(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn total_remediations(&self) -> usize {
        self.attempts.iter().map(|a| a.remediations.len()).sum()
    }
}

/// Ordered investigation steps for a category, most likely first.
pub fn investigation_suggestions(category: FailureCategory) -> Vec<String> {
    let steps: &[&str] = match category {
        FailureCategory::SelectorMismatch => &[
            "open the failure screenshot and check whether the element rendered at all",
            "inspect the storefront markup for a renamed class or data attribute",
            "switch the lookup to an accessible role/label before touching timeouts",
        ],
        FailureCategory::TimingRace => &[
            "check whether the step raced a theme animation or a deferred section render",
            "look for fixed sleeps in the case and remove them",
            "confirm the assertion retries instead of sampling state once",
        ],
        FailureCategory::StateIsolation => &[
            "run the case alone and compare against the full-suite run",
            "check which earlier case leaves items in the cart",
            "make the case reset the cart itself instead of assuming it is empty",
        ],
        FailureCategory::AssertionMismatch => &[
            "compare actual vs expected: is the difference a price, count, or copy change?",
            "decide whether the storefront changed or the expectation is stale",
            "if the value is dynamic, assert on a pattern rather than a literal",
        ],
        FailureCategory::EnvironmentOrAuth => &[
            "verify the storefront password and the saved session state are still valid",
            "re-establish the session and confirm the storage state file is written",
            "check for an expired preview link or a theme publish changing the URL",
        ],
        FailureCategory::Unknown => &[
            "read the full error text and stack trace",
            "open the failure screenshot",
            "re-run the single case with debug logging",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

/// Copy-paste commands to reproduce and inspect the failure.
pub fn recommended_commands(case: &CaseId, project: Option<&str>) -> Vec<String> {
    let mut commands = vec![format!("shopheal run --case {}", case)];
    if let Some(project) = project {
        commands.push(format!("shopheal run --case {} --project {}", case, project));
    }
    commands.push(format!("shopheal specs --name {}", case));
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions_cover_every_category() {
        for category in FailureCategory::ALL {
            assert!(
                !investigation_suggestions(category).is_empty(),
                "no suggestions for {category}"
            );
        }
    }

    #[test]
    fn test_recommended_commands_include_project() {
        let commands = recommended_commands(&CaseId::from("plp-sorting"), Some("mobile-safari"));
        assert!(commands.iter().any(|c| c.contains("--project mobile-safari")));
        assert!(commands[0].contains("--case plp-sorting"));
    }
}
