//! Healing controller: owns the attempt budget and the termination decision

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shopheal_common::{CaseId, FailureEvidence, Remediation, Result, RunResult};

use crate::classifier::{Classification, Classifier};
use crate::report::{
    investigation_suggestions, recommended_commands, HealingAttempt, HealingSession,
    SessionOutcome, TerminationCause, UnresolvedCase,
};
use crate::{FixApplier, FixOutcome, SuiteRunner};

/// Budget for one healing session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of full suite runs before giving up.
    pub max_attempts: u32,

    /// Optional wall-clock budget. Exceeding it ends the session as
    /// BudgetExhausted with a DeadlineExceeded cause.
    pub deadline: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            deadline: None,
        }
    }
}

/// Drives the run/classify/repair loop.
///
/// One attempt fully completes (run all cases, classify all failures, apply
/// all fixes) before the next starts, because each attempt's outcome depends
/// on the source mutations of the previous one. The controller sequences
/// calls and records the attempt trail; all source mutation happens behind
/// the [`FixApplier`] boundary.
pub struct HealingController<R, F> {
    runner: R,
    applier: F,
    classifier: Classifier,
}

impl<R, F> HealingController<R, F>
where
    R: SuiteRunner + Send,
    F: FixApplier + Send,
{
    pub fn new(runner: R, applier: F) -> Self {
        Self {
            runner,
            applier,
            classifier: Classifier::new(),
        }
    }

    /// Run one bounded healing session over the given cases.
    ///
    /// Returns `Err` only for infrastructure failures (the runner itself
    /// could not execute); per-case test failures and per-case fix failures
    /// never abort the session.
    pub async fn run_session(
        &mut self,
        cases: &[CaseId],
        config: &SessionConfig,
    ) -> Result<HealingSession> {
        let started = Instant::now();
        let started_at = chrono::Utc::now();
        let session_id = Uuid::new_v4().to_string();

        info!(
            session = %session_id,
            cases = cases.len(),
            max_attempts = config.max_attempts,
            "starting healing session"
        );

        let mut attempts: Vec<HealingAttempt> = Vec::new();
        let mut last_failing: Vec<(CaseId, FailureEvidence, Classification)> = Vec::new();
        let mut outcome = SessionOutcome::BudgetExhausted;
        let mut termination = Some(TerminationCause::AttemptsExhausted);

        for number in 1..=config.max_attempts {
            if let Some(deadline) = config.deadline {
                if started.elapsed() >= deadline {
                    warn!(
                        session = %session_id,
                        attempt = number,
                        "wall-clock budget exceeded before attempt started"
                    );
                    termination = Some(TerminationCause::DeadlineExceeded);
                    break;
                }
            }

            debug!(session = %session_id, attempt = number, "running full case set");
            let run = self.runner.run(cases).await.map_err(|e| {
                error!(session = %session_id, attempt = number, error = %e, "runner failed");
                e
            })?;

            let failing = run.failing();
            if failing.is_empty() {
                attempts.push(HealingAttempt {
                    number,
                    passed: run.passed_count(),
                    failed: 0,
                    remediations: Vec::new(),
                });
                info!(session = %session_id, attempt = number, "all cases passed");
                outcome = SessionOutcome::AllPassed;
                termination = None;
                last_failing.clear();
                break;
            }

            info!(
                session = %session_id,
                attempt = number,
                passed = run.passed_count(),
                failed = failing.len(),
                "attempt had failures, classifying"
            );

            let classified: Vec<(CaseId, FailureEvidence, Classification)> = failing
                .into_iter()
                .map(|(case, evidence)| {
                    let classification = self.classifier.classify(&evidence);
                    debug!(case = %case, category = %classification.category, "classified failure");
                    (case, evidence, classification)
                })
                .collect();

            let remediations = self.heal_batch(&classified).await;
            last_failing = classified;

            attempts.push(HealingAttempt {
                number,
                passed: run.passed_count(),
                failed: run.failed_count(),
                remediations,
            });
        }

        let unresolved = build_unresolved(&last_failing);
        let session = HealingSession {
            session_id,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            outcome,
            termination,
            attempts,
            unresolved,
        };

        info!(
            session = %session.session_id,
            outcome = %session.outcome,
            attempts = session.attempts_run(),
            remediations = session.total_remediations(),
            "healing session finished"
        );

        Ok(session)
    }

    /// Remediate every classified failure of the current attempt. Per-case
    /// failures are isolated: one broken fix never blocks the rest of the
    /// batch.
    async fn heal_batch(
        &mut self,
        failing: &[(CaseId, FailureEvidence, Classification)],
    ) -> Vec<Remediation> {
        let mut remediations = Vec::new();

        for (case, evidence, classification) in failing {
            match self.applier.apply(case, classification, evidence).await {
                Ok(FixOutcome::Applied { description }) => {
                    info!(case = %case, category = %classification.category, fix = %description, "fix applied");
                    remediations.push(Remediation {
                        case: case.clone(),
                        category: classification.category,
                        description,
                    });
                }
                Ok(FixOutcome::Declined { reason }) => {
                    info!(case = %case, category = %classification.category, reason = %reason, "fix declined");
                }
                Err(e) => {
                    warn!(case = %case, error = %e, "fix application failed, continuing with batch");
                }
            }
        }

        remediations
    }
}

fn build_unresolved(
    last_failing: &[(CaseId, FailureEvidence, Classification)],
) -> Vec<UnresolvedCase> {
    last_failing
        .iter()
        .map(|(case, evidence, classification)| UnresolvedCase {
            case: case.clone(),
            last_error: evidence.error_message.clone(),
            category: classification.category,
            investigation_suggestions: investigation_suggestions(classification.category),
            recommended_commands: recommended_commands(case, evidence.project.as_deref()),
        })
        .collect()
}
