//! shopheal Healing Core
//!
//! Drives the bounded run/classify/repair loop over an external test runner:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  HealingController                                           │
//! │    ├── SuiteRunner.run(all cases)      -> RunResult          │
//! │    ├── Classifier.classify(evidence)   -> Classification     │
//! │    ├── FixApplier.apply(case, class)   -> FixOutcome         │
//! │    └── repeat until AllPassed or the attempt budget is gone  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller owns the attempt budget and the termination decision; it
//! mutates nothing itself. The runner and the fix applier are collaborator
//! boundaries implemented elsewhere (see `shopheal-e2e`).

pub mod classifier;
pub mod controller;
pub mod report;

use async_trait::async_trait;

use shopheal_common::{CaseId, FailureEvidence, Result, RunResult};

pub use classifier::{Classification, Classifier};
pub use controller::{HealingController, SessionConfig};
pub use report::{
    HealingAttempt, HealingSession, SessionOutcome, TerminationCause, UnresolvedCase,
};

/// Executes a named set of cases to completion and reports per-case verdicts.
///
/// Contract: every case runs to completion (no short-circuit on first
/// failure) across every configured browser project, and a case failing in
/// any project is reported Failed. Implementations must not retry flaky
/// cases on their own; retry policy belongs to the healing loop.
///
/// A returned `Err` means the runner itself could not execute (infrastructure
/// failure) and is fatal to the whole session.
#[async_trait]
pub trait SuiteRunner {
    async fn run(&mut self, cases: &[CaseId]) -> Result<RunResult>;
}

/// Result of asking the fix applier to remediate one classified failure.
#[derive(Debug, Clone)]
pub enum FixOutcome {
    /// A source mutation was applied. The description goes into the
    /// remediation trail.
    Applied { description: String },

    /// No fix is available for this failure; the case re-runs unchanged.
    Declined { reason: String },
}

/// Applies a source-level fix for one classified failure.
///
/// Implementations dispatch on the failure category to a per-category
/// strategy. An `Err` is isolated to the case it was raised for; it never
/// aborts the other fixes in the same attempt.
#[async_trait]
pub trait FixApplier {
    async fn apply(
        &mut self,
        case: &CaseId,
        classification: &Classification,
        evidence: &FailureEvidence,
    ) -> Result<FixOutcome>;
}
