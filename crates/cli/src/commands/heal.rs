//! `shopheal heal` - full healing session

use std::time::Duration;

use clap::Args;
use serde::Serialize;

use shopheal_e2e::SpecFixApplier;
use shopheal_healer::{
    HealingController, HealingSession, SessionConfig, SessionOutcome, TerminationCause,
};

use crate::commands::{run::select_cases, Context};
use crate::output::{self, TableDisplay};

#[derive(Args, Debug)]
pub struct HealArgs {
    /// Heal only cases matching this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Heal only a specific case by name
    #[arg(short, long)]
    pub case: Option<String>,

    /// Maximum number of full suite runs before giving up
    #[arg(long, default_value = "5")]
    pub max_attempts: u32,

    /// Wall-clock budget for the whole session, in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(Serialize)]
struct AttemptRow {
    attempt: u32,
    passed: usize,
    failed: usize,
    remediations: usize,
}

impl TableDisplay for AttemptRow {
    fn headers() -> Vec<&'static str> {
        vec!["Attempt", "Passed", "Failed", "Remediations"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.attempt.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
            self.remediations.to_string(),
        ]
    }
}

pub async fn execute(args: HealArgs, ctx: &Context) -> anyhow::Result<bool> {
    let runner = ctx.runner().await?;
    let cases = select_cases(&runner, args.tag.as_deref(), args.case.as_deref())?;

    let applier = SpecFixApplier::new(ctx.specs_dir.clone());
    let mut controller = HealingController::new(runner, applier);

    let config = SessionConfig {
        max_attempts: args.max_attempts,
        deadline: args.deadline_secs.map(Duration::from_secs),
    };
    let session = controller.run_session(&cases, &config).await?;

    render(&session, ctx);
    write_report(&session, ctx)?;

    Ok(session.outcome == SessionOutcome::AllPassed)
}

fn render(session: &HealingSession, ctx: &Context) {
    let rows: Vec<AttemptRow> = session
        .attempts
        .iter()
        .map(|a| AttemptRow {
            attempt: a.number,
            passed: a.passed,
            failed: a.failed,
            remediations: a.remediations.len(),
        })
        .collect();
    output::print_list(&rows, ctx.format);

    match session.outcome {
        SessionOutcome::AllPassed => {
            output::print_success(&format!(
                "suite healed: all cases pass after {} attempt(s), {} remediation(s)",
                session.attempts_run(),
                session.total_remediations()
            ));
        }
        SessionOutcome::BudgetExhausted => {
            let cause = match session.termination {
                Some(TerminationCause::DeadlineExceeded) => "wall-clock deadline exceeded",
                _ => "attempt budget exhausted",
            };
            output::print_failure(&format!(
                "healing stopped ({cause}) with {} unresolved case(s)",
                session.unresolved.len()
            ));

            for entry in &session.unresolved {
                println!();
                println!("  case:     {}", entry.case);
                println!("  category: {}", entry.category);
                println!("  error:    {}", entry.last_error.lines().next().unwrap_or(""));
                println!("  investigate:");
                for suggestion in &entry.investigation_suggestions {
                    println!("    - {suggestion}");
                }
                println!("  try:");
                for command in &entry.recommended_commands {
                    println!("    $ {command}");
                }
            }
        }
    }
}

fn write_report(session: &HealingSession, ctx: &Context) -> anyhow::Result<()> {
    std::fs::create_dir_all(&ctx.output_dir)?;
    let path = ctx.output_dir.join("healing-report.json");
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(&path, json)?;
    tracing::info!("healing report written to {}", path.display());
    Ok(())
}
