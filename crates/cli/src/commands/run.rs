//! `shopheal run` - one suite pass without healing

use clap::Args;
use serde::Serialize;

use shopheal_common::{CaseId, CaseStatus};
use shopheal_e2e::StorefrontRunner;
use shopheal_healer::SuiteRunner;

use crate::commands::Context;
use crate::output::{self, status_glyph, TableDisplay};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run only cases matching this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only a specific case by name
    #[arg(short, long)]
    pub case: Option<String>,
}

#[derive(Serialize)]
struct CaseRow {
    case: String,
    status: CaseStatus,
    duration_ms: u64,
    error: Option<String>,
}

impl TableDisplay for CaseRow {
    fn headers() -> Vec<&'static str> {
        vec!["", "Case", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            status_glyph(self.status == CaseStatus::Passed),
            self.case.clone(),
            format!("{} ms", self.duration_ms),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(args: RunArgs, ctx: &Context) -> anyhow::Result<bool> {
    let mut runner = ctx.runner().await?;
    let cases = select_cases(&runner, args.tag.as_deref(), args.case.as_deref())?;

    let result = runner.run(&cases).await?;

    let rows: Vec<CaseRow> = result
        .outcomes
        .iter()
        .map(|(id, outcome)| CaseRow {
            case: id.to_string(),
            status: outcome.status,
            duration_ms: outcome.duration_ms,
            error: outcome
                .evidence
                .as_ref()
                .map(|e| truncate(&e.error_message, 80)),
        })
        .collect();
    output::print_list(&rows, ctx.format);

    let summary = StorefrontRunner::summarize(result);
    runner.write_summary(&summary)?;

    if summary.failed == 0 {
        output::print_success(&format!("{} case(s) passed", summary.passed));
        Ok(true)
    } else {
        output::print_failure(&format!(
            "{} of {} case(s) failed",
            summary.failed, summary.total
        ));
        Ok(false)
    }
}

pub(crate) fn select_cases(
    runner: &StorefrontRunner,
    tag: Option<&str>,
    case: Option<&str>,
) -> anyhow::Result<Vec<CaseId>> {
    let cases = match (case, tag) {
        (Some(name), _) => vec![CaseId::new(name)],
        (None, Some(tag)) => runner.discover_tagged(tag)?,
        (None, None) => runner.discover_cases()?,
    };
    if cases.is_empty() {
        anyhow::bail!("no cases matched the selection");
    }
    Ok(cases)
}

fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max {
        first_line.to_string()
    } else {
        let head: String = first_line.chars().take(max).collect();
        format!("{head}…")
    }
}
