//! `shopheal specs` - list discovered case specs

use clap::Args;
use serde::Serialize;

use shopheal_e2e::TestSpec;

use crate::commands::Context;
use crate::output::{self, TableDisplay};

#[derive(Args, Debug)]
pub struct SpecsArgs {
    /// Show only the spec with this name
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct SpecRow {
    name: String,
    description: String,
    tags: Vec<String>,
    steps: usize,
}

impl TableDisplay for SpecRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Description", "Tags", "Steps"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.description.clone(),
            self.tags.join(", "),
            self.steps.to_string(),
        ]
    }
}

pub fn execute(args: SpecsArgs, ctx: &Context) -> anyhow::Result<()> {
    let specs = TestSpec::load_all(&ctx.specs_dir)?;

    let rows: Vec<SpecRow> = specs
        .iter()
        .filter(|s| args.name.as_ref().map_or(true, |n| &s.name == n))
        .map(|s| SpecRow {
            name: s.name.clone(),
            description: s.description.clone(),
            tags: s.tags.clone(),
            steps: s.steps.len(),
        })
        .collect();

    output::print_list(&rows, ctx.format);
    Ok(())
}
