//! CLI command implementations

pub mod heal;
pub mod run;
pub mod specs;

use std::path::PathBuf;

use shopheal_common::BrowserProject;
use shopheal_e2e::{RunnerConfig, StorefrontConfig, StorefrontRunner, StorefrontSession};

use crate::output::OutputFormat;

/// Shared command context assembled from the global CLI flags.
pub struct Context {
    pub storefront_url: String,
    pub password: Option<String>,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
    pub projects: Vec<BrowserProject>,
    pub format: OutputFormat,
}

impl Context {
    /// Establish the storefront session and build the runner.
    pub async fn runner(&self) -> anyhow::Result<StorefrontRunner> {
        let session = StorefrontSession::establish(&StorefrontConfig {
            base_url: self.storefront_url.clone(),
            password: self.password.clone(),
            state_dir: self.output_dir.clone(),
            ..Default::default()
        })
        .await?;

        let config = RunnerConfig {
            specs_dir: self.specs_dir.clone(),
            output_dir: self.output_dir.clone(),
            projects: self.projects.clone(),
        };

        Ok(StorefrontRunner::new(config, session)?)
    }
}

/// Resolve `--project` names against the known project matrix. No names
/// selects the full default matrix.
pub fn parse_projects(names: &[String]) -> anyhow::Result<Vec<BrowserProject>> {
    if names.is_empty() {
        return Ok(BrowserProject::default_matrix());
    }

    names
        .iter()
        .map(|name| {
            BrowserProject::default_matrix()
                .into_iter()
                .find(|p| p.name == *name)
                .ok_or_else(|| anyhow::anyhow!("unknown browser project: {name}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_projects_defaults_to_matrix() {
        let projects = parse_projects(&[]).unwrap();
        assert_eq!(projects.len(), 2);
    }

    #[test]
    fn test_parse_projects_rejects_unknown_name() {
        assert!(parse_projects(&["ie11".to_string()]).is_err());
    }

    #[test]
    fn test_parse_projects_selects_named() {
        let projects = parse_projects(&["mobile-safari".to_string()]).unwrap();
        assert_eq!(projects.len(), 1);
        assert!(projects[0].mobile);
    }
}
