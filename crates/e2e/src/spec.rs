//! Declarative YAML case specification for storefront tests

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use shopheal_common::{CaseId, Error, Result};

/// A complete test case parsed from YAML. Immutable during a run; the fix
/// applier rewrites the step list between attempts and persists it back to
/// the source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this case
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering cases
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,

    /// Source file the spec was loaded from; set by the loader, never
    /// serialized.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// A single step in a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to the storefront base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Select an option from a dropdown (e.g. the collection sort menu)
    Select { selector: String, value: String },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait for a specific network exchange (URL substring match)
    WaitForResponse {
        url_contains: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Fixed delay. Legacy step: the timing fix strategy removes these and
    /// never reintroduces them.
    Sleep { ms: u64 },

    /// Poll page state with custom JavaScript. Legacy step: the timing fix
    /// strategy replaces these with retrying assertions.
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    /// Assert something about an element (retrying assertion)
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        /// Regex alternative to `text` for dynamic values
        #[serde(default)]
        text_pattern: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    /// Hover over an element
    Hover { selector: String },

    /// Press a key, optionally on an element
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Reset the cart via the storefront's /cart/clear endpoint so the case
    /// does not depend on execution order
    ClearCart,
}

fn default_wait_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl TestSpec {
    pub fn id(&self) -> CaseId {
        CaseId::new(self.name.clone())
    }

    /// Parse a spec from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Parse a spec from a YAML file, remembering its source path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)?;
        spec.path = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Load all specs from a directory tree
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Persist the (possibly rewritten) spec back to its source file
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or_else(|| {
            Error::SpecParse(format!("spec '{}' has no source path to save to", self.name))
        })?;
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection_sorting_spec() {
        let yaml = r#"
name: plp-sort-price-ascending
description: Sorting the collection page by price, low to high
tags:
  - plp
  - sorting
steps:
  - action: navigate
    url: /collections/all
    wait_for_selector: '[data-testid="product-grid"]'
  - action: select
    selector: '[data-testid="sort-by"]'
    value: price-ascending
  - action: wait_for_response
    url_contains: sort_by=price-ascending
  - action: assert
    selector: '[data-testid="product-card"]'
    count: 24
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "plp-sort-price-ascending");
        assert_eq!(spec.steps.len(), 4);
        assert!(spec.tags.contains(&"sorting".to_string()));
        assert!(matches!(spec.steps[1], TestStep::Select { .. }));
    }

    #[test]
    fn test_parse_cart_spec_with_reset() {
        let yaml = r#"
name: cart-add-single-product
steps:
  - action: clear_cart
  - action: navigate
    url: /products/classic-tee
  - action: click
    selector: 'role=button[name=/add to cart/i]'
  - action: assert
    selector: '[data-testid="cart-count"]'
    text: "1"
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.steps[0], TestStep::ClearCart);
        assert!(spec.description.is_empty());
    }

    #[test]
    fn test_yaml_round_trip_preserves_steps() {
        let yaml = r#"
name: pagination-next
steps:
  - action: navigate
    url: /collections/all
  - action: click
    selector: 'role=link[name="Next page"]'
  - action: assert
    selector: '[data-testid="page-indicator"]'
    text_pattern: 'Page \d+ of \d+'
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        let rendered = serde_yaml::to_string(&spec).unwrap();
        let reparsed = TestSpec::from_yaml(&rendered).unwrap();
        assert_eq!(spec.steps, reparsed.steps);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.yaml");
        std::fs::write(&path, "name: sample\nsteps:\n  - action: clear_cart\n").unwrap();

        let mut spec = TestSpec::from_file(&path).unwrap();
        spec.steps.push(TestStep::Navigate {
            url: "/collections/all".to_string(),
            wait_for_selector: None,
        });
        spec.save().unwrap();

        let reloaded = TestSpec::from_file(&path).unwrap();
        assert_eq!(reloaded.steps.len(), 2);
    }
}
