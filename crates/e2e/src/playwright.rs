//! Playwright browser automation: script generation and result parsing

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use shopheal_common::{BrowserProject, Error, FailureEvidence, Result};

use crate::spec::{TestSpec, TestStep, WaitState};

/// Outcome of one case under one browser project.
#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub project: String,
    pub success: bool,
    pub duration_ms: u64,
    pub evidence: Option<FailureEvidence>,
}

/// JSON result line emitted by the generated Node script.
#[derive(Debug, Deserialize)]
struct ScriptResult {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    stack: Option<String>,
}

static SELECTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"waiting for (?:locator|selector)\s*\(?['"]([^'"]+)['"]\)?"#)
        .expect("valid regex")
});
static EXPECTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Expected(?: string| substring| pattern| value)?: "?([^\n"]+)"?"#)
        .expect("valid regex")
});
static RECEIVED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Received(?: string| value)?: "?([^\n"]+)"?"#).expect("valid regex")
});

/// Playwright driver for one storefront target.
pub struct PlaywrightHandle {
    /// Base URL of the storefront
    base_url: String,

    /// Directory for failure screenshots
    screenshot_dir: PathBuf,

    /// Saved authenticated storage state, established once per session
    storage_state: Option<PathBuf>,
}

impl PlaywrightHandle {
    pub fn new(
        base_url: impl Into<String>,
        screenshot_dir: impl Into<PathBuf>,
        storage_state: Option<PathBuf>,
    ) -> Result<Self> {
        let screenshot_dir = screenshot_dir.into();
        std::fs::create_dir_all(&screenshot_dir)?;

        Ok(Self {
            base_url: base_url.into(),
            screenshot_dir,
            storage_state,
        })
    }

    /// Check that the Playwright toolchain is available.
    pub fn check_installed() -> Result<()> {
        let status = std::process::Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(Error::PlaywrightNotFound),
        }
    }

    /// Run one case under one browser project.
    pub async fn run_case(
        &self,
        spec: &TestSpec,
        project: &BrowserProject,
    ) -> Result<ProjectOutcome> {
        let start = Instant::now();
        let script = self.build_script(spec, project);

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("case.js");
        std::fs::write(&script_path, &script)?;

        debug!(case = %spec.name, project = %project.name, "running Playwright script");

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::RunnerUnavailable(format!("failed to spawn node: {e}")))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match parse_result_line(&stdout) {
            Some(result) if result.success => Ok(ProjectOutcome {
                project: project.name.clone(),
                success: true,
                duration_ms,
                evidence: None,
            }),
            Some(result) => {
                let message = result.error.unwrap_or_else(|| "unknown error".to_string());
                let evidence = self.build_evidence(spec, project, &message, result.stack);
                Ok(ProjectOutcome {
                    project: project.name.clone(),
                    success: false,
                    duration_ms,
                    evidence: Some(evidence),
                })
            }
            None if output.status.success() => {
                // The script ran but printed no result line; treat as a driver
                // fault rather than a case verdict.
                Err(Error::Playwright(format!(
                    "no result line in script output for '{}'",
                    spec.name
                )))
            }
            None => {
                warn!(case = %spec.name, project = %project.name, "script crashed without result line");
                let message = if stderr.trim().is_empty() {
                    format!("script exited with {}", output.status)
                } else {
                    stderr.trim().to_string()
                };
                let evidence = self.build_evidence(spec, project, &message, None);
                Ok(ProjectOutcome {
                    project: project.name.clone(),
                    success: false,
                    duration_ms,
                    evidence: Some(evidence),
                })
            }
        }
    }

    fn build_evidence(
        &self,
        spec: &TestSpec,
        project: &BrowserProject,
        message: &str,
        stack: Option<String>,
    ) -> FailureEvidence {
        let screenshot = self.failure_screenshot_path(spec, project);
        FailureEvidence {
            error_message: message.to_string(),
            stack_trace: stack,
            artifact: screenshot.exists().then_some(screenshot),
            selector: extract_selector(message),
            actual: RECEIVED_RE
                .captures(message)
                .map(|c| c[1].trim().to_string()),
            expected: EXPECTED_RE
                .captures(message)
                .map(|c| c[1].trim().to_string()),
            project: Some(project.name.clone()),
        }
    }

    fn failure_screenshot_path(&self, spec: &TestSpec, project: &BrowserProject) -> PathBuf {
        self.screenshot_dir
            .join(format!("{}-{}-failure.png", spec.name, project.name))
    }

    /// Build the Node script for a case under a project.
    pub fn build_script(&self, spec: &TestSpec, project: &BrowserProject) -> String {
        let mut script = String::new();

        let storage_state = self
            .storage_state
            .as_ref()
            .map(|p| format!("storageState: '{}', ", p.to_string_lossy()))
            .unwrap_or_default();

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');
const {{ expect }} = require('@playwright/test');

(async () => {{
  const browser = await {browser}.launch({{ headless: true }});
  const context = await browser.newContext({{
    {storage_state}viewport: {{ width: {width}, height: {height} }},
    isMobile: {mobile}
  }});
  const page = await context.newPage();
  const baseUrl = '{base_url}';

  try {{
"#,
            browser = project.browser.as_str(),
            storage_state = storage_state,
            width = project.viewport.width,
            height = project.viewport.height,
            mobile = project.mobile && project.browser != shopheal_common::Browser::Firefox,
            base_url = self.base_url,
        ));

        for (i, step) in spec.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step_name(step)));
            script.push_str(&self.step_to_js(step));
            script.push('\n');
        }

        let failure_screenshot = self
            .failure_screenshot_path(spec, project)
            .to_string_lossy()
            .to_string();

        script.push_str(&format!(
            r#"
    console.log(JSON.stringify({{ success: true }}));
  }} catch (error) {{
    try {{ await page.screenshot({{ path: '{failure_screenshot}' }}); }} catch (_) {{}}
    console.log(JSON.stringify({{ success: false, error: error.message, stack: error.stack }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#
        ));

        script
    }

    fn step_to_js(&self, step: &TestStep) -> String {
        match step {
            TestStep::Navigate {
                url,
                wait_for_selector,
            } => {
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| {
                        format!(
                            "\n    await page.waitForSelector('{}');",
                            js_escape(s)
                        )
                    })
                    .unwrap_or_default();
                format!(
                    "    await page.goto(baseUrl + '{}');{}",
                    js_escape(url),
                    wait
                )
            }
            TestStep::Click {
                selector,
                timeout_ms,
            } => {
                let timeout = timeout_ms.unwrap_or(5000);
                format!(
                    "    await page.click('{}', {{ timeout: {} }});",
                    js_escape(selector),
                    timeout
                )
            }
            TestStep::Fill { selector, value } => format!(
                "    await page.fill('{}', '{}');",
                js_escape(selector),
                js_escape(value)
            ),
            TestStep::Select { selector, value } => format!(
                "    await page.selectOption('{}', '{}');",
                js_escape(selector),
                js_escape(value)
            ),
            TestStep::Wait {
                selector,
                timeout_ms,
                state,
            } => {
                let state_str = match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                };
                format!(
                    "    await page.waitForSelector('{}', {{ state: '{}', timeout: {} }});",
                    js_escape(selector),
                    state_str,
                    timeout_ms
                )
            }
            TestStep::WaitForResponse {
                url_contains,
                timeout_ms,
            } => format!(
                "    await page.waitForResponse(r => r.url().includes('{}'), {{ timeout: {} }});",
                js_escape(url_contains),
                timeout_ms
            ),
            TestStep::Sleep { ms } => format!("    await page.waitForTimeout({});", ms),
            TestStep::Evaluate { script, .. } => {
                format!("    await page.evaluate(() => {{ {} }});", script)
            }
            TestStep::Assert {
                selector,
                visible,
                text,
                text_contains,
                text_pattern,
                count,
            } => {
                let locator = format!("page.locator('{}')", js_escape(selector));
                let mut assertions = Vec::new();

                if let Some(visible) = visible {
                    let matcher = if *visible { "toBeVisible" } else { "toBeHidden" };
                    assertions.push(format!("    await expect({locator}).{matcher}();"));
                }
                if let Some(text) = text {
                    assertions.push(format!(
                        "    await expect({locator}).toHaveText('{}');",
                        js_escape(text)
                    ));
                }
                if let Some(contains) = text_contains {
                    assertions.push(format!(
                        "    await expect({locator}).toContainText('{}');",
                        js_escape(contains)
                    ));
                }
                if let Some(pattern) = text_pattern {
                    assertions.push(format!(
                        "    await expect({locator}).toHaveText(new RegExp(\"{}\"));",
                        pattern.replace('"', "\\\"")
                    ));
                }
                if let Some(count) = count {
                    assertions.push(format!(
                        "    await expect({locator}).toHaveCount({count});"
                    ));
                }

                assertions.join("\n")
            }
            TestStep::Screenshot { name, full_page } => {
                let path = self.screenshot_dir.join(format!("{}.png", name));
                format!(
                    "    await page.screenshot({{ path: '{}', fullPage: {} }});",
                    path.to_string_lossy(),
                    full_page
                )
            }
            TestStep::Hover { selector } => {
                format!("    await page.hover('{}');", js_escape(selector))
            }
            TestStep::Press { selector, key } => match selector {
                Some(selector) => format!(
                    "    await page.locator('{}').press('{}');",
                    js_escape(selector),
                    js_escape(key)
                ),
                None => format!("    await page.keyboard.press('{}');", js_escape(key)),
            },
            TestStep::ClearCart => {
                "    await page.request.post(baseUrl + '/cart/clear.js');".to_string()
            }
        }
    }
}

fn step_name(step: &TestStep) -> String {
    match step {
        TestStep::Navigate { url, .. } => format!("navigate:{}", url),
        TestStep::Click { selector, .. } => format!("click:{}", selector),
        TestStep::Fill { selector, .. } => format!("fill:{}", selector),
        TestStep::Select { selector, .. } => format!("select:{}", selector),
        TestStep::Wait { selector, .. } => format!("wait:{}", selector),
        TestStep::WaitForResponse { url_contains, .. } => {
            format!("wait_for_response:{}", url_contains)
        }
        TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
        TestStep::Evaluate { .. } => "evaluate".to_string(),
        TestStep::Assert { selector, .. } => format!("assert:{}", selector),
        TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
        TestStep::Hover { selector } => format!("hover:{}", selector),
        TestStep::Press { key, .. } => format!("press:{}", key),
        TestStep::ClearCart => "clear_cart".to_string(),
    }
}

fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Find the last line of script output that parses as a result record.
fn parse_result_line(stdout: &str) -> Option<ScriptResult> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<ScriptResult>(line.trim()).ok())
}

/// Pull the selector out of Playwright error text, when present.
fn extract_selector(message: &str) -> Option<String> {
    SELECTOR_RE.captures(message).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> PlaywrightHandle {
        PlaywrightHandle {
            base_url: "https://demo-store.myshopify.com".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            storage_state: Some(PathBuf::from("test-results/storage-state.json")),
        }
    }

    fn sample_spec() -> TestSpec {
        TestSpec {
            name: "plp-sorting".to_string(),
            description: String::new(),
            tags: vec![],
            steps: vec![
                TestStep::Navigate {
                    url: "/collections/all".to_string(),
                    wait_for_selector: Some("[data-testid=\"product-grid\"]".to_string()),
                },
                TestStep::Select {
                    selector: "[data-testid=\"sort-by\"]".to_string(),
                    value: "price-ascending".to_string(),
                },
                TestStep::Assert {
                    selector: "[data-testid=\"product-card\"]".to_string(),
                    visible: None,
                    text: None,
                    text_contains: None,
                    text_pattern: None,
                    count: Some(24),
                },
            ],
            path: None,
        }
    }

    #[test]
    fn test_script_includes_storage_state_and_viewport() {
        let script = handle().build_script(&sample_spec(), &BrowserProject::mobile_safari());
        assert!(script.contains("webkit.launch"));
        assert!(script.contains("storageState: 'test-results/storage-state.json'"));
        assert!(script.contains("width: 390"));
        assert!(script.contains("isMobile: true"));
    }

    #[test]
    fn test_script_steps_in_order() {
        let script = handle().build_script(&sample_spec(), &BrowserProject::chromium_desktop());
        let goto = script.find("page.goto(baseUrl + '/collections/all')").unwrap();
        let select = script.find("page.selectOption").unwrap();
        let count = script.find("toHaveCount(24)").unwrap();
        assert!(goto < select && select < count);
    }

    #[test]
    fn test_clear_cart_uses_storefront_endpoint() {
        let spec = TestSpec {
            name: "reset".to_string(),
            description: String::new(),
            tags: vec![],
            steps: vec![TestStep::ClearCart],
            path: None,
        };
        let script = handle().build_script(&spec, &BrowserProject::chromium_desktop());
        assert!(script.contains("/cart/clear.js"));
    }

    #[test]
    fn test_parse_result_line_takes_last_json() {
        let stdout = "noise\n{\"success\":false,\"error\":\"boom\"}\n";
        let result = parse_result_line(stdout).unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_extract_selector_from_timeout_error() {
        let message =
            "Timeout 5000ms exceeded.\nwaiting for locator('.product-grid .card >> nth=2')";
        assert_eq!(
            extract_selector(message).as_deref(),
            Some(".product-grid .card >> nth=2")
        );
    }

    #[test]
    fn test_expected_received_extraction() {
        let message = "Expected string: \"24 products\"\nReceived string: \"12 products\"";
        let expected = EXPECTED_RE.captures(message).map(|c| c[1].trim().to_string());
        let actual = RECEIVED_RE.captures(message).map(|c| c[1].trim().to_string());
        assert_eq!(expected.as_deref(), Some("24 products"));
        assert_eq!(actual.as_deref(), Some("12 products"));
    }
}
