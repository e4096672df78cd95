//! Storefront session management: reachability probe and the one-time
//! password-gate login that produces the shared storage state.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use shopheal_common::{Error, Result};

/// Configuration for establishing a storefront session.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Base URL of the storefront under test
    pub base_url: String,

    /// Storefront password, when the shop is password-gated
    pub password: Option<String>,

    /// Directory the storage state file is written to
    pub state_dir: PathBuf,

    /// Timeout for the reachability probe
    pub probe_timeout: Duration,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9292".to_string(),
            password: None,
            state_dir: PathBuf::from("test-results"),
            probe_timeout: Duration::from_secs(30),
        }
    }
}

/// Read-only handle to an established storefront session. Threaded into
/// every generated script; cases never handle credentials themselves.
#[derive(Debug, Clone)]
pub struct StorefrontSession {
    base_url: String,
    storage_state: Option<PathBuf>,
}

impl StorefrontSession {
    /// Probe the storefront and, when it is password-gated, log in once and
    /// save the authenticated storage state.
    pub async fn establish(config: &StorefrontConfig) -> Result<Self> {
        wait_for_reachable(&config.base_url, config.probe_timeout).await?;

        let storage_state = match &config.password {
            Some(password) => {
                Some(pass_password_gate(&config.base_url, password, &config.state_dir).await?)
            }
            None => {
                debug!("no storefront password configured, skipping gate login");
                None
            }
        };

        Ok(Self {
            base_url: config.base_url.clone(),
            storage_state,
        })
    }

    /// Session for an already-open storefront; used by tests.
    pub fn unauthenticated(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            storage_state: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage_state(&self) -> Option<&PathBuf> {
        self.storage_state.as_ref()
    }
}

/// Wait until the storefront answers HTTP at all. Redirects to the password
/// page still count as reachable; only connection-level failures keep us
/// waiting.
async fn wait_for_reachable(base_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0usize;

    while start.elapsed() < timeout {
        attempts += 1;

        match client.get(base_url).send().await {
            Ok(resp) if resp.status().is_server_error() => {
                warn!("storefront returned {}", resp.status());
            }
            Ok(_) => {
                info!("storefront reachable at {}", base_url);
                return Ok(());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("waiting for storefront at {}...", base_url);
                }
                if !e.is_connect() && !e.is_timeout() {
                    warn!("storefront probe error: {}", e);
                }
            }
        }

        sleep(Duration::from_millis(500)).await;
    }

    Err(Error::StorefrontUnreachable {
        url: base_url.to_string(),
        reason: format!("no response after {attempts} probes"),
    })
}

/// Log in through the storefront password gate once and persist the
/// authenticated storage state for every later case run.
async fn pass_password_gate(
    base_url: &str,
    password: &str,
    state_dir: &std::path::Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(state_dir)?;
    let state_path = state_dir.join("storage-state.json");

    let script = login_script(base_url, password, &state_path);
    let temp_dir = tempfile::tempdir()?;
    let script_path = temp_dir.path().join("login.js");
    std::fs::write(&script_path, script)?;

    info!("establishing storefront session through the password gate");

    let output = tokio::process::Command::new("node")
        .arg(&script_path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::SessionSetup(format!("failed to spawn node: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::SessionSetup(format!(
            "password gate login failed: {}",
            stderr.trim()
        )));
    }

    if !state_path.exists() {
        return Err(Error::SessionSetup(
            "login script finished but wrote no storage state".to_string(),
        ));
    }

    info!("storage state saved to {}", state_path.display());
    Ok(state_path)
}

fn login_script(base_url: &str, password: &str, state_path: &std::path::Path) -> String {
    format!(
        r#"const {{ chromium }} = require('playwright');

(async () => {{
  const browser = await chromium.launch({{ headless: true }});
  const context = await browser.newContext();
  const page = await context.newPage();

  try {{
    await page.goto('{base_url}/password');
    await page.fill('input[name="password"]', '{password}');
    await page.click('button[type="submit"]');
    await page.waitForURL(url => !url.pathname.includes('password'));
    await context.storageState({{ path: '{state_path}' }});
  }} finally {{
    await browser.close();
  }}
}})();
"#,
        base_url = base_url,
        password = password.replace('\'', "\\'"),
        state_path = state_path.to_string_lossy(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_script_saves_storage_state() {
        let script = login_script(
            "https://demo-store.myshopify.com",
            "hunter2",
            std::path::Path::new("test-results/storage-state.json"),
        );
        assert!(script.contains("goto('https://demo-store.myshopify.com/password')"));
        assert!(script.contains("storageState({ path: 'test-results/storage-state.json' })"));
        assert!(script.contains("input[name=\"password\"]"));
    }

    #[test]
    fn test_unauthenticated_session_has_no_state() {
        let session = StorefrontSession::unauthenticated("http://127.0.0.1:9292");
        assert_eq!(session.base_url(), "http://127.0.0.1:9292");
        assert!(session.storage_state().is_none());
    }
}
