//! Error types for shopheal

use thiserror::Error;

/// Result type alias using the shopheal Error
pub type Result<T> = std::result::Result<T, Error>;

/// shopheal error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Case spec parse error: {0}")]
    SpecParse(String),

    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Storefront unreachable at {url}: {reason}")]
    StorefrontUnreachable { url: String, reason: String },

    #[error("Storefront session setup failed: {0}")]
    SessionSetup(String),

    #[error("Test runner unavailable: {0}")]
    RunnerUnavailable(String),

    #[error("Fix application failed for {case}: {reason}")]
    FixFailed { case: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),
}
