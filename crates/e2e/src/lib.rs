//! shopheal E2E layer
//!
//! Rust-controlled Playwright testing of a live Shopify storefront theme:
//! - Parses declarative YAML case specs (navigation, sorting, pagination,
//!   cart flows)
//! - Generates and runs Playwright scripts per (case, browser project)
//! - Establishes the password-gated storefront session once, up front
//! - Implements the healing core's collaborator boundaries: the suite runner
//!   and the spec-mutating fix applier
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StorefrontRunner (SuiteRunner)                              │
//! │    ├── StorefrontSession::establish() -> auth storage state  │
//! │    ├── for case × project: PlaywrightHandle::run_case()      │
//! │    └── aggregate: failed in any project => case Failed       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  SpecFixApplier (FixApplier)                                 │
//! │    └── per-category SpecFixStrategy -> rewritten YAML spec   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod fix;
pub mod playwright;
pub mod runner;
pub mod session;
pub mod spec;

pub use fix::SpecFixApplier;
pub use playwright::{PlaywrightHandle, ProjectOutcome};
pub use runner::{RunnerConfig, StorefrontRunner};
pub use session::{StorefrontConfig, StorefrontSession};
pub use spec::{TestSpec, TestStep};
