//! shopheal Common Library
//!
//! Shared data model and error handling for the shopheal workspace.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// shopheal version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
