//! # FPM Common Library
//!
//! Shared code for the fingerprint matching service:
//! - Error type shared across crates
//! - TOML configuration schema, discovery and loading
//! - Atomic configuration write-back

pub mod config;
pub mod error;

pub use error::{Error, Result};
