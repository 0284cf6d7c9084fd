//! jbodio Common - Shared types and utilities
//!
//! This crate provides the volume geometry, error definitions and
//! configuration used across all jbodio components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
