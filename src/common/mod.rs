//! Common types and utilities shared across pagetree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration ([`IndexConfig`] and constants)
//! - Error types
//! - Page references ([`PageRef`])

pub mod config;
pub mod error;
mod page_ref;

pub use config::IndexConfig;
pub use error::{Error, Result};
pub use page_ref::PageRef;
