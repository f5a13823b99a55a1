//! Ecodata Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging, and checksum utilities for the ecodata
//! workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all ecodata workspace
//! members:
//!
//! - **Error Handling**: The [`EcodataError`] enum and [`Result`] alias
//! - **Logging**: Centralized `tracing` subscriber configuration
//! - **Checksums**: File integrity verification utilities
//!
//! # Example
//!
//! ```no_run
//! use ecodata_common::{Result, EcodataError};
//! use ecodata_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
//!
//! fn digest(path: &str) -> Result<String> {
//!     compute_file_checksum(path, ChecksumAlgorithm::Sha256)
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{EcodataError, Result};
