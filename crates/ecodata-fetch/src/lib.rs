//! Ecodata Fetch Library
//!
//! Repeatable acquisition of the third-party scientific datasets behind the
//! ecotoxicological knowledge graph.
//!
//! # Supported Data Sources
//!
//! - **ECOTOX**: EPA ecotoxicology effect data (ASCII dump, Windows-1252)
//! - **NCBI Taxonomy**: taxdump nodes/names/divisions
//! - **PubChem / ChEMBL / MeSH**: chemistry and vocabulary RDF exports
//! - **EOL**: Encyclopedia of Life trait bank
//!
//! Each source is described by a [`source::SourceDescriptor`]: a remote
//! archive URL, its archive kind, a destination directory, and an optional
//! text re-encoding rule. The [`pipeline::Pipeline`] fetches, extracts,
//! re-encodes, and cleans up each source as an isolated unit of work, so one
//! unreachable mirror never blocks the rest of the run.
//!
//! # Example
//!
//! ```no_run
//! use ecodata_fetch::pipeline::{Pipeline, PipelineConfig};
//! use ecodata_fetch::source;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::new("./data");
//!     let report = Pipeline::new(config)?.run(source::catalog()).await;
//!     std::process::exit(report.exit_code());
//! }
//! ```

pub mod download;
pub mod encoding;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod source;

// Re-export commonly used types
pub use pipeline::{Pipeline, PipelineConfig};
pub use report::{RunReport, SourceOutcome};
pub use source::{ArchiveKind, EncodingRule, SourceDescriptor};
