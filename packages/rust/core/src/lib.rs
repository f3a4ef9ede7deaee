//! Document building for DocForge.
//!
//! [`builder::DocumentBuilder`] accumulates numbered content blocks and writes
//! Markdown (optionally rendering a PDF); [`contract`] drives it from a JSON
//! run envelope.

pub mod builder;
pub mod contract;
pub mod toc;

pub use builder::{Block, DocumentBuilder};
pub use contract::{COMMAND_NAME, RunFailure, RunInput, RunReport, run_json, run_json_with};
pub use toc::{HEADER_MAX_LEVEL, SectionCounter, TocEntry};
