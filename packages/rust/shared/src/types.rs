//! Core domain types shared between the builder and the render service.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Schema version stamped on every successful run report.
pub const RUN_SCHEMA_VERSION: &str = "docforge.run/1.0";

// ---------------------------------------------------------------------------
// RenderArtifact
// ---------------------------------------------------------------------------

/// Outcome of one invocation of the external render service.
///
/// A failed render is still an artifact: `succeeded` is false and `detail`
/// explains why. Callers decide whether that is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderArtifact {
    /// Name of the exporter that produced this artifact (e.g. `wkhtmltopdf`).
    pub exporter: String,
    /// Whether the renderer ran and produced its output file.
    pub succeeded: bool,
    /// Path of the rendered file, when one was expected.
    pub output_path: Option<PathBuf>,
    /// Command line issued to the renderer (empty if nothing ran).
    pub command: Vec<String>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Intermediate input files keyed by role (e.g. `html`).
    pub inputs: BTreeMap<String, String>,
    /// Resolved renderer binary, if it could be located.
    pub binary_path: Option<PathBuf>,
    /// Human-readable failure detail.
    #[serde(default)]
    pub detail: Option<String>,
}

impl RenderArtifact {
    /// A failed artifact for a render that never reached the renderer.
    pub fn failed(exporter: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            exporter: exporter.into(),
            succeeded: false,
            output_path: None,
            command: Vec::new(),
            stdout: String::new(),
            stderr: String::new(),
            inputs: BTreeMap::new(),
            binary_path: None,
            detail: Some(detail.into()),
        }
    }

    /// Size of the rendered file on disk, if it exists.
    pub fn output_bytes(&self) -> Option<u64> {
        let path = self.output_path.as_ref()?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }
}
