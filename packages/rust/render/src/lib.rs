//! PDF render service for DocForge.
//!
//! The builder hands finished content to a [`RenderService`] and gets a
//! [`RenderArtifact`] back. The shipped implementation drives `wkhtmltopdf`
//! through a [`CommandRunner`], which tests replace with a fake.

pub mod resolve;
pub mod runner;
pub mod wkhtmltopdf;

use std::path::PathBuf;

use docforge_shared::RenderArtifact;

pub use resolve::{find_binary, platform_default_paths, resolve_renderer_path, resolve_renderer_path_with};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use wkhtmltopdf::{EXPORTER_NAME, WkhtmltopdfExporter};

/// Content handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderContent {
    /// Markdown; the service converts it to HTML first.
    Markdown(String),
    /// A ready HTML page.
    Html(String),
}

/// One render job: content plus where the output goes.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// What to render.
    pub content: RenderContent,
    /// Directory that receives `<stem>.pdf`.
    pub output_dir: PathBuf,
    /// Base file name shared with the Markdown output.
    pub stem: String,
    /// Configured renderer location (may not exist).
    pub binary: PathBuf,
}

impl RenderRequest {
    /// Path of the file this request is expected to produce.
    pub fn pdf_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", self.stem))
    }
}

/// Converts content into a fixed-layout artifact.
///
/// Implementations report failure through [`RenderArtifact::succeeded`]
/// instead of returning an error, so the caller always has the metadata.
pub trait RenderService: Send + Sync {
    fn render(&self, request: &RenderRequest) -> RenderArtifact;
}
