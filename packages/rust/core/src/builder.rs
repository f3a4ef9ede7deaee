//! Markdown document builder.
//!
//! Blocks are appended in document order and serialized on demand. Headers are
//! numbered from a [`SectionCounter`] and produce a [`TocEntry`] the moment
//! they are added. `generate` writes the Markdown and, when a renderer location
//! was configured, asks the [`RenderService`] for a sibling PDF.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use docforge_markdown::{HtmlConverter, Unavailable, to_html_or_fallback};
use docforge_render::{RenderContent, RenderRequest, RenderService, WkhtmltopdfExporter};
use docforge_shared::{DocForgeError, RENDERER_ENV_VAR, RenderArtifact, Result};

use crate::toc::{SectionCounter, TocEntry};

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// One unit of document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Numbered header; `text` already carries the section label.
    Header { text: String, level: u8 },
    Paragraph(String),
    /// Rows are kept as given, even when their arity differs from `headers`.
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Image { alt_text: String, url: String },
    List { items: Vec<String>, ordered: bool },
    /// Snapshot of the TOC taken by [`DocumentBuilder::add_toc`].
    Toc(Vec<TocEntry>),
    /// Markdown emitted verbatim.
    Raw(String),
}

impl Block {
    /// Markdown for this block, including its trailing separator.
    pub fn to_markdown(&self) -> String {
        match self {
            Self::Header { text, level } => {
                format!("{} {text}\n", "#".repeat(usize::from(*level)))
            }
            Self::Paragraph(text) => format!("{text}\n\n"),
            Self::Table { headers, rows } => {
                let header_row = headers.join(" | ");
                let separator_row = vec!["---"; headers.len()].join(" | ");
                let data_rows = rows
                    .iter()
                    .map(|row| row.join(" | "))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{header_row}\n{separator_row}\n{data_rows}\n\n")
            }
            Self::Image { alt_text, url } => format!("![{alt_text}]({url})\n\n"),
            Self::List { items, ordered } => {
                let mut out = String::new();
                for (i, item) in items.iter().enumerate() {
                    if *ordered {
                        out.push_str(&format!("{}. {item}\n", i + 1));
                    } else {
                        out.push_str(&format!("- {item}\n"));
                    }
                }
                out.push('\n');
                out
            }
            Self::Toc(entries) => {
                let lines = entries
                    .iter()
                    .map(TocEntry::markdown_line)
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{lines}\n\n")
            }
            Self::Raw(text) => text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentBuilder
// ---------------------------------------------------------------------------

/// Accumulates blocks and serializes them to Markdown.
///
/// Not meant to be shared: one caller mutates it, then discards it after
/// [`generate`](Self::generate).
pub struct DocumentBuilder {
    blocks: Vec<Block>,
    toc: Vec<TocEntry>,
    counter: SectionCounter,
    renderer_path: Option<PathBuf>,
    render_service: Box<dyn RenderService>,
    converter: Box<dyn HtmlConverter>,
    last_render: Option<RenderArtifact>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("blocks", &self.blocks.len())
            .field("toc", &self.toc.len())
            .field("renderer_path", &self.renderer_path)
            .field("converter", &self.converter.name())
            .finish()
    }
}

impl DocumentBuilder {
    /// Empty builder with no renderer and no HTML converter.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            toc: Vec::new(),
            counter: SectionCounter::new(),
            renderer_path: None,
            render_service: Box::new(WkhtmltopdfExporter::new()),
            converter: Box::new(Unavailable),
            last_render: None,
        }
    }

    /// Set the resolved renderer location. `None` disables rendering.
    pub fn with_renderer(mut self, path: Option<PathBuf>) -> Self {
        self.renderer_path = path;
        self
    }

    pub fn with_render_service(mut self, service: Box<dyn RenderService>) -> Self {
        self.render_service = service;
        self
    }

    pub fn with_converter(mut self, converter: Box<dyn HtmlConverter>) -> Self {
        self.converter = converter;
        self
    }

    // -- append operations --------------------------------------------------

    /// Add a numbered header and its TOC entry.
    ///
    /// Levels outside `1..=6` are rejected and leave the builder unchanged.
    pub fn add_header(&mut self, text: &str, level: u8) -> Result<()> {
        let section_index = self.counter.advance(level)?;
        let header_text = format!("{section_index} {text}");

        self.toc.push(TocEntry::for_header(&header_text, level));
        self.blocks.push(Block::Header {
            text: header_text,
            level,
        });
        Ok(())
    }

    pub fn add_paragraph(&mut self, text: &str) {
        self.blocks.push(Block::Paragraph(text.to_string()));
    }

    pub fn add_table(&mut self, headers: &[String], rows: &[Vec<String>]) {
        self.blocks.push(Block::Table {
            headers: headers.to_vec(),
            rows: rows.to_vec(),
        });
    }

    pub fn add_image(&mut self, alt_text: &str, url: &str) {
        self.blocks.push(Block::Image {
            alt_text: alt_text.to_string(),
            url: url.to_string(),
        });
    }

    pub fn add_list(&mut self, items: &[String], ordered: bool) {
        self.blocks.push(Block::List {
            items: items.to_vec(),
            ordered,
        });
    }

    /// Append Markdown verbatim. No numbering, no separator added.
    pub fn add_raw(&mut self, text: &str) {
        self.blocks.push(Block::Raw(text.to_string()));
    }

    /// Insert the TOC collected so far as the first block.
    ///
    /// Each call prepends another snapshot; call it once, after the last
    /// header.
    pub fn add_toc(&mut self) {
        self.blocks.insert(0, Block::Toc(self.toc.clone()));
    }

    // -- serialization --------------------------------------------------------

    /// Serialize every block in document order.
    pub fn to_markdown(&self) -> String {
        self.blocks.iter().map(Block::to_markdown).collect()
    }

    /// Write the Markdown to `output_file`, render a PDF beside it when a
    /// renderer is configured, and return the Markdown.
    ///
    /// A render failure is returned as [`DocForgeError::Render`]; the Markdown
    /// file has been written by then and stays on disk.
    ///
    /// With a renderer configured, a `.pdf` output path is refused before
    /// anything is written.
    #[instrument(skip_all, fields(output = %output_file.display(), blocks = self.blocks.len()))]
    pub fn generate(&mut self, output_file: &Path) -> Result<String> {
        // The PDF lands at `<stem>.pdf` beside the output, so a `.pdf` output
        // would be replaced (or removed) by the render step.
        if self.renderer_path.is_some() && is_pdf_path(output_file) {
            return Err(DocForgeError::validation(format!(
                "output {} collides with the rendered PDF; use another extension",
                output_file.display()
            )));
        }

        let markdown = self.to_markdown();
        std::fs::write(output_file, &markdown).map_err(|e| DocForgeError::io(output_file, e))?;
        info!(path = %output_file.display(), bytes = markdown.len(), "wrote markdown");

        let Some(binary) = self.renderer_path.clone() else {
            debug!("no renderer configured, skipping PDF");
            self.last_render = None;
            return Ok(markdown);
        };

        let request = RenderRequest {
            content: RenderContent::Markdown(markdown.clone()),
            output_dir: parent_dir(output_file),
            stem: file_stem(output_file),
            binary,
        };
        self.run_render(&request, "Failed to render markdown to PDF")?;

        Ok(markdown)
    }

    /// Render an HTML page to `out_path` (a `.pdf` path).
    #[instrument(skip_all, fields(output = %out_path.display()))]
    pub fn render_html(&mut self, html: &str, out_path: &Path) -> Result<()> {
        let Some(binary) = self.renderer_path.clone() else {
            return Err(DocForgeError::config(format!(
                "wkhtmltopdf not found (set {RENDERER_ENV_VAR} or install at default path)"
            )));
        };

        let request = RenderRequest {
            content: RenderContent::Html(html.to_string()),
            output_dir: parent_dir(out_path),
            stem: file_stem(out_path),
            binary,
        };
        self.run_render(&request, "wkhtmltopdf execution failed")
    }

    fn run_render(&mut self, request: &RenderRequest, default_detail: &str) -> Result<()> {
        let artifact = self.render_service.render(request);
        let outcome = if artifact.succeeded {
            Ok(())
        } else {
            let detail = artifact
                .detail
                .clone()
                .unwrap_or_else(|| default_detail.to_string());
            warn!(%detail, "render failed");
            Err(DocForgeError::render(detail))
        };
        self.last_render = Some(artifact);
        outcome
    }

    /// Convert Markdown to HTML, or to an escaped `<pre>` block when the
    /// converter is unavailable.
    pub fn to_html(&self, text: &str) -> String {
        to_html_or_fallback(self.converter.as_ref(), text)
    }

    // -- accessors --------------------------------------------------------------

    /// Artifact from the most recent render attempt.
    pub fn last_render_result(&self) -> Option<&RenderArtifact> {
        self.last_render.as_ref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn toc_entries(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn section_counter(&self) -> &SectionCounter {
        &self.counter
    }

    pub fn renderer_path(&self) -> Option<&Path> {
        self.renderer_path.as_deref()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "pdf")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use docforge_markdown::CommonMark;

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "docforge-builder-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Render service that records requests and answers with a fixed outcome.
    struct StubRenderer {
        succeed: bool,
        requests: Arc<Mutex<Vec<RenderRequest>>>,
    }

    impl RenderService for StubRenderer {
        fn render(&self, request: &RenderRequest) -> RenderArtifact {
            self.requests.lock().unwrap().push(request.clone());
            let mut artifact = RenderArtifact::failed("stub", "stub render failed");
            artifact.output_path = Some(request.pdf_path());
            if self.succeed {
                std::fs::write(request.pdf_path(), "PDF").unwrap();
                artifact.succeeded = true;
                artifact.detail = None;
            }
            artifact
        }
    }

    fn stub(succeed: bool) -> (Box<StubRenderer>, Arc<Mutex<Vec<RenderRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(StubRenderer {
                succeed,
                requests: requests.clone(),
            }),
            requests,
        )
    }

    #[test]
    fn generate_writes_markdown_and_toc() {
        let tmp = temp_dir();
        let mut builder = DocumentBuilder::new();
        builder.add_header("Intro", 1).unwrap();
        builder.add_paragraph("Welcome");
        builder.add_header("Details", 2).unwrap();
        builder.add_list(&strings(&["Point A", "Point B"]), true);
        builder.add_toc();

        let output = tmp.join("doc.md");
        let markdown = builder.generate(&output).unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, markdown);
        assert!(markdown.starts_with("- [1 Intro]"));
        assert!(markdown.contains("1.1 Details"));
        assert!(!tmp.join("doc.pdf").exists());
        assert!(builder.last_render_result().is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn full_document_serialization() {
        let mut builder = DocumentBuilder::new();
        builder.add_header("Intro", 1).unwrap();
        builder.add_paragraph("Welcome");
        builder.add_header("Details", 2).unwrap();
        builder.add_list(&strings(&["Point A", "Point B"]), true);
        builder.add_toc();

        assert_eq!(
            builder.to_markdown(),
            "- [1 Intro](#1-intro)\n  - [1.1 Details](#11-details)\n\n\
             # 1 Intro\n\
             Welcome\n\n\
             ## 1.1 Details\n\
             1. Point A\n2. Point B\n\n"
        );
    }

    #[test]
    fn header_labels_follow_counter() {
        let mut builder = DocumentBuilder::new();
        for (text, level) in [("A", 1), ("B", 2), ("C", 2), ("D", 1), ("E", 2)] {
            builder.add_header(text, level).unwrap();
        }
        let labels: Vec<&str> = builder
            .toc_entries()
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, ["1 A", "1.1 B", "1.2 C", "2 D", "2.1 E"]);
        assert_eq!(
            builder.blocks()[4],
            Block::Header {
                text: "2.1 E".into(),
                level: 2
            }
        );
    }

    #[test]
    fn rejected_header_leaves_state_unchanged() {
        let mut builder = DocumentBuilder::new();
        builder.add_header("Intro", 1).unwrap();

        for level in [0, 7] {
            let err = builder.add_header("Bad", level).unwrap_err();
            assert!(matches!(err, DocForgeError::Validation { .. }));
        }

        assert_eq!(builder.blocks().len(), 1);
        assert_eq!(builder.toc_entries().len(), 1);
        assert_eq!(builder.section_counter().levels(), &[1]);
    }

    #[test]
    fn lists_render_one_line_per_item() {
        let items = strings(&["Point A", "Point B"]);

        let ordered = Block::List {
            items: items.clone(),
            ordered: true,
        };
        assert_eq!(ordered.to_markdown(), "1. Point A\n2. Point B\n\n");

        let unordered = Block::List {
            items,
            ordered: false,
        };
        assert_eq!(unordered.to_markdown(), "- Point A\n- Point B\n\n");

        let empty = Block::List {
            items: vec![],
            ordered: true,
        };
        assert_eq!(empty.to_markdown(), "\n");
    }

    #[test]
    fn table_rows_are_not_normalized() {
        let table = Block::Table {
            headers: strings(&["Item", "Effect"]),
            rows: vec![strings(&["Fan", "Shrinks"]), strings(&["Key"])],
        };
        assert_eq!(
            table.to_markdown(),
            "Item | Effect\n--- | ---\nFan | Shrinks\nKey\n\n"
        );
    }

    #[test]
    fn paragraph_image_and_raw_formats() {
        assert_eq!(Block::Paragraph(String::new()).to_markdown(), "\n\n");
        assert_eq!(
            Block::Image {
                alt_text: "Alice".into(),
                url: "https://example.com/a.png".into()
            }
            .to_markdown(),
            "![Alice](https://example.com/a.png)\n\n"
        );
        assert_eq!(Block::Raw("> quote".into()).to_markdown(), "> quote");
    }

    #[test]
    fn toc_entries_are_frozen_at_add_time() {
        let mut builder = DocumentBuilder::new();
        builder.add_header("First", 1).unwrap();
        builder.add_toc();
        builder.add_header("Second", 1).unwrap();
        builder.add_toc();

        let markdown = builder.to_markdown();
        assert!(markdown.starts_with(
            "- [1 First](#1-first)\n- [2 Second](#2-second)\n\n- [1 First](#1-first)\n\n"
        ));
        assert_eq!(builder.toc_entries().len(), 2);
    }

    #[test]
    fn to_html_falls_back_without_converter() {
        let builder = DocumentBuilder::new();
        let html = builder.to_html("<b>bold</b>");
        assert!(html.starts_with("<pre>"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn to_html_uses_injected_converter() {
        let builder = DocumentBuilder::new().with_converter(Box::new(CommonMark));
        assert_eq!(builder.to_html("*hi*").trim(), "<p><em>hi</em></p>");
    }

    #[test]
    fn generate_records_render_result() {
        let tmp = temp_dir();
        let (service, requests) = stub(true);
        let mut builder = DocumentBuilder::new()
            .with_renderer(Some(tmp.join("wkhtmltopdf.exe")))
            .with_render_service(service);
        builder.add_header("Intro", 1).unwrap();

        let output = tmp.join("doc.md");
        builder.generate(&output).unwrap();

        let result = builder.last_render_result().unwrap();
        assert!(result.succeeded);
        assert_eq!(result.output_path, Some(tmp.join("doc.pdf")));

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].stem, "doc");
        assert_eq!(requests[0].output_dir, tmp);
        assert_eq!(
            requests[0].content,
            RenderContent::Markdown("# 1 Intro\n".into())
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn render_failure_keeps_markdown_on_disk() {
        let tmp = temp_dir();
        let (service, _) = stub(false);
        let mut builder = DocumentBuilder::new()
            .with_renderer(Some(tmp.join("wkhtmltopdf.exe")))
            .with_render_service(service);
        builder.add_header("Intro", 1).unwrap();

        let output = tmp.join("doc.md");
        let err = builder.generate(&output).unwrap_err();

        assert!(matches!(err, DocForgeError::Render { .. }));
        assert!(err.to_string().contains("stub render failed"));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "# 1 Intro\n");
        assert!(!builder.last_render_result().unwrap().succeeded);
        // Blocks survive the failure
        assert_eq!(builder.blocks().len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn pdf_named_output_is_refused_when_rendering() {
        let tmp = temp_dir();
        let (service, requests) = stub(false);
        let mut builder = DocumentBuilder::new()
            .with_renderer(Some(tmp.join("wkhtmltopdf.exe")))
            .with_render_service(service);
        builder.add_header("Intro", 1).unwrap();

        let output = tmp.join("report.pdf");
        let err = builder.generate(&output).unwrap_err();

        assert!(matches!(err, DocForgeError::Validation { .. }));
        assert!(!output.exists());
        assert!(requests.lock().unwrap().is_empty());
        assert!(builder.last_render_result().is_none());

        // Without a renderer nothing else writes there
        let mut plain = DocumentBuilder::new();
        plain.add_paragraph("text");
        plain.generate(&output).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "text\n\n");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn generate_with_default_exporter_reports_missing_binary() {
        let tmp = temp_dir();
        let mut builder =
            DocumentBuilder::new().with_renderer(Some(tmp.join("missing.exe")));
        builder.add_paragraph("text");

        let output = tmp.join("doc.md");
        let err = builder.generate(&output).unwrap_err();

        assert!(err.to_string().contains("binary not found"));
        assert!(output.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn generate_without_renderer_clears_previous_result() {
        let tmp = temp_dir();
        let (service, _) = stub(true);
        let mut builder = DocumentBuilder::new()
            .with_renderer(Some(tmp.join("wkhtmltopdf.exe")))
            .with_render_service(service);
        builder.render_html("<p/>", &tmp.join("x.pdf")).unwrap();
        assert!(builder.last_render_result().is_some());

        let mut builder = builder.with_renderer(None);
        builder.generate(&tmp.join("doc.md")).unwrap();
        assert!(builder.last_render_result().is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn render_html_requires_renderer() {
        let mut builder = DocumentBuilder::new();
        let err = builder
            .render_html("<html></html>", Path::new("out.pdf"))
            .unwrap_err();
        assert!(matches!(err, DocForgeError::Config { .. }));
        assert!(err.to_string().contains(RENDERER_ENV_VAR));
        assert!(builder.last_render_result().is_none());
    }

    #[test]
    fn render_html_passes_html_through() {
        let tmp = temp_dir();
        let (service, requests) = stub(true);
        let mut builder = DocumentBuilder::new()
            .with_renderer(Some(tmp.join("wkhtmltopdf.exe")))
            .with_render_service(service);

        let out_pdf = tmp.join("out.pdf");
        builder
            .render_html("<html><body>hi</body></html>", &out_pdf)
            .unwrap();

        assert!(out_pdf.exists());
        let requests = requests.lock().unwrap();
        assert_eq!(
            requests[0].content,
            RenderContent::Html("<html><body>hi</body></html>".into())
        );
        assert_eq!(requests[0].stem, "out");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn io_error_is_propagated() {
        let tmp = temp_dir();
        let mut builder = DocumentBuilder::new();
        let err = builder
            .generate(&tmp.join("no-such-dir").join("doc.md"))
            .unwrap_err();
        assert!(matches!(err, DocForgeError::Io { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn relative_output_renders_into_current_dir() {
        assert_eq!(parent_dir(Path::new("doc.md")), PathBuf::from("."));
        assert_eq!(file_stem(Path::new("out/alice.md")), "alice");
    }
}
