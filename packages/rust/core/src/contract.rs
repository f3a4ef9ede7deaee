//! JSON run contract.
//!
//! A run takes an input envelope describing a document, builds it, writes the
//! Markdown (and optionally a PDF) and answers with a report envelope. The
//! answer is always JSON: failures are reported as
//! `{"status": "failure", "message", "details"}` rather than returned as errors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use url::Url;

use docforge_markdown::converter_for;
use docforge_render::{RenderService, WkhtmltopdfExporter, resolve_renderer_path};
use docforge_shared::{AppConfig, DocForgeError, RUN_SCHEMA_VERSION, RenderArtifact, Result};

use crate::builder::DocumentBuilder;
use crate::toc::check_level;

/// Value of the `command` field accepted by [`run_json`].
pub const COMMAND_NAME: &str = "docforge";

// ---------------------------------------------------------------------------
// Input envelope
// ---------------------------------------------------------------------------

/// Top-level input: `{"command": "docforge", "parameters": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunInput {
    pub command: String,
    pub parameters: RunParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunParameters {
    /// Where the Markdown is written; the PDF lands beside it.
    pub output_markdown: String,
    /// Explicit renderer location, overriding env and config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkhtmltopdf_path: Option<String>,
    /// Render a PDF after writing the Markdown.
    #[serde(default)]
    pub export_pdf: bool,
    pub document: DocumentSpec,
    /// Free-form caller metadata, echoed back in the summary.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// RFC 3339 timestamp printed under the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub include_toc: bool,
    pub blocks: Vec<BlockSpec>,
}

/// A content block, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum BlockSpec {
    Header {
        text: String,
        level: u8,
    },
    Paragraph {
        text: String,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Image {
        alt_text: String,
        url: String,
    },
    List {
        items: Vec<String>,
        #[serde(default)]
        ordered: bool,
    },
    Raw {
        text: String,
    },
}

impl RunInput {
    /// Check the constraints the type system does not express.
    pub fn validate(&self) -> Result<()> {
        if self.command != COMMAND_NAME {
            return Err(DocForgeError::contract(format!(
                "command: expected \"{COMMAND_NAME}\", got \"{}\"",
                self.command
            )));
        }

        let params = &self.parameters;
        require_non_empty("parameters.output_markdown", &params.output_markdown)?;
        if let Some(path) = &params.wkhtmltopdf_path {
            require_non_empty("parameters.wkhtmltopdf_path", path)?;
        }

        let doc = &params.document;
        if let Some(title) = &doc.title {
            require_non_empty("parameters.document.title", title)?;
        }
        if let Some(subtitle) = &doc.subtitle {
            require_non_empty("parameters.document.subtitle", subtitle)?;
        }
        if let Some(ts) = &doc.generated_at {
            DateTime::parse_from_rfc3339(ts).map_err(|e| {
                DocForgeError::contract(format!(
                    "parameters.document.generated_at: not an RFC 3339 date-time: {e}"
                ))
            })?;
        }
        if doc.blocks.is_empty() {
            return Err(DocForgeError::contract(
                "parameters.document.blocks: at least one block is required",
            ));
        }

        for (i, block) in doc.blocks.iter().enumerate() {
            let at = format!("parameters.document.blocks[{i}]");
            block.validate(&at)?;
        }
        Ok(())
    }
}

impl BlockSpec {
    fn validate(&self, at: &str) -> Result<()> {
        match self {
            Self::Header { text, level } => {
                require_non_empty(&format!("{at}.text"), text)?;
                check_level(*level)
                    .map_err(|e| DocForgeError::contract(format!("{at}.level: {e}")))?;
            }
            Self::Table { headers, rows } => {
                if headers.is_empty() {
                    return Err(DocForgeError::contract(format!(
                        "{at}.headers: at least one header is required"
                    )));
                }
                for (j, header) in headers.iter().enumerate() {
                    require_non_empty(&format!("{at}.headers[{j}]"), header)?;
                }
                if let Some(j) = rows.iter().position(Vec::is_empty) {
                    return Err(DocForgeError::contract(format!(
                        "{at}.rows[{j}]: a row needs at least one cell"
                    )));
                }
            }
            Self::Image { alt_text, url } => {
                require_non_empty(&format!("{at}.alt_text"), alt_text)?;
                Url::parse(url).map_err(|e| {
                    DocForgeError::contract(format!("{at}.url: not an absolute URI: {e}"))
                })?;
            }
            Self::List { items, .. } => {
                if items.is_empty() {
                    return Err(DocForgeError::contract(format!(
                        "{at}.items: at least one item is required"
                    )));
                }
            }
            Self::Paragraph { .. } | Self::Raw { .. } => {}
        }
        Ok(())
    }

    fn apply(&self, builder: &mut DocumentBuilder) -> Result<()> {
        match self {
            Self::Header { text, level } => builder.add_header(text, *level)?,
            Self::Paragraph { text } => builder.add_paragraph(text),
            Self::Table { headers, rows } => builder.add_table(headers, rows),
            Self::Image { alt_text, url } => builder.add_image(alt_text, url),
            Self::List { items, ordered } => builder.add_list(items, *ordered),
            Self::Raw { text } => builder.add_raw(text),
        }
        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(DocForgeError::contract(format!("{field}: must not be empty")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output envelopes
// ---------------------------------------------------------------------------

/// Successful run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Always `"success"`.
    pub status: String,
    pub schema_version: String,
    pub generated_at: String,
    pub markdown: MarkdownArtifact,
    #[serde(default)]
    pub summary: Map<String, Value>,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// The written Markdown file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownArtifact {
    pub path: String,
    pub bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<RenderArtifact>,
}

/// Failed run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    /// Always `"failure"`.
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl RunFailure {
    fn from_error(err: &DocForgeError, mut details: Map<String, Value>) -> Self {
        details.insert("error".into(), Value::String(err.kind().into()));
        Self {
            status: "failure".into(),
            message: err.to_string(),
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Execute a run with the render service described by `config`.
pub fn run_json(payload: &Value, config: &AppConfig) -> Value {
    let exporter = WkhtmltopdfExporter::from_config(&config.render)
        .with_converter(converter_for(config.markdown.converter));
    run_json_with(payload, config, Box::new(exporter))
}

/// Execute a run with an explicit render service.
#[instrument(skip_all)]
pub fn run_json_with(
    payload: &Value,
    config: &AppConfig,
    render_service: Box<dyn RenderService>,
) -> Value {
    let input: RunInput = match serde_json::from_value(payload.clone()) {
        Ok(input) => input,
        Err(e) => {
            let err = DocForgeError::contract(format!("invalid input payload: {e}"));
            warn!(error = %err, "rejected run payload");
            return to_value(&RunFailure::from_error(&err, Map::new()));
        }
    };

    if let Err(err) = input.validate() {
        warn!(error = %err, "rejected run payload");
        return to_value(&RunFailure::from_error(&err, Map::new()));
    }

    match execute(&input, config, render_service) {
        Ok(report) => to_value(&report),
        Err(failure) => to_value(&failure),
    }
}

fn execute(
    input: &RunInput,
    config: &AppConfig,
    render_service: Box<dyn RenderService>,
) -> std::result::Result<RunReport, RunFailure> {
    let params = &input.parameters;
    let doc = &params.document;
    let output_path = PathBuf::from(&params.output_markdown);
    let mut messages = Vec::new();

    let renderer = if params.export_pdf {
        let explicit = params.wkhtmltopdf_path.as_deref().map(Path::new);
        let resolved = resolve_renderer_path(explicit, &config.render);
        if resolved.is_none() {
            messages.push(format!(
                "PDF export skipped: wkhtmltopdf not found (set {} or install at default path)",
                config.render.env_var
            ));
        }
        resolved
    } else {
        None
    };

    let mut builder = DocumentBuilder::new()
        .with_renderer(renderer.clone())
        .with_render_service(render_service)
        .with_converter(converter_for(config.markdown.converter));

    if let Some(title) = &doc.title {
        builder.add_raw(&format!("# {title}\n\n"));
    }
    if let Some(subtitle) = &doc.subtitle {
        builder.add_raw(&format!("_{subtitle}_\n\n"));
    }
    if let Some(ts) = &doc.generated_at {
        builder.add_raw(&format!("_Generated: {ts}_\n\n"));
    }
    for block in &doc.blocks {
        block
            .apply(&mut builder)
            .map_err(|e| RunFailure::from_error(&e, Map::new()))?;
    }
    if doc.include_toc {
        builder.add_toc();
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            RunFailure::from_error(&DocForgeError::io(parent, e), Map::new())
        })?;
    }

    let markdown = match builder.generate(&output_path) {
        Ok(markdown) => markdown,
        Err(err) => {
            let mut details = Map::new();
            if matches!(err, DocForgeError::Render { .. }) {
                // The Markdown is on disk even though the PDF failed.
                details.insert(
                    "markdown".into(),
                    json!({ "path": params.output_markdown, "bytes": builder.to_markdown().len() }),
                );
                if let Some(artifact) = builder.last_render_result() {
                    details.insert("pdf".into(), to_value(artifact));
                }
            }
            return Err(RunFailure::from_error(&err, details));
        }
    };
    messages.push(format!("wrote markdown to {}", params.output_markdown));

    let pdf = builder.last_render_result().cloned();
    if let Some(artifact) = &pdf {
        if let Some(path) = &artifact.output_path {
            messages.push(format!("rendered PDF to {}", path.display()));
        }
    }

    let mut summary = Map::new();
    summary.insert("blocks".into(), json!(builder.blocks().len()));
    summary.insert("headers".into(), json!(builder.toc_entries().len()));
    summary.insert("include_toc".into(), json!(doc.include_toc));
    summary.insert("export_pdf".into(), json!(params.export_pdf));
    summary.insert("pdf_rendered".into(), json!(pdf.is_some()));
    if !params.metadata.is_empty() {
        summary.insert("metadata".into(), Value::Object(params.metadata.clone()));
    }

    info!(
        path = %params.output_markdown,
        bytes = markdown.len(),
        pdf = pdf.is_some(),
        "run complete"
    );

    Ok(RunReport {
        status: "success".into(),
        schema_version: RUN_SCHEMA_VERSION.into(),
        generated_at: Utc::now().to_rfc3339(),
        markdown: MarkdownArtifact {
            path: params.output_markdown.clone(),
            bytes: markdown.len(),
            sha256: Some(sha256_hex(&markdown)),
            pdf,
        },
        summary,
        messages,
    })
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_value<T: Serialize>(data: &T) -> Value {
    serde_json::to_value(data).unwrap_or_else(|e| {
        json!({
            "status": "failure",
            "message": format!("failed to serialize run report: {e}"),
            "details": {},
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
