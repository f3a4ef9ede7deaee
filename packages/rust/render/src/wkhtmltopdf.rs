//! `wkhtmltopdf` exporter.
//!
//! Writes the content as an HTML page next to the requested PDF, runs
//! `wkhtmltopdf <html> <pdf>` and reports the outcome as a [`RenderArtifact`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use docforge_markdown::{CommonMark, HtmlConverter, html_document, to_html_or_fallback};
use docforge_shared::{RenderArtifact, RenderConfig};

use crate::resolve::find_binary;
use crate::runner::{CommandRunner, SystemRunner};
use crate::{RenderContent, RenderRequest, RenderService};

/// Exporter name recorded on every artifact.
pub const EXPORTER_NAME: &str = "wkhtmltopdf";

/// Render service that shells out to `wkhtmltopdf`.
pub struct WkhtmltopdfExporter {
    runner: Box<dyn CommandRunner>,
    converter: Box<dyn HtmlConverter>,
    extra_args: Vec<String>,
    keep_html: bool,
}

impl Default for WkhtmltopdfExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl WkhtmltopdfExporter {
    /// Exporter with the system runner, CommonMark conversion, `--quiet`, and
    /// the intermediate HTML removed after rendering.
    pub fn new() -> Self {
        Self {
            runner: Box::new(SystemRunner),
            converter: Box::new(CommonMark),
            extra_args: vec!["--quiet".into()],
            keep_html: false,
        }
    }

    /// Exporter configured from the `[render]` section.
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            extra_args: config.extra_args.clone(),
            keep_html: config.keep_html,
            ..Self::new()
        }
    }

    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_converter(mut self, converter: Box<dyn HtmlConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn keep_html(mut self, keep: bool) -> Self {
        self.keep_html = keep;
        self
    }

    fn html_for(&self, request: &RenderRequest) -> String {
        match &request.content {
            RenderContent::Html(html) => html.clone(),
            RenderContent::Markdown(markdown) => html_document(
                &request.stem,
                &to_html_or_fallback(self.converter.as_ref(), markdown),
            ),
        }
    }

    fn html_path(&self, request: &RenderRequest) -> PathBuf {
        if self.keep_html {
            request.output_dir.join(format!("{}.html", request.stem))
        } else {
            request
                .output_dir
                .join(format!(".{}.render.html", request.stem))
        }
    }
}

impl RenderService for WkhtmltopdfExporter {
    #[instrument(skip_all, fields(stem = %request.stem, dir = %request.output_dir.display()))]
    fn render(&self, request: &RenderRequest) -> RenderArtifact {
        let pdf_path = request.pdf_path();
        let mut artifact = RenderArtifact {
            exporter: EXPORTER_NAME.to_string(),
            succeeded: false,
            output_path: Some(pdf_path.clone()),
            command: Vec::new(),
            stdout: String::new(),
            stderr: String::new(),
            inputs: BTreeMap::new(),
            binary_path: None,
            detail: None,
        };

        let Some(binary) = find_binary(&request.binary) else {
            let detail = format!(
                "wkhtmltopdf binary not found: {}",
                request.binary.display()
            );
            warn!(binary = %request.binary.display(), "renderer binary not found");
            artifact.detail = Some(detail);
            return artifact;
        };
        artifact.binary_path = Some(binary.clone());

        if let Err(e) = std::fs::create_dir_all(&request.output_dir) {
            artifact.detail = Some(format!(
                "cannot create output directory {}: {e}",
                request.output_dir.display()
            ));
            return artifact;
        }

        let html_path = self.html_path(request);
        if let Err(e) = std::fs::write(&html_path, self.html_for(request)) {
            artifact.detail = Some(format!(
                "cannot write intermediate HTML {}: {e}",
                html_path.display()
            ));
            return artifact;
        }
        debug!(path = %html_path.display(), "wrote intermediate HTML");
        artifact.inputs.insert("html".to_string(), display(&html_path));

        // A stale PDF from an earlier run must not count as success.
        if let Err(e) = std::fs::remove_file(&pdf_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %pdf_path.display(), error = %e, "could not remove stale PDF");
            }
        }

        let mut command = vec![display(&binary)];
        command.extend(self.extra_args.iter().cloned());
        command.push(display(&html_path));
        command.push(display(&pdf_path));
        artifact.command = command;

        match self.runner.run(&artifact.command) {
            Ok(output) => {
                artifact.stdout = output.stdout.clone();
                artifact.stderr = output.stderr.clone();
                if !output.success() {
                    artifact.detail = Some(match output.status {
                        Some(code) => format!("wkhtmltopdf exited with status {code}"),
                        None => "wkhtmltopdf terminated by signal".to_string(),
                    });
                } else if !pdf_path.is_file() {
                    artifact.detail = Some(format!(
                        "wkhtmltopdf reported success but {} was not created",
                        pdf_path.display()
                    ));
                } else {
                    artifact.succeeded = true;
                }
            }
            Err(e) => {
                artifact.detail = Some(format!("failed to launch wkhtmltopdf: {e}"));
            }
        }

        if !self.keep_html {
            remove_intermediate(&html_path);
        }

        if artifact.succeeded {
            info!(path = %pdf_path.display(), "rendered PDF");
        } else {
            warn!(detail = artifact.detail.as_deref().unwrap_or(""), "PDF render failed");
        }
        artifact
    }
}

/// Remove the intermediate HTML, logging when it has to be left behind.
fn remove_intermediate(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not remove intermediate HTML");
            false
        }
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
