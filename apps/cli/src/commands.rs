//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use docforge_core::{DocumentBuilder, run_json};
use docforge_markdown::{converter_for, html_document, to_html_or_fallback};
use docforge_render::{WkhtmltopdfExporter, resolve_renderer_path};
use docforge_shared::{AppConfig, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocForge: numbered Markdown documents with a TOC and optional PDF output.
#[derive(Parser)]
#[command(
    name = "docforge",
    version,
    about = "Build numbered Markdown documents with a table of contents and render them to PDF.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docforge/docforge.toml.
    #[arg(long, global = true, env = "DOCFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a document from a JSON run envelope and print the report.
    Build {
        /// Input envelope, or `-` for stdin.
        input: String,

        /// Also write the report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Convert a Markdown file to a standalone HTML page.
    Html {
        /// Markdown file to convert.
        file: PathBuf,

        /// Write the HTML here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Write the sample document (and its PDF, if a renderer is found).
    Sample {
        /// Output directory (defaults to `defaults.output_dir`).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Explicit wkhtmltopdf binary.
        #[arg(long, conflicts_with = "no_pdf")]
        wkhtmltopdf: Option<PathBuf>,

        /// Skip PDF rendering even if a renderer is configured.
        #[arg(long)]
        no_pdf: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Logs go to stderr so `build` can keep stdout for the JSON report.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docforge=warn",
        1 => "docforge=info",
        2 => "docforge=debug",
        _ => "docforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build { input, report } => {
            cmd_build(&input, report.as_deref(), &resolve_config(config_path)?)
        }
        Command::Html { file, out } => {
            cmd_html(&file, out.as_deref(), &resolve_config(config_path)?)
        }
        Command::Sample {
            out_dir,
            wkhtmltopdf,
            no_pdf,
        } => cmd_sample(
            out_dir,
            wkhtmltopdf.as_deref(),
            no_pdf,
            &resolve_config(config_path)?,
        ),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(config_path)?),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_build(input: &str, report: Option<&Path>, config: &AppConfig) -> Result<()> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("failed to read input from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).wrap_err_with(|| format!("failed to read {input}"))?
    };
    let payload: serde_json::Value =
        serde_json::from_str(&raw).wrap_err_with(|| format!("{input} is not valid JSON"))?;

    let result = run_json(&payload, config);
    let rendered = serde_json::to_string_pretty(&result)?;
    println!("{rendered}");

    if let Some(path) = report {
        std::fs::write(path, &rendered)
            .wrap_err_with(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "wrote run report");
    }

    if result["status"] == "success" {
        Ok(())
    } else {
        let message = result["message"].as_str().unwrap_or("run failed");
        Err(eyre!("{message}"))
    }
}

fn cmd_html(file: &Path, out: Option<&Path>, config: &AppConfig) -> Result<()> {
    let markdown = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let converter = converter_for(config.markdown.converter);
    let body = to_html_or_fallback(converter.as_ref(), &markdown);

    let title = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    let page = html_document(&title, &body);

    match out {
        Some(path) => {
            std::fs::write(path, page)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("HTML written to: {}", path.display());
        }
        None => print!("{page}"),
    }
    Ok(())
}

fn cmd_sample(
    out_dir: Option<PathBuf>,
    wkhtmltopdf: Option<&Path>,
    no_pdf: bool,
    config: &AppConfig,
) -> Result<()> {
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    std::fs::create_dir_all(&out_dir)
        .wrap_err_with(|| format!("failed to create {}", out_dir.display()))?;

    let renderer = if no_pdf {
        None
    } else {
        resolve_renderer_path(wkhtmltopdf, &config.render)
    };
    let exporter = WkhtmltopdfExporter::from_config(&config.render)
        .with_converter(converter_for(config.markdown.converter));

    let mut builder = DocumentBuilder::new()
        .with_renderer(renderer)
        .with_render_service(Box::new(exporter))
        .with_converter(converter_for(config.markdown.converter));
    write_sample(&mut builder)?;

    let output_md = out_dir.join("alice_in_wonderland.md");
    builder.generate(&output_md)?;
    println!("Markdown written to: {}", output_md.display());

    match builder.last_render_result() {
        Some(artifact) => {
            if let Some(pdf) = &artifact.output_path {
                println!("PDF written to: {}", pdf.display());
            }
        }
        None => println!(
            "PDF not generated: set {} to the wkhtmltopdf binary",
            config.render.env_var
        ),
    }
    Ok(())
}

/// Public-domain demo content exercising every block kind.
fn write_sample(builder: &mut DocumentBuilder) -> Result<()> {
    builder.add_header("Alice's Adventures in Wonderland", 1)?;
    builder.add_paragraph("Public-domain sampler inspired by Lewis Carroll (1865).");

    builder.add_header("Down the Rabbit-Hole", 2)?;
    builder.add_paragraph(
        "Alice was beginning to get very tired of sitting by her sister on the bank, \
         and of having nothing to do: once or twice she had peeped into the book her \
         sister was reading, but it had no pictures or conversations in it...",
    );
    builder.add_list(
        &[
            "Sees a White Rabbit with a pocket watch".into(),
            "Follows it down the rabbit-hole".into(),
            "Finds a hall with many locked doors".into(),
        ],
        true,
    );

    builder.add_header("A Curious Bottle", 2)?;
    builder.add_paragraph(
        "On a little table she found a bottle, on it was a paper label, \
         with the words \"DRINK ME\" beautifully printed on it.",
    );
    builder.add_table(
        &["Item".into(), "Effect".into()],
        &[
            vec!["Cake (EAT ME)".into(), "Grows tall".into()],
            vec!["Fan".into(), "Shrinks".into()],
            vec!["Key".into(), "Opens small door".into()],
        ],
    );
    builder.add_image(
        "Alice meets the White Rabbit (Tenniel, public domain)",
        "https://upload.wikimedia.org/wikipedia/commons/6/6f/Alice_par_John_Tenniel_02.png",
    );

    builder.add_header("Conclusion", 2)?;
    builder.add_paragraph(
        "This document demonstrates headers with numbering and TOC, \
         lists, tables, and images.",
    );

    // TOC goes on top once every header is known
    builder.add_toc();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
