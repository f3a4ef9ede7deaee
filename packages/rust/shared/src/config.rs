//! Application configuration for DocForge.
//!
//! User config lives at `~/.docforge/docforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocForgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docforge";

/// Environment variable that overrides the `wkhtmltopdf` location.
pub const RENDERER_ENV_VAR: &str = "DOCFORGE_WKHTMLTOPDF_PATH";

// ---------------------------------------------------------------------------
// Config structs (matching docforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// PDF renderer settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Markdown-to-HTML conversion settings.
    #[serde(default)]
    pub markdown: MarkdownConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory used by `docforge sample` when no `--out-dir` is given.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "out_docs".into()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Explicit `wkhtmltopdf` location. Consulted after the env override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkhtmltopdf_path: Option<String>,

    /// Name of the env var that overrides the renderer location.
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// Keep the intermediate HTML file next to the PDF.
    #[serde(default)]
    pub keep_html: bool,

    /// Extra arguments passed to the renderer before the input/output paths.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            wkhtmltopdf_path: None,
            env_var: default_env_var(),
            keep_html: false,
            extra_args: default_extra_args(),
        }
    }
}

fn default_env_var() -> String {
    RENDERER_ENV_VAR.into()
}
fn default_extra_args() -> Vec<String> {
    vec!["--quiet".into()]
}

/// `[markdown]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Which Markdown-to-HTML converter to use.
    #[serde(default)]
    pub converter: ConverterKind,
}

/// Selectable Markdown-to-HTML converter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    /// CommonMark rendering with tables.
    #[default]
    Commonmark,
    /// No converter; every conversion takes the `<pre>` fallback.
    None,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docforge/docforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocForgeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocForgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
