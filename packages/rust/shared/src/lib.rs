//! Shared types, error model, and configuration for DocForge.
//!
//! This crate is the foundation depended on by all other DocForge crates.
//! It provides:
//! - [`DocForgeError`], the unified error type
//! - Domain types ([`RenderArtifact`])
//! - Configuration ([`AppConfig`], [`RenderConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConverterKind, DefaultsConfig, MarkdownConfig, RENDERER_ENV_VAR, RenderConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocForgeError, Result};
pub use types::{RUN_SCHEMA_VERSION, RenderArtifact};
