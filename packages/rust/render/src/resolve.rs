//! Renderer location resolution.
//!
//! Resolved once, before a builder is constructed. The builder itself only
//! ever sees the final `Option<PathBuf>`.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use docforge_shared::RenderConfig;

/// Well-known install locations for `wkhtmltopdf` on this platform.
pub fn platform_default_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![PathBuf::from(
            r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe",
        )]
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/usr/local/bin/wkhtmltopdf"),
            PathBuf::from("/opt/homebrew/bin/wkhtmltopdf"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/local/bin/wkhtmltopdf"),
            PathBuf::from("/usr/bin/wkhtmltopdf"),
        ]
    }
}

/// Resolve the renderer location from the process environment.
///
/// See [`resolve_renderer_path_with`] for the priority order.
pub fn resolve_renderer_path(explicit: Option<&Path>, config: &RenderConfig) -> Option<PathBuf> {
    resolve_renderer_path_with(
        explicit,
        config,
        |name| std::env::var_os(name),
        &platform_default_paths(),
    )
}

/// Resolve the renderer location.
///
/// Priority:
/// 1. `explicit`, taken as-is. An empty path disables rendering.
/// 2. The env var named by `config.env_var`, if it points at an existing file.
/// 3. `config.wkhtmltopdf_path`, taken as-is.
/// 4. The first of `defaults` that exists.
///
/// `None` means unconfigured: no render will be attempted.
pub fn resolve_renderer_path_with<F>(
    explicit: Option<&Path>,
    config: &RenderConfig,
    env: F,
    defaults: &[PathBuf],
) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(path) = explicit {
        if path.as_os_str().is_empty() {
            debug!("renderer explicitly disabled");
            return None;
        }
        debug!(path = %path.display(), "renderer from explicit argument");
        return Some(path.to_path_buf());
    }

    if let Some(value) = env(&config.env_var).filter(|v| !v.is_empty()) {
        let candidate = PathBuf::from(value);
        if candidate.is_file() {
            debug!(var = %config.env_var, path = %candidate.display(), "renderer from environment");
            return Some(candidate);
        }
        debug!(var = %config.env_var, path = %candidate.display(), "env override is not a file, ignoring");
    }

    if let Some(path) = config.wkhtmltopdf_path.as_deref().filter(|p| !p.is_empty()) {
        debug!(path, "renderer from config file");
        return Some(PathBuf::from(path));
    }

    let found = defaults.iter().find(|p| p.is_file()).cloned();
    match &found {
        Some(path) => debug!(path = %path.display(), "renderer from platform default"),
        None => debug!("no renderer configured"),
    }
    found
}

/// Locate an executable for a configured renderer path.
///
/// An existing file is returned unchanged. A bare command name (no directory
/// part) is searched for on `PATH`. Anything else is `None`.
pub fn find_binary(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let mut components = path.components();
    let is_bare_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !is_bare_name {
        return None;
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path).find_map(|dir| {
        let candidate = dir.join(path);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}
