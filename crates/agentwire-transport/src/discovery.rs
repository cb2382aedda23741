//! Agent CLI discovery
//!
//! Locates the Agent CLI binary: an explicit path wins, then `PATH`, then a
//! fixed list of well-known install locations. A leading `~` in paths is
//! expanded against the home directory.

use crate::error::{Result, TransportError};
use std::path::{Path, PathBuf};

/// Binary name of the Agent CLI
pub const CLI_BINARY: &str = "claude";

/// Env var that skips version validation on spawn
pub const SKIP_VERSION_CHECK_ENV: &str = "CLAUDE_AGENT_SDK_SKIP_VERSION_CHECK";

/// Expand a leading `~` against the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Well-known install locations, checked after `PATH`
fn well_known_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".npm-global/bin").join(CLI_BINARY));
        locations.push(home.join(".local/bin").join(CLI_BINARY));
        locations.push(home.join("node_modules/.bin").join(CLI_BINARY));
        locations.push(home.join(".yarn/bin").join(CLI_BINARY));
        locations.push(home.join(".claude/local").join(CLI_BINARY));
    }
    locations.push(PathBuf::from("/usr/local/bin").join(CLI_BINARY));
    locations.push(PathBuf::from("/opt/homebrew/bin").join(CLI_BINARY));
    locations
}

fn search_path_env() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(CLI_BINARY);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate the Agent CLI binary
///
/// `explicit` wins when given (after `~` expansion); otherwise `PATH` is
/// searched, then the well-known install locations.
pub fn find_cli(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let expanded = expand_tilde(path);
        if expanded.is_file() {
            return Ok(expanded);
        }
        return Err(TransportError::CliNotFound(format!(
            "explicit path {} does not exist",
            expanded.display()
        )));
    }

    if let Some(found) = search_path_env() {
        return Ok(found);
    }

    for candidate in well_known_locations() {
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(TransportError::CliNotFound(format!(
        "`{CLI_BINARY}` not found on PATH or in known install locations; \
         install the Agent CLI or pass an explicit path"
    )))
}

/// Whether version validation should be skipped for this spawn
///
/// True when the caller-supplied env map or the process environment sets
/// [`SKIP_VERSION_CHECK_ENV`] to a non-empty value.
pub fn skip_version_check(extra_env: &std::collections::HashMap<String, String>) -> bool {
    if let Some(v) = extra_env.get(SKIP_VERSION_CHECK_ENV) {
        return !v.is_empty();
    }
    std::env::var(SKIP_VERSION_CHECK_ENV)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}
