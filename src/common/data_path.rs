// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "DATA_DIR";

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn strip_data_prefix(path: &Path) -> PathBuf {
    path.strip_prefix("data")
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn env_data_dir() -> Option<String> {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Active data directory: explicit setting, then `DATA_DIR`, then `./data`.
pub fn resolve_data_dir(explicit_data_dir: Option<&str>) -> PathBuf {
    let chosen = explicit_data_dir
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(env_data_dir);
    match chosen {
        Some(dir) => absolute(PathBuf::from(dir)),
        None => absolute(PathBuf::from("data")),
    }
}

/// Absolute paths pass through; relative ones (with or without a leading
/// `data/`) resolve under the active data directory.
pub fn resolve_data_path(raw_path: &str, explicit_data_dir: Option<&str>) -> PathBuf {
    let as_path = PathBuf::from(raw_path);
    if as_path.is_absolute() {
        return as_path;
    }
    resolve_data_dir(explicit_data_dir).join(strip_data_prefix(&as_path))
}

pub fn resolve_required_data_path(
    raw_path: &str,
    explicit_data_dir: Option<&str>,
) -> Result<PathBuf, AppError> {
    let resolved = resolve_data_path(raw_path, explicit_data_dir);
    if resolved.exists() {
        return Ok(resolved);
    }
    Err(AppError::Config(format!(
        "expected at {}; set DATA_DIR",
        resolved.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_untouched() {
        let resolved = resolve_data_path("/etc/tokenlist.json", Some("/srv/data"));
        assert_eq!(resolved, PathBuf::from("/etc/tokenlist.json"));
    }

    #[test]
    fn data_prefix_is_not_doubled() {
        let resolved = resolve_data_path("data/tokenlist.json", Some("/srv/data"));
        assert_eq!(resolved, PathBuf::from("/srv/data/tokenlist.json"));
    }

    #[test]
    fn missing_required_path_is_a_config_error() {
        let err = resolve_required_data_path("definitely-missing.json", Some("/nonexistent-dir"))
            .expect_err("missing file");
        assert!(matches!(err, AppError::Config(msg) if msg.contains("set DATA_DIR")));
    }
}
