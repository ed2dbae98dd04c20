// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

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

fn normalize_data_relative(path: &Path) -> PathBuf {
    path.strip_prefix("data")
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn env_data_dir() -> Option<String> {
    non_empty(std::env::var(DATA_DIR_ENV).ok().as_deref())
}

/// Resolve the directory holding the state file:
/// 1) explicit setting, 2) `DATA_DIR`, 3) cwd-relative `./data`.
pub fn resolve_data_dir(explicit_data_dir: Option<&str>) -> PathBuf {
    match non_empty(explicit_data_dir).or_else(env_data_dir) {
        Some(dir) => absolute(PathBuf::from(dir)),
        None => absolute(PathBuf::from("data")),
    }
}

/// Absolute paths are kept. Relative ones land under the data dir when one is
/// configured, otherwise under the cwd. A leading `data/` is not doubled.
pub fn resolve_data_path(raw_path: &str, explicit_data_dir: Option<&str>) -> PathBuf {
    let as_path = PathBuf::from(raw_path.trim());
    if as_path.is_absolute() {
        return as_path;
    }
    if non_empty(explicit_data_dir).is_some() || env_data_dir().is_some() {
        return resolve_data_dir(explicit_data_dir).join(normalize_data_relative(&as_path));
    }
    absolute(as_path)
}

pub fn resolve_default_data_file(file_name: &str, explicit_data_dir: Option<&str>) -> PathBuf {
    resolve_data_dir(explicit_data_dir).join(file_name)
}
