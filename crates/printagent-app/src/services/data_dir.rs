// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::PathBuf;

/// Environment variable pointing the agent at an explicit data directory.
pub const DATA_DIR_ENV: &str = "PRINTAGENT_DATA_DIR";

const APP_DIR: &str = "printagent";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => base_dir(
            std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
            std::env::var_os("APPDATA").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
        .join(APP_DIR),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// XDG data dir, then `%APPDATA%`, then `~/.local/share`, then the OS temp
/// directory.
fn base_dir(xdg: Option<PathBuf>, appdata: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    xdg.or(appdata)
        .or_else(|| home.map(|h| h.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir)
}
