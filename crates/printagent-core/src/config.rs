// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the backend base URL.
pub const API_URL_ENV: &str = "API_URL";

const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

/// Persistent agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the backend API (without trailing slash).
    pub api_url: String,
    /// Job queue polling period.
    pub poll_interval_secs: u64,
    /// How long a system printer listing is reused before re-querying the OS.
    pub system_cache_ttl_secs: u64,
    /// Connect timeout for the TCP liveness probe.
    pub probe_timeout_ms: u64,
    /// Connect/write timeout when streaming a file to a RAW printer.
    pub send_timeout_ms: u64,
    /// Per-command timeout for spooler and discovery shell-outs.
    pub command_timeout_secs: u64,
    /// Upper bound for a single USB bulk transfer.
    pub usb_transfer_timeout_secs: u64,
    /// Directory for job content; defaults to `<os temp>/print-jobs`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            poll_interval_secs: 5,
            system_cache_ttl_secs: 30,
            probe_timeout_ms: 3_000,
            send_timeout_ms: 10_000,
            command_timeout_secs: 30,
            usb_transfer_timeout_secs: 30,
            temp_dir: None,
        }
    }
}

impl AgentConfig {
    /// Apply environment overrides (currently only `API_URL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            self.api_url = url;
        }
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn system_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.system_cache_ttl_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn usb_transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.usb_transfer_timeout_secs)
    }

    /// Resolved job-content directory.
    pub fn job_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("print-jobs"))
    }
}
