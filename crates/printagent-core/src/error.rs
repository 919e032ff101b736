// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for printagent.
//
// Variants carry the human-readable message verbatim: callers on the command
// surface show `to_string()` directly, so the `#[error]` format of the
// transport variants is just `{0}`.

use thiserror::Error;

/// Top-level error type for all printagent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // -- Transports --
    /// Socket-level failure talking to a network printer.
    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Timeout(String),

    /// Local file missing or unreadable before a transfer.
    #[error("{0}")]
    File(String),

    /// USB device lookup, open or transfer failure.
    #[error("{0}")]
    Usb(String),

    /// The printer interface could not be claimed (driver / permissions).
    #[error("{0}")]
    UsbClaim(String),

    /// Every spooler strategy failed, or a shell command exited non-zero.
    #[error("{0}")]
    Spooler(String),

    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    // -- Dispatch --
    #[error("invalid printer id: {0}")]
    InvalidPrinterId(String),

    #[error("Printer {0} not found")]
    PrinterNotFound(String),

    /// USB printing failed and the system-printer fallback did too.
    #[error("USB printing failed: {usb_error}; fallback: {fallback}")]
    FallbackFailed { usb_error: String, fallback: String },

    // -- Jobs / backend --
    /// The job carried neither a usable local path nor a download URL.
    #[error("{0}")]
    JobContent(String),

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("not authenticated with the backend")]
    Unauthorized,

    // -- Storage / persistence --
    #[error("storage error: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether the underlying USB stack reported the operation as unsupported
    /// (libusb `LIBUSB_ERROR_NOT_SUPPORTED`, usually a missing WinUSB driver).
    pub fn is_usb_not_supported(detail: &str) -> bool {
        let lower = detail.to_ascii_lowercase();
        lower.contains("not_supported") || lower.contains("not supported")
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AgentError>;
