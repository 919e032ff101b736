// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command surface.
//
// Every error that reaches the user is turned into a message plus a
// suggestion.  The raw error text is always kept in the message so nothing
// diagnostic is lost when it is shown in a terminal or log.

use crate::error::AgentError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or busy spooler; trying again may work.
    Transient,
    /// User must do something (install a driver, plug the cable in, log in).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }

    /// Single-line form used by the CLI.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.message, self.suggestion)
    }
}

/// Convert an `AgentError` into something a person at the desk can act on.
pub fn humanize_error(err: &AgentError) -> HumanError {
    let detail = err.to_string();
    match err {
        AgentError::UnsupportedPlatform(_) => HumanError::new(
            detail,
            "This operation is only available on Windows, macOS and Linux.",
            Severity::Permanent,
        ),

        AgentError::Connection(_) | AgentError::Timeout(_) => HumanError::new(
            detail,
            "Make sure the printer is on, on the same network, and that the IP address and port (usually 9100) are correct.",
            Severity::Transient,
        ),

        AgentError::File(_) => HumanError::new(
            detail,
            "Check that the file still exists and is readable.",
            Severity::ActionRequired,
        ),

        AgentError::UsbClaim(_) => HumanError::new(
            detail,
            "Another driver may own the device. Close other printing software or run the agent with sufficient permissions.",
            Severity::ActionRequired,
        ),

        AgentError::Usb(_) => HumanError::new(
            detail,
            "Check the USB cable and that the printer is switched on.",
            Severity::ActionRequired,
        ),

        AgentError::FallbackFailed { .. } => HumanError::new(
            detail,
            "Install the manufacturer's driver so the printer shows up in the system printer list.",
            Severity::ActionRequired,
        ),

        AgentError::Spooler(_) | AgentError::Command { .. } => HumanError::new(
            detail,
            "Open the system printer queue and check that the printer is not paused or in an error state.",
            Severity::Transient,
        ),

        AgentError::InvalidPrinterId(_) => HumanError::new(
            detail,
            "Choose the printer again from the list.",
            Severity::Permanent,
        ),

        AgentError::PrinterNotFound(_) => HumanError::new(
            detail,
            "The printer name must match a printer installed on this computer exactly.",
            Severity::ActionRequired,
        ),

        AgentError::JobContent(_) => HumanError::new(
            detail,
            "The job's file could not be fetched. It will be reported as failed.",
            Severity::Permanent,
        ),

        AgentError::Backend(_) => HumanError::new(
            detail,
            "Check the network connection and the API address in config.json.",
            Severity::Transient,
        ),

        AgentError::Unauthorized => HumanError::new(
            detail,
            "Log in again with the agent account.",
            Severity::ActionRequired,
        ),

        AgentError::Storage(_) => HumanError::new(
            detail,
            "Saved printers could not be read or written. Check the data directory permissions.",
            Severity::Transient,
        ),

        AgentError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                detail,
                "The file may have been moved or deleted. Choose it again.",
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                detail,
                "The agent is not allowed to read that file.",
                Severity::ActionRequired,
            ),
            _ => HumanError::new(detail, "Try again.", Severity::Transient),
        },

        AgentError::Serialization(_) => HumanError::new(
            detail,
            "Unexpected data format. If this keeps happening, please report it.",
            Severity::Permanent,
        ),
    }
}
