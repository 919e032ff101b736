// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the printagent dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Prefix selecting the USB transport in a printer identifier.
pub const USB_PREFIX: &str = "usb_";

/// Prefix selecting the OS spooler in a printer identifier.
pub const SYSTEM_PREFIX: &str = "system_";

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Format a USB vendor/product pair as the stable device id `vvvv:pppp`.
pub fn usb_device_id(vendor_id: u16, product_id: u16) -> String {
    format!("{vendor_id:04x}:{product_id:04x}")
}

/// Parse a `vvvv:pppp` hex pair.
pub fn parse_usb_device_id(id: &str) -> Option<(u16, u16)> {
    let (vendor, product) = id.trim().split_once(':')?;
    let vendor = u16::from_str_radix(vendor.trim(), 16).ok()?;
    let product = u16::from_str_radix(product.trim(), 16).ok()?;
    Some((vendor, product))
}

/// A printer saved by the user.  Persisted under the `printers` store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub is_usb: bool,
    #[serde(default, alias = "isOnline")]
    pub is_connected: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Id assigned by the backend once the printer has been synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<i64>,
}

impl PrinterRecord {
    /// A network RAW printer entry.
    pub fn network(id: impl Into<String>, name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vendor_id: None,
            product_id: None,
            is_usb: false,
            is_connected: false,
            is_default: false,
            last_used: None,
            last_checked: None,
            ip_address: Some(ip.into()),
            port: Some(port),
            backend_id: None,
        }
    }

    /// Identifier accepted by the universal dispatcher for this record.
    pub fn dispatch_id(&self) -> Option<String> {
        if self.is_usb {
            Some(format!("{USB_PREFIX}{}", self.id))
        } else if self.ip_address.is_none() {
            Some(format!("{SYSTEM_PREFIX}{}", self.name))
        } else {
            None
        }
    }
}

impl From<&DiscoveredUsbDevice> for PrinterRecord {
    fn from(device: &DiscoveredUsbDevice) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            vendor_id: Some(format!("{:04x}", device.vendor_id)),
            product_id: Some(format!("{:04x}", device.product_id)),
            is_usb: true,
            is_connected: device.is_connected,
            is_default: false,
            last_used: None,
            last_checked: Some(Utc::now()),
            ip_address: None,
            port: None,
            backend_id: None,
        }
    }
}

/// A USB printer-class device found on the host bus.  Recomputed on every
/// discovery call and never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredUsbDevice {
    /// `vvvv:pppp` lower-case hex.
    pub id: String,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub brand: String,
    pub is_usb: bool,
    pub is_connected: bool,
}

/// Readiness of an OS-registered printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterState {
    Ready,
    Busy,
    Offline,
    /// Status text reported by the OS that maps to none of the above.
    Other(String),
}

impl std::fmt::Display for PrinterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Busy => f.write_str("busy"),
            Self::Offline => f.write_str("offline"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

/// How an OS-registered printer is attached.  Best guess from the port name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Usb,
    Network,
    Virtual,
    Local,
}

/// Heuristic capability guess for a system printer.  Not authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterCapabilities {
    pub duplex: bool,
    pub color: bool,
    pub paper_sizes: Vec<String>,
    pub max_resolution: String,
}

/// A printer registered with the operating system's print spooler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPrinter {
    pub name: String,
    pub driver: String,
    pub is_default: bool,
    pub status: PrinterState,
    pub connection_type: ConnectionType,
    pub capabilities: PrinterCapabilities,
}

/// Backend job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Printing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Printing => "printing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Printer reference embedded in a backend job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPrinter {
    pub id: i64,
    pub name: String,
}

/// A print job as returned by the backend queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: i64,
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub file_url: Option<String>,
    /// Local file the backend asks us to print in place of a download.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub pages: u32,
    #[serde(default = "one")]
    pub copies: u32,
    #[serde(default)]
    pub color_mode: String,
    #[serde(default)]
    pub paper_size: String,
    #[serde(default)]
    pub duplex: bool,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub printer: JobPrinter,
}

fn one() -> u32 {
    1
}

impl PrintJob {
    /// File extension for the temp copy, taken from the declared filename.
    pub fn file_extension(&self) -> &str {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("pdf")
    }
}

/// Options applied to a single print request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOptions {
    pub copies: u32,
    pub color: bool,
    pub duplex: bool,
    pub paper_size: Option<String>,
    pub priority: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            copies: 1,
            color: true,
            duplex: false,
            paper_size: None,
            priority: false,
        }
    }
}

impl PrintOptions {
    /// Copy count clamped to at least one.
    pub fn copies(&self) -> u32 {
        self.copies.max(1)
    }
}

impl From<&PrintJob> for PrintOptions {
    fn from(job: &PrintJob) -> Self {
        Self {
            copies: job.copies.max(1),
            color: job.color_mode == "color",
            duplex: job.duplex,
            paper_size: Some(job.paper_size.clone()).filter(|p| !p.is_empty()),
            priority: job.priority == "high",
        }
    }
}

/// Result of a TCP liveness probe.  Probes never fail with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub status: ConnectionStatus,
    pub message: String,
}

/// Outcome of a command on the user-facing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Transport selected by a printer identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterTarget {
    Usb { vendor_id: u16, product_id: u16 },
    System(String),
}

impl PrinterTarget {
    /// Parse `usb_<vvvv>:<pppp>`, `system_<name>`, or a bare legacy system
    /// printer name.
    pub fn parse(printer_id: &str) -> Result<Self> {
        if let Some(rest) = printer_id.strip_prefix(USB_PREFIX) {
            let (vendor_id, product_id) = parse_usb_device_id(rest)
                .ok_or_else(|| AgentError::InvalidPrinterId(printer_id.to_string()))?;
            return Ok(Self::Usb {
                vendor_id,
                product_id,
            });
        }

        let name = printer_id.strip_prefix(SYSTEM_PREFIX).unwrap_or(printer_id);
        if name.trim().is_empty() {
            return Err(AgentError::InvalidPrinterId(printer_id.to_string()));
        }
        Ok(Self::System(name.to_string()))
    }
}

/// Notification emitted by the job processor after each job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum JobEvent {
    JobCompleted { job_id: String },
    JobFailed { job_id: String, error: String },
}
