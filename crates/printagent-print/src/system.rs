// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OS-registered printer discovery.
//
// Windows is queried through an ordered list of strategies (structured
// PowerShell JSON, plain PowerShell names, wmic).  macOS and Linux use
// `lpstat`.  Listings are cached in-process for a short TTL because the
// PowerShell queries are slow.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{ConnectionType, LocalPrinter, PrinterCapabilities, PrinterState};

use crate::command::{CommandRunner, Platform, powershell, ps_quote};

/// Anything that can list the OS printers.  Listing never fails: errors
/// produce an empty list.
#[async_trait]
pub trait PrinterSource: Send + Sync {
    async fn system_printers(&self) -> Vec<LocalPrinter>;
}

/// Windows discovery strategies, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsListing {
    CimJson,
    PowerShellNames,
    Wmic,
}

pub const WINDOWS_LISTING_CHAIN: &[WindowsListing] = &[
    WindowsListing::CimJson,
    WindowsListing::PowerShellNames,
    WindowsListing::Wmic,
];

impl WindowsListing {
    fn command(&self) -> (String, Vec<String>) {
        match self {
            Self::CimJson => powershell(
                "Get-CimInstance Win32_Printer | Select-Object Name, DriverName, PortName, Default, PrinterStatus | ConvertTo-Json",
            ),
            Self::PowerShellNames => {
                powershell("Get-Printer | Select-Object -ExpandProperty Name")
            }
            Self::Wmic => (
                "wmic".into(),
                vec![
                    "printer".into(),
                    "get".into(),
                    "Name,DriverName,Default".into(),
                    "/format:list".into(),
                ],
            ),
        }
    }

    fn parse(&self, output: &str) -> Vec<LocalPrinter> {
        match self {
            Self::CimJson => parse_powershell_json(output),
            Self::PowerShellNames => parse_name_lines(output),
            Self::Wmic => parse_wmic_list(output),
        }
    }
}

struct CachedListing {
    at: Instant,
    printers: Vec<LocalPrinter>,
}

/// Platform-dispatched system printer discovery with a TTL cache.
pub struct SystemPrinters {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
    ttl: Duration,
    cache: Mutex<Option<CachedListing>>,
}

impl SystemPrinters {
    pub fn new(runner: Arc<dyn CommandRunner>, platform: Platform, ttl: Duration) -> Self {
        Self {
            runner,
            platform,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Cached listing, refreshed once the TTL has passed.
    pub async fn list(&self) -> Vec<LocalPrinter> {
        if let Some(printers) = self.cached() {
            debug!(count = printers.len(), "system printers from cache");
            return printers;
        }

        let printers = self.query().await;
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(CachedListing {
                at: Instant::now(),
                printers: printers.clone(),
            });
        }
        printers
    }

    /// Drop the cached listing so the next call re-queries the OS.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }

    fn cached(&self) -> Option<Vec<LocalPrinter>> {
        let cache = self.cache.lock().ok()?;
        cache
            .as_ref()
            .filter(|c| c.at.elapsed() < self.ttl)
            .map(|c| c.printers.clone())
    }

    #[instrument(skip(self), fields(platform = self.platform.name()))]
    async fn query(&self) -> Vec<LocalPrinter> {
        let printers = match self.platform {
            Platform::Windows => self.query_windows().await,
            Platform::MacOs | Platform::Linux => self.query_lpstat().await,
            Platform::Other => {
                warn!("system printer discovery is not available on this platform");
                Vec::new()
            }
        };
        info!(count = printers.len(), "system printers discovered");
        printers
    }

    async fn query_windows(&self) -> Vec<LocalPrinter> {
        for strategy in WINDOWS_LISTING_CHAIN {
            let (program, args) = strategy.command();
            match self.runner.run(&program, &args).await {
                Ok(output) => {
                    let printers = strategy.parse(&output);
                    if !printers.is_empty() {
                        debug!(?strategy, count = printers.len(), "printer listing strategy succeeded");
                        return printers;
                    }
                    debug!(?strategy, "printer listing strategy returned nothing");
                }
                Err(e) => warn!(?strategy, error = %e, "printer listing strategy failed"),
            }
        }
        Vec::new()
    }

    async fn query_lpstat(&self) -> Vec<LocalPrinter> {
        match self
            .runner
            .run("lpstat", &["-p".to_string(), "-d".to_string()])
            .await
        {
            Ok(output) => parse_lpstat(&output),
            Err(e) => {
                warn!(error = %e, "lpstat failed");
                Vec::new()
            }
        }
    }

    /// Current readiness of a single printer.
    #[instrument(skip(self))]
    pub async fn printer_status(&self, name: &str) -> Result<PrinterState> {
        match self.platform {
            Platform::MacOs | Platform::Linux => {
                let output = self
                    .runner
                    .run("lpstat", &["-p".to_string(), name.to_string()])
                    .await?;
                Ok(status_from_lpstat(&output))
            }
            Platform::Windows => {
                let listed = self.list().await.iter().any(|p| p.name == name);
                Ok(if listed {
                    PrinterState::Ready
                } else {
                    PrinterState::Offline
                })
            }
            Platform::Other => Err(AgentError::UnsupportedPlatform(
                self.platform.name().to_string(),
            )),
        }
    }

    /// Cancel a spooler job by its OS job id.
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
        if !self.platform.is_cups() {
            return Err(AgentError::UnsupportedPlatform(format!(
                "cancelling spooler jobs is not supported on {}",
                self.platform.name()
            )));
        }
        self.runner.run("cancel", &[job_id.to_string()]).await?;
        info!(job_id, "spooler job cancelled");
        Ok(())
    }

    /// PowerShell script used by the spooler for queue diagnostics.
    pub fn queue_query(printer: &str) -> (String, Vec<String>) {
        powershell(format!("Get-PrintJob -PrinterName {} | Format-List", ps_quote(printer)))
    }
}

#[async_trait]
impl PrinterSource for SystemPrinters {
    async fn system_printers(&self) -> Vec<LocalPrinter> {
        self.list().await
    }
}

// -- Parsers --

fn printer(name: &str, driver: &str, is_default: bool, status: PrinterState, port: &str) -> LocalPrinter {
    LocalPrinter {
        name: name.to_string(),
        driver: driver.to_string(),
        is_default,
        status,
        connection_type: connection_type(name, port),
        capabilities: derive_capabilities(name, driver),
    }
}

/// Parse `lpstat -p -d` output.
pub fn parse_lpstat(output: &str) -> Vec<LocalPrinter> {
    let default = output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("system default destination:")
            .map(|name| name.trim().to_string())
    });

    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("printer ")?;
            let mut words = rest.split_whitespace();
            let name = words.next()?;
            let status_text: Vec<&str> = words.collect();
            let status = status_from_words(&status_text.join(" "));
            let is_default = default.as_deref() == Some(name);
            Some(printer(name, "", is_default, status, ""))
        })
        .collect()
}

fn status_from_words(text: &str) -> PrinterState {
    let lower = text.to_lowercase();
    if lower.contains("idle") {
        PrinterState::Ready
    } else if lower.contains("printing") {
        PrinterState::Busy
    } else if lower.contains("disabled") {
        PrinterState::Offline
    } else {
        PrinterState::Other(text.trim().trim_start_matches("is ").trim_end_matches('.').to_string())
    }
}

/// `lpstat -p <name>` output mapped to ready / busy / offline.
pub fn status_from_lpstat(output: &str) -> PrinterState {
    let lower = output.to_lowercase();
    if lower.contains("idle") {
        PrinterState::Ready
    } else if lower.contains("printing") {
        PrinterState::Busy
    } else {
        PrinterState::Offline
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CimPrinter {
    name: String,
    #[serde(default)]
    driver_name: Option<String>,
    #[serde(default)]
    port_name: Option<String>,
    #[serde(default)]
    default: Option<bool>,
    #[serde(default)]
    printer_status: Option<u32>,
}

/// `Win32_Printer.PrinterStatus` codes.
fn cim_status(code: Option<u32>) -> PrinterState {
    match code {
        Some(3) | None => PrinterState::Ready,
        Some(4) | Some(5) => PrinterState::Busy,
        Some(7) => PrinterState::Offline,
        Some(other) => PrinterState::Other(format!("status {other}")),
    }
}

/// Parse `ConvertTo-Json` output.  PowerShell emits a bare object when only
/// one printer exists.
pub fn parse_powershell_json(output: &str) -> Vec<LocalPrinter> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let rows: Vec<CimPrinter> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        serde_json::from_str::<CimPrinter>(trimmed)
            .map(|p| vec![p])
            .unwrap_or_default()
    };

    rows.into_iter()
        .filter(|p| !p.name.trim().is_empty())
        .map(|p| {
            printer(
                p.name.trim(),
                p.driver_name.as_deref().unwrap_or(""),
                p.default.unwrap_or(false),
                cim_status(p.printer_status),
                p.port_name.as_deref().unwrap_or(""),
            )
        })
        .collect()
}

/// One printer name per line.
pub fn parse_name_lines(output: &str) -> Vec<LocalPrinter> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| printer(name, "", false, PrinterState::Ready, ""))
        .collect()
}

/// `wmic ... /format:list`: blank-line separated `Key=Value` blocks.
pub fn parse_wmic_list(output: &str) -> Vec<LocalPrinter> {
    let mut printers = Vec::new();
    let mut name = None;
    let mut driver = String::new();
    let mut is_default = false;

    let mut flush = |name: &mut Option<String>, driver: &mut String, is_default: &mut bool| {
        if let Some(n) = name.take() {
            printers.push(printer(&n, driver, *is_default, PrinterState::Ready, ""));
        }
        driver.clear();
        *is_default = false;
    };

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut name, &mut driver, &mut is_default);
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" if !value.is_empty() => name = Some(value.to_string()),
            "DriverName" => driver = value.to_string(),
            "Default" => is_default = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }
    flush(&mut name, &mut driver, &mut is_default);
    printers
}

/// Guess capabilities from the name and driver.  Not authoritative.
pub fn derive_capabilities(name: &str, driver: &str) -> PrinterCapabilities {
    let text = format!("{name} {driver}").to_lowercase();
    let laser = text.contains("laser");
    let color = text.contains("color")
        || text.contains("colour")
        || (!laser && ["epson", "inkjet", "deskjet", "pixma", "officejet"].iter().any(|k| text.contains(k)));
    // Model suffixes like `p2055dn` or `m227dw` mark duplex units.
    let duplex = text.contains("duplex")
        || text
            .split_whitespace()
            .any(|word| word.len() > 2 && (word.ends_with("dn") || word.ends_with("dw")));

    let mut paper_sizes = vec!["A4".to_string(), "Letter".to_string()];
    if !text.contains("l3150") && !text.contains("1020") {
        paper_sizes.push("A5".to_string());
    }

    PrinterCapabilities {
        duplex,
        color,
        paper_sizes,
        max_resolution: if laser { "600x600" } else { "1200x1200" }.to_string(),
    }
}

/// Guess the attachment type from the name and port.
pub fn connection_type(name: &str, port: &str) -> ConnectionType {
    let port = port.to_lowercase();
    if crate::vendors::is_virtual_printer(name) || port.starts_with("portprompt") || port == "nul:" {
        ConnectionType::Virtual
    } else if port.starts_with("usb") {
        ConnectionType::Usb
    } else if port.starts_with("ip_") || port.starts_with("wsd") || port.contains("://") || port.contains('.') {
        ConnectionType::Network
    } else {
        ConnectionType::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{ScriptedRunner, failure};

    const LPSTAT: &str = "printer Office_Laser is idle.  enabled since Mon 01 Jan 2026\n\
printer Label_Zebra disabled since Tue 02 Jan 2026 -\n\
\treason unknown\n\
printer Epson_L3150 now printing Epson_L3150-12.  enabled since Wed\n\
system default destination: Epson_L3150\n";

    #[test]
    fn lpstat_output_is_parsed() {
        let printers = parse_lpstat(LPSTAT);
        assert_eq!(printers.len(), 3);
        assert_eq!(printers[0].name, "Office_Laser");
        assert_eq!(printers[0].status, PrinterState::Ready);
        assert_eq!(printers[1].status, PrinterState::Offline);
        assert_eq!(printers[2].status, PrinterState::Busy);
        assert!(printers[2].is_default);
        assert!(!printers[0].is_default);
    }

    #[test]
    fn powershell_json_single_object_and_array() {
        let single = r#"{"Name":"HP LaserJet 1020","DriverName":"HP LaserJet 1020","PortName":"USB001","Default":true,"PrinterStatus":3}"#;
        let printers = parse_powershell_json(single);
        assert_eq!(printers.len(), 1);
        assert!(printers[0].is_default);
        assert_eq!(printers[0].connection_type, ConnectionType::Usb);
        assert_eq!(printers[0].status, PrinterState::Ready);

        let many = r#"[
            {"Name":"Microsoft Print to PDF","DriverName":"Microsoft Print To PDF","PortName":"PORTPROMPT:","Default":false,"PrinterStatus":3},
            {"Name":"Office","DriverName":"Generic","PortName":"IP_192.168.1.20","Default":false,"PrinterStatus":7}
        ]"#;
        let printers = parse_powershell_json(many);
        assert_eq!(printers.len(), 2);
        assert_eq!(printers[0].connection_type, ConnectionType::Virtual);
        assert_eq!(printers[1].connection_type, ConnectionType::Network);
        assert_eq!(printers[1].status, PrinterState::Offline);

        assert!(parse_powershell_json("not json").is_empty());
    }

    #[test]
    fn wmic_blocks_are_parsed() {
        let output = "\r\n\r\nDefault=FALSE\r\nDriverName=Microsoft XPS Document Writer v4\r\nName=Microsoft XPS Document Writer\r\n\r\n\
Default=TRUE\r\nDriverName=EPSON L3150 Series\r\nName=EPSON L3150 Series\r\n\r\n";
        let printers = parse_wmic_list(output);
        assert_eq!(printers.len(), 2);
        assert_eq!(printers[1].name, "EPSON L3150 Series");
        assert_eq!(printers[1].driver, "EPSON L3150 Series");
        assert!(printers[1].is_default);
        assert!(!printers[0].is_default);
    }

    #[test]
    fn capability_heuristics() {
        let laser = derive_capabilities("HP LaserJet P2055dn", "");
        assert!(!laser.color);
        assert!(laser.duplex);
        assert_eq!(laser.max_resolution, "600x600");

        let epson = derive_capabilities("EPSON L3150 Series", "");
        assert!(epson.color);
        assert!(!epson.paper_sizes.contains(&"A5".to_string()));
    }

    #[tokio::test]
    async fn windows_falls_through_to_first_non_empty_strategy() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            failure("Get-CimInstance not recognized"),
            Ok(String::new()),
            Ok("Name=Office\r\nDriverName=Generic\r\nDefault=TRUE\r\n".into()),
        ]));
        let system = SystemPrinters::new(runner.clone(), Platform::Windows, Duration::from_secs(30));
        let printers = system.list().await;
        assert_eq!(printers.len(), 1);
        assert_eq!(printers[0].name, "Office");
        assert_eq!(runner.calls().len(), 3);
        assert!(runner.calls()[2].starts_with("wmic"));
    }

    #[tokio::test]
    async fn windows_all_strategies_failing_yields_empty_list() {
        let runner = Arc::new(ScriptedRunner::new(vec![failure("a"), failure("b"), failure("c")]));
        let system = SystemPrinters::new(runner, Platform::Windows, Duration::from_secs(30));
        assert!(system.list().await.is_empty());
    }

    #[tokio::test]
    async fn listing_is_cached_until_invalidated() {
        let runner = Arc::new(ScriptedRunner::new(vec![Ok(LPSTAT.into()), Ok(LPSTAT.into())]));
        let system = SystemPrinters::new(runner.clone(), Platform::Linux, Duration::from_secs(30));

        assert_eq!(system.list().await.len(), 3);
        assert_eq!(system.list().await.len(), 3);
        assert_eq!(runner.calls().len(), 1);

        system.invalidate();
        system.list().await;
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn printer_status_uses_lpstat_on_unix() {
        let runner = Arc::new(ScriptedRunner::new(vec![Ok(
            "printer Office is idle.  enabled since Mon\n".into(),
        )]));
        let system = SystemPrinters::new(runner.clone(), Platform::Linux, Duration::from_secs(30));
        assert_eq!(system.printer_status("Office").await.expect("status"), PrinterState::Ready);
        assert_eq!(runner.calls(), vec!["lpstat -p Office".to_string()]);
    }

    #[tokio::test]
    async fn cancel_job_is_unsupported_on_windows() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let system = SystemPrinters::new(runner.clone(), Platform::Windows, Duration::from_secs(30));
        assert!(system.cancel_job("12").await.is_err());
        assert!(runner.calls().is_empty());

        let runner = Arc::new(ScriptedRunner::new(vec![Ok(String::new())]));
        let system = SystemPrinters::new(runner.clone(), Platform::Linux, Duration::from_secs(30));
        system.cancel_job("Office-12").await.expect("cancel");
        assert_eq!(runner.calls(), vec!["cancel Office-12".to_string()]);
    }
}
