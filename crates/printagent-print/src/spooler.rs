// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OS print spooler adapter.
//
// Windows has no single reliable way to hand a file to a named printer from
// a background process, so a chain of methods is tried in order until one
// succeeds.  Unix hands the file to CUPS with `lp`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::PrintOptions;

use crate::command::{CommandRunner, Invocation, Platform, powershell, ps_quote};
use crate::system::SystemPrinters;

/// Submits a file to an OS-registered printer.
#[async_trait]
pub trait Spooler: Send + Sync {
    async fn print_file(&self, printer_name: &str, file: &Path, options: &PrintOptions) -> Result<()>;
}

/// Windows submission methods, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsPrintMethod {
    /// `Start-Process -Verb PrintTo` with the printer as argument.
    PrintToVerb,
    /// `Shell.Application` `InvokeVerbEx("printto")`.
    ShellInvokeVerb,
    /// `print /D:"<printer>" "<file>"` (plain text and PCL only).
    PrintCommand,
    /// Make the printer the default, then `Start-Process -Verb Print`.
    DefaultPrinterVerb,
    /// `System.Drawing.Printing.PrintDocument`.
    PrintDocument,
}

pub const WINDOWS_PRINT_CHAIN: &[WindowsPrintMethod] = &[
    WindowsPrintMethod::PrintToVerb,
    WindowsPrintMethod::ShellInvokeVerb,
    WindowsPrintMethod::PrintCommand,
    WindowsPrintMethod::DefaultPrinterVerb,
    WindowsPrintMethod::PrintDocument,
];

const SET_DEFAULT_PRINTER_TYPE: &str = "Add-Type -TypeDefinition 'using System.Runtime.InteropServices; \
public static class PrinterDefaults { [DllImport(\"winspool.drv\", CharSet = CharSet.Auto, SetLastError = true)] \
public static extern bool SetDefaultPrinter(string name); }'";

impl WindowsPrintMethod {
    /// Command submitting `file` to `printer`.
    pub fn command(&self, printer: &str, file: &str, options: &PrintOptions) -> Invocation {
        let p = ps_quote(printer);
        let f = ps_quote(file);
        let script = match self {
            Self::PrintToVerb => powershell(format!(
                "Start-Process -FilePath {f} -Verb PrintTo -ArgumentList {} -WindowStyle Hidden",
                ps_quote(&format!("\"{printer}\""))
            )),
            Self::ShellInvokeVerb => powershell(format!(
                "if (-not (Test-Path -LiteralPath {f})) {{ throw 'file not found' }}; \
$shell = New-Object -ComObject Shell.Application; \
$folder = $shell.Namespace((Split-Path -LiteralPath {f} -Parent)); \
$item = $folder.ParseName((Split-Path -LiteralPath {f} -Leaf)); \
$item.InvokeVerbEx('printto', {})",
                ps_quote(&format!("\"{printer}\""))
            )),
            // `print` reads the device switch itself and wants the quotes
            // after the colon, which argument quoting cannot produce.
            Self::PrintCommand => {
                return Invocation::Raw {
                    program: "print".into(),
                    line: format!("/D:\"{printer}\" \"{file}\""),
                };
            }
            Self::DefaultPrinterVerb => powershell(format!(
                "{SET_DEFAULT_PRINTER_TYPE}; \
if (-not [PrinterDefaults]::SetDefaultPrinter({p})) {{ throw 'SetDefaultPrinter failed' }}; \
Start-Process -FilePath {f} -Verb Print -WindowStyle Hidden"
            )),
            Self::PrintDocument => {
                let color = if options.color { "$true" } else { "$false" };
                let duplex = if options.duplex {
                    "$doc.PrinterSettings.Duplex = [System.Drawing.Printing.Duplex]::Vertical; "
                } else {
                    ""
                };
                powershell(format!(
                    "Add-Type -AssemblyName System.Drawing; \
$doc = New-Object System.Drawing.Printing.PrintDocument; \
$doc.PrinterSettings.PrinterName = {p}; \
if (-not $doc.PrinterSettings.IsValid) {{ throw 'printer is not valid' }}; \
$doc.DocumentName = {f}; \
$doc.DefaultPageSettings.Color = {color}; \
{duplex}$doc.Print()"
                ))
            }
        };
        script.into()
    }
}

/// `lp` arguments for a CUPS submission.
pub fn lp_args(printer: &str, file: &str, options: &PrintOptions) -> Vec<String> {
    let mut args = vec!["-d".to_string(), printer.to_string()];
    if options.copies() > 1 {
        args.push("-n".into());
        args.push(options.copies().to_string());
    }
    if options.duplex {
        args.push("-o".into());
        args.push("sides=two-sided-long-edge".into());
    }
    if let Some(paper) = options.paper_size.as_deref().filter(|p| !p.is_empty()) {
        args.push("-o".into());
        args.push(format!("media={paper}"));
    }
    if !options.color {
        args.push("-o".into());
        args.push("ColorModel=Gray".into());
    }
    if options.priority {
        // CUPS priority runs 1..=100 with 50 as the default.
        args.push("-q".into());
        args.push("100".into());
    }
    args.push(file.to_string());
    args
}

/// Spooler backed by the platform's command line tools.
pub struct SystemSpooler {
    runner: Arc<dyn CommandRunner>,
    platform: Platform,
    queue_probe: bool,
}

impl SystemSpooler {
    pub fn new(runner: Arc<dyn CommandRunner>, platform: Platform) -> Self {
        Self {
            runner,
            platform,
            queue_probe: true,
        }
    }

    /// Skip the diagnostic queue poll after a Windows submission.
    pub fn without_queue_probe(mut self) -> Self {
        self.queue_probe = false;
        self
    }

    async fn print_windows_once(&self, printer: &str, file: &str, options: &PrintOptions) -> Result<WindowsPrintMethod> {
        let mut attempts = Vec::new();
        for method in WINDOWS_PRINT_CHAIN {
            let invocation = method.command(printer, file, options);
            match invocation.run(self.runner.as_ref()).await {
                Ok(_) => {
                    info!(?method, printer, "print job submitted");
                    return Ok(*method);
                }
                Err(e) => {
                    warn!(?method, command = %invocation.display(), error = %e, "print method failed");
                    attempts.push(format!("{method:?}: {e}"));
                }
            }
        }
        Err(AgentError::Spooler(format!(
            "All print methods failed for {printer}: {}",
            attempts.join("; ")
        )))
    }

    fn spawn_queue_probe(&self, printer: &str) {
        let runner = Arc::clone(&self.runner);
        let (program, args) = SystemPrinters::queue_query(printer);
        let printer = printer.to_string();
        tokio::spawn(async move {
            match runner.run(&program, &args).await {
                Ok(output) if output.trim().is_empty() => {
                    debug!(printer, "spooler queue is empty after submission")
                }
                Ok(output) => debug!(printer, queue = %output.trim(), "spooler queue after submission"),
                Err(e) => debug!(printer, error = %e, "spooler queue query failed"),
            }
        });
    }
}

#[async_trait]
impl Spooler for SystemSpooler {
    #[instrument(skip(self, file, options), fields(file = %file.display(), copies = options.copies()))]
    async fn print_file(&self, printer_name: &str, file: &Path, options: &PrintOptions) -> Result<()> {
        if tokio::fs::metadata(file).await.is_err() {
            return Err(AgentError::File(format!("File not found: {}", file.display())));
        }
        let file_arg = file.to_string_lossy();

        match self.platform {
            Platform::Windows => {
                for copy in 1..=options.copies() {
                    let method = self.print_windows_once(printer_name, &file_arg, options).await?;
                    debug!(copy, ?method, "copy submitted");
                }
                if self.queue_probe {
                    self.spawn_queue_probe(printer_name);
                }
                Ok(())
            }
            Platform::MacOs | Platform::Linux => {
                let args = lp_args(printer_name, &file_arg, options);
                let output = self.runner.run("lp", &args).await?;
                info!(printer = printer_name, response = %output.trim(), "print job submitted");
                Ok(())
            }
            Platform::Other => Err(AgentError::UnsupportedPlatform(self.platform.name().to_string())),
        }
    }
}
