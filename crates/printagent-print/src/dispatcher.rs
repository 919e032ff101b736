// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Universal print dispatcher.
//
// A printer id selects the transport: `usb_<vvvv>:<pppp>` goes straight to
// the device over USB, anything else is a system printer name handed to the
// spooler.  A failed USB print is retried once through the spooler on the
// system printer that best matches the device, for the copies USB did not
// deliver.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{LocalPrinter, PrintOptions, PrinterTarget, usb_device_id};

use crate::fallback::select_fallback_printer;
use crate::spooler::Spooler;
use crate::system::PrinterSource;
use crate::usb::{CopiesError, UsbTransport, print_usb_copies};

pub struct PrintDispatcher {
    usb: Arc<dyn UsbTransport>,
    spooler: Arc<dyn Spooler>,
    printers: Arc<dyn PrinterSource>,
}

impl PrintDispatcher {
    pub fn new(usb: Arc<dyn UsbTransport>, spooler: Arc<dyn Spooler>, printers: Arc<dyn PrinterSource>) -> Self {
        Self { usb, spooler, printers }
    }

    /// Current OS printer listing.
    pub async fn printers(&self) -> Vec<LocalPrinter> {
        self.printers.system_printers().await
    }

    /// Print `file` on the printer named by `printer_id`.
    #[instrument(skip(self, file, options), fields(file = %file.display()))]
    pub async fn print_universal(&self, printer_id: &str, file: &Path, options: &PrintOptions) -> Result<()> {
        match PrinterTarget::parse(printer_id)? {
            PrinterTarget::Usb { vendor_id, product_id } => {
                self.print_usb(vendor_id, product_id, file, options).await
            }
            PrinterTarget::System(name) => self.print_system(&name, file, options).await,
        }
    }

    /// Hand the file to the OS spooler.
    pub async fn print_system(&self, printer_name: &str, file: &Path, options: &PrintOptions) -> Result<()> {
        self.spooler.print_file(printer_name, file, options).await?;
        info!(printer = printer_name, "printed via spooler");
        Ok(())
    }

    /// Direct USB print with a single spooler fallback.
    pub async fn print_usb(&self, vendor_id: u16, product_id: u16, file: &Path, options: &PrintOptions) -> Result<()> {
        let id = usb_device_id(vendor_id, product_id);
        let (sent, usb_error) = match self.try_usb(vendor_id, product_id, file, options).await {
            Ok(()) => {
                info!(device = %id, copies = options.copies(), "printed via USB");
                return Ok(());
            }
            Err(CopiesError { sent, error }) => (sent, error.to_string()),
        };
        let remaining = PrintOptions {
            copies: options.copies().saturating_sub(sent).max(1),
            ..options.clone()
        };

        warn!(device = %id, error = %usb_error, sent, "USB print failed, falling back to system printer");

        let printers = self.printers.system_printers().await;
        let Some((rule, printer)) = select_fallback_printer(vendor_id, product_id, &printers) else {
            return Err(AgentError::FallbackFailed {
                usb_error,
                fallback: "no matching system printer".into(),
            });
        };
        info!(device = %id, printer = %printer.name, ?rule, "selected fallback printer");

        self.spooler
            .print_file(&printer.name, file, &remaining)
            .await
            .map_err(|e| AgentError::FallbackFailed {
                usb_error,
                fallback: e.to_string(),
            })
    }

    async fn try_usb(
        &self,
        vendor_id: u16,
        product_id: u16,
        file: &Path,
        options: &PrintOptions,
    ) -> std::result::Result<(), CopiesError> {
        let data = tokio::fs::read(file).await.map_err(|e| CopiesError {
            sent: 0,
            error: e.into(),
        })?;
        print_usb_copies(self.usb.as_ref(), vendor_id, product_id, &data, options.copies()).await
    }
}
