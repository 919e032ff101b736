// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printagent print: USB and system printer discovery, the RAW/USB/spooler
// transports, and the universal dispatcher that routes a printer id to one of
// them.

pub mod command;
pub mod dispatcher;
pub mod fallback;
pub mod raw_client;
pub mod spooler;
pub mod system;
pub mod usb;
pub mod vendors;

pub use command::{CommandRunner, Platform, ShellRunner};
pub use dispatcher::PrintDispatcher;
pub use spooler::{Spooler, SystemSpooler};
pub use system::{PrinterSource, SystemPrinters};
pub use usb::{NusbTransport, UsbTransport};
