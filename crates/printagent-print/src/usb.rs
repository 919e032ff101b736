// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB printer discovery and bulk-transfer printing.
//
// Enumeration and transfers go through `nusb`.  Classification and endpoint
// selection work on plain descriptor structs so they can be tested without a
// device attached.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{DiscoveredUsbDevice, usb_device_id};

use crate::vendors;

/// USB base class for printers.
pub const PRINTER_CLASS: u8 = 0x07;

/// Snapshot of the descriptor fields used to classify a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbDeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_class: u8,
    pub interface_classes: Vec<u8>,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
}

impl UsbDeviceDescriptor {
    fn from_info(info: &nusb::DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            device_class: info.class(),
            interface_classes: info.interfaces().map(|i| i.class()).collect(),
            product: info.product_string().map(str::to_string),
            manufacturer: info.manufacturer_string().map(str::to_string),
        }
    }
}

/// A device is a printer if the device or any interface is class 7, or the
/// vendor is a known printer manufacturer.
pub fn is_printer(desc: &UsbDeviceDescriptor) -> bool {
    desc.device_class == PRINTER_CLASS
        || desc.interface_classes.contains(&PRINTER_CLASS)
        || vendors::is_printer_vendor(desc.vendor_id)
}

/// Build the user-facing record for a printer-class device.
pub fn describe(desc: &UsbDeviceDescriptor) -> DiscoveredUsbDevice {
    let id = usb_device_id(desc.vendor_id, desc.product_id);
    let brand = match vendors::brand_for_vendor(desc.vendor_id) {
        vendors::UNKNOWN_BRAND => desc
            .manufacturer
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(vendors::UNKNOWN_BRAND)
            .to_string(),
        known => known.to_string(),
    };
    let name = desc
        .product
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{brand} USB Printer ({id})"));

    DiscoveredUsbDevice {
        id,
        name,
        vendor_id: desc.vendor_id,
        product_id: desc.product_id,
        brand,
        is_usb: true,
        is_connected: true,
    }
}

/// Filter and describe a set of descriptors.
pub fn classify(descriptors: &[UsbDeviceDescriptor]) -> Vec<DiscoveredUsbDevice> {
    descriptors.iter().filter(|d| is_printer(d)).map(describe).collect()
}

/// Enumerate printer-class devices on the host bus.
///
/// Enumeration failures are logged and produce an empty list.
#[instrument]
pub fn list_usb_printers() -> Vec<DiscoveredUsbDevice> {
    let devices = match nusb::list_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "USB enumeration failed");
            return Vec::new();
        }
    };

    let descriptors: Vec<UsbDeviceDescriptor> =
        devices.map(|info| UsbDeviceDescriptor::from_info(&info)).collect();
    let printers = classify(&descriptors);
    info!(scanned = descriptors.len(), printers = printers.len(), "USB scan complete");
    printers
}

// -- Endpoint selection --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub bulk: bool,
}

impl EndpointDescriptor {
    /// Host-to-device endpoints have bit 7 of the address clear.
    pub fn is_out(&self) -> bool {
        self.address & 0x80 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub class: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

/// The printer-class interface, else the first one.
pub fn select_interface(interfaces: &[InterfaceDescriptor]) -> Option<&InterfaceDescriptor> {
    interfaces
        .iter()
        .find(|i| i.class == PRINTER_CLASS)
        .or_else(|| interfaces.first())
}

/// Address of the first bulk OUT endpoint.
pub fn out_endpoint(interface: &InterfaceDescriptor) -> Option<u8> {
    interface
        .endpoints
        .iter()
        .find(|e| e.bulk && e.is_out())
        .map(|e| e.address)
}

/// Message for a failed interface claim.
pub fn claim_error_message(detail: &str, unsupported: bool) -> String {
    if unsupported || AgentError::is_usb_not_supported(detail) {
        format!(
            "Cannot claim the USB printer interface: the device has no WinUSB/libusb driver attached ({detail}). \
             Install a generic USB driver for the printer or print through the system printer."
        )
    } else {
        format!(
            "Cannot claim the USB printer interface: {detail}. \
             Another driver may own the device, or the agent lacks permission to access it."
        )
    }
}

// -- Transport --

/// One complete USB print cycle: open, claim, transfer, release.
#[async_trait]
pub trait UsbTransport: Send + Sync {
    async fn send(&self, vendor_id: u16, product_id: u16, data: &[u8]) -> Result<()>;
}

/// `nusb` bulk-transfer transport.
#[derive(Debug, Clone)]
pub struct NusbTransport {
    transfer_timeout: Duration,
}

impl NusbTransport {
    pub fn new(transfer_timeout: Duration) -> Self {
        Self { transfer_timeout }
    }
}

fn interfaces_of(config: &nusb::descriptors::Configuration<'_>) -> Vec<InterfaceDescriptor> {
    let mut interfaces: Vec<InterfaceDescriptor> = Vec::new();
    for alt in config.interface_alt_settings() {
        if interfaces.iter().any(|i| i.number == alt.interface_number()) {
            continue;
        }
        interfaces.push(InterfaceDescriptor {
            number: alt.interface_number(),
            class: alt.class(),
            endpoints: alt
                .endpoints()
                .map(|ep| EndpointDescriptor {
                    address: ep.address(),
                    bulk: ep.transfer_type() == nusb::transfer::EndpointType::Bulk,
                })
                .collect(),
        });
    }
    interfaces
}

#[async_trait]
impl UsbTransport for NusbTransport {
    #[instrument(skip(self, data), fields(id = %usb_device_id(vendor_id, product_id), bytes = data.len()))]
    async fn send(&self, vendor_id: u16, product_id: u16, data: &[u8]) -> Result<()> {
        let info = nusb::list_devices()
            .map_err(|e| AgentError::Usb(format!("USB enumeration failed: {e}")))?
            .find(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .ok_or_else(|| AgentError::Usb("USB printer not found".into()))?;

        let device = info
            .open()
            .map_err(|e| AgentError::Usb(format!("Cannot open USB printer: {e}")))?;

        let config = device
            .active_configuration()
            .map_err(|e| AgentError::Usb(format!("Cannot read USB configuration: {e}")))?;
        let interfaces = interfaces_of(&config);
        let selected = select_interface(&interfaces)
            .ok_or_else(|| AgentError::Usb("USB printer exposes no interfaces".into()))?;
        let endpoint = out_endpoint(selected)
            .ok_or_else(|| AgentError::Usb("USB printer has no bulk OUT endpoint".into()))?;
        debug!(interface = selected.number, endpoint, "selected USB endpoint");

        let interface = device.claim_interface(selected.number).map_err(|e| {
            let unsupported = e.kind() == std::io::ErrorKind::Unsupported;
            AgentError::UsbClaim(claim_error_message(&e.to_string(), unsupported))
        })?;

        let outcome = tokio::time::timeout(
            self.transfer_timeout,
            interface.bulk_out(endpoint, data.to_vec()),
        )
        .await;

        // Releasing the interface and closing the device happen on drop.
        drop(interface);
        drop(device);

        match outcome {
            Err(_) => Err(AgentError::Timeout(format!(
                "USB transfer timed out after {}s",
                self.transfer_timeout.as_secs()
            ))),
            Ok(completion) => {
                completion
                    .into_result()
                    .map_err(|e| AgentError::Usb(format!("USB transfer failed: {e}")))?;
                info!("USB transfer complete");
                Ok(())
            }
        }
    }
}

/// A multi-copy USB print that stopped part way.
#[derive(Debug)]
pub struct CopiesError {
    /// Copies fully transferred before the failure.
    pub sent: u32,
    pub error: AgentError,
}

/// Run the full USB cycle once per copy, sequentially.  Stops at the first
/// failing copy.
pub async fn print_usb_copies(
    transport: &dyn UsbTransport,
    vendor_id: u16,
    product_id: u16,
    data: &[u8],
    copies: u32,
) -> std::result::Result<(), CopiesError> {
    let mut sent = 0;
    for copy in 1..=copies.max(1) {
        debug!(copy, copies, "sending USB copy");
        if let Err(error) = transport.send(vendor_id, product_id, data).await {
            return Err(CopiesError { sent, error });
        }
        sent += 1;
    }
    Ok(())
}
