// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mapping a USB device onto an OS-registered printer.
//
// When a direct USB transfer fails the job is re-routed through the system
// spooler.  The matching printer is chosen by an ordered list of rules, most
// specific first.  Virtual printers (PDF, XPS, fax, OneNote) never match.

use printagent_core::types::{LocalPrinter, usb_device_id};

use crate::vendors;

/// Rules for picking the spooler printer that fronts a USB device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRule {
    /// The `vvvv:pppp` id, or both hex ids, appear in the printer name.
    IdSubstring,
    /// A model keyword known for this vendor/product appears in the name or
    /// driver.
    ModelKeyword,
    /// A brand keyword appears in the name or driver.
    BrandMatch,
    /// The first physical printer.
    FirstPhysical,
}

pub const FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule::IdSubstring,
    FallbackRule::ModelKeyword,
    FallbackRule::BrandMatch,
    FallbackRule::FirstPhysical,
];

/// First number in a printer name, e.g. `3150` in `EPSON L3150 Series`.
pub fn model_number(name: &str) -> Option<u32> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn haystack(printer: &LocalPrinter) -> String {
    format!("{} {}", printer.name, printer.driver).to_lowercase()
}

impl FallbackRule {
    fn select<'a>(&self, vendor_id: u16, product_id: u16, candidates: &[&'a LocalPrinter]) -> Option<&'a LocalPrinter> {
        let product_hex = format!("{product_id:04x}");
        match self {
            Self::IdSubstring => {
                let id = usb_device_id(vendor_id, product_id);
                let vendor_hex = format!("{vendor_id:04x}");
                candidates
                    .iter()
                    .find(|p| {
                        let name = p.name.to_lowercase();
                        name.contains(&id) || (name.contains(&vendor_hex) && name.contains(&product_hex))
                    })
                    .copied()
            }
            Self::ModelKeyword => {
                let keywords = vendors::model_keywords(vendor_id, product_id)?;
                candidates
                    .iter()
                    .find(|p| {
                        let text = haystack(p);
                        keywords.iter().any(|k| text.contains(k))
                    })
                    .copied()
            }
            Self::BrandMatch => {
                let vendor = vendors::vendor(vendor_id)?;
                let matches: Vec<&'a LocalPrinter> = candidates
                    .iter()
                    .filter(|p| {
                        let text = haystack(p);
                        vendor.keywords.iter().any(|k| text.contains(k))
                    })
                    .copied()
                    .collect();

                if let Some(exact) = matches.iter().find(|p| haystack(p).contains(&product_hex)) {
                    return Some(*exact);
                }
                if vendor_id == vendors::VENDOR_EPSON
                    && let Some(lowest) = matches
                        .iter()
                        .filter_map(|p| model_number(&p.name).map(|n| (n, *p)))
                        .min_by_key(|(n, _)| *n)
                {
                    return Some(lowest.1);
                }
                matches.first().copied()
            }
            Self::FirstPhysical => candidates.first().copied(),
        }
    }
}

/// Pick the spooler printer for a USB device, with the rule that matched.
pub fn select_fallback_printer(
    vendor_id: u16,
    product_id: u16,
    printers: &[LocalPrinter],
) -> Option<(FallbackRule, &LocalPrinter)> {
    let physical: Vec<&LocalPrinter> = printers
        .iter()
        .filter(|p| !vendors::is_virtual_printer(&p.name))
        .collect();

    FALLBACK_RULES.iter().find_map(|rule| {
        rule.select(vendor_id, product_id, &physical)
            .map(|printer| (*rule, printer))
    })
}
