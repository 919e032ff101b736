// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer vendor lookup tables.
//
// USB printers do not always report the printer device class (7), so the
// vendor id is used as a fallback signal.  The same table drives the brand
// shown to the user and the keyword matching used when a USB device has to be
// mapped onto an OS-registered printer.

/// USB vendor id for HP.
pub const VENDOR_HP: u16 = 0x03f0;
/// USB vendor id for Seiko Epson.
pub const VENDOR_EPSON: u16 = 0x04b8;
/// USB vendor id for Canon.
pub const VENDOR_CANON: u16 = 0x04a9;
/// USB vendor id for Brother.
pub const VENDOR_BROTHER: u16 = 0x04f9;

/// Brand shown for vendors missing from [`PRINTER_VENDORS`].
pub const UNKNOWN_BRAND: &str = "Unknown";

/// A printer manufacturer known by its USB vendor id.
#[derive(Debug, Clone, Copy)]
pub struct VendorInfo {
    pub vendor_id: u16,
    pub brand: &'static str,
    /// Lower-case fragments that identify this brand in a printer or driver
    /// name.
    pub keywords: &'static [&'static str],
}

/// Model keywords for a specific vendor/product pair.
#[derive(Debug, Clone, Copy)]
pub struct ModelKeywords {
    pub vendor_id: u16,
    pub product_id: u16,
    pub keywords: &'static [&'static str],
}

pub const PRINTER_VENDORS: &[VendorInfo] = &[
    VendorInfo {
        vendor_id: VENDOR_HP,
        brand: "HP",
        keywords: &["hp ", "hewlett", "packard", "laserjet", "deskjet", "officejet", "envy", "smart tank"],
    },
    VendorInfo {
        vendor_id: VENDOR_EPSON,
        brand: "Epson",
        keywords: &["epson"],
    },
    VendorInfo {
        vendor_id: VENDOR_CANON,
        brand: "Canon",
        keywords: &["canon", "pixma", "i-sensys", "imageclass", "maxify"],
    },
    VendorInfo {
        vendor_id: VENDOR_BROTHER,
        brand: "Brother",
        keywords: &["brother"],
    },
    VendorInfo {
        vendor_id: 0x04e8,
        brand: "Samsung",
        keywords: &["samsung"],
    },
    VendorInfo {
        vendor_id: 0x043d,
        brand: "Lexmark",
        keywords: &["lexmark"],
    },
    VendorInfo {
        vendor_id: 0x0924,
        brand: "Xerox",
        keywords: &["xerox"],
    },
    VendorInfo {
        vendor_id: 0x0482,
        brand: "Kyocera",
        keywords: &["kyocera", "ecosys"],
    },
    VendorInfo {
        vendor_id: 0x05ca,
        brand: "Ricoh",
        keywords: &["ricoh"],
    },
    VendorInfo {
        vendor_id: 0x132b,
        brand: "Konica Minolta",
        keywords: &["konica", "minolta", "bizhub"],
    },
    VendorInfo {
        vendor_id: 0x06bc,
        brand: "OKI",
        keywords: &["oki"],
    },
    VendorInfo {
        vendor_id: 0x04dd,
        brand: "Sharp",
        keywords: &["sharp"],
    },
    VendorInfo {
        vendor_id: 0x232b,
        brand: "Pantum",
        keywords: &["pantum"],
    },
    VendorInfo {
        vendor_id: 0x0a5f,
        brand: "Zebra",
        keywords: &["zebra"],
    },
    VendorInfo {
        vendor_id: 0x0519,
        brand: "Star Micronics",
        keywords: &["star "],
    },
];

pub const MODEL_KEYWORDS: &[ModelKeywords] = &[
    ModelKeywords {
        vendor_id: VENDOR_HP,
        product_id: 0x2b17,
        keywords: &["laserjet 1020", "laserjet 1022"],
    },
    ModelKeywords {
        vendor_id: VENDOR_HP,
        product_id: 0x4117,
        keywords: &["laserjet 1018"],
    },
    ModelKeywords {
        vendor_id: VENDOR_HP,
        product_id: 0x3817,
        keywords: &["laserjet p2015"],
    },
    ModelKeywords {
        vendor_id: VENDOR_HP,
        product_id: 0x002a,
        keywords: &["laserjet p1102", "laserjet pro p1102"],
    },
    ModelKeywords {
        vendor_id: VENDOR_EPSON,
        product_id: 0x1120,
        keywords: &["l3150", "l3151"],
    },
    ModelKeywords {
        vendor_id: VENDOR_EPSON,
        product_id: 0x1118,
        keywords: &["l3110"],
    },
    ModelKeywords {
        vendor_id: VENDOR_EPSON,
        product_id: 0x1143,
        keywords: &["l3250", "l3251"],
    },
    ModelKeywords {
        vendor_id: VENDOR_CANON,
        product_id: 0x2759,
        keywords: &["lbp2900", "lbp 2900"],
    },
];

/// Lower-case fragments of OS printers that do not produce paper.
pub const VIRTUAL_PRINTER_FRAGMENTS: &[&str] =
    &["fax", "pdf", "xps", "onenote", "print to", "send to"];

/// Look up a vendor by USB id.
pub fn vendor(vendor_id: u16) -> Option<&'static VendorInfo> {
    PRINTER_VENDORS.iter().find(|v| v.vendor_id == vendor_id)
}

/// Whether the vendor id belongs to a known printer manufacturer.
pub fn is_printer_vendor(vendor_id: u16) -> bool {
    vendor(vendor_id).is_some()
}

/// Human-readable brand, `"Unknown"` when the vendor is not in the table.
pub fn brand_for_vendor(vendor_id: u16) -> &'static str {
    vendor(vendor_id).map(|v| v.brand).unwrap_or(UNKNOWN_BRAND)
}

/// Model keywords for a specific device, if the product is known.
pub fn model_keywords(vendor_id: u16, product_id: u16) -> Option<&'static [&'static str]> {
    MODEL_KEYWORDS
        .iter()
        .find(|m| m.vendor_id == vendor_id && m.product_id == product_id)
        .map(|m| m.keywords)
}

/// Whether a printer name looks like a virtual (non-paper) printer.
pub fn is_virtual_printer(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_PRINTER_FRAGMENTS.iter().any(|f| lower.contains(f))
}
