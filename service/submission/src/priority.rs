use std::collections::HashMap;

use once_cell::sync::Lazy;

use domain_submission::model::vo::ScanRecord;

/// Rank a record's MIME type for reputation-lookup ordering. Lower ranks
/// are looked up first; unknown types sort last.
pub const UNKNOWN_PRIORITY: u32 = 9999;

static MIMETYPE_PRIORITY: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        // Executables
        ("application/x-dosexec", 1),
        ("application/x-executable", 1),
        ("application/vnd.microsoft.portable-executable", 1),
        ("application/x-elf", 1),
        // Archives and unknown streams
        ("application/zip", 2),
        ("application/x-rar-compressed", 2),
        ("application/x-msi", 2),
        ("application/x-7z-compressed", 2),
        ("application/vnd.ms-cab-compressed", 2),
        ("application/x-tar", 2),
        ("application/gzip", 2),
        ("application/octet-stream", 2),
        // Scripts and source code
        ("text/plain", 3),
        ("text/x-script", 3),
        ("text/javascript", 3),
        ("application/x-bat", 3),
        ("application/x-sh", 3),
        ("application/x-python", 3),
        ("text/x-python", 3),
        // Web files
        ("text/html", 4),
        ("application/xhtml+xml", 4),
        ("text/xml", 4),
        ("text/css", 4),
        // Documents
        ("application/pdf", 5),
        ("application/msword", 5),
        ("application/vnd.ms-excel", 5),
        ("application/vnd.ms-powerpoint", 5),
        (
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            5,
        ),
        (
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            5,
        ),
        (
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            5,
        ),
        // Images
        ("image/jpeg", 10),
        ("image/png", 10),
        ("image/gif", 10),
        ("image/webp", 10),
        ("image/tiff", 10),
        ("image/bmp", 10),
        ("image/svg+xml", 10),
        // Data formats
        ("application/json", 20),
        ("application/xml", 20),
    ])
});

pub fn mime_priority(mime: &str) -> u32 {
    MIMETYPE_PRIORITY.get(mime).copied().unwrap_or(UNKNOWN_PRIORITY)
}

/// Highest priority (lowest rank) among the record's MIME flavors.
pub fn record_priority(record: &ScanRecord) -> u32 {
    record
        .mime_flavors()
        .iter()
        .map(|m| mime_priority(m))
        .min()
        .unwrap_or(UNKNOWN_PRIORITY)
}
