use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;

use domain_submission::model::vo::{Enrichment, ScanRecord};

/// MIME type -> extensions it is expected to carry. Mismatches are only
/// reported for types listed here.
static EXPECTED_EXTENSIONS: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        HashMap::from([
            ("application/x-dosexec", &["exe", "dll"][..]),
            ("image/bmp", &["bmp"][..]),
            ("image/jpeg", &["jpg", "jpeg"][..]),
            ("image/png", &["png"][..]),
            ("image/gif", &["gif"][..]),
            ("text/html", &["html", "htm"][..]),
            ("text/plain", &["txt"][..]),
            ("application/pdf", &["pdf"][..]),
            ("application/msword", &["doc"][..]),
            ("application/vnd.ms-excel", &["xls"][..]),
            ("application/vnd.ms-powerpoint", &["ppt"][..]),
            ("application/zip", &["zip"][..]),
            ("application/x-rar-compressed", &["rar"][..]),
            ("application/x-tar", &["tar"][..]),
            ("application/x-7z-compressed", &["7z"][..]),
            ("application/x-bzip2", &["bz2"][..]),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                &["docx"][..],
            ),
            (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                &["xlsx"][..],
            ),
            (
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                &["pptx"][..],
            ),
            ("audio/mpeg", &["mp3"][..]),
            ("audio/ogg", &["ogg"][..]),
            ("video/mp4", &["mp4"][..]),
            ("video/mpeg", &["mpeg", "mpg"][..]),
            ("application/javascript", &["js"][..]),
            ("application/json", &["json"][..]),
            ("application/xml", &["xml"][..]),
            ("application/x-shockwave-flash", &["swf"][..]),
            ("application/x-msdownload", &["exe", "msi"][..]),
            ("application/x-font-ttf", &["ttf"][..]),
            ("font/otf", &["otf"][..]),
            ("application/x-font-woff", &["woff"][..]),
            ("application/x-font-woff2", &["woff2"][..]),
        ])
    });

const SUSPICIOUS_YARA_RULES: [&str; 4] = ["autoopen", "screenshot", "maldoc", "exploit"];

const SUSPICIOUS_IMPORTS: [&str; 17] = [
    "CreateRemoteThread",
    "CreateProcess",
    "WinExec",
    "ShellExecute",
    "HttpSendRequest",
    "InternetReadFile",
    "VirtualProtectEx",
    "VirtualAllocEx",
    "WriteProcessMemory",
    "ReadProcessMemory",
    "SetWindowsHookEx",
    "RegisterHotKey",
    "GetAsyncKeyState",
    "SetThreadContext",
    "ResumeThread",
    "LoadLibrary",
    "GetProcAddress",
];

const HIGH_ENTROPY: f64 = 7.0;
const YARA_MATCH_VOLUME: usize = 5;
const REPUTATION_THRESHOLD: i64 = 5;
const PE_SECTION_VOLUME: usize = 10;

/// Derives heuristic warnings from a single record. Pure and idempotent:
/// calling it twice on the same inputs yields the same set. Each check
/// inspects only fields it understands; absent fields are ordinary
/// branches and can never fail the evaluation.
pub fn derive_insights(record: &ScanRecord, enrichment: Option<&Enrichment>) -> BTreeSet<String> {
    [
        check_mime_type(record),
        check_entropy(record),
        check_reputation(enrichment),
        check_yara_matches(record),
        check_suspicious_yara_rules(record),
        check_pe_signing(record),
        check_pe_high_entropy_sections(record),
        check_pe_compile_time(record),
        check_pe_suspicious_imports(record),
        check_pe_section_count(record),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect()
}

fn check_mime_type(record: &ScanRecord) -> Option<String> {
    let name = &record.file.name;
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())?;
    let mime = record.mime_flavors().first()?;
    let expected = EXPECTED_EXTENSIONS.get(mime.as_str())?;
    if expected.contains(&extension.as_str()) {
        return None;
    }
    Some(format!(
        "The file extension .{extension} does not match the expected extension for its MIME type ({mime})."
    ))
}

fn check_entropy(record: &ScanRecord) -> Option<String> {
    let entropy = record.scan.entropy.as_ref()?.entropy?;
    (entropy > HIGH_ENTROPY).then(|| {
        "The file has an entropy value greater than 7, which may indicate encryption or packing."
            .to_owned()
    })
}

fn check_reputation(enrichment: Option<&Enrichment>) -> Option<String> {
    let positives = enrichment?.virustotal;
    (positives > REPUTATION_THRESHOLD).then(|| {
        format!("The file has been flagged by {positives} VirusTotal detections.")
    })
}

fn check_yara_matches(record: &ScanRecord) -> Option<String> {
    let count = record.yara_matches().len();
    (count > YARA_MATCH_VOLUME).then(|| {
        format!("The file has a significant number of YARA matches ({count}).")
    })
}

fn check_suspicious_yara_rules(record: &ScanRecord) -> Option<String> {
    record
        .yara_matches()
        .iter()
        .any(|m| {
            let m = m.to_lowercase();
            SUSPICIOUS_YARA_RULES.contains(&m.as_str())
        })
        .then(|| {
            "Suspicious YARA rules detected that may indicate malicious features such as \
             auto-opening or screenshot capturing."
                .to_owned()
        })
}

fn check_pe_signing(record: &ScanRecord) -> Option<String> {
    let flags = record.scan.pe.as_ref()?.flags.as_ref()?;
    (!flags.iter().any(|f| f == "signed"))
        .then(|| "The PE file is not digitally signed.".to_owned())
}

fn check_pe_high_entropy_sections(record: &ScanRecord) -> Option<String> {
    let pe = record.scan.pe.as_ref()?;
    pe.sections
        .iter()
        .any(|s| s.entropy.is_some_and(|e| e > HIGH_ENTROPY))
        .then(|| {
            "One or more sections of the PE file have high entropy, indicating potential \
             packing or encryption."
                .to_owned()
        })
}

fn check_pe_compile_time(record: &ScanRecord) -> Option<String> {
    let pe = record.scan.pe.as_ref()?;
    let compile_time = parse_compile_time(pe.compile_time.as_deref()?)?;
    if compile_time > Utc::now() {
        return Some(
            "The PE file has a future compile time, which may be indicative of tampering."
                .to_owned(),
        );
    }
    let ancient_cutoff = NaiveDate::from_ymd_opt(1990, 1, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    if compile_time < ancient_cutoff {
        return Some(
            "The PE file has a suspiciously specific or ancient compile time, which may be \
             indicative of tampering."
                .to_owned(),
        );
    }
    None
}

fn parse_compile_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    None
}

fn check_pe_suspicious_imports(record: &ScanRecord) -> Option<String> {
    let pe = record.scan.pe.as_ref()?;
    pe.imported
        .iter()
        .any(|import| SUSPICIOUS_IMPORTS.contains(&import.as_str()))
        .then(|| "Suspicious imports detected that are commonly used in malware.".to_owned())
}

fn check_pe_section_count(record: &ScanRecord) -> Option<String> {
    let pe = record.scan.pe.as_ref()?;
    (pe.sections.len() > PE_SECTION_VOLUME).then(|| {
        "An unusual number of sections detected in the PE file, which could indicate \
         modifications to hide malicious content."
            .to_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: serde_json::Value) -> ScanRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_record_yields_no_findings() {
        assert!(derive_insights(&record(serde_json::json!({})), None).is_empty());
    }

    #[test]
    fn extension_mismatch_flagged_only_for_known_mime() {
        let mismatch = record(serde_json::json!({
            "file": {"name": "a.txt", "flavors": {"mime": ["application/x-dosexec"]}}
        }));
        let insights = derive_insights(&mismatch, None);
        assert_eq!(insights.len(), 1);
        assert!(insights.iter().next().unwrap().contains(".txt"));

        let matching = record(serde_json::json!({
            "file": {"name": "a.exe", "flavors": {"mime": ["application/x-dosexec"]}}
        }));
        assert!(derive_insights(&matching, None).is_empty());

        let unknown_mime = record(serde_json::json!({
            "file": {"name": "a.xyz", "flavors": {"mime": ["application/x-some-novelty"]}}
        }));
        assert!(derive_insights(&unknown_mime, None).is_empty());
    }

    #[test]
    fn no_extension_skips_mime_check() {
        let r = record(serde_json::json!({
            "file": {"name": "README", "flavors": {"mime": ["application/x-dosexec"]}}
        }));
        assert!(derive_insights(&r, None).is_empty());
    }

    #[test]
    fn entropy_above_seven_is_flagged() {
        let r = record(serde_json::json!({"scan": {"entropy": {"entropy": 7.2}}}));
        assert_eq!(derive_insights(&r, None).len(), 1);
        let r = record(serde_json::json!({"scan": {"entropy": {"entropy": 7.0}}}));
        assert!(derive_insights(&r, None).is_empty());
    }

    #[test]
    fn reputation_needs_enrichment_present() {
        let r = record(serde_json::json!({}));
        assert!(derive_insights(&r, None).is_empty());
        let found = derive_insights(&r, Some(&Enrichment { virustotal: 6 }));
        assert_eq!(found.len(), 1);
        let under = derive_insights(&r, Some(&Enrichment { virustotal: 5 }));
        assert!(under.is_empty());
    }

    #[test]
    fn suspicious_yara_rule_name_is_exact_case_insensitive() {
        let r = record(serde_json::json!({
            "scan": {"yara": {"matches": ["AutoOpen"]}}
        }));
        assert_eq!(derive_insights(&r, None).len(), 1);
        // substring is not enough
        let r = record(serde_json::json!({
            "scan": {"yara": {"matches": ["autoopen_macro"]}}
        }));
        assert!(derive_insights(&r, None).is_empty());
    }

    #[test]
    fn pe_checks_fire_independently() {
        let r = record(serde_json::json!({
            "scan": {"pe": {
                "flags": [],
                "compile_time": "1980-01-01T00:00:00",
                "imported": ["CreateRemoteThread"],
                "sections": [
                    {"name": ".text", "entropy": 7.5}
                ]
            }}
        }));
        let insights = derive_insights(&r, None);
        // unsigned, high-entropy section, ancient compile time, imports
        assert_eq!(insights.len(), 4);
    }

    #[test]
    fn signing_is_only_judged_when_flags_are_reported() {
        let without_flags = record(serde_json::json!({
            "scan": {"pe": {"compile_time": "2020-06-01T00:00:00"}}
        }));
        assert!(derive_insights(&without_flags, None).is_empty());

        let unsigned = record(serde_json::json!({
            "scan": {"pe": {"flags": []}}
        }));
        assert_eq!(derive_insights(&unsigned, None).len(), 1);

        let signed = record(serde_json::json!({
            "scan": {"pe": {"flags": ["signed"]}}
        }));
        assert!(derive_insights(&signed, None).is_empty());
    }

    #[test]
    fn derive_insights_is_idempotent() {
        let r = record(serde_json::json!({
            "file": {"name": "a.txt", "flavors": {"mime": ["application/x-dosexec"]}},
            "scan": {"entropy": {"entropy": 7.9}}
        }));
        let first = derive_insights(&r, None);
        let second = derive_insights(&r, None);
        assert_eq!(first, second);
    }
}
