// src/transform.rs
//! # Record Transformer
//! Pure mapping `RawFeedResult` → flat display records. No I/O.
//!
//! Policy: a missing or malformed sub-field degrades to an empty string (or
//! the `TBC` platform placeholder); it never drops the record.

use chrono::{DateTime, NaiveDateTime};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};

use crate::feed::types::{RawFeedResult, RawLocation, RawService};

pub const PLATFORM_PLACEHOLDER: &str = "TBC";

// Existing boards match these byte for byte; the operator style has no `;`.
const OPERATOR_STYLE: &str = "cursor: pointer";
const LOCATION_STYLE: &str = "cursor: pointer;";

/// One service as downstream boards consume it. Field order is the wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub headcode: String,
    pub uid: String,
    pub toc: String,
    pub consist: String,
    pub origin: String,
    pub destination: String,
    pub platform: String,
    pub wta: String,
    pub wtd: String,
    pub eta: String,
    pub etd: String,
    pub last_reported: String,
    // Consumers read the historical key spelling.
    #[serde(rename = "distruption")]
    pub disruption: String,
    pub cis_comments: String,
}

/// One record per raw service, in input order.
pub fn normalize(raw: &RawFeedResult) -> Vec<NormalizedRecord> {
    raw.services.iter().map(normalize_service).collect()
}

pub fn normalize_service(svc: &RawService) -> NormalizedRecord {
    NormalizedRecord {
        headcode: svc.train_id.clone().unwrap_or_default(),
        uid: svc.uid.clone().unwrap_or_default(),
        toc: operator_markup(svc.operator_code.as_deref(), svc.operator.as_deref()),
        consist: consist_note(svc.length.as_deref()),
        origin: location_markup(svc.origin.as_ref()),
        destination: location_markup(svc.destination.as_ref()),
        platform: platform_label(svc.platform.as_deref(), svc.platform_is_hidden),
        wta: format_time(svc.sta.as_deref()),
        wtd: format_time(svc.std.as_deref()),
        eta: format_time(svc.eta.as_deref()),
        etd: format_time(svc.etd.as_deref()),
        // No current data source for these three.
        last_reported: String::new(),
        disruption: String::new(),
        cis_comments: String::new(),
    }
}

/// `<span>` showing a short code with the long name as hover text.
pub fn hover_markup(short: Option<&str>, long: Option<&str>) -> String {
    span(LOCATION_STYLE, short, long)
}

/// Operator code with the operator name as hover text.
pub fn operator_markup(code: Option<&str>, name: Option<&str>) -> String {
    span(OPERATOR_STYLE, code, name)
}

fn span(style: &str, short: Option<&str>, long: Option<&str>) -> String {
    let short = short.map(str::trim).unwrap_or_default();
    let long = long.map(str::trim).unwrap_or_default();
    if short.is_empty() && long.is_empty() {
        return String::new();
    }
    format!(
        r#"<span style="{}" title="{}">{}</span>"#,
        style,
        encode_double_quoted_attribute(long),
        encode_text(short)
    )
}

fn location_markup(loc: Option<&RawLocation>) -> String {
    match loc {
        Some(l) => hover_markup(l.tiploc.as_deref(), l.location_name.as_deref()),
        None => String::new(),
    }
}

pub fn platform_label(platform: Option<&str>, hidden: bool) -> String {
    match platform.map(str::trim) {
        Some(p) if !p.is_empty() && !hidden => p.to_string(),
        _ => PLATFORM_PLACEHOLDER.to_string(),
    }
}

/// `HH:MM:SS` of a feed timestamp, or "" if it is not one.
pub fn format_time(value: Option<&str>) -> String {
    let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return String::new();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return dt.format("%H:%M:%S").to_string();
    }
    NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn consist_note(length: Option<&str>) -> String {
    match length.and_then(|l| l.trim().parse::<u32>().ok()) {
        Some(n) if n > 0 => format!("Service consists of {n} vehicles"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_formats() {
        assert_eq!(format_time(Some("2024-05-01T10:15:30")), "10:15:30");
        assert_eq!(format_time(Some("2024-05-01T10:15:30.250")), "10:15:30");
        assert_eq!(format_time(Some("2024-05-01T23:59:00+01:00")), "23:59:00");
        assert_eq!(format_time(Some("On time")), "");
        assert_eq!(format_time(Some("")), "");
        assert_eq!(format_time(None), "");
    }

    #[test]
    fn platform_placeholder_rules() {
        assert_eq!(platform_label(Some(""), false), "TBC");
        assert_eq!(platform_label(None, false), "TBC");
        assert_eq!(platform_label(Some("4"), true), "TBC");
        assert_eq!(platform_label(Some("4"), false), "4");
    }

    #[test]
    fn consist_only_for_positive_counts() {
        assert_eq!(consist_note(Some("4")), "Service consists of 4 vehicles");
        assert_eq!(consist_note(Some("0")), "");
        assert_eq!(consist_note(Some("four")), "");
        assert_eq!(consist_note(None), "");
    }

    #[test]
    fn hover_markup_escapes() {
        assert_eq!(
            hover_markup(Some("NT"), Some("Northern")),
            r#"<span style="cursor: pointer;" title="Northern">NT</span>"#
        );
        assert_eq!(
            hover_markup(Some("XX"), Some(r#"A "quoted" & co"#)),
            r#"<span style="cursor: pointer;" title="A &quot;quoted&quot; &amp; co">XX</span>"#
        );
        assert_eq!(hover_markup(None, None), "");
    }

    #[test]
    fn operator_style_has_no_trailing_semicolon() {
        assert_eq!(
            operator_markup(Some("NT"), Some("Northern")),
            r#"<span style="cursor: pointer" title="Northern">NT</span>"#
        );
        assert_eq!(operator_markup(None, Some("")), "");
    }
}
