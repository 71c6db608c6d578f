//! Best-effort display formatting for course metadata.
//!
//! Every function here falls back to the raw input when it cannot make sense
//! of it, and to an em dash placeholder when the input is absent or blank.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Shown in place of missing values.
pub const MISSING: &str = "—";

fn or_missing(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `524288000` → `500MB`. Plain byte counts below 1024 keep a `B` suffix.
pub fn human_size(value: Option<&str>) -> String {
    let Some(raw) = or_missing(value) else {
        return MISSING.to_string();
    };
    let Ok(bytes) = raw.parse::<u64>() else {
        return raw.to_string();
    };
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut size = bytes as f64;
    for unit in ["KB", "MB", "GB", "TB"] {
        size /= 1024.0;
        if size < 1024.0 {
            return format!("{size:.0}{unit}");
        }
    }
    format!("{:.1}PB", size / 1024.0)
}

/// `2020-09-01T04:00:00Z` → `Sep 01, 2020 04:00 UTC`.
///
/// Accepts RFC 3339 timestamps (offset kept), naive `T`/space separated
/// timestamps, and bare dates.
pub fn human_date(value: Option<&str>) -> String {
    let Some(raw) = or_missing(value) else {
        return MISSING.to_string();
    };
    const OUT: &str = "%b %d, %Y %H:%M";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        let zone = if dt.offset().local_minus_utc() == 0 {
            "UTC".to_string()
        } else {
            dt.format("%:z").to_string()
        };
        return format!("{} {zone}", dt.format(OUT));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format(OUT).to_string();
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map_or_else(|| raw.to_string(), |dt| dt.format(OUT).to_string());
    }
    raw.to_string()
}

/// `true`/`false` → `Yes`/`No`; anything else is shown as-is.
pub fn yes_no(value: Option<&str>) -> String {
    match or_missing(value) {
        Some(v) if v.eq_ignore_ascii_case("true") => "Yes".to_string(),
        Some(v) if v.eq_ignore_ascii_case("false") => "No".to_string(),
        Some(v) => v.to_string(),
        None => MISSING.to_string(),
    }
}

/// Indent a JSON blob. Invalid JSON comes back unchanged.
pub fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw.to_string())
}
