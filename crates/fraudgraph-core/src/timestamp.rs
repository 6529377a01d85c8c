//! Transaction timestamp normalization.
//!
//! Transfer dates arrive in several shapes depending on how the edge was
//! written: RFC 3339 strings, ISO local date-times, the space-separated
//! `YYYY-MM-DD HH:MM:SS` form produced by bulk imports, and Neo4j's
//! `toString(datetime)` output with a bracketed zone id.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

const LOCAL_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// A parsed transaction timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionTime {
    /// Carries an explicit UTC offset.
    Zoned(DateTime<FixedOffset>),
    /// No offset in the source string; interpreted as UTC for ordering.
    Local(NaiveDateTime),
}

impl TransactionTime {
    /// Hour of day as written, in the timestamp's own offset.
    pub fn hour(&self) -> u32 {
        match self {
            Self::Zoned(dt) => dt.hour(),
            Self::Local(dt) => dt.hour(),
        }
    }

    /// The instant used for chronological comparison.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Self::Zoned(dt) => dt.with_timezone(&Utc),
            Self::Local(dt) => Utc.from_utc_datetime(dt),
        }
    }
}

impl PartialOrd for TransactionTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransactionTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.instant().cmp(&other.instant())
    }
}

/// Replace the date/time separator space with `T` and drop a trailing
/// `[Zone/Id]` suffix.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_zone = match trimmed.find('[') {
        Some(idx) if trimmed.ends_with(']') => &trimmed[..idx],
        _ => trimmed,
    };
    without_zone.replacen(' ', "T", 1)
}

/// Parse a transaction date string.
pub fn parse(raw: &str) -> Option<TransactionTime> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(TransactionTime::Zoned(dt));
    }
    // Offsets without seconds, e.g. "2023-05-01T23:15+02:00"
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M%:z") {
        return Some(TransactionTime::Zoned(dt));
    }

    for format in LOCAL_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(TransactionTime::Local(dt));
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(TransactionTime::Local)
}

/// Hour of day for a transaction date string, if it parses.
pub fn hour_of(raw: &str) -> Option<u32> {
    parse(raw).map(|t| t.hour())
}
