use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

const FLOATING_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Meeting start as written in the email: either pinned to an offset or floating wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStart {
    Zoned(DateTime<FixedOffset>),
    Floating(NaiveDateTime),
}

impl MeetingStart {
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if let Ok(zoned) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(Self::Zoned(zoned));
        }
        if let Ok(zoned) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z") {
            return Some(Self::Zoned(zoned));
        }
        FLOATING_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(Self::Floating)
    }

    pub fn has_zone(&self) -> bool {
        matches!(self, Self::Zoned(_))
    }
}

/// Candidate meeting pulled out of an email. Every field is populated or there is no event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingEvent {
    pub sender: String,
    pub subject: String,
    pub start: MeetingStart,
    pub source_timezone_hint: Option<String>,
}
