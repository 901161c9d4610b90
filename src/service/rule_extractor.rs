use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Weekday};
use chrono_tz::Tz;

use crate::error::ExtractionError;
use crate::models::availability::{WEEKDAYS, weekday_name};
use crate::models::meeting::{MeetingEvent, MeetingStart};
use crate::service::extraction::{ExtractionContext, MeetingExtractor};

const SKIPPED_HEADERS: [&str; 5] = ["from:", "to:", "cc:", "date:", "sent:"];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Abbreviations that pin an explicit offset.
const ZONE_ABBREVIATIONS: [(&str, i32); 13] = [
    ("utc", 0),
    ("gmt", 0),
    ("z", 0),
    ("est", -5),
    ("edt", -4),
    ("cst", -6),
    ("cdt", -5),
    ("mst", -7),
    ("mdt", -6),
    ("pst", -8),
    ("pdt", -7),
    ("cet", 1),
    ("cest", 2),
];

/// Deterministic extractor reading `From:`/`Subject:` headers and explicit date and time phrases.
///
/// Relative dates ("Tuesday", "tomorrow") resolve against the reference date, which
/// defaults to the request's current date.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor {
    reference_date: Option<NaiveDate>,
}

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self {
            reference_date: Some(reference_date),
        }
    }

    pub fn extract_with_reference(
        &self,
        email: &str,
        reference: NaiveDate,
    ) -> Option<MeetingEvent> {
        let sender = header_value(email, "from:").and_then(|value| parse_address(&value))?;
        let subject = header_value(email, "subject:")?;

        let tokens = tokenize(email);
        let lower: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let date = find_date(&lower, reference)?;
        let time = find_time(&lower)?;
        let naive = date.and_time(time);

        let (start, source_timezone_hint) = match find_offset(&lower) {
            Some(offset) => match offset.from_local_datetime(&naive).single() {
                Some(zoned) => (MeetingStart::Zoned(zoned), None),
                None => (MeetingStart::Floating(naive), None),
            },
            None => (MeetingStart::Floating(naive), find_zone_name(&tokens)),
        };

        Some(MeetingEvent {
            sender,
            subject,
            start,
            source_timezone_hint,
        })
    }
}

#[async_trait]
impl MeetingExtractor for RuleBasedExtractor {
    async fn extract(
        &self,
        email: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<Option<MeetingEvent>, ExtractionError> {
        let reference = self.reference_date.unwrap_or(context.today);
        Ok(self.extract_with_reference(email, reference))
    }
}

fn header_value(email: &str, name: &str) -> Option<String> {
    email.lines().find_map(|line| {
        let trimmed = line.trim_start();
        let prefix = trimmed.get(..name.len())?;
        if !prefix.eq_ignore_ascii_case(name) {
            return None;
        }
        let value = trimmed[name.len()..].trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn parse_address(value: &str) -> Option<String> {
    if let (Some(open), Some(close)) = (value.find('<'), value.rfind('>')) {
        if open < close {
            let inner = value[open + 1..close].trim();
            if inner.contains('@') {
                return Some(inner.to_string());
            }
        }
    }
    value
        .split_whitespace()
        .map(|part| {
            part.trim_matches(|c: char| matches!(c, '<' | '>' | '"' | ',' | ';' | '(' | ')'))
        })
        .find(|part| part.contains('@'))
        .map(str::to_string)
}

fn is_skipped_line(line: &str) -> bool {
    let lower = line.trim_start().to_lowercase();
    SKIPPED_HEADERS.iter().any(|header| lower.starts_with(header))
}

fn tokenize(email: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for line in email.lines().filter(|line| !is_skipped_line(line)) {
        for raw in line.split_whitespace() {
            let token = raw.trim_matches(|c: char| {
                matches!(c, ',' | '.' | ';' | '!' | '?' | '(' | ')' | '"' | '\'')
            });
            if token.is_empty() {
                continue;
            }
            // 2026-10-20T18:30 style tokens carry both a date and a time
            if let (Some(date), Some(time)) = (token.get(..10), token.get(11..)) {
                if !time.is_empty() && date.parse::<NaiveDate>().is_ok() {
                    tokens.push(date.to_string());
                    tokens.push(time.to_string());
                    continue;
                }
            }
            tokens.push(token.to_string());
        }
    }
    tokens
}

fn find_date(tokens: &[String], reference: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = tokens.iter().find_map(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()) {
        return Some(date);
    }

    for (idx, token) in tokens.iter().enumerate() {
        let Some(month) = parse_month(token) else {
            continue;
        };
        let Some(day) = tokens.get(idx + 1).and_then(|t| parse_day(t)) else {
            continue;
        };
        let year = tokens
            .get(idx + 2)
            .filter(|t| t.len() == 4)
            .and_then(|t| t.parse::<i32>().ok());
        let date = match year {
            Some(year) => NaiveDate::from_ymd_opt(year, month, day),
            None => NaiveDate::from_ymd_opt(reference.year(), month, day)
                .filter(|date| *date >= reference)
                .or_else(|| NaiveDate::from_ymd_opt(reference.year() + 1, month, day)),
        };
        if date.is_some() {
            return date;
        }
    }

    for (idx, token) in tokens.iter().enumerate() {
        let Some(day) = parse_full_weekday(token) else {
            continue;
        };
        let mut offset = (day.num_days_from_monday() as i64 + 7
            - reference.weekday().num_days_from_monday() as i64)
            % 7;
        if idx > 0 && tokens[idx - 1] == "next" {
            offset += 7;
        }
        return reference.checked_add_signed(TimeDelta::days(offset));
    }

    if tokens.iter().any(|t| t == "tomorrow") {
        return reference.succ_opt();
    }
    if tokens.iter().any(|t| t == "today" || t == "tonight") {
        return Some(reference);
    }
    None
}

fn parse_month(token: &str) -> Option<u32> {
    if token == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|month| *month == token || (token.len() == 3 && month.starts_with(token)))
        .map(|idx| idx as u32 + 1)
}

fn parse_day(token: &str) -> Option<u32> {
    let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let day = digits.parse::<u32>().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn parse_full_weekday(token: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .copied()
        .find(|day| weekday_name(*day).eq_ignore_ascii_case(token))
}

fn find_time(tokens: &[String]) -> Option<NaiveTime> {
    tokens.iter().enumerate().find_map(|(idx, token)| {
        if token == "noon" {
            return NaiveTime::from_hms_opt(12, 0, 0);
        }
        parse_clock(token, tokens.get(idx + 1).map(String::as_str))
    })
}

fn meridiem(token: &str) -> Option<bool> {
    match token {
        "am" | "a.m" | "a.m." => Some(false),
        "pm" | "p.m" | "p.m." => Some(true),
        _ => None,
    }
}

/// Parses `18:30`, `6:30pm`, `6:30 pm`, `6pm` and `6 pm`.
fn parse_clock(token: &str, next: Option<&str>) -> Option<NaiveTime> {
    let (core, attached) = if let Some(core) = token.strip_suffix("pm") {
        (core, Some(true))
    } else if let Some(core) = token.strip_suffix("am") {
        (core, Some(false))
    } else {
        (token, None)
    };
    let is_pm = attached.or_else(|| next.and_then(meridiem));

    let (hour, minute) = match core.split_once(':') {
        Some((h, m)) => {
            if h.is_empty() || h.len() > 2 || m.len() < 2 || !m.is_char_boundary(2) {
                return None;
            }
            let minute_digits = &m[..2];
            let rest = &m[2..];
            if !rest.is_empty() && !rest.starts_with(':') && !rest.starts_with('-') {
                return None;
            }
            (h.parse::<u32>().ok()?, minute_digits.parse::<u32>().ok()?)
        }
        None => {
            is_pm?;
            if core.is_empty() || core.len() > 2 {
                return None;
            }
            (core.parse::<u32>().ok()?, 0)
        }
    };

    let hour = match is_pm {
        Some(pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (pm, hour) {
                (true, 12) => 12,
                (true, h) => h + 12,
                (false, 12) => 0,
                (false, h) => h,
            }
        }
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn find_offset(tokens: &[String]) -> Option<FixedOffset> {
    tokens.iter().find_map(|token| {
        ZONE_ABBREVIATIONS
            .iter()
            .find(|(name, _)| *name == token)
            .and_then(|(_, hours)| FixedOffset::east_opt(hours * 3600))
    })
}

fn find_zone_name(tokens: &[String]) -> Option<String> {
    tokens
        .iter()
        .filter(|token| token.contains('/'))
        .find(|token| token.parse::<Tz>().is_ok())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, Timelike};

    fn reference() -> NaiveDate {
        // a Sunday
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn floating(event: &MeetingEvent) -> NaiveDateTime {
        match event.start {
            MeetingStart::Floating(naive) => naive,
            other => panic!("expected floating start, got {:?}", other),
        }
    }

    fn extract(email: &str) -> Option<MeetingEvent> {
        RuleBasedExtractor::with_reference_date(reference())
            .extract_with_reference(email, reference())
    }

    #[test]
    fn extracts_weekday_and_pm_time() {
        let email = "From: Alice <a@b.com>\nSubject: Sync\n\nCan we meet Tuesday at 6:30 pm?";
        let event = extract(email).unwrap();
        assert_eq!(event.sender, "a@b.com");
        assert_eq!(event.subject, "Sync");
        let start = floating(&event);
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        assert_eq!((start.hour(), start.minute()), (18, 30));
    }

    #[test]
    fn next_weekday_skips_a_week() {
        let email = "From: a@b.com\nSubject: Sync\n\nHow about next Tuesday at 10am";
        let start = floating(&extract(email).unwrap());
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2026, 10, 27).unwrap());
        assert_eq!(start.hour(), 10);
    }

    #[test]
    fn extracts_iso_and_month_dates() {
        let iso = "From: a@b.com\nSubject: Review\n\nBooked for 2026-11-03 14:00.";
        let start = floating(&extract(iso).unwrap());
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2026, 11, 3).unwrap());
        assert_eq!(start.hour(), 14);

        let month = "From: a@b.com\nSubject: Review\n\nLet's do March 5th at noon";
        let start = floating(&extract(month).unwrap());
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2027, 3, 5).unwrap());
        assert_eq!(start.hour(), 12);

        let with_year = "From: a@b.com\nSubject: Review\n\nOn Oct 22, 2026 at 9:15";
        let start = floating(&extract(with_year).unwrap());
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2026, 10, 22).unwrap());
        assert_eq!((start.hour(), start.minute()), (9, 15));
    }

    #[test]
    fn abbreviation_pins_offset() {
        let email = "From: a@b.com\nSubject: Sync\n\nTuesday 3pm UTC works for me";
        let event = extract(email).unwrap();
        match event.start {
            MeetingStart::Zoned(zoned) => {
                assert_eq!(zoned.offset().local_minus_utc(), 0);
                assert_eq!(zoned.hour(), 15);
            }
            other => panic!("expected zoned start, got {:?}", other),
        }
    }

    #[test]
    fn iana_name_becomes_hint() {
        let email = "From: a@b.com\nSubject: Sync\n\nTuesday 15:00 Europe/London time";
        let event = extract(email).unwrap();
        assert_eq!(event.source_timezone_hint.as_deref(), Some("Europe/London"));
    }

    #[test]
    fn date_header_is_not_the_meeting_time() {
        let email = "From: a@b.com\nDate: Sun, 18 Oct 2026 08:00\nSubject: Hello\n\nJust checking in.";
        assert_eq!(extract(email), None);
    }

    #[test]
    fn missing_sender_or_time_yields_none() {
        assert_eq!(extract("Subject: Sync\n\nTuesday at 6pm"), None);
        assert_eq!(extract("From: a@b.com\nSubject: Sync\n\nTuesday sometime?"), None);
        assert_eq!(extract("From: a@b.com\n\nTuesday at 6pm"), None);
    }

    #[test]
    fn clock_parsing() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        assert_eq!(parse_clock("18:30", None), t(18, 30));
        assert_eq!(parse_clock("6:30pm", None), t(18, 30));
        assert_eq!(parse_clock("12am", None), t(0, 0));
        assert_eq!(parse_clock("12", Some("pm")), t(12, 0));
        assert_eq!(parse_clock("6", None), None);
        assert_eq!(parse_clock("25:00", None), None);
        assert_eq!(parse_clock("13pm", None), None);
    }

    #[tokio::test]
    async fn trait_impl_uses_reference_date() {
        let calendar = crate::models::availability::AvailabilityCalendar::default();
        let context = ExtractionContext {
            timezone: "US/Eastern",
            calendar: &calendar,
            today: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        };
        let extractor = RuleBasedExtractor::with_reference_date(reference());
        let event = extractor
            .extract("From: a@b.com\nSubject: Sync\n\nTomorrow at 9am", &context)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(floating(&event).date(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());

        let event = RuleBasedExtractor::new()
            .extract("From: a@b.com\nSubject: Sync\n\nTomorrow at 9am", &context)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(floating(&event).date(), NaiveDate::from_ymd_opt(2030, 1, 2).unwrap());
    }

    #[test]
    fn multibyte_text_never_splits_a_character() {
        let email = "From: a@b.com\nSubject: Sync\n\nRendez-vous aaaaaaaaaébc Tuesday 6pm";
        let event = extract(email).unwrap();
        let start = floating(&event);
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        assert_eq!(start.hour(), 18);

        let email = "From: a@b.com\nSubject: Sync\n\n2026-10-2é 日本語のテキスト";
        assert_eq!(extract(email), None);
    }
}
