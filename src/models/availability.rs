use std::collections::HashMap;
use std::fs;

use chrono::{NaiveTime, Weekday};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CalendarError;

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const TIME_FORMAT: &str = "%H:%M";

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Accepts full English names and three letter abbreviations, any case.
pub fn parse_weekday(name: &str) -> Result<Weekday, CalendarError> {
    let lower = name.trim().to_lowercase();
    WEEKDAYS
        .iter()
        .copied()
        .find(|day| {
            let full = weekday_name(*day).to_lowercase();
            lower == full || lower == full[..3]
        })
        .ok_or_else(|| CalendarError::InvalidWeekday(name.to_string()))
}

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, CalendarError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| CalendarError::InvalidTime(value.to_string()))
}

pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Local time window during which meetings are accepted on one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilityWindow {
    pub fn new(enabled: bool, start: NaiveTime, end: NaiveTime) -> Result<Self, CalendarError> {
        let window = Self { enabled, start, end };
        if enabled && start >= end {
            return Err(CalendarError::InvalidWindow {
                day: String::new(),
                start: format_time_of_day(start),
                end: format_time_of_day(end),
            });
        }
        Ok(window)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }

    /// Half-open `[start, end)`: a meeting starting exactly at `end` is outside.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.enabled && time >= self.start && time < self.end
    }

    pub fn hours_label(&self) -> String {
        format!(
            "{}-{}",
            format_time_of_day(self.start),
            format_time_of_day(self.end)
        )
    }
}

/// On-disk form of a window, times as `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWindow {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl RawWindow {
    fn into_window(self, day: Weekday) -> Result<AvailabilityWindow, CalendarError> {
        let start = parse_time_of_day(&self.start)?;
        let end = parse_time_of_day(&self.end)?;
        AvailabilityWindow::new(self.enabled, start, end).map_err(|err| match err {
            CalendarError::InvalidWindow { start, end, .. } => CalendarError::InvalidWindow {
                day: weekday_name(day).to_string(),
                start,
                end,
            },
            other => other,
        })
    }
}

/// Weekday to window mapping. All seven days are always present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "HashMap<String, RawWindow>")]
pub struct AvailabilityCalendar {
    windows: [AvailabilityWindow; 7],
}

impl AvailabilityCalendar {
    pub fn new(windows: [AvailabilityWindow; 7]) -> Self {
        Self { windows }
    }

    pub fn window_for(&self, day: Weekday) -> &AvailabilityWindow {
        &self.windows[day.num_days_from_monday() as usize]
    }

    /// Lookup by configured day name. Anything outside Monday..Sunday is a caller bug.
    pub fn window_for_name(&self, name: &str) -> Result<&AvailabilityWindow, CalendarError> {
        parse_weekday(name).map(|day| self.window_for(day))
    }

    pub fn with_window(mut self, day: Weekday, window: AvailabilityWindow) -> Self {
        self.windows[day.num_days_from_monday() as usize] = window;
        self
    }

    /// Syntax errors are `Json`; day and window problems keep their own variant.
    pub fn from_json(content: &str) -> Result<Self, CalendarError> {
        let raw: HashMap<String, RawWindow> =
            serde_json::from_str(content).map_err(|e| CalendarError::Json(e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn from_file(path: &str) -> Result<Self, CalendarError> {
        let content =
            fs::read_to_string(path).map_err(|e| CalendarError::Json(format!("{path}: {e}")))?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for AvailabilityCalendar {
    /// Weekdays 09:00-17:00, weekend off.
    fn default() -> Self {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN);
        let windows = WEEKDAYS.map(|day| AvailabilityWindow {
            enabled: !matches!(day, Weekday::Sat | Weekday::Sun),
            start: nine,
            end: five,
        });
        Self { windows }
    }
}

impl TryFrom<HashMap<String, RawWindow>> for AvailabilityCalendar {
    type Error = CalendarError;

    fn try_from(raw: HashMap<String, RawWindow>) -> Result<Self, Self::Error> {
        let mut slots: [Option<AvailabilityWindow>; 7] = [None; 7];
        for (name, window) in raw {
            let day = parse_weekday(&name)?;
            slots[day.num_days_from_monday() as usize] = Some(window.into_window(day)?);
        }
        let mut windows = [AvailabilityWindow::disabled(); 7];
        for day in WEEKDAYS {
            let idx = day.num_days_from_monday() as usize;
            windows[idx] = slots[idx]
                .ok_or_else(|| CalendarError::MissingWeekday(weekday_name(day).to_string()))?;
        }
        Ok(Self { windows })
    }
}

impl Serialize for AvailabilityCalendar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(WEEKDAYS.len()))?;
        for day in WEEKDAYS {
            let window = self.window_for(day);
            map.serialize_entry(
                weekday_name(day),
                &RawWindow {
                    enabled: window.enabled,
                    start: format_time_of_day(window.start),
                    end: format_time_of_day(window.end),
                },
            )?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn default_calendar_is_weekdays_nine_to_five() {
        let calendar = AvailabilityCalendar::default();
        let tuesday = calendar.window_for(Weekday::Tue);
        assert!(tuesday.enabled);
        assert_eq!(tuesday.hours_label(), "09:00-17:00");
        assert!(!calendar.window_for(Weekday::Sat).enabled);
        assert!(!calendar.window_for(Weekday::Sun).enabled);
    }

    #[test]
    fn window_is_half_open() {
        let window = AvailabilityWindow::new(true, t(9, 0), t(17, 0)).unwrap();
        assert!(window.contains(t(9, 0)));
        assert!(window.contains(t(16, 59)));
        assert!(!window.contains(t(17, 0)));
        assert!(!window.contains(t(8, 59)));
    }

    #[test]
    fn enabled_window_requires_start_before_end() {
        let err = AvailabilityWindow::new(true, t(17, 0), t(9, 0)).unwrap_err();
        assert!(matches!(err, CalendarError::InvalidWindow { .. }));
        assert!(AvailabilityWindow::new(false, t(17, 0), t(9, 0)).is_ok());
    }

    #[test]
    fn window_for_name_rejects_unknown_day() {
        let calendar = AvailabilityCalendar::default();
        assert!(calendar.window_for_name("tuesday").is_ok());
        assert!(calendar.window_for_name("Tue").is_ok());
        assert_eq!(
            calendar.window_for_name("Funday").unwrap_err(),
            CalendarError::InvalidWeekday("Funday".to_string())
        );
    }

    #[test]
    fn json_round_trip_keeps_weekday_order() {
        let calendar = AvailabilityCalendar::default()
            .with_window(Weekday::Sat, AvailabilityWindow::new(true, t(10, 0), t(12, 30)).unwrap());
        let json = calendar.to_json_pretty();
        let monday = json.find("Monday").unwrap();
        let sunday = json.find("Sunday").unwrap();
        assert!(monday < sunday);
        assert!(json.contains("\"12:30\""));
        assert_eq!(AvailabilityCalendar::from_json(&json).unwrap(), calendar);
    }

    #[test]
    fn from_json_requires_all_seven_days() {
        let json = r#"{"Monday": {"enabled": true, "start": "09:00", "end": "17:00"}}"#;
        let err = AvailabilityCalendar::from_json(json).unwrap_err();
        assert_eq!(err, CalendarError::MissingWeekday("Tuesday".to_string()));
    }

    fn default_json() -> serde_json::Value {
        serde_json::from_str(&AvailabilityCalendar::default().to_json_pretty()).unwrap()
    }

    #[test]
    fn from_json_rejects_unknown_day_key() {
        let mut calendar = default_json();
        calendar["Funday"] = calendar["Monday"].clone();
        let err = AvailabilityCalendar::from_json(&calendar.to_string()).unwrap_err();
        assert_eq!(err, CalendarError::InvalidWeekday("Funday".to_string()));
    }

    #[test]
    fn from_json_rejects_bad_time() {
        let mut calendar = default_json();
        calendar["Friday"]["end"] = "5pm".into();
        let err = AvailabilityCalendar::from_json(&calendar.to_string()).unwrap_err();
        assert_eq!(err, CalendarError::InvalidTime("5pm".to_string()));
    }

    #[test]
    fn from_json_syntax_error_is_json() {
        let err = AvailabilityCalendar::from_json("{\"Monday\": ").unwrap_err();
        assert!(matches!(err, CalendarError::Json(_)));
    }

    #[test]
    fn from_json_reports_inverted_window_with_day() {
        let mut calendar = default_json();
        calendar["Wednesday"]["start"] = "18:00".into();
        let err = AvailabilityCalendar::from_json(&calendar.to_string()).unwrap_err();
        assert_eq!(
            err,
            CalendarError::InvalidWindow {
                day: "Wednesday".to_string(),
                start: "18:00".to_string(),
                end: "17:00".to_string(),
            }
        );
    }
}
