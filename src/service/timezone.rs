use chrono::{
    DateTime, Datelike, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::meeting::{MeetingEvent, MeetingStart};

/// Meeting start expressed both as an absolute instant and as wall-clock time in the user's zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInstant {
    pub instant: DateTime<Utc>,
    pub local: DateTime<Tz>,
    pub weekday: Weekday,
    pub time_of_day: NaiveTime,
}

impl NormalizedInstant {
    fn from_local(local: DateTime<Tz>) -> Self {
        let time_of_day = NaiveTime::from_hms_opt(local.hour(), local.minute(), local.second())
            .unwrap_or(NaiveTime::MIN);
        Self {
            instant: local.with_timezone(&Utc),
            weekday: local.weekday(),
            time_of_day,
            local,
        }
    }
}

pub fn resolve_timezone(name: &str) -> Result<Tz, PipelineError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| PipelineError::UnresolvableTimezone(name.to_string()))
}

/// Places a floating wall-clock time in `zone`.
///
/// Ambiguous times in a DST fall-back take the earlier instant; times skipped by a
/// spring-forward are moved one hour later.
pub fn localize(zone: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    zone.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            zone.from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| zone.from_utc_datetime(&naive))
}

/// Converts the event start into `target_zone`.
///
/// Timestamps without zone information are read in the event's timezone hint when it
/// names a known zone, otherwise they are assumed to already be in `target_zone`.
pub fn normalize(
    event: &MeetingEvent,
    target_zone: &str,
) -> Result<NormalizedInstant, PipelineError> {
    let target = resolve_timezone(target_zone)?;
    let local = match event.start {
        MeetingStart::Zoned(zoned) => zoned.with_timezone(&target),
        MeetingStart::Floating(naive) => {
            let source = match event.source_timezone_hint.as_deref() {
                Some(hint) => match resolve_timezone(hint) {
                    Ok(zone) => zone,
                    Err(_) => {
                        warn!(hint, "ignoring unknown source timezone hint");
                        target
                    }
                },
                None => target,
            };
            localize(source, naive).with_timezone(&target)
        }
    };
    debug!(zone = %target, local = %local, "normalized meeting start");
    Ok(NormalizedInstant::from_local(local))
}
