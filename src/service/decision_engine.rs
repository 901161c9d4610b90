use chrono::Weekday;
use tracing::{info, warn};

use crate::models::availability::{AvailabilityCalendar, AvailabilityWindow, weekday_name};
use crate::models::decision::{Decision, ReschedulePayload};
use crate::models::meeting::MeetingEvent;
use crate::service::timezone::NormalizedInstant;

const BODY_OPENING: &str =
    "I noticed you scheduled a meeting outside my working hours. Did you mean to do this?";
const BODY_CLOSING: &str = "Would you like to reschedule?";

/// Reschedule request quoting the configured hours for `day` verbatim.
pub fn reschedule_body(day: Weekday, window: &AvailabilityWindow) -> String {
    let name = weekday_name(day);
    if window.enabled {
        format!(
            "{BODY_OPENING} My working hours on {name} are {hours}. {BODY_CLOSING}",
            hours = window.hours_label()
        )
    } else {
        format!("{BODY_OPENING} I am not available on {name}s. {BODY_CLOSING}")
    }
}

/// Decides whether a meeting needs a reschedule request. Pure: no I/O.
pub fn decide(
    event: Option<&MeetingEvent>,
    instant: Option<&NormalizedInstant>,
    calendar: &AvailabilityCalendar,
) -> Decision {
    let Some(event) = event else {
        return Decision::NoAction;
    };
    let Some(instant) = instant else {
        warn!("meeting event without a normalized start, skipping");
        return Decision::NoAction;
    };

    let window = calendar.window_for(instant.weekday);
    if window.contains(instant.time_of_day) {
        return Decision::NoAction;
    }

    info!(
        weekday = weekday_name(instant.weekday),
        time = %instant.time_of_day,
        enabled = window.enabled,
        "meeting falls outside availability"
    );
    Decision::Action(ReschedulePayload {
        sender: event.sender.clone(),
        subject: event.subject.clone(),
        body: reschedule_body(instant.weekday, window),
    })
}
