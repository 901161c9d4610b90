//! Meeting extraction contract.
//!
//! The instructions sent to the backend, the reply shape they ask for and the
//! boundary extraction applied to the reply are kept together in this module and
//! versioned as one unit by [`EXTRACTION_PROMPT_VERSION`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info};

use crate::clients::openai_client::MEETING_EXTRACTION;
use crate::error::ExtractionError;
use crate::models::availability::{AvailabilityCalendar, weekday_name};
use crate::models::meeting::{MeetingEvent, MeetingStart};
use crate::service::openai_service::OpenAIClient;

pub const EXTRACTION_PROMPT_VERSION: &str = "meeting-extraction/v1";

/// Per-request inputs the extractor may use besides the email itself.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub timezone: &'a str,
    pub calendar: &'a AvailabilityCalendar,
    /// Date relative phrases ("Tuesday", "tomorrow") are resolved against.
    pub today: NaiveDate,
}

/// Today's date in `timezone`, or in UTC when the zone is unknown.
pub fn today_in(timezone: &str) -> NaiveDate {
    match timezone.trim().parse::<Tz>() {
        Ok(zone) => Utc::now().with_timezone(&zone).date_naive(),
        Err(_) => Utc::now().date_naive(),
    }
}

#[async_trait]
pub trait MeetingExtractor: Send + Sync {
    /// `Ok(None)` when the email proposes no schedulable meeting. A returned event has
    /// every field populated.
    async fn extract(
        &self,
        email: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<Option<MeetingEvent>, ExtractionError>;
}

pub fn build_extraction_prompt(
    email: &str,
    timezone: &str,
    today: NaiveDate,
    calendar: &AvailabilityCalendar,
) -> String {
    format!(
        "Analyze the following email to determine if it proposes a meeting or scheduled event.\n\
         \n\
         EMAIL:\n\
         {email}\n\
         \n\
         USER TIMEZONE:\n\
         {timezone}\n\
         \n\
         CURRENT DATE:\n\
         {today} ({weekday})\n\
         \n\
         USER AVAILABLE HOURS:\n\
         {calendar}\n\
         \n\
         Instructions:\n\
         1. If the email does NOT propose a meeting or scheduled event with a concrete date and time, return: {{\"action\": \"No Action\"}}\n\
         2. If the email proposes a meeting or scheduled event:\n\
            a. Extract the sender's email address and the email subject.\n\
            b. Extract the meeting start as an ISO-8601 datetime (YYYY-MM-DDTHH:MM:SS). Resolve relative dates against the current date.\n\
            c. Include a UTC offset in \"start\" only if the email states the timezone; otherwise leave the offset out.\n\
            d. If the email names the meeting's timezone, put its IANA name in \"timezone\", otherwise use null.\n\
            e. Return a JSON object in this exact format:\n\
               {{\"action\": \"Action\", \"sender\": \"<sender's email>\", \"subject\": \"<email subject>\", \"start\": \"<ISO-8601 datetime>\", \"timezone\": \"<IANA timezone or null>\"}}\n\
         3. Only report one meeting. If the date, time or sender is missing, return {{\"action\": \"No Action\"}}.\n\
         \n\
         Your response must be either {{\"action\": \"No Action\"}} or a valid JSON object containing \"action\": \"Action\".\n\
         Do not include any other text before or after the JSON.",
        email = email,
        timezone = timezone,
        today = today.format("%Y-%m-%d"),
        weekday = weekday_name(today.weekday()),
        calendar = calendar.to_json_pretty(),
    )
}

/// Returns the slice from the first `{` to the last `}` of a free-form reply.
pub fn locate_json_payload(text: &str) -> Result<&str, ExtractionError> {
    let start = text
        .find('{')
        .ok_or_else(|| ExtractionError::Parse("no opening brace in response".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| ExtractionError::Parse("no closing brace in response".to_string()))?;
    if end < start {
        return Err(ExtractionError::Parse(
            "closing brace precedes opening brace".to_string(),
        ));
    }
    Ok(&text[start..=end])
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    action: String,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ExtractionError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ExtractionError::Incomplete(field))
}

/// Reads the backend reply into a meeting event.
///
/// Only the facts are taken from the reply. Any drafted `body` the backend adds is ignored
/// since the reschedule text is always rendered by the decision engine.
pub fn parse_extraction_payload(response: &str) -> Result<Option<MeetingEvent>, ExtractionError> {
    let json = locate_json_payload(response)?;
    let payload: ExtractionPayload =
        serde_json::from_str(json).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let action = payload.action.trim();
    if action.eq_ignore_ascii_case("no action") {
        return Ok(None);
    }
    if !action.eq_ignore_ascii_case("action") {
        return Err(ExtractionError::Parse(format!("unknown action {:?}", action)));
    }

    let sender = required(payload.sender, "sender")?;
    let subject = required(payload.subject, "subject")?;
    let raw_start = required(payload.start, "start")?;
    let start = MeetingStart::parse(&raw_start)
        .ok_or_else(|| ExtractionError::Parse(format!("unrecognized start {:?}", raw_start)))?;
    let source_timezone_hint = payload
        .timezone
        .map(|tz| tz.trim().to_string())
        .filter(|tz| !tz.is_empty() && !tz.eq_ignore_ascii_case("null"));

    Ok(Some(MeetingEvent {
        sender,
        subject,
        start,
        source_timezone_hint,
    }))
}

/// Extractor backed by the language-understanding service.
pub struct OpenAIExtractor {
    openai: Arc<dyn OpenAIClient>,
}

impl OpenAIExtractor {
    pub fn new(openai: Arc<dyn OpenAIClient>) -> Self {
        Self { openai }
    }
}

#[async_trait]
impl MeetingExtractor for OpenAIExtractor {
    async fn extract(
        &self,
        email: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<Option<MeetingEvent>, ExtractionError> {
        let prompt =
            build_extraction_prompt(email, context.timezone, context.today, context.calendar);
        info!(
            version = EXTRACTION_PROMPT_VERSION,
            email_len = email.len(),
            "requesting meeting extraction"
        );
        let response = self.openai.generate_prompt(&prompt, MEETING_EXTRACTION).await?;
        debug!(response_len = response.len(), "extraction backend replied");
        parse_extraction_payload(&response)
    }
}
