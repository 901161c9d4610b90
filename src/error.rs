use std::time::Duration;

/// Calendar construction and lookup failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalendarError {
    /// Lookup or configuration key that is not one of the seven weekdays.
    #[error("invalid weekday: {0}")]
    InvalidWeekday(String),

    #[error("missing weekday in calendar: {0}")]
    MissingWeekday(String),

    /// Enabled window whose start is not strictly before its end.
    #[error("invalid window for {day}: start {start} must be before end {end}")]
    InvalidWindow {
        day: String,
        start: String,
        end: String,
    },

    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("invalid calendar json: {0}")]
    Json(String),
}

/// Errors talking to the language-understanding backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Extraction failures. The pipeline degrades every variant to `NoAction`.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction backend failed: {0}")]
    Backend(#[from] BackendError),

    /// No locatable or parseable `{"action": ...}` payload.
    #[error("could not parse extraction payload: {0}")]
    Parse(String),

    /// Payload announced a meeting but left a required field empty.
    #[error("incomplete meeting extraction: missing {0}")]
    Incomplete(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unresolvable timezone: {0:?}")]
    UnresolvableTimezone(String),

    #[error("analysis cancelled before {0}")]
    Cancelled(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid config line {line}: {content}")]
    InvalidLine { line: usize, content: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}
