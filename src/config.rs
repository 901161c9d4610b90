use std::collections::HashMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::openai_client::{DEFAULT_MODEL, OPENAI_API_URL, OpenAISettings};
use crate::error::ConfigError;
use crate::models::availability::AvailabilityCalendar;
use crate::service::dispatcher::{Dispatcher, WebhookDispatcher};
use crate::service::extraction::{MeetingExtractor, OpenAIExtractor};
use crate::service::openai_service::OpenAIService;
use crate::service::pipeline::DecisionPipeline;
use crate::service::rule_extractor::RuleBasedExtractor;
use crate::service::timezone::resolve_timezone;

pub const DEFAULT_TIMEZONE: &str = "US/Eastern";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3030";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// File value first, then the process environment.
    pub fn get_prop(&self, key: &str) -> Option<String> {
        self.get(key)
            .or_else(|| env::var(key).ok())
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Cli,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    OpenAI,
    Rules,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,
    pub webhook_url: Option<String>,
    pub timezone: String,
    pub calendar: AvailabilityCalendar,
    pub request_timeout: Duration,
    pub run_mode: RunMode,
    pub listen_addr: SocketAddr,
    pub extractor: ExtractorKind,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| config.get_prop(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timezone = lookup("USER_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        resolve_timezone(&timezone).map_err(|_| ConfigError::InvalidValue {
            key: "USER_TIMEZONE",
            value: timezone.clone(),
        })?;

        let calendar = match lookup("CALENDAR_FILE") {
            Some(path) => AvailabilityCalendar::from_file(&path)?,
            None => AvailabilityCalendar::default(),
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidValue {
                    key: "REQUEST_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let run_mode = match lookup("RUN_MODE").as_deref().map(str::trim) {
            None | Some("cli") => RunMode::Cli,
            Some("api") => RunMode::Api,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "RUN_MODE",
                    value: other.to_string(),
                });
            }
        };

        let extractor = match lookup("EXTRACTOR").as_deref().map(str::trim) {
            None | Some("openai") => ExtractorKind::OpenAI,
            Some("rules") => ExtractorKind::Rules,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "EXTRACTOR",
                    value: other.to_string(),
                });
            }
        };

        let raw_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "LISTEN_ADDR",
                value: raw_addr.clone(),
            })?;

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY"),
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_api_url: lookup("OPENAI_API_URL").unwrap_or_else(|| OPENAI_API_URL.to_string()),
            webhook_url: lookup("WEBHOOK_URL"),
            timezone,
            calendar,
            request_timeout,
            run_mode,
            listen_addr,
            extractor,
        })
    }

    pub fn openai_settings(&self) -> Result<OpenAISettings, ConfigError> {
        let api_key = self
            .openai_api_key
            .clone()
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        Ok(OpenAISettings {
            api_key,
            model: self.openai_model.clone(),
            api_url: self.openai_api_url.clone(),
            timeout: self.request_timeout,
        })
    }

    pub fn build_extractor(&self) -> Result<Arc<dyn MeetingExtractor>, ConfigError> {
        Ok(match self.extractor {
            ExtractorKind::OpenAI => {
                let openai = Arc::new(OpenAIService::new(self.openai_settings()?));
                Arc::new(OpenAIExtractor::new(openai))
            }
            ExtractorKind::Rules => Arc::new(RuleBasedExtractor::new()),
        })
    }

    pub fn build_dispatcher(&self) -> Option<Arc<dyn Dispatcher>> {
        self.webhook_url.as_ref().map(|url| {
            let dispatcher = WebhookDispatcher::new(url.clone(), self.request_timeout);
            Arc::new(dispatcher) as Arc<dyn Dispatcher>
        })
    }

    pub fn build_pipeline(&self) -> Result<DecisionPipeline, ConfigError> {
        let pipeline = DecisionPipeline::new(self.build_extractor()?);
        Ok(match self.build_dispatcher() {
            Some(dispatcher) => pipeline.with_dispatcher(dispatcher),
            None => pipeline,
        })
    }
}
