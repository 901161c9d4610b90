use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BackendError;

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const MEETING_EXTRACTION: &str = "meeting_extraction";

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Debug, Clone)]
pub struct OpenAISettings {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl OpenAISettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_url: OPENAI_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn system_message(prompt_type: &str) -> &'static str {
    match prompt_type {
        MEETING_EXTRACTION => {
            "You are a strict JSON meeting extraction engine. You read an email and reply ONLY with a single JSON object, with no markdown, no backticks, and no extra text. Never invent a meeting, date, time or sender that the email does not state."
        }
        _ => "You are a helpful assistant.",
    }
}

pub async fn query_openai(
    client: &reqwest::Client,
    settings: &OpenAISettings,
    prompt: String,
    prompt_type: &str,
) -> Result<String, BackendError> {
    let request = OpenAIRequest {
        model: settings.model.clone(),
        messages: vec![
            OpenAIMessage {
                role: "system".to_string(),
                content: system_message(prompt_type).to_string(),
            },
            OpenAIMessage {
                role: "user".to_string(),
                content: prompt,
            },
        ],
        max_tokens: 1500,
        temperature: 0.0,
    };

    debug!(model = %settings.model, prompt_type, "querying language backend");
    let response = client
        .post(&settings.api_url)
        .header("Authorization", format!("Bearer {}", settings.api_key))
        .header("Content-Type", "application/json")
        .timeout(settings.timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| transport_error(e, settings.timeout))?;

    let status = response.status();
    // read the body once
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(e, settings.timeout))?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "language backend returned an error");
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: text,
        });
    }

    let parsed: OpenAIResponse = serde_json::from_str(&text).map_err(|e| {
        BackendError::InvalidResponse(format!("{}\nRaw body: {}", e, text))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| BackendError::InvalidResponse("no choices in response".to_string()))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout)
    } else {
        BackendError::Network(err.to_string())
    }
}
