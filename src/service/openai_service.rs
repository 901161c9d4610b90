use async_trait::async_trait;

use crate::clients::openai_client::{self, OpenAISettings};
use crate::error::BackendError;

#[async_trait]
pub trait OpenAIClient: Send + Sync {
    async fn generate_prompt(
        &self,
        prompt: &str,
        prompt_type: &str,
    ) -> Result<String, BackendError>;
}

pub struct OpenAIService {
    http: reqwest::Client,
    settings: OpenAISettings,
}

impl OpenAIService {
    pub fn new(settings: OpenAISettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl OpenAIClient for OpenAIService {
    async fn generate_prompt(
        &self,
        prompt: &str,
        prompt_type: &str,
    ) -> Result<String, BackendError> {
        openai_client::query_openai(&self.http, &self.settings, prompt.to_string(), prompt_type)
            .await
    }
}
