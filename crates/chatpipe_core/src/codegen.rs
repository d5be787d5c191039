use crate::llm_protocol::{completion_text, ChatRequest, ChatResponse};
use anyhow::Result;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

#[derive(Debug, Clone)]
pub struct CodegenConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base: Option<String>,
}

impl CodegenConfig {
    pub fn base_url(&self) -> String {
        self.openai_base.clone().unwrap_or_else(|| "https://api.openai.com".into())
    }
}

/// Sends the prompt to the chat-completion endpoint and returns the single
/// completion text, verbatim. The completion is untrusted input: it is not
/// validated, fenced-stripped, or otherwise sanitized here.
///
/// Every failure (transport, auth, quota, malformed response) surfaces as an
/// error for the caller to report; nothing is retried.
#[tracing::instrument(skip_all, fields(model = %cfg.openai_model))]
pub async fn generate_code(prompt: &str, cfg: &CodegenConfig) -> Result<String> {
    let url = format!("{}/v1/chat/completions", cfg.base_url().trim_end_matches('/'));
    let client = reqwest::Client::new();

    let body = ChatRequest::for_prompt(&cfg.openai_model, prompt);
    let resp = client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", cfg.openai_api_key))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let txt = resp.text().await.unwrap_or_default();
        anyhow::bail!("completion API error ({status}): {txt}");
    }

    let parsed: ChatResponse = resp.json().await?;
    completion_text(&parsed)
}
