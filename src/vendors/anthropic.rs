//! Anthropic messages API backend.

use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The messages API requires max_tokens on every request
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn chat(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("No Anthropic API key configured"))?;
        let body = build_request(model, prompt, temperature, max_tokens);

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(anyhow!("Anthropic API error {}: {}", status, text));
        }
        parse_response(&text)
    }
}

fn build_request<'a>(
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: Option<u32>,
) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        // Anthropic caps temperature at 1.0
        temperature: temperature.min(1.0),
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
    }
}

fn parse_response(body: &str) -> Result<String> {
    let response: MessagesResponse = serde_json::from_str(body)?;
    let text: Vec<String> = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(anyhow!("Anthropic response contained no text"));
    }
    Ok(text.join("").trim().to_string())
}
