//! OpenAI-compatible chat completions backend.
//!
//! Works against api.openai.com as well as local servers (Ollama, vLLM)
//! that expose the same `/chat/completions` endpoint.

use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Single-turn completion with one user message
    pub fn chat(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let body = build_request(model, prompt, temperature, max_tokens);

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(anyhow!("OpenAI API error {}: {}", status, text));
        }
        parse_response(&text)
    }
}

fn build_request<'a>(
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: Option<u32>,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature,
        max_tokens,
    }
}

fn parse_response(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| anyhow!("OpenAI response contained no message content"))
}
