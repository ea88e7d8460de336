//! Language model vendor integrations.
//!
//! Contains one client per wire protocol and the [`ModelClient`] that
//! routes each task to the configured backend.

pub mod anthropic;
pub mod openai;

use crate::config::{BackendKind, Config};
use crate::events::{Event, EventBus};
use crate::llm::TextModel;
use crate::model_routing::{ModelRouter, Task};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anthropic::AnthropicClient;
use openai::OpenAiClient;

enum VendorClient {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
}

impl VendorClient {
    fn chat(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        match self {
            VendorClient::OpenAi(c) => c.chat(model, prompt, temperature, max_tokens),
            VendorClient::Anthropic(c) => c.chat(model, prompt, temperature, max_tokens),
        }
    }
}

/// Routes each task to its backend and reports every call on the bus
pub struct ModelClient {
    router: ModelRouter,
    clients: HashMap<String, VendorClient>,
    bus: Arc<EventBus>,
}

impl ModelClient {
    /// Build clients for every backend referenced by the routing table
    pub fn from_config(config: &Config, bus: Arc<EventBus>) -> Result<Self> {
        let router = ModelRouter::new(&config.routing)?;

        let mut clients = HashMap::new();
        for name in router.backends() {
            let backend = config.backend(&name)?;
            let api_key = backend.resolve_api_key();
            let client = match backend.kind() {
                BackendKind::OpenAiCompatible => {
                    VendorClient::OpenAi(OpenAiClient::new(&backend.base_url, api_key))
                }
                BackendKind::Anthropic => {
                    VendorClient::Anthropic(AnthropicClient::new(&backend.base_url, api_key))
                }
            };
            clients.insert(name, client);
        }

        Ok(Self {
            router,
            clients,
            bus,
        })
    }
}

impl TextModel for ModelClient {
    fn complete(&self, task: Task, prompt: &str) -> Result<String> {
        let route = self.router.resolve(task);
        let client = self
            .clients
            .get(&route.target.backend)
            .ok_or_else(|| anyhow!("No client for backend '{}'", route.target.backend))?;

        let start = Instant::now();
        let result = client.chat(
            &route.target.model,
            prompt,
            route.temperature,
            route.max_tokens,
        );
        self.bus.emit(Event::model_request(
            task.as_str(),
            &route.target.model,
            &route.target.backend,
            start.elapsed().as_millis() as u64,
            result.is_ok(),
        ));
        result
    }
}
