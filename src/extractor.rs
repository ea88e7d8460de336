//! Fact extraction from user replies.
//!
//! A reply is turned into structured attribute updates by the language
//! model, then merged into the profile with last-write-wins per key. A
//! failed or malformed extraction leaves the profile untouched.

use crate::collaborators::WeatherSource;
use crate::events::{Event, EventBus};
use crate::llm::{strip_code_fence, TextModel};
use crate::model_routing::Task;
use crate::persona;
use crate::profile::{value_to_text, CoreKey, HistoryEntry, Profile};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Attribute updates parsed from one extraction reply
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFacts {
    pub core: Vec<(CoreKey, String)>,
    pub user_info: Vec<(String, String)>,
    /// The payload as the model returned it, kept for history
    pub raw: Value,
}

impl ExtractedFacts {
    /// Parse a model reply. Anything other than a JSON object (optionally
    /// wrapped in a code fence) is malformed.
    pub fn parse(reply: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(strip_code_fence(reply))
            .map_err(|e| anyhow!("extraction reply is not JSON: {}", e))?;
        let obj = raw
            .as_object()
            .ok_or_else(|| anyhow!("extraction reply is not a JSON object"))?;

        let mut core = Vec::new();
        for (key, value) in section(obj, "core_attributes")? {
            let Some(core_key) = CoreKey::parse(key) else {
                continue;
            };
            if let Some(text) = value_to_text(value) {
                core.push((core_key, text));
            }
        }

        let mut user_info = Vec::new();
        for (key, value) in section(obj, "user_info")? {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if let Some(text) = value_to_text(value) {
                user_info.push((key.to_string(), text));
            }
        }

        Ok(Self {
            core,
            user_info,
            raw,
        })
    }

    /// Merge into the profile; returns the core and user_info keys written
    pub fn apply_to(&self, profile: &mut Profile) -> (Vec<String>, Vec<String>) {
        let mut core_updated = Vec::new();
        for (key, value) in &self.core {
            profile.core_attributes.set(*key, value);
            core_updated.push(key.as_str().to_string());
        }

        let mut user_info_updated = Vec::new();
        for (key, value) in &self.user_info {
            profile.user_info.insert(key.clone(), value.clone());
            user_info_updated.push(key.clone());
        }

        (core_updated, user_info_updated)
    }
}

/// A named section of the payload; absent or null means empty
fn section<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<Vec<(&'a String, &'a Value)>> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.iter().collect()),
        Some(_) => Err(anyhow!("'{}' is not a JSON object", name)),
    }
}

pub struct FactExtractor<'a> {
    model: &'a dyn TextModel,
    weather: &'a dyn WeatherSource,
    bus: Arc<EventBus>,
}

impl<'a> FactExtractor<'a> {
    pub fn new(model: &'a dyn TextModel, weather: &'a dyn WeatherSource, bus: Arc<EventBus>) -> Self {
        Self {
            model,
            weather,
            bus,
        }
    }

    /// Learn what the reply tells us about the user.
    ///
    /// Returns true when facts were merged. Failures are reported as
    /// events and leave the profile exactly as it was.
    pub fn extract(&self, profile: &mut Profile, email_text: &str, email_summary: &str) -> bool {
        if email_text.trim().is_empty() {
            return false;
        }

        let facts = match self.request(email_text, email_summary) {
            Ok(facts) => facts,
            Err(e) => {
                self.bus.emit(Event::extraction_failed(&e.to_string()));
                return false;
            }
        };

        let (core_updated, user_info_updated) = facts.apply_to(profile);
        self.refresh_weather(profile);

        // Any reply counts as the answer to the pending question
        profile.pending_question = None;

        let now = Utc::now();
        profile.conversation_history.push(HistoryEntry {
            timestamp: now,
            user_message_summary: email_summary.to_string(),
            extracted_info: facts.raw,
        });
        profile.last_interaction = Some(now);

        self.bus
            .emit(Event::extraction_applied(core_updated, user_info_updated));
        true
    }

    fn request(&self, email_text: &str, email_summary: &str) -> Result<ExtractedFacts> {
        let prompt = persona::extraction_prompt(email_text, email_summary);
        let reply = self.model.complete(Task::Extract, &prompt)?;
        ExtractedFacts::parse(&reply)
    }

    /// Overwrite the weather snapshot when the location is known
    fn refresh_weather(&self, profile: &mut Profile) {
        let Some(location) = profile.location().map(String::from) else {
            return;
        };

        match self.weather.conditions_for(&location, profile.timezone()) {
            Ok(Some(conditions)) => {
                self.bus
                    .emit(Event::weather_refreshed(&location, &conditions.condition));
                profile.weather_context.last_checked = Some(Utc::now());
                profile.weather_context.conditions = Some(conditions);
            }
            Ok(None) => {
                self.bus.emit(Event::weather_unavailable(&location, None));
            }
            Err(e) => {
                self.bus
                    .emit(Event::weather_unavailable(&location, Some(&e.to_string())));
            }
        }
    }
}
