//! Digest composition.
//!
//! Gathers what we know about the user, today's content and the next
//! question into one prompt and lets the model write the email in the
//! persona's voice.

use crate::collaborators::NewsItem;
use crate::events::{Event, EventBus};
use crate::llm::TextModel;
use crate::model_routing::Task;
use crate::persona::{self, DigestPrompt};
use crate::planner::{self, Question};
use crate::profile::{CoreKey, Profile};
use anyhow::{anyhow, Result};
use chrono::{Local, Timelike};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Coarse wall-clock bucket used for tone and subject line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// [4,12) morning, [12,17) afternoon, everything else evening
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            4..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }

    pub fn now() -> Self {
        Self::from_hour(Local::now().hour())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning chat and updates ☀️",
            TimeOfDay::Afternoon => "Afternoon updates and stories 🌤️",
            TimeOfDay::Evening => "Evening chat and news 🌙",
        }
    }
}

/// A composed email, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub subject: String,
    pub body: String,
    /// The question woven into the body, if any
    pub question: Option<Question>,
}

pub struct DigestComposer<'a> {
    model: &'a dyn TextModel,
    bus: Arc<EventBus>,
}

impl<'a> DigestComposer<'a> {
    pub fn new(model: &'a dyn TextModel, bus: Arc<EventBus>) -> Self {
        Self { model, bus }
    }

    pub fn compose(
        &self,
        profile: &mut Profile,
        news: &[NewsItem],
        fact: &str,
        gossip: &str,
        inline_reply: &str,
    ) -> Result<Digest> {
        self.compose_at(profile, news, fact, gossip, inline_reply, TimeOfDay::now())
    }

    /// Compose for an explicit time of day.
    ///
    /// The selected question is recorded as asked and pending only after
    /// the model produced the body.
    pub fn compose_at(
        &self,
        profile: &mut Profile,
        news: &[NewsItem],
        fact: &str,
        gossip: &str,
        inline_reply: &str,
        time_of_day: TimeOfDay,
    ) -> Result<Digest> {
        let question = planner::next_question(profile);
        match &question {
            Some(q) => self
                .bus
                .emit(Event::question_selected(&q.topic.to_string(), &q.text)),
            None => self
                .bus
                .emit(Event::question_skipped(planner::skip_reason(profile))),
        }

        let news_lines = persona::format_news(news);
        let prompt = persona::digest_prompt(&DigestPrompt {
            user_name: profile.display_name(),
            known_info: json!(profile.user_info),
            core_context: core_context(profile),
            time_of_day: time_of_day.as_str(),
            interactions: profile.interaction_count(),
            inline_reply,
            news: &news_lines,
            fact,
            gossip,
            question: question.as_ref().map(|q| q.text.as_str()),
        });

        let body = self.model.complete(Task::Compose, &prompt)?;
        if body.trim().is_empty() {
            return Err(anyhow!("Digest generation returned an empty body"));
        }

        if let Some(q) = &question {
            profile.mark_asked(&q.text);
        }

        let subject = time_of_day.subject().to_string();
        self.bus
            .emit(Event::digest_composed(&subject, question.is_some(), news.len()));

        Ok(Digest {
            subject,
            body: body.trim().to_string(),
            question,
        })
    }
}

/// Core attributes plus the current weather, as handed to the model
fn core_context(profile: &Profile) -> Value {
    let mut ctx = Map::new();
    for key in CoreKey::ALL {
        let value = profile
            .core_attributes
            .get(key)
            .map_or(Value::Null, |v| Value::String(v.to_string()));
        ctx.insert(key.as_str().to_string(), value);
    }
    let weather = profile
        .weather_context
        .conditions
        .as_ref()
        .and_then(|c| serde_json::to_value(c).ok())
        .unwrap_or_else(|| json!({}));
    ctx.insert("weather".to_string(), weather);
    Value::Object(ctx)
}
