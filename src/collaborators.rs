//! External collaborators consumed by the digest pipeline.
//!
//! Each collaborator is a single blocking request/response call. The real
//! implementations live in `mail`, `news`, `weather` and `vendors`; tests
//! substitute in-memory fakes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// An unread message pulled from the inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEmail {
    pub subject: String,
    /// Plain-text body with whitespace runs collapsed
    pub body: String,
}

/// A message ready to go out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewsItem {
    /// A stand-in headline used when the real feed is unavailable
    pub fn placeholder(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            source: None,
        }
    }
}

/// Current conditions at the user's location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub condition: String,
    pub description: String,
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    /// `HH:MM` in the user's timezone, when known
    #[serde(default)]
    pub local_time: Option<String>,
}

pub trait MailInbox {
    /// Unread messages whose subject matches the filter
    fn list_unread(&mut self, subject_filter: &str) -> Result<Vec<InboundEmail>>;
}

pub trait MailOutbox {
    fn send(&self, email: &OutboundEmail) -> Result<()>;
}

pub trait NewsSource {
    /// Top headlines. Never fails: problems yield a single placeholder item.
    fn top_headlines(&self, country: &str, count: usize) -> Vec<NewsItem>;
}

pub trait WeatherSource {
    /// `Ok(None)` when the location cannot be resolved or no key is configured
    fn conditions_for(
        &self,
        location: &str,
        timezone: Option<&str>,
    ) -> Result<Option<WeatherConditions>>;
}
