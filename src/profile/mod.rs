//! The persisted user profile.
//!
//! One record per deployment, holding everything learned about the user:
//! - `CoreAttributes` - the six high-priority facts elicited first
//! - `user_info` - open-ended facts (name, interests, work, ...)
//! - question bookkeeping (`questions_asked`, `pending_question`)
//! - conversation history and the last weather snapshot

pub(crate) mod lenient;
mod store;

pub use store::ProfileStore;

use crate::collaborators::WeatherConditions;
use crate::ordered_set::OrderedSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fixed keys of the core attributes, in elicitation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreKey {
    Location,
    Timezone,
    WeatherPreference,
    DailyRoutine,
    LocalInterests,
    SeasonPreference,
}

impl CoreKey {
    pub const ALL: [CoreKey; 6] = [
        CoreKey::Location,
        CoreKey::Timezone,
        CoreKey::WeatherPreference,
        CoreKey::DailyRoutine,
        CoreKey::LocalInterests,
        CoreKey::SeasonPreference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoreKey::Location => "location",
            CoreKey::Timezone => "timezone",
            CoreKey::WeatherPreference => "weather_preference",
            CoreKey::DailyRoutine => "daily_routine",
            CoreKey::LocalInterests => "local_interests",
            CoreKey::SeasonPreference => "season_preference",
        }
    }

    /// Parse a key in snake_case or camelCase spelling
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "location" => Some(CoreKey::Location),
            "timezone" | "time_zone" | "timeZone" => Some(CoreKey::Timezone),
            "weather_preference" | "weatherPreference" => Some(CoreKey::WeatherPreference),
            "daily_routine" | "dailyRoutine" => Some(CoreKey::DailyRoutine),
            "local_interests" | "localInterests" => Some(CoreKey::LocalInterests),
            "season_preference" | "seasonPreference" => Some(CoreKey::SeasonPreference),
            _ => None,
        }
    }
}

impl std::fmt::Display for CoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The six core attributes. A value is either absent or a non-empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreAttributes {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub timezone: Option<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub weather_preference: Option<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub daily_routine: Option<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub local_interests: Option<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub season_preference: Option<String>,
}

impl CoreAttributes {
    fn slot(&self, key: CoreKey) -> &Option<String> {
        match key {
            CoreKey::Location => &self.location,
            CoreKey::Timezone => &self.timezone,
            CoreKey::WeatherPreference => &self.weather_preference,
            CoreKey::DailyRoutine => &self.daily_routine,
            CoreKey::LocalInterests => &self.local_interests,
            CoreKey::SeasonPreference => &self.season_preference,
        }
    }

    fn slot_mut(&mut self, key: CoreKey) -> &mut Option<String> {
        match key {
            CoreKey::Location => &mut self.location,
            CoreKey::Timezone => &mut self.timezone,
            CoreKey::WeatherPreference => &mut self.weather_preference,
            CoreKey::DailyRoutine => &mut self.daily_routine,
            CoreKey::LocalInterests => &mut self.local_interests,
            CoreKey::SeasonPreference => &mut self.season_preference,
        }
    }

    pub fn get(&self, key: CoreKey) -> Option<&str> {
        self.slot(key).as_deref()
    }

    /// Set a value; blank input clears the attribute
    pub fn set(&mut self, key: CoreKey, value: &str) {
        let value = value.trim();
        *self.slot_mut(key) = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
    }

    pub fn is_known(&self, key: CoreKey) -> bool {
        self.get(key).is_some()
    }

    fn normalize(&mut self) {
        for key in CoreKey::ALL {
            let blank = self.get(key).is_some_and(|v| v.trim().is_empty());
            if blank {
                *self.slot_mut(key) = None;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "user_message")]
    pub user_message_summary: String,
    /// Raw structured payload returned by the extractor
    #[serde(default)]
    pub extracted_info: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherContext {
    #[serde(deserialize_with = "lenient::optional_timestamp")]
    pub last_checked: Option<DateTime<Utc>>,
    pub conditions: Option<WeatherConditions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(deserialize_with = "lenient::text_map")]
    pub user_info: BTreeMap<String, String>,
    pub core_attributes: CoreAttributes,
    pub conversation_history: Vec<HistoryEntry>,
    pub topics_discussed: OrderedSet,
    pub questions_asked: OrderedSet,
    pub pending_question: Option<String>,
    #[serde(deserialize_with = "lenient::optional_timestamp")]
    pub last_interaction: Option<DateTime<Utc>>,
    pub weather_context: WeatherContext,
}

impl Profile {
    /// Restore invariants on a record read from disk
    pub fn normalize(&mut self) {
        self.core_attributes.normalize();
        if self
            .pending_question
            .as_deref()
            .is_some_and(|q| q.trim().is_empty())
        {
            self.pending_question = None;
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.core_attributes.get(CoreKey::Location)
    }

    pub fn timezone(&self) -> Option<&str> {
        self.core_attributes.get(CoreKey::Timezone)
    }

    /// The name to greet the user with
    pub fn display_name(&self) -> &str {
        self.user_info
            .get("name")
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("there")
    }

    pub fn interaction_count(&self) -> usize {
        self.conversation_history.len()
    }

    /// Record a question as sent and awaiting an answer
    pub fn mark_asked(&mut self, question: &str) {
        self.questions_asked.insert(question);
        self.pending_question = Some(question.to_string());
    }
}

/// Flatten a JSON value into attribute text. Null and blank values yield none.
pub(crate) fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_key_parse() {
        assert_eq!(CoreKey::parse("location"), Some(CoreKey::Location));
        assert_eq!(CoreKey::parse("weatherPreference"), Some(CoreKey::WeatherPreference));
        assert_eq!(CoreKey::parse("season_preference"), Some(CoreKey::SeasonPreference));
        assert_eq!(CoreKey::parse("favorite_color"), None);
        for key in CoreKey::ALL {
            assert_eq!(CoreKey::parse(key.as_str()), Some(key));
        }
    }

    #[test]
    fn test_set_blank_clears() {
        let mut core = CoreAttributes::default();
        core.set(CoreKey::Location, "  Austin, Texas ");
        assert_eq!(core.get(CoreKey::Location), Some("Austin, Texas"));
        core.set(CoreKey::Location, "   ");
        assert!(!core.is_known(CoreKey::Location));
    }

    #[test]
    fn test_normalize_blank_values() {
        let json = r#"{
            "core_attributes": {"location": "", "timezone": "America/Chicago"},
            "pending_question": " "
        }"#;
        let mut profile: Profile = serde_json::from_str(json).unwrap();
        profile.normalize();
        assert_eq!(profile.location(), None);
        assert_eq!(profile.timezone(), Some("America/Chicago"));
        assert_eq!(profile.pending_question, None);
    }

    #[test]
    fn test_default_serializes_all_core_keys() {
        let json = serde_json::to_value(Profile::default()).unwrap();
        let core = json["core_attributes"].as_object().unwrap();
        let keys: Vec<&str> = core.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 6);
        assert!(core.values().all(Value::is_null));
        assert_eq!(json["questions_asked"], serde_json::json!([]));
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(
            value_to_text(&serde_json::json!(["hiking", "jazz"])).as_deref(),
            Some("hiking, jazz")
        );
        assert_eq!(value_to_text(&serde_json::json!(34)).as_deref(), Some("34"));
        assert_eq!(value_to_text(&serde_json::json!("  ")), None);
        assert_eq!(value_to_text(&Value::Null), None);
    }

    #[test]
    fn test_core_attributes_flatten_non_strings() {
        let json = r#"{"core_attributes": {"local_interests": ["farmers market", "live music"], "location": null}}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(
            profile.core_attributes.get(CoreKey::LocalInterests),
            Some("farmers market, live music")
        );
        assert_eq!(profile.location(), None);
    }

    #[test]
    fn test_display_name() {
        let mut profile = Profile::default();
        assert_eq!(profile.display_name(), "there");
        profile.user_info.insert("name".into(), "Sam".into());
        assert_eq!(profile.display_name(), "Sam");
    }

    #[test]
    fn test_mark_asked() {
        let mut profile = Profile::default();
        profile.mark_asked("Where are you?");
        profile.mark_asked("Where are you?");
        assert_eq!(profile.questions_asked.len(), 1);
        assert_eq!(profile.pending_question.as_deref(), Some("Where are you?"));
    }
}
