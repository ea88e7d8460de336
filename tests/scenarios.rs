//! End-to-end scenarios over the public API with in-memory collaborators.

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use messej::collaborators::{NewsSource, WeatherConditions, WeatherSource};
use messej::composer::{DigestComposer, TimeOfDay};
use messej::events::{EventBus, EventRecorder};
use messej::extractor::FactExtractor;
use messej::llm::TextModel;
use messej::model_routing::Task;
use messej::news::{NewsApiClient, MISSING_KEY_MESSAGE};
use messej::persona::NO_EMAIL_REPLY;
use messej::planner::{self, Topic, SECONDARY_TOPICS};
use messej::profile::{CoreKey, Profile, ProfileStore};

/// Answers extraction with a fixed payload and composes a short body
struct CannedModel {
    extraction: &'static str,
}

impl TextModel for CannedModel {
    fn complete(&self, task: Task, _prompt: &str) -> Result<String> {
        match task {
            Task::Extract => Ok(self.extraction.to_string()),
            Task::Compose => Ok("Hi there!\n\nMessej".to_string()),
            other => Ok(format!("{} text", other)),
        }
    }
}

struct Weather(Option<WeatherConditions>);

impl WeatherSource for Weather {
    fn conditions_for(&self, _: &str, _: Option<&str>) -> Result<Option<WeatherConditions>> {
        Ok(self.0.clone())
    }
}

struct WeatherDown;

impl WeatherSource for WeatherDown {
    fn conditions_for(&self, _: &str, _: Option<&str>) -> Result<Option<WeatherConditions>> {
        Err(anyhow!("503 Service Unavailable"))
    }
}

fn conditions(condition: &str) -> WeatherConditions {
    WeatherConditions {
        condition: condition.into(),
        description: condition.to_lowercase(),
        temp: 21.0,
        feels_like: 20.0,
        humidity: 55.0,
        local_time: None,
    }
}

#[test]
fn austin_reply_fills_location_and_clears_pending() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::new(dir.path().join("memory.json"), EventBus::new());
    let mut profile = store.load();
    profile.mark_asked(messej::planner::LOCATION_PROMPTS[0]);

    let model = CannedModel {
        extraction: r#"{"core_attributes": {"location": "Austin, Texas"}, "user_info": {}}"#,
    };
    let weather = Weather(Some(conditions("Clear")));
    let extractor = FactExtractor::new(&model, &weather, EventBus::new());

    assert!(extractor.extract(&mut profile, "I'm in Austin, Texas", "User lives in Austin"));
    store.save(&profile).unwrap();

    let reloaded = store.load();
    assert_eq!(reloaded.location(), Some("Austin, Texas"));
    assert!(reloaded.pending_question.is_none());
    assert_eq!(reloaded.conversation_history.len(), 1);
    assert_eq!(
        reloaded.conversation_history[0].user_message_summary,
        "User lives in Austin"
    );
    assert_eq!(
        reloaded.weather_context.conditions.as_ref().map(|c| c.condition.as_str()),
        Some("Clear")
    );
}

#[test]
fn full_core_with_name_asks_about_interests() {
    let mut profile = Profile::default();
    for key in CoreKey::ALL {
        profile.core_attributes.set(key, "known");
    }
    profile.user_info.insert("name".into(), "Sam".into());

    let question = planner::next_question(&profile).unwrap();
    assert_eq!(question.topic, Topic::Secondary("interests"));
    let interests = SECONDARY_TOPICS
        .iter()
        .find(|(topic, _)| *topic == "interests")
        .map(|(_, text)| *text)
        .unwrap();
    assert_eq!(question.text, interests);

    profile.questions_asked.insert(interests);
    assert_eq!(
        planner::next_question(&profile).unwrap().topic,
        Topic::Secondary("work")
    );
}

#[test]
fn weather_failure_keeps_previous_snapshot() {
    let mut profile = Profile::default();
    profile.core_attributes.set(CoreKey::Location, "Oslo, Norway");
    let checked = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();
    profile.weather_context.last_checked = Some(checked);
    profile.weather_context.conditions = Some(conditions("Snow"));

    let model = CannedModel {
        extraction: r#"{"core_attributes": {"season_preference": "Winter, for the skiing"}, "user_info": {"name": "Ingrid"}}"#,
    };
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus);
    let extractor = FactExtractor::new(&model, &WeatherDown, bus);

    assert!(extractor.extract(&mut profile, "I love winter. I'm Ingrid.", "Likes winter"));

    assert_eq!(profile.weather_context.last_checked, Some(checked));
    assert_eq!(
        profile.weather_context.conditions.as_ref().map(|c| c.condition.as_str()),
        Some("Snow")
    );
    assert_eq!(
        profile.core_attributes.get(CoreKey::SeasonPreference),
        Some("Winter, for the skiing")
    );
    assert_eq!(profile.display_name(), "Ingrid");
    assert!(recorder.kinds().contains(&"weather_unavailable"));
}

#[test]
fn missing_news_key_still_composes() {
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus);
    let news = NewsApiClient::new("https://newsapi.org/v2", None, bus.clone());

    let headlines = news.top_headlines("us", 5);
    assert_eq!(headlines.len(), 1);
    assert_eq!(headlines[0].title, MISSING_KEY_MESSAGE);

    let model = CannedModel { extraction: "{}" };
    let composer = DigestComposer::new(&model, bus);
    let mut profile = Profile::default();
    let digest = composer
        .compose_at(
            &mut profile,
            &headlines,
            "fact",
            "gossip",
            NO_EMAIL_REPLY,
            TimeOfDay::Evening,
        )
        .unwrap();

    assert_eq!(digest.subject, "Evening chat and news 🌙");
    assert!(!digest.body.is_empty());
    assert!(profile.pending_question.is_some());
    assert_eq!(
        recorder.kinds(),
        vec!["news_fallback", "question_selected", "digest_composed"]
    );
}
