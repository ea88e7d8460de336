//! Whole-file JSON persistence for the profile.

use super::Profile;
use crate::events::{Event, EventBus};
use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ProfileStore {
    path: PathBuf,
    bus: Arc<EventBus>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Self {
        Self {
            path: path.into(),
            bus,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unparsable profile is copied before a fresh start
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    /// Load the profile, falling back to an empty one.
    ///
    /// A missing, unreadable or corrupt file is a fresh start, never an
    /// error. The reason is reported through a `ProfileLoaded` event. A
    /// corrupt file is first copied to [`backup_path`](Self::backup_path)
    /// so the next save cannot destroy it.
    pub fn load(&self) -> Profile {
        let display = self.path.display().to_string();

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.bus.emit(Event::profile_loaded(&display, true, None, 0));
                return Profile::default();
            }
            Err(e) => {
                let reason = format!("unreadable: {}", e);
                self.bus
                    .emit(Event::profile_loaded(&display, true, Some(&reason), 0));
                return Profile::default();
            }
        };

        match serde_json::from_str::<Profile>(&content) {
            Ok(mut profile) => {
                profile.normalize();
                self.bus.emit(Event::profile_loaded(
                    &display,
                    false,
                    None,
                    profile.interaction_count(),
                ));
                profile
            }
            Err(e) => {
                let backup = self.backup_path();
                let reason = match fs::copy(&self.path, &backup) {
                    Ok(_) => format!("corrupt: {}, copied to {}", e, backup.display()),
                    Err(copy_err) => format!(
                        "corrupt: {}, backup to {} failed: {}",
                        e,
                        backup.display(),
                        copy_err
                    ),
                };
                self.bus
                    .emit(Event::profile_loaded(&display, true, Some(&reason), 0));
                Profile::default()
            }
        }
    }

    /// Replace the stored profile.
    ///
    /// Writes to a temporary file next to the target and renames it into
    /// place, so readers never observe a partial record.
    pub fn save(&self, profile: &Profile) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let content = serde_json::to_string_pretty(profile)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        self.bus.emit(Event::profile_saved(
            &self.path.display().to_string(),
            profile.questions_asked.len(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventRecorder, EventType};
    use crate::profile::CoreKey;

    fn store_in(dir: &tempfile::TempDir) -> (ProfileStore, EventRecorder) {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        (ProfileStore::new(dir.path().join("memory.json"), bus), recorder)
    }

    #[test]
    fn test_missing_file_is_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let (store, recorder) = store_in(&dir);

        let profile = store.load();
        assert_eq!(profile, Profile::default());

        match &recorder.events()[0].event_type {
            EventType::ProfileLoaded { fresh, reason, .. } => {
                assert!(*fresh);
                assert!(reason.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_file_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let (store, recorder) = store_in(&dir);
        fs::write(store.path(), "{ not json").unwrap();

        let profile = store.load();
        assert_eq!(profile, Profile::default());
        assert!(recorder.events()[0].event_type.is_failure());
    }

    #[test]
    fn test_corrupt_file_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let (store, recorder) = store_in(&dir);
        fs::write(store.path(), r#"{"user_info": {"name": "Sam"}, "conversation_history": 7}"#)
            .unwrap();

        assert_eq!(store.load(), Profile::default());
        store.save(&Profile::default()).unwrap();

        let kept = fs::read_to_string(store.backup_path()).unwrap();
        assert!(kept.contains("\"Sam\""));
        match &recorder.events()[0].event_type {
            EventType::ProfileLoaded { reason: Some(reason), .. } => {
                assert!(reason.contains("memory.json.corrupt"), "{}", reason);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_loads_legacy_memory_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, recorder) = store_in(&dir);
        fs::write(
            store.path(),
            r#"{
  "user_info": {"name": "Sam", "interests": ["hiking", "jazz"], "age": 34},
  "core_attributes": {
    "location": "Austin, Texas",
    "timezone": null,
    "weather_preference": null,
    "daily_routine": null,
    "local_interests": null,
    "season_preference": null
  },
  "conversation_history": [
    {
      "timestamp": "2024-05-01T08:00:00.123456",
      "user_message": "User lives in Austin",
      "extracted_info": {"core_attributes": {"location": "Austin, Texas"}}
    }
  ],
  "topics_discussed": [],
  "questions_asked": ["Where are you writing from these days?"],
  "last_interaction": "2024-05-01T08:00:00.123456",
  "weather_context": {
    "last_checked": "2024-05-01T08:00:00.654321",
    "conditions": {
      "condition": "Clear",
      "description": "clear sky",
      "temp": 24.5,
      "feels_like": 24.1,
      "humidity": 40,
      "local_time": null
    }
  },
  "pending_question": null
}"#,
        )
        .unwrap();

        let profile = store.load();
        assert!(!recorder.events()[0].event_type.is_failure());
        assert_eq!(profile.location(), Some("Austin, Texas"));
        assert_eq!(profile.user_info["interests"], "hiking, jazz");
        assert_eq!(profile.user_info["age"], "34");
        assert!(profile
            .questions_asked
            .contains("Where are you writing from these days?"));
        assert_eq!(profile.conversation_history.len(), 1);
        assert_eq!(
            profile.conversation_history[0].user_message_summary,
            "User lives in Austin"
        );
        assert_eq!(
            profile.last_interaction,
            Some(profile.conversation_history[0].timestamp)
        );
        assert!(profile.weather_context.last_checked.is_some());
        assert_eq!(
            profile.weather_context.conditions.as_ref().map(|c| c.humidity),
            Some(40.0)
        );
        assert!(!store.backup_path().exists());

        // Saved back in the current shape and still readable
        store.save(&profile).unwrap();
        assert_eq!(store.load(), profile);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);

        let mut profile = Profile::default();
        profile.core_attributes.set(CoreKey::Location, "Austin, Texas");
        profile.user_info.insert("name".into(), "Sam".into());
        profile.mark_asked("What timezone are you in?");
        profile.topics_discussed.insert("weather");

        store.save(&profile).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new();
        let store = ProfileStore::new(dir.path().join("nested/state/memory.json"), bus);

        store.save(&Profile::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_sets_serialize_as_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);

        let mut profile = Profile::default();
        profile.questions_asked.insert("q1");
        profile.questions_asked.insert("q2");
        store.save(&profile).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["questions_asked"], serde_json::json!(["q1", "q2"]));
        assert_eq!(raw["topics_discussed"], serde_json::json!([]));
    }
}
