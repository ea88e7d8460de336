//! Structured events emitted by the digest pipeline.
//!
//! Core modules never log directly. They emit typed events on an
//! [`EventBus`]; observers attached by the binary turn them into log
//! records and metrics.
//!
//! ## Event Categories
//!
//! - **Profile**: profile store load/save
//! - **Planner**: question selection
//! - **Extraction**: facts merged from a reply
//! - **Weather** / **News**: collaborator outcomes that degrade gracefully
//! - **Mail**: inbound and outbound messages
//! - **Model**: language model calls
//! - **Digest**: composition
//! - **Run**: invocation lifecycle
//!
//! ## Usage
//!
//! ```ignore
//! use messej::events::{Event, EventBus};
//!
//! let bus = EventBus::for_run("run-1");
//! bus.subscribe(|event| {
//!     println!("[{}] {}", event.subsystem, event.event_type.kind());
//! });
//! bus.emit(Event::news_fetched(5));
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonically increasing sequence counter for event ordering
static EVENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    EVENT_SEQUENCE.fetch_add(1, Ordering::SeqCst)
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Subsystem identifiers for event categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Profile,
    Planner,
    Extraction,
    Weather,
    News,
    Mail,
    Model,
    Digest,
    Run,
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Subsystem::Profile => "profile",
            Subsystem::Planner => "planner",
            Subsystem::Extraction => "extraction",
            Subsystem::Weather => "weather",
            Subsystem::News => "news",
            Subsystem::Mail => "mail",
            Subsystem::Model => "model",
            Subsystem::Digest => "digest",
            Subsystem::Run => "run",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    // Profile events
    ProfileLoaded {
        path: String,
        fresh: bool,
        reason: Option<String>,
        interactions: usize,
    },
    ProfileSaved {
        path: String,
        questions_asked: usize,
    },

    // Planner events
    QuestionSelected {
        topic: String,
        question: String,
    },
    QuestionSkipped {
        reason: String,
    },

    // Extraction events
    ExtractionApplied {
        core_updated: Vec<String>,
        user_info_updated: Vec<String>,
    },
    ExtractionFailed {
        error: String,
    },

    // Weather events
    WeatherRefreshed {
        location: String,
        condition: String,
    },
    WeatherUnavailable {
        location: String,
        error: Option<String>,
    },

    // News events
    NewsFetched {
        count: usize,
    },
    NewsFallback {
        reason: String,
    },

    // Mail events
    EmailReceived {
        subject: String,
    },
    EmailSkipped {
        subject: String,
        error: String,
    },
    DigestSent {
        subject: String,
        recipient: String,
    },

    // Model events
    ModelRequest {
        task: String,
        model: String,
        backend: String,
        duration_ms: u64,
        success: bool,
    },

    // Digest events
    DigestComposed {
        subject: String,
        question_included: bool,
        news_count: usize,
    },
    ContentDegraded {
        part: String,
        error: String,
    },

    // Run events
    RunStarted {
        dry_run: bool,
    },
    RunCompleted {
        emails_processed: usize,
        duration_ms: u64,
    },
    RunFailed {
        error: String,
    },
}

impl EventType {
    /// Short snake_case name of the variant, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            EventType::ProfileLoaded { .. } => "profile_loaded",
            EventType::ProfileSaved { .. } => "profile_saved",
            EventType::QuestionSelected { .. } => "question_selected",
            EventType::QuestionSkipped { .. } => "question_skipped",
            EventType::ExtractionApplied { .. } => "extraction_applied",
            EventType::ExtractionFailed { .. } => "extraction_failed",
            EventType::WeatherRefreshed { .. } => "weather_refreshed",
            EventType::WeatherUnavailable { .. } => "weather_unavailable",
            EventType::NewsFetched { .. } => "news_fetched",
            EventType::NewsFallback { .. } => "news_fallback",
            EventType::EmailReceived { .. } => "email_received",
            EventType::EmailSkipped { .. } => "email_skipped",
            EventType::DigestSent { .. } => "digest_sent",
            EventType::ModelRequest { .. } => "model_request",
            EventType::DigestComposed { .. } => "digest_composed",
            EventType::ContentDegraded { .. } => "content_degraded",
            EventType::RunStarted { .. } => "run_started",
            EventType::RunCompleted { .. } => "run_completed",
            EventType::RunFailed { .. } => "run_failed",
        }
    }

    /// Whether the event reports something that went wrong
    pub fn is_failure(&self) -> bool {
        match self {
            EventType::ProfileLoaded { reason, fresh, .. } => *fresh && reason.is_some(),
            EventType::ModelRequest { success, .. } => !success,
            EventType::ExtractionFailed { .. }
            | EventType::WeatherUnavailable { error: Some(_), .. }
            | EventType::NewsFallback { .. }
            | EventType::EmailSkipped { .. }
            | EventType::ContentDegraded { .. }
            | EventType::RunFailed { .. } => true,
            _ => false,
        }
    }
}

/// A single event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number for ordering
    pub seq: u64,
    /// Timestamp in milliseconds since epoch
    pub timestamp_ms: u64,
    pub subsystem: Subsystem,
    #[serde(flatten)]
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Event {
    pub fn new(subsystem: Subsystem, event_type: EventType) -> Self {
        Self {
            seq: next_sequence(),
            timestamp_ms: timestamp_ms(),
            subsystem,
            event_type,
            run_id: None,
        }
    }

    // Convenience constructors for common events

    pub fn profile_loaded(path: &str, fresh: bool, reason: Option<&str>, interactions: usize) -> Self {
        Self::new(
            Subsystem::Profile,
            EventType::ProfileLoaded {
                path: path.to_string(),
                fresh,
                reason: reason.map(String::from),
                interactions,
            },
        )
    }

    pub fn profile_saved(path: &str, questions_asked: usize) -> Self {
        Self::new(
            Subsystem::Profile,
            EventType::ProfileSaved {
                path: path.to_string(),
                questions_asked,
            },
        )
    }

    pub fn question_selected(topic: &str, question: &str) -> Self {
        Self::new(
            Subsystem::Planner,
            EventType::QuestionSelected {
                topic: topic.to_string(),
                question: question.to_string(),
            },
        )
    }

    pub fn question_skipped(reason: &str) -> Self {
        Self::new(
            Subsystem::Planner,
            EventType::QuestionSkipped {
                reason: reason.to_string(),
            },
        )
    }

    pub fn extraction_applied(core_updated: Vec<String>, user_info_updated: Vec<String>) -> Self {
        Self::new(
            Subsystem::Extraction,
            EventType::ExtractionApplied {
                core_updated,
                user_info_updated,
            },
        )
    }

    pub fn extraction_failed(error: &str) -> Self {
        Self::new(
            Subsystem::Extraction,
            EventType::ExtractionFailed {
                error: error.to_string(),
            },
        )
    }

    pub fn weather_refreshed(location: &str, condition: &str) -> Self {
        Self::new(
            Subsystem::Weather,
            EventType::WeatherRefreshed {
                location: location.to_string(),
                condition: condition.to_string(),
            },
        )
    }

    pub fn weather_unavailable(location: &str, error: Option<&str>) -> Self {
        Self::new(
            Subsystem::Weather,
            EventType::WeatherUnavailable {
                location: location.to_string(),
                error: error.map(String::from),
            },
        )
    }

    pub fn news_fetched(count: usize) -> Self {
        Self::new(Subsystem::News, EventType::NewsFetched { count })
    }

    pub fn news_fallback(reason: &str) -> Self {
        Self::new(
            Subsystem::News,
            EventType::NewsFallback {
                reason: reason.to_string(),
            },
        )
    }

    pub fn email_received(subject: &str) -> Self {
        Self::new(
            Subsystem::Mail,
            EventType::EmailReceived {
                subject: subject.to_string(),
            },
        )
    }

    pub fn email_skipped(subject: &str, error: &str) -> Self {
        Self::new(
            Subsystem::Mail,
            EventType::EmailSkipped {
                subject: subject.to_string(),
                error: error.to_string(),
            },
        )
    }

    pub fn digest_sent(subject: &str, recipient: &str) -> Self {
        Self::new(
            Subsystem::Mail,
            EventType::DigestSent {
                subject: subject.to_string(),
                recipient: recipient.to_string(),
            },
        )
    }

    pub fn model_request(
        task: &str,
        model: &str,
        backend: &str,
        duration_ms: u64,
        success: bool,
    ) -> Self {
        Self::new(
            Subsystem::Model,
            EventType::ModelRequest {
                task: task.to_string(),
                model: model.to_string(),
                backend: backend.to_string(),
                duration_ms,
                success,
            },
        )
    }

    pub fn digest_composed(subject: &str, question_included: bool, news_count: usize) -> Self {
        Self::new(
            Subsystem::Digest,
            EventType::DigestComposed {
                subject: subject.to_string(),
                question_included,
                news_count,
            },
        )
    }

    pub fn content_degraded(part: &str, error: &str) -> Self {
        Self::new(
            Subsystem::Digest,
            EventType::ContentDegraded {
                part: part.to_string(),
                error: error.to_string(),
            },
        )
    }

    pub fn run_started(dry_run: bool) -> Self {
        Self::new(Subsystem::Run, EventType::RunStarted { dry_run })
    }

    pub fn run_completed(emails_processed: usize, duration_ms: u64) -> Self {
        Self::new(
            Subsystem::Run,
            EventType::RunCompleted {
                emails_processed,
                duration_ms,
            },
        )
    }

    pub fn run_failed(error: &str) -> Self {
        Self::new(
            Subsystem::Run,
            EventType::RunFailed {
                error: error.to_string(),
            },
        )
    }
}

/// Event listener callback type
pub type EventListener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Synchronous pub/sub event distribution.
///
/// Listeners run on the emitting thread in subscription order. A panicking
/// listener is isolated and does not stop delivery to the others.
pub struct EventBus {
    run_id: Option<String>,
    listeners: RwLock<Vec<EventListener>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bus that stamps every event with the given run id
    pub fn for_run(run_id: &str) -> Arc<Self> {
        Arc::new(Self {
            run_id: Some(run_id.to_string()),
            ..Self::default()
        })
    }

    /// Subscribe to all events
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.len();
        listeners.push(Arc::new(listener));
        id
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, mut event: Event) {
        if event.run_id.is_none() {
            event.run_id = self.run_id.clone();
        }

        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(&event);
            }));
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            run_id: None,
            listeners: RwLock::new(Vec::new()),
        }
    }
}

/// Listener that records every event.
///
/// A test helper: the crate's own tests and downstream integration tests
/// use it to assert on what a component emitted. Production code attaches
/// the logging and metrics observers instead.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<RwLock<Vec<Event>>>,
}

impl EventRecorder {
    /// Create a recorder subscribed to the given bus
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        let sink = Arc::clone(&recorder.events);
        bus.subscribe(move |event| {
            sink.write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        });
        recorder
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.event_type.kind()).collect()
    }
}
