//! Log output: subscriber setup and the event bus bridge.

use crate::events::{Event, EventBus, EventType};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "messej=debug" } else { "messej=info" };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Forward every bus event to a tracing record
pub fn attach(bus: &EventBus) {
    bus.subscribe(|event| {
        let message = describe(event);
        let run_id = event.run_id.as_deref().unwrap_or("-");
        if event.event_type.is_failure() {
            tracing::warn!(target: "messej::events", run_id, subsystem = %event.subsystem, "{}", message);
        } else if matches!(event.event_type, EventType::ModelRequest { .. }) {
            tracing::debug!(target: "messej::events", run_id, subsystem = %event.subsystem, "{}", message);
        } else {
            tracing::info!(target: "messej::events", run_id, subsystem = %event.subsystem, "{}", message);
        }
    });
}

/// One-line human description of an event
pub fn describe(event: &Event) -> String {
    match &event.event_type {
        EventType::ProfileLoaded {
            path,
            fresh: true,
            reason: Some(reason),
            ..
        } => format!("starting with an empty profile, {} is {}", path, reason),
        EventType::ProfileLoaded {
            path, fresh: true, ..
        } => format!("no profile at {}, starting fresh", path),
        EventType::ProfileLoaded {
            path, interactions, ..
        } => format!("loaded profile from {} ({} interactions)", path, interactions),
        EventType::ProfileSaved {
            path,
            questions_asked,
        } => format!("saved profile to {} ({} questions asked)", path, questions_asked),
        EventType::QuestionSelected { topic, question } => {
            format!("asking about {}: {}", topic, question)
        }
        EventType::QuestionSkipped { reason } => format!("no question today: {}", reason),
        EventType::ExtractionApplied {
            core_updated,
            user_info_updated,
        } => format!(
            "learned core [{}] info [{}]",
            core_updated.join(", "),
            user_info_updated.join(", ")
        ),
        EventType::ExtractionFailed { error } => format!("could not extract facts: {}", error),
        EventType::WeatherRefreshed {
            location,
            condition,
        } => format!("weather in {}: {}", location, condition),
        EventType::WeatherUnavailable {
            location,
            error: Some(error),
        } => format!("weather lookup for {} failed: {}", location, error),
        EventType::WeatherUnavailable { location, .. } => {
            format!("no weather available for {}", location)
        }
        EventType::NewsFetched { count } => format!("fetched {} headlines", count),
        EventType::NewsFallback { reason } => format!("using placeholder news: {}", reason),
        EventType::EmailReceived { subject } => format!("processing email '{}'", subject),
        EventType::EmailSkipped { subject, error } => {
            format!("skipping email '{}': {}", subject, error)
        }
        EventType::DigestSent { subject, recipient } => {
            format!("sent '{}' to {}", subject, recipient)
        }
        EventType::ModelRequest {
            task,
            model,
            backend,
            duration_ms,
            success,
        } => format!(
            "{} via {}@{} {} in {}ms",
            task,
            model,
            backend,
            if *success { "succeeded" } else { "failed" },
            duration_ms
        ),
        EventType::DigestComposed {
            subject,
            question_included,
            news_count,
        } => format!(
            "composed '{}' with {} headlines{}",
            subject,
            news_count,
            if *question_included { " and a question" } else { "" }
        ),
        EventType::ContentDegraded { part, error } => {
            format!("{} unavailable, using placeholder: {}", part, error)
        }
        EventType::RunStarted { dry_run: true } => "run started (dry run)".to_string(),
        EventType::RunStarted { .. } => "run started".to_string(),
        EventType::RunCompleted {
            emails_processed,
            duration_ms,
        } => format!(
            "run completed: {} emails processed in {}ms",
            emails_processed, duration_ms
        ),
        EventType::RunFailed { error } => format!("run failed: {}", error),
    }
}
