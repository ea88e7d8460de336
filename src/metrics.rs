//! Run metrics in Prometheus text format.
//!
//! The collector subscribes to the event bus and keeps:
//! - Event counts by subsystem/kind/outcome
//! - Model request counts by task/backend/status
//! - Model latency histograms

use crate::events::{Event, EventBus, EventType};
use anyhow::{Context, Result};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::fs;
use std::path::Path;

const SUBSYSTEM_LABEL: &str = "subsystem";
const KIND_LABEL: &str = "kind";
const OUTCOME_LABEL: &str = "outcome";
const TASK_LABEL: &str = "task";
const BACKEND_LABEL: &str = "backend";
const STATUS_LABEL: &str = "status";

#[derive(Clone)]
pub struct MetricsCollector {
    registry: Registry,

    /// Every event seen on the bus
    events_total: CounterVec,

    /// Model calls by task, backend, status
    model_requests_total: CounterVec,

    /// Model call duration in milliseconds
    model_duration_ms: HistogramVec,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_total = CounterVec::new(
            Opts::new("messej_events_total", "Pipeline events"),
            &[SUBSYSTEM_LABEL, KIND_LABEL, OUTCOME_LABEL],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let model_requests_total = CounterVec::new(
            Opts::new("messej_model_requests_total", "Language model requests"),
            &[TASK_LABEL, BACKEND_LABEL, STATUS_LABEL],
        )?;
        registry.register(Box::new(model_requests_total.clone()))?;

        let duration_opts = HistogramOpts::new(
            "messej_model_duration_ms",
            "Language model request duration in milliseconds",
        )
        .buckets(vec![
            100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
        ]);
        let model_duration_ms = HistogramVec::new(duration_opts, &[TASK_LABEL, BACKEND_LABEL])?;
        registry.register(Box::new(model_duration_ms.clone()))?;

        Ok(Self {
            registry,
            events_total,
            model_requests_total,
            model_duration_ms,
        })
    }

    /// Subscribe to every event on the bus
    pub fn attach(&self, bus: &EventBus) {
        let collector = self.clone();
        bus.subscribe(move |event| collector.record(event));
    }

    pub fn record(&self, event: &Event) {
        let outcome = if event.event_type.is_failure() {
            "failure"
        } else {
            "ok"
        };
        let subsystem = event.subsystem.to_string();
        self.events_total
            .with_label_values(&[subsystem.as_str(), event.event_type.kind(), outcome])
            .inc();

        if let EventType::ModelRequest {
            task,
            backend,
            duration_ms,
            success,
            ..
        } = &event.event_type
        {
            let status = if *success { "success" } else { "failure" };
            self.model_requests_total
                .with_label_values(&[task.as_str(), backend.as_str(), status])
                .inc();
            self.model_duration_ms
                .with_label_values(&[task.as_str(), backend.as_str()])
                .observe(*duration_ms as f64);
        }
    }

    /// Text exposition of everything collected so far
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render()?)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))
    }
}
