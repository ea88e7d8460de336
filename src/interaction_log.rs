//! Append-only record of every email in and out.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum LogRecord {
    Incoming {
        #[serde(deserialize_with = "crate::profile::lenient::timestamp")]
        timestamp: DateTime<Utc>,
        subject: String,
        email_text: String,
        #[serde(alias = "gpt_summary")]
        summary: String,
    },
    Outgoing {
        #[serde(deserialize_with = "crate::profile::lenient::timestamp")]
        timestamp: DateTime<Utc>,
        subject: String,
        message_body: String,
    },
}

impl LogRecord {
    pub fn incoming(subject: &str, email_text: &str, summary: &str) -> Self {
        LogRecord::Incoming {
            timestamp: Utc::now(),
            subject: subject.to_string(),
            email_text: email_text.to_string(),
            summary: summary.to_string(),
        }
    }

    pub fn outgoing(subject: &str, message_body: &str) -> Self {
        LogRecord::Outgoing {
            timestamp: Utc::now(),
            subject: subject.to_string(),
            message_body: message_body.to_string(),
        }
    }
}

/// Records already on disk are kept as raw JSON so older shapes survive
#[derive(Debug, Default, Serialize, Deserialize)]
struct LogDocument {
    #[serde(default)]
    messages: Vec<Value>,
}

pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, append, rewrite. A missing or corrupt file starts over.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let mut document = self.read();
        document.messages.push(serde_json::to_value(record)?);
        let content = serde_json::to_string_pretty(&document)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn read(&self) -> LogDocument {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Every record that parses as a known shape
    pub fn records(&self) -> Vec<LogRecord> {
        self.read()
            .messages
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }
}
