//! One digest run, from inbox to outbox.
//!
//! Per-email failures skip that email and content failures degrade to a
//! placeholder. Listing mail, the inline reply, composing and sending abort
//! the run, and the profile is only saved after a successful send.

use crate::collaborators::{InboundEmail, MailInbox, MailOutbox, NewsSource, OutboundEmail, WeatherSource};
use crate::composer::{Digest, DigestComposer, TimeOfDay};
use crate::events::{Event, EventBus};
use crate::extractor::FactExtractor;
use crate::interaction_log::{InteractionLog, LogRecord};
use crate::llm::TextModel;
use crate::model_routing::Task;
use crate::persona;
use crate::profile::{Profile, ProfileStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

pub const NO_FACT: &str = "(No fact today.)";
pub const NO_GOSSIP: &str = "(No story today.)";

/// The external services one run talks to
pub struct Collaborators<'a> {
    pub model: &'a dyn TextModel,
    pub inbox: &'a mut dyn MailInbox,
    pub outbox: &'a dyn MailOutbox,
    pub news: &'a dyn NewsSource,
    pub weather: &'a dyn WeatherSource,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub subject_filter: String,
    pub recipient: String,
    pub country: String,
    pub page_size: usize,
    /// Compose and return the digest without sending or persisting anything
    pub dry_run: bool,
    /// Fixed time-of-day bucket instead of the wall clock
    pub time_of_day: Option<TimeOfDay>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub emails_processed: usize,
    pub emails_skipped: usize,
    pub digest: Digest,
    pub sent: bool,
}

pub struct Runner<'a> {
    services: Collaborators<'a>,
    store: ProfileStore,
    log: InteractionLog,
    options: RunOptions,
    bus: Arc<EventBus>,
}

impl<'a> Runner<'a> {
    pub fn new(
        services: Collaborators<'a>,
        store: ProfileStore,
        log: InteractionLog,
        options: RunOptions,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            services,
            store,
            log,
            options,
            bus,
        }
    }

    pub fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        self.bus.emit(Event::run_started(self.options.dry_run));

        match self.run_steps() {
            Ok(report) => {
                self.bus.emit(Event::run_completed(
                    report.emails_processed,
                    start.elapsed().as_millis() as u64,
                ));
                Ok(report)
            }
            Err(e) => {
                self.bus.emit(Event::run_failed(&format!("{:#}", e)));
                Err(e)
            }
        }
    }

    fn run_steps(&mut self) -> Result<RunReport> {
        let mut profile = self.store.load();

        let emails = self
            .services
            .inbox
            .list_unread(&self.options.subject_filter)
            .context("Failed to list unread mail")?;

        let mut summaries = Vec::new();
        let mut skipped = 0;
        for email in &emails {
            match self.process_email(&mut profile, email) {
                Some(summary) => summaries.push(summary),
                None => skipped += 1,
            }
        }

        let inline_reply = self.inline_reply(&summaries)?;
        let news = self
            .services
            .news
            .top_headlines(&self.options.country, self.options.page_size);
        let fact = self.generate_or(Task::Fact, &persona::fact_prompt(&news), "fact", NO_FACT);
        let gossip = self.generate_or(
            Task::Gossip,
            &persona::gossip_prompt(&news),
            "gossip",
            NO_GOSSIP,
        );

        // A dry run composes against a scratch copy so nothing is marked asked
        let mut scratch;
        let target = if self.options.dry_run {
            scratch = profile.clone();
            &mut scratch
        } else {
            &mut profile
        };
        let composer = DigestComposer::new(self.services.model, Arc::clone(&self.bus));
        let time_of_day = self.options.time_of_day.unwrap_or_else(TimeOfDay::now);
        let digest = composer
            .compose_at(target, &news, &fact, &gossip, &inline_reply, time_of_day)
            .context("Failed to compose digest")?;

        if self.options.dry_run {
            return Ok(RunReport {
                emails_processed: summaries.len(),
                emails_skipped: skipped,
                digest,
                sent: false,
            });
        }

        let outbound = OutboundEmail {
            subject: digest.subject.clone(),
            body: digest.body.clone(),
            recipient: self.options.recipient.clone(),
        };
        self.services
            .outbox
            .send(&outbound)
            .context("Failed to send digest")?;
        self.bus
            .emit(Event::digest_sent(&outbound.subject, &outbound.recipient));

        self.record(&LogRecord::outgoing(&digest.subject, &digest.body));
        self.store.save(&profile)?;

        Ok(RunReport {
            emails_processed: summaries.len(),
            emails_skipped: skipped,
            digest,
            sent: true,
        })
    }

    /// Summarize and learn from one email; `None` when it had to be skipped
    fn process_email(&self, profile: &mut Profile, email: &InboundEmail) -> Option<String> {
        self.bus.emit(Event::email_received(&email.subject));

        let summary = match self
            .services
            .model
            .complete(Task::Summarize, &persona::summarize_prompt(&email.body))
        {
            Ok(summary) => summary,
            Err(e) => {
                self.bus
                    .emit(Event::email_skipped(&email.subject, &format!("{:#}", e)));
                return None;
            }
        };

        let extractor = FactExtractor::new(
            self.services.model,
            self.services.weather,
            Arc::clone(&self.bus),
        );
        extractor.extract(profile, &email.body, &summary);

        if !self.options.dry_run {
            self.record(&LogRecord::incoming(&email.subject, &email.body, &summary));
        }
        Some(summary)
    }

    fn inline_reply(&self, summaries: &[String]) -> Result<String> {
        if summaries.is_empty() {
            return Ok(persona::NO_EMAIL_REPLY.to_string());
        }
        self.services
            .model
            .complete(Task::Reply, &persona::reply_prompt(summaries))
            .context("Failed to generate inline reply")
    }

    fn generate_or(&self, task: Task, prompt: &str, part: &str, placeholder: &str) -> String {
        match self.services.model.complete(task, prompt) {
            Ok(text) => text,
            Err(e) => {
                self.bus
                    .emit(Event::content_degraded(part, &format!("{:#}", e)));
                placeholder.to_string()
            }
        }
    }

    fn record(&self, record: &LogRecord) {
        if let Err(e) = self.log.append(record) {
            tracing::warn!(path = %self.log.path().display(), error = %e, "interaction log not updated");
        }
    }
}
