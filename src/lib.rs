//! Messej: a daily digest email assistant.
//!
//! Each run reads unread replies, learns about the user from them, and
//! sends one personalized email with news, a related fact, a bit of gossip
//! and, when there is something left to learn, one question.

pub mod collaborators;
pub mod composer;
pub mod config;
pub mod events;
pub mod extractor;
pub mod interaction_log;
pub mod llm;
pub mod logging;
pub mod mail;
pub mod metrics;
pub mod model_routing;
pub mod news;
pub mod ordered_set;
pub mod persona;
pub mod planner;
pub mod profile;
pub mod runner;
pub mod vendors;
pub mod weather;
