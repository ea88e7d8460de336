//! Model routing for the language tasks of a digest run.
//!
//! Each task gets a target (model@backend) plus sampling settings.
//! Hardcoded defaults can be overridden per task from the `[routing]`
//! config section.

use crate::config::Target;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Language tasks performed during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Summarize,
    Extract,
    Reply,
    Fact,
    Gossip,
    Compose,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::Summarize,
        Task::Extract,
        Task::Reply,
        Task::Fact,
        Task::Gossip,
        Task::Compose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Summarize => "summarize",
            Task::Extract => "extract",
            Task::Reply => "reply",
            Task::Fact => "fact",
            Task::Gossip => "gossip",
            Task::Compose => "compose",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Task::ALL.into_iter().find(|t| t.as_str() == s.to_lowercase())
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where and how a task is run
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub target: Target,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Hardcoded defaults: (target, temperature, max_tokens)
fn default_route(task: Task) -> (&'static str, f32, Option<u32>) {
    match task {
        // Bookkeeping tasks stay on the cheap model
        Task::Summarize | Task::Extract | Task::Reply => ("gpt-3.5-turbo@chatgpt", 0.7, None),
        // Creative snippets run hotter
        Task::Fact | Task::Gossip => ("gpt-3.5-turbo@chatgpt", 0.9, None),
        Task::Compose => ("gpt-4o-mini-2024-07-18@chatgpt", 0.8, Some(1500)),
    }
}

/// Model router that resolves targets per task
#[derive(Debug, Clone)]
pub struct ModelRouter {
    routes: HashMap<Task, Route>,
}

impl ModelRouter {
    /// Build the routing table from config overrides (task name -> target).
    ///
    /// Unknown task names and unparsable targets are configuration errors.
    pub fn new(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut routes = HashMap::new();
        for task in Task::ALL {
            let (target, temperature, max_tokens) = default_route(task);
            let target = Target::parse(target)
                .ok_or_else(|| anyhow!("Invalid default target for {}", task))?;
            routes.insert(
                task,
                Route {
                    target,
                    temperature,
                    max_tokens,
                },
            );
        }

        for (name, target_str) in overrides {
            let task = Task::parse(name)
                .ok_or_else(|| anyhow!("Unknown routing task '{}'", name))?;
            let target = Target::parse(target_str).ok_or_else(|| {
                anyhow!(
                    "Invalid target '{}' for task '{}' (expected model@backend)",
                    target_str,
                    name
                )
            })?;
            if let Some(route) = routes.get_mut(&task) {
                route.target = target;
            }
        }

        Ok(Self { routes })
    }

    /// Route for a task. `new` fills every entry of `Task::ALL`.
    pub fn resolve(&self, task: Task) -> Route {
        self.routes[&task].clone()
    }

    /// Backends referenced by any route
    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .routes
            .values()
            .map(|r| r.target.backend.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_parse() {
        assert_eq!(Task::parse("compose"), Some(Task::Compose));
        assert_eq!(Task::parse("Gossip"), Some(Task::Gossip));
        assert_eq!(Task::parse("translate"), None);
    }

    #[test]
    fn test_defaults() {
        let router = ModelRouter::new(&HashMap::new()).unwrap();

        let compose = router.resolve(Task::Compose);
        assert_eq!(compose.target.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(compose.target.backend, "chatgpt");
        assert_eq!(compose.max_tokens, Some(1500));

        let fact = router.resolve(Task::Fact);
        assert_eq!(fact.target.model, "gpt-3.5-turbo");
        assert!((fact.temperature - 0.9).abs() < f32::EPSILON);

        assert_eq!(router.backends(), vec!["chatgpt".to_string()]);
    }

    #[test]
    fn test_every_task_has_a_route() {
        let router = ModelRouter::new(&HashMap::new()).unwrap();
        for task in Task::ALL {
            let (target, _, _) = default_route(task);
            assert_eq!(router.resolve(task).target, Target::parse(target).unwrap());
        }
    }

    #[test]
    fn test_override_keeps_sampling() {
        let mut overrides = HashMap::new();
        overrides.insert("compose".to_string(), "claude-3-5-sonnet-latest@claude".to_string());
        let router = ModelRouter::new(&overrides).unwrap();

        let compose = router.resolve(Task::Compose);
        assert_eq!(compose.target.backend, "claude");
        assert_eq!(compose.max_tokens, Some(1500));
        assert_eq!(router.backends(), vec!["chatgpt".to_string(), "claude".to_string()]);
    }

    #[test]
    fn test_bad_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("translate".to_string(), "gpt-4@chatgpt".to_string());
        assert!(ModelRouter::new(&overrides).is_err());

        let mut overrides = HashMap::new();
        overrides.insert("fact".to_string(), "no-backend".to_string());
        assert!(ModelRouter::new(&overrides).is_err());
    }
}
