//! Language model seam.
//!
//! Everything that needs generated text goes through [`TextModel`]. The
//! production implementation (`vendors::ModelClient`) routes each task to a
//! backend; tests plug in scripted fakes.

use crate::model_routing::Task;
use anyhow::Result;

pub trait TextModel {
    /// Run a single prompt for the given task and return the reply text
    fn complete(&self, task: Task, prompt: &str) -> Result<String>;
}

/// Strip a surrounding Markdown code fence from a model reply, if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
