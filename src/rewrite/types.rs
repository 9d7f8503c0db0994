//! Rewriting result and template types.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::ContentType;

/// Which strategy produced a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteMethod {
    Template,
    Similarity,
    Expansion,
}

impl RewriteMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteMethod::Template => "template",
            RewriteMethod::Similarity => "similarity",
            RewriteMethod::Expansion => "expansion",
        }
    }
}

/// One proposed alternative phrasing of a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub original_query: String,
    pub rewritten_query: String,
    pub method: RewriteMethod,
    pub confidence: f32,
    pub change_description: String,
}

impl RewriteResult {
    /// Builds a result with confidence clamped to `[0, 1]`.
    #[must_use]
    pub fn new(
        original_query: String,
        rewritten_query: String,
        method: RewriteMethod,
        confidence: f32,
        change_description: String,
    ) -> Self {
        Self {
            original_query,
            rewritten_query,
            method,
            confidence: confidence.clamp(0.0, 1.0),
            change_description,
        }
    }
}

/// A prioritized rewrite pattern.
///
/// Applies when its pattern matches case-insensitively and the
/// replacement produces an actual textual change. Higher priority
/// templates are evaluated first and earn a higher confidence base.
pub struct RewriteTemplate {
    pattern: Regex,
    replacement: &'static str,
    content_types: &'static [ContentType],
    priority: u8,
    description: &'static str,
}

impl std::fmt::Debug for RewriteTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteTemplate")
            .field("pattern", &self.pattern.as_str())
            .field("priority", &self.priority)
            .finish()
    }
}

impl RewriteTemplate {
    #[must_use]
    pub fn new(
        pattern: &str,
        replacement: &'static str,
        content_types: &'static [ContentType],
        priority: u8,
        description: &'static str,
    ) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("invalid built-in rewrite template"),
            replacement,
            content_types,
            priority,
            description,
        }
    }

    /// Whether this template targets the given content type.
    #[must_use]
    pub fn applies_to(&self, content_type: ContentType) -> bool {
        self.content_types.contains(&content_type)
    }

    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Applies the template, returning the rewrite only when it
    /// actually changes the text.
    #[must_use]
    pub fn apply(&self, query: &str) -> Option<String> {
        if !self.pattern.is_match(query) {
            return None;
        }
        let rewritten = self.pattern.replace(query, self.replacement).into_owned();
        let rewritten = rewritten.trim().to_string();
        if rewritten.is_empty() || rewritten.eq_ignore_ascii_case(query.trim()) {
            return None;
        }
        Some(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_applies_case_insensitively() {
        let template = RewriteTemplate::new(
            r"(?i)^tell me about\s+(.+)$",
            "$1 tutorial",
            &[ContentType::Technical],
            5,
            "converted request phrasing to keyword form",
        );
        let rewritten = template.apply("Tell me about API documentation").unwrap();
        assert_eq!(rewritten, "API documentation tutorial");
    }

    #[test]
    fn test_template_requires_textual_change() {
        let template = RewriteTemplate::new(
            r"(?i)^(.+)$",
            "$1",
            &[ContentType::General],
            1,
            "identity",
        );
        assert!(template.apply("unchanged query").is_none());
    }

    #[test]
    fn test_template_no_match_is_none() {
        let template = RewriteTemplate::new(
            r"(?i)^what is\s+(.+)$",
            "$1 definition",
            &[ContentType::General],
            4,
            "question to keyword form",
        );
        assert!(template.apply("compare electric cars").is_none());
    }

    #[test]
    fn test_confidence_clamped() {
        let result = RewriteResult::new(
            "a".to_string(),
            "b".to_string(),
            RewriteMethod::Template,
            1.2,
            "test".to_string(),
        );
        assert_eq!(result.confidence, 1.0);
    }
}
