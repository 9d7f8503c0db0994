//! Built-in rewrite template table.
//!
//! Templates turn conversational phrasings into retrieval-friendly
//! keyword forms, specialized by content type. Higher priority wins on
//! overlapping patterns.

use crate::classify::ContentType;
use crate::rewrite::types::RewriteTemplate;

use ContentType::{Academic, Business, General, News, Technical, WebContent};

/// The default template table, ordered by descending priority.
#[must_use]
pub fn default_templates() -> Vec<RewriteTemplate> {
    let mut templates = vec![
        RewriteTemplate::new(
            r"(?i)^tell me about\s+(.+?)\s*$",
            "$1 tutorial",
            &[Technical],
            5,
            "converted request phrasing to technical keyword form",
        ),
        RewriteTemplate::new(
            r"(?i)^how (?:do i|to)\s+(.+?)\??\s*$",
            "$1 step by step guide",
            &[Technical, WebContent],
            5,
            "converted how-to question to guide form",
        ),
        RewriteTemplate::new(
            r"(?i)^research (?:on|about)\s+(.+?)\s*$",
            "$1 research papers",
            &[Academic],
            5,
            "targeted published research directly",
        ),
        RewriteTemplate::new(
            r"(?i)^tell me about\s+(.+?)\s*$",
            "$1 explained",
            &[General, WebContent, Academic, News, Business],
            4,
            "converted request phrasing to keyword form",
        ),
        RewriteTemplate::new(
            r"(?i)^what (?:is|are)\s+(.+?)\??\s*$",
            "$1 definition",
            &[General, WebContent, Technical],
            4,
            "converted definition question to keyword form",
        ),
        RewriteTemplate::new(
            r"(?i)^(.+?)\s+research\s*$",
            "academic studies on $1",
            &[Academic],
            4,
            "reframed toward academic sources",
        ),
        RewriteTemplate::new(
            r"(?i)^latest\s+(.+?)\s*$",
            "$1 recent developments",
            &[News],
            4,
            "rephrased recency for news retrieval",
        ),
        RewriteTemplate::new(
            r"(?i)^(.+?)\s+market\s*$",
            "$1 market analysis",
            &[Business],
            4,
            "focused on market analysis sources",
        ),
        RewriteTemplate::new(
            r"(?i)^best\s+(.+?)\s*$",
            "top rated $1",
            &[WebContent, General],
            3,
            "rephrased superlative for review content",
        ),
    ];

    // Descending priority: first acceptable template earns the highest
    // confidence base.
    templates.sort_by(|a, b| b.priority().cmp(&a.priority()));
    templates
}

/// Expansion term lists per content type.
///
/// Content types without a list (general) are not expanded.
#[must_use]
pub fn expansion_terms(content_type: ContentType) -> &'static [&'static str] {
    match content_type {
        Academic => &["research", "study", "analysis"],
        Technical => &["documentation", "tutorial", "guide"],
        Business => &["market", "industry", "strategy"],
        News => &["latest", "breaking", "updates"],
        WebContent => &["online", "guide", "resources"],
        General => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_sorted_by_priority() {
        let templates = default_templates();
        for window in templates.windows(2) {
            assert!(window[0].priority() >= window[1].priority());
        }
    }

    #[test]
    fn test_technical_tell_me_about() {
        let templates = default_templates();
        let applicable: Vec<_> = templates
            .iter()
            .filter(|t| t.applies_to(Technical))
            .collect();
        let rewritten = applicable
            .iter()
            .find_map(|t| t.apply("tell me about API documentation"))
            .unwrap();
        assert_eq!(rewritten, "API documentation tutorial");
    }

    #[test]
    fn test_general_has_no_expansion_terms() {
        assert!(expansion_terms(General).is_empty());
        assert_eq!(expansion_terms(Academic).len(), 3);
    }
}
