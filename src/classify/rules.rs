//! Rule-based content scoring.
//!
//! Each category owns three weighted keyword tiers plus weighted regex
//! patterns. A context-adjustment table then shifts weight between
//! categories for known ambiguous co-occurrences. Used standalone when
//! no statistical model is available, and as the confirmation/override
//! check when statistical confidence is low.

use regex::Regex;
use std::collections::HashMap;

use crate::classify::types::ContentType;

/// Keyword tier weights.
const PRIMARY_WEIGHT: f32 = 1.0;
const SECONDARY_WEIGHT: f32 = 0.6;
const TERTIARY_WEIGHT: f32 = 0.3;

/// Score above which a category counts as significant for
/// mixed-content handling.
pub const SIGNIFICANCE_THRESHOLD: f32 = 0.5;

/// Keyword tiers and patterns for one category.
struct CategoryProfile {
    content_type: ContentType,
    primary: &'static [&'static str],
    secondary: &'static [&'static str],
    tertiary: &'static [&'static str],
    patterns: Vec<(Regex, f32)>,
}

/// Shifts weight from one category to another when a trigger word
/// co-occurs with context vocabulary.
struct ContextAdjustment {
    trigger: &'static str,
    context: &'static [&'static str],
    from: ContentType,
    to: ContentType,
    amount: f32,
}

/// Result of a rule evaluation.
#[derive(Debug, Clone)]
pub struct RuleEvaluation {
    /// Adjusted score per category (unscored categories at 0.0).
    pub scores: HashMap<ContentType, f32>,
    /// Highest-scoring category; `General` when nothing scored.
    pub top: ContentType,
    /// Categories above the significance threshold, highest first.
    pub significant: Vec<ContentType>,
}

/// The rule-based scorer.
pub struct RuleBasedScorer {
    profiles: Vec<CategoryProfile>,
    adjustments: Vec<ContextAdjustment>,
}

impl std::fmt::Debug for RuleBasedScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedScorer")
            .field("profiles", &self.profiles.len())
            .field("adjustments", &self.adjustments.len())
            .finish()
    }
}

impl Default for RuleBasedScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBasedScorer {
    /// Builds the scorer with the built-in vocabulary tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: build_profiles(),
            adjustments: build_adjustments(),
        }
    }

    /// Scores `text` against every category and resolves the top and
    /// significant categories.
    #[must_use]
    pub fn evaluate(&self, text: &str) -> RuleEvaluation {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| !s.is_empty())
            .collect();

        let mut scores: HashMap<ContentType, f32> = ContentType::ALL
            .iter()
            .map(|content_type| (*content_type, 0.0))
            .collect();

        for profile in &self.profiles {
            let mut score = 0.0;
            for keyword in profile.primary {
                if tokens.contains(keyword) {
                    score += PRIMARY_WEIGHT;
                }
            }
            for keyword in profile.secondary {
                if tokens.contains(keyword) {
                    score += SECONDARY_WEIGHT;
                }
            }
            for keyword in profile.tertiary {
                if tokens.contains(keyword) {
                    score += TERTIARY_WEIGHT;
                }
            }
            for (pattern, weight) in &profile.patterns {
                if pattern.is_match(&lower) {
                    score += weight;
                }
            }
            scores.insert(profile.content_type, score);
        }

        // Context adjustments for known ambiguous combinations.
        for adjustment in &self.adjustments {
            if tokens.contains(&adjustment.trigger)
                && adjustment.context.iter().any(|word| tokens.contains(word))
            {
                let from_score = scores[&adjustment.from];
                let moved = adjustment.amount.min(from_score);
                if moved > 0.0 {
                    *scores.get_mut(&adjustment.from).unwrap() -= moved;
                    *scores.get_mut(&adjustment.to).unwrap() += adjustment.amount;
                }
            }
        }

        let mut ranked: Vec<(ContentType, f32)> = scores
            .iter()
            .map(|(content_type, score)| (*content_type, *score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| rank_order(a.0).cmp(&rank_order(b.0)))
        });

        let top = if ranked[0].1 > 0.0 {
            ranked[0].0
        } else {
            ContentType::General
        };

        let significant: Vec<ContentType> = ranked
            .iter()
            .filter(|(_, score)| *score > SIGNIFICANCE_THRESHOLD)
            .map(|(content_type, _)| *content_type)
            .collect();

        RuleEvaluation {
            scores,
            top,
            significant,
        }
    }
}

/// Stable order for breaking exact score ties.
fn rank_order(content_type: ContentType) -> usize {
    ContentType::ALL
        .iter()
        .position(|c| *c == content_type)
        .unwrap_or(usize::MAX)
}

fn compile(pattern: &str) -> Regex {
    // Patterns are static literals; a failure here is a programming
    // error caught by the vocabulary tests.
    Regex::new(pattern).expect("invalid built-in classification pattern")
}

fn build_profiles() -> Vec<CategoryProfile> {
    vec![
        CategoryProfile {
            content_type: ContentType::Academic,
            primary: &[
                "research", "study", "academic", "thesis", "dissertation", "journal", "paper",
                "scholar",
            ],
            secondary: &[
                "university",
                "professor",
                "theory",
                "hypothesis",
                "experiment",
                "literature",
                "citation",
                "studies",
            ],
            tertiary: &["education", "college", "science", "scientific", "publication"],
            patterns: vec![
                (compile(r"\bpeer[- ]reviewed\b"), 1.0),
                (compile(r"\b(?:phd|doctoral)\b"), 0.8),
                (compile(r"\bmeta[- ]analysis\b"), 1.0),
                (compile(r"\bcase stud(?:y|ies)\b"), 0.6),
            ],
        },
        CategoryProfile {
            content_type: ContentType::News,
            primary: &[
                "news",
                "breaking",
                "headline",
                "headlines",
                "announcement",
                "announced",
            ],
            secondary: &[
                "latest",
                "today",
                "yesterday",
                "current",
                "recent",
                "update",
                "updates",
            ],
            tertiary: &["report", "coverage", "press", "media", "story"],
            patterns: vec![
                (compile(r"\bthis (?:week|month|morning)\b"), 0.6),
                (compile(r"\bjust (?:in|announced)\b"), 0.8),
                (compile(r"\b20\d{2}\b"), 0.3),
            ],
        },
        CategoryProfile {
            content_type: ContentType::Technical,
            primary: &[
                "api",
                "code",
                "programming",
                "software",
                "documentation",
                "debug",
                "sdk",
            ],
            secondary: &[
                "tutorial",
                "implementation",
                "framework",
                "library",
                "install",
                "installation",
                "configure",
                "configuration",
            ],
            tertiary: &["computer", "developer", "technology", "github", "server"],
            patterns: vec![
                (
                    compile(r"\bhow to (?:install|configure|implement|build|deploy)\b"),
                    0.8,
                ),
                (compile(r"\b(?:error|exception) (?:code|message)\b"), 0.8),
                (compile(r"\b(?:python|javascript|rust|java|typescript|sql)\b"), 0.7),
                (compile(r"\bv?\d+\.\d+(?:\.\d+)?\b"), 0.4),
            ],
        },
        CategoryProfile {
            content_type: ContentType::Business,
            primary: &[
                "business",
                "market",
                "company",
                "industry",
                "revenue",
                "startup",
                "investment",
            ],
            secondary: &[
                "strategy",
                "management",
                "finance",
                "financial",
                "profit",
                "sales",
                "customer",
            ],
            tertiary: &["corporate", "enterprise", "economy", "economic", "trade"],
            patterns: vec![
                (compile(r"\bmarket (?:share|analysis|size)\b"), 0.8),
                (compile(r"\b(?:q[1-4]|quarterly) (?:results|earnings)\b"), 0.8),
                (compile(r"\bstock price\b"), 0.7),
            ],
        },
        CategoryProfile {
            content_type: ContentType::WebContent,
            primary: &["website", "blog", "forum", "wiki", "online"],
            secondary: &["article", "post", "review", "reviews", "guide", "tips"],
            tertiary: &["internet", "web", "social", "community", "resources"],
            patterns: vec![
                (compile(r"\bbest .{1,30}\b(?:sites?|blogs?|forums?)\b"), 0.6),
                (compile(r"\btop \d+\b"), 0.5),
            ],
        },
        CategoryProfile {
            content_type: ContentType::General,
            primary: &[],
            secondary: &["information", "overview", "meaning", "definition"],
            tertiary: &["find", "tell", "explain", "help", "about"],
            patterns: vec![(compile(r"\bwhat (?:is|are)\b"), 0.3)],
        },
    ]
}

fn build_adjustments() -> Vec<ContextAdjustment> {
    vec![
        // "research" alongside commercial vocabulary is market research,
        // not scholarship.
        ContextAdjustment {
            trigger: "research",
            context: &["market", "company", "industry", "investment", "customer", "consumer"],
            from: ContentType::Academic,
            to: ContentType::Business,
            amount: 0.5,
        },
        // "latest"/"update" next to software vocabulary is a release
        // question, not a news query.
        ContextAdjustment {
            trigger: "latest",
            context: &["software", "api", "library", "framework", "version", "release", "sdk"],
            from: ContentType::News,
            to: ContentType::Technical,
            amount: 0.5,
        },
        ContextAdjustment {
            trigger: "update",
            context: &["software", "api", "library", "framework", "version", "release", "sdk"],
            from: ContentType::News,
            to: ContentType::Technical,
            amount: 0.5,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_academic_query() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("research paper on quantum computing");
        assert_eq!(eval.top, ContentType::Academic);
    }

    #[test]
    fn test_news_query() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("latest news about tech industry");
        assert_eq!(eval.top, ContentType::News);
    }

    #[test]
    fn test_technical_query() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("how to install the rust sdk");
        assert_eq!(eval.top, ContentType::Technical);
    }

    #[test]
    fn test_empty_text_is_general() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("");
        assert_eq!(eval.top, ContentType::General);
        assert!(eval.significant.is_empty());
    }

    #[test]
    fn test_market_research_shifts_to_business() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("market research on consumer behavior");
        assert_eq!(eval.top, ContentType::Business);
    }

    #[test]
    fn test_software_update_shifts_to_technical() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("latest version release of the framework");
        assert_eq!(eval.top, ContentType::Technical);
    }

    #[test]
    fn test_mixed_content_lists_significant() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("research paper about market share and industry revenue");
        assert!(eval.significant.len() > 1);
        // Top category is the highest-scoring significant one.
        assert_eq!(eval.top, eval.significant[0]);
    }

    #[test]
    fn test_scores_cover_all_categories() {
        let scorer = RuleBasedScorer::new();
        let eval = scorer.evaluate("anything");
        assert_eq!(eval.scores.len(), ContentType::ALL.len());
    }
}
