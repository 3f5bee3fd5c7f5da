// crates/hopchain-routing/src/templates.rs
//
// Token-overlap template matching. A bag-of-tokens heuristic for small,
// curated registries; not semantic search.

use std::collections::HashSet;

use serde::Serialize;

use hopchain_core::template::Template;

/// Minimum score a template needs to be suggested.
pub const DEFAULT_MIN_SCORE: u32 = 10;

/// Lowercase, turn everything outside `[a-z0-9]` and whitespace into a space,
/// split on whitespace, and drop tokens of two characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Similarity of `query` to a template, in 0..=100.
///
/// Each query token scores 1.0 on an exact match with a template token,
/// otherwise 0.5 if it contains or is contained in some template token.
/// The sum is divided by the size of the union of both token sets.
pub fn calculate_similarity(query: &str, template: &Template) -> u32 {
    let query_tokens = tokenize(query);
    let target_tokens: HashSet<String> = tokenize(&template.match_text()).into_iter().collect();

    let union: HashSet<&str> = query_tokens
        .iter()
        .map(String::as_str)
        .chain(target_tokens.iter().map(String::as_str))
        .collect();
    if union.is_empty() {
        return 0;
    }

    let mut matches = 0.0_f64;
    for token in &query_tokens {
        if target_tokens.contains(token) {
            matches += 1.0;
        } else if target_tokens
            .iter()
            .any(|t| t.contains(token.as_str()) || token.contains(t.as_str()))
        {
            matches += 0.5;
        }
    }

    let score = (matches / union.len() as f64 * 100.0).min(100.0);
    score.round() as u32
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemplateMatch<'a> {
    pub template: &'a Template,
    pub score: u32,
}

/// Templates scoring at least `min_score`, best first. Ties keep input order.
pub fn find_matching_templates<'a>(
    query: &str,
    templates: &'a [Template],
    min_score: u32,
) -> Vec<TemplateMatch<'a>> {
    let mut matches: Vec<TemplateMatch<'a>> = templates
        .iter()
        .map(|template| TemplateMatch {
            template,
            score: calculate_similarity(query, template),
        })
        .filter(|m| m.score >= min_score)
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score));

    tracing::debug!(
        "Template query matched {} of {} templates",
        matches.len(),
        templates.len()
    );
    matches
}
