//! Text search over the visibility set.
//!
//! A query matches a note when the title or content contains the whole query
//! (case-insensitive), or when any tag equals one of the query's terms. Terms
//! are produced by splitting on whitespace and commas.

use serde::{Deserialize, Serialize};

use crate::models::Note;

/// A parsed, non-empty search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerms {
    /// The raw query, matched as a substring of title and content.
    pub text: String,
    /// Whitespace/comma separated terms, matched exactly against tags.
    pub terms: Vec<String>,
}

impl SearchTerms {
    /// Parse a raw query. Returns `None` for a missing or empty query, which
    /// means "no text filter". The text is kept verbatim, surrounding
    /// whitespace included.
    pub fn parse(query: Option<&str>) -> Option<Self> {
        let text = query?;
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            terms: split_terms(text),
        })
    }

    /// In-process evaluation of the match rule.
    pub fn matches(&self, note: &Note) -> bool {
        let needle = self.text.to_lowercase();
        note.title.to_lowercase().contains(&needle)
            || note.content.to_lowercase().contains(&needle)
            || note.tags.iter().any(|tag| self.terms.contains(tag))
    }
}

/// Split a query into tag terms on runs of whitespace and commas.
pub fn split_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
