use serde::{Deserialize, Serialize};

use crate::models::Route;

/// Lowercases and trims a transcript. Both the router and the fallback table
/// match against this form.
pub fn normalize_transcript(input: &str) -> String {
    input.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRule {
    pub keyword: String,
    pub route: Route,
}

impl IntentRule {
    pub fn new(keyword: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            route: Route::new(route),
        }
    }
}

/// Ordered keyword-to-route matcher.
///
/// Rules are tried in order and the first keyword contained in the transcript
/// wins. Specific phrases must precede the single words they contain, which
/// [`crate::Rulebook::validate`] enforces.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    rules: Vec<IntentRule>,
}

impl IntentRouter {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn resolve_route(&self, transcript: &str) -> Option<&Route> {
        let normalized = normalize_transcript(transcript);
        if normalized.is_empty() {
            return None;
        }

        self.rules
            .iter()
            .find(|rule| normalized.contains(rule.keyword.as_str()))
            .map(|rule| &rule.route)
    }
}
