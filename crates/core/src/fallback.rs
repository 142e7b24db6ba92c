use serde::{Deserialize, Serialize};

use crate::intent::normalize_transcript;
use crate::models::Language;

/// One string per fallback-table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub hi: String,
    pub te: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, hi: impl Into<String>, te: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            hi: hi.into(),
            te: te.into(),
        }
    }

    /// Languages without a column of their own read the English slot.
    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Hi => &self.hi,
            Language::Te => &self.te,
            Language::En | Language::Ta => &self.en,
        }
    }

    pub(crate) fn slots(&self) -> [&str; 3] {
        [&self.en, &self.hi, &self.te]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEntry {
    pub keyword: String,
    pub text: LocalizedText,
}

impl FallbackEntry {
    pub fn new(keyword: impl Into<String>, text: LocalizedText) -> Self {
        Self {
            keyword: keyword.into(),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackMatch<'a> {
    pub text: &'a str,
    pub keyword: Option<&'a str>,
}

/// Keyword-indexed canned responses used when no remote answer is available.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: Vec<FallbackEntry>,
    no_match: LocalizedText,
}

impl FallbackTable {
    pub fn new(entries: Vec<FallbackEntry>, no_match: LocalizedText) -> Self {
        Self { entries, no_match }
    }

    pub fn entries(&self) -> &[FallbackEntry] {
        &self.entries
    }

    pub fn no_match(&self) -> &LocalizedText {
        &self.no_match
    }

    /// Scans entries in table order; the first keyword contained in the
    /// normalized transcript wins, otherwise the generic message is returned.
    pub fn lookup(&self, transcript: &str, language: Language) -> FallbackMatch<'_> {
        let normalized = normalize_transcript(transcript);

        match self
            .entries
            .iter()
            .find(|entry| normalized.contains(entry.keyword.as_str()))
        {
            Some(entry) => FallbackMatch {
                text: entry.text.get(language),
                keyword: Some(entry.keyword.as_str()),
            },
            None => FallbackMatch {
                text: self.no_match.get(language),
                keyword: None,
            },
        }
    }
}
