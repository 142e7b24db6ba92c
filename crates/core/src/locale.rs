use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Language;

/// Region-qualified tag used to pick speech synthesis voices and recognition
/// grammars. Kept separate from [`Language`], which only selects the
/// fallback-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocaleTag {
    #[serde(rename = "en-IN")]
    EnIn,
    #[serde(rename = "hi-IN")]
    HiIn,
    #[serde(rename = "te-IN")]
    TeIn,
    #[serde(rename = "ta-IN")]
    TaIn,
    #[serde(rename = "en-US")]
    EnUs,
}

impl LocaleTag {
    pub const GLOBAL_DEFAULT: LocaleTag = LocaleTag::EnUs;

    pub fn for_language(language: Language) -> Self {
        match language {
            Language::En => Self::EnIn,
            Language::Hi => Self::HiIn,
            Language::Te => Self::TeIn,
            Language::Ta => Self::TaIn,
        }
    }

    /// Resolves any language code or tag. Unsupported languages use the
    /// closest supported major language, then the global default.
    pub fn resolve(code: &str) -> Self {
        if let Ok(language) = code.parse::<Language>() {
            return Self::for_language(language);
        }

        let lower = code.trim().to_lowercase();
        let primary = lower.split(['-', '_']).next().unwrap_or_default();
        match primary {
            // Devanagari-script languages share Hindi voices.
            "mr" | "ne" | "mai" | "bho" | "sa" => Self::HiIn,
            "kn" => Self::TeIn,
            _ => Self::GLOBAL_DEFAULT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnIn => "en-IN",
            Self::HiIn => "hi-IN",
            Self::TeIn => "te-IN",
            Self::TaIn => "ta-IN",
            Self::EnUs => "en-US",
        }
    }
}

impl fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
