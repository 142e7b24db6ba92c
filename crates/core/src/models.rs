use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Languages the assistant can answer in.
///
/// Tamil is partial: it has its own speech locale but no dedicated column in
/// the fallback table, so canned answers come back in English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Hi,
    Te,
    Ta,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language code `{0}`")]
pub struct UnsupportedLanguage(pub String);

impl Language {
    pub const ALL: [Language; 4] = [Self::En, Self::Hi, Self::Te, Self::Ta];

    /// Parses a code or tag, degrading to English when it is missing or unknown.
    pub fn from_optional_str(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse::<Self>().ok())
            .unwrap_or_default()
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Te => "te",
            Self::Ta => "ta",
        }
    }

    /// Human-readable name sent to the remote conversational service.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Hi => "Hindi",
            Self::Te => "Telugu",
            Self::Ta => "Tamil",
        }
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_lowercase();
        let primary = lower.split(['-', '_']).next().unwrap_or_default();
        match primary {
            "en" | "english" => Ok(Self::En),
            "hi" | "hindi" => Ok(Self::Hi),
            "te" | "telugu" => Ok(Self::Te),
            "ta" | "tamil" => Ok(Self::Ta),
            _ => Err(UnsupportedLanguage(value.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Path identifier of a feature screen, consumed by the front-end router.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `type` discriminator carried on remote conversational requests.
///
/// Serialized in kebab-case. Deserialization goes through [`QueryKind::parse`],
/// so every spelling the CLI accepts is also accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum QueryKind {
    #[default]
    Chat,
    Weather,
    CropPrice,
    News,
    FarmingTip,
}

impl QueryKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "chat" => Some(Self::Chat),
            "weather" => Some(Self::Weather),
            "crop-price" | "price" => Some(Self::CropPrice),
            "news" => Some(Self::News),
            "farming-tip" | "tip" => Some(Self::FarmingTip),
            _ => None,
        }
    }

    pub const ALL: [QueryKind; 5] = [
        Self::Chat,
        Self::Weather,
        Self::CropPrice,
        Self::News,
        Self::FarmingTip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Weather => "weather",
            Self::CropPrice => "crop-price",
            Self::News => "news",
            Self::FarmingTip => "farming-tip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown query type `{0}` (expected chat, weather, crop-price, news or farming-tip)")]
pub struct UnknownQueryKind(pub String);

impl TryFrom<String> for QueryKind {
    type Error = UnknownQueryKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownQueryKind(value))
    }
}

impl FromStr for QueryKind {
    type Err = UnknownQueryKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| UnknownQueryKind(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Remote,
    Local,
}

/// Outcome of response resolution. Every variant carries displayable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Answer {
    Remote {
        text: String,
    },
    /// `keyword` is the fallback entry that matched, `None` for the generic message.
    Local {
        text: String,
        keyword: Option<String>,
    },
}

impl Answer {
    pub fn text(&self) -> &str {
        match self {
            Self::Remote { text } | Self::Local { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Remote { text } | Self::Local { text, .. } => text,
        }
    }

    pub fn source(&self) -> AnswerSource {
        match self {
            Self::Remote { .. } => AnswerSource::Remote,
            Self::Local { .. } => AnswerSource::Local,
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::Local { keyword, .. } => keyword.as_deref(),
            Self::Remote { .. } => None,
        }
    }
}
