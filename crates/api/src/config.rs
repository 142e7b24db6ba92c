use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_KEY: &str = "dev-kisan-key";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Server settings, read from `KISAN_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub api_key: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub openai: Option<OpenAiConfig>,
    /// Where the assistant sends `{query, type, language}` requests. When
    /// unset the assistant calls the LLM in-process, or stays offline.
    pub chat_endpoint: Option<String>,
    pub chat_endpoint_key: Option<String>,
    pub rulebook_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            allowed_origins: vec!["http://localhost:5173".to_string()],
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 60,
            openai: None,
            chat_endpoint: None,
            chat_endpoint_key: None,
            rulebook_path: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let openai = non_empty("KISAN_OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            model: non_empty("KISAN_OPENAI_MODEL"),
            base_url: non_empty("KISAN_OPENAI_BASE_URL"),
        });

        Self {
            bind: non_empty("KISAN_BIND").unwrap_or(defaults.bind),
            api_key: non_empty("KISAN_API_KEY").unwrap_or(defaults.api_key),
            allowed_origins: non_empty("KISAN_ALLOWED_ORIGINS")
                .map(|value| parse_origins(&value))
                .unwrap_or(defaults.allowed_origins),
            rate_limit_window: non_empty("KISAN_RATE_LIMIT_WINDOW_SECONDS")
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: non_empty("KISAN_RATE_LIMIT_MAX")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
            openai,
            chat_endpoint: non_empty("KISAN_CHAT_ENDPOINT"),
            chat_endpoint_key: non_empty("KISAN_CHAT_ENDPOINT_KEY"),
            rulebook_path: non_empty("KISAN_RULEBOOK_PATH").map(PathBuf::from),
        }
    }
}

/// Comma-separated explicit origins. A `*` entry is dropped: the API key is
/// the only way to admit arbitrary origins.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty() && origin != "*")
        .collect()
}
