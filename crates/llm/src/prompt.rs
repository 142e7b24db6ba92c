//! Request shaping for the conversational proxy.

use kisan_core::QueryKind;

/// Longest query forwarded to the model, in characters.
pub const MAX_QUERY_CHARS: usize = 1_000;

const BASE_PROMPT: &str = "You are Kisan Mitra, a friendly agricultural assistant for small farmers in India. Use simple words, short sentences and practical steps. Keep the answer under 120 words.";

pub fn system_prompt(kind: QueryKind, language: &str) -> String {
    let focus = match kind {
        QueryKind::Chat => {
            "Answer general farming questions. If the question is not about farming, politely steer back to farming topics."
        }
        QueryKind::Weather => {
            "Explain what the weather means for field work such as sowing, spraying, irrigation and harvest. Do not invent exact forecasts; point the farmer to the Weather section for live data."
        }
        QueryKind::CropPrice => {
            "Discuss crop prices and mandi trends. Do not invent exact prices; point the farmer to the Crop Rates section for today's rates."
        }
        QueryKind::News => {
            "Summarize agricultural news and government schemes that matter to farmers, with eligibility in plain words."
        }
        QueryKind::FarmingTip => {
            "Give one practical, low-cost farming tip that fits the question."
        }
    };

    format!("{BASE_PROMPT} {focus} Reply only in {language}.")
}

/// Trims the query and caps it at [`MAX_QUERY_CHARS`] on a char boundary.
pub fn shape_query(query: &str) -> String {
    let trimmed = query.trim();
    match trimmed.char_indices().nth(MAX_QUERY_CHARS) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}
