pub mod fallback;
pub mod intent;
pub mod locale;
pub mod models;
pub mod rulebook;

pub use fallback::{FallbackEntry, FallbackMatch, FallbackTable, LocalizedText};
pub use intent::{normalize_transcript, IntentRouter, IntentRule};
pub use locale::LocaleTag;
pub use models::*;
pub use rulebook::{Rulebook, RulebookError};
