use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::{FallbackEntry, FallbackTable, LocalizedText};
use crate::intent::{normalize_transcript, IntentRouter, IntentRule};

/// Keyword looked up for empty transcripts.
pub const HELP_KEYWORD: &str = "help";

const WEATHER: &str = "/features/weather";
const CROP_PRICES: &str = "/features/crop-prices";
const MARKETPLACE: &str = "/features/marketplace";
const CHATBOT: &str = "/features/chatbot";
const NEWS: &str = "/features/news";

#[derive(Debug, Error)]
pub enum RulebookError {
    #[error("failed to read rulebook {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rulebook is not valid JSON")]
    Parse(#[from] serde_json::Error),
    #[error("{table} entry #{index} has an empty keyword")]
    EmptyKeyword { table: &'static str, index: usize },
    #[error("{table} keyword `{keyword}` must be lowercase and trimmed")]
    UnnormalizedKeyword { table: &'static str, keyword: String },
    #[error("{table} keyword `{keyword}` can never match: `{shadowed_by}` comes first")]
    UnreachableKeyword {
        table: &'static str,
        keyword: String,
        shadowed_by: String,
    },
    #[error("fallback entry `{keyword}` has an empty `{language}` text")]
    EmptyText {
        keyword: String,
        language: &'static str,
    },
    #[error("fallback table needs a `help` entry for empty transcripts")]
    MissingHelpEntry,
}

/// Static configuration shared by the intent router and the response
/// resolver. Injected at construction so alternate tables can be swapped in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rulebook {
    pub intent_rules: Vec<IntentRule>,
    pub fallback: Vec<FallbackEntry>,
    pub no_match: LocalizedText,
}

impl Rulebook {
    pub fn from_json_str(raw: &str) -> Result<Self, RulebookError> {
        let rulebook: Self = serde_json::from_str(raw)?;
        rulebook.validate()?;
        Ok(rulebook)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RulebookError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RulebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads `path` when given, otherwise the compiled-in tables.
    pub fn load(path: Option<&Path>) -> Result<Self, RulebookError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Checks the ordering invariant: an earlier keyword contained in a later
    /// one makes the later entry unreachable, so specific phrases must come
    /// before the words they contain.
    pub fn validate(&self) -> Result<(), RulebookError> {
        let intent_keywords = self
            .intent_rules
            .iter()
            .map(|rule| rule.keyword.as_str())
            .collect::<Vec<_>>();
        check_keywords("intent", &intent_keywords)?;

        let fallback_keywords = self
            .fallback
            .iter()
            .map(|entry| entry.keyword.as_str())
            .collect::<Vec<_>>();
        check_keywords("fallback", &fallback_keywords)?;

        for entry in &self.fallback {
            check_texts(&entry.keyword, &entry.text)?;
        }
        check_texts("<no match>", &self.no_match)?;

        if !fallback_keywords.contains(&HELP_KEYWORD) {
            return Err(RulebookError::MissingHelpEntry);
        }

        Ok(())
    }

    pub fn router(&self) -> IntentRouter {
        IntentRouter::new(self.intent_rules.clone())
    }

    pub fn fallback_table(&self) -> FallbackTable {
        FallbackTable::new(self.fallback.clone(), self.no_match.clone())
    }

    pub fn builtin() -> Self {
        let intent_rules = [
            ("weather prediction", WEATHER),
            ("weather forecast", WEATHER),
            ("crop price", CROP_PRICES),
            ("crop rate", CROP_PRICES),
            ("market price", CROP_PRICES),
            ("mandi", CROP_PRICES),
            ("marketplace", MARKETPLACE),
            ("sell", MARKETPLACE),
            ("buy", MARKETPLACE),
            ("chatbot", CHATBOT),
            ("assistant", CHATBOT),
            ("news", NEWS),
            ("scheme", NEWS),
            ("profile", "/profile"),
            ("weather", WEATHER),
            ("rain", WEATHER),
            ("forecast", WEATHER),
            ("price", CROP_PRICES),
            ("market", MARKETPLACE),
            ("map", WEATHER),
            ("मौसम", WEATHER),
            ("बारिश", WEATHER),
            ("भाव", CROP_PRICES),
            ("मंडी", CROP_PRICES),
            ("వాతావరణం", WEATHER),
            ("ధర", CROP_PRICES),
            ("home", "/"),
        ]
        .into_iter()
        .map(|(keyword, route)| IntentRule::new(keyword, route))
        .collect();

        Self {
            intent_rules,
            fallback: builtin_fallback(),
            no_match: LocalizedText::new(
                "I can help with weather forecasts, crop rates, the marketplace, fertilizer and pest advice, and government schemes. Please ask about one of these.",
                "मैं मौसम पूर्वानुमान, फसल दरें, मार्केटप्लेस, खाद और कीट सलाह तथा सरकारी योजनाओं में मदद कर सकता हूँ। कृपया इनमें से किसी के बारे में पूछें।",
                "వాతావరణ సూచన, పంట ధరలు, మార్కెట్‌ప్లేస్, ఎరువులు మరియు పురుగుల సలహా, ప్రభుత్వ పథకాలలో నేను సహాయం చేయగలను. దయచేసి వీటిలో ఒకదాని గురించి అడగండి.",
            ),
        }
    }
}

fn check_keywords(table: &'static str, keywords: &[&str]) -> Result<(), RulebookError> {
    for (index, keyword) in keywords.iter().enumerate() {
        if keyword.is_empty() {
            return Err(RulebookError::EmptyKeyword { table, index });
        }
        if normalize_transcript(keyword) != *keyword {
            return Err(RulebookError::UnnormalizedKeyword {
                table,
                keyword: keyword.to_string(),
            });
        }
        if let Some(earlier) = keywords[..index]
            .iter()
            .find(|earlier| keyword.contains(**earlier))
        {
            return Err(RulebookError::UnreachableKeyword {
                table,
                keyword: keyword.to_string(),
                shadowed_by: earlier.to_string(),
            });
        }
    }
    Ok(())
}

fn check_texts(keyword: &str, text: &LocalizedText) -> Result<(), RulebookError> {
    for (language, slot) in ["en", "hi", "te"].into_iter().zip(text.slots()) {
        if slot.trim().is_empty() {
            return Err(RulebookError::EmptyText {
                keyword: keyword.to_string(),
                language,
            });
        }
    }
    Ok(())
}

/// Hindi and Telugu keywords mapped to the English entry whose answer they
/// share. They mirror the native-script intent rules.
const NATIVE_FALLBACK_KEYWORDS: [(&str, &str); 10] = [
    ("मौसम", "weather"),
    ("बारिश", "rain"),
    ("भाव", "price"),
    ("मंडी", "price"),
    ("खाद", "fertilizer"),
    ("कीट", "pest"),
    ("వాతావరణం", "weather"),
    ("వర్షం", "rain"),
    ("ధర", "price"),
    ("ఎరువు", "fertilizer"),
];

fn builtin_fallback() -> Vec<FallbackEntry> {
    let mut entries: Vec<FallbackEntry> = [
        (
            "weather",
            "Check the Weather section for today's forecast, rain chances and the 7-day outlook for your area.",
            "आज के मौसम, बारिश की संभावना और 7 दिन के पूर्वानुमान के लिए मौसम सेक्शन देखें।",
            "ఈరోజు వాతావరణం, వర్ష సూచన మరియు 7 రోజుల అంచనా కోసం వాతావరణం విభాగాన్ని చూడండి.",
        ),
        (
            "rain",
            "Rain updates are in the Weather section. Plan spraying and harvesting around the rain forecast.",
            "बारिश की जानकारी मौसम सेक्शन में है। छिड़काव और कटाई बारिश के पूर्वानुमान के अनुसार करें।",
            "వర్షం సమాచారం వాతావరణం విభాగంలో ఉంది. పిచికారీ మరియు కోత వర్ష సూచన ప్రకారం ప్లాన్ చేసుకోండి.",
        ),
        (
            "crop",
            "Open Crop Rates to see today's mandi prices for your crops in nearby markets.",
            "आस-पास की मंडियों में आज के फसल भाव देखने के लिए फसल दरें खोलें।",
            "సమీప మార్కెట్లలో ఈరోజు పంట ధరలు చూడటానికి పంట ధరలు విభాగాన్ని తెరవండి.",
        ),
        (
            "price",
            "The latest mandi prices are listed under Crop Rates and are refreshed every morning.",
            "ताज़ा मंडी भाव फसल दरें सेक्शन में हैं और हर सुबह अपडेट होते हैं।",
            "తాజా మండి ధరలు పంట ధరలు విభాగంలో ఉన్నాయి, ప్రతి ఉదయం నవీకరించబడతాయి.",
        ),
        (
            "market",
            "Use the Marketplace to buy seeds, fertilizer and tools, or to list your produce for sale.",
            "बीज, खाद और औज़ार खरीदने या अपनी उपज बेचने के लिए मार्केटप्लेस का उपयोग करें।",
            "విత్తనాలు, ఎరువులు, పనిముట్లు కొనడానికి లేదా మీ పంటను అమ్మడానికి మార్కెట్‌ప్లేస్ ఉపయోగించండి.",
        ),
        (
            "sell",
            "To sell your produce, open the Marketplace and tap 'Add listing' with quantity and expected price.",
            "अपनी उपज बेचने के लिए मार्केटप्लेस खोलें और मात्रा व अपेक्षित दाम के साथ 'लिस्टिंग जोड़ें' दबाएँ।",
            "మీ పంటను అమ్మడానికి మార్కెట్‌ప్లేస్ తెరిచి, పరిమాణం మరియు ఆశించిన ధరతో 'జాబితా జోడించండి' నొక్కండి.",
        ),
        (
            "fertilizer",
            "Get a soil test before applying fertilizer. Split nitrogen doses and avoid applying just before heavy rain.",
            "खाद डालने से पहले मिट्टी की जाँच कराएँ। नाइट्रोजन को किस्तों में दें और भारी बारिश से ठीक पहले न डालें।",
            "ఎరువులు వేసే ముందు మట్టి పరీక్ష చేయించండి. నత్రజనిని విడతలుగా వేయండి, భారీ వర్షానికి ముందు వేయకండి.",
        ),
        (
            "pest",
            "For pest problems, inspect leaves early in the morning and contact your local Krishi Vigyan Kendra before spraying.",
            "कीट की समस्या हो तो सुबह पत्तियों की जाँच करें और छिड़काव से पहले नज़दीकी कृषि विज्ञान केंद्र से संपर्क करें।",
            "పురుగుల సమస్య ఉంటే ఉదయాన్నే ఆకులను పరిశీలించి, పిచికారీకి ముందు సమీప కృషి విజ్ఞాన కేంద్రాన్ని సంప్రదించండి.",
        ),
        (
            "soil",
            "A soil health card tells you which nutrients your field needs. Ask at your nearest soil testing lab.",
            "मृदा स्वास्थ्य कार्ड से पता चलता है कि खेत को किन पोषक तत्वों की ज़रूरत है। नज़दीकी मिट्टी जाँच प्रयोगशाला में पूछें।",
            "మీ పొలానికి ఏ పోషకాలు అవసరమో నేల ఆరోగ్య కార్డు చెబుతుంది. సమీప మట్టి పరీక్ష కేంద్రంలో అడగండి.",
        ),
        (
            "water",
            "Irrigate early in the morning or in the evening, and consider drip irrigation to save water.",
            "सिंचाई सुबह जल्दी या शाम को करें, और पानी बचाने के लिए ड्रिप सिंचाई अपनाएँ।",
            "ఉదయాన్నే లేదా సాయంత్రం నీరు పెట్టండి, నీటిని ఆదా చేయడానికి బిందు సేద్యం పరిశీలించండి.",
        ),
        (
            "scheme",
            "Government schemes such as PM-KISAN and crop insurance are listed in the News section with eligibility details.",
            "पीएम-किसान और फसल बीमा जैसी सरकारी योजनाएँ पात्रता की जानकारी के साथ समाचार सेक्शन में हैं।",
            "పీఎం-కిసాన్, పంట బీమా వంటి ప్రభుత్వ పథకాలు అర్హత వివరాలతో వార్తల విభాగంలో ఉన్నాయి.",
        ),
        (
            "news",
            "The News section has the latest farming news, scheme announcements and market updates.",
            "समाचार सेक्शन में खेती की ताज़ा खबरें, योजनाओं की घोषणाएँ और बाज़ार अपडेट हैं।",
            "వార్తల విభాగంలో తాజా వ్యవసాయ వార్తలు, పథకాల ప్రకటనలు మరియు మార్కెట్ సమాచారం ఉన్నాయి.",
        ),
        (
            "hello",
            "Namaste! Ask me about the weather, crop rates or the marketplace.",
            "नमस्ते! मुझसे मौसम, फसल दरों या मार्केटप्लेस के बारे में पूछें।",
            "నమస్తే! వాతావరణం, పంట ధరలు లేదా మార్కెట్‌ప్లేస్ గురించి నన్ను అడగండి.",
        ),
        (
            "thank",
            "You're welcome! Happy farming.",
            "आपका स्वागत है! खेती शुभ हो।",
            "మీకు స్వాగతం! శుభ వ్యవసాయం.",
        ),
        (
            HELP_KEYWORD,
            "I can help you with weather updates, crop rates, the marketplace and farming tips. Try saying 'weather today' or 'crop price'.",
            "मैं मौसम, फसल दरों, मार्केटप्लेस और खेती की सलाह में आपकी मदद कर सकता हूँ। 'आज का मौसम' या 'फसल भाव' बोलकर देखें।",
            "వాతావరణం, పంట ధరలు, మార్కెట్‌ప్లేస్ మరియు వ్యవసాయ సలహాలలో నేను సహాయం చేయగలను. 'ఈరోజు వాతావరణం' లేదా 'పంట ధర' అని చెప్పి చూడండి.",
        ),
    ]
    .into_iter()
    .map(|(keyword, en, hi, te)| FallbackEntry::new(keyword, LocalizedText::new(en, hi, te)))
    .collect();

    let native = NATIVE_FALLBACK_KEYWORDS
        .iter()
        .filter_map(|(keyword, english)| {
            entries
                .iter()
                .find(|entry| entry.keyword == *english)
                .map(|entry| FallbackEntry::new(*keyword, entry.text.clone()))
        })
        .collect::<Vec<_>>();
    entries.extend(native);
    entries
}
