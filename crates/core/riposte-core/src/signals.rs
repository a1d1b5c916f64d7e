//! Structured signal extraction from free-form user turns
//!
//! Each field has its own independent pattern rule. Absence of an entity is a
//! normal outcome: every extractor returns `None` rather than an error.

use crate::nlp::normalize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Entities derived from a single user turn, never persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSignals {
    /// First name mentioned in the turn
    pub name: Option<String>,
    /// Age in years
    pub age: Option<u32>,
    /// Zodiac sign, display-cased
    pub sign: Option<String>,
    /// City mentioned in the turn
    pub city: Option<String>,
    /// Day reference (demain, aujourd'hui, cette semaine)
    pub day: Option<String>,
    /// Weather keyword
    pub weather: Option<String>,
    /// Conversation theme (amour, travail, sante)
    pub theme: Option<String>,
    /// Occasion for a personalized message
    pub occasion: Option<String>,
}

/// The 12 zodiac sign stems (normalized) with their display labels
const ZODIAC_SIGNS: &[(&str, &str)] = &[
    ("belier", "Bélier"),
    ("taureau", "Taureau"),
    ("gemeau", "Gémeaux"),
    ("cancer", "Cancer"),
    ("lion", "Lion"),
    ("vierge", "Vierge"),
    ("balance", "Balance"),
    ("scorpion", "Scorpion"),
    ("sagittaire", "Sagittaire"),
    ("capricorne", "Capricorne"),
    ("verseau", "Verseau"),
    ("poisson", "Poissons"),
];

/// Capitalized words that start sentences rather than naming someone,
/// plus the persona's own identity
const NAME_STOPLIST: &[&str] = &[
    "je", "tu", "il", "elle", "on", "nous", "vous", "le", "la", "les", "un", "une", "mon", "ma",
    "mes", "ton", "ta", "tes", "moi", "salut", "bonjour", "allo", "hey", "ok", "cathy", "donne",
    "fais", "dis", "ecris", "peux", "est", "ce", "que", "quoi", "merci", "oui", "non",
];

static CAPITALIZED_AFTER_NAME_PREP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b[Pp]our|\b[Dd]e|[Àà])\s+(\p{Lu}[\p{Ll}\-]+)").expect("valid regex")
});

static CAPITALIZED_AFTER_CITY_PREP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[Àà]|\b[Aa]|\b[Dd]e|\b[Pp]our)\s+(\p{Lu}[\p{Ll}\-]+)").expect("valid regex")
});

static CAPITALIZED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\p{Lu}[\p{Ll}\-]+)\b").expect("valid regex"));

static AGE_WITH_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\s*ans?\b").expect("valid regex"));

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,3})\b").expect("valid regex"));

/// Extract all structured signals from a user turn
pub fn extract_signals(turn: &str) -> ExtractedSignals {
    ExtractedSignals {
        name: extract_name(turn),
        age: extract_age(turn),
        sign: extract_sign(turn),
        city: extract_city(turn),
        day: extract_day(turn),
        weather: extract_weather(turn),
        theme: extract_theme(turn),
        occasion: extract_occasion(turn),
    }
}

/// Extract a first name: capitalized word after pour/de/à, else the first
/// capitalized word not in the sentence-starter stoplist
pub fn extract_name(turn: &str) -> Option<String> {
    if let Some(cap) = CAPITALIZED_AFTER_NAME_PREP.captures(turn) {
        let word = cap[1].to_string();
        if !NAME_STOPLIST.contains(&normalize(&word).as_str()) {
            return Some(word);
        }
    }
    for cap in CAPITALIZED_WORD.captures_iter(turn) {
        let word = cap[1].to_string();
        if !NAME_STOPLIST.contains(&normalize(&word).as_str()) {
            return Some(word);
        }
    }
    None
}

/// Extract an age: integer followed by "an"/"ans", else the first bare
/// 1-3 digit integer
pub fn extract_age(turn: &str) -> Option<u32> {
    if let Some(cap) = AGE_WITH_UNIT.captures(turn) {
        return cap[1].parse().ok();
    }
    BARE_NUMBER
        .captures(turn)
        .and_then(|cap| cap[1].parse().ok())
}

/// Extract a zodiac sign by substring match against the 12 normalized stems
pub fn extract_sign(turn: &str) -> Option<String> {
    let normalized = normalize(turn);
    ZODIAC_SIGNS
        .iter()
        .find(|(stem, _)| normalized.contains(stem))
        .map(|(_, label)| label.to_string())
}

/// Extract a city: capitalized word following à/a/de/pour
pub fn extract_city(turn: &str) -> Option<String> {
    CAPITALIZED_AFTER_CITY_PREP
        .captures(turn)
        .map(|cap| cap[1].to_string())
        .filter(|word| !NAME_STOPLIST.contains(&normalize(word).as_str()))
}

/// Extract a day reference as one of three fixed literals
pub fn extract_day(turn: &str) -> Option<String> {
    let normalized = normalize(turn);
    if normalized.contains("demain") {
        Some("demain".to_string())
    } else if normalized.contains("aujourd hui") {
        Some("aujourd'hui".to_string())
    } else if normalized.contains("semaine") {
        Some("cette semaine".to_string())
    } else {
        None
    }
}

/// Extract a weather keyword
pub fn extract_weather(turn: &str) -> Option<String> {
    let normalized = normalize(turn);
    for (stems, label) in [
        (&["canicule"][..], "canicule"),
        (&["pluie"][..], "pluie"),
        (&["neige"][..], "neige"),
        (&["soleil", "ensoleille"][..], "soleil"),
        (&["orage"][..], "orage"),
        (&["nuage"][..], "nuage"),
    ] {
        if stems.iter().any(|s| normalized.contains(s)) {
            return Some(label.to_string());
        }
    }
    None
}

/// Extract a conversation theme
pub fn extract_theme(turn: &str) -> Option<String> {
    let normalized = normalize(turn);
    for (stems, label) in [
        (&["amour"][..], "amour"),
        (&["travail", "job"][..], "travail"),
        (&["sante"][..], "sante"),
    ] {
        if stems.iter().any(|s| normalized.contains(s)) {
            return Some(label.to_string());
        }
    }
    None
}

/// Extract an occasion for a personalized message
pub fn extract_occasion(turn: &str) -> Option<String> {
    let normalized = normalize(turn);
    for (stems, label) in [
        (&["retraite"][..], "retraite"),
        (&["fete", "anniversaire"][..], "fete"),
        (&["promotion"][..], "promotion"),
        (&["rupture"][..], "rupture"),
    ] {
        if stems.iter().any(|s| normalized.contains(s)) {
            return Some(label.to_string());
        }
    }
    None
}
