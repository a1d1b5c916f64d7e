//! Conversation modes and the few-shot example bank

use crate::{Result, RiposteError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known mode identifiers
pub mod mode_ids {
    /// Free-form conversation
    pub const DEFAULT: &str = "default";
    /// Attitude verdict on a described situation
    pub const RADAR_ATTITUDE: &str = "radar-attitude";
    /// The user wants to get roasted
    pub const ROAST: &str = "roast";
    /// Life coaching, persona style
    pub const COACH_DE_VIE: &str = "coach-de-vie";
    /// Quote of the day
    pub const PHRASE_DU_JOUR: &str = "phrase-du-jour";
    /// Personalized message for someone
    pub const MESSAGE_PERSONNALISE: &str = "message-personnalise";
    /// Mini stand-up bit
    pub const NUMERO_DE_SHOW: &str = "numero-de-show";
    /// Parody horoscope
    pub const HOROSCOPE: &str = "horoscope";
    /// Parody weather report
    pub const METEO: &str = "meteo";
}

/// A sample (input, response) pair used as a synthesis template
///
/// `variables` is a semicolon-separated list of `key=value` pairs giving the
/// sample entity values embedded in `response`, e.g. `"prenom=Julie;age=34"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    /// Sample user input
    pub input: String,
    /// Canned in-character response
    pub response: String,
    /// Optional context note
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,
    /// Sample entity values embedded in `response`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub variables: Option<String>,
}

impl FewShotExample {
    /// Parse `variables` into key/value pairs; malformed entries are skipped
    pub fn parsed_variables(&self) -> Vec<(String, String)> {
        let Some(raw) = &self.variables else {
            return Vec::new();
        };
        raw.split(';')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() || value.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Look up one declared variable's sample value
    pub fn variable(&self, key: &str) -> Option<String> {
        self.parsed_variables()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Mode-keyed collection of few-shot examples, loaded once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeBank {
    modes: HashMap<String, Vec<FewShotExample>>,
}

impl ModeBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a bank from a JSON object of `mode_id -> [examples]`
    pub fn from_json(json: &str) -> Result<Self> {
        let modes: HashMap<String, Vec<FewShotExample>> = serde_json::from_str(json)
            .map_err(|e| RiposteError::config(format!("Invalid mode bank JSON: {}", e)))?;
        Ok(Self { modes })
    }

    /// Add examples for a mode (test/builder convenience)
    pub fn insert(&mut self, mode_id: impl Into<String>, examples: Vec<FewShotExample>) {
        self.modes.insert(mode_id.into(), examples);
    }

    /// Examples dedicated to a mode; falls back to the whole bank when the
    /// mode has no dedicated examples
    pub fn examples_for(&self, mode_id: &str) -> Vec<FewShotExample> {
        match self.modes.get(mode_id) {
            Some(examples) if !examples.is_empty() => examples.clone(),
            _ => self.all_examples(),
        }
    }

    /// Every example in the bank, across all modes
    pub fn all_examples(&self) -> Vec<FewShotExample> {
        self.modes.values().flatten().cloned().collect()
    }

    /// Whether the bank holds no examples at all
    pub fn is_empty(&self) -> bool {
        self.modes.values().all(|v| v.is_empty())
    }

    /// Registered mode ids
    pub fn mode_ids(&self) -> Vec<&str> {
        self.modes.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(input: &str, response: &str, variables: Option<&str>) -> FewShotExample {
        FewShotExample {
            input: input.to_string(),
            response: response.to_string(),
            context: None,
            variables: variables.map(|v| v.to_string()),
        }
    }

    #[test]
    fn test_parsed_variables() {
        let ex = example("x", "y", Some("prenom=Julie;age=34"));
        assert_eq!(
            ex.parsed_variables(),
            vec![
                ("prenom".to_string(), "Julie".to_string()),
                ("age".to_string(), "34".to_string())
            ]
        );
        assert_eq!(ex.variable("age").as_deref(), Some("34"));
        assert_eq!(ex.variable("ville"), None);
    }

    #[test]
    fn test_parsed_variables_skips_malformed() {
        let ex = example("x", "y", Some("prenom=Julie;;brisé;=vide;ville=Québec"));
        assert_eq!(
            ex.parsed_variables(),
            vec![
                ("prenom".to_string(), "Julie".to_string()),
                ("ville".to_string(), "Québec".to_string())
            ]
        );
    }

    #[test]
    fn test_examples_for_falls_back_to_whole_bank() {
        let mut bank = ModeBank::new();
        bank.insert(mode_ids::ROAST, vec![example("roast moi", "ok le grand", None)]);
        bank.insert(mode_ids::HOROSCOPE, vec![]);

        assert_eq!(bank.examples_for(mode_ids::ROAST).len(), 1);
        // horoscope has no dedicated examples: whole bank
        assert_eq!(bank.examples_for(mode_ids::HOROSCOPE).len(), 1);
        assert_eq!(bank.examples_for("inconnu").len(), 1);
    }

    #[test]
    fn test_from_json() {
        let bank = ModeBank::from_json(
            r#"{"roast": [{"input": "roast moi", "response": "avec plaisir"}]}"#,
        )
        .unwrap();
        assert!(!bank.is_empty());
        assert_eq!(bank.examples_for("roast")[0].response, "avec plaisir");

        assert!(ModeBank::from_json("pas du json").is_err());
    }
}
