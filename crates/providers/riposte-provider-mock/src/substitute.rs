//! Variable substitution
//!
//! Rewrites a selected template response by swapping its sample entity values
//! for values freshly extracted from the current turn. Only values declared
//! in the example's `variables` string are ever touched; the rest of the
//! template is left verbatim.

use regex::Regex;
use riposte_core::nlp::normalize;
use riposte_core::signals::{extract_signals, ExtractedSignals};
use tracing::warn;

/// Map a declared variable key to the extracted value replacing it
fn inferred_value(signals: &ExtractedSignals, key: &str) -> Option<String> {
    match key {
        "prenom" => signals.name.clone(),
        "age" => signals.age.map(|a| a.to_string()),
        "signe" => signals.sign.clone(),
        "ville" => signals.city.clone(),
        "jour" => signals.day.clone(),
        "meteo" => signals.weather.clone(),
        "theme" => signals.theme.clone(),
        "occasion" => signals.occasion.clone(),
        _ => None,
    }
}

/// Personalize a template response against the current user turn
///
/// For each declared `key=sample` pair, when the turn yields a different
/// value for that key, every case-insensitive occurrence of the sample value
/// is replaced. Inference failure or an already-matching value is a no-op.
pub fn substitute_variables(
    response: &str,
    variables: &[(String, String)],
    user_turn: &str,
) -> String {
    if variables.is_empty() {
        return response.to_string();
    }

    let signals = extract_signals(user_turn);
    let mut result = response.to_string();
    for (key, sample) in variables {
        let Some(current) = inferred_value(&signals, key) else {
            continue;
        };
        if normalize(&current) == normalize(sample) {
            continue;
        }
        let pattern = format!("(?i){}", regex::escape(sample));
        match Regex::new(&pattern) {
            Ok(re) => {
                result = re.replace_all(&result, current.as_str()).into_owned();
            }
            Err(e) => {
                // escaped literals should always compile; keep the template
                warn!(key, "Skipping unreplaceable variable: {}", e);
            }
        }
    }
    result
}
