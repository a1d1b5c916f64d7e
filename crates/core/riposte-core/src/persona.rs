//! Persona blueprint and system prompt assembly
//!
//! The blueprint is static data bundled with the crate, loaded once at
//! startup. The prompt builder renders it into the system prompt the reply
//! sources consume; the persona never breaks character in any mode.

use crate::config::MAX_HISTORY_MESSAGES;
use crate::types::{HistoryMessage, HistoryRole, Message, MessageRole, MessageStatus};
use crate::{Result, RiposteError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who the persona is
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaIdentity {
    /// Stage name
    pub name: String,
    /// One-line role description
    pub role: String,
    /// Native language tag
    pub language: String,
    /// Speech register
    pub register: String,
}

/// Tone dials, each on a 0-10 scale
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneMetrics {
    /// How hard the persona attacks
    pub aggression: f32,
    /// Residual warmth under the bite
    pub warmth: f32,
    /// Sarcasm level
    pub sarcasm: f32,
    /// Taste for the absurd
    pub absurdity: f32,
    /// Tolerated vulgarity
    pub vulgarity_tolerance: f32,
    /// Intensity of snap judgments
    pub judgment_intensity: f32,
    /// Self-deprecation level
    pub self_deprecation: f32,
}

/// How the humor is built
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumorMechanics {
    /// Escalation shape
    pub escalation_style: String,
    /// Punchline timing
    pub punchline_delay: String,
    /// Use of repetition
    pub repetition_usage: String,
    /// Exaggeration, 0-10
    pub exaggeration_level: f32,
    /// Contrast-based humor usage
    pub contrast_humor: String,
    /// Audience confrontation usage
    pub audience_confrontation: String,
}

/// A sensitive topic and the rule that applies to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftZone {
    /// Topic name
    pub topic: String,
    /// Rule to respect
    pub rule: String,
}

/// Content guardrails
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardrails {
    /// Absolute interdictions
    pub hard_no: Vec<String>,
    /// Sensitive topics requiring structured humor
    pub soft_zones: Vec<SoftZone>,
}

/// Full persona blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaBlueprint {
    /// Identity block
    pub identity: PersonaIdentity,
    /// Tone dials
    pub tone_metrics: ToneMetrics,
    /// Humor construction
    pub humor_mechanics: HumorMechanics,
    /// Preferred themes
    pub thematic_anchors: Vec<String>,
    /// Content guardrails
    pub guardrails: Guardrails,
    /// Per-mode prompt fragments
    #[serde(default)]
    pub mode_prompts: HashMap<String, String>,
    /// Fragment used when a mode has no dedicated prompt
    #[serde(default)]
    pub default_mode_prompt: String,
}

/// Bundled blueprint for the Cathy Gauthier persona
const CATHY_BLUEPRINT_JSON: &str = include_str!("../data/cathy-gauthier.json");

impl PersonaBlueprint {
    /// Parse a blueprint from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RiposteError::config(format!("Invalid persona blueprint: {}", e)))
    }

    /// The persona bundled with the crate
    pub fn bundled() -> Self {
        serde_json::from_str(CATHY_BLUEPRINT_JSON).expect("bundled blueprint is valid JSON")
    }

    /// Prompt fragment for a mode, falling back to the default fragment
    pub fn mode_prompt(&self, mode_id: &str) -> &str {
        self.mode_prompts
            .get(mode_id)
            .map(|s| s.as_str())
            .unwrap_or(&self.default_mode_prompt)
    }
}

/// Build the system prompt for one mode
pub fn build_system_prompt(blueprint: &PersonaBlueprint, mode_id: &str) -> String {
    let b = blueprint;
    let themes = b
        .thematic_anchors
        .iter()
        .map(|theme| format!("- {}", theme))
        .collect::<Vec<_>>()
        .join("\n");
    let hard_no = b
        .guardrails
        .hard_no
        .iter()
        .map(|rule| format!("- {}", rule))
        .collect::<Vec<_>>()
        .join("\n");
    let soft_zones = b
        .guardrails
        .soft_zones
        .iter()
        .map(|zone| format!("- {} : {}", zone.topic, zone.rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Tu es {name}, {role}.\n\
         \n\
         ## TON ET PERSONNALITE\n\
         - Agressivite : {aggression}/10\n\
         - Sarcasme : {sarcasm}/10\n\
         - Jugement : {judgment}/10\n\
         - Chaleur : {warmth}/10\n\
         - Autoderision : {self_deprecation}/10\n\
         - Exageration : {exaggeration}/10\n\
         \n\
         ## STYLE DE PAROLE\n\
         - Phrases courtes et punchy, rythme percussif\n\
         - Tu peux interrompre, couper, relancer\n\
         - Registre : francais quebecois familier\n\
         - Utilise des expressions regionales naturellement\n\
         \n\
         ## THEMES PREFERES\n\
         {themes}\n\
         \n\
         ## MODE ACTIF : {mode_id}\n\
         {mode_prompt}\n\
         \n\
         ## GUARDRAILS\n\
         INTERDITS ABSOLUS :\n\
         {hard_no}\n\
         \n\
         ZONES SENSIBLES (humour structure requis) :\n\
         {soft_zones}\n\
         \n\
         ## REGLES ABSOLUES\n\
         - Tu reponds toujours en francais quebecois\n\
         - Tu ne sors jamais du personnage\n\
         - Tu ne dis jamais que tu es une IA\n\
         - Tes reponses sont courtes (2-4 phrases max)\n\
         - Tu es baveuse, directe et mordante",
        name = b.identity.name,
        role = b.identity.role,
        aggression = b.tone_metrics.aggression,
        sarcasm = b.tone_metrics.sarcasm,
        judgment = b.tone_metrics.judgment_intensity,
        warmth = b.tone_metrics.warmth,
        self_deprecation = b.tone_metrics.self_deprecation,
        exaggeration = b.humor_mechanics.exaggeration_level,
        themes = themes,
        mode_id = mode_id,
        mode_prompt = blueprint.mode_prompt(mode_id),
        hard_no = hard_no,
        soft_zones = soft_zones,
    )
}

/// Render one stored message as history content
fn history_content(message: &Message) -> String {
    let text = message.content.trim();
    let has_image = message
        .metadata
        .as_ref()
        .and_then(|m| m.image_uri.as_ref())
        .is_some();

    if !has_image {
        return text.to_string();
    }
    if text.is_empty() {
        "[Image partagée]".to_string()
    } else {
        format!("{}\n[Image partagée]", text)
    }
}

/// Format prior messages as reply-source history
///
/// Only completed messages are kept, empty entries are dropped, and the
/// result is capped at the most recent [`MAX_HISTORY_MESSAGES`] turns.
pub fn format_history(messages: &[Message]) -> Vec<HistoryMessage> {
    let formatted: Vec<HistoryMessage> = messages
        .iter()
        .filter(|m| m.status == MessageStatus::Complete)
        .map(|m| HistoryMessage {
            role: match m.role {
                MessageRole::User => HistoryRole::User,
                MessageRole::Artist => HistoryRole::Assistant,
            },
            content: history_content(m),
        })
        .filter(|m| !m.content.is_empty())
        .collect();

    let skip = formatted.len().saturating_sub(MAX_HISTORY_MESSAGES);
    formatted.into_iter().skip(skip).collect()
}
