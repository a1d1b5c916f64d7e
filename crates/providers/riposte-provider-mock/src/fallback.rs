//! Fallback reply pool
//!
//! When the matcher yields nothing (in practice only an empty mode bank),
//! the engine still answers in character: a generic one-liner is drawn from
//! this pool, recency-filtered under a synthetic `fallback:<mode_id>` key.
//! The engine never returns an empty reply.

use crate::recency::RecencyLog;
use rand::{Rng, RngCore};

/// Generic in-character one-liners, mode-agnostic
pub const FALLBACK_REPLIES: &[&str] = &[
    "Heille, donne-moi deux secondes, j'ai pas mon texte devant moi!",
    "Ouin... t'es chanceux que je t'aime, parce que j'aurais de quoi à dire.",
    "Attends menute, je réfléchis. Ça arrive pas souvent, profites-en.",
    "Sais-tu quoi? Je vais faire semblant d'avoir compris pis on continue.",
    "C'est beau, c'est beau, j'ai saisi. Enfin, à peu près.",
    "Toi, t'as le tour de me poser des questions pas de bon sens!",
    "Je pourrais te répondre n'importe quoi pis tu me croirais pareil, hein?",
];

/// Absolute last resort when even the fallback pool is empty
pub const LAST_RESORT_REPLY: &str = "Heille, reviens-moi dans deux minutes, veux-tu?";

/// The recency key fallback lines are logged under for a mode
pub fn fallback_recency_key(mode_id: &str) -> String {
    format!("fallback:{}", mode_id)
}

/// Draw a generic one-liner for a mode, avoiding recent repeats
pub fn fallback_reply(
    mode_id: &str,
    recency: &RecencyLog,
    recency_fraction: f32,
    rng: &mut dyn RngCore,
) -> String {
    let key = fallback_recency_key(mode_id);
    let pool = recency.exclude_recent_lines(FALLBACK_REPLIES, &key, recency_fraction);
    if pool.is_empty() {
        return LAST_RESORT_REPLY.to_string();
    }
    pool[rng.gen_range(0..pool.len())].to_string()
}
