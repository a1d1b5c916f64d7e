//! Text normalization primitives shared by every matching step
//!
//! All matching in the engine runs over normalized text: lowercased,
//! accent-folded, punctuation-stripped, whitespace-collapsed. The functions
//! here are pure and deterministic.

/// French function words plus a few English ones, dropped during tokenization
const STOPWORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "de", "du", "au", "aux", "et", "ou", "mais", "donc",
    "car", "ne", "pas", "plus", "tres", "pour", "avec", "sans", "sur", "sous", "dans", "par",
    "que", "qui", "quoi", "dont", "est", "suis", "sont", "etre", "avoir", "mon", "ma", "mes",
    "ton", "ta", "tes", "son", "sa", "ses", "je", "tu", "il", "elle", "on", "nous", "vous", "ils",
    "elles", "ce", "cette", "ces", "se", "en", "the", "and", "for", "you", "this", "that",
];

/// Fold a single character's French diacritics to its ASCII base
fn fold_char(c: char) -> Option<&'static str> {
    match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => Some("a"),
        'è' | 'é' | 'ê' | 'ë' => Some("e"),
        'î' | 'ï' | 'í' | 'ì' => Some("i"),
        'ô' | 'ö' | 'ó' | 'ò' | 'õ' => Some("o"),
        'ù' | 'û' | 'ü' | 'ú' => Some("u"),
        'ç' => Some("c"),
        'ÿ' => Some("y"),
        'ñ' => Some("n"),
        'œ' => Some("oe"),
        'æ' => Some("ae"),
        _ => None,
    }
}

/// Normalize free text for matching
///
/// Lowercases, folds diacritics, turns apostrophes into spaces, strips
/// everything outside `[a-z0-9 ]`, collapses whitespace, and trims.
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if let Some(folded) = fold_char(c) {
            out.push_str(folded);
            continue;
        }
        match c {
            '\'' | '’' | '`' => out.push(' '),
            'a'..='z' | '0'..='9' => out.push(c),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokenize free text for matching
///
/// Applies [`normalize`], splits on spaces, and drops tokens shorter than
/// two characters or present in the stopword set.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard-style token overlap between two strings, in [0, 1]
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let ta: std::collections::HashSet<String> = tokenize(a).into_iter().collect();
    let tb: std::collections::HashSet<String> = tokenize(b).into_iter().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count() as f32;
    let union = ta.union(&tb).count() as f32;
    shared / union
}

/// Whether one string contains the other after normalization
pub fn contains_either(a: &str, b: &str) -> bool {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    na.contains(&nb) || nb.contains(&na)
}
