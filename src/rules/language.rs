// src/rules/language.rs
// Lightweight language heuristic over a small fixed candidate set. We only
// need to separate English from the most common non-English traffic on the
// feed, so this scores function-word hits plus French diacritics instead of
// shipping a full detector. Ties and undetermined input count as not-English.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lang {
    English,
    French,
}

// High-frequency function words; ambiguous ones shared by both languages
// (e.g. "on", "a") are deliberately left out.
const ENGLISH_HINTS: &[&str] = &[
    "the", "and", "is", "are", "was", "were", "of", "to", "in", "that", "it", "for", "with",
    "this", "you", "not", "have", "has", "but", "they", "what", "when", "there", "from", "will",
    "would", "about", "their", "which", "been",
];

const FRENCH_HINTS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "et", "est", "sont", "dans", "que", "qui", "pour",
    "avec", "pas", "vous", "nous", "ils", "elle", "mais", "sur", "ce", "cette", "je", "tu",
    "été", "être", "aux", "plus", "leur",
];

fn french_diacritics(text: &str) -> usize {
    const MARKS: &str = "àâæçéèêëîïôœùûüÿÀÂÆÇÉÈÊËÎÏÔŒÙÛÜŸ";
    text.chars().filter(|c| MARKS.contains(*c)).count()
}

fn detect(text: &str) -> Option<Lang> {
    let mut english = 0usize;
    let mut french = french_diacritics(text);

    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let lower = token.to_lowercase();
        if ENGLISH_HINTS.contains(&lower.as_str()) {
            english += 1;
        }
        if FRENCH_HINTS.contains(&lower.as_str()) {
            french += 1;
        }
    }

    if english == 0 && french == 0 {
        return None; // undetermined
    }
    match english.cmp(&french) {
        std::cmp::Ordering::Greater => Some(Lang::English),
        std::cmp::Ordering::Less => Some(Lang::French),
        std::cmp::Ordering::Equal => None, // tie
    }
}

/// True only when the text is confidently English. Empty input, ties and
/// texts without any recognizable function words are all `false`.
pub fn is_likely_english(text: &str) -> bool {
    detect(text) == Some(Lang::English)
}
