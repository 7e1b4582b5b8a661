// src/slug.rs
//! Stable identifiers and URL slugs derived from feed text.

use once_cell::sync::OnceCell;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Trailing path segment of an entry's canonical id URL, e.g.
/// `https://www.finansportalen.no/bank/boliglan/46135` -> `46135`.
/// This is the cross-run sync key.
pub fn extract_stable_id(id_url: &str) -> String {
    id_url
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Lowercase ASCII slug: Norwegian letters folded (æ→a, ø→o, å→a), remaining
/// diacritics stripped via canonical decomposition, `+ % , : & ( ) / .` removed,
/// whitespace runs joined with a single hyphen.
pub fn normalize_for_slug(text: &str) -> String {
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re_punct = RE_PUNCT.get_or_init(|| Regex::new(r"[+%,:&()/.]").expect("static regex"));

    let folded = text
        .to_lowercase()
        .replace('æ', "a")
        .replace('ø', "o")
        .replace('å', "a");
    let ascii: String = folded.nfd().filter(char::is_ascii).collect();
    let stripped = re_punct.replace_all(&ascii, "");
    stripped.split_whitespace().collect::<Vec<_>>().join("-")
}
