//! Album title normalization shared by the discography sync and the classifier.

use regex::Regex;
use std::sync::OnceLock;

fn punctuation_regex() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| {
        Regex::new(r#"[\-'":()\[\].,!?]"#).expect("punctuation pattern is valid")
    })
}

/// Folds case, strips punctuation and collapses whitespace.
///
/// Both sides of a discography match must go through this function, so the
/// output for a given input never changes between releases.
pub fn normalize_album_title(title: &str) -> String {
    if title.trim().is_empty() {
        return String::new();
    }

    let lowered = title.to_lowercase();
    let stripped = punctuation_regex().replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
