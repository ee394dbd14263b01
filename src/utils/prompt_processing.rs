use std::collections::{HashMap, HashSet};
use regex::{Captures, Regex};
use lazy_static::lazy_static;

lazy_static! {
    pub(crate) static ref PLACEHOLDER_MATCH_RE: Regex = Regex::new(r"\{\{.*?\}\}").unwrap();
}

#[inline]
pub(crate) fn strip_format(key: &str) -> &str {
    //! Strips "{{" and "}}" from a matched placeholder.
    //! Only call this on matches of [PLACEHOLDER_MATCH_RE].
    &key[2..key.len() - 2]
}

/// Replaces every placeholder that has a filling value in `mapping`. Placeholders without a value are left as they are.
///
/// Substitution is done in a single pass, so filling values are never scanned for placeholders themselves.
pub(crate) fn replace_all_placeholders(original: &str, mapping: &HashMap<String, Option<String>>) -> String {
    PLACEHOLDER_MATCH_RE.replace_all(original, |captures: &Captures| {
        let match_text = &captures[0];
        let key = strip_format(match_text);
        match mapping.get(key) {
            Some(Some(replacement)) => replacement.clone(),
            _ => match_text.to_string(),
        }
    }).into_owned()
}

/// Collects the names of all placeholders in a string.
pub fn get_placeholders(string: &str) -> HashSet<String> {
    PLACEHOLDER_MATCH_RE.captures_iter(string)
        .map(|captures| strip_format(&captures[0]).to_string())
        .collect()
}
