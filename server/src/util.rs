//! Shared utility functions

use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

/// Convert text into a URL-safe slug.
///
/// Lowercases, drops anything that is not a word character, whitespace or
/// hyphen, then collapses runs of whitespace and hyphens into one hyphen.
///
/// # Examples
///
/// ```
/// use clubhub_server::util::slugify;
///
/// assert_eq!(slugify("Penn Labs"), "penn-labs");
/// assert_eq!(slugify("  Chess & Go  Club! "), "chess-go-club");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");
    SEPARATORS
        .replace_all(cleaned.trim(), "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

/// Turn a field name into a column header.
///
/// # Examples
///
/// ```
/// use clubhub_server::util::title_case;
///
/// assert_eq!(title_case("application_required"), "Application Required");
/// assert_eq!(title_case("code"), "Code");
/// ```
pub fn title_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut at_word_start = true;
    for c in field.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
