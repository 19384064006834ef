//! Pure text helpers shared by the client and the workers
//!
//! Nothing in here touches the network or the store, so every function is
//! deterministic and cheap to test.

use sha2::{Digest, Sha256};

/// Line prefixes of markup residue that never belongs to article prose
const DROPPED_PREFIXES: &[&str] = &[
    "==",
    "{{",
    "[[File:",
    "[[Image:",
    "[[Файл:",
    "[[Category:",
    "[[Категория:",
];

/// Normalizes a plain-text extract
///
/// Each line is trimmed; blank lines, headings, templates, file references
/// and category references are dropped. The remaining lines keep their
/// order and are joined with `\n`.
///
/// Applying the function to its own output returns the same text.
///
/// # Example
///
/// ```
/// use category_harvest::clean_text;
///
/// let raw = "== History ==\n  First line.  \n\n{{Infobox}}\nSecond line.";
/// assert_eq!(clean_text(raw), "First line.\nSecond line.");
/// ```
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !DROPPED_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of whitespace-separated tokens
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Strips the first matching category prefix from a member title
///
/// Titles without any of the prefixes are returned unchanged.
pub fn strip_category_prefix<'a>(title: &'a str, prefixes: &[String]) -> &'a str {
    prefixes
        .iter()
        .find_map(|prefix| title.strip_prefix(prefix.as_str()))
        .unwrap_or(title)
}

/// Builds the article URL used when the API omits `fullurl`
///
/// The site root is taken from the API endpoint (`https://host/w/api.php`
/// becomes `https://host/wiki/Title_With_Underscores`).
pub fn fallback_article_url(base_url: &str, title: &str) -> String {
    let slug = title.replace(' ', "_");
    match url::Url::parse(base_url) {
        Ok(url) => format!("{}/wiki/{}", url.origin().ascii_serialization(), slug),
        Err(_) => format!("/wiki/{}", slug),
    }
}
