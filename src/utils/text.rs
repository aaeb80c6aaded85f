use regex::Regex;
use std::sync::OnceLock;

fn like_metachars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\\%_])").expect("static pattern"))
}

/// Wraps `needle` into an `ILIKE` pattern matching it as a literal substring.
pub fn like_pattern(needle: &str) -> String {
    let escaped = like_metachars().replace_all(needle, r"\$1");
    format!("%{}%", escaped)
}

/// In-memory counterpart of `haystack ILIKE like_pattern(needle)`.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
