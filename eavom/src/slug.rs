use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static slug pattern"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("static non-word pattern"));

/// Slugs double as lookup keys: lower case, leading letter, then letters, digits or underscores.
/// A leading underscore is rejected.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

/// Derives a slug from a display name: trims, lowercases, joins whitespace runs
/// with underscores and strips every remaining non-word character.
///
/// The result is not guaranteed to be valid (`"1st"` stays `"1st"`); callers validate it.
pub fn slug_from_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let joined = lowered.split_whitespace().collect::<Vec<_>>().join("_");
    NON_WORD.replace_all(&joined, "").into_owned()
}
