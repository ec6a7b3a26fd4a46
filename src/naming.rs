//! Identifier → flag name normalization

/// Convert an identifier such as `podId` or `HTTPStatus` into a kebab-case
/// flag name (`pod-id`, `http-status`).
///
/// A `-` is inserted where a lowercase or digit run meets an uppercase
/// letter, and before an uppercase letter that starts a capitalized word.
/// Existing `-` and `_` separators are kept as they are. Idempotent.
pub fn to_kebab_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let ends_run = prev.is_lowercase() || prev.is_ascii_digit();
            let starts_word = next_is_lower && !is_separator(prev);
            if ends_run || starts_word {
                result.push('-');
            }
        }
        result.extend(c.to_lowercase());
    }
    result
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_'
}
