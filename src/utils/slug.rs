use unicode_normalization::UnicodeNormalization;

/// Derive a URL-safe identifier from a title or name.
///
/// Accents are decomposed and dropped, everything except ASCII
/// alphanumerics, underscores, hyphens and spaces is removed, and runs of
/// whitespace/hyphens collapse to a single hyphen.
pub fn slugify(value: &str) -> String {
    let ascii: String = value
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase();

    let cleaned: String = ascii
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect();

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_sep = false;
    for c in cleaned.chars() {
        if c == ' ' || c == '-' {
            if !slug.is_empty() {
                pending_sep = true;
            }
        } else {
            if pending_sep {
                slug.push('-');
                pending_sep = false;
            }
            slug.push(c);
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}
