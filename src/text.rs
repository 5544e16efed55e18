//! Text helpers shared by ingestion and notification building.

/// Characters replaced during slug generation, paired by position with `SLUG_TO`.
const SLUG_FROM: &str = "àáäâèéëêìíïîòóöôùúüûñç·/_,:;";
const SLUG_TO: &str = "aaaaeeeeiiiioooouuuunc------";

/// Turn an article title into a URL-safe slug.
///
/// Lowercases, swaps common accented characters for their ASCII
/// counterparts, drops everything outside `[a-z0-9 -]` and collapses
/// spaces and dash runs into single dashes.
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();

    let mapped: String = lowered
        .chars()
        .map(|c| {
            SLUG_FROM
                .chars()
                .position(|f| f == c)
                .and_then(|i| SLUG_TO.chars().nth(i))
                .unwrap_or(c)
        })
        .collect();

    let mut slug = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        let c = match c {
            'a'..='z' | '0'..='9' => c,
            ' ' | '-' => '-',
            _ => continue,
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    slug
}

/// Truncate a string to at most `n` characters, cutting at a word
/// boundary and terminating with an ellipsis.
///
/// Strings that already fit are returned unchanged. Otherwise the first
/// `n - 1` characters are taken, cut back to the last space within that
/// window (or shortened by one character when there is none).
pub fn truncate(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }

    let mut sub: String = s.chars().take(n.saturating_sub(1)).collect();

    match sub.rfind(' ') {
        Some(i) => sub.truncate(i),
        None => {
            sub.pop();
        }
    }

    sub.push('…');
    sub
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("The Quick Brown Fox!"), "the-quick-brown-fox");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("a/b_c,d:e;f"), "a-b-c-d-e-f");
    }

    #[test]
    fn slugify_accents() {
        assert_eq!(slugify("Café München señal"), "cafe-munchen-senal");
    }

    #[test]
    fn truncate_short_strings_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
    }

    #[test]
    fn truncate_cuts_at_word_boundary() {
        let out = truncate("The quick brown fox jumps", 11);
        assert_eq!(out, "The quick…");
        assert!(out.chars().count() <= 11);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn truncate_without_spaces_drops_one_char() {
        let out = truncate("abcdefghij", 5);
        assert_eq!(out, "abc…");
    }
}
