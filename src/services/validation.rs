use std::sync::OnceLock;

use regex::Regex;

use crate::error::{validation_errors, AppError, Result};

const ALLOWED_LANGUAGES: &[&str] = &["en", "en-us", "en-gb", "de", "de-de", "de-at", "de-ch"];

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(https?://)?(([\w.-]+(\.[\w.-]{2,4})+)|(localhost:[0-9]{3,4}))")
            .expect("url regex is valid")
    })
}

pub fn validate_name_length(name: &str) -> Option<&'static str> {
    if name.chars().count() < 2 {
        Some(validation_errors::NAME_TOO_SHORT)
    } else if name.chars().count() > 50 {
        Some(validation_errors::NAME_TOO_LONG)
    } else {
        None
    }
}

pub fn validate_description_length(description: &str) -> Option<&'static str> {
    if description.chars().count() < 2 {
        Some(validation_errors::DESCRIPTION_TOO_SHORT)
    } else if description.chars().count() > 400 {
        Some(validation_errors::DESCRIPTION_TOO_LONG)
    } else {
        None
    }
}

pub fn validate_url(url: &str) -> Option<&'static str> {
    if url.is_empty() || !url_regex().is_match(url) {
        Some(validation_errors::URL_INVALID)
    } else {
        None
    }
}

pub fn validate_logo_url(logo_url: &str) -> Option<&'static str> {
    if logo_url.is_empty() || !url_regex().is_match(logo_url) {
        Some(validation_errors::LOGO_URL_INVALID)
    } else {
        None
    }
}

pub fn validate_language(language: &str) -> Option<&'static str> {
    if ALLOWED_LANGUAGES.contains(&language) {
        None
    } else {
        Some(validation_errors::LANGUAGE_INVALID)
    }
}

/// Collects every failed check into one validation error, so callers see
/// all failing fields at once rather than the first.
pub fn check(results: &[Option<&'static str>]) -> Result<()> {
    let failed: Vec<&'static str> = results.iter().filter_map(|r| *r).collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_bounds() {
        assert_eq!(validate_name_length("a"), Some(validation_errors::NAME_TOO_SHORT));
        assert_eq!(validate_name_length(&"x".repeat(51)), Some(validation_errors::NAME_TOO_LONG));
        assert_eq!(validate_name_length("The Daily Example"), None);
    }

    #[test]
    fn url_shapes() {
        assert_eq!(validate_url("https://example.com/feed"), None);
        assert_eq!(validate_url("localhost:3000"), None);
        assert_eq!(validate_url("not a url"), Some(validation_errors::URL_INVALID));
        assert_eq!(validate_url(""), Some(validation_errors::URL_INVALID));
    }

    #[test]
    fn language_allow_list() {
        assert_eq!(validate_language("en"), None);
        assert_eq!(validate_language("de-at"), None);
        assert_eq!(validate_language("fr"), Some(validation_errors::LANGUAGE_INVALID));
    }

    #[test]
    fn check_collects_every_failure() {
        let err = check(&[
            validate_name_length("a"),
            validate_url("bad"),
            validate_language("en"),
        ])
        .unwrap_err();

        match err {
            AppError::Validation(codes) => {
                assert_eq!(
                    codes,
                    vec![
                        validation_errors::NAME_TOO_SHORT,
                        validation_errors::URL_INVALID
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
