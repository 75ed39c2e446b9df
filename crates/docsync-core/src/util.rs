//! Shared utility functions used across multiple modules.

use crate::error::{Error, Result};

/// Longest identifier accepted from callers.
const MAX_IDENTIFIER_LEN: usize = 256;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Validate a caller-supplied identifier and return its trimmed form.
///
/// `field` names the argument in the error message.
pub fn require_identifier(value: &str, field: &str) -> Result<String> {
    let Some(value) = normalize_text_option(Some(value.to_string())) else {
        return Err(Error::InvalidInput(format!("{field} must not be empty")));
    };
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidInput(format!(
            "{field} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::InvalidInput(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(value)
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" doc-1 ".to_string())),
            Some("doc-1".to_string())
        );
    }

    #[test]
    fn require_identifier_trims_and_validates() {
        assert_eq!(require_identifier("  d1 ", "document_id").unwrap(), "d1");

        let empty = require_identifier(" ", "document_id").unwrap_err();
        assert!(empty.to_string().contains("document_id must not be empty"));

        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(require_identifier(&long, "user_id").is_err());
        assert!(require_identifier("a\u{0}b", "user_id").is_err());
    }

    #[test]
    fn compact_text_truncates() {
        let long = "e".repeat(400);
        assert_eq!(compact_text(&long).len(), 180);
        assert_eq!(compact_text("  short  "), "short");
    }
}
