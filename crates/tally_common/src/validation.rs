//! Input validation at the UI boundary
//!
//! Rejects malformed input synchronously, before any write is attempted.

use crate::{Result, TallyError};
use regex::Regex;
use std::sync::OnceLock;

static DIGITS: OnceLock<Regex> = OnceLock::new();

fn digits() -> &'static Regex {
    DIGITS.get_or_init(|| Regex::new(r"^\d+$").expect("static regex"))
}

/// Validate a customer reference number, returning it trimmed
pub fn customer_number(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TallyError::ValidationError(
            "Please enter customer number".to_string(),
        ));
    }
    if !digits().is_match(trimmed) {
        return Err(TallyError::ValidationError(
            "Please enter numbers only".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// True when the name has at least a first and a last part
pub fn is_full_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

/// Validate a profile display name, returning it trimmed
pub fn full_name(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if !is_full_name(trimmed) {
        return Err(TallyError::ValidationError(
            "Please enter a valid full name (First and Last). Both are required.".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_number() {
        assert_eq!(customer_number(" 10234 ").unwrap(), "10234");
        assert!(customer_number("").is_err());
        assert!(customer_number("   ").is_err());
        assert!(customer_number("12a4").is_err());
        assert!(customer_number("-12").is_err());
    }

    #[test]
    fn test_customer_number_messages() {
        let empty = customer_number("").unwrap_err().to_string();
        assert!(empty.contains("Please enter customer number"));

        let letters = customer_number("abc").unwrap_err().to_string();
        assert!(letters.contains("numbers only"));
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name("  Sara   Ali ").unwrap(), "Sara   Ali");
        assert!(full_name("Sara").is_err());
        assert!(full_name("").is_err());
        assert!(is_full_name("Omar bin Khalid"));
    }
}
