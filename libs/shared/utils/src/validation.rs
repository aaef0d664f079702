use std::sync::OnceLock;

use regex::Regex;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

fn phone_regex() -> Option<&'static Regex> {
    static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
    PHONE
        .get_or_init(|| Regex::new(r"^\+?[0-9(][0-9\s\-\.\(\)]{5,19}$").ok())
        .as_ref()
}

pub fn validate_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_some_and(|re| re.is_match(email))
}

pub fn validate_phone(phone: &str) -> bool {
    phone_regex().is_some_and(|re| re.is_match(phone))
}

/// Trims a required text field, rejecting blanks.
pub fn require_text(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(validate_email("ada@example.com"));
        assert!(validate_email("first.last+tag@clinic.co.uk"));
        assert!(!validate_email("ada@"));
        assert!(!validate_email("not an email"));
    }

    #[test]
    fn phones() {
        assert!(validate_phone("+353 1 234 5678"));
        assert!(validate_phone("(01) 555-0100"));
        assert!(!validate_phone("call me"));
    }

    #[test]
    fn required_text_is_trimmed() {
        assert_eq!(require_text("name", "  Cardiology ").unwrap(), "Cardiology");
        assert_eq!(require_text("name", "   ").unwrap_err(), "name is required");
    }
}
