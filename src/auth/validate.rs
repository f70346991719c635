use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$").unwrap());

// +2547XXXXXXXX or 07XXXXXXXX
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\+2547\d{8}|07\d{8})$").unwrap());

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

pub fn is_phone(value: &str) -> bool {
    PHONE.is_match(value)
}

/// `"date_of_birth"` -> `"Date of birth"`, for "... is required" messages.
pub fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern() {
        assert!(is_email("jane.doe+clinic@mail.example.com"));
        assert!(!is_email("jane@localhost"));
        assert!(!is_email("not an email"));
    }

    #[test]
    fn phone_pattern() {
        assert!(is_phone("0712345678"));
        assert!(is_phone("+254712345678"));
        assert!(!is_phone("071234567"));
        assert!(!is_phone("+254812345678"));
        assert!(!is_phone("0812345678"));
    }

    #[test]
    fn humanizes_field_names() {
        assert_eq!(humanize("date_of_birth"), "Date of birth");
        assert_eq!(humanize("email"), "Email");
    }
}
