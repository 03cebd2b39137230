//! Best-effort normalization of user-entered phone numbers to E.164.
//!
//! Known limitation: no numbering-plan validation is performed. A number that
//! normalizes cleanly can still be undialable; the provider reports that on
//! call creation.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COUNTRY_CODE: &str = "91";

const NATIONAL_NUMBER_DIGITS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneFormatter {
    country_code: String,
}

impl Default for PhoneFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTRY_CODE)
    }
}

impl PhoneFormatter {
    pub fn new(country_code: impl Into<String>) -> Self {
        let country_code: String =
            country_code.into().chars().filter(char::is_ascii_digit).collect();
        Self { country_code }
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Returns `None` when the input holds no digits at all. Only the digits
    /// are considered, so a leading `+` does not exempt a ten-digit number
    /// from the default country code.
    pub fn format(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }

        if digits.len() == NATIONAL_NUMBER_DIGITS {
            return Some(format!("+{}{digits}", self.country_code));
        }

        if digits.starts_with(&self.country_code)
            && digits.len() == self.country_code.len() + NATIONAL_NUMBER_DIGITS
        {
            return Some(format!("+{digits}"));
        }

        // Already international or an unknown length: keep the digits as given.
        Some(format!("+{digits}"))
    }
}

#[cfg(test)]
mod tests {
    use super::PhoneFormatter;

    #[test]
    fn ten_digit_numbers_get_the_default_country_code() {
        let formatter = PhoneFormatter::default();
        assert_eq!(formatter.format("9876543210").as_deref(), Some("+919876543210"));
        assert_eq!(formatter.format("98765 43210").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn numbers_with_country_code_only_gain_a_plus() {
        let formatter = PhoneFormatter::default();
        assert_eq!(formatter.format("919876543210").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn plus_prefixed_numbers_keep_their_digits() {
        let formatter = PhoneFormatter::default();
        assert_eq!(formatter.format("+1 234 567 8901").as_deref(), Some("+12345678901"));
        assert_eq!(formatter.format("+91-9876543210").as_deref(), Some("+919876543210"));
        assert_eq!(formatter.format("+4420 7946 0958").as_deref(), Some("+442079460958"));
    }

    #[test]
    fn ten_digit_rule_applies_even_with_a_leading_plus() {
        let formatter = PhoneFormatter::default();
        assert_eq!(formatter.format("+9876543210").as_deref(), Some("+919876543210"));
        assert_eq!(formatter.format(" +98765-43210").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn other_lengths_fall_back_to_plus_digits() {
        let formatter = PhoneFormatter::default();
        assert_eq!(formatter.format("0044 20 7946 0958").as_deref(), Some("+00442079460958"));
        assert_eq!(formatter.format("12345").as_deref(), Some("+12345"));
    }

    #[test]
    fn input_without_digits_is_rejected() {
        let formatter = PhoneFormatter::default();
        assert_eq!(formatter.format(""), None);
        assert_eq!(formatter.format("n/a"), None);
    }

    #[test]
    fn country_code_is_configurable() {
        let formatter = PhoneFormatter::new("+1");
        assert_eq!(formatter.country_code(), "1");
        assert_eq!(formatter.format("(415) 555-0100").as_deref(), Some("+14155550100"));
    }
}
