//! Ten-digit phone numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// No digits at all.
    #[error("phone number is required")]
    Empty,
    /// Wrong number of digits after stripping formatting.
    #[error("phone number must have exactly 10 digits (got {0})")]
    WrongLength(usize),
}

/// A phone number stored as exactly ten ASCII digits.
///
/// Everything that is not a digit (spaces, dashes, brackets, a leading `+`)
/// is stripped before the length check, so `"(987) 654-3210"` and
/// `"9876543210"` are the same number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Required digit count.
    pub const DIGITS: usize = 10;

    /// Strip formatting and validate the digit count.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::Empty`] when no digits remain and
    /// [`PhoneError::WrongLength`] for any count other than ten.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let digits = strip_non_digits(s);
        match digits.len() {
            0 => Err(PhoneError::Empty),
            Self::DIGITS => Ok(Self(digits)),
            n => Err(PhoneError::WrongLength(n)),
        }
    }

    /// The ten digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// E.164 form with the given country calling code, e.g. `+919876543210`.
    #[must_use]
    pub fn to_e164(&self, country_code: &str) -> String {
        format!("+{}{}", country_code.trim_start_matches('+'), self.0)
    }
}

/// Remove every character that is not an ASCII digit.
#[must_use]
pub fn strip_non_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_formatting() {
        let phone = PhoneNumber::parse("(987) 654-3210").unwrap();
        assert_eq!(phone.as_str(), "9876543210");
    }

    #[test]
    fn test_wrong_lengths() {
        assert_eq!(PhoneNumber::parse(""), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("abc"), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("12345"), Err(PhoneError::WrongLength(5)));
        assert_eq!(
            PhoneNumber::parse("+91 98765 43210"),
            Err(PhoneError::WrongLength(12))
        );
    }

    #[test]
    fn test_e164() {
        let phone = PhoneNumber::parse("98765-43210").unwrap();
        assert_eq!(phone.to_e164("91"), "+919876543210");
        assert_eq!(phone.to_e164("+91"), "+919876543210");
    }
}
