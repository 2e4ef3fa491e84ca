//! Registration input validation: password strength and email shape.

use std::fmt;

use regex::Regex;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

const SPECIAL_CHARS: &str = "!@#$%^&*()-_+=";

/// The character class a rejected password is missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordClass {
    Length,
    Digit,
    Lowercase,
    Uppercase,
    Symbol,
}

impl fmt::Display for PasswordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Length => "minimum length of 8 characters",
            Self::Digit => "a digit",
            Self::Lowercase => "a lowercase letter",
            Self::Uppercase => "an uppercase letter",
            Self::Symbol => "a special character",
        };
        f.write_str(text)
    }
}

/// Check password strength, reporting the first missing class.
///
/// # Errors
/// Returns the [`PasswordClass`] the password lacks.
pub(crate) fn check_password_strength(password: &str) -> Result<(), PasswordClass> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordClass::Length);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordClass::Digit);
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(PasswordClass::Lowercase);
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(PasswordClass::Uppercase);
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PasswordClass::Symbol);
    }
    Ok(())
}

/// Normalize an email for storage and uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input: local part, domain,
/// and a required top-level label.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}
