//! Field validators shared by service inputs.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use validator::ValidationError;

/// Usernames: letters, digits, dot, underscore and dash.
#[allow(clippy::unwrap_used)]
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Require lower and upper case letters, a digit and a symbol.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let lower = password.chars().any(char::is_lowercase);
    let upper = password.chars().any(char::is_uppercase);
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if long_enough && lower && upper && digit && symbol {
        Ok(())
    } else {
        Err(error(
            "password_strength",
            "Password must be at least 6 characters and contain upper and lower case letters, a number and a symbol",
        ))
    }
}

/// Restrict usernames to a URL- and log-safe character set.
pub fn username_charset(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(error(
            "username_charset",
            "Username may only contain letters, numbers, dots, underscores and dashes",
        ))
    }
}

/// Reject strings that are empty once trimmed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "Must not be empty"))
    } else {
        Ok(())
    }
}

/// Parse a client-supplied date: RFC 3339, or a bare `YYYY-MM-DD` taken as
/// midnight UTC.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().fixed_offset())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(password_strength("Passw0rd!").is_ok());
        assert!(password_strength("Aa1!").is_err());
        assert!(password_strength("password1!").is_err());
        assert!(password_strength("PASSWORD1!").is_err());
        assert!(password_strength("Password!").is_err());
        assert!(password_strength("Password1").is_err());
    }

    #[test]
    fn test_username_charset() {
        assert!(username_charset("records.office-2").is_ok());
        assert!(username_charset("two words").is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let day = parse_date("2024-03-05").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-03-05T00:00:00+00:00");

        let full = parse_date("2024-03-05T10:30:00+08:00").unwrap();
        assert_eq!(full.to_rfc3339(), "2024-03-05T10:30:00+08:00");

        assert!(parse_date("05/03/2024").is_none());
        assert!(parse_date("").is_none());
    }
}
