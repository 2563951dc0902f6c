//! Field checks applied before values reach the store

use crate::error::{AuthError, AuthResult};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").ok());

static PHONE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\+?[0-9\s]*$").ok());

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().map_or(false, |re| re.is_match(email))
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.as_ref().map_or(false, |re| re.is_match(phone))
}

pub fn validate_email(email: &str) -> AuthResult<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AuthError::validation(format!("invalid email address '{}'", email)))
    }
}

pub fn validate_phone(phone: &str) -> AuthResult<()> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(AuthError::validation(format!("invalid phone number '{}'", phone)))
    }
}

/// Rejects empty and whitespace-only values
pub fn validate_not_empty(field: &str, value: &str) -> AuthResult<()> {
    if value.trim().is_empty() {
        Err(AuthError::validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Parses `YYYY-MM-DD HH:MM:SS`
pub fn parse_datetime(value: &str) -> AuthResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT).map_err(|_| {
        AuthError::validation(format!(
            "invalid date and time '{}', expected YYYY-MM-DD HH:MM:SS",
            value
        ))
    })
}

/// Parses `YYYY-MM-DD`
pub fn parse_date(value: &str) -> AuthResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AuthError::validation(format!("invalid date '{}', expected YYYY-MM-DD", value)))
}

/// Amounts are finite and non-negative
pub fn validate_amount(field: &str, amount: f64) -> AuthResult<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(AuthError::validation(format!("{} must be a non-negative amount", field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("john.doe@epicevents.com"));
        assert!(is_valid_email("kevin+crm@startup.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(is_valid_phone("+678 123 456 78"));
        assert!(is_valid_phone("0102030405"));
        assert!(!is_valid_phone("call me"));
        assert!(matches!(validate_phone("12-34"), Err(AuthError::Validation(_))));
    }

    #[test]
    fn test_not_empty() {
        assert!(validate_not_empty("name", "Kevin").is_ok());
        assert!(validate_not_empty("name", "   ").is_err());
    }

    #[test]
    fn test_dates() {
        let parsed = parse_datetime("2023-06-04 13:00:00").unwrap();
        assert_eq!(parsed.format(DATETIME_FORMAT).to_string(), "2023-06-04 13:00:00");
        assert!(parse_datetime("2023-06-04").is_err());
        assert!(parse_datetime("04/06/2023 13:00").is_err());
        assert!(parse_date("2023-02-30").is_err());
        assert!(parse_date("2023-02-28").is_ok());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_amount("total_amount", 0.0).is_ok());
        assert!(validate_amount("total_amount", -1.0).is_err());
        assert!(validate_amount("amount_due", f64::NAN).is_err());
    }
}
