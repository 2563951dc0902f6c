use crate::gateway::TokenStatus;
use std::fmt;

/// The one message shown for every refusal, whatever its cause
pub const DENIED_MESSAGE: &str = "This action is not permitted or the record does not exist.";

/// Why an operation was refused. Kept inside the crate so callers cannot
/// tell a missing record from one they may not touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DenialReason {
    Authorization,
    Ownership,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denied {
    pub(crate) reason: DenialReason,
}

impl Denied {
    pub(crate) fn new(reason: DenialReason) -> Self {
        Self { reason }
    }

    pub fn message(&self) -> &'static str {
        DENIED_MESSAGE
    }
}

impl fmt::Display for Denied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(DENIED_MESSAGE)
    }
}

/// Expected result of a business operation. Unexpected failures
/// (persistence, crypto) are returned as `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    /// Refused by the department gate, the ownership layer, or because the
    /// target does not exist
    Denied(Denied),
    /// No usable session; `Expired` means a refresh may help
    SessionRequired(TokenStatus),
    /// Input failed validation
    Rejected(String),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Outcome::Denied(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Denied(denied) => Outcome::Denied(denied),
            Outcome::SessionRequired(status) => Outcome::SessionRequired(status),
            Outcome::Rejected(message) => Outcome::Rejected(message),
        }
    }

    /// User-facing text for anything but success
    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Denied(denied) => Some(denied.message().to_string()),
            Outcome::SessionRequired(TokenStatus::Expired) => {
                Some("Your session has expired. Please refresh your token.".to_string())
            }
            Outcome::SessionRequired(_) => Some("Please log in first.".to_string()),
            Outcome::Rejected(message) => Some(message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_denials_read_the_same() {
        let messages: Vec<String> = [
            DenialReason::Authorization,
            DenialReason::Ownership,
            DenialReason::NotFound,
        ]
        .into_iter()
        .map(|reason| Outcome::<()>::Denied(Denied::new(reason)).message().unwrap())
        .collect();
        assert!(messages.iter().all(|m| m == DENIED_MESSAGE));
    }

    #[test]
    fn test_map_preserves_non_completed_variants() {
        let outcome: Outcome<u32> = Outcome::SessionRequired(TokenStatus::Expired);
        assert_eq!(outcome.map(|v| v + 1), Outcome::SessionRequired(TokenStatus::Expired));
        assert_eq!(Outcome::Completed(1).map(|v| v + 1).completed(), Some(2));
    }
}
