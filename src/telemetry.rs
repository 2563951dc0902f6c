//! Fire-and-forget sink for unexpected failures

use crate::error::AuthError;
use log::error;

/// Receives every unexpected error the gateway encounters. Implementations
/// must not fail or block for long.
pub trait ErrorSink: Send + Sync {
    fn capture(&self, error: &AuthError, context: &str);
}

/// Forwards captured errors to the log, tagged with the configured DSN
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    dsn: Option<String>,
}

impl LogSink {
    pub fn new(dsn: Option<String>) -> Self {
        Self { dsn }
    }

    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }
}

impl ErrorSink for LogSink {
    fn capture(&self, error: &AuthError, context: &str) {
        match &self.dsn {
            Some(dsn) => error!("[telemetry {}] {}: {}", dsn, context, error),
            None => error!("[telemetry] {}: {}", context, error),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_never_fails() {
        crate::logging::init_test_logging();
        let sink = LogSink::new(Some("https://telemetry.example/1".to_string()));
        sink.capture(&AuthError::persistence("disk full"), "login");
        LogSink::default().capture(&AuthError::NoActiveSession, "logout");
        assert_eq!(sink.dsn(), Some("https://telemetry.example/1"));
    }
}
