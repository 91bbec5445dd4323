use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The broker could not be reached or the topology could not be declared.
    #[error("Startup failed for {exchange}: {reason}")]
    Startup { exchange: String, reason: String },

    #[error("Shutdown failed: {0}")]
    Shutdown(String),

    #[error("Message queue error: {0}")]
    MessageQueue(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn startup(exchange: &str, reason: impl Display) -> Self {
        Self::Startup {
            exchange: exchange.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort process startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_errors_are_fatal() {
        assert!(AppError::startup("lykke.wallet.transfer", "refused").is_fatal());
        assert!(!AppError::Decode("bad json".into()).is_fatal());
        assert!(!AppError::Handler("boom".into()).is_fatal());
        assert!(!AppError::Shutdown("close".into()).is_fatal());
    }

    #[test]
    fn startup_message_names_exchange() {
        let err = AppError::startup("lykke.wallet.bonusreceived", "connection refused");
        assert_eq!(
            err.to_string(),
            "Startup failed for lykke.wallet.bonusreceived: connection refused"
        );
    }

    #[test]
    fn startup_reason_keeps_source_error_text() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "port 1 closed");
        let err = AppError::startup("lykke.wallet.transfer", &source);
        assert_eq!(
            err.to_string(),
            "Startup failed for lykke.wallet.transfer: port 1 closed"
        );
    }
}
