//! # Bot Error Types Module
//!
//! Error kinds surfaced by command handlers. Validation and not-found errors
//! are turned into chat replies; store errors are logged and reported with a
//! generic message.

use teloxide::dispatching::dialogue::InMemStorageError;

/// Errors produced while executing a chat command or callback
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Malformed command arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database call failed
    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),

    /// Telegram API call failed
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Dialogue storage failed
    #[error("Dialogue error: {0}")]
    Dialogue(String),
}

impl BotError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BotError::NotFound(what.into())
    }

    /// Whether the error is caused by the user's input rather than the system
    pub fn is_user_error(&self) -> bool {
        matches!(self, BotError::Validation(_) | BotError::NotFound(_))
    }
}

impl From<InMemStorageError> for BotError {
    fn from(err: InMemStorageError) -> Self {
        BotError::Dialogue(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        assert!(BotError::Validation("x".to_string()).is_user_error());
        assert!(BotError::not_found("555").is_user_error());
        assert!(!BotError::Dialogue("gone".to_string()).is_user_error());
    }

    #[test]
    fn test_storage_errors_are_system_errors() {
        let err = BotError::from(InMemStorageError::DialogueNotFound);
        assert!(matches!(err, BotError::Dialogue(_)));
        assert!(!err.is_user_error());

        let err = BotError::from(anyhow::anyhow!("connection refused"));
        assert!(matches!(err, BotError::Store(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_error_message_formatting() {
        let err = BotError::not_found("cliente 555");
        assert_eq!(err.to_string(), "Not found: cliente 555");
    }
}
