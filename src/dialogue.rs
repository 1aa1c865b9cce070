//! Conversation state for the new-customer wizard and the search prompt.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::commands::{parse_phone, ParseError};

/// Maximum length of a customer display name
pub const MAX_NAME_LENGTH: usize = 64;

/// A subscription added during the current wizard run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSale {
    pub platform: String,
    pub email: String,
}

/// Represents the conversation state of one chat
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardState {
    /// No wizard running
    #[default]
    Idle,
    AwaitingPhone,
    AwaitingName {
        phone: String,
    },
    AwaitingPlatformChoice {
        phone: String,
        name: String,
        sales: Vec<WizardSale>,
    },
    AwaitingEmailChoice {
        phone: String,
        name: String,
        platform: String,
        sales: Vec<WizardSale>,
    },
    /// "Buscar" was pressed; the next text is the search term
    AwaitingSearchTerm,
}

/// Type alias for our wizard dialogue
pub type WizardDialogue = Dialogue<WizardState, InMemStorage<WizardState>>;

/// Validates a phone number typed during the wizard
pub fn validate_phone(input: &str) -> Result<String, ParseError> {
    parse_phone(input.trim())
}

/// Validates a customer name
pub fn validate_name(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.starts_with('/') {
        return Err("command");
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(validate_name("Ana María").is_ok());
        assert_eq!(validate_name(""), Err("empty"));
        assert_eq!(validate_name("   "), Err("empty"));
        assert_eq!(validate_name("/start"), Err("command"));
        assert_eq!(validate_name(&"a".repeat(65)), Err("too_long"));
    }

    #[test]
    fn test_name_trimming() {
        assert_eq!(validate_name("  Luis  ").unwrap(), "Luis");
    }
}
