//! Intent addresses.
//!
//! Intents are addressed as `flow:intent`. Either part may be left empty:
//! `":intent"` targets an intent of the current flow and `"flow:"` (or just
//! `"flow"`) targets the flow's entry point.

use std::fmt;

/// Separator between the flow and intent parts of an address.
pub const INTENT_DELIMITER: &str = ":";

/// Intent name used when a flow declares no entry point.
pub const DEFAULT_ENTRY_POINT: &str = "start";

/// A possibly partial intent address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IntentAddress {
    /// Flow part, empty when omitted.
    pub flow: String,
    /// Intent part, empty when omitted.
    pub intent: String,
}

impl IntentAddress {
    /// Create an address from its parts.
    #[must_use]
    pub fn new(flow: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            intent: intent.into(),
        }
    }

    /// Split an address on the first delimiter.
    #[must_use]
    pub fn parse(address: &str) -> Self {
        match address.split_once(INTENT_DELIMITER) {
            Some((flow, intent)) => Self::new(flow, intent),
            None => Self::new(address, ""),
        }
    }

    /// Returns `true` when both parts are present.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        !self.flow.is_empty() && !self.intent.is_empty()
    }
}

impl fmt::Display for IntentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{INTENT_DELIMITER}{}", self.flow, self.intent)
    }
}

impl From<&str> for IntentAddress {
    fn from(address: &str) -> Self {
        Self::parse(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(IntentAddress::parse("quiz:ask"), IntentAddress::new("quiz", "ask"));
        assert_eq!(IntentAddress::parse("quiz:"), IntentAddress::new("quiz", ""));
        assert_eq!(IntentAddress::parse(":ask"), IntentAddress::new("", "ask"));
        assert_eq!(IntentAddress::parse("quiz"), IntentAddress::new("quiz", ""));
        assert_eq!(IntentAddress::parse(""), IntentAddress::default());
    }

    #[test]
    fn test_display_round_trip() {
        let address = IntentAddress::parse("quiz:ask");
        assert!(address.is_qualified());
        assert_eq!(address.to_string(), "quiz:ask");
        assert!(!IntentAddress::parse(":ask").is_qualified());
    }
}
