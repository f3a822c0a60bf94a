//! Unified error types for parley.
//!
//! Every variant except [`ConfigError`] is fatal to the current turn: it
//! propagates out of the call that raised it, the remaining intent queue is
//! discarded and no response is flushed. Missing translations are not errors;
//! they are logged and the lookup path is spoken verbatim.

use std::time::Duration;

/// Result type alias for parley operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for parley.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Address resolution defaulted to a flow that is not declared.
    #[error("Target flow not found: \"{flow}\"")]
    FlowNotFound {
        /// The flow name that failed to resolve.
        flow: String,
    },

    /// The resolved address has no registered handler.
    #[error("Target intent not found: \"{address}\"")]
    HandlerNotFound {
        /// The fully-qualified `flow:intent` address.
        address: String,
    },

    /// `return_to_previous` was called with an empty return stack.
    #[error("return called but no return intent set")]
    NoReturnTarget,

    /// `handle_confirmation` was called with an option that was never offered.
    #[error("Unknown confirmation option: \"{0}\"")]
    UnknownConfirmationOption(String),

    /// A handler ran past the configured turn deadline.
    #[error("Handler \"{address}\" did not finish within {timeout:?}")]
    HandlerTimeout {
        /// Address of the handler that overran.
        address: String,
        /// The configured deadline.
        timeout: Duration,
    },

    /// An intent handler reported a failure.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Reserved session fields could not be decoded or encoded.
    #[error("Session error: {0}")]
    Session(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The platform adapter rejected the response.
    #[error("Platform error: {0}")]
    Platform(String),
}

impl Error {
    /// Create a handler error with a message.
    #[must_use]
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Create a platform error with a message.
    #[must_use]
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a flow-not-found error.
    #[must_use]
    pub fn flow_not_found(flow: impl Into<String>) -> Self {
        Self::FlowNotFound { flow: flow.into() }
    }

    /// Create a handler-not-found error.
    #[must_use]
    pub fn handler_not_found(address: impl Into<String>) -> Self {
        Self::HandlerNotFound {
            address: address.into(),
        }
    }

    /// Returns `true` for errors caused by a wrong intent address.
    #[must_use]
    pub const fn is_addressing(&self) -> bool {
        matches!(
            self,
            Self::FlowNotFound { .. } | Self::HandlerNotFound { .. } | Self::NoReturnTarget
        )
    }
}

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config document is not valid JSON for [`Config`](crate::config::Config).
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The config parsed but is inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an invalid-config error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
