//! Flows and intent handlers.
//!
//! A [`Flow`] is a named group of intent handlers covering one dialog topic.
//! Handlers receive the [`Conversation`] mutably together with the payload
//! they were dispatched with, and may speak, enqueue further intents with
//! [`Conversation::next`], or end the conversation.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! let quiz = Flow::new("quiz")
//!     .entry_point("welcome")
//!     .intent("welcome", handler_fn(|conv, _payload| {
//!         Box::pin(async move {
//!             conv.say("quiz_welcome_*");
//!             conv.next_with(":ask", Value::Null)?;
//!             Ok(())
//!         })
//!     }));
//! ```

mod address;

pub use address::{DEFAULT_ENTRY_POINT, INTENT_DELIMITER, IntentAddress};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::conversation::Conversation;
use crate::error::{ConfigError, Result};

/// Future returned by closure handlers.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<()>>;

/// A unit of dialog logic, invoked when its intent is dispatched.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Advance the conversation.
    ///
    /// # Errors
    ///
    /// Any error aborts the turn: the remaining queue is discarded and no
    /// response is sent.
    async fn handle(&self, conversation: &mut Conversation, payload: Value) -> Result<()>;
}

/// A shared, type-erased intent handler.
pub type SharedHandler = Arc<dyn IntentHandler>;

/// Adapter turning a closure into an [`IntentHandler`].
pub struct FnHandler<F>(F);

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> IntentHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Conversation, Value) -> HandlerFuture<'a> + Send + Sync,
{
    async fn handle(&self, conversation: &mut Conversation, payload: Value) -> Result<()> {
        (self.0)(conversation, payload).await
    }
}

/// Wrap a closure returning a boxed future as an intent handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Conversation, Value) -> HandlerFuture<'a> + Send + Sync,
{
    FnHandler(f)
}

/// A named group of intent handlers.
#[derive(Clone)]
pub struct Flow {
    name: String,
    entry_point: Option<String>,
    intents: HashMap<String, SharedHandler>,
}

impl Flow {
    /// Create an empty flow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_point: None,
            intents: HashMap::new(),
        }
    }

    /// Set the intent dispatched when an address names only this flow.
    #[must_use]
    pub fn entry_point(mut self, intent: impl Into<String>) -> Self {
        self.entry_point = Some(intent.into());
        self
    }

    /// Register a handler under an intent name, replacing any previous one.
    #[must_use]
    pub fn intent(mut self, name: impl Into<String>, handler: impl IntentHandler + 'static) -> Self {
        self.intents.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register an already shared handler.
    #[must_use]
    pub fn shared_intent(mut self, name: impl Into<String>, handler: SharedHandler) -> Self {
        self.intents.insert(name.into(), handler);
        self
    }

    /// The flow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry point intent, falling back to [`DEFAULT_ENTRY_POINT`].
    #[must_use]
    pub fn entry_intent(&self) -> &str {
        self.entry_point.as_deref().unwrap_or(DEFAULT_ENTRY_POINT)
    }

    /// Look up a handler.
    #[must_use]
    pub fn handler(&self, intent: &str) -> Option<&SharedHandler> {
        self.intents.get(intent)
    }

    /// Names of all registered intents.
    #[must_use]
    pub fn intent_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.intents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("entry_point", &self.entry_point)
            .field("intents", &self.intent_names())
            .finish()
    }
}

/// All flows of a skill, by name.
#[derive(Clone, Default)]
pub struct FlowTable {
    flows: HashMap<String, Flow>,
}

impl FlowTable {
    /// Create an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flow.
    ///
    /// # Panics
    ///
    /// Panics if a flow with the same name already exists.
    #[track_caller]
    pub fn add(&mut self, flow: Flow) {
        let name = flow.name().to_string();
        assert!(
            !self.flows.contains_key(&name),
            "Flow with name '{name}' already exists"
        );
        self.flows.insert(name, flow);
    }

    /// Add a flow, returning an error if the name is taken.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on a duplicate flow name.
    pub fn try_add(&mut self, flow: Flow) -> std::result::Result<(), ConfigError> {
        use std::collections::hash_map::Entry;

        match self.flows.entry(flow.name().to_string()) {
            Entry::Occupied(e) => Err(ConfigError::invalid(format!(
                "Flow with name '{}' already exists",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(flow);
                Ok(())
            }
        }
    }

    /// Builder-style [`add`](Self::add).
    ///
    /// # Panics
    ///
    /// Panics if a flow with the same name already exists.
    #[must_use]
    #[track_caller]
    pub fn with(mut self, flow: Flow) -> Self {
        self.add(flow);
        self
    }

    /// Get a flow by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Flow> {
        self.flows.get(name)
    }

    /// Look up the handler at `flow:intent`.
    #[must_use]
    pub fn handler(&self, flow: &str, intent: &str) -> Option<SharedHandler> {
        self.flows
            .get(flow)
            .and_then(|f| f.handler(intent))
            .map(Arc::clone)
    }

    /// Check if a flow exists.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.flows.contains_key(name)
    }

    /// Get the number of flows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Check if the table is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Get the names of all flows.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.flows.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for FlowTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowTable")
            .field("flows", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl IntentHandler for Noop {
        async fn handle(&self, _conversation: &mut Conversation, _payload: Value) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_flow_entry_point() {
        let flow = Flow::new("quiz").intent("start", Noop);
        assert_eq!(flow.entry_intent(), DEFAULT_ENTRY_POINT);

        let flow = flow.entry_point("welcome");
        assert_eq!(flow.entry_intent(), "welcome");
        assert!(flow.handler("start").is_some());
        assert!(flow.handler("welcome").is_none());
    }

    #[test]
    fn test_table_lookup() {
        let table = FlowTable::new()
            .with(Flow::new("quiz").intent("ask", Noop))
            .with(
                Flow::new("menu").intent("start", handler_fn(|_conv, _payload| {
                    Box::pin(async move { Ok(()) })
                })),
            );

        assert_eq!(table.len(), 2);
        assert!(table.contains("menu"));
        assert!(table.handler("quiz", "ask").is_some());
        assert!(table.handler("quiz", "nope").is_none());
        assert!(table.handler("nope", "ask").is_none());
    }

    #[test]
    fn test_try_add_duplicate() {
        let mut table = FlowTable::new();
        table.try_add(Flow::new("quiz")).unwrap();
        assert!(table.try_add(Flow::new("quiz")).is_err());
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn test_add_duplicate_panics() {
        let mut table = FlowTable::new();
        table.add(Flow::new("quiz"));
        table.add(Flow::new("quiz"));
    }

    #[test]
    fn test_flow_debug_lists_intents() {
        let flow = Flow::new("quiz").intent("b", Noop).intent("a", Noop);
        let debug = format!("{flow:?}");
        assert!(debug.contains(r#"["a", "b"]"#));
    }
}
