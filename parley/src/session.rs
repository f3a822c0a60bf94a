//! Session and user storage.
//!
//! Both stores are plain JSON maps owned by the platform and persisted by the
//! caller between turns. The engine keeps its own bookkeeping under reserved
//! `__`-prefixed session keys; those are decoded into a typed
//! [`SessionState`] when a conversation starts and encoded back when the
//! response is sent. Every other key belongs to the skill.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// A key-value store as supplied by the platform.
pub type DataMap = serde_json::Map<String, Value>;

/// User-store key holding the generated user identifier.
pub const USER_ID_KEY: &str = "id";

/// Number of dispatch payloads kept in the session.
pub const MAX_PAYLOAD_HISTORY: usize = 20;

/// Session keys owned by the engine.
pub const RESERVED_KEYS: [&str; 12] = [
    "__repromptCount",
    "__flow",
    "__timesInputRepeated",
    "__context",
    "__previousContext",
    "__lastSpeech",
    "__lastSuggestions",
    "__lastVariants",
    "__permissionCallbacks",
    "__confirmation",
    "__callbacks",
    "__payloads",
];

/// A spoken dialog key and the parameters it was rendered with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecord {
    /// Dialog key as passed to `say`.
    pub key: String,
    /// Substitution parameters, `null` when none were given.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl SpeechRecord {
    /// Create a record.
    #[must_use]
    pub fn new(key: impl Into<String>, params: Value) -> Self {
        Self {
            key: key.into(),
            params,
        }
    }

    /// Returns `true` when nothing was spoken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Targets dispatched after a permission prompt is answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCallbacks {
    /// Address dispatched when the permission is granted.
    pub granted: String,
    /// Address dispatched when the permission is denied.
    pub denied: String,
}

impl PermissionCallbacks {
    /// The target for the given answer.
    #[must_use]
    pub fn target(&self, granted: bool) -> &str {
        if granted { &self.granted } else { &self.denied }
    }
}

const fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Engine bookkeeping persisted in the session store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Times the skill has reprompted in a row.
    #[serde(rename = "__repromptCount", default, skip_serializing_if = "is_zero")]
    pub reprompt_count: u32,
    /// Flow of the last dispatched intent.
    #[serde(rename = "__flow", default, skip_serializing_if = "String::is_empty")]
    pub current_flow: String,
    /// Times the user repeated the same input.
    #[serde(
        rename = "__timesInputRepeated",
        default,
        skip_serializing_if = "is_zero"
    )]
    pub times_input_repeated: u32,
    /// Context the next user input is expected in.
    #[serde(rename = "__context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Context that was active before the last reset.
    #[serde(
        rename = "__previousContext",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_context: Option<String>,
    /// What was spoken last turn, for `repeat`.
    #[serde(
        rename = "__lastSpeech",
        default,
        skip_serializing_if = "SpeechRecord::is_empty"
    )]
    pub previous_speech: SpeechRecord,
    /// Suggestion chips offered last turn, for `repeat`.
    #[serde(
        rename = "__lastSuggestions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub previous_suggestions: Vec<String>,
    /// Last variant chosen per dialog key.
    #[serde(
        rename = "__lastVariants",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub last_variants: BTreeMap<String, String>,
    /// Pending permission prompt targets.
    #[serde(
        rename = "__permissionCallbacks",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub permission_callbacks: Option<PermissionCallbacks>,
    /// Pending confirmation option targets.
    #[serde(
        rename = "__confirmation",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub confirmation_callbacks: BTreeMap<String, String>,
    /// Return stack, innermost last.
    #[serde(rename = "__callbacks", default, skip_serializing_if = "Vec::is_empty")]
    pub return_directives: Vec<String>,
    /// Payloads of the most recent dispatches.
    #[serde(rename = "__payloads", default, skip_serializing_if = "Vec::is_empty")]
    pub payloads: Vec<Value>,
}

impl SessionState {
    /// Decode the reserved keys of a session store.
    ///
    /// Keys are decoded one by one. A key holding a value of the wrong shape
    /// is logged and reset to its default; counters also accept numeric
    /// strings.
    #[must_use]
    pub fn load(session: &DataMap) -> Self {
        Self {
            reprompt_count: counter(session, "__repromptCount"),
            current_flow: field(session, "__flow"),
            times_input_repeated: counter(session, "__timesInputRepeated"),
            context: field(session, "__context"),
            previous_context: field(session, "__previousContext"),
            previous_speech: field(session, "__lastSpeech"),
            previous_suggestions: field(session, "__lastSuggestions"),
            last_variants: field(session, "__lastVariants"),
            permission_callbacks: field(session, "__permissionCallbacks"),
            confirmation_callbacks: field(session, "__confirmation"),
            return_directives: field(session, "__callbacks"),
            payloads: field(session, "__payloads"),
        }
    }

    /// Encode into the reserved keys of a session store, leaving skill keys untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`](crate::Error::Session) if a payload cannot be encoded.
    pub fn store(&self, session: &mut DataMap) -> Result<()> {
        for key in RESERVED_KEYS {
            session.remove(key);
        }
        if let Value::Object(fields) = serde_json::to_value(self)? {
            session.extend(fields);
        }
        Ok(())
    }

    /// Record a dispatch payload, keeping only the most recent ones.
    pub fn push_payload(&mut self, payload: Value) {
        self.payloads.push(payload);
        if self.payloads.len() > MAX_PAYLOAD_HISTORY {
            let excess = self.payloads.len() - MAX_PAYLOAD_HISTORY;
            self.payloads.drain(0..excess);
        }
    }
}

fn field<T: DeserializeOwned + Default>(session: &DataMap, key: &str) -> T {
    match session.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => T::deserialize(value).unwrap_or_else(|error| {
            warn!(key = %key, error = %error, "resetting malformed session field");
            T::default()
        }),
    }
}

fn counter(session: &DataMap, key: &str) -> u32 {
    match session.get(key) {
        Some(Value::String(text)) => text.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %text, "resetting malformed session counter");
            0
        }),
        _ => field(session, key),
    }
}

/// Return the user's identifier, generating and storing one if absent.
pub fn ensure_user_id(user_data: &mut DataMap) -> String {
    match user_data.get(USER_ID_KEY) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(id @ Value::Number(_)) => id.to_string(),
        _ => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            debug!(user_id = %id, "assigned new user id");
            user_data.insert(USER_ID_KEY.to_string(), Value::String(id.clone()));
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> DataMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_load_empty() {
        let state = SessionState::load(&DataMap::new());
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_store_keeps_skill_keys() {
        let mut session = map(json!({ "score": 3, "__flow": "old" }));
        let state = SessionState {
            current_flow: "quiz".into(),
            context: Some("confirmation".into()),
            return_directives: vec!["menu:start".into()],
            ..SessionState::default()
        };
        state.store(&mut session).unwrap();

        assert_eq!(session["score"], json!(3));
        assert_eq!(session["__flow"], json!("quiz"));
        assert_eq!(session["__context"], json!("confirmation"));
        assert_eq!(session["__callbacks"], json!(["menu:start"]));
        assert!(!session.contains_key("__repromptCount"));

        let reloaded = SessionState::load(&session);
        assert_eq!(reloaded, state);
    }

    #[test]
    fn test_store_clears_dropped_fields() {
        let mut session = map(json!({ "__confirmation": { "yes": "a:b" } }));
        SessionState::default().store(&mut session).unwrap();
        assert!(session.is_empty());
    }

    #[test]
    fn test_load_resets_malformed_fields() {
        let session = map(json!({
            "__callbacks": "not-a-list",
            "__repromptCount": "2",
            "__timesInputRepeated": "many",
            "__flow": "quiz",
            "__permissionCallbacks": ["quiz:b", "menu:start"]
        }));
        let state = SessionState::load(&session);
        assert!(state.return_directives.is_empty());
        assert_eq!(state.reprompt_count, 2);
        assert_eq!(state.times_input_repeated, 0);
        assert_eq!(state.current_flow, "quiz");
        assert_eq!(state.permission_callbacks.unwrap().target(false), "menu:start");
    }

    #[test]
    fn test_payload_history_is_bounded() {
        let mut state = SessionState::default();
        for i in 0..(MAX_PAYLOAD_HISTORY + 5) {
            state.push_payload(json!(i));
        }
        assert_eq!(state.payloads.len(), MAX_PAYLOAD_HISTORY);
        assert_eq!(state.payloads[0], json!(5));
    }

    #[test]
    fn test_user_id_is_stable() {
        let mut user = DataMap::new();
        let first = ensure_user_id(&mut user);
        let second = ensure_user_id(&mut user);
        assert_eq!(first, second);
        assert_eq!(user[USER_ID_KEY], json!(first));

        let mut existing = map(json!({ "id": "abc" }));
        assert_eq!(ensure_user_id(&mut existing), "abc");
    }

    #[test]
    fn test_permission_target() {
        let callbacks = PermissionCallbacks {
            granted: "a:b".into(),
            denied: "a:c".into(),
        };
        assert_eq!(callbacks.target(true), "a:b");
        assert_eq!(callbacks.target(false), "a:c");
    }
}
