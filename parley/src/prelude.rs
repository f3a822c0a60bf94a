//! Common imports for writing skills.
//!
//! ```rust,ignore
//! use parley::prelude::*;
//! ```

pub use std::sync::Arc;

pub use serde_json::{Value, json};

pub use crate::config::Config;
pub use crate::conversation::{CardContent, Conversation};
pub use crate::error::{Error, Result};
pub use crate::flow::{Flow, FlowTable, HandlerFuture, IntentHandler, handler_fn};
pub use crate::platform::Platform;
pub use crate::platform::dialogflow::{ConversationObject, DialogflowPlatform, WebhookConversation};
pub use crate::response::{Button, Capability, ListItem, Permission};
pub use crate::skill::Skill;
pub use crate::tracking::{LogTracker, Tracker};
