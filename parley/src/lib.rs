#![cfg_attr(docsrs, feature(doc_cfg))]
//! Parley is a conversation-state manager for voice assistant skills.
//!
//! A skill is a set of [`Flow`]s, each a named group of intent handlers. One
//! user turn is one [`Conversation`]: the router dispatches an intent with
//! [`Conversation::next`], [`Conversation::handle_intent`] runs the queued
//! handlers in order (handlers may dispatch more), and the buffered speech,
//! cards and suggestion chips are flushed through a [`Platform`] adapter.
//!
//! Speech comes from per-locale dialog tables with wildcard keys and
//! anti-repetition of variants; chip labels and other UI strings come from
//! translation trees rendered by a [`TemplateRenderer`](i18n::TemplateRenderer).
//!
//! The [`platform::dialogflow`] adapter renders Dialogflow / Actions on Google
//! fulfillment responses.

pub mod config;
pub mod conversation;
pub mod dialog;
pub mod error;
pub mod flow;
pub mod i18n;
pub mod platform;
pub mod prelude;
pub mod response;
pub mod session;
pub mod skill;
pub mod tracking;

pub use config::Config;
pub use conversation::Conversation;
pub use error::{ConfigError, Error, Result};
pub use flow::{Flow, FlowTable, IntentHandler, handler_fn};
pub use platform::Platform;
pub use skill::{Skill, SkillBuilder};
