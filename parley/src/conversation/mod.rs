//! The conversation engine.
//!
//! A [`Conversation`] lives for exactly one turn. It is created by a
//! [`Skill`](crate::skill::Skill) around a [`Platform`], decodes the engine's
//! session bookkeeping, runs the queued intent handlers and finally flushes the
//! buffered output back through the platform.
//!
//! The methods are split across three files:
//!
//! - this module: state accessors, output buffering, speech and translation,
//! - `dispatch`: intent addressing, the handler queue and the
//!   confirmation / permission / return protocol,
//! - `rich`: visual content and device capability queries.

mod dispatch;
mod rich;

pub use rich::CardContent;

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::dialog;
use crate::error::Result;
use crate::flow::FlowTable;
use crate::i18n::{self, TemplateRenderer};
use crate::platform::Platform;
use crate::response::{Fragment, TurnOutput};
use crate::session::{self, DataMap, SessionState, SpeechRecord};
use crate::tracking::{DataCollector, TrackedEvent, Tracker};

use dispatch::QueuedIntent;

/// Context set while waiting for a yes/no style answer.
pub const CONFIRMATION_CONTEXT: &str = "confirmation";

/// Context set while a permission prompt is pending.
pub const PERMISSION_CONTEXT: &str = "permission_confirmation";

/// Per-turn dialog state machine.
pub struct Conversation {
    config: Arc<Config>,
    flows: Arc<FlowTable>,
    renderer: Arc<dyn TemplateRenderer>,
    tracker: Option<Arc<dyn Tracker>>,
    data_collector: Option<DataCollector>,
    platform: Box<dyn Platform>,
    state: SessionState,
    locale: String,
    output: Vec<Fragment>,
    queue: VecDeque<QueuedIntent>,
    suggestions: Vec<String>,
    last_speech: SpeechRecord,
    current_intent: String,
    end_conversation: bool,
    follow_up_event: Option<String>,
    rng: fastrand::Rng,
}

/// Shared skill resources a conversation is built from.
#[derive(Clone)]
pub(crate) struct Resources {
    pub config: Arc<Config>,
    pub flows: Arc<FlowTable>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub tracker: Option<Arc<dyn Tracker>>,
    pub data_collector: Option<DataCollector>,
    pub seed: Option<u64>,
}

impl Conversation {
    /// Start a turn on `platform`.
    pub(crate) fn new(resources: Resources, platform: Box<dyn Platform>) -> Self {
        let state = SessionState::load(platform.session_data());
        let rng = resources
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        debug!(
            platform = platform.name(),
            flow = %state.current_flow,
            "conversation started"
        );
        Self {
            locale: resources.config.default_locale.clone(),
            config: resources.config,
            flows: resources.flows,
            renderer: resources.renderer,
            tracker: resources.tracker,
            data_collector: resources.data_collector,
            platform,
            state,
            output: Vec::new(),
            queue: VecDeque::new(),
            suggestions: Vec::new(),
            last_speech: SpeechRecord::default(),
            current_intent: String::new(),
            end_conversation: false,
            follow_up_event: None,
            rng,
        }
    }

    /// Replace the random source, e.g. with a seeded one in tests.
    #[must_use]
    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    // --- state -----------------------------------------------------------

    /// The active locale.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Switch locale. Locales missing from the config are ignored.
    pub fn set_locale(&mut self, locale: &str) -> &mut Self {
        if self.config.has_locale(locale) {
            self.locale = locale.to_string();
        } else {
            debug!(locale = %locale, "ignoring undeclared locale");
        }
        self
    }

    /// The user's stable identifier, created on first access.
    pub fn user_id(&mut self) -> String {
        session::ensure_user_id(self.platform.user_data_mut())
    }

    /// Skill-owned session data. Keys starting with `__` are reserved.
    #[must_use]
    pub fn session_data(&self) -> &DataMap {
        self.platform.session_data()
    }

    /// Skill-owned session data, mutably.
    pub fn session_data_mut(&mut self) -> &mut DataMap {
        self.platform.session_data_mut()
    }

    /// Cross-session user data.
    #[must_use]
    pub fn user_data(&self) -> &DataMap {
        self.platform.user_data()
    }

    /// Cross-session user data, mutably.
    pub fn user_data_mut(&mut self) -> &mut DataMap {
        self.platform.user_data_mut()
    }

    /// The skill configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The registered flows.
    #[must_use]
    pub fn flows(&self) -> &FlowTable {
        &self.flows
    }

    /// The platform adapter.
    #[must_use]
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// The platform adapter as its concrete type.
    #[must_use]
    pub fn platform_as<P: Platform>(&self) -> Option<&P> {
        self.platform.as_any().downcast_ref::<P>()
    }

    /// End the turn and recover the platform as its concrete type.
    #[must_use]
    pub fn into_platform<P: Platform>(self) -> Option<P> {
        self.platform.into_any().downcast::<P>().ok().map(|p| *p)
    }

    /// Engine bookkeeping as it will be persisted.
    #[must_use]
    pub const fn session_state(&self) -> &SessionState {
        &self.state
    }

    /// Consecutive reprompts.
    #[must_use]
    pub const fn reprompt_count(&self) -> u32 {
        self.state.reprompt_count
    }

    /// Set the consecutive reprompt count.
    pub const fn set_reprompt_count(&mut self, count: u32) -> &mut Self {
        self.state.reprompt_count = count;
        self
    }

    /// Times the user repeated the same input.
    #[must_use]
    pub const fn times_input_repeated(&self) -> u32 {
        self.state.times_input_repeated
    }

    /// Set the repeated-input count.
    pub const fn set_times_input_repeated(&mut self, count: u32) -> &mut Self {
        self.state.times_input_repeated = count;
        self
    }

    /// The expected-input context.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.state.context.as_deref()
    }

    /// The context active before the last [`reset_context`](Self::reset_context).
    #[must_use]
    pub fn previous_context(&self) -> Option<&str> {
        self.state.previous_context.as_deref()
    }

    /// Flow of the last dispatched intent.
    #[must_use]
    pub fn current_flow(&self) -> &str {
        &self.state.current_flow
    }

    /// Intent of the last dispatch in this turn.
    #[must_use]
    pub fn current_intent(&self) -> &str {
        &self.current_intent
    }

    /// Payloads of recent dispatches, oldest first.
    #[must_use]
    pub fn payloads(&self) -> &[Value] {
        &self.state.payloads
    }

    /// Base URL of the asset storage.
    #[must_use]
    pub fn storage_url(&self) -> &str {
        &self.config.storage.root_url
    }

    /// Output buffered so far this turn.
    #[must_use]
    pub fn output(&self) -> &[Fragment] {
        &self.output
    }

    /// Suggestion chips buffered so far this turn.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// What was spoken last in this turn.
    #[must_use]
    pub const fn last_speech(&self) -> &SpeechRecord {
        &self.last_speech
    }

    /// Whether the conversation ends with this turn.
    #[must_use]
    pub const fn is_ending(&self) -> bool {
        self.end_conversation
    }

    // --- output ----------------------------------------------------------

    /// Buffer a fragment.
    pub fn add(&mut self, fragment: impl Into<Fragment>) -> &mut Self {
        self.output.push(fragment.into());
        self
    }

    /// Offer suggestion chips. Labels are translation paths.
    pub fn suggest<I, S>(&mut self, suggestions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    /// Render the translation at `path` in the active locale.
    ///
    /// A missing translation is logged and `path` itself is returned.
    pub fn translate(&mut self, path: &str, params: &Value) -> String {
        let config = Arc::clone(&self.config);
        let template = config
            .locales
            .get(&self.locale)
            .and_then(|tree| i18n::lookup(tree, path))
            .and_then(|leaf| i18n::leaf_template(leaf, &mut self.rng));
        match template {
            Some(template) => self.renderer.render(&self.locale, template, params),
            None => {
                warn!(
                    locale = %self.locale,
                    path = %path,
                    "Translation not defined"
                );
                path.to_string()
            }
        }
    }

    /// Speak a dialog line without parameters. See [`say_with`](Self::say_with).
    pub fn say(&mut self, key: impl Into<String>) -> &mut Self {
        self.say_with(key, Value::Null)
    }

    /// Speak a dialog line.
    ///
    /// `key` may contain `*` wildcards standing for digit runs; every dialog
    /// key matching it is a variant. With several variants the one used last
    /// time for this key is skipped. A key matching nothing is spoken
    /// verbatim. `{name}` placeholders are filled from the `params` object.
    /// If a voice recording exists for the chosen variant it is played
    /// instead, with the text as fallback.
    pub fn say_with(&mut self, key: impl Into<String>, params: Value) -> &mut Self {
        let key = key.into();
        self.last_speech = SpeechRecord::new(key.clone(), params.clone());

        let config = Arc::clone(&self.config);
        let variants = config
            .dialog
            .get(&self.locale)
            .map(|table| dialog::matching_variants(table, &key))
            .unwrap_or_default();
        let last_used = self.state.last_variants.get(&key).map(String::as_str);
        let Some(variant) = dialog::choose_variant(&variants, last_used, &mut self.rng) else {
            return self.add(Fragment::Speech(key));
        };
        if variants.len() > 1 {
            self.state
                .last_variants
                .insert(key.clone(), variant.to_string());
        }
        debug!(key = %key, variant = %variant, "dialog variant chosen");

        let template = config
            .dialog
            .get(&self.locale)
            .and_then(|table| table.get(variant))
            .map(|entry| entry.pick(&mut self.rng))
            .unwrap_or_default();
        let speech = dialog::substitute(template, &params);

        let voices = config
            .voice
            .get(&self.locale)
            .map(|table| dialog::matching_voices(table, variant))
            .unwrap_or_default();
        if voices.is_empty() {
            return self.add(Fragment::Speech(speech));
        }
        let voice = voices[self.rng.usize(..voices.len())];
        self.speak(voice, &speech)
    }

    /// Play a prerecorded voice line with `text` as fallback.
    pub fn speak(&mut self, voice: &str, text: &str) -> &mut Self {
        let fragment = self
            .platform
            .speak(&self.config.storage, &self.locale, voice, text);
        self.add(fragment)
    }

    /// Insert a short pause.
    pub fn pause(&mut self) -> &mut Self {
        self.add("\n  <break time=\".5s\"/>")
    }

    /// Speak last turn's line again and offer last turn's chips.
    pub fn repeat(&mut self) -> &mut Self {
        let previous = self.state.previous_speech.clone();
        if !previous.is_empty() {
            self.say_with(previous.key, previous.params);
        }
        let chips = self.state.previous_suggestions.clone();
        self.suggest(chips)
    }

    /// End the conversation after this turn.
    pub const fn end(&mut self) -> &mut Self {
        self.end_conversation = true;
        self
    }

    /// Trigger a follow-up event instead of waiting for user input.
    pub fn event(&mut self, event: impl Into<String>) -> &mut Self {
        self.follow_up_event = Some(event.into());
        self
    }

    /// Expect the next input in `context`.
    pub fn expect(&mut self, context: impl Into<String>) -> &mut Self {
        self.state.context = Some(context.into());
        self
    }

    /// Clear the expected context, remembering it as the previous one.
    pub fn reset_context(&mut self) -> &mut Self {
        self.state.previous_context = self.state.context.take();
        self
    }

    /// Compare two utterances ignoring case, punctuation and whitespace.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> bool {
        fn fold(s: &str) -> impl Iterator<Item = char> + '_ {
            s.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
        }
        fold(a).eq(fold(b))
    }

    /// Report an analytics event. Does nothing when no tracker is configured.
    pub fn track(&mut self, event: impl Into<String>, data: Value) -> &mut Self {
        let Some(tracker) = self.tracker.clone() else {
            return self;
        };
        let user_id = self.user_id();
        let user_data = self
            .data_collector
            .clone()
            .map_or(Value::Null, |collect| collect(self));
        tracker.track(TrackedEvent {
            event: event.into(),
            data,
            user_id,
            user_data,
        });
        self
    }

    // --- flush -----------------------------------------------------------

    /// Flush the turn's output through the platform and persist session state.
    ///
    /// Called by [`handle_intent`](Self::handle_intent) once the queue is
    /// drained.
    ///
    /// # Errors
    ///
    /// Propagates platform and session encoding errors.
    pub fn send_response(&mut self) -> Result<()> {
        let chips = std::mem::take(&mut self.suggestions);
        let no_params = Value::Null;
        let suggestions = chips
            .iter()
            .map(|chip| self.translate(chip, &no_params))
            .collect();

        let output = TurnOutput {
            fragments: std::mem::take(&mut self.output),
            suggestions,
            context: self.state.context.clone(),
            previous_context: self.state.previous_context.clone(),
            end_conversation: self.end_conversation,
            follow_up_event: self.follow_up_event.take(),
        };
        self.platform.send_response(output)?;

        self.state.previous_speech = std::mem::take(&mut self.last_speech);
        self.state.previous_suggestions = chips;
        self.end_conversation = false;
        self.state.store(self.platform.session_data_mut())?;
        debug!(flow = %self.state.current_flow, "response sent");
        Ok(())
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("platform", &self.platform.name())
            .field("locale", &self.locale)
            .field("state", &self.state)
            .field("current_intent", &self.current_intent)
            .field("queued", &self.queue.len())
            .field("output", &self.output)
            .field("suggestions", &self.suggestions)
            .finish_non_exhaustive()
    }
}
