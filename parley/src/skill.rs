//! Skill assembly.
//!
//! A [`Skill`] bundles everything that stays the same across turns: the
//! configuration, the flows, the template renderer and the analytics hooks.
//! It is cheap to clone and hands out one [`Conversation`] per turn.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! let skill = Skill::builder(Config::from_file("skill.json")?)
//!     .flows(flows)
//!     .tracker(Arc::new(LogTracker))
//!     .build();
//!
//! let platform = skill
//!     .run_turn(DialogflowPlatform::new(object), "quiz:", Value::Null)
//!     .await?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::conversation::{Conversation, Resources};
use crate::error::{Error, Result};
use crate::flow::FlowTable;
use crate::i18n::{MessageFormatRenderer, TemplateRenderer};
use crate::platform::Platform;
use crate::tracking::{DataCollector, Tracker};

/// A configured voice skill.
#[derive(Clone)]
pub struct Skill {
    resources: Resources,
}

impl std::fmt::Debug for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skill")
            .field("default_locale", &self.resources.config.default_locale)
            .field("flows", &self.resources.flows.names())
            .field("tracker", &self.resources.tracker.is_some())
            .finish_non_exhaustive()
    }
}

impl Skill {
    /// Create a builder around `config`.
    #[must_use]
    pub fn builder(config: Config) -> SkillBuilder {
        SkillBuilder::new(config)
    }

    /// The skill configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.resources.config
    }

    /// The registered flows.
    #[must_use]
    pub fn flows(&self) -> &FlowTable {
        &self.resources.flows
    }

    /// Start a turn on `platform`.
    ///
    /// Reserved session keys holding malformed values are logged and reset.
    #[must_use]
    pub fn conversation(&self, platform: impl Platform) -> Conversation {
        Conversation::new(self.resources.clone(), Box::new(platform))
    }

    /// Run a complete turn: dispatch `address`, drain the queue and send the
    /// response. Returns the platform holding the response.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be dispatched or a handler fails; in
    /// that case nothing is sent.
    pub async fn run_turn<P: Platform>(
        &self,
        platform: P,
        address: &str,
        payload: Value,
    ) -> Result<P> {
        let mut conversation = self.conversation(platform);
        conversation.next_with(address, payload)?;
        conversation.handle_intent().await?;
        debug!(address = %address, "turn complete");
        conversation
            .into_platform::<P>()
            .ok_or_else(|| Error::platform("platform type changed during the turn"))
    }
}

/// Builder for [`Skill`].
pub struct SkillBuilder {
    config: Config,
    flows: FlowTable,
    renderer: Arc<dyn TemplateRenderer>,
    tracker: Option<Arc<dyn Tracker>>,
    data_collector: Option<DataCollector>,
    seed: Option<u64>,
}

impl std::fmt::Debug for SkillBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillBuilder")
            .field("flows", &self.flows.names())
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl SkillBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            flows: FlowTable::new(),
            renderer: Arc::new(MessageFormatRenderer),
            tracker: None,
            data_collector: None,
            seed: None,
        }
    }

    /// Set the flows.
    #[must_use]
    pub fn flows(mut self, flows: FlowTable) -> Self {
        self.flows = flows;
        self
    }

    /// Replace the translation template renderer.
    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Send tracked events to `tracker`.
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Attach user properties to every tracked event.
    #[must_use]
    pub fn data_collector<F>(mut self, collector: F) -> Self
    where
        F: Fn(&Conversation) -> Value + Send + Sync + 'static,
    {
        self.data_collector = Some(Arc::new(collector));
        self
    }

    /// Seed the random source used for variant selection.
    ///
    /// Every conversation of the skill starts from the same seed, which makes
    /// turns reproducible in tests.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the skill.
    #[must_use]
    pub fn build(self) -> Skill {
        debug!(
            flows = self.flows.len(),
            default_locale = %self.config.default_locale,
            "skill built"
        );
        Skill {
            resources: Resources {
                config: Arc::new(self.config),
                flows: Arc::new(self.flows),
                renderer: self.renderer,
                tracker: self.tracker,
                data_collector: self.data_collector,
                seed: self.seed,
            },
        }
    }
}
