//! Skill configuration.
//!
//! The serializable half of a skill: translation trees, dialog templates,
//! voice recordings, asset storage locations and turn settings. Intent
//! handlers are code and are registered separately in a
//! [`FlowTable`](crate::flow::FlowTable).
//!
//! ```json
//! {
//!   "default_locale": "en-US",
//!   "locales": { "en-US": { "chips": { "yes": "Yes" } } },
//!   "dialog": { "en-US": { "greeting_1": "Hi {name}!", "greeting_2": ["Hello!", "Hey!"] } },
//!   "voice": { "en-US": { "greeting_1_A": "greeting-1-anna" } },
//!   "storage": { "root_url": "https://cdn.example.com/", "paths": { "sfx": "sfx/", "voice": "voice/" } },
//!   "sfx": { "extension": "mp3" },
//!   "turn": { "handler_timeout_ms": 4000 }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialog::DialogTable;
use crate::error::ConfigError;

/// Locale used when the config does not name one.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Voice recordings of one locale: voice key to recording id.
pub type VoiceTable = BTreeMap<String, String>;

/// Complete skill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Locale every conversation starts in.
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Translation trees per locale, addressed by dotted path.
    #[serde(default)]
    pub locales: HashMap<String, Value>,
    /// Dialog templates per locale.
    #[serde(default)]
    pub dialog: HashMap<String, DialogTable>,
    /// Prerecorded voice lines per locale.
    #[serde(default)]
    pub voice: HashMap<String, VoiceTable>,
    /// Where images, sound effects and voice files are served from.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Sound effect settings.
    #[serde(default)]
    pub sfx: SfxConfig,
    /// Turn driver settings.
    #[serde(default)]
    pub turn: TurnConfig,
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            locales: HashMap::new(),
            dialog: HashMap::new(),
            voice: HashMap::new(),
            storage: StorageConfig::default(),
            sfx: SfxConfig::default(),
            turn: TurnConfig::default(),
        }
    }
}

impl Config {
    /// Parse a config from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file, then validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, and parse or
    /// validation errors otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every locale referenced by the config is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first undeclared locale.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.locales.contains_key(&self.default_locale) {
            return Err(ConfigError::invalid(format!(
                "default locale \"{}\" is not declared in locales",
                self.default_locale
            )));
        }
        let undeclared = self
            .dialog
            .keys()
            .chain(self.voice.keys())
            .find(|locale| !self.locales.contains_key(*locale));
        if let Some(locale) = undeclared {
            return Err(ConfigError::invalid(format!(
                "locale \"{locale}\" has dialog or voice entries but is not declared in locales"
            )));
        }
        Ok(())
    }

    /// Check whether a locale is declared.
    #[must_use]
    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }
}

/// Asset storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL every asset path is appended to.
    #[serde(default)]
    pub root_url: String,
    /// Sub-paths below the root.
    #[serde(default)]
    pub paths: StoragePaths,
}

/// Asset sub-paths below [`StorageConfig::root_url`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePaths {
    /// Sound effects directory.
    #[serde(default)]
    pub sfx: String,
    /// Voice recordings directory; recordings live in a per-locale folder below it.
    #[serde(default)]
    pub voice: String,
}

/// Sound effect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfxConfig {
    /// File extension of sound effect files.
    #[serde(default = "default_sfx_extension")]
    pub extension: String,
}

fn default_sfx_extension() -> String {
    "mp3".to_string()
}

impl Default for SfxConfig {
    fn default() -> Self {
        Self {
            extension: default_sfx_extension(),
        }
    }
}

/// Turn driver settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Deadline for a single intent handler, in milliseconds. Unset means no deadline.
    #[serde(default)]
    pub handler_timeout_ms: Option<u64>,
}

impl TurnConfig {
    /// The handler deadline as a [`Duration`].
    #[must_use]
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}
