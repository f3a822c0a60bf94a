//! Platform adapters.
//!
//! The engine is platform-agnostic; everything that depends on a concrete
//! assistant sits behind the [`Platform`] trait: where session and user data
//! live, which capabilities the device has, how a prerecorded voice line is
//! spoken and how a finished turn is serialized.

pub mod dialogflow;

use std::any::Any;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::response::{Fragment, TurnOutput};
use crate::session::DataMap;

/// A delivery channel the engine writes turns to.
pub trait Platform: Any + Send {
    /// Short platform name for logs.
    fn name(&self) -> &'static str;

    /// Session-scoped store.
    fn session_data(&self) -> &DataMap;

    /// Session-scoped store, mutably.
    fn session_data_mut(&mut self) -> &mut DataMap;

    /// User-scoped store.
    fn user_data(&self) -> &DataMap;

    /// User-scoped store, mutably.
    fn user_data_mut(&mut self) -> &mut DataMap;

    /// Whether the current device has a capability.
    fn has_capability(&self, capability: &str) -> bool;

    /// Whether another device of the user has a capability.
    fn has_available_capability(&self, capability: &str) -> bool;

    /// Build the fragment playing a prerecorded voice line.
    ///
    /// Recordings live at `<root><voice path><locale>/<voice>.wav`; `text` is
    /// the fallback spoken when the audio cannot be played.
    fn speak(&self, storage: &StorageConfig, locale: &str, voice: &str, text: &str) -> Fragment {
        Fragment::Speech(format!(
            "<audio src=\"{}{}{locale}/{voice}.wav\">{text}</audio>",
            storage.root_url, storage.paths.voice
        ))
    }

    /// Serialize a finished turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Platform`](crate::Error::Platform) when the response
    /// cannot be delivered.
    fn send_response(&mut self, output: TurnOutput) -> Result<()>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Owned downcast support.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}
