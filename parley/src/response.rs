//! Response fragments.
//!
//! Everything a handler emits during a turn is buffered as an ordered list of
//! [`Fragment`]s: SSML speech snippets interleaved with rich content. When the
//! turn ends the buffer is packed into a [`TurnOutput`] and handed to the
//! platform adapter.

use serde::{Deserialize, Serialize};

/// Surface capability names reported by the assistant.
#[derive(Debug, Clone, Copy)]
pub struct Capability;

impl Capability {
    /// The device has a screen.
    pub const SCREEN_OUTPUT: &'static str = "actions.capability.SCREEN_OUTPUT";
    /// The device can open web pages.
    pub const WEB_BROWSER: &'static str = "actions.capability.WEB_BROWSER";
}

/// User information a skill may ask permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// The user's display name.
    Name,
    /// Precise device location.
    DevicePreciseLocation,
    /// City-level device location.
    DeviceCoarseLocation,
}

impl Permission {
    /// Wire name of the permission.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::DevicePreciseLocation => "DEVICE_PRECISE_LOCATION",
            Self::DeviceCoarseLocation => "DEVICE_COARSE_LOCATION",
        }
    }
}

/// An image shown on screen devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Absolute image URL.
    pub url: String,
    /// Accessibility text.
    #[serde(rename = "accessibilityText")]
    pub alt: String,
}

/// A button linking out of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Button label.
    pub title: String,
    /// Target URL.
    pub url: String,
}

/// A card with optional title, text, image and buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCard {
    /// Card title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Card subtitle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Body text.
    #[serde(default, rename = "formattedText", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Card image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    /// Link-out buttons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

/// One selectable entry of a [`List`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Item title, also used as the selection key.
    pub title: String,
    /// Alternative phrases that select this item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Item description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Absolute image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A visual selection list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    /// List title.
    pub title: String,
    /// Entries in display order.
    pub items: Vec<ListItem>,
}

/// A chip that opens a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutSuggestion {
    /// Target URL.
    pub url: String,
    /// Chip label.
    #[serde(rename = "destinationName")]
    pub name: String,
}

/// A request to continue the conversation on another surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSurface {
    /// Why the transfer is requested.
    pub context: String,
    /// Notification shown on the target surface.
    pub notification: String,
    /// Capabilities the target surface needs.
    pub capabilities: Vec<String>,
}

/// A permission prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Spoken reason for the request.
    #[serde(rename = "optContext")]
    pub context: String,
    /// Requested permissions.
    pub permissions: Vec<Permission>,
}

/// One buffered piece of turn output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Fragment {
    /// SSML speech, merged with the other speech fragments of the turn.
    Speech(String),
    /// A standalone image.
    Image(Image),
    /// A basic card.
    Card(BasicCard),
    /// A selection list.
    List(List),
    /// A link-out chip.
    LinkOut(LinkOutSuggestion),
    /// A surface transfer request.
    NewSurface(NewSurface),
    /// A permission prompt.
    Permission(PermissionRequest),
}

impl Fragment {
    /// Returns `true` for speech.
    #[must_use]
    pub const fn is_speech(&self) -> bool {
        matches!(self, Self::Speech(_))
    }

    /// Returns `true` for the visuals limited to one per response.
    #[must_use]
    pub const fn is_visual(&self) -> bool {
        matches!(self, Self::Image(_) | Self::Card(_))
    }
}

impl From<String> for Fragment {
    fn from(speech: String) -> Self {
        Self::Speech(speech)
    }
}

impl From<&str> for Fragment {
    fn from(speech: &str) -> Self {
        Self::Speech(speech.to_string())
    }
}

/// Everything the engine produced during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutput {
    /// Fragments in emission order.
    pub fragments: Vec<Fragment>,
    /// Translated suggestion chip labels.
    pub suggestions: Vec<String>,
    /// Context the next input is expected in.
    pub context: Option<String>,
    /// Context active before the last reset.
    pub previous_context: Option<String>,
    /// Whether the conversation ends after this response.
    pub end_conversation: bool,
    /// Event to trigger instead of waiting for user input.
    pub follow_up_event: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragment_kinds() {
        assert!(Fragment::from("hi").is_speech());
        let image = Fragment::Image(Image {
            url: "u".into(),
            alt: "a".into(),
        });
        assert!(image.is_visual());
        assert!(Fragment::Card(BasicCard::default()).is_visual());
        assert!(!Fragment::List(List::default()).is_visual());
    }

    #[test]
    fn test_permission_wire_names() {
        assert_eq!(
            serde_json::to_value(Permission::DevicePreciseLocation).unwrap(),
            json!("DEVICE_PRECISE_LOCATION")
        );
        assert_eq!(Permission::Name.as_str(), "NAME");
    }

    #[test]
    fn test_card_skips_empty_fields() {
        let card = BasicCard {
            title: Some("Score".into()),
            ..BasicCard::default()
        };
        assert_eq!(serde_json::to_value(card).unwrap(), json!({"title": "Score"}));
    }
}
