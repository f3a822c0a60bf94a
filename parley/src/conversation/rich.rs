//! Visual content, sound effects and device capabilities.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{Conversation, PERMISSION_CONTEXT};
use crate::error::Result;
use crate::flow::INTENT_DELIMITER;
use crate::response::{
    BasicCard, Button, Capability, Fragment, Image, LinkOutSuggestion, List, ListItem, NewSurface,
    Permission, PermissionRequest,
};

/// Content of a [`Conversation::show_card`] card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardContent {
    /// Card title.
    pub title: Option<String>,
    /// Card subtitle.
    pub subtitle: Option<String>,
    /// Body text.
    pub text: Option<String>,
    /// Image asset name, resolved like [`Conversation::show`].
    pub image: Option<String>,
    /// Link-out buttons.
    pub buttons: Vec<Button>,
}

/// `{N}` placeholder in image asset names.
static IMAGE_WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+)\}").expect("valid regex"));

/// Replace the first `{N}` placeholder with a random number in `1..=N`.
fn expand_wildcard(image: &str, rng: &mut fastrand::Rng) -> String {
    let Some(captures) = IMAGE_WILDCARD.captures(image) else {
        return image.to_string();
    };
    match captures[1].parse::<usize>() {
        Ok(count) if count > 0 => {
            let placeholder = captures.get(0).map_or(0..0, |m| m.range());
            let mut expanded = image.to_string();
            expanded.replace_range(placeholder, &rng.usize(1..=count).to_string());
            expanded
        }
        _ => image.to_string(),
    }
}

impl Conversation {
    fn image_url(&self, image: &str) -> String {
        format!("{}images/{image}.png", self.storage_url())
    }

    /// Show the image asset `image`.
    ///
    /// A `{N}` placeholder in the name picks one of `N` numbered assets at
    /// random, e.g. `"confetti_{3}"`.
    pub fn show(&mut self, image: &str, alt: Option<&str>) -> &mut Self {
        let image = expand_wildcard(image, &mut self.rng);
        let fragment = Fragment::Image(Image {
            url: self.image_url(&image),
            alt: alt.map_or_else(|| image.clone(), str::to_string),
        });
        self.add(fragment)
    }

    /// Show a basic card.
    pub fn show_card(&mut self, content: CardContent) -> &mut Self {
        let image = content.image.map(|asset| Image {
            url: self.image_url(&asset),
            alt: asset,
        });
        self.add(Fragment::Card(BasicCard {
            title: content.title,
            subtitle: content.subtitle,
            text: content.text,
            image,
            buttons: content.buttons,
        }))
    }

    /// Show a selection list.
    pub fn list(&mut self, title: impl Into<String>, items: Vec<ListItem>) -> &mut Self {
        self.add(Fragment::List(List {
            title: title.into(),
            items,
        }))
    }

    /// Point the user at `url`.
    ///
    /// Devices with a browser get a link-out chip. Otherwise, if another of
    /// the user's devices has one, the conversation is offered there. Without
    /// either nothing is added.
    pub fn redirect(&mut self, url: &str, name: &str, description: Option<&str>) -> &mut Self {
        if self.can_link_out() {
            return self.add(Fragment::LinkOut(LinkOutSuggestion {
                url: url.to_string(),
                name: name.to_string(),
            }));
        }
        let needed = [Capability::SCREEN_OUTPUT, Capability::WEB_BROWSER];
        if self.can_transfer(&needed) {
            let description = description.unwrap_or(name).to_string();
            return self.add(Fragment::NewSurface(NewSurface {
                context: description.clone(),
                notification: description,
                capabilities: needed.iter().map(ToString::to_string).collect(),
            }));
        }
        debug!(url = %url, "no surface can open the link");
        self
    }

    /// Play a sound effect from the storage's sfx folder.
    pub fn play(&mut self, sound: &str, fallback: &str) -> &mut Self {
        let storage = &self.config.storage;
        let speech = format!(
            "<audio src=\"{}{}{sound}.{}\">{fallback}</audio>",
            storage.root_url, storage.paths.sfx, self.config.sfx.extension
        );
        self.add(speech)
    }

    /// Ask the user for `permissions`.
    ///
    /// A grant comes back to the current intent; a refusal goes to
    /// `denied_intent`. The answer is routed with
    /// [`handle_permission`](Self::handle_permission).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowNotFound`](crate::Error::FlowNotFound) if either
    /// target cannot be resolved.
    pub fn request_permission<I>(
        &mut self,
        permissions: I,
        denied_intent: &str,
        text: impl Into<String>,
    ) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Permission>,
    {
        let granted = self.resolve_intent(&format!("{INTENT_DELIMITER}{}", self.current_intent))?;
        let denied = self.resolve_intent(denied_intent)?;
        self.store_permission_callbacks(granted, denied);
        self.add(Fragment::Permission(PermissionRequest {
            context: text.into(),
            permissions: permissions.into_iter().collect(),
        }));
        Ok(self.expect(PERMISSION_CONTEXT))
    }

    /// The device has a screen.
    #[must_use]
    pub fn has_display(&self) -> bool {
        self.platform.has_capability(Capability::SCREEN_OUTPUT)
    }

    /// The device has a web browser.
    #[must_use]
    pub fn has_browser(&self) -> bool {
        self.platform.has_capability(Capability::WEB_BROWSER)
    }

    /// The device can open a link-out chip.
    #[must_use]
    pub fn can_link_out(&self) -> bool {
        self.has_display() && self.has_browser()
    }

    /// Another of the user's devices has all of `capabilities`.
    #[must_use]
    pub fn can_transfer(&self, capabilities: &[&str]) -> bool {
        capabilities
            .iter()
            .all(|capability| self.platform.has_available_capability(capability))
    }

    /// [`redirect`](Self::redirect) would produce something.
    #[must_use]
    pub fn can_redirect(&self) -> bool {
        self.can_link_out() || self.can_transfer(&[Capability::SCREEN_OUTPUT, Capability::WEB_BROWSER])
    }
}
