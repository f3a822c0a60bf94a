//! Dialogflow / Actions on Google adapter.
//!
//! [`DialogflowPlatform`] turns a [`TurnOutput`] into Actions on Google
//! response items:
//!
//! 1. the expected-input context is (re)activated and a stale previous
//!    context is deleted,
//! 2. all speech of the turn is merged into one `<speak>` response placed
//!    first, followed by rich content in emission order,
//! 3. only the last image or card of the turn is kept,
//! 4. suggestion chips are cut to [`SUGGESTION_MAX_CHARS`],
//! 5. the conversation is closed or a follow-up event fired when requested.

mod object;

pub use object::{ConversationObject, RichItem, SESSION_CONTEXT, WebhookConversation};

use std::any::Any;

use tracing::{debug, warn};

use crate::error::Result;
use crate::platform::Platform;
use crate::response::{Fragment, TurnOutput};
use crate::session::DataMap;

/// Turns an activated context stays alive.
pub const CONTEXT_LIFESPAN: u32 = 999;

/// Longest suggestion chip label the assistant displays.
pub const SUGGESTION_MAX_CHARS: usize = 25;

/// Merge speech and enforce the one-visual-per-response limit.
#[must_use]
pub fn assemble_items(fragments: Vec<Fragment>) -> Vec<RichItem> {
    let (speech, rich): (Vec<Fragment>, Vec<Fragment>) =
        fragments.into_iter().partition(Fragment::is_speech);

    let mut items = Vec::with_capacity(rich.len() + 1);
    if !speech.is_empty() {
        let text: Vec<String> = speech
            .into_iter()
            .filter_map(|fragment| match fragment {
                Fragment::Speech(text) => Some(text),
                _ => None,
            })
            .collect();
        items.push(RichItem::SimpleResponse(format!(
            "<speak>{}</speak>",
            text.join(" ")
        )));
    }

    let visuals = rich.iter().filter(|fragment| fragment.is_visual()).count();
    if visuals > 1 {
        warn!(
            count = visuals,
            "Only 1 image or card per response allowed. Only the last image will be shown."
        );
    }
    let mut skip = visuals.saturating_sub(1);
    for fragment in rich {
        if skip > 0 && fragment.is_visual() {
            skip -= 1;
            continue;
        }
        items.push(RichItem::Content(fragment));
    }
    items
}

/// Cut a chip label to the displayable length.
#[must_use]
pub fn truncate_chip(label: &str) -> String {
    label.chars().take(SUGGESTION_MAX_CHARS).collect()
}

/// Platform adapter for Dialogflow fulfillment webhooks.
#[derive(Debug)]
pub struct DialogflowPlatform<C = WebhookConversation> {
    object: C,
}

impl<C: ConversationObject> DialogflowPlatform<C> {
    /// Wrap a conversation object.
    #[must_use]
    pub const fn new(object: C) -> Self {
        Self { object }
    }

    /// The wrapped conversation object.
    #[must_use]
    pub const fn object(&self) -> &C {
        &self.object
    }

    /// Unwrap the conversation object.
    #[must_use]
    pub fn into_object(self) -> C {
        self.object
    }
}

impl<C: ConversationObject + 'static> Platform for DialogflowPlatform<C> {
    fn name(&self) -> &'static str {
        "dialogflow"
    }

    fn session_data(&self) -> &DataMap {
        self.object.data()
    }

    fn session_data_mut(&mut self) -> &mut DataMap {
        self.object.data_mut()
    }

    fn user_data(&self) -> &DataMap {
        self.object.user_storage()
    }

    fn user_data_mut(&mut self) -> &mut DataMap {
        self.object.user_storage_mut()
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.object.surface_capabilities().contains(capability)
    }

    fn has_available_capability(&self, capability: &str) -> bool {
        self.object.available_capabilities().contains(capability)
    }

    fn send_response(&mut self, output: TurnOutput) -> Result<()> {
        if let Some(context) = &output.context {
            self.object.set_context(context, CONTEXT_LIFESPAN);
        }
        if let Some(previous) = &output.previous_context
            && output.context.as_ref() != Some(previous)
        {
            self.object.delete_context(previous);
            let lowercase = previous.to_lowercase();
            if lowercase != *previous {
                self.object.delete_context(&lowercase);
            }
        }

        let items = assemble_items(output.fragments);
        debug!(items = items.len(), "sending dialogflow response");
        for item in items {
            self.object.add(item);
        }

        if !output.suggestions.is_empty() {
            let chips = output
                .suggestions
                .iter()
                .map(|label| truncate_chip(label))
                .collect();
            self.object.add(RichItem::Suggestions(chips));
        }
        if output.end_conversation {
            self.object.close();
        }
        if let Some(event) = &output.follow_up_event {
            self.object.followup(event);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{BasicCard, Image, List};

    fn image(name: &str) -> Fragment {
        Fragment::Image(Image {
            url: format!("https://cdn/{name}.png"),
            alt: name.into(),
        })
    }

    #[test]
    fn test_speech_is_merged_first() {
        let items = assemble_items(vec![
            Fragment::from("Hello."),
            Fragment::List(List::default()),
            Fragment::from("Pick one."),
        ]);
        assert_eq!(
            items,
            vec![
                RichItem::SimpleResponse("<speak>Hello. Pick one.</speak>".into()),
                RichItem::Content(Fragment::List(List::default())),
            ]
        );
    }

    #[test]
    fn test_only_last_visual_survives() {
        let card = Fragment::Card(BasicCard {
            title: Some("Score".into()),
            ..BasicCard::default()
        });
        let items = assemble_items(vec![image("a"), card.clone(), image("b")]);
        assert_eq!(items, vec![RichItem::Content(image("b"))]);

        let items = assemble_items(vec![image("a"), card.clone()]);
        assert_eq!(items, vec![RichItem::Content(card)]);
    }

    #[test]
    fn test_truncate_chip_counts_chars() {
        assert_eq!(truncate_chip("short"), "short");
        let long = "ä".repeat(30);
        assert_eq!(truncate_chip(&long).chars().count(), SUGGESTION_MAX_CHARS);
    }

    #[test]
    fn test_send_response_contexts_and_flags() {
        let mut platform = DialogflowPlatform::new(WebhookConversation::default());
        platform
            .send_response(TurnOutput {
                fragments: vec![Fragment::from("Bye.")],
                suggestions: vec!["A very long suggestion label indeed".into()],
                context: Some("confirmation".into()),
                previous_context: Some("Quiz".into()),
                end_conversation: true,
                follow_up_event: Some("again".into()),
            })
            .unwrap();

        let object = platform.object();
        assert_eq!(object.contexts().get("confirmation"), Some(&CONTEXT_LIFESPAN));
        assert_eq!(object.contexts().get("Quiz"), Some(&0));
        assert_eq!(object.contexts().get("quiz"), Some(&0));
        assert!(object.is_closed());
        assert_eq!(object.followup_event(), Some("again"));
        assert_eq!(
            object.items().last(),
            Some(&RichItem::Suggestions(vec!["A very long suggestion la".into()]))
        );
    }

    #[test]
    fn test_unchanged_context_is_kept() {
        let mut platform = DialogflowPlatform::new(WebhookConversation::default());
        platform
            .send_response(TurnOutput {
                context: Some("quiz".into()),
                previous_context: Some("quiz".into()),
                ..TurnOutput::default()
            })
            .unwrap();
        assert_eq!(platform.object().contexts().get("quiz"), Some(&CONTEXT_LIFESPAN));
        assert!(platform.object().items().is_empty());
    }
}
