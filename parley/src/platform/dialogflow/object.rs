//! The Dialogflow conversation object.
//!
//! [`ConversationObject`] is the narrow slice of the Actions on Google
//! conversation API the adapter needs. [`WebhookConversation`] is an
//! in-memory implementation that records everything added to it and renders
//! the Dialogflow fulfillment JSON the webhook returns.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Value, json};

use crate::response::{Fragment, ListItem};
use crate::session::DataMap;

/// Name of the output context carrying session data between turns.
pub const SESSION_CONTEXT: &str = "_actions_on_google";

/// Lifespan given to the session data context.
const SESSION_CONTEXT_LIFESPAN: u32 = 99;

/// An item added to the platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichItem {
    /// Merged SSML speech.
    SimpleResponse(String),
    /// Rich content.
    Content(Fragment),
    /// Suggestion chips.
    Suggestions(Vec<String>),
}

/// What the adapter needs from the platform's conversation object.
pub trait ConversationObject: Send {
    /// Session data.
    fn data(&self) -> &DataMap;
    /// Session data, mutably.
    fn data_mut(&mut self) -> &mut DataMap;
    /// Cross-session user storage.
    fn user_storage(&self) -> &DataMap;
    /// Cross-session user storage, mutably.
    fn user_storage_mut(&mut self) -> &mut DataMap;
    /// Capabilities of the current surface.
    fn surface_capabilities(&self) -> &HashSet<String>;
    /// Capabilities of the user's other surfaces.
    fn available_capabilities(&self) -> &HashSet<String>;
    /// Append an item to the response.
    fn add(&mut self, item: RichItem);
    /// Activate an input context for `lifespan` turns.
    fn set_context(&mut self, name: &str, lifespan: u32);
    /// Deactivate an input context.
    fn delete_context(&mut self, name: &str);
    /// End the conversation after this response.
    fn close(&mut self);
    /// Trigger a follow-up event instead of waiting for input.
    fn followup(&mut self, event: &str);
}

/// In-memory conversation object for one webhook call.
#[derive(Debug, Clone, Default)]
pub struct WebhookConversation {
    data: DataMap,
    user_storage: DataMap,
    surface: HashSet<String>,
    available: HashSet<String>,
    items: Vec<RichItem>,
    contexts: BTreeMap<String, u32>,
    closed: bool,
    followup: Option<String>,
}

impl WebhookConversation {
    /// Create a conversation object from the stored session and user data.
    #[must_use]
    pub fn new(data: DataMap, user_storage: DataMap) -> Self {
        Self {
            data,
            user_storage,
            ..Self::default()
        }
    }

    /// Set the capabilities of the current surface.
    #[must_use]
    pub fn with_surface_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.surface = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Set the capabilities of the user's other surfaces.
    #[must_use]
    pub fn with_available_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Items added so far.
    #[must_use]
    pub fn items(&self) -> &[RichItem] {
        &self.items
    }

    /// Context lifespans; deleted contexts have lifespan 0.
    #[must_use]
    pub const fn contexts(&self) -> &BTreeMap<String, u32> {
        &self.contexts
    }

    /// Whether the conversation was closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// The follow-up event, if one was triggered.
    #[must_use]
    pub fn followup_event(&self) -> Option<&str> {
        self.followup.as_deref()
    }

    /// Render the Dialogflow fulfillment response.
    #[must_use]
    pub fn to_response(&self) -> Value {
        let mut items = Vec::new();
        let mut suggestions = Vec::new();
        let mut link_out = None;
        let mut system_intent = None;

        for item in &self.items {
            match item {
                RichItem::SimpleResponse(ssml) => {
                    items.push(json!({ "simpleResponse": { "ssml": ssml } }));
                }
                RichItem::Suggestions(chips) => {
                    suggestions.extend(chips.iter().map(|title| json!({ "title": title })));
                }
                RichItem::Content(fragment) => match fragment {
                    Fragment::Speech(ssml) => {
                        items.push(json!({ "simpleResponse": { "ssml": ssml } }));
                    }
                    Fragment::Image(image) => items.push(json!({ "basicCard": { "image": image } })),
                    Fragment::Card(card) => items.push(json!({ "basicCard": card })),
                    Fragment::LinkOut(link) => link_out = Some(json!(link)),
                    Fragment::List(list) => {
                        system_intent = Some(json!({
                            "intent": "actions.intent.OPTION",
                            "data": {
                                "@type": "type.googleapis.com/google.actions.v2.OptionValueSpec",
                                "listSelect": {
                                    "title": list.title,
                                    "items": list.items.iter().map(list_item_json).collect::<Vec<_>>(),
                                },
                            },
                        }));
                    }
                    Fragment::NewSurface(surface) => {
                        system_intent = Some(json!({
                            "intent": "actions.intent.NEW_SURFACE",
                            "data": {
                                "@type": "type.googleapis.com/google.actions.v2.NewSurfaceValueSpec",
                                "context": surface.context,
                                "notificationTitle": surface.notification,
                                "capabilities": surface.capabilities,
                            },
                        }));
                    }
                    Fragment::Permission(request) => {
                        system_intent = Some(json!({
                            "intent": "actions.intent.PERMISSION",
                            "data": {
                                "@type": "type.googleapis.com/google.actions.v2.PermissionValueSpec",
                                "optContext": request.context,
                                "permissions": request.permissions,
                            },
                        }));
                    }
                },
            }
        }

        let mut rich_response = json!({ "items": items });
        if !suggestions.is_empty() {
            rich_response["suggestions"] = Value::Array(suggestions);
        }
        if let Some(link) = link_out {
            rich_response["linkOutSuggestion"] = link;
        }

        let mut google = json!({
            "expectUserResponse": !self.closed,
            "richResponse": rich_response,
            "userStorage": Value::Object(self.user_storage.clone()).to_string(),
        });
        if let Some(intent) = system_intent {
            google["systemIntent"] = intent;
        }

        let mut output_contexts: Vec<Value> = self
            .contexts
            .iter()
            .map(|(name, lifespan)| json!({ "name": name, "lifespanCount": lifespan }))
            .collect();
        output_contexts.push(json!({
            "name": SESSION_CONTEXT,
            "lifespanCount": SESSION_CONTEXT_LIFESPAN,
            "parameters": { "data": Value::Object(self.data.clone()).to_string() },
        }));

        let mut response = json!({
            "payload": { "google": google },
            "outputContexts": output_contexts,
        });
        if let Some(event) = &self.followup {
            response["followupEventInput"] = json!({ "name": event });
        }
        response
    }
}

fn list_item_json(item: &ListItem) -> Value {
    let mut value = json!({
        "optionInfo": { "key": item.title, "synonyms": item.synonyms },
        "title": item.title,
    });
    if let Some(description) = &item.description {
        value["description"] = json!(description);
    }
    if let Some(url) = &item.image_url {
        value["image"] = json!({ "url": url, "accessibilityText": item.title });
    }
    value
}

impl ConversationObject for WebhookConversation {
    fn data(&self) -> &DataMap {
        &self.data
    }

    fn data_mut(&mut self) -> &mut DataMap {
        &mut self.data
    }

    fn user_storage(&self) -> &DataMap {
        &self.user_storage
    }

    fn user_storage_mut(&mut self) -> &mut DataMap {
        &mut self.user_storage
    }

    fn surface_capabilities(&self) -> &HashSet<String> {
        &self.surface
    }

    fn available_capabilities(&self) -> &HashSet<String> {
        &self.available
    }

    fn add(&mut self, item: RichItem) {
        self.items.push(item);
    }

    fn set_context(&mut self, name: &str, lifespan: u32) {
        self.contexts.insert(name.to_string(), lifespan);
    }

    fn delete_context(&mut self, name: &str) {
        self.contexts.insert(name.to_string(), 0);
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn followup(&mut self, event: &str) {
        self.followup = Some(event.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Image, Permission, PermissionRequest};

    #[test]
    fn test_response_shape() {
        let mut conv = WebhookConversation::new(DataMap::new(), DataMap::new());
        conv.add(RichItem::SimpleResponse("<speak>Hi</speak>".into()));
        conv.add(RichItem::Content(Fragment::Image(Image {
            url: "https://cdn/x.png".into(),
            alt: "x".into(),
        })));
        conv.add(RichItem::Suggestions(vec!["Yes".into(), "No".into()]));
        conv.set_context("confirmation", 999);
        conv.delete_context("quiz");

        let response = conv.to_response();
        let google = &response["payload"]["google"];
        assert_eq!(google["expectUserResponse"], json!(true));
        assert_eq!(
            google["richResponse"]["items"][0]["simpleResponse"]["ssml"],
            json!("<speak>Hi</speak>")
        );
        assert_eq!(
            google["richResponse"]["items"][1]["basicCard"]["image"]["accessibilityText"],
            json!("x")
        );
        assert_eq!(google["richResponse"]["suggestions"][1]["title"], json!("No"));

        let contexts = response["outputContexts"].as_array().unwrap();
        assert_eq!(contexts[0], json!({"name": "confirmation", "lifespanCount": 999}));
        assert_eq!(contexts[1], json!({"name": "quiz", "lifespanCount": 0}));
        assert_eq!(contexts[2]["name"], json!(SESSION_CONTEXT));
    }

    #[test]
    fn test_close_and_followup() {
        let mut conv = WebhookConversation::default();
        conv.add(RichItem::Content(Fragment::Permission(PermissionRequest {
            context: "To greet you".into(),
            permissions: vec![Permission::Name],
        })));
        conv.close();
        conv.followup("next_round");

        let response = conv.to_response();
        assert_eq!(response["payload"]["google"]["expectUserResponse"], json!(false));
        assert_eq!(
            response["payload"]["google"]["systemIntent"]["data"]["permissions"],
            json!(["NAME"])
        );
        assert_eq!(response["followupEventInput"]["name"], json!("next_round"));
    }
}
