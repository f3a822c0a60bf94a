//! Intent addressing and the handler queue.

use serde_json::Value;
use tracing::{debug, warn};

use super::{CONFIRMATION_CONTEXT, Conversation};
use crate::error::{Error, Result};
use crate::flow::{INTENT_DELIMITER, IntentAddress, SharedHandler};
use crate::session::PermissionCallbacks;

/// A dispatched intent waiting in the turn's queue.
pub(crate) struct QueuedIntent {
    pub address: String,
    pub handler: SharedHandler,
    pub payload: Value,
}

impl Conversation {
    /// Qualify an intent address.
    ///
    /// `flow:intent` is returned as is. An empty flow part stands for the
    /// current flow; an empty or missing intent part stands for the flow's
    /// entry point (`"start"` unless declared otherwise).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowNotFound`] when an entry point is needed and the
    /// flow is not registered.
    pub fn resolve_intent(&self, address: &str) -> Result<String> {
        let mut address = IntentAddress::parse(address);
        if address.flow.is_empty() {
            address.flow.clone_from(&self.state.current_flow);
        }
        if address.intent.is_empty() {
            let flow = self
                .flows
                .get(&address.flow)
                .ok_or_else(|| Error::flow_not_found(&address.flow))?;
            address.intent = flow.entry_intent().to_string();
        }
        Ok(address.to_string())
    }

    /// Dispatch to `address` without a payload. See [`next_with`](Self::next_with).
    ///
    /// # Errors
    ///
    /// Fails when the address does not lead to a registered handler.
    pub fn next(&mut self, address: &str) -> Result<&mut Self> {
        self.next_with(address, Value::Null)
    }

    /// Enqueue the handler at `address` with `payload`.
    ///
    /// The handler runs once every handler queued before it has finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowNotFound`] or [`Error::HandlerNotFound`] when the
    /// address does not lead to a registered handler.
    pub fn next_with(&mut self, address: &str, payload: Value) -> Result<&mut Self> {
        let resolved = self.resolve_intent(address)?;
        let target = IntentAddress::parse(&resolved);
        let handler = self
            .flows
            .handler(&target.flow, &target.intent)
            .ok_or_else(|| Error::handler_not_found(&resolved))?;

        debug!(address = %resolved, queued = self.queue.len(), "intent dispatched");
        self.state.current_flow = target.flow;
        self.current_intent = target.intent;
        self.state.push_payload(payload.clone());
        self.queue.push_back(QueuedIntent {
            address: resolved,
            handler,
            payload,
        });
        Ok(self)
    }

    /// Run queued handlers until the queue is empty, then send the response.
    ///
    /// Handlers run one at a time in dispatch order and may enqueue more.
    /// When `turn.handler_timeout_ms` is configured each handler gets that
    /// long to finish.
    ///
    /// # Errors
    ///
    /// The first handler error ends the turn: the rest of the queue is
    /// dropped and no response is sent.
    pub async fn handle_intent(&mut self) -> Result<()> {
        let deadline = self.config.turn.handler_timeout();
        while let Some(QueuedIntent {
            address,
            handler,
            payload,
        }) = self.queue.pop_front()
        {
            debug!(address = %address, "running handler");
            let outcome = match deadline {
                Some(timeout) => tokio::time::timeout(timeout, handler.handle(self, payload))
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::HandlerTimeout {
                            address: address.clone(),
                            timeout,
                        })
                    }),
                None => handler.handle(self, payload).await,
            };
            if let Err(error) = outcome {
                warn!(address = %address, error = %error, "handler failed, turn aborted");
                self.queue.clear();
                return Err(error);
            }
        }
        self.send_response()
    }

    /// Ask the user to pick one of several options.
    ///
    /// `options` maps an answer (also offered as a suggestion chip) to the
    /// address dispatched when it is chosen. All addresses are resolved
    /// before anything is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowNotFound`] if an address cannot be resolved.
    pub fn confirm<I, K, A>(&mut self, options: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: AsRef<str>,
    {
        let mut callbacks = Vec::new();
        for (option, address) in options {
            callbacks.push((option.into(), self.resolve_intent(address.as_ref())?));
        }
        let chips: Vec<String> = callbacks.iter().map(|(option, _)| option.clone()).collect();
        self.state.confirmation_callbacks = callbacks.into_iter().collect();
        self.suggest(chips);
        Ok(self.expect(CONFIRMATION_CONTEXT))
    }

    /// Dispatch the address stored for the user's answer to [`confirm`](Self::confirm).
    ///
    /// The stored options are cleared whatever the answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownConfirmationOption`] for an answer that was not
    /// offered.
    pub fn handle_confirmation(&mut self, option: &str) -> Result<&mut Self> {
        let mut callbacks = std::mem::take(&mut self.state.confirmation_callbacks);
        let address = callbacks
            .remove(option)
            .ok_or_else(|| Error::UnknownConfirmationOption(option.to_string()))?;
        self.next(&address)
    }

    /// Dispatch the target stored by
    /// [`request_permission`](Self::request_permission) for the user's answer.
    ///
    /// # Errors
    ///
    /// Fails when the stored target no longer resolves to a handler.
    pub fn handle_permission(&mut self, granted: bool) -> Result<&mut Self> {
        let callbacks = self.state.permission_callbacks.take().unwrap_or_default();
        let target = callbacks.target(granted).to_string();
        debug!(granted, target = %target, "permission answered");
        self.next(&target)
    }

    pub(super) fn store_permission_callbacks(&mut self, granted: String, denied: String) {
        self.state.permission_callbacks = Some(PermissionCallbacks { granted, denied });
    }

    /// Remember `address` as the target of a later
    /// [`return_to_previous`](Self::return_to_previous).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlowNotFound`] if the address cannot be resolved.
    pub fn return_to(&mut self, address: &str) -> Result<&mut Self> {
        let resolved = self.resolve_intent(address)?;
        self.state.return_directives.push(resolved);
        Ok(self)
    }

    /// Dispatch the most recent [`return_to`](Self::return_to) target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReturnTarget`] when nothing is stacked.
    pub fn return_to_previous(&mut self, payload: Value) -> Result<&mut Self> {
        let address = self
            .state
            .return_directives
            .pop()
            .ok_or(Error::NoReturnTarget)?;
        self.next_with(&address, payload)
    }

    /// Dispatch the current flow's entry point.
    ///
    /// # Errors
    ///
    /// Fails when the current flow is not registered or has no entry handler.
    pub fn restart_flow(&mut self) -> Result<&mut Self> {
        self.next(INTENT_DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::super::tests::{config, platform};
    use crate::conversation::{Conversation, PERMISSION_CONTEXT};
    use crate::error::Error;
    use crate::flow::{Flow, FlowTable, IntentHandler, handler_fn};
    use crate::platform::dialogflow::ConversationObject;
    use crate::response::{Fragment, Permission};
    use crate::skill::Skill;

    fn say(text: &'static str) -> impl IntentHandler {
        handler_fn(move |conv, _| {
            Box::pin(async move {
                conv.add(text);
                Ok(())
            })
        })
    }

    fn flows() -> FlowTable {
        FlowTable::new()
            .with(
                Flow::new("quiz")
                    .entry_point("welcome")
                    .intent("welcome", say("welcome"))
                    .intent("a", say("a"))
                    .intent("b", say("b")),
            )
            .with(Flow::new("menu").intent("start", say("menu")))
            .with(
                Flow::new("chain")
                    .intent(
                        "first",
                        handler_fn(|conv, _| {
                            Box::pin(async move {
                                conv.add("A");
                                conv.next(":second")?;
                                conv.next(":fourth")?;
                                Ok(())
                            })
                        }),
                    )
                    .intent(
                        "second",
                        handler_fn(|conv, _| {
                            Box::pin(async move {
                                conv.add("B");
                                conv.next(":third")?;
                                Ok(())
                            })
                        }),
                    )
                    .intent("third", say("D"))
                    .intent("fourth", say("C"))
                    .intent(
                        "broken",
                        handler_fn(|conv, _| {
                            Box::pin(async move {
                                conv.add("never sent");
                                conv.next(":third")?;
                                Err(Error::handler("backend unavailable"))
                            })
                        }),
                    )
                    .intent(
                        "slow",
                        handler_fn(|_, _| {
                            Box::pin(async move {
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                Ok(())
                            })
                        }),
                    ),
            )
    }

    fn conversation() -> Conversation {
        Skill::builder(config())
            .flows(flows())
            .seed(7)
            .build()
            .conversation(platform())
    }

    fn speech(conv: &Conversation) -> Vec<String> {
        conv.output()
            .iter()
            .filter_map(|fragment| match fragment {
                Fragment::Speech(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_resolve_intent_forms() {
        let mut conv = conversation();
        assert_eq!(conv.resolve_intent("quiz:a").unwrap(), "quiz:a");
        assert_eq!(conv.resolve_intent("quiz:").unwrap(), "quiz:welcome");
        assert_eq!(conv.resolve_intent("quiz").unwrap(), "quiz:welcome");
        assert_eq!(conv.resolve_intent("menu:").unwrap(), "menu:start");

        conv.next("quiz:a").unwrap();
        assert_eq!(conv.resolve_intent(":b").unwrap(), "quiz:b");
        assert_eq!(conv.resolve_intent("").unwrap(), "quiz:welcome");

        assert!(matches!(
            conv.resolve_intent("nowhere:"),
            Err(Error::FlowNotFound { flow }) if flow == "nowhere"
        ));
    }

    #[test]
    fn test_next_records_position_and_payload() {
        let mut conv = conversation();
        conv.next_with("quiz:b", json!({"round": 2})).unwrap();
        assert_eq!(conv.current_flow(), "quiz");
        assert_eq!(conv.current_intent(), "b");
        assert_eq!(conv.payloads(), [json!({"round": 2})]);
    }

    #[test]
    fn test_next_unknown_handler() {
        let mut conv = conversation();
        assert!(matches!(
            conv.next("quiz:missing"),
            Err(Error::HandlerNotFound { address }) if address == "quiz:missing"
        ));
        assert!(matches!(
            conv.next("nowhere:x"),
            Err(Error::HandlerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_queue_drains_in_fifo_order() {
        let mut conv = conversation();
        conv.next("chain:first").unwrap();
        conv.handle_intent().await.unwrap();

        let object = conv
            .into_platform::<crate::platform::dialogflow::DialogflowPlatform>()
            .unwrap()
            .into_object();
        assert_eq!(
            object.items()[0],
            crate::platform::dialogflow::RichItem::SimpleResponse("<speak>A B C D</speak>".into())
        );
    }

    #[tokio::test]
    async fn test_handler_error_aborts_turn() {
        let mut conv = conversation();
        conv.next("chain:broken").unwrap();
        let err = conv.handle_intent().await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(speech(&conv), vec!["never sent".to_string()]);

        let object = conv
            .into_platform::<crate::platform::dialogflow::DialogflowPlatform>()
            .unwrap()
            .into_object();
        assert!(object.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout() {
        let mut config = config();
        config.turn.handler_timeout_ms = Some(100);
        let mut conv = Skill::builder(config)
            .flows(flows())
            .build()
            .conversation(platform());
        conv.next("chain:slow").unwrap();
        let err = conv.handle_intent().await.unwrap_err();
        assert!(matches!(
            err,
            Error::HandlerTimeout { ref address, timeout }
                if address == "chain:slow" && timeout == Duration::from_millis(100)
        ));
    }

    #[test]
    fn test_confirmation_round_trip() {
        let mut conv = conversation();
        conv.confirm([("yes", "quiz:a"), ("no", "quiz:b")]).unwrap();
        assert_eq!(conv.context(), Some("confirmation"));
        assert_eq!(conv.suggestions(), ["yes", "no"]);
        assert_eq!(conv.session_state().confirmation_callbacks["yes"], "quiz:a");

        conv.handle_confirmation("yes").unwrap();
        assert_eq!(conv.current_intent(), "a");
        assert!(conv.session_state().confirmation_callbacks.is_empty());
    }

    #[test]
    fn test_confirmation_unknown_option() {
        let mut conv = conversation();
        conv.confirm([("yes", "quiz:a")]).unwrap();
        assert!(matches!(
            conv.handle_confirmation("maybe"),
            Err(Error::UnknownConfirmationOption(option)) if option == "maybe"
        ));
        assert!(conv.session_state().confirmation_callbacks.is_empty());
    }

    #[test]
    fn test_confirm_resolves_before_storing() {
        let mut conv = conversation();
        assert!(conv.confirm([("yes", "quiz:a"), ("no", "nowhere:")]).is_err());
        assert!(conv.session_state().confirmation_callbacks.is_empty());
        assert!(conv.suggestions().is_empty());
    }

    #[test]
    fn test_return_stack() {
        let mut conv = conversation();
        conv.return_to("quiz:a").unwrap();
        conv.return_to_previous(json!({"from": "menu"})).unwrap();
        assert_eq!(conv.current_flow(), "quiz");
        assert_eq!(conv.current_intent(), "a");
        assert_eq!(conv.payloads().last(), Some(&json!({"from": "menu"})));

        assert!(matches!(
            conv.return_to_previous(serde_json::Value::Null),
            Err(Error::NoReturnTarget)
        ));
    }

    #[test]
    fn test_permission_round_trip() {
        let mut conv = conversation();
        conv.next("quiz:b").unwrap();
        conv.request_permission([Permission::Name], "menu:", "To greet you")
            .unwrap();
        assert_eq!(conv.context(), Some(PERMISSION_CONTEXT));
        let callbacks = conv.session_state().permission_callbacks.clone().unwrap();
        assert_eq!(callbacks.granted, "quiz:b");
        assert_eq!(callbacks.denied, "menu:start");

        conv.handle_permission(false).unwrap();
        assert_eq!(conv.current_flow(), "menu");
        assert!(conv.session_state().permission_callbacks.is_none());
    }

    #[test]
    fn test_restart_flow() {
        let mut conv = conversation();
        conv.next("quiz:b").unwrap();
        conv.restart_flow().unwrap();
        assert_eq!(conv.current_intent(), "welcome");
    }

    #[tokio::test]
    async fn test_user_id_stable_across_turns() {
        let skill = Skill::builder(config()).flows(flows()).build();
        let mut conv = skill.conversation(platform());
        let first = conv.user_id();
        conv.next("quiz:a").unwrap();
        conv.handle_intent().await.unwrap();
        let object = conv
            .into_platform::<crate::platform::dialogflow::DialogflowPlatform>()
            .unwrap()
            .into_object();

        let next_turn = crate::platform::dialogflow::WebhookConversation::new(
            object.data().clone(),
            object.user_storage().clone(),
        );
        let mut conv = skill
            .conversation(crate::platform::dialogflow::DialogflowPlatform::new(next_turn));
        assert_eq!(conv.user_id(), first);
        assert_eq!(conv.current_flow(), "quiz");
    }
}
