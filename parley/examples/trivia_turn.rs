//! Two turns of a small trivia skill.
//!
//! The first turn greets the user and asks whether to play; the second turn
//! routes the "yes" answer through the confirmation callbacks and ends the
//! conversation. Each turn prints the Dialogflow webhook response.
//!
//! Run with: `RUST_LOG=parley=debug cargo run --example trivia_turn`

use parley::prelude::*;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"{
    "default_locale": "en-US",
    "locales": {
        "en-US": {
            "chips": { "yes": "Sure!", "no": "Not now" },
            "score": "You have {points, plural, one {# point} other {# points}}."
        }
    },
    "dialog": {
        "en-US": {
            "welcome_1": "Welcome to trivia, {name}!",
            "welcome_2": "Good to see you, {name}!",
            "ask_play": "Ready for a question?",
            "question_1": "Which planet is known as the red planet?",
            "question_2": "What is the largest ocean on Earth?",
            "bye": ["Maybe next time.", "See you soon."]
        }
    },
    "storage": {
        "root_url": "https://assets.example.com/trivia/",
        "paths": { "sfx": "sfx/", "voice": "voice/" }
    }
}"#;

fn flows() -> FlowTable {
    FlowTable::new().with(
        Flow::new("game")
            .entry_point("welcome")
            .intent(
                "welcome",
                handler_fn(|conv, _| {
                    Box::pin(async move {
                        conv.say_with("welcome_*", json!({ "name": "Sam" }))
                            .play("jingle", "")
                            .say("ask_play");
                        conv.confirm([("chips.yes", "game:question"), ("chips.no", "game:bye")])?;
                        Ok(())
                    })
                }),
            )
            .intent(
                "question",
                handler_fn(|conv, _| {
                    Box::pin(async move {
                        let score = conv.translate("score", &json!({ "points": 1 }));
                        conv.add(score).say("question_*").show("planet_{4}", None);
                        conv.track("question_asked", Value::Null);
                        conv.end();
                        Ok(())
                    })
                }),
            )
            .intent(
                "bye",
                handler_fn(|conv, _| {
                    Box::pin(async move {
                        conv.say("bye").end();
                        Ok(())
                    })
                }),
            ),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let skill = Skill::builder(Config::from_json_str(CONFIG)?)
        .flows(flows())
        .tracker(Arc::new(LogTracker))
        .build();

    let object = WebhookConversation::default()
        .with_surface_capabilities([Capability::SCREEN_OUTPUT]);
    let first = skill
        .run_turn(DialogflowPlatform::new(object), "game", Value::Null)
        .await?
        .into_object();
    println!("{}", serde_json::to_string_pretty(&first.to_response())?);

    let object = WebhookConversation::new(first.data().clone(), first.user_storage().clone())
        .with_surface_capabilities([Capability::SCREEN_OUTPUT]);
    let mut conversation = skill.conversation(DialogflowPlatform::new(object));
    conversation.handle_confirmation("chips.yes")?;
    conversation.handle_intent().await?;
    let second = conversation
        .into_platform::<DialogflowPlatform>()
        .ok_or_else(|| anyhow::anyhow!("unexpected platform type"))?
        .into_object();
    println!("{}", serde_json::to_string_pretty(&second.to_response())?);

    Ok(())
}
