use async_trait::async_trait;
use hearsay_core::intents::InboundMessage;
use hearsay_core::reply::ReplyPayload;
use hearsay_slack::events::{EventContext, EventHandlerError, MessageService};
use tracing::info;

use crate::runtime::BotRuntime;

#[async_trait]
impl MessageService for BotRuntime {
    async fn handle_message(
        &self,
        message: &InboundMessage,
        ctx: &EventContext,
    ) -> Result<Vec<ReplyPayload>, EventHandlerError> {
        let replies = self.handle(message).await;
        info!(
            event_name = "bot.message.handled",
            correlation_id = %ctx.correlation_id,
            user_id = %message.user_id,
            channel_id = %message.channel_id,
            context = message.context.as_str(),
            replies = replies.len(),
            "handled message"
        );
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hearsay_core::adapters::Unconfigured;
    use hearsay_core::intents::{InboundMessage, MessageContext};
    use hearsay_core::reply::TransportMessage;
    use hearsay_slack::events::{dispatcher_for, EventContext, HandlerResult, SlackEnvelope, SlackEvent};

    use crate::runtime::{BotDeps, BotRuntime, BotSettings};

    fn runtime() -> Arc<BotRuntime> {
        let unconfigured = Arc::new(Unconfigured { provider: "test" });
        Arc::new(
            BotRuntime::new(
                BotSettings::default(),
                BotDeps {
                    places: unconfigured.clone(),
                    weather: unconfigured.clone(),
                    users: unconfigured,
                },
            )
            .expect("runtime"),
        )
    }

    fn envelope(text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "Ev1".to_owned(),
            event: SlackEvent::Message(InboundMessage {
                user_id: "U1".to_owned(),
                channel_id: "C1".to_owned(),
                text: text.to_owned(),
                context: MessageContext::DirectMention,
            }),
        }
    }

    #[tokio::test]
    async fn dispatcher_replies_in_the_originating_channel() {
        let dispatcher = dispatcher_for(runtime());

        let result = dispatcher
            .dispatch(&envelope("hey"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(
            result,
            HandlerResult::Responded {
                channel_id: "C1".to_owned(),
                messages: vec![TransportMessage::text("Hello there!")],
            }
        );
    }

    #[tokio::test]
    async fn unconfigured_search_ends_the_food_flow_politely() {
        let runtime = runtime();
        let dispatcher = dispatcher_for(runtime.clone());

        for text in ["food", "yes", "tacos"] {
            dispatcher.dispatch(&envelope(text), &EventContext::default()).await.expect("step");
        }
        let result = dispatcher
            .dispatch(&envelope("Hanover"), &EventContext::default())
            .await
            .expect("dispatch");

        let HandlerResult::Responded { messages, .. } = result else {
            panic!("expected replies");
        };
        assert_eq!(
            messages.last(),
            Some(&TransportMessage::text(
                "Sorry, I couldn't look up tacos right now. Let's try again later."
            ))
        );
        assert_eq!(runtime.active_sessions(), 0);
    }
}
