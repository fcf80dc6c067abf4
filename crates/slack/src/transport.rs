use std::sync::Arc;

use async_trait::async_trait;
use hearsay_core::reply::TransportMessage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("transport send failed: {0}")]
    Send(String),
}

/// A source of envelopes that must be acknowledged once received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Where rendered replies go.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn post(&self, channel_id: &str, message: &TransportMessage)
        -> Result<(), TransportError>;
}

/// Posts every message of a handler result in order, stopping at the first failure.
pub async fn deliver(
    sink: &dyn ReplySink,
    result: &HandlerResult,
    ctx: &EventContext,
) -> Result<usize, TransportError> {
    let HandlerResult::Responded { channel_id, messages } = result else {
        return Ok(0);
    };

    for message in messages {
        sink.post(channel_id, message).await?;
    }
    debug!(
        event_name = "egress.slack.replies_sent",
        correlation_id = %ctx.correlation_id,
        channel_id = %channel_id,
        count = messages.len(),
        "delivered replies"
    );
    Ok(messages.len())
}

/// Pumps one transport's envelopes through the dispatcher, one at a time, until the
/// stream ends.
pub struct TransportRunner {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ReplySink>,
    dispatcher: EventDispatcher,
}

impl TransportRunner {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ReplySink>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self { transport, sink, dispatcher }
    }

    /// Returns once the transport closes. Connect, read, and disconnect failures end the
    /// run; a failed ack, dispatch, or delivery is logged and the next envelope is read.
    pub async fn run(&self) -> Result<u64, TransportError> {
        self.transport.connect().await?;
        info!(event_name = "ingress.transport.connected", "transport connected");

        let mut handled = 0;
        while let Some(envelope) = self.transport.next_envelope().await? {
            self.handle_envelope(&envelope).await;
            handled += 1;
        }

        info!(event_name = "ingress.transport.closed", handled, "transport stream closed");
        self.transport.disconnect().await?;
        Ok(handled)
    }

    async fn handle_envelope(&self, envelope: &SlackEnvelope) {
        let (user_id, channel_id) = correlation_fields(envelope);
        let user_id = user_id.unwrap_or("unknown");
        let channel_id = channel_id.unwrap_or("unknown");
        let context = EventContext { correlation_id: envelope.envelope_id.clone() };

        info!(
            event_name = "ingress.slack.envelope_received",
            correlation_id = %context.correlation_id,
            event_type = ?envelope.event.event_type(),
            user_id,
            channel_id,
            "received envelope"
        );

        match self.transport.acknowledge(&envelope.envelope_id).await {
            Ok(()) => debug!(
                event_name = "ingress.slack.ack_sent",
                correlation_id = %context.correlation_id,
                "acknowledged envelope"
            ),
            Err(error) => warn!(
                event_name = "ingress.slack.ack_failed",
                correlation_id = %context.correlation_id,
                error = %error,
                "failed to acknowledge envelope"
            ),
        }

        let result = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.dispatch_failed",
                    correlation_id = %context.correlation_id,
                    user_id,
                    channel_id,
                    error = %error,
                    "event dispatch failed"
                );
                return;
            }
        };

        if let Err(error) = deliver(self.sink.as_ref(), &result, &context).await {
            warn!(
                event_name = "egress.slack.reply_failed",
                correlation_id = %context.correlation_id,
                channel_id,
                error = %error,
                "failed to deliver replies"
            );
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::Message(message) => {
            (Some(message.user_id.as_str()), Some(message.channel_id.as_str()))
        }
        SlackEvent::Unsupported { .. } => (None, None),
    }
}
