//! A local console conversation: stdin lines become direct messages to the bot and its
//! replies are printed as plain text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hearsay_bot::BotRuntime;
use hearsay_core::adapters::UserDirectory;
use hearsay_core::config::{AppConfig, LoadOptions};
use hearsay_core::errors::AdapterError;
use hearsay_core::intents::{InboundMessage, MessageContext};
use hearsay_core::reply::TransportMessage;
use hearsay_server::build_runtime;
use hearsay_slack::events::{dispatcher_for, SlackEnvelope, SlackEvent};
use hearsay_slack::transport::{ReplySink, Transport, TransportError, TransportRunner};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::Mutex;

use crate::commands::CommandResult;

pub const CONSOLE_CHANNEL: &str = "DCONSOLE";
const QUIT_COMMAND: &str = "/quit";
const BANNER: &str = "hearsay console. Say hello, ask about food or the weather, or type /quit.";

#[derive(Clone, Debug)]
pub struct ChatOptions {
    pub name: Option<String>,
    pub user: String,
}

/// Reads one message per line until EOF or `/quit`. Blank lines are skipped.
pub struct ConsoleTransport<R> {
    lines: Mutex<Lines<R>>,
    user_id: String,
    received: AtomicU64,
}

impl<R> ConsoleTransport<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(input: R, user_id: impl Into<String>) -> Self {
        Self {
            lines: Mutex::new(input.lines()),
            user_id: user_id.into(),
            received: AtomicU64::new(0),
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R> Transport for ConsoleTransport<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut lines = self.lines.lock().await;
        loop {
            let Some(line) =
                lines.next_line().await.map_err(|error| TransportError::Receive(error.to_string()))?
            else {
                return Ok(None);
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text.eq_ignore_ascii_case(QUIT_COMMAND) {
                return Ok(None);
            }

            let sequence = self.received.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(Some(SlackEnvelope {
                envelope_id: format!("console-{sequence}"),
                event: SlackEvent::Message(InboundMessage {
                    user_id: self.user_id.clone(),
                    channel_id: CONSOLE_CHANNEL.to_owned(),
                    text: text.to_owned(),
                    context: MessageContext::DirectMessage,
                }),
            }));
        }
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Writes each reply as `bot> ` followed by its plain-text form.
pub struct ConsoleSink<W> {
    output: Mutex<W>,
}

impl<W> ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(output: W) -> Self {
        Self { output: Mutex::new(output) }
    }

    pub async fn line(&self, text: &str) -> Result<(), TransportError> {
        let mut output = self.output.lock().await;
        output
            .write_all(format!("{text}\n").as_bytes())
            .await
            .map_err(|error| TransportError::Send(error.to_string()))?;
        output.flush().await.map_err(|error| TransportError::Send(error.to_string()))
    }
}

#[async_trait]
impl<W> ReplySink for ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn post(
        &self,
        _channel_id: &str,
        message: &TransportMessage,
    ) -> Result<(), TransportError> {
        let text = message.plain_text().replace('\n', "\n     ");
        self.line(&format!("bot> {text}")).await
    }
}

/// Answers greetings with the name given on the command line.
struct ConsoleUser {
    name: Option<String>,
}

#[async_trait]
impl UserDirectory for ConsoleUser {
    async fn display_name(&self, _user_id: &str) -> Result<Option<String>, AdapterError> {
        Ok(self.name.clone())
    }
}

pub fn run(options: ChatOptions) -> CommandResult {
    let config = match AppConfig::load(LoadOptions { offline: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .with_target(false)
        .compact()
        .try_init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("chat", "runtime", error.to_string(), 5);
        }
    };

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    match runtime.block_on(converse(&config, &options, input, tokio::io::stdout())) {
        Ok(messages) => CommandResult::success(
            "chat",
            format!("conversation ended after {messages} message(s)"),
        ),
        Err(error) => CommandResult::failure("chat", error.class, error.message, error.exit_code),
    }
}

#[derive(Debug)]
pub struct ChatError {
    pub class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

/// Runs a whole console conversation and returns how many messages were read.
pub async fn converse<R, W>(
    config: &AppConfig,
    options: &ChatOptions,
    input: R,
    output: W,
) -> Result<u64, ChatError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let users = Arc::new(ConsoleUser { name: options.name.clone() });
    let runtime: BotRuntime = build_runtime(config, users).map_err(|error| ChatError {
        class: "bot_registration",
        message: error.to_string(),
        exit_code: 3,
    })?;

    let transport = Arc::new(ConsoleTransport::new(input, options.user.clone()));
    let sink = Arc::new(ConsoleSink::new(output));
    sink.line(BANNER).await.map_err(|error| ChatError {
        class: "console_io",
        message: error.to_string(),
        exit_code: 4,
    })?;

    let runner = TransportRunner::new(transport, sink, dispatcher_for(Arc::new(runtime)));
    runner.run().await.map_err(|error| ChatError {
        class: "console_io",
        message: error.to_string(),
        exit_code: 4,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hearsay_core::reply::{Attachment, TransportMessage};
    use hearsay_slack::events::SlackEvent;
    use hearsay_slack::transport::{ReplySink, Transport};

    use super::{ConsoleSink, ConsoleTransport, CONSOLE_CHANNEL};

    #[tokio::test]
    async fn transport_skips_blank_lines_and_stops_at_quit() {
        let transport = ConsoleTransport::new(&b"hello\n\n   \nfood\n/quit\nignored\n"[..], "U1");

        let first = transport.next_envelope().await.expect("read").expect("envelope");
        let second = transport.next_envelope().await.expect("read").expect("envelope");
        let end = transport.next_envelope().await.expect("read");

        let SlackEvent::Message(message) = &first.event else {
            panic!("expected a message");
        };
        assert_eq!(message.text, "hello");
        assert_eq!(message.channel_id, CONSOLE_CHANNEL);
        assert_eq!(first.envelope_id, "console-1");
        assert_eq!(second.envelope_id, "console-2");
        assert!(end.is_none());
        assert_eq!(transport.received(), 2);
    }

    #[tokio::test]
    async fn sink_indents_multiline_replies() {
        let sink = Arc::new(ConsoleSink::new(Vec::new()));
        let message = TransportMessage {
            text: None,
            attachments: vec![Attachment {
                title: Some("Weather in Hanover".to_owned()),
                text: Some("Currently 41°F".to_owned()),
                ..Attachment::default()
            }],
        };

        sink.post(CONSOLE_CHANNEL, &message).await.expect("post");

        let written = String::from_utf8(sink.output.lock().await.clone()).expect("utf8");
        assert_eq!(written, "bot> Weather in Hanover\n     Currently 41°F\n");
    }
}
