use std::collections::VecDeque;
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::TelegramClient;
use crate::delivery::MessageSink;
use crate::events::{EventContext, EventDispatcher, HandlerResult, InboundEnvelope};

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
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("update transport failed {attempts} times in a row; last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `None` means the stream ended and the runner should stop.
    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError>;
    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// `getUpdates` long polling. An update is confirmed to Telegram by the
/// offset sent with the following poll.
pub struct LongPollTransport {
    client: TelegramClient,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    offset: Option<i64>,
    buffered: VecDeque<InboundEnvelope>,
}

impl LongPollTransport {
    pub fn new(client: TelegramClient) -> Self {
        Self { client, state: Mutex::new(PollState::default()) }
    }
}

#[async_trait]
impl UpdateTransport for LongPollTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let identity =
            self.client.get_me().await.map_err(|error| TransportError::Connect(error.to_string()))?;
        info!(
            event_name = "ingress.telegram.connected",
            bot_id = identity.id,
            bot_username = identity.username.as_deref().unwrap_or("unknown"),
            "bot api reachable"
        );
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(envelope) = state.buffered.pop_front() {
                return Ok(Some(envelope));
            }
            let updates = self
                .client
                .get_updates(state.offset)
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?;
            debug!(count = updates.len(), offset = ?state.offset, "long poll returned");
            state.buffered.extend(updates);
        }
    }

    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        let next = update_id + 1;
        if state.offset.map_or(true, |offset| next > offset) {
            state.offset = Some(next);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.state.lock().await.buffered.clear();
        Ok(())
    }
}

/// Pulls updates, hands them to the dispatcher and delivers the replies.
pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<EventDispatcher>,
    sink: Arc<dyn MessageSink>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: Arc<EventDispatcher>,
        sink: Arc<dyn MessageSink>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, sink, reconnect_policy }
    }

    /// Runs until the transport closes. Consecutive failures are retried with
    /// backoff; any processed update resets the count.
    pub async fn run(&self) -> Result<(), RunnerError> {
        let mut attempt = 0_u32;
        loop {
            let mut processed = 0_u64;
            let error = match self.connect_and_pump(attempt, &mut processed).await {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };
            if processed > 0 {
                attempt = 0;
            }

            warn!(
                event_name = "ingress.telegram.transport_failed",
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %error,
                "update transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                return Err(RunnerError::RetriesExhausted { attempts: attempt + 1, last_error: error });
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(&self, attempt: u32, processed: &mut u64) -> Result<(), TransportError> {
        info!(attempt, "opening update transport");
        self.transport.connect().await?;

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "update stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let context = EventContext::for_update(envelope.update_id);
            let user_id = envelope.event.sender().map(|sender| sender.user_id.0);

            info!(
                event_name = "ingress.telegram.update_received",
                update_id = envelope.update_id,
                event_type = ?envelope.event.event_type(),
                user_id,
                correlation_id = %context.correlation_id,
                "received telegram update"
            );

            if let Err(error) = self.transport.acknowledge(envelope.update_id).await {
                warn!(
                    event_name = "ingress.telegram.ack_failed",
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "failed to acknowledge update"
                );
            }

            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(replies)) => {
                    for outbound in &replies {
                        if let Err(error) = self.sink.deliver(outbound).await {
                            warn!(
                                event_name = "egress.telegram.delivery_failed",
                                method = outbound.kind(),
                                user_id,
                                correlation_id = %context.correlation_id,
                                error = %error,
                                "failed to deliver reply"
                            );
                        }
                    }
                }
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
                Err(error) => warn!(
                    event_name = "ingress.telegram.dispatch_failed",
                    user_id,
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "event dispatch failed; continuing poll loop"
                ),
            }
            *processed += 1;
        }
    }
}
