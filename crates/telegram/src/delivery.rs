use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::messages::{OutboundMessage, ReplyMarkup};

/// One outbound Bot API call produced by the dialog layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Send { chat_id: i64, message: OutboundMessage },
    Edit { chat_id: i64, message_id: i64, text: String, markup: Option<ReplyMarkup> },
    AnswerCallback { callback_id: String, text: Option<String> },
}

impl Outbound {
    pub fn send(chat_id: i64, message: OutboundMessage) -> Self {
        Self::Send { chat_id, message }
    }

    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self::Send { chat_id, message: OutboundMessage::text(text) }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send_message",
            Self::Edit { .. } => "edit_message_text",
            Self::AnswerCallback { .. } => "answer_callback_query",
        }
    }

    /// Visible text of a send or edit.
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            Self::Send { message, .. } => Some(&message.text),
            Self::Edit { text, .. } => Some(text),
            Self::AnswerCallback { .. } => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("bot api request failed: {0}")]
    Http(String),
    #[error("bot api rejected `{method}`: {description}")]
    Rejected { method: &'static str, description: String },
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, outbound: &Outbound) -> Result<(), DeliveryError>;
}

/// Keeps every delivered call in memory. Used for dry runs and tests.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Outbound>>,
    fail_chat_id: Option<i64>,
}

impl RecordingSink {
    /// A sink that rejects every send addressed to `chat_id`.
    pub fn failing_for(chat_id: i64) -> Self {
        Self { delivered: Mutex::default(), fail_chat_id: Some(chat_id) }
    }

    pub fn delivered(&self) -> Vec<Outbound> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter_map(|outbound| match outbound {
                Outbound::Send { chat_id: target, message } if target == chat_id => {
                    Some(message.text)
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn deliver(&self, outbound: &Outbound) -> Result<(), DeliveryError> {
        if let (Some(failing), Outbound::Send { chat_id, .. }) = (self.fail_chat_id, outbound) {
            if failing == *chat_id {
                return Err(DeliveryError::Rejected {
                    method: "sendMessage",
                    description: "Bad Request: chat not found".to_owned(),
                });
            }
        }
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(outbound.clone()),
            Err(poisoned) => poisoned.into_inner().push(outbound.clone()),
        }
        Ok(())
    }
}
