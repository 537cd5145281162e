//! Minimal Telegram Bot API client over `reqwest`.
//!
//! Only the calls the bot needs are covered: `getMe`, `getUpdates`,
//! `sendMessage`, `editMessageText` and `answerCallbackQuery`. Wire types are
//! private to this module; updates leave it as [`InboundEnvelope`]s.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use lounge_core::config::TelegramConfig;
use lounge_core::domain::user::UserId;

use crate::delivery::{DeliveryError, MessageSink, Outbound};
use crate::events::{
    CallbackEvent, CommandEvent, ContactEvent, InboundEnvelope, InboundEvent, Sender, TextEvent,
};
use crate::messages::ReplyMarkup;

/// Slack on top of the long-poll timeout before the HTTP request gives up.
const REQUEST_GRACE_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build http client: {0}")]
    Build(String),
    #[error("bot api request `{method}` failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("bot api rejected `{method}` ({code:?}): {description}")]
    Rejected { method: &'static str, code: Option<i64>, description: String },
    #[error("bot api returned no result for `{method}`")]
    MissingResult { method: &'static str },
}

impl ApiError {
    fn is_not_modified(&self) -> bool {
        matches!(self, Self::Rejected { description, .. } if description.contains("message is not modified"))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + REQUEST_GRACE_SECS))
            .build()
            .map_err(|error| ApiError::Build(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    pub async fn get_me(&self) -> Result<BotIdentity, ApiError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<InboundEnvelope>, ApiError> {
        let request = GetUpdates {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;
        Ok(updates.into_iter().map(Update::into_envelope).collect())
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<(), ApiError> {
        let request = SendMessage { chat_id, text, reply_markup };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<(), ApiError> {
        let request = EditMessageText { chat_id, message_id, text, reply_markup };
        match self.call::<_, serde_json::Value>("editMessageText", &request).await {
            Ok(_) => Ok(()),
            Err(error) if error.is_not_modified() => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), ApiError> {
        let request = AnswerCallbackQuery { callback_query_id, text };
        let _: serde_json::Value = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret());
        debug!(event_name = "egress.telegram.request", method, "calling bot api");

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Http { method, source: source.without_url() })?;
        let reply: ApiResponse<T> = response
            .json()
            .await
            .map_err(|source| ApiError::Http { method, source: source.without_url() })?;
        reply.into_result(method)
    }
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn deliver(&self, outbound: &Outbound) -> Result<(), DeliveryError> {
        let method = outbound.kind();
        let result = match outbound {
            Outbound::Send { chat_id, message } => {
                self.send_message(*chat_id, &message.text, message.markup.as_ref()).await
            }
            Outbound::Edit { chat_id, message_id, text, markup } => {
                self.edit_message_text(*chat_id, *message_id, text, markup.as_ref()).await
            }
            Outbound::AnswerCallback { callback_id, text } => {
                self.answer_callback_query(callback_id, text.as_deref()).await
            }
        };

        result.map_err(|error| match error {
            ApiError::Rejected { description, .. } => DeliveryError::Rejected { method, description },
            other => DeliveryError::Http(other.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &'static str) -> Result<T, ApiError> {
        if !self.ok {
            return Err(ApiError::Rejected {
                method,
                code: self.error_code,
                description: self.description.unwrap_or_else(|| "no description".to_owned()),
            });
        }
        self.result.ok_or(ApiError::MissingResult { method })
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyMarkup>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyMarkup>,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    from: Option<WireUser>,
    chat: Chat,
    text: Option<String>,
    contact: Option<Contact>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
    first_name: String,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Contact {
    phone_number: String,
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: WireUser,
    message: Option<CallbackMessage>,
    data: Option<String>,
}

/// Telegram may send an "inaccessible" message here; only the ids are used.
#[derive(Debug, Deserialize)]
struct CallbackMessage {
    message_id: i64,
    chat: Chat,
}

impl Update {
    fn into_envelope(self) -> InboundEnvelope {
        let update_id = self.update_id;
        let event = match (self.message, self.callback_query) {
            (Some(message), _) => message_event(message),
            (None, Some(query)) => callback_event(query),
            (None, None) => InboundEvent::Unsupported { kind: "update".to_owned() },
        };
        InboundEnvelope { update_id, event }
    }
}

fn message_event(message: Message) -> InboundEvent {
    let Some(from) = message.from else {
        return InboundEvent::Unsupported { kind: "anonymous_message".to_owned() };
    };
    let sender = Sender {
        user_id: UserId(from.id),
        chat_id: message.chat.id,
        first_name: from.first_name,
        last_name: from.last_name,
    };

    if let Some(contact) = message.contact {
        return InboundEvent::Contact(ContactEvent {
            sender,
            phone_number: contact.phone_number,
            contact_user_id: contact.user_id,
        });
    }

    match message.text {
        Some(text) if text.starts_with('/') => InboundEvent::Command(CommandEvent { sender, text }),
        Some(text) => InboundEvent::Text(TextEvent { sender, text }),
        None => InboundEvent::Unsupported { kind: "non_text_message".to_owned() },
    }
}

fn callback_event(query: CallbackQuery) -> InboundEvent {
    // Private chats share the user's id when the originating message is gone.
    let chat_id = query.message.as_ref().map_or(query.from.id, |message| message.chat.id);
    InboundEvent::Callback(CallbackEvent {
        sender: Sender {
            user_id: UserId(query.from.id),
            chat_id,
            first_name: query.from.first_name,
            last_name: query.from.last_name,
        },
        callback_id: query.id,
        message_id: query.message.map(|message| message.message_id),
        data: query.data.unwrap_or_default(),
    })
}
