use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use lounge_core::domain::user::UserId;

use crate::controller::DialogController;
use crate::delivery::Outbound;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub update_id: i64,
    pub event: InboundEvent,
}

/// Who sent an event and where replies go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub user_id: UserId,
    pub chat_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Command(CommandEvent),
    Text(TextEvent),
    Contact(ContactEvent),
    Callback(CallbackEvent),
    Unsupported { kind: String },
}

impl InboundEvent {
    pub fn event_type(&self) -> InboundEventType {
        match self {
            Self::Command(_) => InboundEventType::Command,
            Self::Text(_) => InboundEventType::Text,
            Self::Contact(_) => InboundEventType::Contact,
            Self::Callback(_) => InboundEventType::Callback,
            Self::Unsupported { .. } => InboundEventType::Unsupported,
        }
    }

    pub fn sender(&self) -> Option<&Sender> {
        match self {
            Self::Command(event) => Some(&event.sender),
            Self::Text(event) => Some(&event.sender),
            Self::Contact(event) => Some(&event.sender),
            Self::Callback(event) => Some(&event.sender),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    Command,
    Text,
    Contact,
    Callback,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub sender: Sender,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEvent {
    pub sender: Sender,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactEvent {
    pub sender: Sender,
    pub phone_number: String,
    /// Telegram account the shared contact belongs to, if it has one.
    pub contact_user_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackEvent {
    pub sender: Sender,
    pub callback_id: String,
    pub message_id: Option<i64>,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

impl EventContext {
    pub fn for_update(update_id: i64) -> Self {
        Self { correlation_id: format!("update-{update_id}") }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<Outbound>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("handler for {expected:?} events received a {received:?} event")]
    Misrouted { expected: InboundEventType, received: InboundEventType },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> InboundEventType;
    async fn handle(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// One async mutex per user id; entries are dropped once nobody holds them.
#[derive(Default)]
struct UserLocks {
    locks: std::sync::Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    fn lock_for(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(user_id).or_default())
    }

    fn prune(&self) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Routes each event to the handler registered for its type. Events from the
/// same user are handled one at a time.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventType, Arc<dyn EventHandler>>,
    user_locks: UserLocks,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        let Some(sender) = envelope.event.sender() else {
            return handler.handle(envelope, ctx).await.map_err(DispatchError::from);
        };

        let user_lock = self.user_locks.lock_for(sender.user_id);
        let result = {
            let _guard = user_lock.lock().await;
            handler.handle(envelope, ctx).await
        };
        drop(user_lock);
        self.user_locks.prune();

        result.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn tracked_users(&self) -> usize {
        self.user_locks.len()
    }
}

/// Hands every user-originated event to the dialog controller.
pub struct DialogEventHandler {
    event_type: InboundEventType,
    controller: Arc<DialogController>,
}

impl DialogEventHandler {
    pub fn new(event_type: InboundEventType, controller: Arc<DialogController>) -> Self {
        Self { event_type, controller }
    }
}

#[async_trait]
impl EventHandler for DialogEventHandler {
    fn event_type(&self) -> InboundEventType {
        self.event_type
    }

    async fn handle(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let received = envelope.event.event_type();
        if received != self.event_type {
            return Err(EventHandlerError::Misrouted { expected: self.event_type, received });
        }

        let replies = self.controller.handle(&envelope.event, ctx).await;
        Ok(if replies.is_empty() {
            HandlerResult::Processed
        } else {
            HandlerResult::Responded(replies)
        })
    }
}

pub fn dialog_dispatcher(controller: Arc<DialogController>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    for event_type in [
        InboundEventType::Command,
        InboundEventType::Text,
        InboundEventType::Contact,
        InboundEventType::Callback,
    ] {
        dispatcher.register(DialogEventHandler::new(event_type, Arc::clone(&controller)));
    }
    dispatcher
}
