use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::user::UserId;
use crate::flows::states::DialogState;

/// Keyed store of in-progress dialogs. Injected into the dialog controller so
/// the process-local map can be replaced by a shared cache.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Option<DialogState>;
    async fn set(&self, user_id: UserId, state: DialogState);
    async fn delete(&self, user_id: UserId);
}

/// Process-lifetime store. A restart drops every in-progress dialog.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    states: Arc<Mutex<HashMap<UserId, DialogState>>>,
}

impl InMemoryConversationStore {
    pub fn active_count(&self) -> usize {
        match self.states.lock() {
            Ok(states) => states.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, user_id: UserId) -> Option<DialogState> {
        match self.states.lock() {
            Ok(states) => states.get(&user_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&user_id).cloned(),
        }
    }

    async fn set(&self, user_id: UserId, state: DialogState) {
        let mut states = match self.states.lock() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.is_idle() {
            states.remove(&user_id);
        } else {
            states.insert(user_id, state);
        }
    }

    async fn delete(&self, user_id: UserId) {
        match self.states.lock() {
            Ok(mut states) => states.remove(&user_id),
            Err(poisoned) => poisoned.into_inner().remove(&user_id),
        };
    }
}
