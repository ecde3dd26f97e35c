//! Per-user conversation state.
//!
//! Each user (the administrator included) has at most one slot saying what the
//! bot expects from them next. Slots live in memory only and are lost on
//! restart.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::tickets::TicketId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationStep {
    /// Nothing pending; the next plain message starts a new ticket.
    #[default]
    Idle,
    AwaitingProblemDescription,
    AwaitingAdminResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationState {
    pub step: ConversationStep,
    /// 0 when no ticket is attached.
    pub ticket_id: TicketId,
    /// Outbound message to edit in place on the next step.
    pub message_id: Option<i64>,
}

impl ConversationState {
    pub fn category_prompt(message_id: i64) -> Self {
        Self {
            step: ConversationStep::Idle,
            ticket_id: 0,
            message_id: Some(message_id),
        }
    }

    pub fn awaiting_description(ticket_id: TicketId) -> Self {
        Self {
            step: ConversationStep::AwaitingProblemDescription,
            ticket_id,
            message_id: None,
        }
    }

    pub fn awaiting_response(ticket_id: TicketId) -> Self {
        Self {
            step: ConversationStep::AwaitingAdminResponse,
            ticket_id,
            message_id: None,
        }
    }
}

pub type StateUpdate =
    Box<dyn FnOnce(Option<ConversationState>) -> Option<ConversationState> + Send>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, user_id: i64) -> Option<ConversationState>;

    /// Atomically replaces the slot with `f(current)` (`None` removes it) and
    /// returns the previous value.
    async fn update(&self, user_id: i64, f: StateUpdate) -> Option<ConversationState>;

    async fn set(&self, user_id: i64, state: ConversationState) {
        self.update(user_id, Box::new(move |_| Some(state))).await;
    }

    async fn replace(&self, user_id: i64, state: ConversationState) -> Option<ConversationState> {
        self.update(user_id, Box::new(move |_| Some(state))).await
    }

    async fn clear(&self, user_id: i64) -> Option<ConversationState> {
        self.update(user_id, Box::new(|_| None)).await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    states: Mutex<HashMap<i64, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.lock().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, user_id: i64) -> Option<ConversationState> {
        self.states.lock().await.get(&user_id).copied()
    }

    async fn update(&self, user_id: i64, f: StateUpdate) -> Option<ConversationState> {
        let mut states = self.states.lock().await;
        let previous = states.get(&user_id).copied();
        match f(previous) {
            Some(next) => {
                states.insert(user_id, next);
            }
            None => {
                states.remove(&user_id);
            }
        }
        previous
    }
}
