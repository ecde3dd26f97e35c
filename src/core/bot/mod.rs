pub mod channels;


use log::{debug, info, warn};
use std::sync::Arc;

use crate::core::session::{ConversationState, ConversationStep, ConversationStore};
use crate::tickets::actions::{CallbackAction, CallbackParseError};
use crate::tickets::handlers::TicketDesk;
use crate::tickets::store::{StoreError, TicketStore};
use crate::tickets::{ui, Ticket, TicketCategory, TicketId};
use channels::ChannelAdapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command { name: String, args: String },
    Text(String),
    /// Button press. `message_id` and `message_text` describe the message
    /// carrying the button, when the transport provides it.
    Callback {
        tag: String,
        message_id: Option<i64>,
        message_text: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender_id: i64,
    pub sender_username: Option<String>,
    pub chat_id: i64,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Text starting with `/` is a command; its name runs up to the first
    /// space or `@`.
    pub fn from_text(
        sender_id: i64,
        sender_username: Option<String>,
        chat_id: i64,
        text: &str,
    ) -> Self {
        let kind = match text.strip_prefix('/') {
            Some(rest) => {
                let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let name = head.split('@').next().unwrap_or_default();
                EventKind::Command {
                    name: name.to_string(),
                    args: args.trim().to_string(),
                }
            }
            None => EventKind::Text(text.to_string()),
        };

        Self {
            sender_id,
            sender_username,
            chat_id,
            kind,
        }
    }
}

/// Routes inbound events through the conversation state machine.
pub struct SupportBot {
    desk: TicketDesk,
    conversations: Arc<dyn ConversationStore>,
    channel: Arc<dyn ChannelAdapter>,
    admin_id: i64,
}

impl SupportBot {
    pub fn new(
        store: Arc<dyn TicketStore>,
        channel: Arc<dyn ChannelAdapter>,
        conversations: Arc<dyn ConversationStore>,
        admin_id: i64,
    ) -> Self {
        Self {
            desk: TicketDesk::new(store, channel.clone(), admin_id),
            conversations,
            channel,
            admin_id,
        }
    }

    /// Handles one event to completion. Failures are reported to the sender
    /// and logged, never returned.
    pub async fn handle_event(&self, event: InboundEvent) {
        debug!(
            "Event from {} in chat {}: {:?}",
            event.sender_id, event.chat_id, event.kind
        );

        match &event.kind {
            EventKind::Command { name, .. } => self.handle_command(&event, name).await,
            EventKind::Text(text) => self.handle_text(&event, text).await,
            EventKind::Callback {
                tag,
                message_id,
                message_text,
            } => {
                self.handle_callback(&event, tag, *message_id, message_text.as_deref())
                    .await
            }
        }
    }

    async fn handle_command(&self, event: &InboundEvent, name: &str) {
        match name {
            "start" => {
                self.desk.notify(event.chat_id, ui::WELCOME, None).await;
            }
            "status" => self.desk.list_tickets(event.chat_id, event.sender_id).await,
            other => {
                debug!("Unknown command /{} from {}", other, event.sender_id);
                self.desk.notify(event.chat_id, ui::UNKNOWN_COMMAND, None).await;
            }
        }
    }

    async fn handle_text(&self, event: &InboundEvent, text: &str) {
        let sender = event.sender_id;
        let state = self.conversations.get(sender).await.unwrap_or_default();

        match state.step {
            ConversationStep::AwaitingAdminResponse if sender == self.admin_id => {
                let result = self
                    .desk
                    .submit_response(event.chat_id, state.ticket_id, text)
                    .await;
                self.finish_step(sender, result).await;
            }
            ConversationStep::AwaitingProblemDescription => {
                let result = self
                    .desk
                    .submit_message(
                        event.chat_id,
                        sender,
                        event.sender_username.as_deref(),
                        state.ticket_id,
                        text,
                    )
                    .await;
                self.finish_step(sender, result).await;
            }
            _ => self.start_ticket_creation(event).await,
        }
    }

    /// Leaves the state in place only when retrying the same step can work.
    async fn finish_step(&self, user_id: i64, result: Result<Ticket, StoreError>) {
        match result {
            Err(e) if e.is_transient() => {
                debug!("Keeping conversation state of {} after: {}", user_id, e);
            }
            _ => {
                self.conversations.clear(user_id).await;
            }
        }
    }

    async fn start_ticket_creation(&self, event: &InboundEvent) {
        let prompt = self
            .desk
            .notify(event.chat_id, ui::CHOOSE_CATEGORY, Some(ui::category_keyboard()))
            .await;

        if let Some(sent) = prompt {
            self.conversations
                .set(event.sender_id, ConversationState::category_prompt(sent.message_id))
                .await;
        }
    }

    async fn handle_callback(
        &self,
        event: &InboundEvent,
        tag: &str,
        message_id: Option<i64>,
        message_text: Option<&str>,
    ) {
        let action = match tag.parse::<CallbackAction>() {
            Ok(action) => action,
            Err(CallbackParseError::InvalidTicketId(raw)) => {
                debug!("Invalid ticket ID in callback {:?} from {}", raw, event.sender_id);
                self.desk.notify(event.chat_id, ui::INVALID_TICKET_ID, None).await;
                return;
            }
            Err(e @ CallbackParseError::Unsupported(_)) => {
                warn!("{} (from {})", e, event.sender_id);
                self.desk.notify(event.chat_id, ui::UNSUPPORTED_ACTION, None).await;
                return;
            }
        };

        match action {
            CallbackAction::Cancel => {
                self.conversations.clear(event.sender_id).await;
                self.desk.notify(event.chat_id, ui::CANCELLED, None).await;
            }
            CallbackAction::RespondToTicket(ticket_id) => {
                if event.sender_id != self.admin_id {
                    warn!(
                        "User {} tried to respond to ticket #{}",
                        event.sender_id, ticket_id
                    );
                    self.desk.notify(event.chat_id, ui::UNSUPPORTED_ACTION, None).await;
                    return;
                }
                self.conversations
                    .set(event.sender_id, ConversationState::awaiting_response(ticket_id))
                    .await;
                self.desk.notify(event.chat_id, ui::ENTER_RESPONSE, None).await;
                self.strip_buttons(event.chat_id, message_id, message_text).await;
            }
            CallbackAction::ReplyToTicket(ticket_id) => {
                self.conversations
                    .set(
                        event.sender_id,
                        ConversationState::awaiting_description(ticket_id),
                    )
                    .await;
                self.desk.notify(event.chat_id, ui::ENTER_MESSAGE, None).await;
                self.strip_buttons(event.chat_id, message_id, message_text).await;
            }
            CallbackAction::CloseTicket(ticket_id) => {
                match self
                    .desk
                    .close_ticket(event.chat_id, event.sender_id, ticket_id)
                    .await
                {
                    Ok(ticket) => debug!("Ticket #{} is now {}", ticket.id, ticket.status),
                    Err(e) => debug!("Close of ticket #{} not applied: {}", ticket_id, e),
                }
                self.strip_buttons(event.chat_id, message_id, message_text).await;
            }
            CallbackAction::SelectCategory(category) => {
                self.select_category(event, category, message_id).await;
            }
        }
    }

    async fn select_category(
        &self,
        event: &InboundEvent,
        category: TicketCategory,
        message_id: Option<i64>,
    ) {
        let ticket_id: TicketId = match self
            .desk
            .create_ticket(
                event.chat_id,
                event.sender_id,
                event.sender_username.as_deref(),
                category,
            )
            .await
        {
            Ok(id) => id,
            Err(_) => return,
        };

        let previous = self
            .conversations
            .replace(event.sender_id, ConversationState::awaiting_description(ticket_id))
            .await;

        if let Some(prompt_id) = previous.and_then(|s| s.message_id).or(message_id) {
            if let Err(e) = self
                .channel
                .edit_message(event.chat_id, prompt_id, ui::CATEGORY_SELECTED, None)
                .await
            {
                warn!("Failed to update category prompt {}: {}", prompt_id, e);
            }
        }

        info!(
            "User {} opened ticket #{} in category {}",
            event.sender_id, ticket_id, category
        );
        self.desk.notify(event.chat_id, ui::DESCRIBE_PROBLEM, None).await;
    }

    /// Keeps the text of an answered prompt but drops its buttons.
    async fn strip_buttons(&self, chat_id: i64, message_id: Option<i64>, text: Option<&str>) {
        let (Some(message_id), Some(text)) = (message_id, text) else {
            return;
        };
        if let Err(e) = self
            .channel
            .edit_message(chat_id, message_id, text, None)
            .await
        {
            warn!("Failed to remove buttons from message {}: {}", message_id, e);
        }
    }
}
