//! Ticket lifecycle: creation, submissions, admin responses, closure and
//! listing, with the notifications each step sends.

use log::{error, info, warn};
use std::sync::Arc;

use super::store::{StoreError, TicketStore};
use super::{ui, Ticket, TicketCategory, TicketId};
use crate::core::bot::channels::{ChannelAdapter, InlineKeyboard, SentMessage};

pub struct TicketDesk {
    store: Arc<dyn TicketStore>,
    channel: Arc<dyn ChannelAdapter>,
    admin_id: i64,
}

impl TicketDesk {
    pub fn new(store: Arc<dyn TicketStore>, channel: Arc<dyn ChannelAdapter>, admin_id: i64) -> Self {
        Self {
            store,
            channel,
            admin_id,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }

    /// Delivery is at most once: failures are logged and never retried.
    pub async fn notify(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Option<SentMessage> {
        match self.channel.send_message(chat_id, text, keyboard).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                error!("Failed to send message to {}: {}", chat_id, e);
                None
            }
        }
    }

    async fn report_store_error(&self, chat_id: i64, err: &StoreError, fallback: &str) {
        let text = match err {
            StoreError::NotFound(_) => ui::TICKET_NOT_FOUND,
            StoreError::Closed(_) => ui::TICKET_CLOSED,
            _ => fallback,
        };
        self.notify(chat_id, text, None).await;
    }

    pub async fn create_ticket(
        &self,
        chat_id: i64,
        user_id: i64,
        username: Option<&str>,
        category: TicketCategory,
    ) -> Result<TicketId, StoreError> {
        match self.store.create(user_id, username, category).await {
            Ok(ticket_id) => {
                info!(
                    "Created ticket #{} ({}) for user {}",
                    ticket_id, category, user_id
                );
                Ok(ticket_id)
            }
            Err(e) => {
                error!("Failed to create ticket for user {}: {}", user_id, e);
                self.notify(chat_id, ui::CREATE_FAILED, None).await;
                Err(e)
            }
        }
    }

    /// Appends a requester submission, then confirms to the requester and
    /// forwards the accumulated ticket to the administrator.
    pub async fn submit_message(
        &self,
        chat_id: i64,
        user_id: i64,
        username: Option<&str>,
        ticket_id: TicketId,
        text: &str,
    ) -> Result<Ticket, StoreError> {
        let ticket = match self.store.append_message(ticket_id, user_id, text).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(
                    "Failed to save message for ticket #{} from user {}: {}",
                    ticket_id, user_id, e
                );
                self.report_store_error(chat_id, &e, ui::SAVE_FAILED).await;
                return Err(e);
            }
        };

        self.notify(
            chat_id,
            &ui::message_saved(ticket.id),
            Some(ui::requester_close_keyboard(ticket.id)),
        )
        .await;

        let requester = ui::requester_display(
            username.or(ticket.username.as_deref()),
            ticket.user_id,
        );
        self.notify(
            self.admin_id,
            &ui::admin_ticket_update(&ticket, &requester),
            Some(ui::admin_ticket_keyboard(ticket.id)),
        )
        .await;

        Ok(ticket)
    }

    pub async fn submit_response(
        &self,
        chat_id: i64,
        ticket_id: TicketId,
        response: &str,
    ) -> Result<Ticket, StoreError> {
        let ticket = match self.store.record_response(ticket_id, response).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Failed to save response for ticket #{}: {}", ticket_id, e);
                self.report_store_error(chat_id, &e, ui::RESPONSE_FAILED).await;
                return Err(e);
            }
        };

        self.notify(chat_id, &ui::response_sent(ticket.id), None).await;
        self.notify(
            ticket.user_id,
            &ui::response_for_requester(ticket.id, response),
            Some(ui::requester_reply_keyboard(ticket.id)),
        )
        .await;

        Ok(ticket)
    }

    /// Closes a ticket on behalf of its requester or the administrator and
    /// tells the other party. The closer is never notified twice.
    pub async fn close_ticket(
        &self,
        chat_id: i64,
        closer_id: i64,
        ticket_id: TicketId,
    ) -> Result<Ticket, StoreError> {
        let result = match self.store.get(ticket_id).await {
            Ok(ticket) if !self.is_admin(closer_id) && ticket.user_id != closer_id => {
                Err(StoreError::NotFound(ticket_id))
            }
            Ok(_) => self.store.close(ticket_id).await,
            Err(e) => Err(e),
        };

        let ticket = match result {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("User {} failed to close ticket #{}: {}", closer_id, ticket_id, e);
                self.report_store_error(chat_id, &e, ui::CLOSE_FAILED).await;
                return Err(e);
            }
        };

        info!("Ticket #{} closed by {}", ticket.id, closer_id);
        self.notify(chat_id, &ui::ticket_closed(ticket.id), None).await;

        let counterpart = if self.is_admin(closer_id) {
            ticket.user_id
        } else {
            self.admin_id
        };
        if counterpart != closer_id {
            self.notify(counterpart, &ui::ticket_closed_notice(ticket.id), None)
                .await;
        }

        Ok(ticket)
    }

    pub async fn list_tickets(&self, chat_id: i64, user_id: i64) {
        let tickets = match self.store.list_for_user(user_id).await {
            Ok(tickets) => tickets,
            Err(e) => {
                error!("Failed to list tickets for user {}: {}", user_id, e);
                self.notify(chat_id, ui::STATUS_FAILED, None).await;
                return;
            }
        };

        if tickets.is_empty() {
            self.notify(chat_id, ui::NO_TICKETS, None).await;
            return;
        }

        for ticket in &tickets {
            self.notify(chat_id, &ui::ticket_summary(ticket), None).await;
        }
    }
}
