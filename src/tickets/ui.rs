//! Texts and button layouts shown to requesters and the administrator.

use super::actions::CallbackAction;
use super::{category_label, status_label, Ticket, TicketCategory, TicketId};
use crate::core::bot::channels::{InlineButton, InlineKeyboard};

pub const WELCOME: &str =
    "👋 Welcome to the support service! Send a message to open a ticket ✉️";
pub const UNKNOWN_COMMAND: &str = "❌ Unknown command. Use /start or /status!";
pub const CHOOSE_CATEGORY: &str = "📋 Choose the category of your request:";
pub const CATEGORY_SELECTED: &str = "✅ Category selected. Describe your problem:";
pub const DESCRIBE_PROBLEM: &str = "📝 Describe your problem:";
pub const CANCELLED: &str = "🚫 Ticket creation cancelled.";
pub const ENTER_RESPONSE: &str = "📝 Enter your response to the ticket:";
pub const ENTER_MESSAGE: &str = "💬 Enter your message for support:";
pub const NO_TICKETS: &str = "ℹ️ You have no tickets.";

pub const INVALID_TICKET_ID: &str = "❌ Error: invalid ticket ID.";
pub const UNSUPPORTED_ACTION: &str = "❌ Error: invalid category or unsupported action.";
pub const CREATE_FAILED: &str = "❌ Failed to create the ticket.";
pub const SAVE_FAILED: &str = "❌ Failed to save the ticket.";
pub const RESPONSE_FAILED: &str = "❌ Failed to save the response.";
pub const CLOSE_FAILED: &str = "❌ Failed to close the ticket.";
pub const STATUS_FAILED: &str = "❌ Failed to fetch ticket status.";
pub const TICKET_NOT_FOUND: &str = "❌ Error: ticket not found.";
pub const TICKET_CLOSED: &str =
    "🔒 This ticket is already closed. Send a new message to open another one.";

const CLOSE_BUTTON: &str = "✔️ Problem solved!";
const RESPOND_BUTTON: &str = "📝 Respond";
const REPLY_BUTTON: &str = "📝 Reply";
const CANCEL_BUTTON: &str = "🚫 Cancel";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

fn button(text: &str, action: CallbackAction) -> InlineButton {
    InlineButton::callback(text, action.to_tag())
}

fn category_button(category: TicketCategory) -> InlineButton {
    button(category.label(), CallbackAction::SelectCategory(category))
}

pub fn category_keyboard() -> InlineKeyboard {
    InlineKeyboard::new()
        .row(vec![
            category_button(TicketCategory::Technical),
            category_button(TicketCategory::Billing),
        ])
        .row(vec![
            category_button(TicketCategory::General),
            category_button(TicketCategory::Other),
        ])
        .row(vec![button(CANCEL_BUTTON, CallbackAction::Cancel)])
}

/// Under the requester's submission confirmation.
pub fn requester_close_keyboard(ticket_id: TicketId) -> InlineKeyboard {
    InlineKeyboard::new().row(vec![button(
        CLOSE_BUTTON,
        CallbackAction::CloseTicket(ticket_id),
    )])
}

pub fn admin_ticket_keyboard(ticket_id: TicketId) -> InlineKeyboard {
    InlineKeyboard::new().row(vec![
        button(RESPOND_BUTTON, CallbackAction::RespondToTicket(ticket_id)),
        button(CLOSE_BUTTON, CallbackAction::CloseTicket(ticket_id)),
    ])
}

pub fn requester_reply_keyboard(ticket_id: TicketId) -> InlineKeyboard {
    InlineKeyboard::new().row(vec![
        button(REPLY_BUTTON, CallbackAction::ReplyToTicket(ticket_id)),
        button(CLOSE_BUTTON, CallbackAction::CloseTicket(ticket_id)),
    ])
}

pub fn requester_display(username: Option<&str>, user_id: i64) -> String {
    match username.filter(|name| !name.is_empty()) {
        Some(name) => format!("@{name}"),
        None => format!("id {user_id}"),
    }
}

pub fn message_saved(ticket_id: TicketId) -> String {
    format!("✅ Ticket #{ticket_id} updated! We will reply soon ✉️")
}

pub fn admin_ticket_update(ticket: &Ticket, requester: &str) -> String {
    format!(
        "✨ Ticket #{} update\n👤 User: {}\n📋 Category: {}\n💬 Message: {}",
        ticket.id,
        requester,
        category_label(&ticket.category),
        ticket.message.as_deref().unwrap_or_default(),
    )
}

pub fn response_sent(ticket_id: TicketId) -> String {
    format!("📤 Response to ticket #{ticket_id} sent! ✅")
}

pub fn response_for_requester(ticket_id: TicketId, response: &str) -> String {
    format!("✨ Response to your ticket #{ticket_id}:\n\n💬 {response}")
}

pub fn ticket_closed(ticket_id: TicketId) -> String {
    format!("✅ Ticket #{ticket_id} closed! 🎉")
}

pub fn ticket_closed_notice(ticket_id: TicketId) -> String {
    format!("ℹ️ Ticket #{ticket_id} has been closed.")
}

pub fn ticket_summary(ticket: &Ticket) -> String {
    let mut summary = format!(
        "📋 Ticket #{}\n📌 Category: {}\n💬 Message: {}\n📈 Status: {}\n🕒 Created: {}",
        ticket.id,
        category_label(&ticket.category),
        ticket.message.as_deref().unwrap_or_default(),
        status_label(&ticket.status),
        ticket.created_at.format(DATE_FORMAT),
    );
    if let Some(response) = &ticket.response {
        summary.push_str(&format!("\n📩 Last response: {response}"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_category_keyboard_offers_every_category_and_cancel() {
        let keyboard = category_keyboard();
        let tags = keyboard.callback_tags();
        for category in TicketCategory::ALL {
            assert!(tags.contains(&category.as_str()), "{category}");
        }
        assert!(tags.contains(&"cancel"));
        assert_eq!(keyboard.rows.len(), 3);
    }

    #[test]
    fn test_admin_keyboard_tags() {
        assert_eq!(
            admin_ticket_keyboard(4).callback_tags(),
            vec!["respond_:4", "close_:4"]
        );
        assert_eq!(
            requester_reply_keyboard(4).callback_tags(),
            vec!["reply_:4", "close_:4"]
        );
    }

    #[test]
    fn test_summary_includes_response_only_when_present() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let mut ticket = Ticket {
            id: 3,
            user_id: 100,
            username: None,
            category: "billing".to_string(),
            message: Some("my card failed".to_string()),
            response: None,
            created_at: created,
            updated_at: created,
            status: "open".to_string(),
        };

        let summary = ticket_summary(&ticket);
        assert!(summary.contains("Ticket #3"));
        assert!(summary.contains("💰 Billing"));
        assert!(summary.contains("🔓 Open"));
        assert!(summary.contains("2024-05-01 09:30"));
        assert!(!summary.contains("Last response"));

        ticket.response = Some("refund issued".to_string());
        ticket.status = "answered".to_string();
        assert!(ticket_summary(&ticket).contains("📩 Last response: refund issued"));
    }

    #[test]
    fn test_requester_display() {
        assert_eq!(requester_display(Some("alice"), 1), "@alice");
        assert_eq!(requester_display(Some(""), 1), "id 1");
        assert_eq!(requester_display(None, 5), "id 5");
    }
}
