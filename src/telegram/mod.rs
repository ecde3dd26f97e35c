//! Telegram Bot API updates and the long-poll intake loop.

use log::{debug, error, info, warn};
use serde::Deserialize;
use std::time::Duration;

use crate::core::bot::channels::telegram::TelegramAdapter;
use crate::core::bot::{EventKind, InboundEvent, SupportBot};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

fn extract_message_content(message: &TelegramMessage) -> Option<String> {
    message
        .text
        .as_ref()
        .or(message.caption.as_ref())
        .filter(|content| !content.trim().is_empty())
        .cloned()
}

/// Converts a raw update into an event for the dispatcher. Updates without a
/// sender or usable content yield `None`.
pub fn update_to_event(update: &TelegramUpdate) -> Option<InboundEvent> {
    if let Some(message) = &update.message {
        let from = message.from.as_ref()?;
        let content = extract_message_content(message)?;
        return Some(InboundEvent::from_text(
            from.id,
            from.username.clone(),
            message.chat.id,
            &content,
        ));
    }

    if let Some(callback) = &update.callback_query {
        let origin = callback.message.as_ref();
        return Some(InboundEvent {
            sender_id: callback.from.id,
            sender_username: callback.from.username.clone(),
            chat_id: origin.map(|m| m.chat.id).unwrap_or(callback.from.id),
            kind: EventKind::Callback {
                tag: callback.data.clone().unwrap_or_default(),
                message_id: origin.map(|m| m.message_id),
                message_text: origin.and_then(|m| m.text.clone()),
            },
        });
    }

    None
}

/// Pulls updates forever and hands them to `bot` one at a time, in order.
pub async fn run_polling(adapter: &TelegramAdapter, bot: &SupportBot, poll_timeout: Duration) {
    let mut offset = 0i64;
    info!("Polling Telegram for updates (timeout {}s)", poll_timeout.as_secs());

    loop {
        let updates = match adapter.get_updates(offset, poll_timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                error!("Failed to fetch Telegram updates: {}", e);
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            if let Some(callback) = &update.callback_query {
                if let Err(e) = adapter.answer_callback_query(&callback.id, None).await {
                    warn!("Failed to answer callback query {}: {}", callback.id, e);
                }
            }

            match update_to_event(&update) {
                Some(event) => bot.handle_event(event).await,
                None => debug!("Skipping update {} with no usable content", update.update_id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_becomes_text_event() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 5,
                    "from": {"id": 100, "is_bot": false, "first_name": "Alice", "username": "alice"},
                    "chat": {"id": 100, "type": "private"},
                    "date": 1700000000,
                    "text": "my card failed"
                }
            }"#,
        )
        .unwrap();

        let event = update_to_event(&update).unwrap();
        assert_eq!(event.sender_id, 100);
        assert_eq!(event.chat_id, 100);
        assert_eq!(event.sender_username.as_deref(), Some("alice"));
        assert_eq!(event.kind, EventKind::Text("my card failed".to_string()));
    }

    #[test]
    fn test_command_with_bot_mention() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{
                "update_id": 11,
                "message": {
                    "message_id": 6,
                    "from": {"id": 100, "is_bot": false, "first_name": "Alice"},
                    "chat": {"id": 100, "type": "private"},
                    "date": 1700000000,
                    "text": "/status@support_bot"
                }
            }"#,
        )
        .unwrap();

        let event = update_to_event(&update).unwrap();
        assert_eq!(
            event.kind,
            EventKind::Command {
                name: "status".to_string(),
                args: String::new()
            }
        );
    }

    #[test]
    fn test_callback_keeps_originating_message() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{
                "update_id": 12,
                "callback_query": {
                    "id": "cbq-1",
                    "from": {"id": 1, "is_bot": false, "first_name": "Admin"},
                    "message": {
                        "message_id": 44,
                        "chat": {"id": 1, "type": "private"},
                        "date": 1700000000,
                        "text": "Ticket #3 update"
                    },
                    "data": "respond_:3"
                }
            }"#,
        )
        .unwrap();

        let event = update_to_event(&update).unwrap();
        assert_eq!(event.sender_id, 1);
        assert_eq!(
            event.kind,
            EventKind::Callback {
                tag: "respond_:3".to_string(),
                message_id: Some(44),
                message_text: Some("Ticket #3 update".to_string()),
            }
        );
    }

    #[test]
    fn test_message_without_text_is_skipped() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{
                "update_id": 13,
                "message": {
                    "message_id": 7,
                    "from": {"id": 100, "is_bot": false, "first_name": "Alice"},
                    "chat": {"id": 100, "type": "private"},
                    "date": 1700000000
                }
            }"#,
        )
        .unwrap();

        assert!(update_to_event(&update).is_none());
    }
}
