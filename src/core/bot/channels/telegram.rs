use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::bot::channels::{
    ChannelAdapter, ChannelResult, InlineButton, InlineKeyboard, SentMessage,
};
use crate::telegram::TelegramUpdate;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct TelegramSendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<TelegramReplyMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct TelegramEditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<TelegramReplyMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct TelegramReplyMarkup<'a> {
    inline_keyboard: &'a [Vec<InlineButton>],
}

impl<'a> TelegramReplyMarkup<'a> {
    fn from_keyboard(keyboard: &'a Option<InlineKeyboard>) -> Option<Self> {
        keyboard.as_ref().map(|k| Self {
            inline_keyboard: &k.rows,
        })
    }
}

#[derive(Debug, Serialize)]
struct TelegramGetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct TelegramAnswerCallback<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramAdapter {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramAdapter {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(bot_token, TELEGRAM_API_BASE)
    }

    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn send_telegram_request<T: Serialize + ?Sized>(
        &self,
        method: &str,
        payload: &T,
        timeout: Duration,
    ) -> ChannelResult<TelegramResponse> {
        if self.bot_token.is_empty() {
            return Err("Telegram bot token not configured".into());
        }

        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await?
            .json::<TelegramResponse>()
            .await?;

        if !response.ok {
            let error_msg = response
                .description
                .unwrap_or_else(|| "Unknown Telegram API error".to_string());
            error!("Telegram API error on {}: {}", method, error_msg);
            return Err(error_msg.into());
        }

        Ok(response)
    }

    /// Long-polls for updates with id >= `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> ChannelResult<Vec<TelegramUpdate>> {
        let payload = TelegramGetUpdates {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: vec!["message", "callback_query"],
        };

        let response = self
            .send_telegram_request("getUpdates", &payload, poll_timeout + REQUEST_TIMEOUT)
            .await?;

        let updates = match response.result {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        Ok(updates)
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> ChannelResult<()> {
        let payload = TelegramAnswerCallback {
            callback_query_id,
            text,
        };
        self.send_telegram_request("answerCallbackQuery", &payload, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn get_me(&self) -> ChannelResult<serde_json::Value> {
        #[derive(Serialize)]
        struct Empty {}

        let response = self
            .send_telegram_request("getMe", &Empty {}, REQUEST_TIMEOUT)
            .await?;
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        "Telegram"
    }

    fn is_configured(&self) -> bool {
        !self.bot_token.is_empty()
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> ChannelResult<SentMessage> {
        let payload = TelegramSendMessage {
            chat_id,
            text,
            reply_markup: TelegramReplyMarkup::from_keyboard(&keyboard),
        };

        let response = self
            .send_telegram_request("sendMessage", &payload, REQUEST_TIMEOUT)
            .await?;

        let message_id = response
            .result
            .as_ref()
            .and_then(|r| r.get("message_id"))
            .and_then(|id| id.as_i64())
            .ok_or("Telegram sendMessage response has no message_id")?;

        debug!("Telegram message {} sent to chat {}", message_id, chat_id);
        Ok(SentMessage {
            chat_id,
            message_id,
        })
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> ChannelResult<()> {
        let payload = TelegramEditMessageText {
            chat_id,
            message_id,
            text,
            reply_markup: TelegramReplyMarkup::from_keyboard(&keyboard),
        };

        self.send_telegram_request("editMessageText", &payload, REQUEST_TIMEOUT)
            .await?;
        info!("Telegram message {} edited in chat {}", message_id, chat_id);
        Ok(())
    }
}
