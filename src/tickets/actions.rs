//! Button callback payloads.
//!
//! Every inline button carries a short tag in `callback_data`. Tags are parsed
//! once, when a callback arrives, into [`CallbackAction`]; buttons are built
//! from the same type through [`CallbackAction::to_tag`].

use std::fmt;
use std::str::FromStr;

use super::{TicketCategory, TicketId};

const RESPOND_PREFIX: &str = "respond_:";
const REPLY_PREFIX: &str = "reply_:";
const CLOSE_PREFIX: &str = "close_:";
const CANCEL_TAG: &str = "cancel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Cancel,
    /// Administrator wants to answer the ticket.
    RespondToTicket(TicketId),
    /// Requester wants to add to the ticket.
    ReplyToTicket(TicketId),
    CloseTicket(TicketId),
    SelectCategory(TicketCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackParseError {
    #[error("Invalid ticket ID in callback: {0}")]
    InvalidTicketId(String),
    #[error("Unsupported callback action: {0}")]
    Unsupported(String),
}

impl CallbackAction {
    pub fn to_tag(&self) -> String {
        match self {
            Self::Cancel => CANCEL_TAG.to_string(),
            Self::RespondToTicket(id) => format!("{RESPOND_PREFIX}{id}"),
            Self::ReplyToTicket(id) => format!("{REPLY_PREFIX}{id}"),
            Self::CloseTicket(id) => format!("{CLOSE_PREFIX}{id}"),
            Self::SelectCategory(category) => category.as_str().to_string(),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tag())
    }
}

fn parse_ticket_id(raw: &str, suffix: &str) -> Result<TicketId, CallbackParseError> {
    match suffix.parse::<TicketId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CallbackParseError::InvalidTicketId(raw.to_string())),
    }
}

impl FromStr for CallbackAction {
    type Err = CallbackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CANCEL_TAG {
            return Ok(Self::Cancel);
        }
        if let Some(suffix) = s.strip_prefix(RESPOND_PREFIX) {
            return parse_ticket_id(s, suffix).map(Self::RespondToTicket);
        }
        if let Some(suffix) = s.strip_prefix(REPLY_PREFIX) {
            return parse_ticket_id(s, suffix).map(Self::ReplyToTicket);
        }
        if let Some(suffix) = s.strip_prefix(CLOSE_PREFIX) {
            return parse_ticket_id(s, suffix).map(Self::CloseTicket);
        }
        s.parse::<TicketCategory>()
            .map(Self::SelectCategory)
            .map_err(|_| CallbackParseError::Unsupported(s.to_string()))
    }
}
