pub mod actions;
pub mod handlers;
pub mod store;
pub mod ui;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::fmt;
use std::str::FromStr;

use crate::core::shared::schema::tickets;
use self::store::StoreError;

pub type TicketId = i32;

/// Separator placed between accumulated submissions in a ticket body.
pub const MESSAGE_DELIMITER: &str = "\n---\n";

pub const UNKNOWN_LABEL: &str = "❔ Unknown";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TicketCategory {
    Technical,
    Billing,
    General,
    #[default]
    Other,
}

impl TicketCategory {
    pub const ALL: [Self; 4] = [Self::Technical, Self::Billing, Self::General, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "tech",
            Self::Billing => "billing",
            Self::General => "general",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Technical => "🔧 Technical",
            Self::Billing => "💰 Billing",
            Self::General => "ℹ️ General",
            Self::Other => "❓ Other",
        }
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketCategory {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownValue {
                kind: "category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TicketStatus {
    #[default]
    Open,
    Answered,
    Closed,
}

impl TicketStatus {
    pub const ALL: [Self; 3] = [Self::Open, Self::Answered, Self::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Answered => "answered",
            Self::Closed => "closed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "🔓 Open",
            Self::Answered => "📩 Answered",
            Self::Closed => "🔒 Closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownValue {
                kind: "status",
                value: s.to_string(),
            })
    }
}

pub fn category_label(raw: &str) -> &'static str {
    raw.parse::<TicketCategory>()
        .map(|c| c.label())
        .unwrap_or(UNKNOWN_LABEL)
}

pub fn status_label(raw: &str) -> &'static str {
    raw.parse::<TicketStatus>()
        .map(|s| s.label())
        .unwrap_or(UNKNOWN_LABEL)
}

/// Appends `addition` to an existing body, never replacing what is there.
pub fn append_to_body(current: Option<&str>, addition: &str) -> String {
    match current {
        Some(existing) => format!("{existing}{MESSAGE_DELIMITER}{addition}"),
        None => addition.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: i64,
    pub username: Option<String>,
    pub category: String,
    pub message: Option<String>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub user_id: i64,
    pub username: Option<String>,
    pub category: String,
}

/// Mutable columns written back after a lifecycle transition.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tickets)]
#[diesel(treat_none_as_null = true)]
pub struct TicketChanges {
    pub message: Option<String>,
    pub response: Option<String>,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Ticket> for TicketChanges {
    fn from(ticket: &Ticket) -> Self {
        Self {
            message: ticket.message.clone(),
            response: ticket.response.clone(),
            status: ticket.status.clone(),
            updated_at: ticket.updated_at,
        }
    }
}

impl Ticket {
    pub fn category(&self) -> Option<TicketCategory> {
        self.category.parse().ok()
    }

    pub fn status(&self) -> Option<TicketStatus> {
        self.status.parse().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.status() == Some(TicketStatus::Closed)
    }

    /// Requester submission: appends to the body, reopens the ticket and drops
    /// any previous response.
    pub fn apply_message(&mut self, text: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed(self.id));
        }
        self.message = Some(append_to_body(self.message.as_deref(), text));
        self.response = None;
        self.status = TicketStatus::Open.as_str().to_string();
        self.updated_at = now;
        Ok(())
    }

    /// Administrator answer: kept in `response` and appended to the body so the
    /// body holds the whole exchange.
    pub fn apply_response(&mut self, response: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed(self.id));
        }
        self.message = Some(append_to_body(self.message.as_deref(), response));
        self.response = Some(response.to_string());
        self.status = TicketStatus::Answered.as_str().to_string();
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_close(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed(self.id));
        }
        self.status = TicketStatus::Closed.as_str().to_string();
        self.updated_at = now;
        Ok(())
    }
}
