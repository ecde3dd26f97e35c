use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use log::debug;
use std::time::Duration;

use super::{NewTicket, Ticket, TicketCategory, TicketChanges, TicketId};
use crate::core::shared::schema::tickets;
use crate::core::shared::utils::DbPool;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),
    #[error("Ticket is closed: {0}")]
    Closed(TicketId),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Database error: {0}")]
    Database(String),
    /// The caller stopped waiting; the write may still have committed.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Whether repeating the same action is known to be safe and could
    /// succeed. A timeout leaves the outcome unknown, so it is not transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Database(_))
    }
}

/// Server-side limit for each statement of a locked transition, in
/// milliseconds. The row lock and the update together stay below the client
/// wait, so Postgres cancels and rolls back a slow write before the caller
/// gives up on it.
fn statement_timeout_ms(client_timeout: Duration) -> u128 {
    (client_timeout.as_millis() / 3).max(1)
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Connection(e.to_string())
    }
}

/// Persistence for ticket records.
///
/// Mutating operations are atomic per ticket: the row is read, checked and
/// written back without another writer interleaving.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        username: Option<&str>,
        category: TicketCategory,
    ) -> Result<TicketId, StoreError>;

    async fn get(&self, ticket_id: TicketId) -> Result<Ticket, StoreError>;

    /// Appends a requester submission. The ticket must belong to `user_id`.
    async fn append_message(
        &self,
        ticket_id: TicketId,
        user_id: i64,
        text: &str,
    ) -> Result<Ticket, StoreError>;

    async fn record_response(
        &self,
        ticket_id: TicketId,
        response: &str,
    ) -> Result<Ticket, StoreError>;

    async fn close(&self, ticket_id: TicketId) -> Result<Ticket, StoreError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, StoreError>;

    /// Deletes tickets created strictly before `cutoff`, returning how many went.
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

pub struct PgTicketStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgTicketStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            op(&mut conn)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StoreError::Database(format!("Store task failed: {e}"))),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    /// Locks the row, applies `transition` and writes the changed columns back
    /// inside one transaction.
    async fn transition<F>(
        &self,
        ticket_id: TicketId,
        owner: Option<i64>,
        transition: F,
    ) -> Result<Ticket, StoreError>
    where
        F: FnOnce(&mut Ticket) -> Result<(), StoreError> + Send + 'static,
    {
        let limit_ms = statement_timeout_ms(self.timeout);
        self.run(move |conn| {
            conn.transaction::<Ticket, StoreError, _>(|conn| {
                diesel::sql_query(format!("SET LOCAL statement_timeout = {limit_ms}"))
                    .execute(conn)?;

                let mut ticket: Ticket = tickets::table
                    .find(ticket_id)
                    .select(Ticket::as_select())
                    .for_update()
                    .get_result(conn)
                    .optional()?
                    .ok_or(StoreError::NotFound(ticket_id))?;

                if owner.is_some_and(|user_id| user_id != ticket.user_id) {
                    return Err(StoreError::NotFound(ticket_id));
                }

                transition(&mut ticket)?;

                let updated = diesel::update(tickets::table.find(ticket_id))
                    .set(TicketChanges::from(&ticket))
                    .returning(Ticket::as_returning())
                    .get_result(conn)?;
                Ok(updated)
            })
        })
        .await
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn create(
        &self,
        user_id: i64,
        username: Option<&str>,
        category: TicketCategory,
    ) -> Result<TicketId, StoreError> {
        let new_ticket = NewTicket {
            user_id,
            username: username.map(String::from),
            category: category.as_str().to_string(),
        };

        self.run(move |conn| {
            let id = diesel::insert_into(tickets::table)
                .values(&new_ticket)
                .returning(tickets::id)
                .get_result::<TicketId>(conn)?;
            Ok(id)
        })
        .await
    }

    async fn get(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.run(move |conn| {
            tickets::table
                .find(ticket_id)
                .select(Ticket::as_select())
                .first(conn)
                .optional()?
                .ok_or(StoreError::NotFound(ticket_id))
        })
        .await
    }

    async fn append_message(
        &self,
        ticket_id: TicketId,
        user_id: i64,
        text: &str,
    ) -> Result<Ticket, StoreError> {
        let text = text.to_string();
        self.transition(ticket_id, Some(user_id), move |ticket| {
            ticket.apply_message(&text, Utc::now())
        })
        .await
    }

    async fn record_response(
        &self,
        ticket_id: TicketId,
        response: &str,
    ) -> Result<Ticket, StoreError> {
        let response = response.to_string();
        self.transition(ticket_id, None, move |ticket| {
            ticket.apply_response(&response, Utc::now())
        })
        .await
    }

    async fn close(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.transition(ticket_id, None, |ticket| ticket.apply_close(Utc::now()))
            .await
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, StoreError> {
        self.run(move |conn| {
            let rows = tickets::table
                .filter(tickets::user_id.eq(user_id))
                .order((tickets::created_at.desc(), tickets::id.desc()))
                .select(Ticket::as_select())
                .load(conn)?;
            debug!("Found {} tickets for user {}", rows.len(), user_id);
            Ok(rows)
        })
        .await
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.run(move |conn| {
            let deleted = diesel::delete(tickets::table.filter(tickets::created_at.lt(cutoff)))
                .execute(conn)?;
            Ok(deleted)
        })
        .await
    }
}
