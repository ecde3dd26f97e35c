use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::core::bot::channels::{ChannelAdapter, ChannelResult, InlineKeyboard, SentMessage};
use crate::tickets::store::{StoreError, TicketStore};
use crate::tickets::{Ticket, TicketCategory, TicketId, TicketStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

#[derive(Debug)]
pub struct MockChannelAdapter {
    pub name: String,
    pub messages: Arc<Mutex<Vec<SentRecord>>>,
    pub edits: Arc<Mutex<Vec<EditRecord>>>,
    failing_chats: Mutex<HashSet<i64>>,
    next_message_id: AtomicI64,
}

impl MockChannelAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Arc::new(Mutex::new(Vec::new())),
            edits: Arc::new(Mutex::new(Vec::new())),
            failing_chats: Mutex::new(HashSet::new()),
            next_message_id: AtomicI64::new(1000),
        }
    }

    /// Every send to `chat_id` fails from now on.
    pub async fn fail_sends_to(&self, chat_id: i64) {
        self.failing_chats.lock().await.insert(chat_id);
    }

    pub async fn get_sent_messages(&self) -> Vec<SentRecord> {
        self.messages.lock().await.clone()
    }

    pub async fn messages_to(&self, chat_id: i64) -> Vec<SentRecord> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn last_message_to(&self, chat_id: i64) -> Option<SentRecord> {
        self.messages_to(chat_id).await.pop()
    }

    pub async fn get_edits(&self) -> Vec<EditRecord> {
        self.edits.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.messages.lock().await.clear();
        self.edits.lock().await.clear();
    }
}

#[async_trait]
impl ChannelAdapter for MockChannelAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> ChannelResult<SentMessage> {
        if self.failing_chats.lock().await.contains(&chat_id) {
            return Err(format!("chat {chat_id} unreachable").into());
        }
        self.messages.lock().await.push(SentRecord {
            chat_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(SentMessage {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> ChannelResult<()> {
        self.edits.lock().await.push(EditRecord {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryTickets {
    rows: BTreeMap<TicketId, Ticket>,
    next_id: TicketId,
}

/// Ticket store kept in process memory. One lock covers each whole operation.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    inner: StdMutex<MemoryTickets>,
    failing: AtomicBool,
    timing_out: AtomicBool,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with a transient database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// While set, lifecycle transitions are committed but reported to the
    /// caller as timed out.
    pub fn set_timing_out(&self, timing_out: bool) {
        self.timing_out.store(timing_out, Ordering::SeqCst);
    }

    /// Inserts a row as-is, e.g. with a backdated `created_at`.
    pub fn insert_ticket(&self, user_id: i64, category: TicketCategory, created_at: DateTime<Utc>) -> TicketId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(
            id,
            Ticket {
                id,
                user_id,
                username: None,
                category: category.as_str().to_string(),
                message: None,
                response: None,
                created_at,
                updated_at: created_at,
                status: TicketStatus::Open.as_str().to_string(),
            },
        );
        id
    }

    pub fn snapshot(&self, ticket_id: TicketId) -> Option<Ticket> {
        self.lock().rows.get(&ticket_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.lock().rows.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTickets> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }

    fn transition<F>(&self, ticket_id: TicketId, owner: Option<i64>, f: F) -> Result<Ticket, StoreError>
    where
        F: FnOnce(&mut Ticket) -> Result<(), StoreError>,
    {
        self.check_available()?;
        let mut inner = self.lock();
        let ticket = inner
            .rows
            .get_mut(&ticket_id)
            .filter(|t| owner.map_or(true, |user_id| t.user_id == user_id))
            .ok_or(StoreError::NotFound(ticket_id))?;

        let mut updated = ticket.clone();
        f(&mut updated)?;
        *ticket = updated.clone();
        if self.timing_out.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(std::time::Duration::from_secs(10)));
        }
        Ok(updated)
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(
        &self,
        user_id: i64,
        username: Option<&str>,
        category: TicketCategory,
    ) -> Result<TicketId, StoreError> {
        self.check_available()?;
        let id = self.insert_ticket(user_id, category, Utc::now());
        if let Some(ticket) = self.lock().rows.get_mut(&id) {
            ticket.username = username.map(String::from);
        }
        Ok(id)
    }

    async fn get(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.check_available()?;
        self.snapshot(ticket_id).ok_or(StoreError::NotFound(ticket_id))
    }

    async fn append_message(
        &self,
        ticket_id: TicketId,
        user_id: i64,
        text: &str,
    ) -> Result<Ticket, StoreError> {
        self.transition(ticket_id, Some(user_id), |t| t.apply_message(text, Utc::now()))
    }

    async fn record_response(
        &self,
        ticket_id: TicketId,
        response: &str,
    ) -> Result<Ticket, StoreError> {
        self.transition(ticket_id, None, |t| t.apply_response(response, Utc::now()))
    }

    async fn close(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.transition(ticket_id, None, |t| t.apply_close(Utc::now()))
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, StoreError> {
        self.check_available()?;
        let mut rows: Vec<Ticket> = self
            .lock()
            .rows
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.check_available()?;
        let mut inner = self.lock();
        let before = inner.rows.len();
        inner.rows.retain(|_, t| t.created_at >= cutoff);
        Ok(before - inner.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_channel_adapter() {
        let adapter = MockChannelAdapter::new("test");
        assert_eq!(adapter.name(), "test");
        assert!(adapter.is_configured());

        let first = adapter.send_message(5, "hello", None).await.unwrap();
        let second = adapter.send_message(5, "again", None).await.unwrap();
        assert_ne!(first.message_id, second.message_id);

        adapter.fail_sends_to(6).await;
        assert!(adapter.send_message(6, "lost", None).await.is_err());
        assert_eq!(adapter.get_sent_messages().await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let store = Arc::new(MemoryTicketStore::new());
        let id = store.create(100, None, TicketCategory::Technical).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_message(id, 100, &format!("part-{i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let body = store.snapshot(id).unwrap().message.unwrap();
        let mut parts: Vec<&str> = body.split(crate::tickets::MESSAGE_DELIMITER).collect();
        parts.sort_unstable();
        let mut expected: Vec<String> = (0..20).map(|i| format!("part-{i}")).collect();
        expected.sort_unstable();
        assert_eq!(parts, expected);
    }

    #[tokio::test]
    async fn test_memory_store_checks_ownership() {
        let store = MemoryTicketStore::new();
        let id = store.create(100, Some("alice"), TicketCategory::Billing).await.unwrap();

        assert!(matches!(
            store.append_message(id, 200, "not mine").await,
            Err(StoreError::NotFound(_))
        ));
        let ticket = store.append_message(id, 100, "mine").await.unwrap();
        assert_eq!(ticket.message.as_deref(), Some("mine"));
        assert_eq!(ticket.username.as_deref(), Some("alice"));
    }
}
