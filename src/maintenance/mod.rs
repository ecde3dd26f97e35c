use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::tickets::store::{StoreError, TicketStore};

pub const RETENTION_DAYS: i64 = 7;
pub const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Periodically deletes tickets older than the retention window.
pub struct RetentionJanitor {
    store: Arc<dyn TicketStore>,
    retention: Duration,
    interval: std::time::Duration,
}

impl RetentionJanitor {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            retention: Duration::days(RETENTION_DAYS),
            interval: CLEANUP_INTERVAL,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    pub async fn run_once(&self) -> Result<usize, StoreError> {
        let cutoff = self.cutoff(Utc::now());
        let deleted = self.store.purge_created_before(cutoff).await?;
        if deleted > 0 {
            info!("Deleted {} tickets created before {}", deleted, cutoff);
        } else {
            debug!("No tickets older than {}", cutoff);
        }
        Ok(deleted)
    }

    /// Never returns; store errors are logged and the next pass still runs.
    pub async fn run(&self) {
        info!(
            "Ticket retention: {} days, checked every {}h",
            self.retention.num_days(),
            self.interval.as_secs() / 3600
        );
        loop {
            if let Err(e) = self.run_once().await {
                error!("Ticket cleanup failed: {}", e);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
