//! Transaction logger.
//!
//! Turns exchanges into records and hands them to the resource's
//! `ContentLogStore` on a blocking thread. The store's lock makes the
//! migration check and the append one critical section.

use std::sync::Arc;

use crate::content::ContentLogStore;
use crate::transaction::record::{Exchange, LogEntry, LogRecord};

#[derive(Debug, Clone)]
pub struct TransactionLogger {
    store: Arc<ContentLogStore>,
    max_body_chars: usize,
}

impl TransactionLogger {
    pub fn new(store: Arc<ContentLogStore>, max_body_chars: usize) -> Self {
        Self {
            store,
            max_body_chars,
        }
    }

    pub fn store(&self) -> &Arc<ContentLogStore> {
        &self.store
    }

    /// Format an exchange with this logger's truncation limit.
    pub fn record_for(&self, exchange: Exchange<'_>) -> LogRecord {
        LogRecord::from_exchange(exchange, self.max_body_chars)
    }

    /// Persist `entry` without blocking the runtime.
    ///
    /// Returns false if any write was dropped; the request path ignores this.
    pub async fn write(&self, entry: LogEntry) -> bool {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || write_entry(&store, &entry)).await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(resource = %self.store.resource(), error = %e, "Transaction log task failed");
                false
            }
        }
    }

    /// Format and persist one exchange.
    pub async fn record(&self, exchange: Exchange<'_>) -> bool {
        let entry = LogEntry::Transaction(self.record_for(exchange));
        self.write(entry).await
    }
}

fn write_entry(store: &ContentLogStore, entry: &LogEntry) -> bool {
    let line = entry.timed_line();
    tracing::debug!(resource = %store.resource(), line = %line, "Transaction");
    store.append(entry.content_id(), &line, entry.time())
}
