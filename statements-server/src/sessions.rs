//! In-memory registry of parse and refresh sessions.
//!
//! Finished sessions stay readable for a while so a late poll still sees
//! the final record, then they are evicted.

use chrono::{Duration, Utc};
use statements_core::{ProgressRecord, SessionKind, SessionStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub struct SessionRegistry {
    records: RwLock<HashMap<String, ProgressRecord>>,
    ttl: Duration,
    batch_ttl: Duration,
    seq: AtomicU64,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64, batch_ttl_secs: u64) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
            batch_ttl: Duration::seconds(batch_ttl_secs as i64),
            seq: AtomicU64::new(0),
        }
    }

    fn ttl_for(&self, kind: SessionKind) -> Duration {
        match kind {
            SessionKind::Batch => self.batch_ttl,
            SessionKind::Parse | SessionKind::Refresh => self.ttl,
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{}_{n}", Utc::now().timestamp_millis())
    }

    /// Register a new session. `prefix` is usually the account id.
    pub async fn create(
        self: &Arc<Self>,
        prefix: &str,
        kind: SessionKind,
        account: Option<(&str, &str)>,
    ) -> SessionHandle {
        let id = self.next_id(prefix);
        let mut record = ProgressRecord::new(id.clone(), kind);
        if let Some((account_id, name)) = account {
            record = record.for_account(account_id, name);
        }
        self.records.write().await.insert(id.clone(), record);
        SessionHandle {
            registry: Arc::clone(self),
            id,
        }
    }

    pub async fn get(&self, id: &str) -> Option<ProgressRecord> {
        self.evict_expired().await;
        self.records.read().await.get(id).cloned()
    }

    /// Drop terminal sessions older than their TTL. Returns how many went.
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| match r.end_time {
            Some(end) if r.is_terminal() => end + self.ttl_for(r.kind) > now,
            _ => true,
        });
        let evicted = before - records.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired sessions removed");
        }
        evicted
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    async fn update(&self, id: &str, f: impl FnOnce(&mut ProgressRecord)) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            f(record);
        }
    }
}

/// Write access to one session, handed to the job that runs it.
#[derive(Clone)]
pub struct SessionHandle {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn update(&self, f: impl FnOnce(&mut ProgressRecord)) {
        self.registry.update(&self.id, f).await;
    }

    pub async fn advance(&self, status: SessionStatus, percentage: u8, details: impl Into<String>) {
        let details = details.into();
        self.update(|r| r.advance(status, percentage, details)).await;
    }

    pub async fn complete(&self, details: impl Into<String>) {
        let details = details.into();
        self.update(|r| r.complete(details)).await;
    }

    pub async fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|r| r.fail(message)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_update_get() {
        let reg = Arc::new(SessionRegistry::new(300, 600));
        let h = reg.create("stp_sa", SessionKind::Parse, Some(("stp_sa", "STP SA"))).await;
        assert!(h.id().starts_with("stp_sa_"));

        h.advance(SessionStatus::ProcessingFiles, 40, "Parsing").await;
        let r = reg.get(h.id()).await.unwrap();
        assert_eq!(r.status, SessionStatus::ProcessingFiles);
        assert_eq!(r.account_name.as_deref(), Some("STP SA"));

        h.complete("done").await;
        assert!(reg.get(h.id()).await.unwrap().is_terminal());
        assert!(reg.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let reg = Arc::new(SessionRegistry::new(300, 600));
        let a = reg.create("batch", SessionKind::Batch, None).await;
        let b = reg.create("batch", SessionKind::Batch, None).await;
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn terminal_sessions_expire_by_kind() {
        let reg = Arc::new(SessionRegistry::new(300, 600));
        let single = reg.create("a", SessionKind::Parse, None).await;
        let batch = reg.create("b", SessionKind::Batch, None).await;
        let running = reg.create("c", SessionKind::Refresh, None).await;

        let ended = Utc::now() - Duration::seconds(400);
        for h in [&single, &batch] {
            h.update(|r| {
                r.complete("done");
                r.end_time = Some(ended);
            })
            .await;
        }

        assert_eq!(reg.evict_expired().await, 1);
        assert!(reg.get(single.id()).await.is_none());
        assert!(reg.get(batch.id()).await.is_some());
        assert!(reg.get(running.id()).await.is_some());
    }
}
