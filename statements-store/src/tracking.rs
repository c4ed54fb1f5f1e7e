//! Parse tracking: which statement files were parsed, when, and with what
//! result. Keyed by account identifier, then filename.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::document::{DocumentStore, StoredFile};
use crate::error::{Result, StoreError};
use crate::{INVENTORY_FOLDER, TRACKING_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Success,
    #[serde(alias = "failed")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEntry {
    #[serde(default)]
    pub last_parsed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_count: u64,
    pub parse_status: TrackingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParseTracking {
    accounts: BTreeMap<String, BTreeMap<String, TrackingEntry>>,
}

impl ParseTracking {
    pub fn entry(&self, identifier: &str, filename: &str) -> Option<&TrackingEntry> {
        self.accounts.get(identifier)?.get(filename)
    }

    pub fn account(&self, identifier: &str) -> impl Iterator<Item = (&String, &TrackingEntry)> {
        self.accounts.get(identifier).into_iter().flatten()
    }

    /// Why `file` has to be parsed again, or `None` when its tracking is
    /// current. A file modified less than `tolerance` after its last parse
    /// counts as unchanged.
    pub fn needs_parse(
        &self,
        identifier: &str,
        file: &StoredFile,
        tolerance: Duration,
    ) -> Option<&'static str> {
        let Some(entry) = self.entry(identifier, &file.name) else {
            return Some("new file");
        };
        if entry.parse_status == TrackingStatus::Error {
            return Some("previous parse failed");
        }
        let Some(last_parsed) = entry.last_parsed else {
            return Some("never parsed");
        };
        if file.last_modified > last_parsed + tolerance {
            return Some("modified since last parse");
        }
        None
    }

    pub fn record_success(&mut self, identifier: &str, file: &StoredFile, transaction_count: u64) {
        self.insert(
            identifier,
            &file.name,
            TrackingEntry {
                last_parsed: Some(Utc::now()),
                file_last_modified: Some(file.last_modified),
                transaction_count,
                parse_status: TrackingStatus::Success,
                error: None,
            },
        );
    }

    pub fn record_failure(
        &mut self,
        identifier: &str,
        file: &StoredFile,
        error: impl Into<String>,
    ) {
        self.insert(
            identifier,
            &file.name,
            TrackingEntry {
                last_parsed: Some(Utc::now()),
                file_last_modified: Some(file.last_modified),
                transaction_count: 0,
                parse_status: TrackingStatus::Error,
                error: Some(error.into()),
            },
        );
    }

    pub fn insert(&mut self, identifier: &str, filename: &str, entry: TrackingEntry) {
        self.accounts
            .entry(identifier.to_string())
            .or_default()
            .insert(filename.to_string(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.values().all(BTreeMap::is_empty)
    }

    /// Fold `other`'s entries in. Entries in `other` win.
    pub fn merge(&mut self, other: ParseTracking) {
        for (identifier, files) in other.accounts {
            self.accounts.entry(identifier).or_default().extend(files);
        }
    }

    /// Load from the store. A missing document starts empty; a corrupt one
    /// is an error and is left untouched.
    pub async fn load(store: &dyn DocumentStore) -> Result<Self> {
        let bytes = match store.read_in(INVENTORY_FOLDER, TRACKING_FILE).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => {
                tracing::info!("parse tracking not found, starting fresh");
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(error = %e, "parse tracking is corrupt");
            StoreError::Json(e)
        })
    }

    pub async fn save(&self, store: &dyn DocumentStore) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        store.write(INVENTORY_FOLDER, TRACKING_FILE, &json).await?;
        Ok(())
    }
}

/// Shared access to the tracking document. Jobs read a snapshot, collect
/// their own results and fold them in with [`TrackingLedger::commit`], which
/// reloads under the lock so concurrent jobs keep each other's entries.
pub struct TrackingLedger {
    store: Arc<dyn DocumentStore>,
    lock: Mutex<()>,
}

impl TrackingLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> Result<ParseTracking> {
        let _guard = self.lock.lock().await;
        ParseTracking::load(self.store.as_ref()).await
    }

    /// Merge `changes` into the stored document and return the result.
    pub async fn commit(&self, changes: ParseTracking) -> Result<ParseTracking> {
        let _guard = self.lock.lock().await;
        let mut current = ParseTracking::load(self.store.as_ref()).await?;
        if changes.is_empty() {
            return Ok(current);
        }
        current.merge(changes);
        current.save(self.store.as_ref()).await?;
        Ok(current)
    }
}
