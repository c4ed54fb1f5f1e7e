//! Server side of uploads: classify, resolve the account, store the file.

use anyhow::{Context, Result};
use serde::Serialize;
use statements_core::{
    Account, AccountKind, Classification, UploadResponse, UploadResult, account,
    affected_accounts, classify_name, validate_upload,
};
use statements_store::{DocumentStore, TrackingLedger};
use std::sync::Arc;

use crate::inventory::InventoryManager;
use crate::parser::StatementParser;
use crate::scanner::InventoryScanner;

/// Answer of the validate-only endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn validate_filename(filename: &str) -> Validation {
    match classify_name(filename) {
        Ok(c) => Validation {
            valid: true,
            filename: filename.to_string(),
            account_type: Some(c.account_kind()),
            account_id: c.account().map(|a| a.id),
            year: c.period().map(|(y, _)| y),
            month: c.period().map(|(_, m)| m),
            description: Some(c.describe()),
            error: None,
        },
        Err(e) => Validation {
            valid: false,
            filename: filename.to_string(),
            account_type: None,
            account_id: None,
            year: None,
            month: None,
            description: None,
            error: Some(e.to_string()),
        },
    }
}

pub struct UploadHandler {
    store: Arc<dyn DocumentStore>,
    parser: Arc<dyn StatementParser>,
    inventory: Arc<InventoryManager>,
    scanner: InventoryScanner,
    tracking: Arc<TrackingLedger>,
}

/// Where an accepted upload goes.
struct Placement {
    account: &'static Account,
    year: i32,
    month: u32,
    stored_name: String,
}

impl UploadHandler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        parser: Arc<dyn StatementParser>,
        inventory: Arc<InventoryManager>,
        scanner: InventoryScanner,
        tracking: Arc<TrackingLedger>,
    ) -> Self {
        Self {
            store,
            parser,
            inventory,
            scanner,
            tracking,
        }
    }

    async fn place(&self, filename: &str, bytes: &[u8]) -> Result<Placement, String> {
        let class = validate_upload(filename, bytes.len() as u64).map_err(|e| e.to_string())?;
        match class {
            Classification::Stp {
                account: None,
                account_number,
                ..
            } => Err(format!("Unknown STP account: {account_number}")),
            Classification::Stp {
                account: Some(account),
                year,
                month,
                ..
            }
            | Classification::Bbva {
                account: Some(account),
                year,
                month,
                ..
            } => Ok(Placement {
                account,
                year,
                month,
                stored_name: filename.trim().to_string(),
            }),
            Classification::Bbva {
                account: None,
                year,
                month,
                ..
            } => self.detect(filename, bytes, Some((year, month))).await,
            Classification::AutoDetect => self.detect(filename, bytes, None).await,
        }
    }

    /// Resolve account and period from the PDF's content. A period already
    /// read from the filename wins over the detected one.
    async fn detect(
        &self,
        filename: &str,
        bytes: &[u8],
        named_period: Option<(i32, u32)>,
    ) -> Result<Placement, String> {
        let detection = self
            .parser
            .detect(filename, bytes)
            .await
            .map_err(|e| format!("Account detection failed: {e}"))?;

        let account = detection
            .identifier
            .as_deref()
            .and_then(account::by_identifier)
            .ok_or_else(|| "Could not detect account from file content".to_string())?;

        let (year, month) = named_period
            .or(detection.year.zip(detection.month))
            .filter(|(_, m)| (1..=12).contains(m))
            .ok_or_else(|| "Could not determine statement period".to_string())?;

        Ok(Placement {
            account,
            year,
            month,
            stored_name: account.statement_filename(year, month, "pdf"),
        })
    }

    pub async fn process(&self, filename: &str, bytes: &[u8]) -> UploadResult {
        let placement = match self.place(filename, bytes).await {
            Ok(p) => p,
            Err(reason) => {
                tracing::info!(file = filename, %reason, "upload rejected");
                return UploadResult::rejected(filename, reason);
            }
        };

        let Placement {
            account,
            year,
            month,
            stored_name,
        } = placement;
        match self.store.write(account.folder, &stored_name, bytes).await {
            Ok(stored) => {
                tracing::info!(
                    file = filename,
                    id = %stored.id,
                    account = account.id,
                    "upload stored"
                );
                UploadResult::stored(
                    filename,
                    account,
                    year,
                    month,
                    format!("Saved as {} in {}", stored.name, account.folder),
                )
            }
            Err(e) => {
                tracing::error!(file = filename, error = %e, "upload write failed");
                UploadResult::rejected(filename, format!("Upload failed: {e}"))
            }
        }
    }

    pub async fn process_all(&self, files: Vec<(String, Vec<u8>)>) -> UploadResponse {
        let mut results = Vec::with_capacity(files.len());
        for (name, bytes) in &files {
            results.push(self.process(name, bytes).await);
        }
        for id in affected_accounts(&results) {
            if let Err(e) = self.rescan(id).await {
                tracing::warn!(account = id, error = %e, "inventory rescan after upload failed");
                self.inventory.clear_cache().await;
            }
        }
        UploadResponse::from_results(results)
    }

    /// Bring the inventory entry of an account that just received files up
    /// to date.
    async fn rescan(&self, account_id: &str) -> Result<()> {
        let account = account::by_id(account_id).context("unknown account")?;
        let tracking = self.tracking.snapshot().await.context("load parse tracking")?;
        self.scanner.refresh_account(account, &tracking).await?;
        Ok(())
    }
}
