//! Builds inventory months from what is in the store, joined with parse
//! tracking.

use anyhow::{Context, Result};
use statements_core::{Account, AccountInventory, AccountKind, FileInfo, ParseStatus};
use statements_store::{DocumentStore, ParseTracking, StatementFile, TrackingStatus, discover};
use std::sync::Arc;

use crate::inventory::InventoryManager;

#[derive(Clone)]
pub struct InventoryScanner {
    store: Arc<dyn DocumentStore>,
    inventory: Arc<InventoryManager>,
}

fn file_info(account: &Account, file: &StatementFile, tracking: &ParseTracking) -> FileInfo {
    let mut info = FileInfo::present(file.file.id.clone());
    info.last_modified = Some(file.file.last_modified.to_rfc3339());
    info.file_size = Some(file.file.size);
    if let Some(entry) = tracking.entry(account.identifier, &file.file.name) {
        match entry.parse_status {
            TrackingStatus::Success => info = info.with_count(entry.transaction_count),
            TrackingStatus::Error => info.parse_status = ParseStatus::Error,
        }
    }
    info
}

/// Month records for `files`. An STP PDF is the same statement as the
/// month's spreadsheet, so it takes over the spreadsheet's parse result.
pub fn build_months(
    account: &Account,
    files: &[StatementFile],
    tracking: &ParseTracking,
) -> AccountInventory {
    let mut months = AccountInventory::new();
    for file in files {
        months
            .entry(file.month)
            .or_default()
            .set(file.kind, file_info(account, file, tracking));
    }

    if account.kind == AccountKind::Stp {
        for record in months.values_mut() {
            let shared = record.xlsx().map(|x| (x.parse_status, x.transaction_count));
            if let (Some(pdf), Some((status, count))) = (record.pdf.as_mut(), shared) {
                if pdf.parse_status == ParseStatus::NotParsed {
                    pdf.parse_status = status;
                    pdf.transaction_count = count;
                }
            }
        }
    }
    months
}

impl InventoryScanner {
    pub fn new(store: Arc<dyn DocumentStore>, inventory: Arc<InventoryManager>) -> Self {
        Self { store, inventory }
    }

    pub async fn scan_account(
        &self,
        account: &Account,
        tracking: &ParseTracking,
    ) -> Result<AccountInventory> {
        let files = discover(self.store.as_ref(), account)
            .await
            .with_context(|| format!("list {}", account.folder))?;
        Ok(build_months(account, &files, tracking))
    }

    /// Rescan one account and write it into the inventory. Returns the
    /// number of files found.
    pub async fn refresh_account(
        &self,
        account: &Account,
        tracking: &ParseTracking,
    ) -> Result<usize> {
        let months = self.scan_account(account, tracking).await?;
        let found = months.values().map(|m| m.file_count()).sum();
        self.inventory.update_account(account.id, months).await?;
        tracing::info!(account = account.id, files = found, "inventory refreshed");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use statements_core::{FileKind, MonthKey, account};
    use statements_store::StoredFile;

    fn sf(name: &str, kind: FileKind, month: u32) -> StatementFile {
        StatementFile {
            file: StoredFile {
                id: format!("f/{name}"),
                name: name.to_string(),
                folder: "f".to_string(),
                size: 10,
                last_modified: Utc::now(),
            },
            month: MonthKey::new(2025, month).unwrap(),
            kind,
        }
    }

    #[test]
    fn stp_pdf_shares_spreadsheet_result() {
        let stp = account::by_id("stp_sa").unwrap();
        let xlsx = sf("ec-646180559700000009-202501.xlsx", FileKind::Xlsx, 1);
        let pdf = sf("ec-646180559700000009-202501.pdf", FileKind::Pdf, 1);
        let lone_pdf = sf("ec-646180559700000009-202502.pdf", FileKind::Pdf, 2);

        let mut tracking = ParseTracking::default();
        tracking.record_success(stp.identifier, &xlsx.file, 88);

        let months = build_months(stp, &[xlsx, pdf, lone_pdf], &tracking);
        let jan = &months[&MonthKey::new(2025, 1).unwrap()];
        assert_eq!(jan.pdf().unwrap().transaction_count, 88);
        assert!(jan.pdf().unwrap().is_parsed());
        assert_eq!(jan.xlsx().unwrap().file_size, Some(10));

        let feb = &months[&MonthKey::new(2025, 2).unwrap()];
        assert_eq!(feb.pdf().unwrap().parse_status, ParseStatus::NotParsed);
    }

    #[test]
    fn bbva_failures_show_as_error() {
        let bbva = account::by_id("bbva_ip_corp").unwrap();
        let pdf = sf("2503 BBVA IP MXN Corp.pdf", FileKind::Pdf, 3);
        let mut tracking = ParseTracking::default();
        tracking.record_failure(bbva.identifier, &pdf.file, "no table found");

        let months = build_months(bbva, &[pdf], &tracking);
        let mar = &months[&MonthKey::new(2025, 3).unwrap()];
        assert_eq!(mar.pdf().unwrap().parse_status, ParseStatus::Error);
        assert_eq!(mar.pdf().unwrap().file_id.as_deref(), Some("f/2503 BBVA IP MXN Corp.pdf"));
    }
}
