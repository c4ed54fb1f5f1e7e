//! Statement files of one account, mapped to months.
//!
//! Folders can be shared between accounts (both STP IP accounts use one), so
//! a file belongs to an account only when it matches that account's own
//! filename pattern.

use statements_core::{Account, FileKind, MonthKey, classify_name};

use crate::document::{DocumentStore, StoredFile};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFile {
    pub file: StoredFile,
    pub month: MonthKey,
    pub kind: FileKind,
}

/// Pick `account`'s statements out of a folder listing.
pub fn statement_files(account: &Account, files: Vec<StoredFile>) -> Vec<StatementFile> {
    let mut out = Vec::new();
    for file in files {
        if !account.matches_filename(&file.name) {
            continue;
        }
        let Some(kind) = FileKind::from_filename(&file.name) else {
            continue;
        };
        let period = classify_name(&file.name).ok().and_then(|c| c.period());
        let Some(month) = period.and_then(|(y, m)| MonthKey::new(y, m).ok()) else {
            tracing::debug!(account = account.id, file = %file.name, "no period in filename");
            continue;
        };
        out.push(StatementFile { file, month, kind });
    }
    out.sort_by(|a, b| a.month.cmp(&b.month).then_with(|| a.file.name.cmp(&b.file.name)));
    out
}

pub async fn discover(store: &dyn DocumentStore, account: &Account) -> Result<Vec<StatementFile>> {
    let listing = store.list(account.folder).await?;
    Ok(statement_files(account, listing))
}
