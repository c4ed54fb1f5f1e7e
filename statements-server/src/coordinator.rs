//! Background parse and inventory-refresh jobs.
//!
//! Each `start_*` call registers a session, spawns the job and returns the
//! session id at once; the job reports into its session until it completes
//! or fails.

use anyhow::{Context, Result};
use chrono::Duration;
use statements_core::{
    Account, AccountKind, FileKind, ProgressRecord, SessionKind, SessionStatus, account,
};
use statements_store::{DocumentStore, ParseTracking, StatementFile, TrackingLedger, discover};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::parser::StatementParser;
use crate::scanner::InventoryScanner;
use crate::sessions::{SessionHandle, SessionRegistry};

/// Per-account slice of a session's progress bar. Batch jobs give each
/// account its share; single jobs use the whole range.
#[derive(Clone, Copy)]
struct Slice {
    from: u8,
    to: u8,
}

impl Slice {
    const FULL: Slice = Slice { from: 0, to: 100 };

    fn nth(i: usize, n: usize) -> Slice {
        Slice {
            from: ProgressRecord::scaled(i as u64, n as u64, 0, 100),
            to: ProgressRecord::scaled(i as u64 + 1, n as u64, 0, 100),
        }
    }

    fn at(&self, local: u8) -> u8 {
        ProgressRecord::scaled(u64::from(local), 100, self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub parsed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub transactions: u64,
}

/// Only the parsed source of each family is sent to the parser: STP
/// spreadsheets and BBVA PDFs.
fn is_parse_source(account: &Account, file: &StatementFile) -> bool {
    match account.kind {
        AccountKind::Stp => file.kind.is_spreadsheet(),
        AccountKind::Bbva => file.kind == FileKind::Pdf,
    }
}

/// BBVA storage timestamps drift after upload; allow some slack.
fn modification_tolerance(kind: AccountKind) -> Duration {
    match kind {
        AccountKind::Stp => Duration::zero(),
        AccountKind::Bbva => Duration::hours(2),
    }
}

pub struct ParseCoordinator {
    store: Arc<dyn DocumentStore>,
    parser: Arc<dyn StatementParser>,
    scanner: InventoryScanner,
    sessions: Arc<SessionRegistry>,
    tracking: Arc<TrackingLedger>,
    /// One lock per account; parses of the same account run one at a time.
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Running single-account parse sessions by account id.
    active: Mutex<HashMap<&'static str, String>>,
}

impl ParseCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        parser: Arc<dyn StatementParser>,
        scanner: InventoryScanner,
        sessions: Arc<SessionRegistry>,
        tracking: Arc<TrackingLedger>,
    ) -> Self {
        Self {
            store,
            parser,
            scanner,
            sessions,
            tracking,
            account_locks: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    async fn account_lock(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        Arc::clone(locks.entry(account_id.to_string()).or_default())
    }

    /// Start a parse of `account`. While one is already running for the
    /// account, its session id is returned instead of starting another.
    pub async fn start_parse(self: &Arc<Self>, account: &'static Account) -> String {
        let mut active = self.active.lock().await;
        if let Some(running) = active.get(account.id) {
            tracing::info!(account = account.id, session = %running, "parse already running");
            return running.clone();
        }
        let handle = self
            .sessions
            .create(account.id, SessionKind::Parse, Some((account.id, account.name)))
            .await;
        let id = handle.id().to_string();
        active.insert(account.id, id.clone());
        drop(active);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(account = account.id, session = handle.id(), "parse started");
            let result = this.parse_account(account, &handle, Slice::FULL).await;
            this.active.lock().await.remove(account.id);
            match result {
                Ok(s) => {
                    tracing::info!(
                        account = account.id,
                        parsed = s.parsed,
                        skipped = s.skipped,
                        failed = s.failed,
                        "parse finished"
                    );
                    handle
                        .complete(format!(
                            "Parsed {} file(s), skipped {}, {} transaction(s) added",
                            s.parsed, s.skipped, s.transactions
                        ))
                        .await;
                }
                Err(e) => {
                    tracing::error!(account = account.id, error = %e, "parse failed");
                    handle.fail(format!("{e:#}")).await;
                }
            }
        });
        id
    }

    pub async fn start_parse_all(self: &Arc<Self>) -> String {
        let handle = self.sessions.create("batch", SessionKind::Batch, None).await;
        handle.update(|r| r.account_name = Some("All accounts".to_string())).await;
        let id = handle.id().to_string();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let accounts = account::all();
            let mut failed_accounts = 0;
            for (i, acct) in accounts.iter().enumerate() {
                let slice = Slice::nth(i, accounts.len());
                handle
                    .advance(
                        SessionStatus::ProcessingFiles,
                        slice.from,
                        format!("Parsing {} ({}/{})", acct.name, i + 1, accounts.len()),
                    )
                    .await;
                if let Err(e) = this.parse_account(acct, &handle, slice).await {
                    failed_accounts += 1;
                    tracing::error!(account = acct.id, error = %e, "batch parse: account failed");
                    let msg = format!("{}: {e:#}", acct.name);
                    handle.update(|r| r.errors.push(msg)).await;
                }
            }
            handle
                .complete(format!(
                    "Batch parse finished: {} account(s), {failed_accounts} failed",
                    accounts.len()
                ))
                .await;
        });
        id
    }

    pub async fn start_refresh(self: &Arc<Self>, account: &'static Account) -> String {
        let handle = self
            .sessions
            .create(account.id, SessionKind::Refresh, Some((account.id, account.name)))
            .await;
        let id = handle.id().to_string();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.refresh_account(account, &handle, Slice::FULL).await {
                Ok(found) => handle.complete(format!("Found {found} file(s)")).await,
                Err(e) => {
                    tracing::error!(account = account.id, error = %e, "refresh failed");
                    handle.fail(format!("{e:#}")).await;
                }
            }
        });
        id
    }

    pub async fn start_refresh_all(self: &Arc<Self>) -> String {
        let handle = self.sessions.create("refresh_all", SessionKind::Batch, None).await;
        handle.update(|r| r.account_name = Some("All accounts".to_string())).await;
        let id = handle.id().to_string();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let accounts = account::all();
            let mut total = 0;
            for (i, acct) in accounts.iter().enumerate() {
                match this.refresh_account(acct, &handle, Slice::nth(i, accounts.len())).await {
                    Ok(found) => total += found,
                    Err(e) => {
                        tracing::error!(account = acct.id, error = %e, "refresh failed");
                        let msg = format!("{}: {e:#}", acct.name);
                        handle.update(|r| r.errors.push(msg)).await;
                    }
                }
            }
            handle
                .complete(format!("Scanned {} account(s), found {total} file(s)", accounts.len()))
                .await;
        });
        id
    }

    async fn refresh_account(
        &self,
        account: &Account,
        handle: &SessionHandle,
        slice: Slice,
    ) -> Result<usize> {
        handle
            .advance(
                SessionStatus::ScanningAccount,
                slice.at(10),
                format!("Scanning {}", account.name),
            )
            .await;
        let tracking = self.tracking.snapshot().await.context("load parse tracking")?;
        handle
            .advance(SessionStatus::Saving, slice.at(80), format!("Saving {}", account.name))
            .await;
        let found = self.scanner.refresh_account(account, &tracking).await?;
        handle
            .update(|r| {
                r.total_files += found as u64;
                r.files_processed += found as u64;
            })
            .await;
        Ok(found)
    }

    /// Parse whatever is new or stale for `account`, then rescan its
    /// inventory so counts are current.
    async fn parse_account(
        &self,
        account: &Account,
        handle: &SessionHandle,
        slice: Slice,
    ) -> Result<ParseSummary> {
        let lock = self.account_lock(account.id).await;
        let _parsing = lock.lock().await;

        handle
            .advance(
                SessionStatus::FetchingFiles,
                slice.at(5),
                format!("Listing files in {}", account.folder),
            )
            .await;
        let files: Vec<StatementFile> = discover(self.store.as_ref(), account)
            .await
            .with_context(|| format!("list {}", account.folder))?
            .into_iter()
            .filter(|f| is_parse_source(account, f))
            .collect();

        handle
            .advance(SessionStatus::CheckingFiles, slice.at(15), "Checking parse history")
            .await;
        let tracking = self.tracking.snapshot().await.context("load parse tracking")?;

        let tolerance = modification_tolerance(account.kind);
        let mut queue = Vec::new();
        for f in &files {
            match tracking.needs_parse(account.identifier, &f.file, tolerance) {
                Some(reason) => {
                    tracing::debug!(file = %f.file.name, reason, "queued for parsing");
                    queue.push(f);
                }
                None => tracing::debug!(file = %f.file.name, "up to date"),
            }
        }

        let mut results = ParseTracking::default();
        let mut summary = ParseSummary {
            skipped: (files.len() - queue.len()) as u64,
            ..ParseSummary::default()
        };
        handle
            .update(|r| {
                r.total_files += files.len() as u64;
                r.files_skipped += summary.skipped;
            })
            .await;

        for (i, f) in queue.iter().enumerate() {
            let name = f.file.name.clone();
            handle
                .advance(
                    SessionStatus::ProcessingFiles,
                    slice.at(ProgressRecord::scaled(i as u64, queue.len() as u64, 20, 90)),
                    format!("Parsing {name} ({}/{})", i + 1, queue.len()),
                )
                .await;
            handle.update(|r| r.current_file = Some(name.clone())).await;

            let outcome = match self.store.materialize(&f.file.id).await {
                Ok(path) => self.parser.parse(account.kind, &path).await,
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(count) => {
                    results.record_success(account.identifier, &f.file, count);
                    summary.parsed += 1;
                    summary.transactions += count;
                    handle
                        .update(|r| {
                            r.files_processed += 1;
                            r.transactions_added += count;
                        })
                        .await;
                }
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "parse failed");
                    results.record_failure(account.identifier, &f.file, e.to_string());
                    summary.failed += 1;
                    let msg = format!("{name}: {e:#}");
                    handle.update(|r| r.errors.push(msg)).await;
                }
            }
        }

        handle
            .advance(SessionStatus::Saving, slice.at(92), "Saving results")
            .await;
        let tracking = self.tracking.commit(results).await.context("save parse tracking")?;
        self.scanner.refresh_account(account, &tracking).await?;
        handle.update(|r| r.current_file = None).await;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_cover_the_bar() {
        assert_eq!(Slice::FULL.at(50), 50);
        let first = Slice::nth(0, 9);
        let last = Slice::nth(8, 9);
        assert_eq!(first.from, 0);
        assert_eq!(last.to, 100);
        assert!(first.at(100) <= Slice::nth(1, 9).from);
    }

    #[test]
    fn only_parse_sources_are_queued() {
        use chrono::Utc;
        use statements_core::MonthKey;
        use statements_store::StoredFile;

        let f = |name: &str, kind| StatementFile {
            file: StoredFile {
                id: name.to_string(),
                name: name.to_string(),
                folder: String::new(),
                size: 1,
                last_modified: Utc::now(),
            },
            month: MonthKey::new(2025, 1).unwrap(),
            kind,
        };
        let stp = account::by_id("stp_sa").unwrap();
        assert!(is_parse_source(stp, &f("a.xlsx", FileKind::Xlsx)));
        assert!(!is_parse_source(stp, &f("a.pdf", FileKind::Pdf)));
        let bbva = account::by_id("bbva_mx_mxn").unwrap();
        assert!(is_parse_source(bbva, &f("b.pdf", FileKind::Pdf)));
    }
}
