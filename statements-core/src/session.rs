//! Parse and inventory-refresh sessions.
//!
//! The server owns a [`ProgressRecord`] per session and updates it as the job
//! runs; clients poll it until it turns terminal. [`PollPhase`] is the
//! client-side state machine around one such poll.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    Starting,
    FetchingFiles,
    CheckingFiles,
    ProcessingFiles,
    ScanningAccount,
    Saving,
    /// Generic running state some servers report.
    InProgress,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::Starting => "starting",
            SessionStatus::FetchingFiles => "fetching_files",
            SessionStatus::CheckingFiles => "checking_files",
            SessionStatus::ProcessingFiles => "processing_files",
            SessionStatus::ScanningAccount => "scanning_account",
            SessionStatus::Saving => "saving",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Parse,
    Refresh,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub session_id: String,
    #[serde(default = "default_kind")]
    pub kind: SessionKind,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    pub status: SessionStatus,
    #[serde(default)]
    pub progress_percentage: u8,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub files_processed: u64,
    #[serde(default)]
    pub files_skipped: u64,
    #[serde(default)]
    pub transactions_added: u64,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "Utc::now")]
    pub start_time: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

fn default_kind() -> SessionKind {
    SessionKind::Parse
}

impl ProgressRecord {
    pub fn new(session_id: impl Into<String>, kind: SessionKind) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            kind,
            account_id: None,
            account_name: None,
            status: SessionStatus::Initializing,
            progress_percentage: 0,
            total_files: 0,
            files_processed: 0,
            files_skipped: 0,
            transactions_added: 0,
            current_file: None,
            details: "Initializing...".to_string(),
            errors: Vec::new(),
            error: None,
            start_time: now,
            last_update: now,
            end_time: None,
        }
    }

    pub fn for_account(mut self, account_id: &str, account_name: &str) -> Self {
        self.account_id = Some(account_id.to_string());
        self.account_name = Some(account_name.to_string());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a running state. Terminal records are left untouched.
    pub fn advance(&mut self, status: SessionStatus, percentage: u8, details: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = status;
        self.progress_percentage = percentage.min(100);
        self.details = details.into();
        self.last_update = Utc::now();
    }

    pub fn complete(&mut self, details: impl Into<String>) {
        let now = Utc::now();
        self.status = SessionStatus::Completed;
        self.progress_percentage = 100;
        self.current_file = None;
        self.details = details.into();
        self.last_update = now;
        self.end_time = Some(now);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let now = Utc::now();
        let message = message.into();
        self.status = SessionStatus::Error;
        self.details = format!("Error: {message}");
        self.error = Some(message);
        self.last_update = now;
        self.end_time = Some(now);
    }

    /// Percentage for `done` of `total` items, mapped into `[from, to]`.
    pub fn scaled(done: u64, total: u64, from: u8, to: u8) -> u8 {
        if total == 0 {
            return to;
        }
        let span = u64::from(to.saturating_sub(from));
        let pct = u64::from(from) + span * done.min(total) / total;
        pct.min(100) as u8
    }

    /// Outcome of a terminal record; `None` while the session is running.
    pub fn outcome(&self) -> Option<ParseOutcome> {
        match self.status {
            SessionStatus::Completed
                if self.files_processed == 0 && self.files_skipped > 0 && self.errors.is_empty() =>
            {
                Some(ParseOutcome::AlreadyCurrent {
                    skipped: self.files_skipped,
                })
            }
            SessionStatus::Completed => Some(ParseOutcome::Updated {
                processed: self.files_processed,
                skipped: self.files_skipped,
                transactions: self.transactions_added,
                errors: self.errors.len(),
            }),
            SessionStatus::Error => Some(ParseOutcome::Failed {
                message: self
                    .error
                    .clone()
                    .or_else(|| self.errors.first().cloned())
                    .unwrap_or_else(|| "Parse failed".to_string()),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Updated {
        processed: u64,
        skipped: u64,
        transactions: u64,
        errors: usize,
    },
    /// Nothing new to parse: every file was skipped as current and none failed.
    AlreadyCurrent { skipped: u64 },
    Failed { message: String },
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ParseOutcome::Failed { .. })
    }

    pub fn message(&self) -> String {
        match self {
            ParseOutcome::Updated {
                processed,
                skipped,
                transactions,
                errors,
            } => {
                let mut msg = format!(
                    "Parsed {processed} file(s), {transactions} transaction(s) added"
                );
                if *skipped > 0 {
                    msg.push_str(&format!(", {skipped} already current"));
                }
                if *errors > 0 {
                    msg.push_str(&format!(", {errors} error(s)"));
                }
                msg
            }
            ParseOutcome::AlreadyCurrent { skipped } => {
                format!("All {skipped} file(s) already up to date, nothing to parse")
            }
            ParseOutcome::Failed { message } => format!("Parse failed: {message}"),
        }
    }
}

/// Client-side parse flow: `idle -> starting -> polling -> completed | error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Starting,
    Polling { session_id: String },
    Completed(ParseOutcome),
    Error(String),
}

#[derive(Debug, Clone)]
pub enum PollEvent {
    Start,
    Started { session_id: String },
    StartFailed(String),
    Progress(ProgressRecord),
    PollFailed(String),
}

impl PollPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollPhase::Completed(_) | PollPhase::Error(_))
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            PollPhase::Polling { session_id } => Some(session_id),
            _ => None,
        }
    }

    pub fn next(self, event: PollEvent) -> Result<PollPhase> {
        let next = match (self, event) {
            (PollPhase::Idle, PollEvent::Start) => PollPhase::Starting,
            (PollPhase::Starting, PollEvent::Started { session_id }) => {
                PollPhase::Polling { session_id }
            }
            (PollPhase::Starting, PollEvent::StartFailed(msg)) => PollPhase::Error(msg),
            (PollPhase::Polling { session_id }, PollEvent::Progress(record)) => {
                if record.session_id != session_id {
                    bail!(
                        "progress for session {} while polling {session_id}",
                        record.session_id
                    );
                }
                match record.outcome() {
                    Some(ParseOutcome::Failed { message }) => PollPhase::Error(message),
                    Some(outcome) => PollPhase::Completed(outcome),
                    None => PollPhase::Polling { session_id },
                }
            }
            (PollPhase::Polling { .. }, PollEvent::PollFailed(msg)) => PollPhase::Error(msg),
            (phase, event) => bail!("invalid transition from {phase:?} on {event:?}"),
        };
        Ok(next)
    }
}
