//! statements-core: domain types for the bank statements manager

pub mod account;
pub mod account_data;
pub mod calendar;
pub mod classify;
pub mod dialog;
pub mod inventory;
pub mod month;
pub mod session;
pub mod statement;
pub mod upload;

pub use account::{Account, AccountKind, RegistryCheck, validate_registry};
pub use account_data::{
    AccountData, DataSource, LoadStatus, MonthStatus, MonthView, SystemSummary, UiAccount, UiData,
    UiMonth, summarize, ui_data,
};
pub use calendar::{CellState, ClickAction, DbStatus, Icon, format_count, render_cell};
pub use classify::{
    Classification, FileKind, MAX_UPLOAD_BYTES, Rejection, classify_name, supported_formats,
    validate_upload,
};
pub use dialog::{FileSelectionDialog, ParseProgressDialog, ResultsDialog, UploadDialog};
pub use inventory::{AccountInventory, FileInfo, Inventory, MonthRecord, ParseStatus};
pub use month::MonthKey;
pub use session::{
    ParseOutcome, PollEvent, PollPhase, ProgressRecord, SessionKind, SessionStatus,
};
pub use statement::StatementMonth;
pub use upload::{UploadBatch, UploadCandidate, UploadResponse, UploadResult, affected_accounts};
