//! statements-store: the document store seam and what lives in it
//! (statement files per account, parse tracking).

pub mod discovery;
pub mod document;
pub mod error;
pub mod local;
pub mod tracking;

pub use discovery::{StatementFile, discover, statement_files};
pub use document::{DocumentStore, StoredFile};
pub use error::{Result, StoreError};
pub use local::LocalStore;
pub use tracking::{ParseTracking, TrackingEntry, TrackingLedger, TrackingStatus};

/// Folder holding the inventory and tracking documents.
pub const INVENTORY_FOLDER: &str = "Inventario";
pub const INVENTORY_FILE: &str = "statements_inventory.json";
pub const TRACKING_FILE: &str = "parse_tracking.json";
