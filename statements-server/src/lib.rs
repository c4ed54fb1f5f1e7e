//! statements-server: REST backend over the statement document store.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod inventory;
pub mod loader;
pub mod parser;
pub mod routes;
pub mod scanner;
pub mod sessions;
pub mod upload;

pub use config::ServerConfig;
pub use coordinator::{ParseCoordinator, ParseSummary};
pub use error::{ApiError, ApiResult};
pub use inventory::InventoryManager;
pub use loader::{DataLoader, YearData};
pub use parser::{CommandParser, Detection, MissingParser, StatementParser};
pub use routes::{AppState, router};
pub use scanner::{InventoryScanner, build_months};
pub use sessions::{SessionHandle, SessionRegistry};
pub use upload::{UploadHandler, Validation, validate_filename};

use anyhow::{Context, Result, bail};
use statements_core::validate_registry;
use statements_store::LocalStore;
use std::sync::Arc;
use std::time::Duration;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Run the server until the process is stopped.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let registry = validate_registry();
    if !registry.is_ok() {
        bail!("account registry is inconsistent: {registry:?}");
    }

    tokio::fs::create_dir_all(&config.store_root)
        .await
        .with_context(|| format!("create store root {}", config.store_root.display()))?;
    let store = Arc::new(LocalStore::new(&config.store_root));

    let parser: Arc<dyn StatementParser> = match config.parser_command.as_deref() {
        Some(cmd) => Arc::new(CommandParser::new(cmd)),
        None => {
            tracing::warn!("no parser_command configured; parse requests will fail");
            Arc::new(MissingParser)
        }
    };

    let bind = config.bind.clone();
    if config.api_token.is_none() {
        tracing::warn!("no api_token configured; the API is open");
    }
    let state = AppState::new(config, store, parser);

    let sessions = Arc::clone(&state.sessions);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            tick.tick().await;
            sessions.evict_expired().await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    tracing::info!(%bind, "statements server listening");
    axum::serve(listener, router(state))
        .await
        .context("server stopped")?;
    Ok(())
}
