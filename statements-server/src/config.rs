use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[server]` section of the statements config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Root of the local document store.
    pub store_root: PathBuf,
    /// When set, every request must carry `Authorization: Bearer <token>`.
    pub api_token: Option<String>,
    /// External parser executable; see `parser::CommandParser`.
    pub parser_command: Option<String>,
    pub session_ttl_secs: u64,
    pub batch_session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            store_root: PathBuf::from("store"),
            api_token: None,
            parser_command: None,
            session_ttl_secs: 300,
            batch_session_ttl_secs: 600,
        }
    }
}
