use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use statements_server::ServerConfig;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::ensure_statements_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub base_url: String,
    pub poll_interval_ms: u64,
    /// Pause between accounts when loading several.
    pub bulk_stagger_ms: u64,
    /// Year shown when none is given; the current year when unset.
    pub year: Option<i32>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            poll_interval_ms: 1500,
            bulk_stagger_ms: 300,
            year: None,
        }
    }
}

impl ClientSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(1000, 2000))
    }

    pub fn bulk_stagger(&self) -> Duration {
        Duration::from_millis(self.bulk_stagger_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_statements_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [client]
            poll_interval_ms = 5000

            [server]
            api_token = "t"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.client.base_url, "http://127.0.0.1:8080");
        assert_eq!(cfg.client.poll_interval(), Duration::from_millis(2000));
        assert_eq!(cfg.server.api_token.as_deref(), Some("t"));
        assert_eq!(cfg.server.session_ttl_secs, 300);
    }

    #[test]
    fn defaults_survive_a_write() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.client.bulk_stagger_ms, 300);
        assert_eq!(back.server.bind, "127.0.0.1:8080");
    }
}
