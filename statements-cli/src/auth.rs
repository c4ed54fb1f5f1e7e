use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};

use crate::state::ensure_statements_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthState {
    pub token: Option<String>,
}

fn auth_path() -> Result<std::path::PathBuf> {
    Ok(ensure_statements_home()?.join("auth.json"))
}

pub fn load_auth() -> Result<AuthState> {
    let p = auth_path()?;
    if !p.exists() {
        return Ok(AuthState::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_auth(auth: &AuthState) -> Result<()> {
    let p = auth_path()?;
    let s = serde_json::to_string_pretty(auth)?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

fn prompt_secret(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

/// Store the API token, from `--token` or pasted on stdin.
pub fn login(token: Option<String>) -> Result<()> {
    let token = match token {
        Some(t) => t.trim().to_string(),
        None => prompt_secret("Paste API token")?,
    };
    if token.is_empty() {
        bail!("empty token");
    }
    save_auth(&AuthState { token: Some(token) })?;
    println!("Saved token to {}", auth_path()?.display());
    Ok(())
}
