use anyhow::{Context, Result};
use statements_core::{AccountData, account};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// `$STATEMENTS_HOME`, or `~/.statements`.
pub fn statements_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("STATEMENTS_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".statements"))
}

pub fn ensure_statements_home() -> Result<PathBuf> {
    let dir = statements_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// What one invocation knows: the selected year, the accounts in play and
/// the account data fetched so far, keyed by (year, account id).
#[derive(Debug, Clone)]
pub struct SessionState {
    pub year: i32,
    pub account_ids: Vec<&'static str>,
    cache: HashMap<(i32, String), AccountData>,
}

impl SessionState {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            account_ids: account::ids().collect(),
            cache: HashMap::new(),
        }
    }

    pub fn with_accounts(mut self, ids: Vec<&'static str>) -> Self {
        self.account_ids = ids;
        self
    }

    pub fn cached(&self, account_id: &str) -> Option<&AccountData> {
        self.cache.get(&(self.year, account_id.to_string()))
    }

    pub fn store(&mut self, data: AccountData) {
        self.cache.insert((self.year, data.id.clone()), data);
    }

    /// Forget one account for the current year so the next read refetches.
    pub fn invalidate(&mut self, account_id: &str) {
        self.cache.remove(&(self.year, account_id.to_string()));
    }

    pub fn set_year(&mut self, year: i32) {
        self.year = year;
    }

    /// Cached accounts of the current year, in registry order.
    pub fn loaded(&self) -> impl Iterator<Item = &AccountData> {
        self.account_ids.iter().filter_map(|id| self.cached(id))
    }
}
