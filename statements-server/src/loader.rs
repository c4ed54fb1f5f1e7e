//! Inventory to calendar data.

use serde::Serialize;
use statements_core::{Account, AccountData, SystemSummary, UiData, account, summarize, ui_data};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::inventory::InventoryManager;

const NO_INVENTORY: &str = "No inventory yet, refresh to scan the store";

#[derive(Debug, Clone, Serialize)]
pub struct YearData {
    pub year: i32,
    pub accounts: BTreeMap<String, AccountData>,
    pub summary: SystemSummary,
}

pub struct DataLoader {
    inventory: Arc<InventoryManager>,
}

impl DataLoader {
    pub fn new(inventory: Arc<InventoryManager>) -> Self {
        Self { inventory }
    }

    /// Never fails: a missing inventory yields fallback data and a broken
    /// one yields error data, both with empty months.
    pub async fn account_data(&self, account: &Account, year: i32) -> AccountData {
        match self.inventory.load().await {
            Ok(Some(inv)) => AccountData::from_inventory(account, &inv, year),
            Ok(None) => AccountData::fallback(account, NO_INVENTORY),
            Err(e) => {
                tracing::warn!(account = account.id, error = %e, "inventory unavailable");
                AccountData::failed(account, &format!("{e:#}"))
            }
        }
    }

    pub async fn year_data(&self, year: i32) -> YearData {
        let loaded = self.inventory.load().await;
        let accounts: BTreeMap<String, AccountData> = account::all()
            .iter()
            .map(|a| {
                let data = match &loaded {
                    Ok(Some(inv)) => AccountData::from_inventory(a, inv, year),
                    Ok(None) => AccountData::fallback(a, NO_INVENTORY),
                    Err(e) => AccountData::failed(a, &format!("{e:#}")),
                };
                (a.id.to_string(), data)
            })
            .collect();
        let summary = summarize(accounts.values());
        YearData {
            year,
            accounts,
            summary,
        }
    }

    pub async fn ui_data(&self, year: i32) -> UiData {
        let data = self.year_data(year).await;
        ui_data(data.accounts.values())
    }
}
