//! The central inventory document, cached in memory.

use anyhow::{Context, Result, bail};
use statements_core::inventory::validate_structure;
use statements_core::{AccountInventory, Inventory};
use statements_store::{DocumentStore, INVENTORY_FILE, INVENTORY_FOLDER, StoreError};
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InventoryManager {
    store: Arc<dyn DocumentStore>,
    cache: RwLock<Option<Inventory>>,
}

impl InventoryManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
        }
    }

    async fn read_from_store(&self) -> Result<Option<Inventory>> {
        let bytes = match self.store.read_in(INVENTORY_FOLDER, INVENTORY_FILE).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e).context("read inventory"),
        };
        let doc: serde_json::Value =
            serde_json::from_slice(&bytes).context("inventory is not JSON")?;
        let issues = validate_structure(&doc);
        if !issues.is_empty() {
            tracing::warn!(count = issues.len(), first = %issues[0], "inventory failed validation");
            bail!("invalid inventory structure: {}", issues.join("; "));
        }
        let inventory = serde_json::from_value(doc).context("decode inventory")?;
        Ok(Some(inventory))
    }

    async fn write_to_store(&self, inventory: &Inventory) -> Result<()> {
        let json = serde_json::to_vec_pretty(inventory).context("encode inventory")?;
        self.store
            .write(INVENTORY_FOLDER, INVENTORY_FILE, &json)
            .await
            .context("write inventory")?;
        Ok(())
    }

    /// Current inventory, or `None` when none has been written yet.
    pub async fn load(&self) -> Result<Option<Inventory>> {
        if let Some(inv) = self.cache.read().await.as_ref() {
            return Ok(Some(inv.clone()));
        }
        let mut cache = self.cache.write().await;
        if cache.is_none() {
            *cache = self.read_from_store().await?;
            if cache.is_some() {
                tracing::debug!("inventory loaded from store");
            }
        }
        Ok(cache.clone())
    }

    /// Replace one account's months and persist.
    pub async fn update_account(&self, account_id: &str, months: AccountInventory) -> Result<()> {
        let mut cache = self.cache.write().await;
        let mut inventory = match cache.take() {
            Some(inv) => inv,
            None => self.read_from_store().await?.unwrap_or_default(),
        };
        inventory.replace_account(account_id, months);
        inventory.touch();
        self.write_to_store(&inventory).await?;
        *cache = Some(inventory);
        Ok(())
    }

    pub async fn save(&self, mut inventory: Inventory) -> Result<()> {
        let mut cache = self.cache.write().await;
        inventory.touch();
        self.write_to_store(&inventory).await?;
        *cache = Some(inventory);
        Ok(())
    }

    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
        tracing::debug!("inventory cache cleared");
    }

    pub async fn is_cached(&self) -> bool {
        self.cache.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statements_core::{FileInfo, FileKind, MonthKey};
    use statements_store::LocalStore;

    #[tokio::test]
    async fn missing_inventory_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = InventoryManager::new(Arc::new(LocalStore::new(dir.path())));
        assert!(mgr.load().await.unwrap().is_none());
        assert!(!mgr.is_cached().await);
    }

    #[tokio::test]
    async fn update_persists_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path()));
        let mgr = InventoryManager::new(store.clone());

        let mut months = AccountInventory::new();
        months
            .entry(MonthKey::new(2025, 1).unwrap())
            .or_default()
            .set(FileKind::Pdf, FileInfo::present("p"));
        mgr.update_account("bbva_mx_mxn", months).await.unwrap();
        assert!(mgr.is_cached().await);

        mgr.clear_cache().await;
        let inv = mgr.load().await.unwrap().unwrap();
        assert_eq!(inv.account("bbva_mx_mxn").unwrap().len(), 1);
        assert_eq!(inv.version, "1.0");
    }

    #[tokio::test]
    async fn corrupt_inventory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path()));
        store
            .write(INVENTORY_FOLDER, INVENTORY_FILE, br#"{"version": "1.0"}"#)
            .await
            .unwrap();
        let mgr = InventoryManager::new(store);
        let err = mgr.load().await.unwrap_err();
        assert!(err.to_string().contains("invalid inventory structure"));
    }
}
