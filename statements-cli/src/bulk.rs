//! Load several accounts one after another with a fixed pause between them.

use statements_core::AccountData;
use std::future::Future;
use std::time::Duration;

use crate::api::ClientResult;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkProgress {
    pub done: usize,
    pub total: usize,
}

impl BulkProgress {
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.done * 100 / self.total) as u8
    }
}

#[derive(Debug, Default)]
pub struct BulkReport {
    pub loaded: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

/// Fetch every account in `state.account_ids` not already cached for the
/// current year. A failed account is recorded and the rest continue.
pub async fn load_accounts<F, Fut>(
    state: &mut SessionState,
    stagger: Duration,
    mut fetch: F,
    mut on_progress: impl FnMut(BulkProgress, &str),
) -> BulkReport
where
    F: FnMut(&'static str, i32) -> Fut,
    Fut: Future<Output = ClientResult<AccountData>>,
{
    let pending: Vec<&'static str> = state
        .account_ids
        .iter()
        .copied()
        .filter(|id| state.cached(id).is_none())
        .collect();
    let total = pending.len();
    let mut report = BulkReport::default();

    for (i, id) in pending.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(stagger).await;
        }
        match fetch(id, state.year).await {
            Ok(data) => {
                state.store(data);
                report.loaded.push(id);
            }
            Err(e) => {
                tracing::warn!(account = id, error = %e, "load failed");
                report.failed.push((id, e.to_string()));
            }
        }
        on_progress(BulkProgress { done: i + 1, total }, id);
    }
    report
}
