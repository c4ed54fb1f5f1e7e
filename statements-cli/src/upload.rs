//! Upload flow: validate locally, send the valid files in one request,
//! then refetch the accounts that received files.

use anyhow::{Context, Result, bail};
use statements_core::{UploadBatch, UploadCandidate, UploadDialog, UploadResult, affected_accounts};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ApiClient;
use crate::state::SessionState;

pub struct Prepared {
    pub batch: UploadBatch,
    /// Same order as `batch.checks`.
    paths: Vec<PathBuf>,
}

pub struct UploadReport {
    /// Local rejections first, then the server's answers.
    pub results: Vec<UploadResult>,
    pub refreshed: Vec<&'static str>,
}

fn candidate(path: &Path) -> Result<UploadCandidate> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no usable file name in {}", path.display()))?;
    let size = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    Ok(UploadCandidate::new(name, size))
}

pub fn prepare(paths: &[PathBuf]) -> Result<Prepared> {
    let candidates = paths.iter().map(|p| candidate(p)).collect::<Result<Vec<_>>>()?;
    Ok(Prepared {
        batch: UploadBatch::validate(candidates),
        paths: paths.to_vec(),
    })
}

impl Prepared {
    pub fn dialog(&self) -> UploadDialog {
        UploadDialog::new(&self.batch)
    }

    fn read_valid(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.batch
            .checks
            .iter()
            .zip(&self.paths)
            .filter(|(check, _)| check.is_valid())
            .map(|(check, path)| {
                let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
                Ok((check.candidate.filename.clone(), bytes))
            })
            .collect()
    }
}

pub async fn run(
    client: &ApiClient,
    state: &mut SessionState,
    prepared: &Prepared,
) -> Result<UploadReport> {
    if !prepared.batch.can_submit() {
        bail!("no valid files to upload");
    }

    let files = prepared.read_valid()?;
    tracing::info!(files = files.len(), "uploading");
    let response = client.upload(files).await.context("upload")?;

    let mut results = prepared.batch.rejected_results();
    results.extend(response.results);

    let mut refreshed = Vec::new();
    for id in affected_accounts(&results) {
        state.invalidate(id);
        match client.load_account_data(id, state.year).await {
            Ok(data) => {
                state.store(data);
                refreshed.push(id);
            }
            Err(e) => tracing::warn!(account = id, error = %e, "refetch after upload failed"),
        }
    }
    Ok(UploadReport { results, refreshed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_keeps_mixed_batches() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("ec-646180559700000009-202501.xlsx");
        let bad = dir.path().join("notes.docx");
        fs::write(&good, b"sheet").unwrap();
        fs::write(&bad, b"text").unwrap();

        let prepared = prepare(&[good.clone(), bad]).unwrap();
        assert!(prepared.batch.can_submit());
        assert_eq!(prepared.batch.valid_count(), 1);
        assert_eq!(prepared.dialog().summary, "1 file(s) ready, 1 rejected");

        let files = prepared.read_valid().unwrap();
        let expected = ("ec-646180559700000009-202501.xlsx".to_string(), b"sheet".to_vec());
        assert_eq!(files, vec![expected]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare(&[dir.path().join("gone.pdf")]).is_err());
    }
}
