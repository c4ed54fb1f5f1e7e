//! Upload batches: local validation before submission and the per-file
//! results that come back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::account::{self, AccountKind};
use crate::classify::{validate_upload, Classification, Rejection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub filename: String,
    pub size: u64,
}

impl UploadCandidate {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCheck {
    pub candidate: UploadCandidate,
    pub verdict: Result<Classification, Rejection>,
}

impl CandidateCheck {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }
}

/// A file list after local validation. Mixed batches are fine; only the
/// valid files are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub checks: Vec<CandidateCheck>,
}

impl UploadBatch {
    pub fn validate(candidates: impl IntoIterator<Item = UploadCandidate>) -> Self {
        let checks = candidates
            .into_iter()
            .map(|candidate| {
                let verdict = validate_upload(&candidate.filename, candidate.size);
                CandidateCheck { candidate, verdict }
            })
            .collect();
        Self { checks }
    }

    pub fn can_submit(&self) -> bool {
        self.checks.iter().any(CandidateCheck::is_valid)
    }

    pub fn valid(&self) -> impl Iterator<Item = &CandidateCheck> {
        self.checks.iter().filter(|c| c.is_valid())
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// Local rejections, already in result form.
    pub fn rejected_results(&self) -> Vec<UploadResult> {
        self.checks
            .iter()
            .filter_map(|c| match &c.verdict {
                Err(reason) => {
                    Some(UploadResult::rejected(&c.candidate.filename, reason.to_string()))
                }
                Ok(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub filename: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn rejected(filename: &str, error: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            success: false,
            account_name: None,
            account_id: None,
            account_type: None,
            year: None,
            month: None,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn stored(
        filename: &str,
        account: &account::Account,
        year: i32,
        month: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            success: true,
            account_name: Some(account.name.to_string()),
            account_id: Some(account.id.to_string()),
            account_type: Some(account.kind),
            year: Some(year),
            month: Some(month),
            message: Some(message.into()),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// True only when every file was stored.
    pub success: bool,
    pub total_files: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub results: Vec<UploadResult>,
}

impl UploadResponse {
    pub fn from_results(results: Vec<UploadResult>) -> Self {
        let successful_uploads = results.iter().filter(|r| r.success).count();
        Self {
            success: !results.is_empty() && successful_uploads == results.len(),
            total_files: results.len(),
            successful_uploads,
            failed_uploads: results.len() - successful_uploads,
            results,
        }
    }
}

/// Accounts touched by successful uploads, mapped back through the
/// registry's display names. Names the registry does not know are ignored.
pub fn affected_accounts(results: &[UploadResult]) -> BTreeSet<&'static str> {
    results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.account_name.as_deref())
        .filter_map(account::by_name)
        .map(|a| a.id)
        .collect()
}
