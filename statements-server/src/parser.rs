//! Statement parser seam.
//!
//! Extraction itself happens in an external program. It is invoked as
//!
//! ```text
//! <command> parse <stp|bbva> <path>   -> {"transaction_count": N}
//! <command> detect <path>             -> {"identifier": "...", "year": Y, "month": M}
//! ```
//!
//! and answers with one JSON object on stdout.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use statements_core::AccountKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a PDF's content says about where it belongs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
}

#[async_trait]
pub trait StatementParser: Send + Sync {
    /// Parse one statement file, returning the number of transactions stored.
    async fn parse(&self, kind: AccountKind, path: &Path) -> Result<u64>;
    /// Identify account and period of an uploaded PDF from its content.
    async fn detect(&self, filename: &str, bytes: &[u8]) -> Result<Detection>;
}

#[derive(Debug, Deserialize)]
struct ParseReply {
    transaction_count: u64,
}

pub struct CommandParser {
    command: String,
    scratch_seq: AtomicU64,
}

impl CommandParser {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            scratch_seq: AtomicU64::new(0),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = tokio::process::Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("spawning {} {:?}", self.command, args))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }
        String::from_utf8(output.stdout).context("parser output is not UTF-8")
    }

    fn scratch_path(&self, filename: &str) -> PathBuf {
        let n = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("pdf");
        std::env::temp_dir().join(format!("statements-detect-{}-{n}.{ext}", std::process::id()))
    }
}

fn last_json_line(stdout: &str) -> Result<&str> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .context("parser printed no JSON object")
}

#[async_trait]
impl StatementParser for CommandParser {
    async fn parse(&self, kind: AccountKind, path: &Path) -> Result<u64> {
        let path_str = path.to_str().context("statement path is not UTF-8")?;
        let stdout = self.run(&["parse", kind.as_str(), path_str]).await?;
        let reply: ParseReply = serde_json::from_str(last_json_line(&stdout)?)
            .with_context(|| format!("bad parse reply for {}", path.display()))?;
        Ok(reply.transaction_count)
    }

    async fn detect(&self, filename: &str, bytes: &[u8]) -> Result<Detection> {
        let scratch = self.scratch_path(filename);
        tokio::fs::write(&scratch, bytes)
            .await
            .with_context(|| format!("write {}", scratch.display()))?;

        let result: Result<Detection> = async {
            let path_str = scratch.to_str().context("scratch path is not UTF-8")?;
            let stdout = self.run(&["detect", path_str]).await?;
            let detection: Detection = serde_json::from_str(last_json_line(&stdout)?)
                .with_context(|| format!("bad detect reply for {filename}"))?;
            Ok(detection)
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            tracing::debug!(path = %scratch.display(), error = %e, "scratch file not removed");
        }
        result
    }
}

/// Stand-in used when no parser command is configured.
pub struct MissingParser;

#[async_trait]
impl StatementParser for MissingParser {
    async fn parse(&self, _kind: AccountKind, path: &Path) -> Result<u64> {
        bail!("no parser_command configured, cannot parse {}", path.display())
    }

    async fn detect(&self, filename: &str, _bytes: &[u8]) -> Result<Detection> {
        bail!("no parser_command configured, cannot detect account for {filename}")
    }
}
