//! Typed client for the statements REST API.

use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use statements_core::{AccountData, FileKind, ProgressRecord, UiData, UploadResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session expired, log in again (statements login)")]
    SessionExpired,

    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Server message of a non-2xx response: the `error` field of the JSON
/// body when there is one, the raw text otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ClientError::SessionExpired);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Http {
            status,
            message: error_message(&body),
        });
    }
    Ok(resp)
}

/// Pull `field` out of a `{success: true, field: ...}` envelope.
fn unwrap_field<T: DeserializeOwned>(mut body: Value, field: &str) -> ClientResult<T> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let msg = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        return Err(ClientError::Malformed(msg));
    }
    let value = body
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| ClientError::Malformed(format!("missing `{field}`")))?;
    serde_json::from_value(value).map_err(|e| ClientError::Malformed(format!("{field}: {e}")))
}

/// A downloaded statement and the name the server gave it.
pub struct Download {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json(&self, path: &str) -> ClientResult<Value> {
        tracing::debug!(path, "GET");
        let resp = self.http.get(self.url(path)).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn post_json(&self, path: &str) -> ClientResult<Value> {
        tracing::debug!(path, "POST");
        let resp = self.http.post(self.url(path)).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn load_account_data(
        &self,
        account_id: &str,
        year: i32,
    ) -> ClientResult<AccountData> {
        let body = self
            .get_json(&format!("/api/statements/load-account-data/{account_id}?year={year}"))
            .await?;
        unwrap_field(body, "account_data")
    }

    pub async fn ui_data(&self, year: i32) -> ClientResult<UiData> {
        unwrap_field(self.get_json(&format!("/api/statements/ui-data/{year}")).await?, "ui_data")
    }

    pub async fn start_parse(&self, account_id: &str) -> ClientResult<String> {
        let body = self.post_json(&format!("/api/statements/parse/{account_id}")).await?;
        unwrap_field(body, "session_id")
    }

    pub async fn start_parse_all(&self) -> ClientResult<String> {
        let body = self.post_json("/api/statements/parse-all").await?;
        unwrap_field(body, "session_id")
    }

    pub async fn parse_progress(&self, session_id: &str) -> ClientResult<ProgressRecord> {
        let body = self
            .get_json(&format!("/api/statements/parse-progress/{session_id}"))
            .await?;
        unwrap_field(body, "progress")
    }

    pub async fn refresh_inventory(&self, account_id: &str) -> ClientResult<String> {
        let body = self
            .post_json(&format!("/api/statements/refresh-inventory/{account_id}"))
            .await?;
        unwrap_field(body, "session_id")
    }

    pub async fn refresh_all_inventories(&self) -> ClientResult<String> {
        let body = self.post_json("/api/statements/refresh-all-inventories").await?;
        unwrap_field(body, "session_id")
    }

    pub async fn inventory_progress(&self, session_id: &str) -> ClientResult<ProgressRecord> {
        let body = self
            .get_json(&format!("/api/statements/inventory-progress/{session_id}"))
            .await?;
        unwrap_field(body, "progress")
    }

    /// One multipart request carrying every file under the `files` field.
    pub async fn upload(&self, files: Vec<(String, Vec<u8>)>) -> ClientResult<UploadResponse> {
        let mut form = Form::new();
        for (name, bytes) in files {
            form = form.part("files", Part::bytes(bytes).file_name(name));
        }
        tracing::debug!("POST upload");
        let resp = self
            .http
            .post(self.url("/api/statements/upload"))
            .multipart(form)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn download(
        &self,
        account_id: &str,
        year: i32,
        month: u32,
        kind: FileKind,
    ) -> ClientResult<Download> {
        let path = format!(
            "/statements/download/{account_id}/{month}/{}?year={year}",
            kind.extension()
        );
        tracing::debug!(path, "GET");
        let resp = check(self.http.get(self.url(&path)).send().await?).await?;
        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| format!("{account_id}_{year}_{month:02}.{}", kind.extension()));
        let bytes = resp.bytes().await?.to_vec();
        Ok(Download { filename, bytes })
    }
}

fn attachment_filename(disposition: &str) -> Option<String> {
    let (_, rest) = disposition.split_once("filename=")?;
    let name = rest.trim().trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}
