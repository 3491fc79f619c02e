use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use shared::{
    domain::{AnalysisKind, SelectedFile},
    error::ClientError,
    protocol::{BackendErrorBody, PromptRequest},
};
use tracing::{debug, warn};
use url::Url;

use crate::settings::ClientSettings;

pub const UPLOAD_PATH: &str = "/upload";
pub const PROMPT_PATH: &str = "/analyze/prompt";
pub const FILES_PATH: &str = "/files";
const UPLOAD_FIELD: &str = "files";

/// Status-checked response body; non-2xx replies never reach this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait SkyBridgeBackend: Send + Sync {
    async fn upload(&self, files: &[SelectedFile]) -> Result<BackendReply, ClientError>;
    async fn run_analysis(
        &self,
        kind: AnalysisKind,
        prompt: Option<&str>,
    ) -> Result<BackendReply, ClientError>;
    async fn submit_prompt(&self, prompt: &str) -> Result<BackendReply, ClientError>;
    async fn list_files(&self) -> Result<BackendReply, ClientError>;
}

pub struct MissingBackend;

#[async_trait]
impl SkyBridgeBackend for MissingBackend {
    async fn upload(&self, _files: &[SelectedFile]) -> Result<BackendReply, ClientError> {
        Err(ClientError::transport("backend is not configured"))
    }

    async fn run_analysis(
        &self,
        kind: AnalysisKind,
        _prompt: Option<&str>,
    ) -> Result<BackendReply, ClientError> {
        Err(ClientError::transport(format!(
            "backend is not configured for {}",
            kind.path()
        )))
    }

    async fn submit_prompt(&self, _prompt: &str) -> Result<BackendReply, ClientError> {
        Err(ClientError::transport("backend is not configured"))
    }

    async fn list_files(&self) -> Result<BackendReply, ClientError> {
        Err(ClientError::transport("backend is not configured"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

pub struct HttpBackend {
    http: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpBackend {
    pub fn new(base_url: Url, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            retry,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Self::new(
            settings.parsed_server_url()?,
            settings.request_timeout(),
            settings.retry_policy(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn send_with_retry<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> Result<BackendReply, ClientError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match execute(build()).await {
                Ok(reply) => {
                    debug!(operation, attempts, status = reply.status, "backend: request completed");
                    return Ok(reply);
                }
                Err(err) if err.is_retryable() && attempts <= self.retry.max_retries => {
                    warn!(
                        operation,
                        attempts,
                        error = %err,
                        "backend: transport failure, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    warn!(operation, attempts, error = %err, "backend: request failed");
                    return Err(err);
                }
            }
        }
    }
}

async fn execute(request: RequestBuilder) -> Result<BackendReply, ClientError> {
    let response = request.send().await.map_err(map_transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(ClientError::backend(
            status.as_u16(),
            backend_error_message(status, &body),
        ));
    }
    if let Some(failure) = BackendErrorBody::from_success_body(&body) {
        return Err(ClientError::backend(status.as_u16(), failure.summary()));
    }
    Ok(BackendReply {
        status: status.as_u16(),
        body,
    })
}

fn map_transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::timeout(format!("request timed out: {err}"))
    } else {
        ClientError::transport(err.to_string())
    }
}

fn backend_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<BackendErrorBody>(body) {
        return parsed.summary();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn file_part(file: &SelectedFile) -> Part {
    let untyped = || Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
    match &file.mime_type {
        // An unparseable mime type is dropped rather than failing the upload.
        Some(mime) => untyped().mime_str(mime).unwrap_or_else(|_| untyped()),
        None => untyped(),
    }
}

#[async_trait]
impl SkyBridgeBackend for HttpBackend {
    async fn upload(&self, files: &[SelectedFile]) -> Result<BackendReply, ClientError> {
        let url = self.endpoint(UPLOAD_PATH);
        self.send_with_retry("upload", || {
            let form = files
                .iter()
                .fold(Form::new(), |form, file| form.part(UPLOAD_FIELD, file_part(file)));
            self.http.post(&url).multipart(form)
        })
        .await
    }

    async fn run_analysis(
        &self,
        kind: AnalysisKind,
        prompt: Option<&str>,
    ) -> Result<BackendReply, ClientError> {
        let url = self.endpoint(kind.path());
        let body = prompt.map(PromptRequest::new);
        self.send_with_retry(kind.slug(), || {
            let request = self.http.post(&url);
            match &body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await
    }

    async fn submit_prompt(&self, prompt: &str) -> Result<BackendReply, ClientError> {
        let url = self.endpoint(PROMPT_PATH);
        let body = PromptRequest::new(prompt);
        self.send_with_retry("prompt", || self.http.post(&url).json(&body))
            .await
    }

    async fn list_files(&self) -> Result<BackendReply, ClientError> {
        let url = self.endpoint(FILES_PATH);
        self.send_with_retry("list_files", || self.http.get(&url))
            .await
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
