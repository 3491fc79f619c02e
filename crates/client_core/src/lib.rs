use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::{
    domain::{ActionKind, AnalysisKind, SelectedFile, UploadStatus},
    error::ClientError,
    protocol::{FileListResponse, PromptResponse, ResultPayload},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod backend;
pub mod settings;

pub use backend::{BackendReply, HttpBackend, MissingBackend, RetryPolicy, SkyBridgeBackend};
pub use settings::{load_settings, ClientSettings};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
}

impl From<&SelectedFile> for FileSummary {
    fn from(file: &SelectedFile) -> Self {
        Self {
            filename: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size_bytes(),
        }
    }
}

/// What a view renders. File bytes stay inside the controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub prompt_text: String,
    pub selected_files: Vec<FileSummary>,
    pub upload_status: UploadStatus,
    pub result: Option<ResultPayload>,
    pub error: Option<ClientError>,
    pub is_busy: bool,
    pub has_interacted: bool,
    pub pending_action: Option<ActionKind>,
    pub last_action: Option<ActionKind>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    IdleNoInteraction,
    Busy,
    HasResult,
    EmptyAfterInteraction,
    Failed(ClientError),
}

impl SessionSnapshot {
    pub fn display_state(&self) -> DisplayState {
        if self.is_busy {
            DisplayState::Busy
        } else if let Some(err) = &self.error {
            DisplayState::Failed(err.clone())
        } else if self.result.is_some() {
            DisplayState::HasResult
        } else if self.has_interacted {
            DisplayState::EmptyAfterInteraction
        } else {
            DisplayState::IdleNoInteraction
        }
    }

    pub fn results_text(&self) -> Option<String> {
        self.result.as_ref().map(ResultPayload::render)
    }

    /// Suggested file name for saving the current result.
    pub fn download_file_name(&self) -> String {
        let action = self.last_action.map(ActionKind::slug).unwrap_or("results");
        let stamp = self
            .completed_at
            .map(|at| at.format("%Y%m%d-%H%M%S").to_string())
            .unwrap_or_else(|| "unsaved".to_string());
        format!("skybridge-{action}-{stamp}.txt")
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(SessionSnapshot),
    Failed {
        action: ActionKind,
        error: ClientError,
    },
    PayloadFallback {
        action: ActionKind,
        error: ClientError,
    },
    FilesListed(Vec<String>),
    FileListFailed(ClientError),
}

/// A user trigger that talks to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Upload,
    Analysis(AnalysisKind),
    Prompt(String),
}

/// A request holding its token and inputs, not yet sent.
#[derive(Debug)]
pub struct PendingRequest {
    token: u64,
    action: ActionKind,
    work: RequestWork,
}

impl PendingRequest {
    pub fn action(&self) -> ActionKind {
        self.action
    }
}

#[derive(Debug)]
enum RequestWork {
    Upload(Vec<SelectedFile>),
    Analysis {
        kind: AnalysisKind,
        prompt: Option<String>,
    },
    Prompt(String),
}

/// Whether a finished request was allowed to write the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Superseded,
}

#[derive(Default)]
struct SessionState {
    prompt_text: String,
    selected_files: Vec<SelectedFile>,
    upload_status: UploadStatus,
    result: Option<ResultPayload>,
    error: Option<ClientError>,
    is_busy: bool,
    has_interacted: bool,
    pending_action: Option<ActionKind>,
    last_action: Option<ActionKind>,
    completed_at: Option<DateTime<Utc>>,
    /// Newest dispatched request; responses carrying an older token are dropped.
    latest_token: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            prompt_text: self.prompt_text.clone(),
            selected_files: self.selected_files.iter().map(FileSummary::from).collect(),
            upload_status: self.upload_status,
            result: self.result.clone(),
            error: self.error.clone(),
            is_busy: self.is_busy,
            has_interacted: self.has_interacted,
            pending_action: self.pending_action,
            last_action: self.last_action,
            completed_at: self.completed_at,
        }
    }

    /// Ends the current request: clears busy and stores exactly one of result or error.
    fn apply_outcome(
        &mut self,
        action: ActionKind,
        outcome: &Result<Option<ResultPayload>, ClientError>,
    ) {
        self.is_busy = false;
        self.pending_action = None;
        self.last_action = Some(action);
        self.completed_at = Some(Utc::now());
        match outcome {
            Ok(payload) => {
                self.result = payload.clone();
                self.error = None;
                if action == ActionKind::Upload {
                    self.upload_status = UploadStatus::Success;
                }
            }
            Err(err) => {
                self.result = None;
                self.error = Some(err.clone());
                if action == ActionKind::Upload {
                    self.upload_status = UploadStatus::Failure;
                }
            }
        }
    }

    fn reset(&mut self) {
        let latest_token = self.latest_token;
        *self = SessionState {
            latest_token: latest_token + 1,
            ..SessionState::default()
        };
    }
}

pub struct InteractionController {
    backend: Arc<dyn SkyBridgeBackend>,
    lease_prompt: String,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl InteractionController {
    pub fn new(backend: Arc<dyn SkyBridgeBackend>) -> Arc<Self> {
        Self::with_lease_prompt(backend, settings::DEFAULT_LEASE_PROMPT)
    }

    pub fn with_lease_prompt(
        backend: Arc<dyn SkyBridgeBackend>,
        lease_prompt: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            lease_prompt: lease_prompt.into(),
            inner: Mutex::new(SessionState::default()),
            events,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Arc<Self>> {
        let backend = HttpBackend::from_settings(settings)?;
        info!(server_url = %backend.base_url(), "controller: backend configured");
        Ok(Self::with_lease_prompt(
            Arc::new(backend),
            settings.lease_prompt.clone(),
        ))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn display_state(&self) -> DisplayState {
        self.snapshot().await.display_state()
    }

    pub async fn results_text(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .result
            .as_ref()
            .map(ResultPayload::render)
    }

    pub async fn set_prompt_text(&self, text: impl Into<String>) {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            guard.prompt_text = text.into();
            guard.snapshot()
        };
        self.emit_state(snapshot);
    }

    /// Replaces the selection. Nothing is sent until `upload`.
    pub async fn select_files(&self, files: Vec<SelectedFile>) {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            guard.upload_status = if files.is_empty() {
                UploadStatus::Failure
            } else {
                UploadStatus::Success
            };
            guard.selected_files = files;
            guard.has_interacted = true;
            guard.snapshot()
        };
        debug!(
            count = snapshot.selected_files.len(),
            "controller: files selected"
        );
        self.emit_state(snapshot);
    }

    pub async fn upload(&self) -> Result<Completion, ClientError> {
        let pending = self.dispatch(Request::Upload).await?;
        self.complete(pending).await
    }

    pub async fn run_named_analysis(&self, kind: AnalysisKind) -> Result<Completion, ClientError> {
        let pending = self.dispatch(Request::Analysis(kind)).await?;
        self.complete(pending).await
    }

    /// Posts free text to the prompt endpoint and keeps only its `result` field.
    pub async fn submit_prompt(&self, text: &str) -> Result<Completion, ClientError> {
        let pending = self.dispatch(Request::Prompt(text.to_string())).await?;
        self.complete(pending).await
    }

    /// Resolves `request` against the session and takes its token under one
    /// lock, so a later `clear()` or trigger always supersedes it. Validation
    /// failures are applied here and returned as `Err`.
    pub async fn dispatch(&self, request: Request) -> Result<PendingRequest, ClientError> {
        let (dispatched, snapshot) = {
            let mut guard = self.inner.lock().await;
            guard.latest_token += 1;
            guard.has_interacted = true;
            let token = guard.latest_token;
            let (action, work) = match request {
                Request::Upload if guard.selected_files.is_empty() => (
                    ActionKind::Upload,
                    Err(ClientError::validation(
                        "select at least one file before uploading",
                    )),
                ),
                Request::Upload => (
                    ActionKind::Upload,
                    Ok(RequestWork::Upload(guard.selected_files.clone())),
                ),
                Request::Analysis(kind) => (
                    ActionKind::Analysis(kind),
                    Ok(RequestWork::Analysis {
                        kind,
                        prompt: self.analysis_prompt(kind, &guard.prompt_text),
                    }),
                ),
                Request::Prompt(text) => {
                    guard.prompt_text = text.clone();
                    if text.trim().is_empty() {
                        (
                            ActionKind::Prompt,
                            Err(ClientError::validation("enter a prompt before submitting")),
                        )
                    } else {
                        (ActionKind::Prompt, Ok(RequestWork::Prompt(text)))
                    }
                }
            };
            match work {
                Ok(work) => {
                    guard.is_busy = true;
                    guard.pending_action = Some(action);
                    (Ok(PendingRequest { token, action, work }), guard.snapshot())
                }
                Err(err) => {
                    guard.apply_outcome(action, &Err(err.clone()));
                    (Err((action, err)), guard.snapshot())
                }
            }
        };

        self.emit_state(snapshot);
        match dispatched {
            Ok(pending) => {
                debug!(
                    token = pending.token,
                    action = pending.action.slug(),
                    "controller: request dispatched"
                );
                Ok(pending)
            }
            Err((action, err)) => {
                self.report_failure(action, &err);
                Err(err)
            }
        }
    }

    /// Sends a dispatched request and applies its outcome unless something
    /// newer was dispatched (or the session cleared) in the meantime.
    pub async fn complete(&self, pending: PendingRequest) -> Result<Completion, ClientError> {
        let PendingRequest { token, action, work } = pending;
        if self.inner.lock().await.latest_token != token {
            debug!(
                token,
                action = action.slug(),
                "controller: request superseded before sending"
            );
            return Ok(Completion::Superseded);
        }

        let outcome = match work {
            RequestWork::Upload(files) => {
                info!(token, files = files.len(), "controller: uploading files");
                self.backend
                    .upload(&files)
                    .await
                    .map(|reply| ResultPayload::from_body(&reply.body))
            }
            RequestWork::Analysis { kind, prompt } => {
                info!(
                    token,
                    path = kind.path(),
                    with_prompt = prompt.is_some(),
                    "controller: running analysis"
                );
                match self.backend.run_analysis(kind, prompt.as_deref()).await {
                    Ok(reply) => {
                        let payload = ResultPayload::from_body(&reply.body);
                        if let Some(ResultPayload::Text(raw)) = &payload {
                            self.report_payload_fallback(
                                action,
                                ClientError::payload("analysis response is not JSON", raw.clone()),
                            );
                        }
                        Ok(payload)
                    }
                    Err(err) => Err(err),
                }
            }
            RequestWork::Prompt(text) => {
                info!(token, chars = text.len(), "controller: submitting prompt");
                match self.backend.submit_prompt(&text).await {
                    Ok(reply) => match serde_json::from_str::<PromptResponse>(&reply.body) {
                        Ok(parsed) => Ok(Some(ResultPayload::Text(parsed.result))),
                        Err(err) => {
                            self.report_payload_fallback(
                                action,
                                ClientError::payload(
                                    format!("missing string `result` field: {err}"),
                                    reply.body.clone(),
                                ),
                            );
                            Ok(raw_text_payload(&reply.body))
                        }
                    },
                    Err(err) => Err(err),
                }
            }
        };
        self.finish(token, action, outcome).await
    }

    /// Lists converted files held by the backend. Leaves the results panel alone.
    pub async fn list_files(&self) -> Result<Vec<String>, ClientError> {
        let result = match self.backend.list_files().await {
            Ok(reply) => serde_json::from_str::<FileListResponse>(&reply.body)
                .map(|parsed| parsed.files)
                .map_err(|err| {
                    ClientError::payload(
                        format!("invalid file listing: {err}"),
                        reply.body.clone(),
                    )
                }),
            Err(err) => Err(err),
        };

        match &result {
            Ok(files) => {
                let _ = self.events.send(ControllerEvent::FilesListed(files.clone()));
            }
            Err(err) => {
                warn!(error = %err, "controller: file listing failed");
                let _ = self.events.send(ControllerEvent::FileListFailed(err.clone()));
            }
        }
        result
    }

    /// Back to the initial state. Responses still in flight will be dropped.
    pub async fn clear(&self) {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            guard.reset();
            guard.snapshot()
        };
        info!("controller: session cleared");
        self.emit_state(snapshot);
    }

    /// Writes the rendered result to `path`. Returns `false` without touching
    /// the filesystem when there is nothing to save.
    pub async fn download_results(&self, path: &Path) -> Result<bool> {
        let Some(text) = self.results_text().await else {
            debug!("controller: download skipped, no result stored");
            return Ok(false);
        };
        tokio::fs::write(path, text.as_bytes())
            .await
            .with_context(|| format!("failed to write results to '{}'", path.display()))?;
        info!(path = %path.display(), bytes = text.len(), "controller: results saved");
        Ok(true)
    }

    fn analysis_prompt(&self, kind: AnalysisKind, prompt_text: &str) -> Option<String> {
        match kind {
            AnalysisKind::GeneratePlan if !prompt_text.trim().is_empty() => {
                Some(prompt_text.to_string())
            }
            AnalysisKind::GeneratePlan | AnalysisKind::AnalyzeDependencies => None,
            AnalysisKind::AnalyzeLease => Some(self.lease_prompt.clone()),
        }
    }

    async fn finish(
        &self,
        token: u64,
        action: ActionKind,
        outcome: Result<Option<ResultPayload>, ClientError>,
    ) -> Result<Completion, ClientError> {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            if guard.latest_token != token {
                debug!(
                    token,
                    latest = guard.latest_token,
                    action = action.slug(),
                    "controller: dropping superseded response"
                );
                return Ok(Completion::Superseded);
            }
            guard.apply_outcome(action, &outcome);
            guard.snapshot()
        };

        self.emit_state(snapshot);
        match outcome {
            Ok(_) => Ok(Completion::Applied),
            Err(err) => {
                self.report_failure(action, &err);
                Err(err)
            }
        }
    }

    fn report_failure(&self, action: ActionKind, error: &ClientError) {
        warn!(action = action.slug(), error = %error, "controller: request failed");
        let _ = self.events.send(ControllerEvent::Failed {
            action,
            error: error.clone(),
        });
    }

    fn report_payload_fallback(&self, action: ActionKind, error: ClientError) {
        warn!(action = action.slug(), error = %error, "controller: showing raw response text");
        let _ = self
            .events
            .send(ControllerEvent::PayloadFallback { action, error });
    }

    fn emit_state(&self, snapshot: SessionSnapshot) {
        let _ = self.events.send(ControllerEvent::StateChanged(snapshot));
    }
}

fn raw_text_payload(body: &str) -> Option<ResultPayload> {
    if body.trim().is_empty() {
        None
    } else {
        Some(ResultPayload::Text(body.to_string()))
    }
}

/// Reads a file from disk into a selection entry, guessing its mime type.
pub async fn load_selected_file(path: &Path) -> Result<SelectedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    let mut file = SelectedFile::new(filename, bytes);
    if let Some(mime) = mime_guess::from_path(path).first() {
        file = file.with_mime_type(mime.essence_str());
    }
    Ok(file)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
