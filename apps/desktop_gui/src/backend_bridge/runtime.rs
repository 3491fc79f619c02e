//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use client_core::{
    load_selected_file, ClientSettings, ControllerEvent, InteractionController, Request,
};
use crossbeam_channel::{Receiver, Sender};
use shared::error::ClientError;
use tokio::{runtime::Handle, sync::broadcast, sync::broadcast::error::RecvError};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn launch(settings: ClientSettings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::local(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let controller = match InteractionController::from_settings(&settings) {
                Ok(controller) => controller,
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::local(
                        UiErrorContext::BackendStartup,
                        format!("backend worker startup failure: {err:#}"),
                    )));
                    tracing::error!("failed to configure backend: {err:#}");
                    return;
                }
            };

            spawn_event_forwarder(
                Handle::current(),
                Arc::clone(&controller),
                controller.subscribe_events(),
                ui_tx.clone(),
            );

            let _ = ui_tx.try_send(UiEvent::Info(format!(
                "Connected to {}",
                settings.server_url
            )));

            while let Ok(cmd) = cmd_rx.recv() {
                tracing::debug!(command = cmd.name(), "backend worker received command");
                run_command(&controller, cmd, &ui_tx).await;
            }
        });
    });
}

/// Dispatches in command order on the worker loop; only the backend round trip
/// runs in a spawned task, so a later `Clear` always supersedes it.
async fn run_command(
    controller: &Arc<InteractionController>,
    cmd: BackendCommand,
    ui_tx: &Sender<UiEvent>,
) {
    let request = match cmd {
        BackendCommand::Upload => Request::Upload,
        BackendCommand::RunAnalysis { kind } => Request::Analysis(kind),
        BackendCommand::SubmitPrompt { text } => Request::Prompt(text),
        BackendCommand::ListFiles => {
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                let _ = controller.list_files().await;
            });
            return;
        }
        other => {
            handle_local_command(controller, other, ui_tx).await;
            return;
        }
    };

    match controller.dispatch(request).await {
        Ok(pending) => {
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                let action = pending.action();
                log_outcome(action.slug(), controller.complete(pending).await);
            });
        }
        Err(err) => tracing::debug!(error = %err, "request rejected"),
    }
}

async fn handle_local_command(
    controller: &InteractionController,
    cmd: BackendCommand,
    ui_tx: &Sender<UiEvent>,
) {
    match cmd {
        BackendCommand::SelectFiles { paths } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                match load_selected_file(path).await {
                    Ok(file) => files.push(file),
                    Err(err) => {
                        let _ = ui_tx.send(UiEvent::Error(UiError::local(
                            UiErrorContext::FileSelection,
                            format!("{err:#}"),
                        )));
                        return;
                    }
                }
            }
            controller.select_files(files).await;
        }
        BackendCommand::SetPrompt { text } => controller.set_prompt_text(text).await,
        BackendCommand::Clear => controller.clear().await,
        BackendCommand::DownloadResults { path } => {
            let event = match controller.download_results(&path).await {
                Ok(true) => UiEvent::ResultsSaved(path),
                Ok(false) => UiEvent::Info("Nothing to download yet".to_string()),
                Err(err) => UiEvent::Error(UiError::local(
                    UiErrorContext::Download,
                    format!("{err:#}"),
                )),
            };
            let _ = ui_tx.send(event);
        }
        BackendCommand::Upload
        | BackendCommand::RunAnalysis { .. }
        | BackendCommand::SubmitPrompt { .. }
        | BackendCommand::ListFiles => {
            tracing::warn!(command = cmd.name(), "network command routed as local");
        }
    }
}

/// Forwards controller events on a plain thread. The UI channel may block while
/// the window is not repainting; a lagged receiver resyncs from a fresh snapshot.
fn spawn_event_forwarder(
    handle: Handle,
    controller: Arc<InteractionController>,
    mut events: broadcast::Receiver<ControllerEvent>,
    ui_tx: Sender<UiEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        let event = match events.blocking_recv() {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ui event forwarder lagged; resyncing state");
                ControllerEvent::StateChanged(handle.block_on(controller.snapshot()))
            }
            Err(RecvError::Closed) => break,
        };
        let Some(ui_event) = to_ui_event(event) else {
            continue;
        };
        if ui_tx.send(ui_event).is_err() {
            break;
        }
    })
}

fn to_ui_event(event: ControllerEvent) -> Option<UiEvent> {
    match event {
        ControllerEvent::StateChanged(snapshot) => Some(UiEvent::State(snapshot)),
        ControllerEvent::PayloadFallback { error, .. } => Some(UiEvent::Info(format!(
            "{error}; showing the raw response instead"
        ))),
        ControllerEvent::FilesListed(files) => Some(UiEvent::FilesListed(files)),
        ControllerEvent::FileListFailed(error) => Some(UiEvent::Error(
            UiError::from_client_error(UiErrorContext::FileListing, &error),
        )),
        // Request failures already arrive through the snapshot's error state.
        ControllerEvent::Failed { .. } => None,
    }
}

fn log_outcome<T: std::fmt::Debug>(operation: &str, outcome: Result<T, ClientError>) {
    match outcome {
        Ok(completion) => tracing::debug!(operation, ?completion, "request finished"),
        Err(err) => tracing::debug!(operation, error = %err, "request failed"),
    }
}
