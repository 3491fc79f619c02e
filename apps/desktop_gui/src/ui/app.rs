use std::time::Duration;

use arboard::Clipboard;
use client_core::{DisplayState, SessionSnapshot};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::{AnalysisKind, UploadStatus};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{category_label, UiError, UiErrorContext, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

const PROMPT_HINT: &str = "Create a 5 year migration plan for the following data..";
const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 80, 80);
const MUTED_COLOR: egui::Color32 = egui::Color32::from_rgb(140, 140, 150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusBannerSeverity {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct StatusBanner {
    severity: StatusBannerSeverity,
    message: String,
}

pub struct SkyBridgeApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    server_url: String,
    snapshot: SessionSnapshot,
    prompt_draft: String,
    backend_files: Vec<String>,
    status: String,
    banner: Option<StatusBanner>,
}

impl SkyBridgeApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>, server_url: String) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            server_url,
            snapshot: SessionSnapshot::default(),
            prompt_draft: String::new(),
            backend_files: Vec::new(),
            status: "Ready".to_string(),
            banner: None,
        }
    }

    fn send(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::State(snapshot) => {
                    if !snapshot.is_busy {
                        self.banner = None;
                    }
                    self.snapshot = snapshot;
                }
                UiEvent::Error(err) => {
                    tracing::warn!(context = ?err.context(), "ui error: {}", err.message());
                    self.show_error(&err);
                }
                UiEvent::FilesListed(files) => {
                    self.status = format!("Backend holds {} converted file(s)", files.len());
                    self.backend_files = files;
                }
                UiEvent::ResultsSaved(path) => {
                    self.banner = Some(StatusBanner {
                        severity: StatusBannerSeverity::Info,
                        message: format!("Saved results to {}", path.display()),
                    });
                }
            }
        }
    }

    fn show_error(&mut self, err: &UiError) {
        let mut message = format!("{}: {}", category_label(err.category()), err.message());
        if err.is_retryable() {
            message.push_str(" Check that the backend is running and try again.");
        }
        self.banner = Some(StatusBanner {
            severity: StatusBannerSeverity::Error,
            message,
        });
    }

    fn pick_files(&mut self) {
        if let Some(paths) = rfd::FileDialog::new().pick_files() {
            self.send(BackendCommand::SelectFiles { paths });
        }
    }

    fn save_results(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(self.snapshot.download_file_name())
            .add_filter("Text", &["txt"])
            .save_file()
        {
            self.send(BackendCommand::DownloadResults { path });
        }
    }

    fn copy_results(&mut self) {
        let Some(text) = self.snapshot.results_text() else {
            return;
        };
        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
            Ok(()) => self.status = "Results copied to clipboard".to_string(),
            Err(err) => self.show_error(&UiError::local(
                UiErrorContext::Clipboard,
                format!("clipboard unavailable: {err}"),
            )),
        }
    }

    fn clear(&mut self) {
        self.prompt_draft.clear();
        self.backend_files.clear();
        self.banner = None;
        self.send(BackendCommand::Clear);
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("SkyBridge");
                ui.label(egui::RichText::new("Your Cloud Migration Companion").color(MUTED_COLOR));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(format!(
                            "{} · {}",
                            server_environment_label(&self.server_url),
                            self.server_url
                        ))
                        .small()
                        .color(MUTED_COLOR),
                    );
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(egui::RichText::new(&self.status).small().color(MUTED_COLOR));
        });
    }

    fn show_inputs(&mut self, ui: &mut egui::Ui) {
        let busy = self.snapshot.is_busy;

        ui.label("Upload a zip file or individual files to get started.");
        ui.horizontal(|ui| {
            if ui
                .add_enabled(!busy, egui::Button::new("Choose files…"))
                .clicked()
            {
                self.pick_files();
            }
            if ui.add_enabled(!busy, egui::Button::new("Upload")).clicked() {
                self.send(BackendCommand::Upload);
            }
            if ui
                .add_enabled(!busy, egui::Button::new("Converted files"))
                .on_hover_text("List the files the backend produced from your uploads")
                .clicked()
            {
                self.send(BackendCommand::ListFiles);
            }
            ui.label(upload_status_label(&self.snapshot));
        });
        for file in &self.snapshot.selected_files {
            ui.label(
                egui::RichText::new(format!(
                    "  {} ({})",
                    file.filename,
                    human_readable_bytes(file.size_bytes)
                ))
                .small(),
            );
        }
        if !self.backend_files.is_empty() {
            ui.collapsing(format!("Backend files ({})", self.backend_files.len()), |ui| {
                for name in &self.backend_files {
                    ui.label(egui::RichText::new(name).monospace().small());
                }
            });
        }

        ui.add_space(12.0);
        ui.label(egui::RichText::new("Ask a Question, or Give Me a Task:").strong());
        ui.horizontal_wrapped(|ui| {
            for (kind, caption) in [
                (AnalysisKind::GeneratePlan, "Build a Cloud Migration Plan"),
                (AnalysisKind::AnalyzeDependencies, "Analyze Application Dependencies"),
                (AnalysisKind::AnalyzeLease, "Analyze Lease ROI"),
            ] {
                if ui.add_enabled(!busy, egui::Button::new(caption)).clicked() {
                    self.send(BackendCommand::RunAnalysis { kind });
                }
            }
        });

        ui.add_space(8.0);
        let response = ui.add(
            egui::TextEdit::multiline(&mut self.prompt_draft)
                .hint_text(PROMPT_HINT)
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            self.send(BackendCommand::SetPrompt {
                text: self.prompt_draft.clone(),
            });
        }
        if ui
            .add_enabled(!busy, egui::Button::new("Submit Prompt"))
            .clicked()
        {
            self.send(BackendCommand::SubmitPrompt {
                text: self.prompt_draft.clone(),
            });
        }
    }

    fn show_results(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Results").strong());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let has_result = self.snapshot.result.is_some();
                if ui.button("Clear").clicked() {
                    self.clear();
                }
                if ui
                    .add_enabled(has_result, egui::Button::new("Copy"))
                    .clicked()
                {
                    self.copy_results();
                }
                if ui
                    .add_enabled(has_result, egui::Button::new("Download"))
                    .clicked()
                {
                    self.save_results();
                }
            });
        });

        if let Some(banner) = &self.banner {
            let color = match banner.severity {
                StatusBannerSeverity::Info => MUTED_COLOR,
                StatusBannerSeverity::Error => ERROR_COLOR,
            };
            ui.colored_label(color, &banner.message);
        }

        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_min_height(200.0);
            ui.set_width(ui.available_width());
            match self.snapshot.display_state() {
                DisplayState::Busy => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(results_banner(&self.snapshot));
                    });
                }
                DisplayState::HasResult => {
                    if let Some(action) = self.snapshot.last_action {
                        ui.label(egui::RichText::new(action.label()).strong());
                    }
                    if let Some(headline) =
                        self.snapshot.result.as_ref().and_then(|result| result.headline())
                    {
                        ui.label(headline);
                        ui.separator();
                    }
                    let text = self.snapshot.results_text().unwrap_or_default();
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, true])
                        .show(ui, |ui| {
                            ui.add(
                                egui::Label::new(egui::RichText::new(text).monospace())
                                    .selectable(true),
                            );
                        });
                }
                DisplayState::Failed(_) => {
                    ui.colored_label(ERROR_COLOR, results_banner(&self.snapshot));
                }
                DisplayState::IdleNoInteraction | DisplayState::EmptyAfterInteraction => {
                    ui.label(
                        egui::RichText::new(results_banner(&self.snapshot)).color(MUTED_COLOR),
                    );
                }
            }
        });
    }
}

impl eframe::App for SkyBridgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_header(ctx);
        self.show_status_bar(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.show_inputs(ui);
                ui.add_space(16.0);
                self.show_results(ui);
            });
        });

        if self.snapshot.is_busy {
            ctx.request_repaint_after(Duration::from_millis(16));
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// One-line text for every results panel state except a rendered result.
pub(crate) fn results_banner(snapshot: &SessionSnapshot) -> String {
    match snapshot.display_state() {
        DisplayState::IdleNoInteraction => {
            "Results will appear here once you upload files or run a task.".to_string()
        }
        DisplayState::Busy => match snapshot.pending_action {
            Some(action) => format!("Working on {}…", action.label()),
            None => "Working…".to_string(),
        },
        DisplayState::EmptyAfterInteraction => "Nothing to show yet.".to_string(),
        DisplayState::Failed(err) => {
            let failed = snapshot
                .last_action
                .map(|action| format!("{} failed", action.label()))
                .unwrap_or_else(|| "Request failed".to_string());
            format!("{failed}: {err}")
        }
        DisplayState::HasResult => snapshot
            .last_action
            .map(|action| action.label().to_string())
            .unwrap_or_default(),
    }
}

fn upload_status_label(snapshot: &SessionSnapshot) -> String {
    match snapshot.upload_status {
        UploadStatus::None => "No files selected".to_string(),
        UploadStatus::Success => format!("{} file(s) ready", snapshot.selected_files.len()),
        UploadStatus::Failure if snapshot.selected_files.is_empty() => {
            "No files selected".to_string()
        }
        UploadStatus::Failure => "Upload failed".to_string(),
    }
}

fn server_environment_label(server_url: &str) -> &'static str {
    let server = server_url.to_ascii_lowercase();
    if server.contains("127.0.0.1") || server.contains("localhost") {
        "Local"
    } else if server.contains("staging") {
        "Staging"
    } else {
        "Remote"
    }
}

pub(crate) fn human_readable_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        return format!("{bytes} B");
    }
    if bytes < MB {
        return format_scaled_unit(bytes, KB, "KB");
    }
    if bytes < GB {
        return format_scaled_unit(bytes, MB, "MB");
    }
    format_scaled_unit(bytes, GB, "GB")
}

fn format_scaled_unit(bytes: u64, unit_size: u64, unit_label: &str) -> String {
    let value = bytes as f64 / unit_size as f64;
    let value_text = format!("{value:.1}");
    let compact_value = value_text.strip_suffix(".0").unwrap_or(&value_text);
    format!("{compact_value} {unit_label}")
}
