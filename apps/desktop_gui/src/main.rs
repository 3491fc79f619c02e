use std::path::PathBuf;

use clap::Parser;
use client_core::{load_settings, settings::DEFAULT_SETTINGS_FILE, ClientSettings};
use crossbeam_channel::bounded;
use eframe::egui;

mod backend_bridge;
mod controller;
mod ui;

use backend_bridge::commands::BackendCommand;
use controller::events::{UiError, UiErrorContext, UiEvent};
use ui::SkyBridgeApp;

#[derive(Parser, Debug)]
#[command(name = "skybridge-gui", about = "SkyBridge desktop client")]
struct Args {
    /// Backend base URL; overrides the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Settings file. Defaults to ./skybridge.toml, then the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Explicit path first, then the working directory, then `<config dir>/skybridge/`.
fn resolve_settings_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    let local = PathBuf::from(DEFAULT_SETTINGS_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("skybridge").join(DEFAULT_SETTINGS_FILE))
        .filter(|path| path.exists())
}

fn startup_settings(args: Args) -> anyhow::Result<ClientSettings> {
    let settings_path = resolve_settings_path(args.config);
    let mut settings = load_settings(settings_path.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    settings.parsed_server_url()?;
    Ok(settings)
}

/// Settings to run with, plus the startup error to show when they fell back to defaults.
fn settings_or_defaults(args: Args) -> (ClientSettings, Option<UiError>) {
    match startup_settings(args) {
        Ok(settings) => (settings, None),
        Err(err) => {
            tracing::error!("invalid settings, falling back to defaults: {err:#}");
            let settings = ClientSettings::default();
            let notice = UiError::local(
                UiErrorContext::BackendStartup,
                format!(
                    "invalid settings ({err:#}); using defaults with server {}",
                    settings.server_url
                ),
            );
            (settings, Some(notice))
        }
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (settings, startup_error) = settings_or_defaults(Args::parse());
    let server_url = settings.server_url.clone();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    if let Some(err) = startup_error {
        let _ = ui_tx.try_send(UiEvent::Error(err));
    }
    backend_bridge::runtime::launch(settings, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("SkyBridge")
            .with_inner_size([900.0, 760.0])
            .with_min_inner_size([640.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "SkyBridge",
        options,
        Box::new(move |_cc| Ok(Box::new(SkyBridgeApp::new(cmd_tx, ui_rx, server_url)))),
    )
}
