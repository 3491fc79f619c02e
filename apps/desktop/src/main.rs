use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    load_selected_file, load_settings, ControllerEvent, DisplayState, InteractionController,
    SessionSnapshot,
};
use shared::domain::AnalysisKind;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "skybridge", about = "Cloud migration companion client")]
struct Args {
    /// Backend base URL; overrides the settings file and environment.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Settings file (defaults to ./skybridge.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Save the results panel to this file after the command completes.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one or more files for processing.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run one of the predefined analyses.
    Analyze {
        kind: AnalysisArg,
        /// Prompt text used by plan generation.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Ask a free-form question.
    Prompt { text: String },
    /// List files the backend produced from earlier uploads.
    Files,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnalysisArg {
    Plan,
    Dependencies,
    Lease,
}

impl From<AnalysisArg> for AnalysisKind {
    fn from(value: AnalysisArg) -> Self {
        match value {
            AnalysisArg::Plan => AnalysisKind::GeneratePlan,
            AnalysisArg::Dependencies => AnalysisKind::AnalyzeDependencies,
            AnalysisArg::Lease => AnalysisKind::AnalyzeLease,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }
    let controller = InteractionController::from_settings(&settings)?;

    let mut events = controller.subscribe_events();
    let forward_notices = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::PayloadFallback { error, .. }) => {
                    eprintln!("note: {error}; showing the raw response");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notice forwarder lagged behind controller events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    match args.command {
        Command::Upload { files } => {
            let mut selected = Vec::with_capacity(files.len());
            for path in &files {
                selected.push(load_selected_file(path).await?);
            }
            controller.select_files(selected).await;
            let _ = controller.upload().await;
        }
        Command::Analyze { kind, prompt } => {
            if let Some(prompt) = prompt {
                controller.set_prompt_text(prompt).await;
            }
            let _ = controller.run_named_analysis(kind.into()).await;
        }
        Command::Prompt { text } => {
            let _ = controller.submit_prompt(&text).await;
        }
        Command::Files => {
            return match controller.list_files().await {
                Ok(files) if files.is_empty() => {
                    println!("No converted files on the backend yet.");
                    Ok(ExitCode::SUCCESS)
                }
                Ok(files) => {
                    for file in files {
                        println!("{file}");
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    Ok(ExitCode::FAILURE)
                }
            };
        }
    }

    let snapshot = controller.snapshot().await;
    print_results_panel(&snapshot);

    if let Some(output) = args.output {
        let saved = controller
            .download_results(&output)
            .await
            .context("could not save results")?;
        if saved {
            eprintln!("Saved results to {}", output.display());
        } else {
            eprintln!("Nothing to save.");
        }
    }

    drop(controller);
    let _ = forward_notices.await;

    Ok(match snapshot.display_state() {
        DisplayState::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn print_results_panel(snapshot: &SessionSnapshot) {
    match snapshot.display_state() {
        DisplayState::IdleNoInteraction => {
            println!("Results will appear here once you run a task.");
        }
        DisplayState::Busy => println!("Still working..."),
        DisplayState::EmptyAfterInteraction => println!("Nothing to show."),
        DisplayState::Failed(err) => eprintln!("error: {err}"),
        DisplayState::HasResult => {
            if let Some(action) = snapshot.last_action {
                println!("{}:", action.label());
            }
            if let Some(text) = snapshot.results_text() {
                println!("{text}");
            }
        }
    }
}
