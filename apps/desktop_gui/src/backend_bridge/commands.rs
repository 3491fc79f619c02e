//! Backend commands queued from UI to backend worker.

use shared::domain::AnalysisKind;
use std::path::PathBuf;

pub enum BackendCommand {
    SelectFiles { paths: Vec<PathBuf> },
    SetPrompt { text: String },
    Upload,
    RunAnalysis { kind: AnalysisKind },
    SubmitPrompt { text: String },
    ListFiles,
    Clear,
    DownloadResults { path: PathBuf },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::SelectFiles { .. } => "select_files",
            BackendCommand::SetPrompt { .. } => "set_prompt",
            BackendCommand::Upload => "upload",
            BackendCommand::RunAnalysis { .. } => "run_analysis",
            BackendCommand::SubmitPrompt { .. } => "submit_prompt",
            BackendCommand::ListFiles => "list_files",
            BackendCommand::Clear => "clear",
            BackendCommand::DownloadResults { .. } => "download_results",
        }
    }
}
