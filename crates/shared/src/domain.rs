use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three fixed backend analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    GeneratePlan,
    AnalyzeDependencies,
    AnalyzeLease,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::GeneratePlan,
        AnalysisKind::AnalyzeDependencies,
        AnalysisKind::AnalyzeLease,
    ];

    pub fn path(self) -> &'static str {
        match self {
            AnalysisKind::GeneratePlan => "/generate-plan",
            AnalysisKind::AnalyzeDependencies => "/analyze/dependencies",
            AnalysisKind::AnalyzeLease => "/analyze/lease",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalysisKind::GeneratePlan => "Migration Plan",
            AnalysisKind::AnalyzeDependencies => "Dependency Analysis",
            AnalysisKind::AnalyzeLease => "Lease Analysis",
        }
    }

    /// Short name used on the command line and in file names.
    pub fn slug(self) -> &'static str {
        match self {
            AnalysisKind::GeneratePlan => "plan",
            AnalysisKind::AnalyzeDependencies => "dependencies",
            AnalysisKind::AnalyzeLease => "lease",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    None,
    Success,
    Failure,
}

/// Which controller operation produced the current result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Upload,
    Analysis(AnalysisKind),
    Prompt,
}

impl ActionKind {
    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Upload => "Upload",
            ActionKind::Analysis(kind) => kind.label(),
            ActionKind::Prompt => "Prompt",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ActionKind::Upload => "upload",
            ActionKind::Analysis(kind) => kind.slug(),
            ActionKind::Prompt => "prompt",
        }
    }
}

/// A user-chosen file held in memory until upload.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}
