//! UI/backend events and error modeling for desktop GUI controller.

use std::path::PathBuf;

use client_core::SessionSnapshot;
use shared::error::{ClientError, ErrorKind};

pub enum UiEvent {
    Info(String),
    State(SessionSnapshot),
    Error(UiError),
    FilesListed(Vec<String>),
    ResultsSaved(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Transport,
    Backend,
    Payload,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    FileSelection,
    FileListing,
    Download,
    Clipboard,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_client_error(context: UiErrorContext, error: &ClientError) -> Self {
        let category = match error.kind() {
            ErrorKind::Validation => UiErrorCategory::Validation,
            ErrorKind::Transport => UiErrorCategory::Transport,
            ErrorKind::Backend => UiErrorCategory::Backend,
            ErrorKind::Payload => UiErrorCategory::Payload,
        };
        Self {
            category,
            context,
            message: error.to_string(),
        }
    }

    /// Failures that never reached the backend (disk, clipboard, worker startup).
    pub fn local(context: UiErrorContext, message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Local,
            context,
            message: message.into(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.category == UiErrorCategory::Transport
    }
}

pub fn category_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Validation => "Check your input",
        UiErrorCategory::Transport => "Backend unreachable",
        UiErrorCategory::Backend => "Backend error",
        UiErrorCategory::Payload => "Unexpected response",
        UiErrorCategory::Local => "Local error",
    }
}
