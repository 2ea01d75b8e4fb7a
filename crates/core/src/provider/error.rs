//! Error types for acquisition providers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while driving an acquisition provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider binary is missing; install it before downloading.
    #[error("provider '{id}' is not installed at {path}; run install first")]
    NotInstalled { id: String, path: PathBuf },

    /// Downloading or writing the provider binary failed.
    #[error("failed to install provider '{id}': {reason}")]
    InstallFailed { id: String, reason: String },

    /// The external tool exited with a non-zero status.
    #[error("tool exited with {}: {stderr}", exit_code_label(.exit_code))]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The tool reported success but produced no matching output file.
    #[error("tool reported success but produced no output for request {request_id}")]
    NoOutputFile { request_id: String },

    /// HTTP error during binary installation.
    #[error("HTTP error: {0}")]
    Http(String),

    /// I/O error while spawning or scanning output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

impl ProviderError {
    /// Creates a tool-failure error from captured stderr.
    pub fn tool_failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ToolFailed {
            exit_code,
            stderr: stderr.into(),
        }
    }
}
