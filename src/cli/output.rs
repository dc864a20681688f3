//! CLI output: command results and error mapping to the stable CLI surface.

use crate::error::ApiError;

/// Text printed on stdout plus whether the command should exit with success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        Self::ok(text)
    }
}

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    e.to_string()
}
