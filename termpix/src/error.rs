// ABOUTME: Error types for terminal image display operations
// ABOUTME: Distinguishes unsupported terminals, missing files, tool failures, and geometry gaps

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TermpixError {
    #[error("No supported image protocol for this terminal")]
    UnsupportedProtocol,

    #[error("Image file not found: {}", .0.display())]
    MissingResource(PathBuf),

    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("{tool} timed out after {}ms", .after.as_millis())]
    Timeout { tool: String, after: Duration },

    #[error("Geometry unavailable: {0}")]
    GeometryUnavailable(&'static str),

    #[error("Terminal write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TermpixError {
    pub fn tool(tool: &str, reason: impl Into<String>) -> Self {
        TermpixError::ExternalTool {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// True when a later call with the same inputs may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TermpixError::Timeout { .. }
                | TermpixError::GeometryUnavailable(_)
                | TermpixError::ExternalTool { .. }
        )
    }
}

pub type Result<T, E = TermpixError> = std::result::Result<T, E>;
