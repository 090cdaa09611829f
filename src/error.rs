/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/error.rs
 * Responsibility: Tool failure taxonomy and model transport errors.
 */

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Marker every failed tool outcome starts with, so the model can tell
/// failures from payloads without parsing structure.
pub const ERROR_PREFIX: &str = "Error: ";

/// What a tool was trying to do when a path left the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Read,
    Write,
    Execute,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Action::List => "list",
            Action::Read => "read",
            Action::Write => "write to",
            Action::Execute => "execute",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.write_str("a regular file"),
            EntryKind::Directory => f.write_str("a directory"),
        }
    }
}

/// Failures a tool call can end in. All of them are handed back to the model
/// as text; none of them stop the agent loop.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Carries the caller's original path, never the resolved one.
    #[error("Cannot {action} \"{path}\" as it is outside the permitted working directory")]
    OutsideSandbox { action: Action, path: String },

    #[error("\"{path}\" not found")]
    NotFound { path: String },

    #[error("\"{path}\" is not {expected}")]
    WrongKind { path: String, expected: EntryKind },

    #[error("\"{path}\" is not a Python file")]
    WrongFileType { path: String },

    #[error("Script execution timed out after {} seconds", .limit.as_secs())]
    Timeout { limit: Duration },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Copyable tag for a [`ToolError`], handy for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutsideSandbox,
    NotFound,
    WrongKind,
    WrongFileType,
    Timeout,
    UnknownFunction,
    InvalidArguments,
    Io,
}

impl ToolError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ToolError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::OutsideSandbox { .. } => ErrorKind::OutsideSandbox,
            ToolError::NotFound { .. } => ErrorKind::NotFound,
            ToolError::WrongKind { .. } => ErrorKind::WrongKind,
            ToolError::WrongFileType { .. } => ErrorKind::WrongFileType,
            ToolError::Timeout { .. } => ErrorKind::Timeout,
            ToolError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            ToolError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            ToolError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Text form handed back to the model.
    pub fn to_observation(&self) -> String {
        format!("{}{}", ERROR_PREFIX, self)
    }
}

/// Errors talking to the model. Unlike [`ToolError`] these end the session.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gemini API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
