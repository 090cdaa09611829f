/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/registry.rs
 * Responsibility: Closed set of tools, their typed arguments and declarations.
 */

use crate::error::ToolError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListDirectory,
    ReadFile,
    RunScript,
    WriteFile,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::ListDirectory,
        ToolKind::ReadFile,
        ToolKind::RunScript,
        ToolKind::WriteFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListDirectory => "list_directory",
            ToolKind::ReadFile => "read_file",
            ToolKind::RunScript => "run_script",
            ToolKind::WriteFile => "write_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Function declaration in the shape Gemini expects.
    pub fn declaration(self) -> Value {
        match self {
            ToolKind::ListDirectory => json!({
                "name": self.name(),
                "description": "Lists files in the specified directory along with their sizes, constrained to the working directory.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself."
                        }
                    }
                }
            }),
            ToolKind::ReadFile => json!({
                "name": self.name(),
                "description": "Reads the content of a file, constrained to the working directory. Long files are truncated.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the file to read, relative to the working directory."
                        }
                    },
                    "required": ["file_path"]
                }
            }),
            ToolKind::RunScript => json!({
                "name": self.name(),
                "description": "Executes a Python file inside the working directory and returns its output.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the .py file to execute, relative to the working directory."
                        }
                    },
                    "required": ["file_path"]
                }
            }),
            ToolKind::WriteFile => json!({
                "name": self.name(),
                "description": "Writes content to a file, constrained to the working directory. Overwrites existing content and creates parent directories.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the file to write, relative to the working directory."
                        },
                        "content": {
                            "type": "string",
                            "description": "The content to write to the file."
                        }
                    },
                    "required": ["file_path", "content"]
                }
            }),
        }
    }
}

/// All four declarations, in registry order.
pub fn declarations() -> Vec<Value> {
    ToolKind::ALL.into_iter().map(ToolKind::declaration).collect()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListDirectoryArgs {
    #[serde(default)]
    pub directory: Option<String>,
}

impl ListDirectoryArgs {
    pub fn directory(&self) -> &str {
        self.directory.as_deref().unwrap_or(".")
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReadFileArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunScriptArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WriteFileArgs {
    pub file_path: String,
    pub content: String,
}

/// A tool call with its arguments already checked against the declared shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ListDirectory(ListDirectoryArgs),
    ReadFile(ReadFileArgs),
    RunScript(RunScriptArgs),
    WriteFile(WriteFileArgs),
}

impl ToolCall {
    pub fn parse(name: &str, args: &Value) -> Result<Self, ToolError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::UnknownFunction {
            name: name.to_string(),
        })?;

        Ok(match kind {
            ToolKind::ListDirectory => ToolCall::ListDirectory(parse_args(kind, args)?),
            ToolKind::ReadFile => ToolCall::ReadFile(parse_args(kind, args)?),
            ToolKind::RunScript => ToolCall::RunScript(parse_args(kind, args)?),
            ToolKind::WriteFile => ToolCall::WriteFile(parse_args(kind, args)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::ListDirectory(_) => ToolKind::ListDirectory,
            ToolCall::ReadFile(_) => ToolKind::ReadFile,
            ToolCall::RunScript(_) => ToolKind::RunScript,
            ToolCall::WriteFile(_) => ToolKind::WriteFile,
        }
    }
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, args: &Value) -> Result<T, ToolError> {
    // Gemini omits `args` entirely for argument-less calls.
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: kind.name().to_string(),
        message: e.to_string(),
    })
}
