/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/dispatch.rs
 * Responsibility: Route model tool calls to tool functions and normalise results.
 */

use crate::error::ToolError;
use crate::llm::{MultimodalPart, ToolCallRequest};
use crate::registry::ToolCall;
use crate::sandbox::WorkingDirectory;
use crate::tools::{self, ToolSettings};
use serde_json::json;
use tracing::{info, warn};

/// Result of one tool call, tagged with the name the model asked for.
#[derive(Debug)]
pub struct ToolOutcome {
    pub name: String,
    pub result: Result<String, ToolError>,
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        self.result.is_err()
    }

    /// Payload on success, `Error: ...` on failure.
    pub fn text(&self) -> String {
        match &self.result {
            Ok(output) => output.clone(),
            Err(err) => err.to_observation(),
        }
    }

    /// The `functionResponse` part that carries this outcome back to the model.
    pub fn to_part(&self, call_id: Option<&str>) -> MultimodalPart {
        let response_key = if self.is_error() { "error" } else { "output" };
        MultimodalPart::function_response(&self.name, json!({ response_key: self.text() }), call_id)
    }
}

/// Runs tool calls for one session against its working directory.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    working_directory: WorkingDirectory,
    settings: ToolSettings,
    verbose: bool,
}

impl ToolDispatcher {
    pub fn new(working_directory: WorkingDirectory, settings: ToolSettings) -> Self {
        Self {
            working_directory,
            settings,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Never fails: unknown tools and malformed arguments come back as
    /// failure outcomes for the model to react to.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolOutcome {
        if self.verbose {
            info!(tool = %request.name, args = %request.args, "Calling function");
        } else {
            info!(tool = %request.name, "Calling function");
        }

        let result = match ToolCall::parse(&request.name, &request.args) {
            Ok(call) => self.run(call).await,
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            warn!(tool = %request.name, kind = ?err.kind(), "Tool call failed: {}", err);
        }

        ToolOutcome {
            name: request.name.clone(),
            result,
        }
    }

    async fn run(&self, call: ToolCall) -> Result<String, ToolError> {
        let root = &self.working_directory;
        match call {
            ToolCall::ListDirectory(args) => tools::list_directory(root, args.directory()),
            ToolCall::ReadFile(args) => tools::read_file(root, &args.file_path, self.settings.max_read_chars),
            ToolCall::RunScript(args) => tools::run_script(root, &args.file_path, &self.settings).await,
            ToolCall::WriteFile(args) => tools::write_file(root, &args.file_path, &args.content),
        }
    }
}
