/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/agent_loop.rs
 * Responsibility: Native tool-calling agent loop over one sandboxed session.
 */

use crate::dispatch::ToolDispatcher;
use crate::error::LlmError;
use crate::history::ConversationHistory;
use crate::llm::{ModelClient, ModelTurn, TokenUsage};
use crate::registry;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI coding agent.

When a user asks a question or makes a request, make a function call plan. You can perform the following operations:

- List files and directories
- Read file contents
- Execute Python files
- Write or overwrite files

All paths you provide should be relative to the working directory. You do not need to specify the working directory in your function calls as it is automatically injected for security reasons.

When you have enough information, answer in plain text without calling any function.";

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// The model replied without tool calls.
    Answer {
        text: String,
        iterations: usize,
        usage: TokenUsage,
    },
    /// The ceiling was hit while the model still wanted tools.
    MaxIterationsReached { iterations: usize, usage: TokenUsage },
}

/// One prompt, one working directory, one history.
#[derive(Debug)]
pub struct AgentSession {
    dispatcher: ToolDispatcher,
    history: ConversationHistory,
    system_prompt: String,
    tools: Value,
    max_iterations: usize,
    iterations: usize,
    usage: TokenUsage,
    verbose: bool,
}

impl AgentSession {
    pub fn new(dispatcher: ToolDispatcher, prompt: impl Into<String>) -> Self {
        Self {
            dispatcher,
            history: ConversationHistory::with_prompt(prompt),
            system_prompt: SYSTEM_PROMPT.to_string(),
            tools: Value::Array(registry::declarations()),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            iterations: 0,
            usage: TokenUsage::default(),
            verbose: false,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Drive the conversation until the model answers in plain text or the
    /// iteration ceiling is reached. Tool failures go back to the model; only
    /// model errors end the loop early.
    pub async fn run(&mut self, model: &dyn ModelClient) -> Result<LoopOutcome, LlmError> {
        while self.iterations < self.max_iterations {
            self.iterations += 1;
            info!(turn = self.iterations, max = self.max_iterations, "Querying model");

            let response = model
                .generate_turn(&self.system_prompt, self.history.messages(), &self.tools)
                .await?;
            self.usage.add(response.usage);
            if self.verbose {
                info!(
                    prompt_tokens = response.usage.prompt_tokens,
                    response_tokens = response.usage.response_tokens,
                    "Token usage"
                );
            }

            self.history.push_model(response.turn.parts().to_vec());

            match response.turn {
                ModelTurn::Narrative { text, .. } => {
                    debug!(turn = self.iterations, "Model answered without tool calls");
                    return Ok(LoopOutcome::Answer {
                        text,
                        iterations: self.iterations,
                        usage: self.usage,
                    });
                }
                ModelTurn::ToolCalls { thought, calls, .. } => {
                    if let Some(thought) = thought.as_ref() {
                        debug!(turn = self.iterations, "Thought: {}", thought);
                    }

                    for call in &calls {
                        let outcome = self.dispatcher.dispatch(call).await;
                        if self.verbose {
                            info!(tool = %call.name, "-> {}", outcome.text());
                        }
                        self.history.push_tool_outcome(call, &outcome);
                    }
                }
            }
        }

        warn!(
            iterations = self.iterations,
            "Maximum iterations reached without a final answer"
        );
        Ok(LoopOutcome::MaxIterationsReached {
            iterations: self.iterations,
            usage: self.usage,
        })
    }
}
