/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/lib.rs
 * Responsibility: Shared library modules
 */

pub mod agent_loop;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod llm;
pub mod registry;
pub mod sandbox;
pub mod telemetry;
pub mod tools;

pub use agent_loop::{AgentSession, LoopOutcome};
pub use dispatch::{ToolDispatcher, ToolOutcome};
pub use error::{ErrorKind, LlmError, ToolError};
pub use sandbox::WorkingDirectory;
