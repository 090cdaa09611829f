/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/history.rs
 * Responsibility: Append-only conversation history for one session.
 */

use crate::dispatch::ToolOutcome;
use crate::llm::{Message, MessageRole, MultimodalPart, ToolCallRequest};

/// Ordered turns of one session. Entries are only ever appended, so any
/// prefix is a valid conversation to replay.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history seeded with the user's prompt.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.push_user(prompt);
        history
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message {
            role: MessageRole::User,
            parts: vec![MultimodalPart::text(text)],
        });
    }

    /// Append a model turn exactly as the model returned it.
    pub fn push_model(&mut self, parts: Vec<MultimodalPart>) {
        self.messages.push(Message {
            role: MessageRole::Assistant,
            parts,
        });
    }

    pub fn push_tool_outcome(&mut self, call: &ToolCallRequest, outcome: &ToolOutcome) {
        self.messages.push(Message {
            role: MessageRole::ToolResult,
            parts: vec![outcome.to_part(call.id.as_deref())],
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_appends_in_order() {
        let mut history = ConversationHistory::with_prompt("fix the bug");
        let call = ToolCallRequest {
            id: Some("c1".to_string()),
            name: "read_file".to_string(),
            args: json!({ "file_path": "main.py" }),
        };
        history.push_model(vec![MultimodalPart::function_call("read_file", call.args.clone())]);
        history.push_tool_outcome(
            &call,
            &ToolOutcome {
                name: "read_file".to_string(),
                result: Ok("print(1)".to_string()),
            },
        );

        let roles: Vec<_> = history.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant, MessageRole::ToolResult]);
        assert_eq!(history.messages()[0].parts[0].text.as_deref(), Some("fix the bug"));
        assert_eq!(
            history.messages()[2].parts[0].function_response.as_ref().unwrap()["id"],
            "c1"
        );
    }
}
