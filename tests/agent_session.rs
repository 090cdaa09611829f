use async_trait::async_trait;
use confine::llm::{Message, ModelClient, ModelResponse, ModelTurn, MultimodalPart, TokenUsage, ToolCallRequest};
use confine::tools::ToolSettings;
use confine::{AgentSession, LlmError, LoopOutcome, ToolDispatcher, WorkingDirectory};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

/// Stands in for the remote model: each turn is computed from the history so
/// far, the way a real model would react to tool output.
struct ReactiveModel {
    script: Mutex<VecDeque<Box<dyn Fn(&[Message]) -> ModelTurn + Send>>>,
}

#[async_trait]
impl ModelClient for ReactiveModel {
    async fn generate_turn(
        &self,
        _system_prompt: &str,
        history: &[Message],
        tools: &Value,
    ) -> Result<ModelResponse, LlmError> {
        assert_eq!(tools.as_array().map(Vec::len), Some(4));
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))?;
        Ok(ModelResponse {
            turn: step(history),
            usage: TokenUsage {
                prompt_tokens: history.len() as u64,
                response_tokens: 1,
            },
        })
    }
}

fn call(name: &str, args: Value) -> ModelTurn {
    ModelTurn::ToolCalls {
        thought: None,
        calls: vec![ToolCallRequest {
            id: None,
            name: name.to_string(),
            args: args.clone(),
        }],
        parts: vec![MultimodalPart::function_call(name, args)],
    }
}

fn last_tool_text(history: &[Message]) -> String {
    let response = history
        .last()
        .and_then(|m| m.parts[0].function_response.clone())
        .expect("last message should be a tool result");
    let body = &response["response"];
    body["output"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_session_recovers_from_tool_errors_and_answers() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "hello").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    let script: Vec<Box<dyn Fn(&[Message]) -> ModelTurn + Send>> = vec![
        Box::new(|_| call("read_file", json!({ "file_path": "../etc/passwd" }))),
        Box::new(|history| {
            assert!(last_tool_text(history).contains("outside the permitted working directory"));
            call("list_directory", json!({ "directory": "." }))
        }),
        Box::new(|history| {
            let listing = last_tool_text(history);
            assert!(listing.contains("a.txt: file_size=5 bytes, is_dir=false"));
            assert!(listing.contains("sub: "));
            call("write_file", json!({ "file_path": "sub/summary.txt", "content": "two entries" }))
        }),
        Box::new(|history| {
            assert_eq!(
                last_tool_text(history),
                "Successfully wrote to \"sub/summary.txt\" (11 characters written)"
            );
            ModelTurn::Narrative {
                text: "The directory has a.txt and sub/.".to_string(),
                parts: vec![MultimodalPart::text("The directory has a.txt and sub/.")],
            }
        }),
    ];
    let model = ReactiveModel {
        script: Mutex::new(script.into()),
    };

    let wd = WorkingDirectory::open(dir.path()).unwrap();
    let mut session = AgentSession::new(ToolDispatcher::new(wd, ToolSettings::default()), "Describe this directory");

    let outcome = session.run(&model).await.unwrap();
    match outcome {
        LoopOutcome::Answer { text, iterations, .. } => {
            assert_eq!(text, "The directory has a.txt and sub/.");
            assert_eq!(iterations, 4);
        }
        other => panic!("expected an answer, got {:?}", other),
    }
    assert_eq!(
        fs::read_to_string(dir.path().join("sub").join("summary.txt")).unwrap(),
        "two entries"
    );
    assert_eq!(session.history().len(), 1 + 3 * 2 + 1);
}

#[tokio::test]
async fn test_session_reports_missing_script_and_wrong_type() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "just notes").unwrap();

    let script: Vec<Box<dyn Fn(&[Message]) -> ModelTurn + Send>> = vec![
        Box::new(|_| call("run_script", json!({ "file_path": "missing.py" }))),
        Box::new(|history| {
            assert_eq!(last_tool_text(history), "Error: \"missing.py\" not found");
            call("run_script", json!({ "file_path": "notes.txt" }))
        }),
        Box::new(|history| {
            assert_eq!(last_tool_text(history), "Error: \"notes.txt\" is not a Python file");
            call("run_script", json!({ "file_path": "notes.txt" }))
        }),
    ];
    let model = ReactiveModel {
        script: Mutex::new(script.into()),
    };

    let wd = WorkingDirectory::open(dir.path()).unwrap();
    let mut session = AgentSession::new(ToolDispatcher::new(wd, ToolSettings::default()), "run things")
        .with_max_iterations(3);

    let outcome = session.run(&model).await.unwrap();
    assert!(matches!(outcome, LoopOutcome::MaxIterationsReached { iterations: 3, .. }));
}
