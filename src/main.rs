use confine::config::Config;
use confine::llm::GeminiClient;
use confine::{AgentSession, LoopOutcome, ToolDispatcher, WorkingDirectory, telemetry};

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Confine - let a model work on files inside one directory", long_about = None)]
struct Cli {
    /// What you want the agent to do
    prompt: Option<String>,

    /// Log tool arguments, tool results and token usage
    #[arg(short, long)]
    verbose: bool,

    /// Directory the agent is confined to (overrides runtime.working_directory)
    #[arg(short, long)]
    workdir: Option<PathBuf>,

    /// Config file (default: $CONFINE_CONFIG or ~/.confine/confine.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    telemetry::init_telemetry(args.verbose);

    let Some(prompt) = args.prompt.as_deref().filter(|p| !p.trim().is_empty()) else {
        eprintln!("Usage: confine [--verbose] [--workdir DIR] [--config FILE] \"your prompt here\"");
        return ExitCode::FAILURE;
    };

    match run(&args, prompt).await {
        Ok(LoopOutcome::Answer { text, iterations, usage }) => {
            info!(
                iterations,
                prompt_tokens = usage.prompt_tokens,
                response_tokens = usage.response_tokens,
                "Session finished"
            );
            println!("Final response:\n{}", text);
            ExitCode::SUCCESS
        }
        Ok(LoopOutcome::MaxIterationsReached { iterations, .. }) => {
            eprintln!("No final answer: maximum iterations ({}) reached.", iterations);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Cli, prompt: &str) -> anyhow::Result<LoopOutcome> {
    let mut config = Config::discover(args.config.as_deref())?;
    config.apply_env_overrides(|name| std::env::var(name).ok());
    let api_key = config.require_api_key()?;

    let workdir = args
        .workdir
        .clone()
        .unwrap_or_else(|| config.runtime.working_directory.clone());
    let working_directory = WorkingDirectory::open(&workdir)
        .with_context(|| format!("Invalid working directory {:?}", workdir))?;

    if args.verbose {
        info!("User prompt: {}", prompt);
    }
    let client = GeminiClient::new(
        api_key,
        config.gemini.model.clone(),
        config.gemini.api_base.clone(),
        config.gemini.temperature,
    )?;
    info!(
        root = %working_directory.path().display(),
        model = %client.model(),
        "Starting session"
    );

    let dispatcher =
        ToolDispatcher::new(working_directory, config.runtime.tool_settings()).verbose(args.verbose);
    let mut session = AgentSession::new(dispatcher, prompt)
        .with_max_iterations(config.runtime.max_iterations)
        .verbose(args.verbose);
    if let Some(system_prompt) = config.runtime.system_prompt.clone() {
        session = session.with_system_prompt(system_prompt);
    }

    let outcome = session.run(&client).await?;
    Ok(outcome)
}
