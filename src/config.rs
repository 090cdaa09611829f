/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/config.rs
 * Responsibility: YAML configuration structure, discovery and loading
 */
use crate::agent_loop::DEFAULT_MAX_ITERATIONS;
use crate::llm::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::tools::{DEFAULT_INTERPRETER, DEFAULT_MAX_READ_CHARS, ToolSettings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CONFINE_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: Option<f32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    pub working_directory: PathBuf,
    pub max_iterations: usize,
    pub script_timeout_secs: u64,
    pub max_read_chars: usize,
    pub interpreter: String,
    pub system_prompt: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("."),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            script_timeout_secs: 30,
            max_read_chars: DEFAULT_MAX_READ_CHARS,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            system_prompt: None,
        }
    }
}

impl RuntimeConfig {
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            max_read_chars: self.max_read_chars,
            script_timeout: Duration::from_secs(self.script_timeout_secs.max(1)),
            interpreter: self.interpreter.clone(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file at {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from the first config file that exists, or fall back to defaults.
    /// Priority: CLI > `CONFINE_CONFIG` > ~/.confine/confine.yml
    pub fn discover(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Self::load(env_path);
        }

        if let Some(path) = default_config_path().filter(|p| p.is_file()) {
            return Self::load(path);
        }

        Ok(Self::default())
    }

    /// Let `GEMINI_API_KEY` and `GEMINI_API_MODEL` override the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.gemini.api_key = key;
        }
        if let Some(model) = lookup("GEMINI_API_MODEL").filter(|v| !v.trim().is_empty()) {
            self.gemini.model = model;
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.gemini.api_key.trim();
        if key.is_empty() {
            anyhow::bail!("Missing Gemini API key: set GEMINI_API_KEY or gemini.api_key in the config file");
        }
        Ok(key)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".confine").join("confine.yml"))
}
