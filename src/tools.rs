/*
 * Confine - Sandboxed File-Tool Agent
 * File Path: src/tools.rs
 * Responsibility: The four sandboxed tool operations.
 */

use crate::error::{Action, EntryKind, ToolError};
use crate::sandbox::{Existence, WorkingDirectory, resolve};
use std::fs;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_MAX_READ_CHARS: usize = 10_000;
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Limits shared by every tool call in a session.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub max_read_chars: usize,
    pub script_timeout: Duration,
    pub interpreter: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_read_chars: DEFAULT_MAX_READ_CHARS,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }
}

/// List the immediate children of `directory`, one line each, in whatever
/// order the OS hands them out. An empty directory lists as an empty string.
pub fn list_directory(root: &WorkingDirectory, directory: &str) -> Result<String, ToolError> {
    let target = resolve(root, directory, Action::List, Existence::Required)?;
    if !target.is_dir() {
        return Err(ToolError::WrongKind {
            path: directory.to_string(),
            expected: EntryKind::Directory,
        });
    }

    let entries = fs::read_dir(&target)
        .map_err(|e| ToolError::io(format!("Failed to list \"{}\"", directory), e))?;

    let mut lines = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ToolError::io(format!("Failed to list \"{}\"", directory), e))?;
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            // Dangling symlink, or the entry vanished since read_dir.
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(ToolError::io(
                    format!("Failed to inspect \"{}\"", entry.file_name().to_string_lossy()),
                    e,
                ));
            }
        };
        lines.push(format!(
            "{}: file_size={} bytes, is_dir={}",
            entry.file_name().to_string_lossy(),
            meta.len(),
            meta.is_dir()
        ));
    }

    Ok(lines.join("\n"))
}

/// Read a UTF-8 file, cut to `max_chars` code points with a trailing marker.
pub fn read_file(root: &WorkingDirectory, file_path: &str, max_chars: usize) -> Result<String, ToolError> {
    let target = resolve(root, file_path, Action::Read, Existence::Required)?;
    if !target.is_file() {
        return Err(ToolError::WrongKind {
            path: file_path.to_string(),
            expected: EntryKind::File,
        });
    }

    let content = fs::read_to_string(&target)
        .map_err(|e| ToolError::io(format!("Failed to read \"{}\"", file_path), e))?;

    Ok(truncate_chars(content, file_path, max_chars))
}

fn truncate_chars(mut content: String, file_path: &str, max_chars: usize) -> String {
    let cut = content.char_indices().nth(max_chars).map(|(index, _)| index);
    if let Some(cut) = cut {
        debug!(file = %file_path, limit = max_chars, "Truncating file content");
        content.truncate(cut);
        content.push_str(&format!(
            "[...File \"{}\" truncated at {} characters]",
            file_path, max_chars
        ));
    }
    content
}

/// Overwrite `file_path` with `content`, creating parent directories.
pub fn write_file(root: &WorkingDirectory, file_path: &str, content: &str) -> Result<String, ToolError> {
    let target = resolve(root, file_path, Action::Write, Existence::Optional)?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ToolError::io(format!("Failed to create parent directories for \"{}\"", file_path), e))?;
    }

    fs::write(&target, content).map_err(|e| ToolError::io(format!("Failed to write \"{}\"", file_path), e))?;

    Ok(format!(
        "Successfully wrote to \"{}\" ({} characters written)",
        file_path,
        content.chars().count()
    ))
}

/// Run a `.py` file under the configured interpreter with the root as cwd.
///
/// The child is killed and reaped when it outlives `settings.script_timeout`.
pub async fn run_script(
    root: &WorkingDirectory,
    file_path: &str,
    settings: &ToolSettings,
) -> Result<String, ToolError> {
    let target = resolve(root, file_path, Action::Execute, Existence::Required)?;
    if !target.is_file() {
        return Err(ToolError::WrongKind {
            path: file_path.to_string(),
            expected: EntryKind::File,
        });
    }
    if target.extension().and_then(|ext| ext.to_str()) != Some("py") {
        return Err(ToolError::WrongFileType {
            path: file_path.to_string(),
        });
    }

    let mut child = Command::new(&settings.interpreter)
        .arg(&target)
        .current_dir(root.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::io(format!("Failed to execute \"{}\"", file_path), e))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        let (status, out, err) = tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
        Ok::<_, std::io::Error>((status?, out?, err?))
    };
    let finished = tokio::time::timeout(settings.script_timeout, run).await;

    let (status, out, err) = match finished {
        Ok(result) => result.map_err(|e| ToolError::io(format!("Failed to execute \"{}\"", file_path), e))?,
        Err(_) => {
            warn!(
                script = %file_path,
                timeout_secs = settings.script_timeout.as_secs(),
                "Script timed out, killing it"
            );
            if let Err(e) = child.kill().await {
                warn!(script = %file_path, error = %e, "Failed to kill timed out script");
            }
            return Err(ToolError::Timeout {
                limit: settings.script_timeout,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&out);
    let stderr = String::from_utf8_lossy(&err);
    let mut sections = Vec::new();

    if !stdout.trim().is_empty() {
        sections.push(format!("STDOUT:\n{}", stdout.trim()));
    }
    if !stderr.trim().is_empty() {
        sections.push(format!("STDERR:\n{}", stderr.trim()));
    }
    if !status.success() {
        match status.code() {
            Some(code) => sections.push(format!("Process exited with code {}", code)),
            None => sections.push("Process terminated by signal".to_string()),
        }
    }

    if sections.is_empty() {
        Ok("No output produced.".to_string())
    } else {
        Ok(sections.join("\n\n"))
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
