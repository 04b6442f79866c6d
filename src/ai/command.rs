use std::{io, process::Stdio};

use async_trait::async_trait;
use log::debug;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::errors::ProviderError;

use super::TextGenerator;

/// Pipes the prompt through a shell command, e.g. a local LLM CLI, and
/// returns whatever it prints.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        if self.command.trim().is_empty() {
            return Err(ProviderError::NotConfigured("AI command is empty".to_string()));
        }
        debug!("Running AI command: {}", self.command);

        // kill_on_drop lets an aborted request take the child down with it.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin not captured"))?;

        let prompt = prompt.as_bytes().to_vec();
        let write = async move {
            stdin.write_all(&prompt).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        // Commands that ignore their input close the pipe early.
        if let Err(e) = written {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        if !output.status.success() {
            return Err(ProviderError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "command"
    }
}
