use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{QualityTier, Strategy, Transcript, VideoId};
use crate::Result;

pub const NAME: &str = "subprocess";

/// Line printed by the external extractor
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractorLine {
    Transcript { transcript: String },
    Error { error: String },
}

/// External transcript extractor run as a child process.
///
/// The video id is appended as the last argument. The child must print a JSON object,
/// `{"transcript": "..."}` or `{"error": "..."}`, on its own line of stdout.
pub struct SubprocessStrategy {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SubprocessStrategy {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    /// Check if the extractor program can be launched at all
    pub async fn check_availability(&self) -> bool {
        crate::utils::check_command_available(&self.program).await
    }

    fn parse_output(stdout: &str) -> Result<String> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .ok_or_else(|| {
                let preview: String = stdout.chars().take(100).collect();
                anyhow::anyhow!("Parse error: no JSON line in output: {}", preview)
            })?;

        let parsed: ExtractorLine = serde_json::from_str(line).with_context(|| {
            let preview: String = line.chars().take(100).collect();
            format!("Parse error: {}", preview)
        })?;

        match parsed {
            ExtractorLine::Transcript { transcript } => Ok(transcript),
            ExtractorLine::Error { error } => anyhow::bail!("{}", error),
        }
    }
}

#[async_trait]
impl Strategy for SubprocessStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, id: &VideoId) -> Result<Transcript> {
        tracing::debug!("Running extractor {} for {}", self.program, id);

        // kill_on_drop reaps the child when the attempt times out or its wave is abandoned
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(id.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.program))?;

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for extractor")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Exit code {}. Error: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                error.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = Self::parse_output(&stdout)?;
        Ok(Transcript::new(text, QualityTier::Exact))
    }
}
