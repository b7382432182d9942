//! Constant-bitrate re-encoding through the ffmpeg binary.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::pipeline::PipelineError;

/// One re-encode invocation: input, output, and the rate that makes the
/// output fit the upload limit.
#[derive(Debug, Clone)]
pub struct CompressionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bitrate_kbps: u32,
}

/// Seam between the orchestrator and the transcoding tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encode `job.input` into `job.output` at `job.bitrate_kbps`,
    /// overwriting any existing output file. Non-zero exit is a hard
    /// failure; there is no retry and no fallback bitrate.
    async fn transcode(&self, job: &CompressionJob) -> Result<(), PipelineError>;
}

/// Production transcoder backed by the ffmpeg binary.
pub struct FfmpegTranscoder {
    bin: String,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Quick startup check that the binary is runnable.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, job: &CompressionJob) -> Result<(), PipelineError> {
        debug!(
            "Re-encoding {:?} -> {:?} at {}k",
            job.input, job.output, job.bitrate_kbps
        );

        let output = Command::new(&self.bin)
            .arg("-i")
            .arg(&job.input)
            .args(["-b:a", &format!("{}k", job.bitrate_kbps)])
            .arg("-y")
            .arg(&job.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                PipelineError::Compression(format!("failed to start {}: {}", self.bin, e))
            })?;

        if !output.status.success() {
            let text = String::from_utf8_lossy(&output.stderr);
            // ffmpeg puts the reason on the last non-empty line
            let reason = text
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("ffmpeg exited with an error")
                .to_string();
            return Err(PipelineError::Compression(reason));
        }

        Ok(())
    }
}
