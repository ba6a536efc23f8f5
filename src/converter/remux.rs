// Remuxing via the ffmpeg binary
//
// Both operations are pure codec-copy: tracks are repackaged, never
// re-encoded. Exit status and a hard timeout are checked explicitly; a
// nonzero exit becomes RemuxError with the tail of ffmpeg's stderr.

use std::path::Path;

use async_trait::async_trait;

use super::errors::ConvertError;
use super::models::OutputFormat;
use super::traits::Remuxer;
use super::utils::{binary_responds, find_binary, run_output_with_timeout};

/// Generous bound; remuxing is I/O bound and normally takes seconds
const REMUX_TIMEOUT_SECS: u64 = 600;

pub struct FfmpegRemuxer {
    ffmpeg_path: String,
}

impl FfmpegRemuxer {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: find_binary("ffmpeg"),
        }
    }

    pub fn is_available(&self) -> bool {
        binary_responds(&self.ffmpeg_path)
    }

    async fn run(&self, args: Vec<String>) -> Result<(), ConvertError> {
        if !self.is_available() {
            return Err(ConvertError::ToolNotFound("ffmpeg binary not found".to_string()));
        }

        eprintln!("[Remux] {} {}", self.ffmpeg_path, args.join(" "));

        let output = run_output_with_timeout(&self.ffmpeg_path, args, REMUX_TIMEOUT_SECS)
            .await
            .map_err(ConvertError::Remux)?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ConvertError::Remux(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                tail(&stderr, 500)
            )))
        }
    }
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), ConvertError> {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ];
        self.run(args).await
    }

    async fn repackage(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<(), ConvertError> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];

        if format.is_audio() {
            args.push("-vn".to_string());
            args.push("-acodec".to_string());
            args.push("copy".to_string());
        } else {
            args.push("-c".to_string());
            args.push("copy".to_string());
            if format == OutputFormat::Mp4 {
                args.push("-movflags".to_string());
                args.push("+faststart".to_string());
            }
        }

        args.push(output.to_string_lossy().to_string());
        self.run(args).await
    }
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
