// Stream catalog backed by the `yt-dlp` binary
//
// One metadata query per request: `yt-dlp --dump-json` prints the full
// format table, which is parsed into a CatalogSnapshot. Nothing is cached
// between calls, so two resolves of the same source can legitimately see
// different stream sets.

use async_trait::async_trait;

use super::errors::ConvertError;
use super::models::{CatalogConfig, CatalogSnapshot, MediaStream, SourceReference, StreamKind};
use super::traits::StreamCatalog;
use super::utils::{binary_responds, find_binary, run_output_with_timeout};

pub struct YtDlpCatalog {
    ytdlp_path: String,
}

impl YtDlpCatalog {
    pub fn new() -> Self {
        Self {
            ytdlp_path: find_binary("yt-dlp"),
        }
    }

    fn build_args(&self, source: &SourceReference, config: &CatalogConfig, client: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.timeout_seconds.to_string(),
            "--retries".to_string(),
            "2".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", client),
        ];

        if let Some(proxy) = &config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(source.url.clone());
        args
    }

    fn parse_snapshot(stdout: &[u8]) -> Result<CatalogSnapshot, ConvertError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| ConvertError::OperationFailed(format!("Invalid JSON: {}", e)))?;

        let streams = Self::parse_streams(&json)?;

        Ok(CatalogSnapshot {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            streams,
        })
    }

    fn parse_streams(json: &serde_json::Value) -> Result<Vec<MediaStream>, ConvertError> {
        let formats = json["formats"]
            .as_array()
            .ok_or_else(|| ConvertError::OperationFailed("No formats array in JSON".to_string()))?;

        let mut streams = Vec::new();

        for f in formats {
            let url = match f["url"].as_str() {
                Some(u) if !u.is_empty() => u.to_string(),
                // Storyboards and manifest-only entries have no direct URL
                _ => continue,
            };

            let has_video = f["vcodec"].as_str().map_or(false, |v| v != "none");
            let has_audio = f["acodec"].as_str().map_or(false, |a| a != "none");
            let kind = match (has_video, has_audio) {
                (true, true) => StreamKind::Combined,
                (true, false) => StreamKind::Video,
                (false, true) => StreamKind::Audio,
                (false, false) => continue,
            };

            let ext = f["ext"].as_str().unwrap_or("").to_string();

            streams.push(MediaStream {
                id: f["format_id"].as_str().unwrap_or("").to_string(),
                kind,
                mime_type: mime_for(kind, &ext),
                container: ext,
                height: f["height"].as_u64().map(|h| h as u32),
                audio_bitrate: f["abr"].as_f64().map(|a| a as f32),
                url,
                filesize: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
            });
        }

        Ok(streams)
    }

    /// Map yt-dlp stderr onto our failure modes
    fn classify_failure(stderr: &str) -> ConvertError {
        let lower = stderr.to_lowercase();

        if lower.contains("not found") || lower.contains("no such file") {
            return ConvertError::ToolNotFound(stderr.trim().to_string());
        }
        if lower.contains("unsupported url")
            || lower.contains("is not a valid url")
            || lower.contains("unavailable")
            || lower.contains("private video")
            || lower.contains("removed")
            || lower.contains("timed out")
            || lower.contains("unable to download")
        {
            return ConvertError::Resolution(stderr.trim().to_string());
        }

        ConvertError::OperationFailed(stderr.trim().to_string())
    }
}

impl Default for YtDlpCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamCatalog for YtDlpCatalog {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        binary_responds(&self.ytdlp_path)
    }

    async fn resolve(
        &self,
        source: &SourceReference,
        config: &CatalogConfig,
    ) -> Result<CatalogSnapshot, ConvertError> {
        if !self.is_available() {
            return Err(ConvertError::ToolNotFound("yt-dlp binary not found".to_string()));
        }

        // android is less likely to be throttled; web is the fallback
        let clients = ["android", "web"];
        let mut last_error =
            ConvertError::Resolution("no extraction attempt succeeded".to_string());

        for client in clients {
            let args = self.build_args(source, config, client);
            eprintln!("[Catalog] Resolving {} via client '{}'", source.id, client);

            match run_output_with_timeout(&self.ytdlp_path, args, config.timeout_seconds + 15).await
            {
                Ok(out) if out.status.success() => {
                    let snapshot = Self::parse_snapshot(&out.stdout)?;
                    eprintln!(
                        "[Catalog] Resolved '{}' with {} streams",
                        snapshot.title,
                        snapshot.streams.len()
                    );
                    return Ok(snapshot);
                }
                Ok(out) => {
                    let stderr = String::from_utf8_lossy(&out.stderr);
                    eprintln!("[Catalog] Client '{}' failed: {}", client, stderr.trim());
                    last_error = Self::classify_failure(&stderr);
                }
                Err(e) => {
                    eprintln!("[Catalog] Client '{}' error: {}", client, e);
                    last_error = ConvertError::Resolution(e);
                }
            }
        }

        Err(last_error)
    }
}

fn mime_for(kind: StreamKind, ext: &str) -> String {
    // The service reports "3gp" as extension but "3gpp" in mime types
    let subtype = match ext {
        "3gp" => "3gpp",
        "m4a" => "mp4",
        other => other,
    };
    match kind {
        StreamKind::Audio => format!("audio/{}", subtype),
        StreamKind::Video | StreamKind::Combined => format!("video/{}", subtype),
    }
}
