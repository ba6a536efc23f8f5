// Common data models for the conversion pipeline

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{ConvertError, ErrorKind};

lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})"
    )
    .unwrap();
}

/// Reference to a remote video, parsed from a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    /// URL exactly as the user supplied it
    pub url: String,
    /// 11-character YouTube video id
    pub id: String,
}

impl SourceReference {
    /// Parse a YouTube URL into a source reference.
    ///
    /// Accepts watch, shorts, embed, live and youtu.be short links.
    pub fn parse(url: &str) -> Result<Self, ConvertError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ConvertError::Resolution("empty URL".to_string()));
        }

        match VIDEO_ID_RE.captures(trimmed) {
            Some(caps) => Ok(Self {
                url: trimmed.to_string(),
                id: caps[1].to_string(),
            }),
            None => Err(ConvertError::Resolution(format!(
                "not a recognizable YouTube URL: {}",
                trimmed
            ))),
        }
    }
}

/// What a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Video track only (no audio)
    Video,
    /// Audio track only
    Audio,
    /// Video and audio together (progressive)
    Combined,
}

/// One retrievable remote media asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStream {
    /// Format id as reported by the service (e.g. "137", "18")
    pub id: String,
    pub kind: StreamKind,
    /// Native container extension (mp4, webm, m4a, 3gp)
    pub container: String,
    /// Mime type (e.g. "video/3gpp", "audio/mp4")
    pub mime_type: String,
    /// Vertical resolution in pixels, for video-bearing streams
    pub height: Option<u32>,
    /// Audio bitrate in kbps, for audio-bearing streams
    pub audio_bitrate: Option<f32>,
    /// Direct download URL
    pub url: String,
    /// Size in bytes when the service reports one
    pub filesize: Option<u64>,
}

impl MediaStream {
    /// Quality metric used for selection: resolution for video-bearing
    /// streams, bitrate for audio-only streams.
    pub fn quality(&self) -> u64 {
        match self.kind {
            StreamKind::Video | StreamKind::Combined => self.height.unwrap_or(0) as u64,
            StreamKind::Audio => self.audio_bitrate.map(|b| (b * 100.0) as u64).unwrap_or(0),
        }
    }
}

/// Result of resolving one source: title plus every stream the service
/// reported at query time. Never cached across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub id: String,
    pub title: String,
    pub streams: Vec<MediaStream>,
}

/// Requested output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Mp4,
    Wav,
    Mp3,
    Threegp,
    Mkv,
}

impl OutputFormat {
    /// Parse a user-facing selection such as "mp4" or ".mp4"
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().trim_start_matches('.').to_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            "3gp" => Some(Self::Threegp),
            "mkv" => Some(Self::Mkv),
            _ => None,
        }
    }

    /// File extension without the dot
    pub fn ext(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Threegp => "3gp",
            Self::Mkv => "mkv",
        }
    }

    /// Whether the final file carries no video track
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Wav | Self::Mp3)
    }

    /// Whether this format takes the separate audio/video mux path
    pub fn requires_mux(&self) -> bool {
        matches!(self, Self::Threegp)
    }

    /// Mime-type prefix a video-only stream must match on the mux path
    pub fn compatible_video_mime(&self) -> Option<&'static str> {
        match self {
            Self::Threegp => Some("video/3gpp"),
            _ => None,
        }
    }

    /// Mime-type prefix an audio-only stream must match on the mux path
    pub fn compatible_audio_mime(&self) -> Option<&'static str> {
        match self {
            Self::Threegp => Some("audio/3gpp"),
            _ => None,
        }
    }
}

/// One conversion request, consumed once by the resolver
#[derive(Debug, Clone)]
pub struct OutputRequest {
    pub source: SourceReference,
    pub format: OutputFormat,
    /// Directory the final file (and any intermediates) are written to
    pub output_dir: PathBuf,
}

impl OutputRequest {
    pub fn new(source: SourceReference, format: OutputFormat) -> Self {
        Self {
            source,
            format,
            output_dir: default_output_dir(),
        }
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }
}

/// Platform download directory, or the working directory when unknown
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Outcome of one `produce` call, handed back to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<ErrorKind>,
}

impl DownloadResult {
    pub fn ok(path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(path),
            error: None,
        }
    }

    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(kind),
        }
    }
}

/// Network settings passed through to the catalog tool and HTTP client
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// SOCKS5/HTTP proxy URL (e.g. "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,
    /// Socket timeout for metadata queries, in seconds
    pub timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_seconds: 30,
        }
    }
}

impl CatalogConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}
