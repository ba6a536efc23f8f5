// Error types for the conversion pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which required stream kind was absent from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamGap {
    /// No combined (progressive) stream for a direct-download format
    NoCombined,
    /// No compatible video-only stream for the mux path
    MissingVideo,
    /// No compatible audio-only stream for the mux path
    MissingAudio,
}

impl fmt::Display for StreamGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCombined => write!(f, "no combined audio+video stream available"),
            Self::MissingVideo => write!(f, "no compatible video stream available"),
            Self::MissingAudio => write!(f, "no compatible audio stream available"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConvertError {
    /// Source URL invalid, unreachable, or content unavailable
    Resolution(String),

    /// A required stream kind is absent for this source
    NoCompatibleStream(StreamGap),

    /// The external remux subprocess failed or timed out
    Remux(String),

    /// yt-dlp or ffmpeg not found in the system
    ToolNotFound(String),

    /// Catch-all for unexpected failures (disk I/O, bad service response)
    OperationFailed(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution(msg) => write!(f, "Could not resolve source: {}", msg),
            Self::NoCompatibleStream(gap) => write!(f, "No compatible stream: {}", gap),
            Self::Remux(msg) => write!(f, "Remux failed: {}", msg),
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConvertError {}

impl ConvertError {
    /// Classification exposed through `DownloadResult`. Detail strings stay
    /// internal; the kind keeps missing-audio distinct from missing-video.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::NoCompatibleStream(StreamGap::NoCombined) => ErrorKind::NoCombinedStream,
            Self::NoCompatibleStream(StreamGap::MissingVideo) => ErrorKind::MissingVideo,
            Self::NoCompatibleStream(StreamGap::MissingAudio) => ErrorKind::MissingAudio,
            Self::Remux(_) => ErrorKind::Remux,
            Self::ToolNotFound(_) | Self::OperationFailed(_) => ErrorKind::OperationFailed,
        }
    }
}

/// Serializable error classification for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Resolution,
    NoCombinedStream,
    MissingVideo,
    MissingAudio,
    Remux,
    OperationFailed,
}

impl ErrorKind {
    /// Single generic user-facing message per kind
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Resolution => "Could not read the video URL. Check it and try again.",
            Self::NoCombinedStream => "No downloadable stream is available for this format.",
            Self::MissingVideo => "Video stream not available for this download.",
            Self::MissingAudio => "Audio stream not available for this download.",
            Self::Remux => "Combining audio and video failed.",
            Self::OperationFailed => "An error occurred. Please try again.",
        }
    }
}
