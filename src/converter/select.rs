// StreamSelector - quality-based stream selection
//
// Selection is deterministic for a fixed snapshot: among streams sharing
// the maximal quality metric, the first in the catalog's native order
// wins.

use super::errors::{ConvertError, StreamGap};
use super::models::{MediaStream, OutputFormat, StreamKind};

pub struct StreamSelector;

impl StreamSelector {
    /// Highest-resolution combined stream, for direct-download formats
    pub fn best_combined(streams: &[MediaStream]) -> Result<&MediaStream, ConvertError> {
        first_max(
            streams
                .iter()
                .filter(|s| s.kind == StreamKind::Combined),
        )
        .ok_or(ConvertError::NoCompatibleStream(StreamGap::NoCombined))
    }

    /// Highest-resolution video-only stream compatible with the mux target
    pub fn best_video_for_mux(
        streams: &[MediaStream],
        format: OutputFormat,
    ) -> Result<&MediaStream, ConvertError> {
        let mime = format
            .compatible_video_mime()
            .ok_or_else(|| ConvertError::OperationFailed(format!(
                "{} is not a mux target",
                format.ext()
            )))?;

        first_max(
            streams
                .iter()
                .filter(|s| s.kind == StreamKind::Video && s.mime_type == mime),
        )
        .ok_or(ConvertError::NoCompatibleStream(StreamGap::MissingVideo))
    }

    /// Highest-bitrate audio-only stream compatible with the mux target
    pub fn best_audio_for_mux(
        streams: &[MediaStream],
        format: OutputFormat,
    ) -> Result<&MediaStream, ConvertError> {
        let mime = format
            .compatible_audio_mime()
            .ok_or_else(|| ConvertError::OperationFailed(format!(
                "{} is not a mux target",
                format.ext()
            )))?;

        first_max(
            streams
                .iter()
                .filter(|s| s.kind == StreamKind::Audio && s.mime_type == mime),
        )
        .ok_or(ConvertError::NoCompatibleStream(StreamGap::MissingAudio))
    }
}

/// First element holding the maximal quality. `Iterator::max_by_key`
/// returns the last maximum, which would make ties depend on list length;
/// folding keeps the earliest one instead.
fn first_max<'a, I>(iter: I) -> Option<&'a MediaStream>
where
    I: Iterator<Item = &'a MediaStream>,
{
    iter.fold(None::<&MediaStream>, |best, s| match best {
        Some(b) if s.quality() > b.quality() => Some(s),
        Some(b) => Some(b),
        None => Some(s),
    })
}
