// Trait seams between the resolver and its collaborators

use std::path::Path;

use async_trait::async_trait;

use super::errors::ConvertError;
use super::models::{CatalogConfig, CatalogSnapshot, MediaStream, OutputFormat, SourceReference};

/// Resolves a source reference into the set of streams the service offers
#[async_trait]
pub trait StreamCatalog: Send + Sync {
    /// Name of the catalog implementation (for logging)
    fn name(&self) -> &'static str;

    /// Check if this catalog's backing tool is usable
    fn is_available(&self) -> bool;

    /// Query the service for every available stream of `source`
    async fn resolve(
        &self,
        source: &SourceReference,
        config: &CatalogConfig,
    ) -> Result<CatalogSnapshot, ConvertError>;
}

/// Retrieves the bytes of one stream to a local path
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(&self, stream: &MediaStream, dest: &Path) -> Result<(), ConvertError>;
}

/// Repackages existing tracks into a new container without re-encoding
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Merge a video-only and an audio-only file into one container,
    /// mapping video from the first input and audio from the second.
    async fn merge(&self, video: &Path, audio: &Path, output: &Path)
        -> Result<(), ConvertError>;

    /// Codec-copy a single input into the target container. Audio-only
    /// targets drop the video track; nothing is re-encoded, so an
    /// incompatible codec/container pair fails here instead of being
    /// mislabeled.
    async fn repackage(
        &self,
        input: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<(), ConvertError>;
}
