// FormatResolver - download orchestration
//
// One produce() call is one sequential pipeline: resolve catalog, select
// stream(s), download, remux when the target container requires it, and
// clean up every intermediate. All failures are recovered here and
// translated into a DownloadResult; nothing escapes to the caller as an
// Err.

use std::path::{Path, PathBuf};

use super::errors::ConvertError;
use super::models::{
    CatalogConfig, CatalogSnapshot, DownloadResult, MediaStream, OutputFormat, OutputRequest,
};
use super::select::StreamSelector;
use super::traits::{Remuxer, StreamCatalog, StreamFetcher};
use super::utils::{remove_quiet, sanitize_title};

pub struct FormatResolver {
    catalog: Box<dyn StreamCatalog>,
    fetcher: Box<dyn StreamFetcher>,
    remuxer: Box<dyn Remuxer>,
    config: CatalogConfig,
}

impl FormatResolver {
    pub fn new(
        catalog: Box<dyn StreamCatalog>,
        fetcher: Box<dyn StreamFetcher>,
        remuxer: Box<dyn Remuxer>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            remuxer,
            config,
        }
    }

    /// Run one request to completion. Never returns Err: every failure is
    /// logged with its detail and collapsed into a failure result whose
    /// kind preserves the distinction (missing audio vs missing video
    /// included).
    pub async fn produce(&self, request: OutputRequest) -> DownloadResult {
        eprintln!(
            "[Resolver] {} -> {} in {}",
            request.source.id,
            request.format.ext(),
            request.output_dir.display()
        );

        match self.run(&request).await {
            Ok(path) => {
                eprintln!("[Resolver] Done: {}", path.display());
                DownloadResult::ok(path)
            }
            Err(e) => {
                eprintln!("[Resolver] Failed: {}", e);
                DownloadResult::failed(e.kind())
            }
        }
    }

    async fn run(&self, request: &OutputRequest) -> Result<PathBuf, ConvertError> {
        let snapshot = self.catalog.resolve(&request.source, &self.config).await?;

        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| {
                ConvertError::OperationFailed(format!(
                    "Cannot create {}: {}",
                    request.output_dir.display(),
                    e
                ))
            })?;

        let title = sanitize_title(&snapshot.title);

        if request.format.requires_mux() {
            self.produce_muxed(&snapshot, &title, request.format, &request.output_dir)
                .await
        } else {
            self.produce_direct(&snapshot, &title, request.format, &request.output_dir)
                .await
        }
    }

    /// Direct path: one combined stream. Downloaded straight to the final
    /// path when its container already matches the target, otherwise
    /// repackaged by codec copy — ffmpeg's exit status is the
    /// codec/container compatibility check, so an impossible relabel
    /// fails instead of producing a mislabeled file.
    async fn produce_direct(
        &self,
        snapshot: &CatalogSnapshot,
        title: &str,
        format: OutputFormat,
        dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        let stream = StreamSelector::best_combined(&snapshot.streams)?;
        let final_path = dir.join(format!("{}.{}", title, format.ext()));

        if stream.container == format.ext() {
            self.fetch_or_clean(stream, &final_path).await?;
            return Ok(final_path);
        }

        let intermediate = dir.join(format!("{}.source.{}", title, stream.container));
        self.fetch_or_clean(stream, &intermediate).await?;

        let remuxed = self
            .remuxer
            .repackage(&intermediate, &final_path, format)
            .await;
        remove_quiet(&intermediate).await;
        if let Err(e) = remuxed {
            remove_quiet(&final_path).await;
            return Err(e);
        }

        Ok(final_path)
    }

    /// Mux path (legacy containers): separate video-only and audio-only
    /// downloads merged with explicit stream mapping. Both selections
    /// happen before any byte is transferred; both intermediates are
    /// deleted whether or not the merge succeeds.
    async fn produce_muxed(
        &self,
        snapshot: &CatalogSnapshot,
        title: &str,
        format: OutputFormat,
        dir: &Path,
    ) -> Result<PathBuf, ConvertError> {
        let video = StreamSelector::best_video_for_mux(&snapshot.streams, format)?;
        let audio = StreamSelector::best_audio_for_mux(&snapshot.streams, format)?;

        let final_path = dir.join(format!("{}.{}", title, format.ext()));
        let video_path = dir.join(format!("{}.video.{}", title, video.container));
        let audio_path = dir.join(format!("{}.audio.{}", title, audio.container));

        self.fetch_or_clean(video, &video_path).await?;

        if let Err(e) = self.fetch_or_clean(audio, &audio_path).await {
            remove_quiet(&video_path).await;
            return Err(e);
        }

        let merged = self.remuxer.merge(&video_path, &audio_path, &final_path).await;
        remove_quiet(&video_path).await;
        remove_quiet(&audio_path).await;
        if let Err(e) = merged {
            remove_quiet(&final_path).await;
            return Err(e);
        }

        Ok(final_path)
    }

    /// Fetch one stream; a failed transfer removes the partial file
    async fn fetch_or_clean(
        &self,
        stream: &MediaStream,
        dest: &Path,
    ) -> Result<(), ConvertError> {
        if let Err(e) = self.fetcher.fetch(stream, dest).await {
            remove_quiet(dest).await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::tempdir;

    use super::*;
    use crate::converter::errors::ErrorKind;
    use crate::converter::models::{SourceReference, StreamKind};

    fn source() -> SourceReference {
        SourceReference::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap()
    }

    fn combined(id: &str, height: u32, container: &str) -> MediaStream {
        MediaStream {
            id: id.to_string(),
            kind: StreamKind::Combined,
            container: container.to_string(),
            mime_type: format!("video/{}", container),
            height: Some(height),
            audio_bitrate: Some(96.0),
            url: format!("http://x/{}", id),
            filesize: None,
        }
    }

    fn video_3gp(id: &str, height: u32) -> MediaStream {
        MediaStream {
            id: id.to_string(),
            kind: StreamKind::Video,
            container: "3gp".to_string(),
            mime_type: "video/3gpp".to_string(),
            height: Some(height),
            audio_bitrate: None,
            url: format!("http://x/{}", id),
            filesize: None,
        }
    }

    fn audio_3gp(id: &str, abr: f32) -> MediaStream {
        MediaStream {
            id: id.to_string(),
            kind: StreamKind::Audio,
            container: "3gp".to_string(),
            mime_type: "audio/3gpp".to_string(),
            height: None,
            audio_bitrate: Some(abr),
            url: format!("http://x/{}", id),
            filesize: None,
        }
    }

    /// Fixed snapshot, no network
    struct FixedCatalog {
        title: String,
        streams: Vec<MediaStream>,
    }

    #[async_trait]
    impl StreamCatalog for FixedCatalog {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn is_available(&self) -> bool {
            true
        }
        async fn resolve(
            &self,
            source: &SourceReference,
            _config: &CatalogConfig,
        ) -> Result<CatalogSnapshot, ConvertError> {
            Ok(CatalogSnapshot {
                id: source.id.clone(),
                title: self.title.clone(),
                streams: self.streams.clone(),
            })
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl StreamCatalog for FailingCatalog {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn is_available(&self) -> bool {
            true
        }
        async fn resolve(
            &self,
            _source: &SourceReference,
            _config: &CatalogConfig,
        ) -> Result<CatalogSnapshot, ConvertError> {
            Err(ConvertError::Resolution("video unavailable".to_string()))
        }
    }

    /// Writes a marker file and records which stream ids were fetched
    struct RecordingFetcher {
        fetched: Arc<Mutex<Vec<String>>>,
        /// Fail (after creating a partial file) when the destination
        /// filename contains this marker
        fail_marker: Option<&'static str>,
    }

    impl RecordingFetcher {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let fetched = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    fetched: fetched.clone(),
                    fail_marker: None,
                },
                fetched,
            )
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                fetched: Arc::new(Mutex::new(Vec::new())),
                fail_marker: Some(marker),
            }
        }
    }

    #[async_trait]
    impl StreamFetcher for RecordingFetcher {
        async fn fetch(&self, stream: &MediaStream, dest: &Path) -> Result<(), ConvertError> {
            tokio::fs::write(dest, b"media bytes").await.unwrap();
            self.fetched.lock().unwrap().push(stream.id.clone());
            if let Some(marker) = self.fail_marker {
                if dest.to_string_lossy().contains(marker) {
                    return Err(ConvertError::OperationFailed("transfer died".to_string()));
                }
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum RemuxCall {
        Merge { video: PathBuf, audio: PathBuf },
        Repackage { input: PathBuf },
    }

    /// Writes the output file and records every invocation
    struct RecordingRemuxer {
        calls: Arc<Mutex<Vec<RemuxCall>>>,
        fail: bool,
    }

    impl RecordingRemuxer {
        fn new() -> (Self, Arc<Mutex<Vec<RemuxCall>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    calls: calls.clone(),
                    fail: false,
                },
                calls,
            )
        }

        fn failing() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            }
        }

        async fn finish(&self, output: &Path) -> Result<(), ConvertError> {
            // A real ffmpeg failure can still leave a partial output
            tokio::fs::write(output, b"muxed").await.unwrap();
            if self.fail {
                Err(ConvertError::Remux("ffmpeg exited with 1".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Remuxer for RecordingRemuxer {
        async fn merge(
            &self,
            video: &Path,
            audio: &Path,
            output: &Path,
        ) -> Result<(), ConvertError> {
            self.calls.lock().unwrap().push(RemuxCall::Merge {
                video: video.to_path_buf(),
                audio: audio.to_path_buf(),
            });
            self.finish(output).await
        }

        async fn repackage(
            &self,
            input: &Path,
            output: &Path,
            _format: OutputFormat,
        ) -> Result<(), ConvertError> {
            self.calls.lock().unwrap().push(RemuxCall::Repackage {
                input: input.to_path_buf(),
            });
            self.finish(output).await
        }
    }

    fn scenario_streams() -> Vec<MediaStream> {
        vec![
            combined("c720", 720, "mp4"),
            combined("c1080", 1080, "mp4"),
            video_3gp("v1080", 1080),
            audio_3gp("a128", 128.0),
        ]
    }

    fn resolver(
        catalog: impl StreamCatalog + 'static,
        fetcher: impl StreamFetcher + 'static,
        remuxer: impl Remuxer + 'static,
    ) -> FormatResolver {
        FormatResolver::new(
            Box::new(catalog),
            Box::new(fetcher),
            Box::new(remuxer),
            CatalogConfig::default(),
        )
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn mp4_picks_best_combined_and_skips_remux() {
        let dir = tempdir().unwrap();
        let (fetcher, fetched) = RecordingFetcher::new();
        let (remuxer, calls) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: scenario_streams(),
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Mp4)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(result.success);
        assert_eq!(
            result.output_path.as_deref(),
            Some(dir.path().join("Test Video.mp4").as_path())
        );
        assert!(dir.path().join("Test Video.mp4").exists());
        assert_eq!(*fetched.lock().unwrap(), vec!["c1080".to_string()]);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(dir_entries(dir.path()), vec!["Test Video.mp4"]);
    }

    #[tokio::test]
    async fn threegp_muxes_and_removes_both_intermediates() {
        let dir = tempdir().unwrap();
        let (fetcher, fetched) = RecordingFetcher::new();
        let (remuxer, calls) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: scenario_streams(),
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Threegp)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(result.success);
        assert_eq!(
            *fetched.lock().unwrap(),
            vec!["v1080".to_string(), "a128".to_string()]
        );
        assert_eq!(
            *calls.lock().unwrap(),
            vec![RemuxCall::Merge {
                video: dir.path().join("Test Video.video.3gp"),
                audio: dir.path().join("Test Video.audio.3gp"),
            }]
        );
        // Final file only; both intermediates are gone
        assert_eq!(dir_entries(dir.path()), vec!["Test Video.3gp"]);
    }

    #[tokio::test]
    async fn threegp_without_audio_fails_before_any_download() {
        let dir = tempdir().unwrap();
        let (fetcher, fetched) = RecordingFetcher::new();
        let (remuxer, _) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: vec![combined("c", 1080, "mp4"), video_3gp("v", 1080)],
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Threegp)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::MissingAudio));
        assert!(result.output_path.is_none());
        assert!(fetched.lock().unwrap().is_empty());
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn threegp_without_video_fails_distinctly() {
        let dir = tempdir().unwrap();
        let (fetcher, _) = RecordingFetcher::new();
        let (remuxer, _) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: vec![combined("c", 1080, "mp4"), audio_3gp("a", 128.0)],
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Threegp)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::MissingVideo));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn mp4_without_combined_stream_reports_no_combined() {
        let dir = tempdir().unwrap();
        let (fetcher, _) = RecordingFetcher::new();
        let (remuxer, _) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: vec![video_3gp("v", 1080), audio_3gp("a", 128.0)],
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Mp4)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::NoCombinedStream));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn failed_audio_fetch_cleans_video_intermediate() {
        let dir = tempdir().unwrap();
        let (remuxer, calls) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: scenario_streams(),
            },
            RecordingFetcher::failing_on(".audio."),
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Threegp)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::OperationFailed));
        assert!(calls.lock().unwrap().is_empty());
        // Neither the partial audio file nor the video intermediate survive
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn failed_direct_fetch_leaves_no_partial_output() {
        let dir = tempdir().unwrap();
        let (remuxer, _) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: scenario_streams(),
            },
            RecordingFetcher::failing_on(".mp4"),
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Mp4)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn mkv_over_mp4_stream_repackages_and_cleans_source() {
        let dir = tempdir().unwrap();
        let (fetcher, _) = RecordingFetcher::new();
        let (remuxer, calls) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: scenario_streams(),
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Mkv)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(result.success);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![RemuxCall::Repackage {
                input: dir.path().join("Test Video.source.mp4"),
            }]
        );
        assert_eq!(dir_entries(dir.path()), vec!["Test Video.mkv"]);
    }

    #[tokio::test]
    async fn remux_failure_removes_intermediates_and_partial_output() {
        let dir = tempdir().unwrap();
        let (fetcher, _) = RecordingFetcher::new();
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: scenario_streams(),
            },
            fetcher,
            RecordingRemuxer::failing(),
        );

        let request = OutputRequest::new(source(), OutputFormat::Threegp)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::Remux));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn resolution_failure_surfaces_as_resolution_kind() {
        let dir = tempdir().unwrap();
        let (fetcher, _) = RecordingFetcher::new();
        let (remuxer, _) = RecordingRemuxer::new();
        let r = resolver(FailingCatalog, fetcher, remuxer);

        let request = OutputRequest::new(source(), OutputFormat::Mp4)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::Resolution));
    }

    #[tokio::test]
    async fn repeated_requests_select_the_same_streams() {
        let dir = tempdir().unwrap();
        let (fetcher, fetched) = RecordingFetcher::new();
        let (remuxer, _) = RecordingRemuxer::new();
        // Two combined streams tied at 1080p: catalog order must decide
        let r = resolver(
            FixedCatalog {
                title: "Test Video".to_string(),
                streams: vec![combined("tie-a", 1080, "mp4"), combined("tie-b", 1080, "mp4")],
            },
            fetcher,
            remuxer,
        );

        for _ in 0..3 {
            let request = OutputRequest::new(source(), OutputFormat::Mp4)
                .with_output_dir(dir.path().to_path_buf());
            assert!(r.produce(request).await.success);
        }

        assert_eq!(
            *fetched.lock().unwrap(),
            vec!["tie-a".to_string(), "tie-a".to_string(), "tie-a".to_string()]
        );
    }

    #[tokio::test]
    async fn title_is_sanitized_for_the_filesystem() {
        let dir = tempdir().unwrap();
        let (fetcher, _) = RecordingFetcher::new();
        let (remuxer, _) = RecordingRemuxer::new();
        let r = resolver(
            FixedCatalog {
                title: "AC/DC: Live?".to_string(),
                streams: scenario_streams(),
            },
            fetcher,
            remuxer,
        );

        let request = OutputRequest::new(source(), OutputFormat::Mp4)
            .with_output_dir(dir.path().to_path_buf());
        let result = r.produce(request).await;

        assert!(result.success);
        assert_eq!(dir_entries(dir.path()), vec!["AC DC Live.mp4"]);
    }
}
