pub mod converter;

pub use converter::{
    CatalogConfig, ConvertError, DownloadResult, ErrorKind, FfmpegRemuxer, FormatResolver,
    HttpFetcher, MediaStream, OutputFormat, OutputRequest, SourceReference, StreamCatalog,
    StreamFetcher, StreamKind, Remuxer, YtDlpCatalog,
};

/// Facade wired with the production catalog, fetcher and remuxer.
///
/// The presentation layer hands in a URL and a format selection and gets
/// back a `DownloadResult`; nothing else crosses the boundary and no
/// state survives a call.
pub struct Converter {
    resolver: FormatResolver,
}

impl Converter {
    pub fn new(config: CatalogConfig) -> Result<Self, ConvertError> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self {
            resolver: FormatResolver::new(
                Box::new(YtDlpCatalog::new()),
                Box::new(fetcher),
                Box::new(FfmpegRemuxer::new()),
                config,
            ),
        })
    }

    /// Download `url` as `format` into the platform download directory
    pub async fn produce(&self, url: &str, format: OutputFormat) -> DownloadResult {
        let source = match SourceReference::parse(url) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("[Converter] {}", e);
                return DownloadResult::failed(e.kind());
            }
        };
        self.resolver
            .produce(OutputRequest::new(source, format))
            .await
    }

    /// Download with a prebuilt request (custom output directory)
    pub async fn produce_request(&self, request: OutputRequest) -> DownloadResult {
        self.resolver.produce(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_fails_without_touching_the_network() {
        let converter = Converter::new(CatalogConfig::default()).unwrap();
        let result = converter.produce("not a url", OutputFormat::Mp4).await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::Resolution));
    }
}
