// Conversion pipeline: catalog resolution, stream selection, download,
// and optional remux into the requested container.

pub mod catalog;
pub mod errors;
pub mod fetch;
pub mod models;
pub mod remux;
pub mod resolver;
pub mod select;
pub mod traits;
pub mod utils;

pub use catalog::YtDlpCatalog;
pub use errors::{ConvertError, ErrorKind, StreamGap};
pub use fetch::HttpFetcher;
pub use models::{
    CatalogConfig, CatalogSnapshot, DownloadResult, MediaStream, OutputFormat, OutputRequest,
    SourceReference, StreamKind,
};
pub use remux::FfmpegRemuxer;
pub use resolver::FormatResolver;
pub use select::StreamSelector;
pub use traits::{Remuxer, StreamCatalog, StreamFetcher};
