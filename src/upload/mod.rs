pub mod backoff;
pub mod error;
pub mod finalize;
pub mod http;
pub mod sink;

pub use backoff::BackoffSink;
pub use error::{UploadError, UploadResult};
pub use finalize::{
    mime_from_filename, FinalizeRequest, Finalizer, FinishedMedia, InputFile, InputFileFinalizer,
    MediaKind,
};
pub use http::HttpUploadSink;
pub use sink::{upload_chunk, SizeClass, UploadSink, DEFAULT_SMALL_FILE_THRESHOLD};
