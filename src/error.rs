use thiserror::Error;

/// Errors surfaced by the metadata writer and its codec layer.
///
/// All of these are recoverable and local to a single image buffer: a failed
/// commit leaves the original bytes untouched, and batch callers are expected
/// to log and move on to the next image.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("unrecognized image container (expected JPEG, PNG, or WebP)")]
    UnknownFormat,

    #[error("failed to parse {container} container: {reason}")]
    Container {
        container: &'static str,
        reason: String,
    },

    #[error("existing EXIF data could not be parsed: {0}")]
    CorruptExif(String),

    #[error("failed to serialize EXIF tags: {0}")]
    ExifEncode(String),

    #[error("XMP writing is not supported for {0} images")]
    XmpUnsupported(&'static str),

    #[error("XMP packet too large for a JPEG APP1 segment ({0} bytes)")]
    XmpTooLarge(usize),

    #[error("malformed XMP packet: {0}")]
    MalformedXmp(String),

    #[error("malformed rational value {0:?}")]
    MalformedRational(String),

    #[error("no tag mapping for {0:?}")]
    UnsupportedTag(String),
}

pub type Result<T> = std::result::Result<T, WriteError>;
