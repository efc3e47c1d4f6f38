//! Image codec adapter: reading existing tags out of an image buffer and
//! committing staged tags back into it.
//!
//! The [`ImageCodec`] trait is the seam the writer works through; the
//! [`EmbeddedCodec`] default implementation keeps everything in process by
//! combining container handling from `img-parts`, EXIF serialization from
//! `little_exif`, EXIF parsing from `nom-exif`, and XMP packet handling of
//! its own.

pub mod reader;
pub mod writer;

use crate::error::{Result, WriteError};
use crate::tags::TagMap;

/// Image container formats the codec layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    /// Identifies the container from its magic bytes.
    pub fn sniff(content: &[u8]) -> Option<ImageKind> {
        if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if content.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if content.len() >= 12
            && content.starts_with(b"RIFF")
            && &content[8..12] == b"WEBP"
        {
            Some(ImageKind::WebP)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::WebP => "WebP",
        }
    }
}

/// Reads and writes metadata tags for one image buffer.
///
/// The modify methods are all or nothing: implementations must return the
/// fully rewritten buffer or an error, never a partially updated one. The
/// writer relies on that to keep the original bytes when a commit fails.
pub trait ImageCodec: Send + Sync {
    /// Existing EXIF fields as a dotted-path map. Images without EXIF, or
    /// with EXIF too damaged to parse, yield an empty map; only container
    /// level failures are errors.
    fn read_exif(&self, content: &[u8]) -> Result<TagMap>;

    /// Existing XMP properties as a dotted-path map. Containers whose XMP
    /// packets are not handled yield an empty map.
    fn read_xmp(&self, content: &[u8]) -> Result<TagMap>;

    /// Re-encodes `content` with every field in `tags` merged into its EXIF
    /// block.
    fn modify_exif(&self, content: &[u8], tags: &TagMap) -> Result<Vec<u8>>;

    /// Re-encodes `content` with every property in `tags` merged into its
    /// XMP packet.
    fn modify_xmp(&self, content: &[u8], tags: &TagMap) -> Result<Vec<u8>>;
}

/// The in-process codec used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCodec;

impl EmbeddedCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for EmbeddedCodec {
    fn read_exif(&self, content: &[u8]) -> Result<TagMap> {
        let kind = ImageKind::sniff(content).ok_or(WriteError::UnknownFormat)?;
        reader::read_exif_tags(content, kind)
    }

    fn read_xmp(&self, content: &[u8]) -> Result<TagMap> {
        let kind = ImageKind::sniff(content).ok_or(WriteError::UnknownFormat)?;
        if kind == ImageKind::Jpeg {
            reader::read_xmp_tags(content)
        } else {
            // XMP packets are only carried in JPEG APP1 here; other
            // containers read as empty.
            Ok(TagMap::new())
        }
    }

    fn modify_exif(&self, content: &[u8], tags: &TagMap) -> Result<Vec<u8>> {
        let kind = ImageKind::sniff(content).ok_or(WriteError::UnknownFormat)?;
        writer::modify_exif(content, kind, tags)
    }

    fn modify_xmp(&self, content: &[u8], tags: &TagMap) -> Result<Vec<u8>> {
        let kind = ImageKind::sniff(content).ok_or(WriteError::UnknownFormat)?;
        writer::modify_xmp(content, kind, tags)
    }
}
