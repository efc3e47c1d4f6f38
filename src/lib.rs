//! # geostamp
//!
//! Binary EXIF/XMP metadata writer: stamp GPS positions, timezone-aware
//! capture times, altitude, bearing, and panorama projection tags into image
//! buffers without touching the pixel data.
//!
//! The crate works on byte buffers end to end. Give it an encoded image and a
//! [`PictureMetadata`](metadata::PictureMetadata) record and it returns a new
//! buffer with every populated field encoded as a binary EXIF tag (plus GPano
//! XMP properties for panoramas). Decimal coordinates become
//! degrees/minutes/seconds rationals, and naive timestamps are localized
//! against the picture's position through an embedded timezone index. A
//! commit that fails for any reason hands back the original bytes unchanged.
//!
//! ## Quick Start
//!
//! The one-call surface is [`writer::write_picture_metadata`], which stages
//! every populated field of the record and commits in a single pass:
//!
//! ```rust,no_run
//! use geostamp::metadata::PictureMetadata;
//! use geostamp::writer::write_picture_metadata;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // records typically arrive as API payloads
//!     let record: PictureMetadata = serde_json::from_str(
//!         r#"{
//!             "capture_time": "2021-06-01T10:00:00",
//!             "latitude": 48.777,
//!             "longitude": 2.517,
//!             "altitude": 120.4,
//!             "picture_type": "equirectangular"
//!         }"#,
//!     )?;
//!
//!     let content = std::fs::read("photo.jpg")?;
//!     let stamped = write_picture_metadata(content, &record);
//!     std::fs::write("photo.jpg", stamped)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! For more control, drive a [`writer::Writer`] directly: stage fields,
//! inspect what would be written, then commit explicitly:
//!
//! ```rust,no_run
//! use geostamp::metadata::{PictureMetadata, PictureType};
//! use geostamp::writer::Writer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let record = PictureMetadata {
//!         latitude: Some(-33.45),
//!         longitude: Some(-70.66),
//!         direction: Some(15.0),
//!         picture_type: Some(PictureType::Equirectangular),
//!         ..Default::default()
//!     };
//!
//!     let mut writer = Writer::new(std::fs::read("pano.jpg")?);
//!     writer.write_metadata(&record);
//!
//!     // staged tags are inspectable before anything touches the image
//!     for (tag, value) in &writer.staged().exif {
//!         println!("{tag} = {value}");
//!     }
//!
//!     writer.apply()?;
//!     std::fs::write("pano.jpg", writer.into_bytes())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Write Strategy |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF APP1 segment + XMP APP1 packet |
//! | PNG (`.png`) | EXIF in `eXIf` chunk (no XMP) |
//! | WebP (`.webp`) | EXIF in RIFF `EXIF` chunk (no XMP) |
//!
//! ## Modules
//!
//! - [`codec`] — container sniffing and the embedded EXIF/XMP codec
//! - [`encode`] — rational, timestamp, and ASCII tag-value encoders
//! - [`error`] — the [`WriteError`](error::WriteError) failure type
//! - [`metadata`] — the picture metadata record and capture-time types
//! - [`tags`] — staged tag values and the EXIF/XMP tag maps
//! - [`timezone`] — coordinate-to-timezone lookup and localization
//! - [`writer`] — the staging writer and the one-call entry point

pub mod codec;
pub mod encode;
pub mod error;
pub mod metadata;
pub mod tags;
pub mod timezone;
pub mod writer;
