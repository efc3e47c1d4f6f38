//! Staging a [`PictureMetadata`] record as EXIF/XMP tags and committing them
//! into an image buffer.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};

use crate::codec::{EmbeddedCodec, ImageCodec};
use crate::encode;
use crate::error::Result;
use crate::metadata::{CaptureTime, PictureMetadata, PictureType};
use crate::tags::{TagMap, TagSet};
use crate::timezone::{self, ZoneIndex, ZoneLookup};

/// Stages metadata tags for one image and commits them in a single pass.
///
/// The writer holds the image bytes for its whole lifetime. Tags accumulate
/// in a staging set, through [`write_metadata`](Writer::write_metadata) or
/// the individual `add_*` methods, and nothing touches the image until
/// [`apply`](Writer::apply) re-encodes it. A failed commit leaves the bytes
/// exactly as they were, so the writer can always hand back a usable image.
///
/// # Example
///
/// ```rust
/// use geostamp::metadata::PictureMetadata;
/// use geostamp::writer::Writer;
///
/// let record = PictureMetadata {
///     latitude: Some(48.777),
///     longitude: Some(2.517),
///     ..Default::default()
/// };
/// let mut writer = Writer::new(vec![0xFF, 0xD8, 0xFF]);
/// writer.write_metadata(&record);
/// assert!(writer.staged().exif.contains_key("Exif.GPSInfo.GPSLatitude"));
/// ```
pub struct Writer {
    content: Vec<u8>,
    staged: TagSet,
    codec: Box<dyn ImageCodec>,
    zones: Box<dyn ZoneLookup>,
}

impl Writer {
    /// Wraps an image buffer, using the in-process codec and the embedded
    /// timezone index. The buffer is not inspected until tags reference it.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            staged: TagSet::new(),
            codec: Box::new(EmbeddedCodec::new()),
            zones: Box::new(ZoneIndex::new()),
        }
    }

    /// Replaces the codec the writer reads and re-encodes images with.
    pub fn with_codec(mut self, codec: impl ImageCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replaces the coordinate-to-timezone lookup used for localization.
    pub fn with_zone_lookup(mut self, zones: impl ZoneLookup + 'static) -> Self {
        self.zones = Box::new(zones);
        self
    }

    /// Stages every tag implied by the populated fields of `metadata`.
    ///
    /// A record with none of capture time, longitude, latitude, or picture
    /// type set is treated as carrying nothing to write: the call stages no
    /// tags at all, even when auxiliary fields (artist, camera, orientation)
    /// are populated.
    pub fn write_metadata(&mut self, metadata: &PictureMetadata) {
        if metadata.capture_time.is_none()
            && metadata.longitude.is_none()
            && metadata.latitude.is_none()
            && metadata.picture_type.is_none()
        {
            log::debug!("no capture time, position, or picture type on the record; nothing staged");
            return;
        }

        self.add_capture_time(metadata);
        self.add_lat_lon(metadata);
        self.add_altitude(metadata);
        self.add_direction(metadata);
        self.add_img_projection(metadata);
        self.add_artist(metadata);
        self.add_camera_make(metadata);
        self.add_camera_model(metadata);
        self.add_orientation(metadata);
        log::debug!(
            "staged {} EXIF tags and {} XMP properties",
            self.staged.exif.len(),
            self.staged.xmp.len()
        );
    }

    /// Stages the capture timestamp tags: `DateTimeOriginal` (local wall
    /// clock), `OffsetTimeOriginal` when a UTC offset is known,
    /// `SubSecTimeOriginal` for non-zero fractional seconds, and the UTC
    /// `GPSDateStamp`/`GPSTimeStamp` pair.
    ///
    /// Naive timestamps are localized against the picture's position first;
    /// when no timezone can be resolved they are stamped as given, without
    /// an offset tag, and the GPS stamps read them as already being UTC.
    pub fn add_capture_time(&mut self, metadata: &PictureMetadata) {
        let Some(capture_time) = metadata.capture_time else {
            return;
        };
        let localized = match capture_time {
            CaptureTime::Zoned(_) => capture_time,
            CaptureTime::Naive(naive) => match self.localize(naive, metadata) {
                Some(zoned) => CaptureTime::from(zoned),
                None => capture_time,
            },
        };

        let local = localized.naive_local();
        self.staged.set_exif(
            "Exif.Photo.DateTimeOriginal",
            local.format("%Y:%m:%d %H:%M:%S").to_string(),
        );
        if let Some(offset) = localized.offset() {
            self.staged
                .set_exif("Exif.Photo.OffsetTimeOriginal", encode::utc_offset_string(offset));
        }
        let micros = local.nanosecond() / 1_000;
        if micros != 0 {
            self.staged.set_exif("Exif.Photo.SubSecTimeOriginal", format!("{micros:06}"));
        }

        let utc = localized.utc();
        self.staged
            .set_exif("Exif.GPSInfo.GPSDateStamp", utc.format("%Y:%m:%d").to_string());
        self.staged
            .set_exif("Exif.GPSInfo.GPSTimeStamp", utc.format("%H/1 %M/1 %S/1").to_string());
    }

    /// Stages the GPS position as `GPSLatitude`/`GPSLongitude` DMS rationals
    /// with their hemisphere references. Zero is north/east; a record with
    /// only one of the two coordinates stages neither.
    pub fn add_lat_lon(&mut self, metadata: &PictureMetadata) {
        let (Some(latitude), Some(longitude)) = (metadata.latitude, metadata.longitude) else {
            if metadata.latitude.is_some() || metadata.longitude.is_some() {
                log::debug!("only one of latitude/longitude is set; skipping GPS position");
            }
            return;
        };

        self.staged
            .set_exif("Exif.GPSInfo.GPSLatitudeRef", if latitude >= 0.0 { "N" } else { "S" });
        self.staged
            .set_exif("Exif.GPSInfo.GPSLatitude", encode::dms_rational_string(latitude.abs()));
        self.staged
            .set_exif("Exif.GPSInfo.GPSLongitudeRef", if longitude >= 0.0 { "E" } else { "W" });
        self.staged
            .set_exif("Exif.GPSInfo.GPSLongitude", encode::dms_rational_string(longitude.abs()));
    }

    /// Stages the altitude as a millimeter-precision `GPSAltitude` rational
    /// with the above/below sea level flag in `GPSAltitudeRef`.
    pub fn add_altitude(&mut self, metadata: &PictureMetadata) {
        let Some(altitude) = metadata.altitude else {
            return;
        };
        let (rational, below_sea_level) = encode::signed_rational(altitude, 1000);
        self.staged.set_exif("Exif.GPSInfo.GPSAltitude", rational);
        self.staged
            .set_exif("Exif.GPSInfo.GPSAltitudeRef", u16::from(below_sea_level));
    }

    /// Stages the camera bearing as `GPSImgDirection` (millidegrees,
    /// normalized into `[0, 360)`) with a true-north `GPSImgDirectionRef`.
    pub fn add_direction(&mut self, metadata: &PictureMetadata) {
        let Some(direction) = metadata.direction else {
            return;
        };
        self.staged
            .set_exif("Exif.GPSInfo.GPSImgDirection", encode::direction_rational(direction));
        self.staged.set_exif("Exif.GPSInfo.GPSImgDirectionRef", "T");
    }

    /// Stages the GPano projection properties for non-flat pictures. Flat
    /// pictures stage nothing: absence of a projection is how viewers read
    /// "ordinary photo".
    pub fn add_img_projection(&mut self, metadata: &PictureMetadata) {
        let Some(picture_type) = metadata.picture_type else {
            return;
        };
        if picture_type != PictureType::Flat {
            self.staged.set_xmp("Xmp.GPano.ProjectionType", picture_type.as_str());
            self.staged.set_xmp("Xmp.GPano.UsePanoramaViewer", true);
        }
    }

    /// Stages the image author in the `Artist` tag, escaped to ASCII.
    pub fn add_artist(&mut self, metadata: &PictureMetadata) {
        if let Some(artist) = &metadata.artist {
            self.staged.set_exif("Exif.Image.Artist", encode::escape_ascii(artist));
        }
    }

    /// Stages the camera manufacturer in the `Make` tag, escaped to ASCII.
    pub fn add_camera_make(&mut self, metadata: &PictureMetadata) {
        if let Some(make) = &metadata.camera_make {
            self.staged.set_exif("Exif.Image.Make", encode::escape_ascii(make));
        }
    }

    /// Stages the camera model in the `Model` tag, escaped to ASCII.
    pub fn add_camera_model(&mut self, metadata: &PictureMetadata) {
        if let Some(model) = &metadata.camera_model {
            self.staged.set_exif("Exif.Image.Model", encode::escape_ascii(model));
        }
    }

    /// Stages the EXIF orientation value.
    pub fn add_orientation(&mut self, metadata: &PictureMetadata) {
        if let Some(orientation) = metadata.orientation {
            self.staged.set_exif("Exif.Image.Orientation", orientation);
        }
    }

    /// The tags staged so far, split into EXIF and XMP destinations.
    pub fn staged(&self) -> &TagSet {
        &self.staged
    }

    /// Commits every staged tag into the held buffer, all or nothing.
    ///
    /// On success the buffer is replaced with the re-encoded image and the
    /// staging set is drained. On failure the buffer and the staged tags are
    /// both left as they were, and the failure is logged together with
    /// everything that was pending.
    pub fn apply(&mut self) -> Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        match self.commit() {
            Ok(content) => {
                self.content = content;
                self.staged = TagSet::new();
                Ok(())
            }
            Err(err) => {
                log::warn!(
                    "commit failed, image left untouched: {err} (exif: {:?}, xmp: {:?})",
                    self.staged.exif,
                    self.staged.xmp
                );
                Err(err)
            }
        }
    }

    /// The image bytes: the original buffer until a commit succeeds, the
    /// re-encoded image afterwards.
    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    /// Consumes the writer and returns the image bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.content
    }

    fn commit(&self) -> Result<Vec<u8>> {
        let mut output = None;
        if !self.staged.exif.is_empty() {
            output = Some(self.codec.modify_exif(&self.content, &self.staged.exif)?);
        }
        if !self.staged.xmp.is_empty() {
            let source = output.as_deref().unwrap_or(&self.content);
            output = Some(self.codec.modify_xmp(source, &self.staged.xmp)?);
        }
        Ok(output.unwrap_or_else(|| self.content.clone()))
    }

    /// Anchors a naive timestamp in the timezone of the picture.
    ///
    /// Coordinates come from the record when it carries a full position, and
    /// from the GPS tags already embedded in the image otherwise. Missing
    /// coordinates, an unresolvable zone, or a local time with no valid
    /// mapping (DST gap) all leave the timestamp naive.
    fn localize(
        &self,
        naive: NaiveDateTime,
        metadata: &PictureMetadata,
    ) -> Option<DateTime<FixedOffset>> {
        let (latitude, longitude) = self.coordinates(metadata)?;
        let Some(zone) = self.zones.zone_at(latitude, longitude) else {
            log::debug!("no timezone known at ({latitude}, {longitude}); keeping timestamp naive");
            return None;
        };
        let localized = timezone::localize(naive, zone);
        if localized.is_none() {
            log::debug!("{naive} does not exist in {zone}; keeping timestamp naive");
        }
        localized
    }

    /// The position to localize against: the record's own coordinates when
    /// both are present, else the image's embedded GPS tags.
    fn coordinates(&self, metadata: &PictureMetadata) -> Option<(f64, f64)> {
        if let (Some(latitude), Some(longitude)) = (metadata.latitude, metadata.longitude) {
            return Some((latitude, longitude));
        }
        let exif = match self.codec.read_exif(&self.content) {
            Ok(exif) => exif,
            Err(err) => {
                log::debug!("cannot read embedded EXIF for localization: {err}");
                return None;
            }
        };
        let latitude = signed_coordinate(
            &exif,
            "Exif.GPSInfo.GPSLatitude",
            "Exif.GPSInfo.GPSLatitudeRef",
            "N",
        )?;
        let longitude = signed_coordinate(
            &exif,
            "Exif.GPSInfo.GPSLongitude",
            "Exif.GPSInfo.GPSLongitudeRef",
            "E",
        )?;
        Some((latitude, longitude))
    }
}

/// Decodes one embedded DMS coordinate, negated when its reference letter is
/// not the positive hemisphere. A missing reference reads as positive.
fn signed_coordinate(exif: &TagMap, tag: &str, ref_tag: &str, positive: &str) -> Option<f64> {
    let value = exif.get(tag)?;
    let decoded = match encode::dms_to_decimal(&value.to_string()) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::debug!("unusable {tag} in embedded EXIF: {err}");
            return None;
        }
    };
    let negative = exif
        .get(ref_tag)
        .is_some_and(|reference| reference.to_string() != positive);
    Some(if negative { -decoded } else { decoded })
}

/// Stamps `metadata` into a copy of `content` and returns the new buffer.
///
/// The one-call surface over [`Writer`]: anything that prevents the commit
/// (unrecognized container, corrupt EXIF, oversized XMP packet) is logged
/// and the original bytes come back unchanged, so the result is always a
/// usable image.
///
/// # Example
///
/// ```rust
/// use geostamp::metadata::PictureMetadata;
/// use geostamp::writer::write_picture_metadata;
///
/// // an empty record stages nothing and hands the buffer back untouched
/// let original = vec![0xFF, 0xD8, 0xFF];
/// let stamped = write_picture_metadata(original.clone(), &PictureMetadata::default());
/// assert_eq!(stamped, original);
/// ```
pub fn write_picture_metadata(content: impl Into<Vec<u8>>, metadata: &PictureMetadata) -> Vec<u8> {
    let mut writer = Writer::new(content);
    writer.write_metadata(metadata);
    // a failed commit is logged by apply; the writer still holds the
    // original bytes
    let _ = writer.apply();
    writer.into_bytes()
}
