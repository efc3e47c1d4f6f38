//! Reading existing EXIF and XMP metadata out of image buffers.

use std::io::Cursor;

use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF};
use nom_exif::{EntryValue, Exif, ExifIter, ExifTag, LatLng, MediaParser, MediaSource};
use quick_xml::Reader;
use quick_xml::events::Event;

use super::ImageKind;
use super::writer::{APP1_MARKER, XMP_HEADER};
use crate::error::{Result, WriteError};
use crate::tags::{TagMap, TagValue};

// IFD0 tag IDs nom-exif has no named variant for
const TAG_ARTIST: u16 = 0x013B;

/// Existing EXIF tags as a dotted-path map.
///
/// An image without an EXIF segment yields an empty map. A segment that is
/// present but unparseable also yields an empty map (logged at debug level):
/// on the read side corrupt metadata means the values are unavailable, not
/// that the caller did anything wrong.
pub fn read_exif_tags(content: &[u8], kind: ImageKind) -> Result<TagMap> {
    let mut map = TagMap::new();
    if extract_tiff(content, kind)?.is_none() {
        return Ok(map);
    }

    let mut parser = MediaParser::new();
    let ms = match MediaSource::seekable(Cursor::new(content.to_vec())) {
        Ok(ms) => ms,
        Err(e) => {
            log::debug!("{} buffer not recognized by the EXIF parser: {e}", kind.name());
            return Ok(map);
        }
    };
    if !ms.has_exif() {
        return Ok(map);
    }
    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(e) => {
            log::debug!("EXIF segment could not be parsed: {e}");
            return Ok(map);
        }
    };

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps_info = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let named = [
        (ExifTag::Make, "Exif.Image.Make"),
        (ExifTag::Model, "Exif.Image.Model"),
        (ExifTag::Orientation, "Exif.Image.Orientation"),
        (ExifTag::ImageDescription, "Exif.Image.ImageDescription"),
        (ExifTag::DateTimeOriginal, "Exif.Photo.DateTimeOriginal"),
        (ExifTag::OffsetTimeOriginal, "Exif.Photo.OffsetTimeOriginal"),
        (ExifTag::SubSecTimeOriginal, "Exif.Photo.SubSecTimeOriginal"),
        (ExifTag::UserComment, "Exif.Photo.UserComment"),
    ];
    for (tag, path) in named {
        if let Some(text) = exif.get(tag).and_then(entry_to_string) {
            map.insert(path.to_string(), TagValue::Text(text));
        }
    }
    if let Some(text) = exif.get_by_ifd_tag_code(0, TAG_ARTIST).and_then(entry_to_string) {
        map.insert("Exif.Image.Artist".to_string(), TagValue::Text(text));
    }

    if let Some(gps) = gps_info {
        map.insert(
            "Exif.GPSInfo.GPSLatitudeRef".to_string(),
            TagValue::Text(gps.latitude_ref.to_string()),
        );
        map.insert(
            "Exif.GPSInfo.GPSLatitude".to_string(),
            TagValue::Text(latlng_rational_string(&gps.latitude)),
        );
        map.insert(
            "Exif.GPSInfo.GPSLongitudeRef".to_string(),
            TagValue::Text(gps.longitude_ref.to_string()),
        );
        map.insert(
            "Exif.GPSInfo.GPSLongitude".to_string(),
            TagValue::Text(latlng_rational_string(&gps.longitude)),
        );
        map.insert(
            "Exif.GPSInfo.GPSAltitudeRef".to_string(),
            TagValue::Int(gps.altitude_ref.into()),
        );
        map.insert(
            "Exif.GPSInfo.GPSAltitude".to_string(),
            TagValue::Text(format!("{}/{}", gps.altitude.0, gps.altitude.1)),
        );
    }

    Ok(map)
}

/// XMP properties from a JPEG's XMP APP1 packet as a dotted-path map, e.g.
/// `"Xmp.GPano.ProjectionType"`. Absent packet yields an empty map.
pub fn read_xmp_tags(content: &[u8]) -> Result<TagMap> {
    let mut map = TagMap::new();
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(content)).map_err(|e| {
        WriteError::Container { container: "JPEG", reason: e.to_string() }
    })?;
    if let Some(xml) = find_xmp_packet(&jpeg) {
        parse_xmp_properties(&xml, &mut map)?;
    }
    Ok(map)
}

/// Pulls the raw TIFF payload of the EXIF segment/chunk out of the container.
pub(super) fn extract_tiff(content: &[u8], kind: ImageKind) -> Result<Option<Bytes>> {
    let bytes = Bytes::copy_from_slice(content);
    let container_err =
        |e: img_parts::Error| WriteError::Container { container: kind.name(), reason: e.to_string() };
    let exif = match kind {
        ImageKind::Jpeg => Jpeg::from_bytes(bytes).map_err(container_err)?.exif(),
        ImageKind::Png => Png::from_bytes(bytes).map_err(container_err)?.exif(),
        ImageKind::WebP => WebP::from_bytes(bytes).map_err(container_err)?.exif(),
    };
    Ok(exif)
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Render a nom-exif LatLng (3 URationals: deg, min, sec) in the same
/// space-separated rational form the write side stages.
fn latlng_rational_string(latlng: &LatLng) -> String {
    format!(
        "{}/{} {}/{} {}/{}",
        latlng.0.0, latlng.0.1, latlng.1.0, latlng.1.1, latlng.2.0, latlng.2.1
    )
}

fn find_xmp_packet(jpeg: &Jpeg) -> Option<String> {
    jpeg.segments().iter().find_map(|s| {
        if s.marker() != APP1_MARKER {
            return None;
        }
        let contents = s.contents();
        if !contents.starts_with(XMP_HEADER) {
            return None;
        }
        Some(String::from_utf8_lossy(&contents[XMP_HEADER.len()..]).to_string())
    })
}

/// Walks the packet and collects prefixed properties, in both element form
/// (`<GPano:ProjectionType>equirectangular</GPano:ProjectionType>`) and the
/// attribute form some writers put on `rdf:Description`.
fn parse_xmp_properties(xml: &str, map: &mut TagMap) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    // (element name, dotted path) of the property element currently open
    let mut open: Option<(String, String)> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "rdf:Description" {
                    collect_attribute_properties(&e, map)?;
                } else if open.is_none() {
                    if let Some(path) = property_path(&name) {
                        open = Some((name, path));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "rdf:Description" {
                    collect_attribute_properties(&e, map)?;
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, path)) = &open {
                    let text = t
                        .unescape()
                        .map_err(|e| WriteError::MalformedXmp(e.to_string()))?;
                    let text = text.trim();
                    if !text.is_empty() {
                        map.insert(path.clone(), TagValue::Text(text.to_string()));
                    }
                }
            }
            Ok(Event::End(e)) => {
                if let Some((name, _)) = &open {
                    if e.name().as_ref() == name.as_bytes() {
                        open = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(WriteError::MalformedXmp(e.to_string())),
            _ => {}
        }
    }
    Ok(())
}

fn collect_attribute_properties(e: &quick_xml::events::BytesStart<'_>, map: &mut TagMap) -> Result<()> {
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if let Some(path) = property_path(&key) {
            let value = attr
                .unescape_value()
                .map_err(|e| WriteError::MalformedXmp(e.to_string()))?;
            map.insert(path, TagValue::Text(value.into_owned()));
        }
    }
    Ok(())
}

/// Maps a prefixed XML name to its dotted tag path, skipping structural
/// namespaces.
fn property_path(name: &str) -> Option<String> {
    let (prefix, local) = name.split_once(':')?;
    match prefix {
        "x" | "rdf" | "xml" | "xmlns" => None,
        _ => Some(format!("Xmp.{prefix}.{local}")),
    }
}
