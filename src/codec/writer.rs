//! Committing staged tags into image buffers: EXIF through `little_exif`
//! and `img-parts`, XMP through direct APP1 packet surgery on JPEGs.

use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;

use super::ImageKind;
use crate::encode;
use crate::error::{Result, WriteError};
use crate::tags::{TagMap, TagValue};

pub(crate) const APP1_MARKER: u8 = 0xE1;
pub(crate) const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const EXIF_PREFIX: &[u8] = b"Exif\0\0";

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

// An APP1 payload shares 16 bits with its own 2-byte length field
const MAX_SEGMENT_CONTENTS: usize = 65533;

const GPANO_NS: &str = "http://ns.google.com/photos/1.0/panorama/";

/// Serializes the staged EXIF tags over whatever the image already carries
/// and returns the rewritten buffer. The input buffer is never touched.
pub fn modify_exif(content: &[u8], kind: ImageKind, tags: &TagMap) -> Result<Vec<u8>> {
    let mut metadata = load_metadata(content, kind)?;
    for (path, value) in tags {
        metadata.set_tag(exif_tag_for(path, value)?);
    }

    let exif_bytes = metadata
        .as_u8_vec(FileExtension::JPEG)
        .map_err(|e| WriteError::ExifEncode(format!("{e:?}")))?;
    let tiff = exif_bytes.get(JPEG_EXIF_OVERHEAD..).unwrap_or_default().to_vec();
    if tiff.is_empty() {
        return Err(WriteError::ExifEncode("serializer produced no EXIF payload".to_string()));
    }

    let bytes = Bytes::copy_from_slice(content);
    let container_err =
        |e: img_parts::Error| WriteError::Container { container: kind.name(), reason: e.to_string() };
    match kind {
        ImageKind::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(bytes).map_err(container_err)?;
            let orig_exif_pos = find_exif_segment_pos(jpeg.segments());
            jpeg.set_exif(Some(Bytes::from(tiff)));

            // set_exif() inserts at a fixed index, which can land after an
            // XMP APP1. Move the EXIF segment back up so EXIF comes before
            // XMP (required by many EXIF parsers).
            if let Some(new_pos) = find_exif_segment_pos(jpeg.segments()) {
                let target_pos = orig_exif_pos.unwrap_or(1); // default: right after APP0
                if target_pos < new_pos {
                    let segments = jpeg.segments_mut();
                    let seg = segments.remove(new_pos);
                    segments.insert(target_pos, seg);
                }
            }
            Ok(jpeg.encoder().bytes().to_vec())
        }
        ImageKind::Png => {
            let mut png = Png::from_bytes(bytes).map_err(container_err)?;
            png.set_exif(Some(Bytes::from(tiff)));
            Ok(png.encoder().bytes().to_vec())
        }
        ImageKind::WebP => {
            let mut webp = WebP::from_bytes(bytes).map_err(container_err)?;
            webp.set_exif(Some(Bytes::from(tiff)));
            Ok(webp.encoder().bytes().to_vec())
        }
    }
}

/// Rewrites the XMP APP1 packet with the staged properties, preserving
/// whatever else the packet already declares. Only JPEG carries an XMP
/// segment here; other containers report an unsupported destination.
pub fn modify_xmp(content: &[u8], kind: ImageKind, tags: &TagMap) -> Result<Vec<u8>> {
    if kind != ImageKind::Jpeg {
        return Err(WriteError::XmpUnsupported(kind.name()));
    }
    let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(content)).map_err(|e| {
        WriteError::Container { container: "JPEG", reason: e.to_string() }
    })?;

    let xmp_pos = find_xmp_segment_pos(jpeg.segments());
    let existing_xmp = xmp_pos.map(|pos| {
        let contents = jpeg.segments()[pos].contents();
        String::from_utf8_lossy(&contents[XMP_HEADER.len()..]).to_string()
    });

    let new_xmp = match existing_xmp.as_deref() {
        Some(xml) => inject_into_existing_xmp(xml, tags)?,
        None => build_xmp_packet(tags)?,
    };
    if XMP_HEADER.len() + new_xmp.len() > MAX_SEGMENT_CONTENTS {
        return Err(WriteError::XmpTooLarge(new_xmp.len()));
    }

    let mut contents = Vec::with_capacity(XMP_HEADER.len() + new_xmp.len());
    contents.extend_from_slice(XMP_HEADER);
    contents.extend_from_slice(new_xmp.as_bytes());
    let new_segment = JpegSegment::new_with_contents(APP1_MARKER, Bytes::from(contents));

    let segments = jpeg.segments_mut();
    if let Some(pos) = xmp_pos {
        segments[pos] = new_segment;
    } else {
        // After the EXIF APP1 when there is one, otherwise after the leading
        // APPn run; never past SOS, where parsers stop scanning segments
        let insert_pos = find_exif_segment_pos(segments)
            .map(|p| p + 1)
            .unwrap_or_else(|| leading_app_segments(segments));
        let insert_pos = insert_pos.min(segments.len());
        segments.insert(insert_pos, new_segment);
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

/// Loads existing EXIF from the buffer, or starts fresh when the image has
/// none. EXIF that is present but unparseable is an error on the write path:
/// replacing it wholesale would throw away tags this writer never staged.
fn load_metadata(content: &[u8], kind: ImageKind) -> Result<Metadata> {
    if super::reader::extract_tiff(content, kind)?.is_none() {
        return Ok(Metadata::new());
    }

    // The parser can panic on truncated IFD tables; treat that the same as
    // a parse error so one bad image cannot abort a batch.
    let owned = content.to_vec();
    let extension = file_extension(kind);
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let outcome = std::panic::catch_unwind(move || Metadata::new_from_vec(&owned, extension));
    std::panic::set_hook(prev_hook);

    match outcome {
        Ok(Ok(metadata)) => Ok(metadata),
        Ok(Err(e)) => Err(WriteError::CorruptExif(e.to_string())),
        Err(_) => Err(WriteError::CorruptExif("EXIF parser panicked".to_string())),
    }
}

fn file_extension(kind: ImageKind) -> FileExtension {
    match kind {
        ImageKind::Jpeg => FileExtension::JPEG,
        ImageKind::Png => FileExtension::PNG { as_zTXt_chunk: false },
        ImageKind::WebP => FileExtension::WEBP,
    }
}

/// Find the position of the EXIF APP1 segment in a JPEG.
fn find_exif_segment_pos(segments: &[JpegSegment]) -> Option<usize> {
    segments
        .iter()
        .position(|s| s.marker() == APP1_MARKER && s.contents().starts_with(EXIF_PREFIX))
}

/// Find the position of the XMP APP1 segment in a JPEG.
fn find_xmp_segment_pos(segments: &[JpegSegment]) -> Option<usize> {
    segments
        .iter()
        .position(|s| s.marker() == APP1_MARKER && s.contents().starts_with(XMP_HEADER))
}

/// Length of the run of APPn segments at the front of the segment list.
fn leading_app_segments(segments: &[JpegSegment]) -> usize {
    segments
        .iter()
        .take_while(|s| (0xE0..=0xEF).contains(&s.marker()))
        .count()
}

/// Maps a dotted tag path and staged value onto the typed tag the EXIF
/// serializer expects.
fn exif_tag_for(path: &str, value: &TagValue) -> Result<ExifTag> {
    let text = || -> Result<String> {
        match value {
            TagValue::Text(s) => Ok(s.clone()),
            other => Err(WriteError::UnsupportedTag(format!("{path}={other}"))),
        }
    };
    let int = || -> Result<u16> {
        match value {
            TagValue::Int(n) => Ok(*n),
            other => Err(WriteError::UnsupportedTag(format!("{path}={other}"))),
        }
    };
    let rationals = |expected: usize| -> Result<Vec<uR64>> {
        let s = text()?;
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != expected {
            return Err(WriteError::MalformedRational(s));
        }
        parts
            .iter()
            .map(|part| {
                let (num, den) = encode::parse_rational(part)?;
                Ok(uR64 { nominator: num, denominator: den })
            })
            .collect()
    };

    let tag = match path {
        "Exif.Image.Artist" => ExifTag::Artist(text()?),
        "Exif.Image.Make" => ExifTag::Make(text()?),
        "Exif.Image.Model" => ExifTag::Model(text()?),
        "Exif.Image.Software" => ExifTag::Software(text()?),
        "Exif.Image.Copyright" => ExifTag::Copyright(text()?),
        "Exif.Image.ImageDescription" => ExifTag::ImageDescription(text()?),
        "Exif.Image.Orientation" => ExifTag::Orientation(vec![int()?]),
        "Exif.Image.DateTime" => ExifTag::ModifyDate(text()?),
        "Exif.Photo.DateTimeOriginal" => ExifTag::DateTimeOriginal(text()?),
        "Exif.Photo.DateTimeDigitized" => ExifTag::CreateDate(text()?),
        "Exif.Photo.OffsetTime" => ExifTag::OffsetTime(text()?),
        "Exif.Photo.OffsetTimeOriginal" => ExifTag::OffsetTimeOriginal(text()?),
        "Exif.Photo.OffsetTimeDigitized" => ExifTag::OffsetTimeDigitized(text()?),
        "Exif.Photo.SubSecTime" => ExifTag::SubSecTime(text()?),
        "Exif.Photo.SubSecTimeOriginal" => ExifTag::SubSecTimeOriginal(text()?),
        "Exif.Photo.SubSecTimeDigitized" => ExifTag::SubSecTimeDigitized(text()?),
        "Exif.GPSInfo.GPSLatitudeRef" => ExifTag::GPSLatitudeRef(text()?),
        "Exif.GPSInfo.GPSLatitude" => ExifTag::GPSLatitude(rationals(3)?),
        "Exif.GPSInfo.GPSLongitudeRef" => ExifTag::GPSLongitudeRef(text()?),
        "Exif.GPSInfo.GPSLongitude" => ExifTag::GPSLongitude(rationals(3)?),
        "Exif.GPSInfo.GPSAltitudeRef" => ExifTag::GPSAltitudeRef(vec![int()? as u8]),
        "Exif.GPSInfo.GPSAltitude" => ExifTag::GPSAltitude(rationals(1)?),
        "Exif.GPSInfo.GPSTimeStamp" => ExifTag::GPSTimeStamp(rationals(3)?),
        "Exif.GPSInfo.GPSDateStamp" => ExifTag::GPSDateStamp(text()?),
        "Exif.GPSInfo.GPSImgDirection" => ExifTag::GPSImgDirection(rationals(1)?),
        "Exif.GPSInfo.GPSImgDirectionRef" => ExifTag::GPSImgDirectionRef(text()?),
        _ => return Err(WriteError::UnsupportedTag(path.to_string())),
    };
    Ok(tag)
}

/// Splits `"Xmp.GPano.ProjectionType"` into prefix and property name.
fn split_xmp_path(path: &str) -> Result<(&str, &str)> {
    let mut parts = path.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Xmp"), Some(prefix), Some(local)) if !prefix.is_empty() && !local.is_empty() => {
            Ok((prefix, local))
        }
        _ => Err(WriteError::UnsupportedTag(path.to_string())),
    }
}

fn namespace_for(prefix: &str) -> Result<&'static str> {
    match prefix {
        "GPano" => Ok(GPANO_NS),
        "dc" => Ok("http://purl.org/dc/elements/1.1/"),
        "photoshop" => Ok("http://ns.adobe.com/photoshop/1.0/"),
        "xmp" => Ok("http://ns.adobe.com/xap/1.0/"),
        _ => Err(WriteError::UnsupportedTag(format!("Xmp.{prefix}.*"))),
    }
}

/// Distinct prefixes used by the staged properties, in path order.
fn xmp_prefixes(tags: &TagMap) -> Result<Vec<&str>> {
    let mut prefixes: Vec<&str> = Vec::new();
    for path in tags.keys() {
        let (prefix, _) = split_xmp_path(path)?;
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
    }
    Ok(prefixes)
}

/// Build a fresh XMP packet holding the staged properties.
fn build_xmp_packet(tags: &TagMap) -> Result<String> {
    let mut xmp = String::new();
    xmp.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    xmp.push_str("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    xmp.push_str("<rdf:Description rdf:about=\"\"");
    for prefix in xmp_prefixes(tags)? {
        xmp.push_str(&format!("\n  xmlns:{prefix}=\"{}\"", namespace_for(prefix)?));
    }
    xmp.push_str(">\n");

    for (path, value) in tags {
        let (prefix, local) = split_xmp_path(path)?;
        xmp.push_str(&format!(
            "  <{prefix}:{local}>{}</{prefix}:{local}>\n",
            xml_escape(&value.to_string())
        ));
    }

    xmp.push_str("</rdf:Description>\n");
    xmp.push_str("</rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>");
    Ok(xmp)
}

/// Inject the staged properties into an existing XMP packet, replacing stale
/// values in both element and attribute form and leaving everything else in
/// the packet alone.
fn inject_into_existing_xmp(xml: &str, tags: &TagMap) -> Result<String> {
    let mut result = xml.to_string();

    // Ensure each needed namespace is declared on rdf:Description
    for prefix in xmp_prefixes(tags)? {
        let declaration = format!("xmlns:{prefix}=");
        if result.contains(&declaration) {
            continue;
        }
        let anchor = result
            .find("rdf:about=\"\"")
            .map(|pos| pos + "rdf:about=\"\"".len())
            .or_else(|| {
                result
                    .find("<rdf:Description")
                    .map(|pos| pos + "<rdf:Description".len())
            });
        if let Some(insert_at) = anchor {
            result.insert_str(
                insert_at,
                &format!("\n  xmlns:{prefix}=\"{}\"", namespace_for(prefix)?),
            );
        }
    }

    // Convert a self-closing rdf:Description so elements can be appended
    if !result.contains("</rdf:Description>") {
        if let Some(desc_start) = result.find("<rdf:Description") {
            if let Some(close_pos) = result[desc_start..].find("/>") {
                let abs_close = desc_start + close_pos;
                result.replace_range(abs_close..abs_close + 2, ">");
                if let Some(rdf_end) = result.find("</rdf:RDF>") {
                    result.insert_str(rdf_end, "</rdf:Description>\n");
                }
            }
        }
    }

    let mut new_elements = String::new();
    for (path, value) in tags {
        let (prefix, local) = split_xmp_path(path)?;
        let qualified = format!("{prefix}:{local}");
        remove_xml_element(&mut result, &qualified);
        remove_xml_attribute(&mut result, &qualified);
        new_elements.push_str(&format!(
            "  <{qualified}>{}</{qualified}>\n",
            xml_escape(&value.to_string())
        ));
    }

    match result.find("</rdf:Description>") {
        Some(pos) => {
            result.insert_str(pos, &new_elements);
            Ok(result)
        }
        None => Err(WriteError::MalformedXmp(
            "no rdf:Description element to extend".to_string(),
        )),
    }
}

/// Remove an XML element and its contents from a string.
fn remove_xml_element(xml: &mut String, tag: &str) {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    if let Some(start) = xml.find(&open) {
        if let Some(end) = xml[start..].find(&close) {
            let end_abs = start + end + close.len();
            // Also remove trailing newline if present
            let end_abs = if xml.as_bytes().get(end_abs) == Some(&b'\n') {
                end_abs + 1
            } else {
                end_abs
            };
            xml.replace_range(start..end_abs, "");
        }
    }
}

/// Remove an attribute-form property (`name="value"`) from a string.
fn remove_xml_attribute(xml: &mut String, name: &str) {
    let pattern = format!("{name}=\"");
    let Some(attr_start) = xml.find(&pattern) else {
        return;
    };
    let value_start = attr_start + pattern.len();
    let Some(quote) = xml[value_start..].find('"') else {
        return;
    };
    let attr_end = value_start + quote + 1;
    let mut cut_start = attr_start;
    while cut_start > 0 && xml.as_bytes()[cut_start - 1].is_ascii_whitespace() {
        cut_start -= 1;
    }
    xml.replace_range(cut_start..attr_end, " ");
}

/// Escape special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reader;

    fn minimal_jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8]; // SOI
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]); // APP0, length 16
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x0A]); // COM, length 10
        bytes.extend_from_slice(b"geostamp");
        bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]); // SOS
        bytes.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        bytes.extend_from_slice(&[0xFF, 0xD9]); // EOI
        bytes
    }

    fn gps_tag_map() -> TagMap {
        let mut tags = TagMap::new();
        tags.insert(
            "Exif.GPSInfo.GPSLatitude".to_string(),
            TagValue::Text("38/1 53/1 55221/2500".to_string()),
        );
        tags.insert("Exif.GPSInfo.GPSLatitudeRef".to_string(), TagValue::Text("N".to_string()));
        tags.insert(
            "Exif.GPSInfo.GPSLongitude".to_string(),
            TagValue::Text("2/1 31/1 489/20".to_string()),
        );
        tags.insert("Exif.GPSInfo.GPSLongitudeRef".to_string(), TagValue::Text("E".to_string()));
        tags.insert(
            "Exif.GPSInfo.GPSAltitude".to_string(),
            TagValue::Text("120400/1000".to_string()),
        );
        tags.insert("Exif.GPSInfo.GPSAltitudeRef".to_string(), TagValue::Int(0));
        tags
    }

    // ── tag mapping ──────────────────────────────────────────────────

    #[test]
    fn maps_dms_strings_to_typed_rationals() {
        let tag = exif_tag_for(
            "Exif.GPSInfo.GPSLatitude",
            &TagValue::Text("38/1 53/1 55221/2500".to_string()),
        )
        .unwrap();
        match tag {
            ExifTag::GPSLatitude(rationals) => {
                assert_eq!(rationals.len(), 3);
                assert_eq!(rationals[0].nominator, 38);
                assert_eq!(rationals[0].denominator, 1);
                assert_eq!(rationals[2].nominator, 55221);
                assert_eq!(rationals[2].denominator, 2500);
            }
            other => panic!("unexpected tag: {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_rational_arity() {
        let result = exif_tag_for(
            "Exif.GPSInfo.GPSLatitude",
            &TagValue::Text("38/1 53/1".to_string()),
        );
        assert!(matches!(result, Err(WriteError::MalformedRational(_))));
    }

    #[test]
    fn rejects_unknown_tag_paths() {
        let result = exif_tag_for("Exif.Image.NoSuchTag", &TagValue::Text("x".to_string()));
        assert!(matches!(result, Err(WriteError::UnsupportedTag(_))));
    }

    #[test]
    fn rejects_value_type_mismatches() {
        let result = exif_tag_for("Exif.Image.Artist", &TagValue::Bool(true));
        assert!(matches!(result, Err(WriteError::UnsupportedTag(_))));
        let result = exif_tag_for("Exif.Image.Orientation", &TagValue::Text("1".to_string()));
        assert!(matches!(result, Err(WriteError::UnsupportedTag(_))));
    }

    // ── XMP packet building ──────────────────────────────────────────

    fn gpano_tags() -> TagMap {
        let mut tags = TagMap::new();
        tags.insert(
            "Xmp.GPano.ProjectionType".to_string(),
            TagValue::Text("equirectangular".to_string()),
        );
        tags.insert("Xmp.GPano.UsePanoramaViewer".to_string(), TagValue::Bool(true));
        tags
    }

    #[test]
    fn fresh_packet_declares_namespace_and_properties() {
        let xmp = build_xmp_packet(&gpano_tags()).unwrap();
        assert!(xmp.starts_with("<?xpacket begin="));
        assert!(xmp.contains("xmlns:GPano=\"http://ns.google.com/photos/1.0/panorama/\""));
        assert!(xmp.contains("<GPano:ProjectionType>equirectangular</GPano:ProjectionType>"));
        assert!(xmp.contains("<GPano:UsePanoramaViewer>True</GPano:UsePanoramaViewer>"));
        assert!(xmp.ends_with("<?xpacket end=\"w\"?>"));
    }

    #[test]
    fn packet_values_are_escaped() {
        let mut tags = TagMap::new();
        tags.insert(
            "Xmp.dc.title".to_string(),
            TagValue::Text("Fish & <Chips>".to_string()),
        );
        let xmp = build_xmp_packet(&tags).unwrap();
        assert!(xmp.contains("<dc:title>Fish &amp; &lt;Chips&gt;</dc:title>"));
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let mut tags = TagMap::new();
        tags.insert("Xmp.vendor.Thing".to_string(), TagValue::Text("x".to_string()));
        assert!(matches!(
            build_xmp_packet(&tags),
            Err(WriteError::UnsupportedTag(_))
        ));
    }

    // ── XMP injection ────────────────────────────────────────────────

    #[test]
    fn injection_preserves_unrelated_properties() {
        let existing = concat!(
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n",
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
            "<rdf:Description rdf:about=\"\"\n",
            "  xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
            "  <dc:creator>someone</dc:creator>\n",
            "</rdf:Description>\n",
            "</rdf:RDF>\n",
            "</x:xmpmeta>",
        );
        let result = inject_into_existing_xmp(existing, &gpano_tags()).unwrap();
        assert!(result.contains("<dc:creator>someone</dc:creator>"));
        assert!(result.contains("xmlns:GPano="));
        assert!(result.contains("<GPano:ProjectionType>equirectangular</GPano:ProjectionType>"));
    }

    #[test]
    fn injection_replaces_stale_element_values() {
        let existing = concat!(
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
            "<rdf:Description rdf:about=\"\"\n",
            "  xmlns:GPano=\"http://ns.google.com/photos/1.0/panorama/\">\n",
            "  <GPano:ProjectionType>cylindrical</GPano:ProjectionType>\n",
            "</rdf:Description>\n",
            "</rdf:RDF>",
        );
        let result = inject_into_existing_xmp(existing, &gpano_tags()).unwrap();
        assert!(!result.contains("cylindrical"));
        assert_eq!(result.matches("<GPano:ProjectionType>").count(), 1);
    }

    #[test]
    fn injection_replaces_stale_attribute_values() {
        let existing = concat!(
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
            "<rdf:Description rdf:about=\"\"\n",
            "  xmlns:GPano=\"http://ns.google.com/photos/1.0/panorama/\"\n",
            "  GPano:ProjectionType=\"cylindrical\">\n",
            "</rdf:Description>\n",
            "</rdf:RDF>",
        );
        let result = inject_into_existing_xmp(existing, &gpano_tags()).unwrap();
        assert!(!result.contains("cylindrical"));
        assert!(result.contains("<GPano:ProjectionType>equirectangular</GPano:ProjectionType>"));
    }

    #[test]
    fn injection_opens_self_closing_description() {
        let existing = concat!(
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
            "<rdf:Description rdf:about=\"\"/>\n",
            "</rdf:RDF>",
        );
        let result = inject_into_existing_xmp(existing, &gpano_tags()).unwrap();
        assert!(result.contains("<GPano:ProjectionType>equirectangular</GPano:ProjectionType>"));
        assert!(result.contains("</rdf:Description>"));
        assert!(!result.contains("/>"));
    }

    #[test]
    fn injection_without_description_is_malformed() {
        let existing = "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"></x:xmpmeta>";
        assert!(matches!(
            inject_into_existing_xmp(existing, &gpano_tags()),
            Err(WriteError::MalformedXmp(_))
        ));
    }

    // ── whole-buffer round trips ─────────────────────────────────────

    #[test]
    fn staged_gps_tags_read_back_from_jpeg() {
        let stamped = modify_exif(&minimal_jpeg(), ImageKind::Jpeg, &gps_tag_map()).unwrap();
        let read = reader::read_exif_tags(&stamped, ImageKind::Jpeg).unwrap();
        assert_eq!(
            read.get("Exif.GPSInfo.GPSLatitude"),
            Some(&TagValue::Text("38/1 53/1 55221/2500".to_string()))
        );
        assert_eq!(
            read.get("Exif.GPSInfo.GPSLatitudeRef"),
            Some(&TagValue::Text("N".to_string()))
        );
        assert_eq!(
            read.get("Exif.GPSInfo.GPSLongitudeRef"),
            Some(&TagValue::Text("E".to_string()))
        );
        assert_eq!(
            read.get("Exif.GPSInfo.GPSAltitude"),
            Some(&TagValue::Text("120400/1000".to_string()))
        );
    }

    #[test]
    fn fresh_xmp_packet_reads_back_from_jpeg() {
        let stamped = modify_xmp(&minimal_jpeg(), ImageKind::Jpeg, &gpano_tags()).unwrap();
        let read = reader::read_xmp_tags(&stamped).unwrap();
        assert_eq!(
            read.get("Xmp.GPano.ProjectionType"),
            Some(&TagValue::Text("equirectangular".to_string()))
        );
        assert_eq!(
            read.get("Xmp.GPano.UsePanoramaViewer"),
            Some(&TagValue::Text("True".to_string()))
        );
    }

    #[test]
    fn exif_segment_stays_ahead_of_xmp() {
        let with_xmp = modify_xmp(&minimal_jpeg(), ImageKind::Jpeg, &gpano_tags()).unwrap();
        let with_both = modify_exif(&with_xmp, ImageKind::Jpeg, &gps_tag_map()).unwrap();
        let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(&with_both)).unwrap();
        let exif_pos = find_exif_segment_pos(jpeg.segments()).unwrap();
        let xmp_pos = find_xmp_segment_pos(jpeg.segments()).unwrap();
        assert!(exif_pos < xmp_pos, "EXIF APP1 must precede XMP APP1");
    }

    #[test]
    fn oversized_xmp_payload_is_rejected() {
        let mut tags = TagMap::new();
        tags.insert(
            "Xmp.GPano.ProjectionType".to_string(),
            TagValue::Text("x".repeat(70_000)),
        );
        assert!(matches!(
            modify_xmp(&minimal_jpeg(), ImageKind::Jpeg, &tags),
            Err(WriteError::XmpTooLarge(_))
        ));
    }

    #[test]
    fn xmp_on_png_is_unsupported() {
        let png = [
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0,
        ];
        assert!(matches!(
            modify_xmp(&png, ImageKind::Png, &gpano_tags()),
            Err(WriteError::XmpUnsupported("PNG"))
        ));
    }

    #[test]
    fn codec_chains_exif_and_xmp_passes() {
        use crate::codec::{EmbeddedCodec, ImageCodec};
        let codec = EmbeddedCodec::new();
        let stamped = codec.modify_exif(&minimal_jpeg(), &gps_tag_map()).unwrap();
        let stamped = codec.modify_xmp(&stamped, &gpano_tags()).unwrap();
        let exif = codec.read_exif(&stamped).unwrap();
        let xmp = codec.read_xmp(&stamped).unwrap();
        assert!(exif.contains_key("Exif.GPSInfo.GPSLatitude"));
        assert!(xmp.contains_key("Xmp.GPano.ProjectionType"));
    }

    #[test]
    fn reapplying_same_tags_is_stable() {
        use crate::codec::{EmbeddedCodec, ImageCodec};
        let codec = EmbeddedCodec::new();
        let once = codec.modify_exif(&minimal_jpeg(), &gps_tag_map()).unwrap();
        let twice = codec.modify_exif(&once, &gps_tag_map()).unwrap();
        assert_eq!(codec.read_exif(&once).unwrap(), codec.read_exif(&twice).unwrap());
    }
}
