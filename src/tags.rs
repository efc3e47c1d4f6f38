//! Staged metadata tags, keyed by dotted tag paths such as
//! `"Exif.GPSInfo.GPSLatitude"` or `"Xmp.GPano.ProjectionType"`.

use std::collections::BTreeMap;
use std::fmt;

/// A single staged tag value.
///
/// Strings hold either plain ASCII text or EXIF rational strings like
/// `"120400/1000"`; the codec decides which interpretation a given tag path
/// requires. Booleans render in the capitalized form XMP expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Text(String),
    Int(u16),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
        }
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<u16> for TagValue {
    fn from(value: u16) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Tag paths mapped to their staged values, ordered for deterministic
/// serialization.
pub type TagMap = BTreeMap<String, TagValue>;

/// Everything staged for one image, split by destination: EXIF tags and XMP
/// properties. Staging the same path twice keeps the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    pub exif: TagMap,
    pub xmp: TagMap,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an EXIF tag, replacing any earlier value at the same path.
    pub fn set_exif(&mut self, path: impl Into<String>, value: impl Into<TagValue>) {
        self.exif.insert(path.into(), value.into());
    }

    /// Stages an XMP property, replacing any earlier value at the same path.
    pub fn set_xmp(&mut self, path: impl Into<String>, value: impl Into<TagValue>) {
        self.xmp.insert(path.into(), value.into());
    }

    /// True when nothing has been staged for either destination.
    pub fn is_empty(&self) -> bool {
        self.exif.is_empty() && self.xmp.is_empty()
    }
}
