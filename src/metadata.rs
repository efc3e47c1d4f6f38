use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How the image should be rendered by viewers.
///
/// Anything that is not a flat photo must be mapped to one of these values by
/// the caller before building a [`PictureMetadata`]; vendor camera-type
/// vocabularies ("spherical" and friends) are deliberately not interpreted
/// here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureType {
    /// Ordinary flat photo. Stages no projection tags (absence is the default).
    #[default]
    Flat,
    /// 360° equirectangular panorama. Stages the GPano projection tags.
    Equirectangular,
}

impl PictureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Equirectangular => "equirectangular",
        }
    }
}

/// A capture timestamp, either naive (no zone information, to be localized
/// from the picture's coordinates) or already anchored to a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureTime {
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl CaptureTime {
    /// Local wall-clock time, without offset information.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Self::Naive(dt) => *dt,
            Self::Zoned(dt) => dt.naive_local(),
        }
    }

    /// The UTC offset, when one is known.
    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Self::Naive(_) => None,
            Self::Zoned(dt) => Some(*dt.offset()),
        }
    }

    /// The instant in UTC. A naive timestamp carries no offset, so it is read
    /// as already being UTC; this keeps the derived GPS date/time stamps
    /// machine-independent.
    pub fn utc(&self) -> DateTime<Utc> {
        match self {
            Self::Naive(dt) => Utc.from_utc_datetime(dt),
            Self::Zoned(dt) => dt.with_timezone(&Utc),
        }
    }
}

impl From<NaiveDateTime> for CaptureTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self::Naive(dt)
    }
}

impl From<DateTime<FixedOffset>> for CaptureTime {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::Zoned(dt)
    }
}

/// The metadata record stamped into an image.
///
/// Every field is optional; the writer stages only the tags implied by the
/// fields that are populated. Latitude is expected in [-90, 90] and longitude
/// in [-180, 180] decimal degrees; direction may be any real number of degrees
/// and is normalized into [0, 360) on use.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use geostamp::metadata::{CaptureTime, PictureMetadata, PictureType};
///
/// let meta = PictureMetadata {
///     capture_time: NaiveDate::from_ymd_opt(2021, 6, 1)
///         .and_then(|d| d.and_hms_opt(10, 0, 0))
///         .map(CaptureTime::from),
///     latitude: Some(48.777),
///     longitude: Some(2.517),
///     altitude: Some(120.4),
///     direction: Some(15.0),
///     picture_type: Some(PictureType::Flat),
///     ..Default::default()
/// };
/// assert!(meta.latitude.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PictureMetadata {
    /// Capture timestamp; naive values are localized from the coordinates.
    pub capture_time: Option<CaptureTime>,
    /// Decimal degrees, positive north.
    pub latitude: Option<f64>,
    /// Decimal degrees, positive east.
    pub longitude: Option<f64>,
    /// Meters above (positive) or below (negative) sea level.
    pub altitude: Option<f64>,
    /// Compass bearing of the camera in degrees.
    pub direction: Option<f64>,
    /// Projection hint for viewers.
    pub picture_type: Option<PictureType>,
    /// Image author, written to the Artist tag.
    pub artist: Option<String>,
    /// Camera manufacturer, written to the Make tag.
    pub camera_make: Option<String>,
    /// Camera model, written to the Model tag.
    pub camera_model: Option<String>,
    /// EXIF orientation value (1 through 8).
    pub orientation: Option<u16>,
}
