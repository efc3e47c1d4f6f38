//! Resolving capture coordinates to a named timezone and localizing naive
//! capture timestamps in it.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use tzf_rs::DefaultFinder;

static FINDER: Lazy<DefaultFinder> = Lazy::new(DefaultFinder::new);

/// Maps coordinates to a named timezone.
///
/// The writer takes this as a capability so callers can substitute a fixed
/// zone (or none at all) without touching the embedded polygon index.
pub trait ZoneLookup: Send + Sync {
    /// The timezone covering the given point, if one is known.
    fn zone_at(&self, latitude: f64, longitude: f64) -> Option<Tz>;
}

/// Default [`ZoneLookup`] backed by the embedded tzf polygon index. The index
/// is built on first use and cached for the lifetime of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneIndex;

impl ZoneIndex {
    pub fn new() -> Self {
        Self
    }
}

impl ZoneLookup for ZoneIndex {
    fn zone_at(&self, latitude: f64, longitude: f64) -> Option<Tz> {
        let name = FINDER.get_tz_name(longitude, latitude);
        if name.is_empty() {
            return None;
        }
        Tz::from_str(name).ok()
    }
}

/// Anchors a naive local timestamp in `zone`, returning it with the fixed
/// UTC offset in force at that moment.
///
/// When DST makes the local time ambiguous the earlier instant wins; when it
/// falls in a spring-forward gap there is no valid mapping and `None` is
/// returned.
pub fn localize(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<FixedOffset>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
            let offset = dt.offset().fix();
            Some(dt.with_timezone(&offset))
        }
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn paris() -> Tz {
        "Europe/Paris".parse().unwrap()
    }

    // ── zone lookup ──────────────────────────────────────────────────

    #[test]
    fn paris_coordinates_resolve_to_paris_zone() {
        let zone = ZoneIndex::new().zone_at(48.8566, 2.3522).unwrap();
        assert_eq!(zone.name(), "Europe/Paris");
    }

    #[test]
    fn kathmandu_coordinates_resolve_to_kathmandu_zone() {
        let zone = ZoneIndex::new().zone_at(27.7172, 85.3240).unwrap();
        assert_eq!(zone.name(), "Asia/Kathmandu");
    }

    // ── localization ─────────────────────────────────────────────────

    #[test]
    fn summer_timestamp_gets_dst_offset() {
        let dt = localize(naive(2021, 6, 1, 10, 0, 0), paris()).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(dt.naive_local(), naive(2021, 6, 1, 10, 0, 0));
    }

    #[test]
    fn winter_timestamp_gets_standard_offset() {
        let dt = localize(naive(2021, 1, 15, 10, 0, 0), paris()).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn ambiguous_fall_back_time_picks_earlier_offset() {
        // 02:30 occurs twice on 2021-10-31 in Paris; the DST offset comes first
        let dt = localize(naive(2021, 10, 31, 2, 30, 0), paris()).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn spring_forward_gap_has_no_mapping() {
        assert_eq!(localize(naive(2021, 3, 28, 2, 30, 0), paris()), None);
    }

    #[test]
    fn kathmandu_offset_is_five_forty_five() {
        let zone: Tz = "Asia/Kathmandu".parse().unwrap();
        let dt = localize(naive(2021, 6, 1, 10, 0, 0), zone).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 5 * 3600 + 45 * 60);
    }
}
