//! Watermark content and styling records.

use serde::{Deserialize, Serialize};

use crate::coords::LocationFix;

/// What to print on the watermark bar.
///
/// Every field is optional; a missing field suppresses its block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatermarkInfo {
    /// Human-readable address from a reverse-geocoding provider.
    pub address: Option<String>,
    /// Capture time as `"YYYY-MM-DD HH:MM:SS"` (date, a space, then time).
    pub time: Option<String>,
    /// Latitude in degrees.
    pub lat: Option<f64>,
    /// Longitude in degrees.
    pub lng: Option<f64>,
    /// Name of the person taking the photo.
    pub name: Option<String>,
    /// Company name.
    pub company: Option<String>,
}

impl WatermarkInfo {
    /// Fill `lat`, `lng` and (when the provider resolved one) `address`
    /// from a geolocation fix, correcting WGS-84 fixes to GCJ-02.
    #[must_use]
    pub fn with_location(mut self, fix: &LocationFix) -> Self {
        let fix = fix.to_gcj02();
        self.lat = Some(fix.point.latitude);
        self.lng = Some(fix.point.longitude);
        if fix.address.is_some() {
            self.address = fix.address;
        }
        self
    }

    /// Date and time halves of [`time`](Self::time), if present.
    #[must_use]
    pub fn time_parts(&self) -> Option<(&str, &str)> {
        self.time.as_deref().map(split_time)
    }
}

/// How the watermark bar looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct WatermarkStyle {
    /// Draw the time block.
    pub show_time: bool,
    /// Draw the coordinate and address lines.
    pub show_location: bool,
    /// Draw the name line.
    pub show_name: bool,
    /// Draw the company line.
    pub show_company: bool,
    /// Bar fill color (CSS syntax).
    pub background_color: String,
    /// Text and divider color (CSS syntax).
    pub text_color: String,
    /// Size of secondary text (date, company, coordinates, address).
    pub font_size: f32,
    /// Height of the bar in logical pixels.
    pub bar_height: f32,
}

/// Default bar fill.
pub const DEFAULT_BACKGROUND_COLOR: &str = "rgba(0,0,0,0.5)";
/// Default text color.
pub const DEFAULT_TEXT_COLOR: &str = "#fff";

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            show_time: true,
            show_location: true,
            show_name: true,
            show_company: true,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            font_size: 14.0,
            bar_height: 110.0,
        }
    }
}

/// Split a `"date time"` string on its first space.
///
/// A string without a space is all date and has an empty time half.
#[must_use]
pub fn split_time(time: &str) -> (&str, &str) {
    time.split_once(' ').unwrap_or((time, ""))
}

/// Format coordinates with six decimals and fixed `°N` / `°E` suffixes.
///
/// The suffixes do not follow the sign of the input: southern latitudes and
/// western longitudes print as negative numbers labelled N / E.
#[must_use]
pub fn format_lat_lng(lat: f64, lng: f64) -> String {
    format!("{lat:.6}°N,{lng:.6}°E")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::wgs84_to_gcj02;

    #[test]
    fn format_lat_lng_uses_six_decimals() {
        assert_eq!(format_lat_lng(39.9, 116.4), "39.900000°N,116.400000°E");
        assert_eq!(
            format_lat_lng(31.228_457_737, 121.478_223_059),
            "31.228458°N,121.478223°E"
        );
    }

    #[test]
    fn format_lat_lng_keeps_fixed_hemisphere_suffixes() {
        assert_eq!(format_lat_lng(-33.8688, -70.5), "-33.868800°N,-70.500000°E");
    }

    #[test]
    fn split_time_on_first_space() {
        assert_eq!(split_time("2024-01-15 14:30:00"), ("2024-01-15", "14:30:00"));
        assert_eq!(split_time("2024/1/15 下午 2:30"), ("2024/1/15", "下午 2:30"));
        assert_eq!(split_time("2024-01-15"), ("2024-01-15", ""));
    }

    #[test]
    fn style_defaults() {
        let style = WatermarkStyle::default();
        assert!(style.show_time && style.show_location && style.show_name && style.show_company);
        assert_eq!(style.background_color, "rgba(0,0,0,0.5)");
        assert_eq!(style.text_color, "#fff");
        assert!((style.font_size - 14.0).abs() < f32::EPSILON);
        assert!((style.bar_height - 110.0).abs() < f32::EPSILON);
    }

    #[test]
    fn style_deserializes_partial_camel_case_json() {
        let style: WatermarkStyle =
            serde_json::from_str(r#"{"showCompany": false, "barHeight": 96}"#).unwrap();
        assert!(!style.show_company);
        assert!(style.show_name);
        assert!((style.bar_height - 96.0).abs() < f32::EPSILON);
        assert_eq!(style.text_color, "#fff");
    }

    #[test]
    fn info_deserializes_with_missing_fields() {
        let info: WatermarkInfo =
            serde_json::from_str(r#"{"time": "2024-01-15 14:30:00", "lat": 39.9}"#).unwrap();
        assert_eq!(info.time_parts(), Some(("2024-01-15", "14:30:00")));
        assert_eq!(info.lat, Some(39.9));
        assert!(info.lng.is_none() && info.name.is_none());
    }

    #[test]
    fn with_location_corrects_wgs84_and_keeps_existing_address() {
        let info = WatermarkInfo {
            address: Some("Typed by hand".to_string()),
            ..WatermarkInfo::default()
        }
        .with_location(&LocationFix::wgs84(39.9, 116.4));

        let expected = wgs84_to_gcj02(39.9, 116.4);
        assert_eq!(info.lat, Some(expected.latitude));
        assert_eq!(info.lng, Some(expected.longitude));
        assert_eq!(info.address.as_deref(), Some("Typed by hand"));
    }

    #[test]
    fn with_location_takes_provider_address() {
        let fix = LocationFix::gcj02(30.0, 120.0).with_address("West Lake");
        let info = WatermarkInfo::default().with_location(&fix);
        assert_eq!(info.lat, Some(30.0));
        assert_eq!(info.address.as_deref(), Some("West Lake"));
    }
}
