//! WGS-84 to GCJ-02 coordinate correction.
//!
//! Browser and GPS geolocation report WGS-84 coordinates, while maps of
//! mainland China (and the reverse-geocoding services behind them) expect the
//! GCJ-02 system. GCJ-02 is WGS-84 shifted by an empirically fitted,
//! non-linear offset of a few hundred metres. The polynomial below must match
//! the published transform coefficient for coefficient, otherwise the stamped
//! location drifts visibly on the map.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Semi-major axis of the Krasovsky 1940 ellipsoid used by GCJ-02.
const SEMI_MAJOR_AXIS: f64 = 6_378_245.0;

/// First eccentricity squared of the same ellipsoid.
#[allow(clippy::excessive_precision, clippy::unreadable_literal)]
const ECCENTRICITY_SQ: f64 = 0.00669342162296594323;

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point from latitude and longitude.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The datum a [`GeoPoint`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    /// Raw GPS / browser geolocation coordinates.
    #[default]
    Wgs84,
    /// Coordinates already corrected for mainland China maps.
    Gcj02,
}

/// A position reported by a geolocation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// The reported position.
    pub point: GeoPoint,
    /// Datum of `point`.
    pub system: CoordinateSystem,
    /// Address resolved by the provider, if it reverse-geocodes itself.
    #[serde(default)]
    pub address: Option<String>,
}

impl LocationFix {
    /// A fix from a provider that reports raw WGS-84 coordinates.
    #[must_use]
    pub fn wgs84(latitude: f64, longitude: f64) -> Self {
        Self {
            point: GeoPoint::new(latitude, longitude),
            system: CoordinateSystem::Wgs84,
            address: None,
        }
    }

    /// A fix from a provider that already returns GCJ-02 coordinates.
    #[must_use]
    pub fn gcj02(latitude: f64, longitude: f64) -> Self {
        Self {
            point: GeoPoint::new(latitude, longitude),
            system: CoordinateSystem::Gcj02,
            address: None,
        }
    }

    /// Attach a provider-resolved address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Normalize the fix to GCJ-02.
    ///
    /// Only WGS-84 fixes are corrected; providers that already return GCJ-02
    /// must not be shifted a second time.
    #[must_use]
    pub fn to_gcj02(&self) -> Self {
        match self.system {
            CoordinateSystem::Gcj02 => self.clone(),
            CoordinateSystem::Wgs84 => Self {
                point: wgs84_to_gcj02(self.point.latitude, self.point.longitude),
                system: CoordinateSystem::Gcj02,
                address: self.address.clone(),
            },
        }
    }
}

/// Convert a WGS-84 coordinate to GCJ-02.
///
/// Total over finite input. NaN or infinite input propagates through the
/// arithmetic unflagged; validate geolocation results before converting.
#[must_use]
pub fn wgs84_to_gcj02(lat: f64, lng: f64) -> GeoPoint {
    let mut d_lat = transform_lat(lng - 105.0, lat - 35.0);
    let mut d_lng = transform_lng(lng - 105.0, lat - 35.0);

    let rad_lat = lat / 180.0 * PI;
    let mut magic = rad_lat.sin();
    magic = 1.0 - ECCENTRICITY_SQ * magic * magic;
    let sqrt_magic = magic.sqrt();

    d_lat = (d_lat * 180.0)
        / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQ)) / (magic * sqrt_magic) * PI);
    d_lng = (d_lng * 180.0) / (SEMI_MAJOR_AXIS / sqrt_magic * rad_lat.cos() * PI);

    GeoPoint::new(lat + d_lat, lng + d_lng)
}

/// Latitude offset series in `(lng - 105, lat - 35)`.
fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

/// Longitude offset series; `x` takes the role `y` has in [`transform_lat`].
fn transform_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}
