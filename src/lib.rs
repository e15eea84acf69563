//! Stamp photos with an information bar: capture time, location, name and
//! company burned into a rounded, semi-transparent bar at the bottom.
//!
//! The compositor draws the source photo stretched to a logical viewport,
//! scales the backing store by the device pixel ratio, lays the bar out in
//! logical units and encodes the result as a JPEG.
//!
//! # Quick Start
//!
//! ```no_run
//! use photo_watermark::{ImageSource, Viewport, WatermarkCompositor, WatermarkInfo, WatermarkStyle};
//!
//! let compositor = WatermarkCompositor::new().with_viewport(Viewport::new(375, 667, 2.0));
//! let info = WatermarkInfo {
//!     time: Some("2024-01-15 14:30:00".to_string()),
//!     name: Some("Zhang San".to_string()),
//!     ..WatermarkInfo::default()
//! };
//! let source = ImageSource::from_src("photo.jpg");
//! let stamped = compositor
//!     .composite(&source, &info, &WatermarkStyle::default())
//!     .expect("failed to stamp photo");
//! stamped.save(std::path::Path::new("photo_watermarked.jpg")).unwrap();
//! ```
//!
//! # Coordinates
//!
//! GPS fixes arrive in WGS-84; maps of mainland China use GCJ-02. Correct a
//! fix before stamping it:
//!
//! ```
//! use photo_watermark::{LocationFix, WatermarkInfo};
//!
//! let fix = LocationFix::wgs84(39.9, 116.4).to_gcj02();
//! let info = WatermarkInfo::default().with_location(&fix);
//! assert!((info.lat.unwrap() - 39.901_403_5).abs() < 1e-6);
//! ```

#![deny(missing_docs)]

pub mod color;
pub mod coords;
mod engine;
pub mod error;
pub mod info;
pub mod layout;
pub mod raster;
pub mod source;
pub mod surface;
pub mod text;

pub use coords::{wgs84_to_gcj02, CoordinateSystem, GeoPoint, LocationFix};
pub use engine::{
    default_output_path, is_supported_image, ProcessResult, Viewport, WatermarkCompositor,
};
pub use error::{Error, Result};
pub use info::{WatermarkInfo, WatermarkStyle};
pub use raster::{FontSet, RasterSurface};
pub use source::{EncodedImage, ImageSource};
pub use surface::{FontSpec, Rect, Surface, SurfaceGuard};
