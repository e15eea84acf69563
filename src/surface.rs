//! The drawing-surface interface the compositor renders through.
//!
//! A surface has a backing store in device pixels and a logical-to-backing
//! scale (the device pixel ratio). Every coordinate, size and font size
//! handed to the drawing methods is in logical units; implementations apply
//! the scale themselves so layout code never multiplies by the DPR.

use std::ops::{Deref, DerefMut};

use image::{DynamicImage, Rgba};

use crate::error::Result;

/// An axis-aligned rectangle in logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Font selection for measuring and drawing text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    /// Em size in logical pixels.
    pub size: f32,
    /// Use the bold face.
    pub bold: bool,
}

impl FontSpec {
    /// Regular weight at `size`.
    #[must_use]
    pub fn regular(size: f32) -> Self {
        Self { size, bold: false }
    }

    /// Bold weight at `size`.
    #[must_use]
    pub fn bold(size: f32) -> Self {
        Self { size, bold: true }
    }
}

/// A 2D raster target with text measurement.
///
/// Text is positioned by the top of its em box (a canvas `textBaseline` of
/// `top`), left-aligned at `x`.
pub trait Surface {
    /// Reallocate the backing store to `width × height` device pixels,
    /// clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceUnavailable`](crate::Error::SurfaceUnavailable)
    /// if a store of that size cannot be created.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Backing-store size in device pixels.
    fn backing_size(&self) -> (u32, u32);

    /// Set the logical-to-backing scale. The origin is never translated.
    fn set_scale(&mut self, scale: f32);

    /// Draw `image` stretched to fill `dest`.
    fn draw_image(&mut self, image: &DynamicImage, dest: Rect);

    /// Fill a rounded rectangle.
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba<u8>);

    /// Stroke a straight line with butt caps.
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba<u8>);

    /// Advance width of `text` in logical units.
    fn measure_text(&self, text: &str, font: FontSpec) -> f32;

    /// Draw `text` with the top of its em box at `y`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: FontSpec, color: Rgba<u8>);

    /// Encode the backing store as a JPEG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`](crate::Error::Encode) if the encoder fails.
    fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>>;

    /// Give back whatever the surface holds for the current call.
    fn release(&mut self) {}
}

/// Borrows a surface for one render and releases it when dropped, on the
/// success path and on every early return alike.
pub struct SurfaceGuard<'a, S: Surface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: Surface + ?Sized> SurfaceGuard<'a, S> {
    /// Take the surface for the duration of the guard.
    pub fn new(surface: &'a mut S) -> Self {
        Self { surface }
    }
}

impl<S: Surface + ?Sized> Deref for SurfaceGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: Surface + ?Sized> DerefMut for SurfaceGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: Surface + ?Sized> Drop for SurfaceGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSurface {
        released: u32,
    }

    impl Surface for CountingSurface {
        fn resize(&mut self, _width: u32, _height: u32) -> Result<()> {
            Ok(())
        }
        fn backing_size(&self) -> (u32, u32) {
            (0, 0)
        }
        fn set_scale(&mut self, _scale: f32) {}
        fn draw_image(&mut self, _image: &DynamicImage, _dest: Rect) {}
        fn fill_rounded_rect(&mut self, _rect: Rect, _radius: f32, _color: Rgba<u8>) {}
        fn stroke_line(&mut self, _: (f32, f32), _: (f32, f32), _: f32, _: Rgba<u8>) {}
        fn measure_text(&self, _text: &str, _font: FontSpec) -> f32 {
            0.0
        }
        fn fill_text(&mut self, _: &str, _: f32, _: f32, _: FontSpec, _: Rgba<u8>) {}
        fn encode_jpeg(&self, _quality: u8) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn release(&mut self) {
            self.released += 1;
        }
    }

    fn fails_midway(surface: &mut CountingSurface) -> Result<()> {
        let _guard = SurfaceGuard::new(surface);
        Err(crate::Error::ImageLoad("boom".to_string()))
    }

    #[test]
    fn guard_releases_on_drop() {
        let mut surface = CountingSurface::default();
        {
            let mut guard = SurfaceGuard::new(&mut surface);
            guard.set_scale(2.0);
        }
        assert_eq!(surface.released, 1);
    }

    #[test]
    fn guard_releases_on_early_error() {
        let mut surface = CountingSurface::default();
        assert!(fails_midway(&mut surface).is_err());
        assert_eq!(surface.released, 1);
    }

    #[test]
    fn rect_edges() {
        let r = Rect::new(16.0, 521.0, 343.0, 110.0);
        assert!((r.right() - 359.0).abs() < f32::EPSILON);
        assert!((r.bottom() - 631.0).abs() < f32::EPSILON);
    }
}
