//! Software [`Surface`] over an RGBA buffer.
//!
//! Shapes are anti-aliased from signed distances sampled at pixel centres,
//! text is rasterized from `ab_glyph` outlines, and everything is blended
//! source-over, matching what a 2D canvas produces closely enough for a
//! stamped photo.

use std::path::Path;
use std::sync::OnceLock;

use ab_glyph::{point, Font, FontArc, FontVec, GlyphId, PxScale, ScaleFont};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::surface::{FontSpec, Rect, Surface};

/// DejaVu Sans, shipped so text renders without any system fonts.
const EMBEDDED_REGULAR: &[u8] = include_bytes!("fonts/DejaVuSans.ttf");
/// DejaVu Sans Bold.
const EMBEDDED_BOLD: &[u8] = include_bytes!("fonts/DejaVuSans-Bold.ttf");

/// Well-known locations of system faces with Han coverage, most preferred
/// first. Collections (`.ttc`) are read at face index 0.
const SYSTEM_CJK_FONTS: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/opentype/noto/NotoSerifCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/usr/share/fonts/wenquanyi/wqy-microhei/wqy-microhei.ttc",
    "/usr/share/fonts/wenquanyi/wqy-zenhei/wqy-zenhei.ttc",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/truetype/arphic/uming.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "C:\\Windows\\Fonts\\simsun.ttc",
];

static SYSTEM_CJK_FACE: OnceLock<Option<FontArc>> = OnceLock::new();

/// Largest backing-store edge a surface will allocate, in device pixels.
pub const MAX_SURFACE_DIMENSION: u32 = 16_384;

/// Faces used for all text on a surface.
///
/// Each character is drawn from the first face in the chain that has a glyph
/// for it: the requested weight, then the regular face, then the fallbacks in
/// the order they were added. A character no face covers draws the primary
/// face's `.notdef` box.
#[derive(Clone)]
pub struct FontSet {
    regular: FontArc,
    bold: FontArc,
    fallbacks: Vec<FontArc>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("fallbacks", &self.fallbacks.len())
            .finish_non_exhaustive()
    }
}

impl FontSet {
    /// The embedded DejaVu Sans faces, with no fallbacks.
    ///
    /// DejaVu has no CJK glyphs. Chain a face that has them with
    /// [`with_system_fallbacks`](Self::with_system_fallbacks) or
    /// [`with_fallback_file`](Self::with_fallback_file) to stamp Chinese
    /// names and addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if the embedded data is corrupt.
    pub fn embedded() -> Result<Self> {
        Ok(Self {
            regular: FontArc::try_from_slice(EMBEDDED_REGULAR)
                .map_err(|e| Error::Font(e.to_string()))?,
            bold: FontArc::try_from_slice(EMBEDDED_BOLD).map_err(|e| Error::Font(e.to_string()))?,
            fallbacks: Vec::new(),
        })
    }

    /// Parse fonts from memory. Without a bold face the regular one is used
    /// for bold text too.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if either buffer is not a TrueType/OpenType font.
    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self> {
        let regular = parse_face(regular)?;
        let bold = match bold {
            Some(data) => parse_face(data)?,
            None => regular.clone(),
        };
        Ok(Self {
            regular,
            bold,
            fallbacks: Vec::new(),
        })
    }

    /// Read and parse font files. Collections (`.ttc`) use their first face.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a file cannot be read and [`Error::Font`] if
    /// it is not a font.
    pub fn from_files(regular: &Path, bold: Option<&Path>) -> Result<Self> {
        let regular = std::fs::read(regular)?;
        let bold = bold.map(std::fs::read).transpose()?;
        Self::from_bytes(regular, bold)
    }

    /// Append `face` to the fallback chain.
    #[must_use]
    pub fn with_fallback(mut self, face: FontArc) -> Self {
        self.fallbacks.push(face);
        self
    }

    /// Append the font in `path` to the fallback chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Font`]
    /// if it is not a font.
    pub fn with_fallback_file(self, path: &Path) -> Result<Self> {
        let face = parse_face(std::fs::read(path)?)?;
        Ok(self.with_fallback(face))
    }

    /// Append the first installed system face with Han coverage, if any.
    ///
    /// The lookup runs once per process; later calls reuse the parsed face.
    #[must_use]
    pub fn with_system_fallbacks(self) -> Self {
        match system_cjk_face() {
            Some(face) => self.with_fallback(face),
            None => self,
        }
    }

    /// Whether some face in the chain has a glyph for `c`.
    #[must_use]
    pub fn covers(&self, c: char) -> bool {
        self.glyph(false, c).1 != GlyphId(0)
    }

    fn face(&self, bold: bool) -> &FontArc {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    /// The face and glyph that draw `c`.
    fn glyph(&self, bold: bool, c: char) -> (&FontArc, GlyphId) {
        let primary = self.face(bold);
        std::iter::once(primary)
            .chain(bold.then_some(&self.regular))
            .chain(&self.fallbacks)
            .map(|face| (face, face.glyph_id(c)))
            .find(|&(_, id)| id != GlyphId(0))
            .unwrap_or((primary, GlyphId(0)))
    }

    /// Advance width of `text` at `size`, kerning included. Kerning only
    /// applies between neighbours drawn from the same face.
    fn advance_width(&self, bold: bool, size: f32, text: &str) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<(&FontArc, GlyphId)> = None;
        for c in text.chars() {
            let (face, id) = self.glyph(bold, c);
            let scaled = face.as_scaled(em_scale(face, size));
            if let Some((prev_face, prev_id)) = prev {
                if std::ptr::eq(prev_face, face) {
                    width += scaled.kern(prev_id, id);
                }
            }
            width += scaled.h_advance(id);
            prev = Some((face, id));
        }
        width
    }
}

fn parse_face(data: Vec<u8>) -> Result<FontArc> {
    FontVec::try_from_vec_and_index(data, 0)
        .map(FontArc::from)
        .map_err(|e| Error::Font(e.to_string()))
}

fn system_cjk_face() -> Option<FontArc> {
    SYSTEM_CJK_FACE
        .get_or_init(|| {
            SYSTEM_CJK_FONTS
                .iter()
                .map(Path::new)
                .filter(|path| path.is_file())
                .find_map(|path| {
                    match std::fs::read(path).map_err(Error::from).and_then(parse_face) {
                        Ok(face) => {
                            debug!(path = %path.display(), "using system CJK fallback font");
                            Some(face)
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping unreadable font");
                            None
                        }
                    }
                })
        })
        .clone()
}

/// Pixel scale at which a face's em box is `size` pixels tall, as CSS sizes
/// fonts.
fn em_scale(font: &FontArc, size: f32) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(size * font.height_unscaled() / units_per_em)
}

/// A CPU-rendered drawing surface.
#[derive(Debug)]
pub struct RasterSurface {
    canvas: RgbaImage,
    scale: f32,
    fonts: FontSet,
}

impl RasterSurface {
    /// A `width × height` surface using the embedded fonts, falling back to
    /// an installed CJK face when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceUnavailable`] for a zero or oversized store and
    /// [`Error::Font`] if the embedded fonts fail to parse.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_fonts(width, height, FontSet::embedded()?.with_system_fallbacks())
    }

    /// A `width × height` surface drawing text with `fonts`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceUnavailable`] for a zero or oversized store.
    pub fn with_fonts(width: u32, height: u32, fonts: FontSet) -> Result<Self> {
        let mut surface = Self {
            canvas: RgbaImage::new(0, 0),
            scale: 1.0,
            fonts,
        };
        surface.resize(width, height)?;
        Ok(surface)
    }

    /// The backing store.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Bounding box of `[x0, x1) × [y0, y1)` in backing pixels, clipped to
    /// the canvas.
    fn clip(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = self.canvas.dimensions();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let clamp = |v: f32, max: u32| v.clamp(0.0, max as f32) as u32;
        let (x0, x1) = (clamp(x0.floor(), w), clamp(x1.ceil(), w));
        let (y0, y1) = (clamp(y0.floor(), h), clamp(y1.ceil(), h));
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba<u8>, coverage: f32) {
        if coverage <= 0.0 {
            return;
        }
        let px = self.canvas.get_pixel_mut(x, y);
        *px = blend_pixels(*px, color, coverage.min(1.0));
    }
}

/// Source-over blend of `top`, scaled by `coverage`, onto `bottom`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let top_alpha = f32::from(top[3]) / 255.0 * coverage;
    let bottom_alpha = f32::from(bottom[3]) / 255.0;
    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| -> u8 {
        let t = f32::from(t) / 255.0;
        let b = f32::from(b) / 255.0;
        let v = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], bottom[0]),
        channel(top[1], bottom[1]),
        channel(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Signed distance from `(px, py)` to a rounded box, negative inside.
fn rounded_box_distance(px: f32, py: f32, rect: Rect, radius: f32) -> f32 {
    let half_w = rect.width / 2.0;
    let half_h = rect.height / 2.0;
    let radius = radius.min(half_w).min(half_h).max(0.0);
    let qx = (px - (rect.x + half_w)).abs() - (half_w - radius);
    let qy = (py - (rect.y + half_h)).abs() - (half_h - radius);
    let outside = qx.max(0.0).hypot(qy.max(0.0));
    outside + qx.max(qy).min(0.0) - radius
}

impl Surface for RasterSurface {
    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0
            || height == 0
            || width > MAX_SURFACE_DIMENSION
            || height > MAX_SURFACE_DIMENSION
        {
            return Err(Error::SurfaceUnavailable { width, height });
        }
        self.canvas = RgbaImage::new(width, height);
        Ok(())
    }

    fn backing_size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn draw_image(&mut self, image: &DynamicImage, dest: Rect) {
        let s = self.scale;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (w, h) = (
            (dest.width * s).round().max(0.0) as u32,
            (dest.height * s).round().max(0.0) as u32,
        );
        if w == 0 || h == 0 {
            return;
        }
        let resized = imageops::resize(&image.to_rgba8(), w, h, FilterType::Triangle);
        #[allow(clippy::cast_possible_truncation)]
        imageops::overlay(
            &mut self.canvas,
            &resized,
            (dest.x * s).round() as i64,
            (dest.y * s).round() as i64,
        );
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba<u8>) {
        let s = self.scale;
        let rect = Rect::new(rect.x * s, rect.y * s, rect.width * s, rect.height * s);
        let radius = radius * s;
        let Some((x0, y0, x1, y1)) = self.clip(rect.x, rect.y, rect.right(), rect.bottom()) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                #[allow(clippy::cast_precision_loss)]
                let d = rounded_box_distance(x as f32 + 0.5, y as f32 + 0.5, rect, radius);
                self.blend(x, y, color, (0.5 - d).clamp(0.0, 1.0));
            }
        }
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba<u8>) {
        let s = self.scale;
        let (ax, ay) = (from.0 * s, from.1 * s);
        let (bx, by) = (to.0 * s, to.1 * s);
        let half = width * s / 2.0;
        let (dx, dy) = (bx - ax, by - ay);
        let len = dx.hypot(dy);
        if len <= f32::EPSILON || half <= 0.0 {
            return;
        }
        let (ux, uy) = (dx / len, dy / len);

        let pad = half + 1.0;
        let Some((x0, y0, x1, y1)) = self.clip(
            ax.min(bx) - pad,
            ay.min(by) - pad,
            ax.max(bx) + pad,
            ay.max(by) + pad,
        ) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                #[allow(clippy::cast_precision_loss)]
                let (px, py) = (x as f32 + 0.5 - ax, y as f32 + 0.5 - ay);
                let along = px * ux + py * uy;
                let across = (px * uy - py * ux).abs();
                let cap = (along.min(len - along) + 0.5).clamp(0.0, 1.0);
                let side = (half + 0.5 - across).clamp(0.0, 1.0);
                self.blend(x, y, color, cap * side);
            }
        }
    }

    fn measure_text(&self, text: &str, font: FontSpec) -> f32 {
        self.fonts.advance_width(font.bold, font.size, text)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: FontSpec, color: Rgba<u8>) {
        let s = self.scale;
        let size = font.size * s;
        let fonts = self.fonts.clone();
        let primary = fonts.face(font.bold);
        let baseline = y * s + primary.as_scaled(em_scale(primary, size)).ascent();
        let (width, height) = self.canvas.dimensions();

        let mut cursor = x * s;
        let mut prev: Option<(&FontArc, GlyphId)> = None;
        for c in text.chars() {
            let (face, id) = fonts.glyph(font.bold, c);
            let px_scale = em_scale(face, size);
            let scaled = face.as_scaled(px_scale);
            if let Some((prev_face, prev_id)) = prev {
                if std::ptr::eq(prev_face, face) {
                    cursor += scaled.kern(prev_id, id);
                }
            }
            let glyph = id.with_scale_and_position(px_scale, point(cursor, baseline));
            if let Some(outlined) = face.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let (px, py) = (
                        bounds.min.x as i32 + gx as i32,
                        bounds.min.y as i32 + gy as i32,
                    );
                    if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                        self.blend(px as u32, py as u32, color, coverage);
                    }
                });
            }
            cursor += scaled.h_advance(id);
            prev = Some((face, id));
        }
    }

    fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        // JPEG has no alpha: flatten onto black like a canvas export does.
        let rgb = RgbImage::from_fn(self.canvas.width(), self.canvas.height(), |x, y| {
            let p = self.canvas.get_pixel(x, y);
            let a = u16::from(p[3]);
            #[allow(clippy::cast_possible_truncation)]
            let flatten = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
            Rgb([flatten(p[0]), flatten(p[1]), flatten(p[2])])
        });

        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder.encode_image(&rgb).map_err(Error::Encode)?;
        Ok(bytes)
    }

    fn release(&mut self) {
        self.canvas = RgbaImage::new(0, 0);
    }
}
