//! The watermark compositor and file-level processing around it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::debug;

use crate::error::{Error, Result};
use crate::info::{WatermarkInfo, WatermarkStyle};
use crate::layout::{BarGeometry, BarLayout, Palette};
use crate::raster::{FontSet, RasterSurface};
use crate::source::{EncodedImage, ImageSource, JPEG_QUALITY};
use crate::surface::{Rect, Surface, SurfaceGuard};

/// The logical drawing area and its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width in logical (CSS) pixels.
    pub width: u32,
    /// Height in logical (CSS) pixels.
    pub height: u32,
    /// Device pixels per logical pixel.
    pub device_pixel_ratio: f32,
}

impl Viewport {
    /// A viewport of `width × height` logical pixels at `device_pixel_ratio`.
    #[must_use]
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Backing-store size in device pixels.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn backing_size(&self) -> (u32, u32) {
        let scale = |v: u32| (v as f32 * self.device_pixel_ratio).round().max(0.0) as u32;
        (scale(self.width), scale(self.height))
    }

    /// Logical size as floats, for layout.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn logical_size(&self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Where the stamped image was written, on success.
    pub output: Option<PathBuf>,
    /// Whether processing succeeded.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

/// Stamps photos with the info bar.
///
/// Holds only immutable settings, so one compositor can serve any number of
/// calls, including concurrent ones: every call renders into its own surface.
#[derive(Debug, Clone)]
pub struct WatermarkCompositor {
    viewport: Option<Viewport>,
    fonts: Option<FontSet>,
}

impl Default for WatermarkCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkCompositor {
    /// A compositor that renders at each source image's own size (DPR 1)
    /// with the embedded fonts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            viewport: None,
            fonts: None,
        }
    }

    /// Render into a fixed viewport instead of the source's own size.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Draw text with `fonts` instead of the embedded faces and the system
    /// CJK fallback.
    #[must_use]
    pub fn with_fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// The viewport used for an image of `width × height` pixels.
    #[must_use]
    pub fn viewport_for(&self, width: u32, height: u32) -> Viewport {
        self.viewport
            .unwrap_or_else(|| Viewport::new(width, height, 1.0))
    }

    fn fonts(&self) -> Result<FontSet> {
        match &self.fonts {
            Some(fonts) => Ok(fonts.clone()),
            None => FontSet::embedded().map(FontSet::with_system_fallbacks),
        }
    }

    /// Stamp `source` and return it JPEG-encoded.
    ///
    /// With a fixed viewport the surface is acquired before the source is
    /// decoded; otherwise the decoded size picks the viewport first.
    ///
    /// # Errors
    ///
    /// Returns [`ImageLoad`](crate::Error::ImageLoad) if the source cannot be
    /// decoded and [`SurfaceUnavailable`](crate::Error::SurfaceUnavailable) if
    /// no surface of the viewport's size can be allocated. Missing info fields
    /// are never errors.
    pub fn composite(
        &self,
        source: &ImageSource,
        info: &WatermarkInfo,
        style: &WatermarkStyle,
    ) -> Result<EncodedImage> {
        let fonts = self.fonts()?;
        match self.viewport {
            Some(viewport) => {
                let (width, height) = viewport.backing_size();
                let mut surface = RasterSurface::with_fonts(width, height, fonts)?;
                self.composite_onto(&mut surface, source, viewport, info, style)
            }
            None => {
                let image = source.decode()?;
                let viewport = self.viewport_for(image.width(), image.height());
                let (width, height) = viewport.backing_size();
                let mut surface = RasterSurface::with_fonts(width, height, fonts)?;
                let mut surface = SurfaceGuard::new(&mut surface);
                render(&mut *surface, &image, viewport, info, style)
            }
        }
    }

    /// Stamp `source` onto a caller-supplied surface.
    ///
    /// The surface is resized to the viewport's backing store before the
    /// source is decoded, and released before returning whether rendering
    /// succeeds or not. A surface must not be shared by overlapping calls;
    /// taking it by `&mut` enforces that.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceUnavailable`](crate::Error::SurfaceUnavailable) if the
    /// surface cannot be resized, [`ImageLoad`](crate::Error::ImageLoad) if the
    /// source cannot be decoded and [`Encode`](crate::Error::Encode) if
    /// encoding fails.
    pub fn composite_onto<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        source: &ImageSource,
        viewport: Viewport,
        info: &WatermarkInfo,
        style: &WatermarkStyle,
    ) -> Result<EncodedImage> {
        let mut surface = SurfaceGuard::new(surface);
        let (backing_w, backing_h) = viewport.backing_size();
        surface.resize(backing_w, backing_h)?;
        let image = source.decode()?;
        render(&mut *surface, &image, viewport, info, style)
    }

    /// Stamp `source` on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// As [`composite`](Self::composite), plus
    /// [`Task`](crate::Error::Task) if the render task panics.
    #[cfg(feature = "async")]
    pub async fn composite_async(
        &self,
        source: ImageSource,
        info: WatermarkInfo,
        style: WatermarkStyle,
    ) -> Result<EncodedImage> {
        let compositor = self.clone();
        tokio::task::spawn_blocking(move || compositor.composite(&source, &info, &style)).await?
    }

    /// Stamp a single image file and write the JPEG to `output`.
    ///
    /// `output` must have a `.jpg` or `.jpeg` extension. Returns a
    /// [`ProcessResult`] indicating success or failure.
    #[must_use]
    pub fn process_file(
        &self,
        input: &Path,
        output: &Path,
        info: &WatermarkInfo,
        style: &WatermarkStyle,
    ) -> ProcessResult {
        let mut result = ProcessResult {
            path: input.to_path_buf(),
            output: None,
            success: false,
            message: String::new(),
        };

        if let Err(e) = check_output_path(output) {
            result.message = e.to_string();
            return result;
        }

        let encoded = match self.composite(&ImageSource::from(input), info, style) {
            Ok(encoded) => encoded,
            Err(e) => {
                result.message = format!("Failed to stamp: {e}");
                return result;
            }
        };

        match encoded.save(output) {
            Ok(()) => {
                result.success = true;
                result.output = Some(output.to_path_buf());
                result.message = "Watermark applied".to_string();
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Stamp every supported image in a directory with the same info.
    ///
    /// Outputs keep their file stem and get a `.jpg` extension; inputs that
    /// share a stem also keep their extension (`photo.png` becomes
    /// `photo_png.jpg`). An input whose output name is still taken fails
    /// instead of overwriting another result. Uses parallel
    /// iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        info: &WatermarkInfo,
        style: &WatermarkStyle,
    ) -> Vec<ProcessResult> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult {
                    path: input_dir.to_path_buf(),
                    output: None,
                    success: false,
                    message: format!("Failed to read directory: {e}"),
                }];
            }
        };
        entries.sort();

        if let Err(e) = std::fs::create_dir_all(output_dir) {
            return vec![ProcessResult {
                path: output_dir.to_path_buf(),
                output: None,
                success: false,
                message: format!("Failed to create output directory: {e}"),
            }];
        }

        let mut claimed = HashSet::new();
        let jobs: Vec<(PathBuf, Option<PathBuf>)> = entries
            .iter()
            .zip(batch_outputs(&entries, output_dir))
            .map(|(input, output)| {
                let output = claimed.insert(output.clone()).then_some(output);
                (input.clone(), output)
            })
            .collect();

        let stamp = |(input, output): &(PathBuf, Option<PathBuf>)| match output {
            Some(output) => self.process_file(input, output, info, style),
            None => ProcessResult {
                path: input.clone(),
                output: None,
                success: false,
                message: "Output name collides with another input".to_string(),
            },
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            jobs.par_iter().map(stamp).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            jobs.iter().map(stamp).collect()
        }
    }
}

/// Output path for each batch input, in input order.
fn batch_outputs(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let stem = |p: &Path| p.file_stem().unwrap_or_default().to_string_lossy().into_owned();

    let mut stems: HashMap<String, usize> = HashMap::new();
    for input in inputs {
        *stems.entry(stem(input)).or_default() += 1;
    }

    inputs
        .iter()
        .map(|input| {
            let stem = stem(input);
            let name = if stems.get(&stem).copied().unwrap_or_default() > 1 {
                let ext = input.extension().unwrap_or_default().to_string_lossy();
                format!("{stem}_{ext}.jpg")
            } else {
                format!("{stem}.jpg")
            };
            output_dir.join(name)
        })
        .collect()
}

/// Draw one stamped frame onto an already acquired surface.
fn render<S: Surface + ?Sized>(
    surface: &mut S,
    image: &DynamicImage,
    viewport: Viewport,
    info: &WatermarkInfo,
    style: &WatermarkStyle,
) -> Result<EncodedImage> {
    let (backing_w, backing_h) = viewport.backing_size();
    if surface.backing_size() != (backing_w, backing_h) {
        surface.resize(backing_w, backing_h)?;
    }
    surface.set_scale(viewport.device_pixel_ratio);

    let (width, height) = viewport.logical_size();
    surface.draw_image(image, Rect::new(0.0, 0.0, width, height));

    let geometry = BarGeometry::new(width, height, style.bar_height);
    debug!(
        backing_w,
        backing_h,
        dpr = viewport.device_pixel_ratio,
        bar = ?geometry.bar,
        "compositing watermark"
    );

    let layout = BarLayout::plan(
        geometry,
        info,
        style,
        Palette::from_style(style),
        |text, font| surface.measure_text(text, font),
    );
    layout.render(surface);

    let bytes = surface.encode_jpeg(JPEG_QUALITY)?;
    debug!(len = bytes.len(), "encoded watermarked image");
    Ok(EncodedImage::jpeg(bytes))
}

/// Outputs are always JPEG; refuse paths that would mislabel them.
fn check_output_path(output: &Path) -> Result<()> {
    match output.extension().and_then(|e| e.to_str()) {
        Some(ext) if matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg") => Ok(()),
        _ => Err(Error::UnsupportedFormat(output.display().to_string())),
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.png"` becomes `"photo_watermarked.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_watermarked.jpg"))
}
