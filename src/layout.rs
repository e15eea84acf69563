//! Geometry of the info bar and the draw plan for its contents.
//!
//! Layout is pure: it turns a viewport size, a [`WatermarkInfo`], a
//! [`WatermarkStyle`] and a text measure into an ordered list of
//! [`DrawOp`]s. Nothing here touches pixels, so every position can be checked
//! without rendering.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────┐
//!  │   left block (40%)    │  right block (60%)       │
//!  │        14:30          │  name                    │
//!  │      2024-01-15       │  company...              │
//!  │                       │  39.900000°N,116.4...°E  │
//!  │                       │  address, wrapped        │
//!  └──────────────────────────────────────────────────┘
//! ```

use image::Rgba;
use tracing::warn;

use crate::color::parse_color;
use crate::info::{
    format_lat_lng, split_time, WatermarkInfo, WatermarkStyle, DEFAULT_BACKGROUND_COLOR,
    DEFAULT_TEXT_COLOR,
};
use crate::surface::{FontSpec, Rect, Surface};
use crate::text::{truncate_chars, truncate_with_ellipsis, wrap_chars};

/// Horizontal padding between the viewport edges and the bar.
pub const BAR_PADDING: f32 = 16.0;
/// Extra gap between the bar and the bottom padding.
pub const BAR_BOTTOM_GAP: f32 = 20.0;
/// Corner radius of the bar.
pub const BAR_RADIUS: f32 = 12.0;

const LEFT_SHARE: f32 = 0.4;

const DIVIDER_INSET: f32 = 16.0;
const DIVIDER_WIDTH: f32 = 2.0;
const DIVIDER_MARGIN: f32 = 12.0;

const TIME_TOP: f32 = 26.0;
const TIME_FONT_SIZE: f32 = 32.0;
const TIME_ADVANCE: f32 = 36.0;
const TIME_CHARS: usize = 5;

const RIGHT_TOP: f32 = 16.0;
const RIGHT_INSET: f32 = 16.0;
const NAME_FONT_SIZE: f32 = 18.0;
const NAME_ADVANCE: f32 = 24.0;
const LINE_ADVANCE: f32 = 20.0;
const COMPANY_MARGIN: f32 = 24.0;
const ADDRESS_MARGIN: f32 = 12.0;
const ADDRESS_LINE_HEIGHT: f32 = 18.0;
const ADDRESS_MAX_CHARS: usize = 30;

/// Position and split of the info bar, in logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    /// The rounded bar itself.
    pub bar: Rect,
    /// Width of the time block.
    pub left_width: f32,
    /// Width of the metadata block.
    pub right_width: f32,
}

impl BarGeometry {
    /// Lay the bar out for a viewport of `width × height` logical pixels.
    #[must_use]
    pub fn new(width: f32, height: f32, bar_height: f32) -> Self {
        let bar_width = width - BAR_PADDING * 2.0;
        let bar_y = height - bar_height - BAR_PADDING - BAR_BOTTOM_GAP;
        Self {
            bar: Rect::new(BAR_PADDING, bar_y, bar_width, bar_height),
            left_width: bar_width * LEFT_SHARE,
            right_width: bar_width * (1.0 - LEFT_SHARE),
        }
    }

    /// Left edge of the metadata block.
    #[must_use]
    pub fn right_x(&self) -> f32 {
        self.bar.x + self.left_width
    }

    /// X position of the vertical divider.
    #[must_use]
    pub fn divider_x(&self) -> f32 {
        self.right_x() - DIVIDER_INSET
    }

    /// Left edge of every line in the metadata block.
    #[must_use]
    pub fn text_x(&self) -> f32 {
        self.right_x() + RIGHT_INSET
    }

    /// Widest a company line may be.
    #[must_use]
    pub fn company_max_width(&self) -> f32 {
        self.right_width - COMPANY_MARGIN
    }

    /// Widest an address line may be.
    #[must_use]
    pub fn address_max_width(&self) -> f32 {
        self.right_width - ADDRESS_MARGIN
    }
}

/// Resolved bar colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    /// Bar fill.
    pub background: Rgba<u8>,
    /// Text and divider.
    pub text: Rgba<u8>,
}

impl Palette {
    /// Resolve the style's color strings.
    ///
    /// An unparseable color is ignored in favour of the default, the way a
    /// canvas ignores an invalid fill style.
    #[must_use]
    pub fn from_style(style: &WatermarkStyle) -> Self {
        Self {
            background: resolve(&style.background_color, DEFAULT_BACKGROUND_COLOR),
            text: resolve(&style.text_color, DEFAULT_TEXT_COLOR),
        }
    }
}

fn resolve(value: &str, fallback: &str) -> Rgba<u8> {
    parse_color(value).unwrap_or_else(|e| {
        warn!(error = %e, fallback, "ignoring invalid watermark color");
        parse_color(fallback).unwrap_or(Rgba([0, 0, 0, 255]))
    })
}

/// One drawing step.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Fill a rounded rectangle.
    RoundedRect {
        /// Area to fill.
        rect: Rect,
        /// Corner radius.
        radius: f32,
        /// Fill color.
        color: Rgba<u8>,
    },
    /// Stroke a line segment.
    Line {
        /// Start point.
        from: (f32, f32),
        /// End point.
        to: (f32, f32),
        /// Stroke width.
        width: f32,
        /// Stroke color.
        color: Rgba<u8>,
    },
    /// Draw a run of text, top-left anchored.
    Text {
        /// The text.
        text: String,
        /// Left edge.
        x: f32,
        /// Top of the em box.
        y: f32,
        /// Font.
        font: FontSpec,
        /// Fill color.
        color: Rgba<u8>,
    },
}

/// The complete, ordered draw plan for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLayout {
    /// Geometry the plan was computed for.
    pub geometry: BarGeometry,
    /// Drawing steps, back to front.
    pub ops: Vec<DrawOp>,
}

impl BarLayout {
    /// Plan the bar.
    ///
    /// `measure` returns the advance width of a string in a font, in logical
    /// units. Each metadata line owns a fixed slot: a missing or hidden line
    /// leaves its slot empty instead of pulling later lines up.
    pub fn plan<F>(
        geometry: BarGeometry,
        info: &WatermarkInfo,
        style: &WatermarkStyle,
        palette: Palette,
        measure: F,
    ) -> Self
    where
        F: Fn(&str, FontSpec) -> f32,
    {
        let bar = geometry.bar;
        let mut ops = vec![DrawOp::RoundedRect {
            rect: bar,
            radius: BAR_RADIUS,
            color: palette.background,
        }];
        let mut push_text = |text: String, x: f32, y: f32, font: FontSpec| {
            ops.push(DrawOp::Text {
                text,
                x,
                y,
                font,
                color: palette.text,
            });
        };

        if let Some(time) = non_empty(info.time.as_ref()).filter(|_| style.show_time) {
            let (date_part, rest) = split_time(time);
            let time_part: String = rest
                .split(' ')
                .next()
                .unwrap_or_default()
                .chars()
                .take(TIME_CHARS)
                .collect();

            let centered = |s: &str, font: FontSpec| {
                bar.x + (geometry.left_width - measure(s, font)) / 2.0
            };

            let y = bar.y + TIME_TOP;
            let font = FontSpec::bold(TIME_FONT_SIZE);
            let x = centered(&time_part, font);
            push_text(time_part, x, y, font);

            let font = FontSpec::bold(style.font_size);
            push_text(
                date_part.to_string(),
                centered(date_part, font),
                y + TIME_ADVANCE,
                font,
            );
        }

        let x = geometry.text_x();
        let mut y = bar.y + RIGHT_TOP;

        if let Some(name) = non_empty(info.name.as_ref()).filter(|_| style.show_name) {
            push_text(name.to_string(), x, y, FontSpec::bold(NAME_FONT_SIZE));
        }
        y += NAME_ADVANCE;

        let font = FontSpec::regular(style.font_size);
        if let Some(company) = non_empty(info.company.as_ref()).filter(|_| style.show_company) {
            let fitted =
                truncate_with_ellipsis(company, geometry.company_max_width(), |s| measure(s, font));
            push_text(fitted, x, y, font);
        }
        y += LINE_ADVANCE;

        if let (Some(lat), Some(lng), true) = (info.lat, info.lng, style.show_location) {
            push_text(format_lat_lng(lat, lng), x, y, font);
        }
        y += LINE_ADVANCE;

        if let Some(address) = non_empty(info.address.as_ref()).filter(|_| style.show_location) {
            let address = truncate_chars(address, ADDRESS_MAX_CHARS);
            for line in wrap_chars(&address, geometry.address_max_width(), |s| measure(s, font)) {
                push_text(line, x, y, font);
                y += ADDRESS_LINE_HEIGHT;
            }
        }

        let divider_x = geometry.divider_x();
        ops.push(DrawOp::Line {
            from: (divider_x, bar.y + DIVIDER_MARGIN),
            to: (divider_x, bar.bottom() - DIVIDER_MARGIN),
            width: DIVIDER_WIDTH,
            color: palette.text,
        });

        Self { geometry, ops }
    }

    /// The text runs of the plan, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, f32, f32, FontSpec)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text {
                text, x, y, font, ..
            } => Some((text.as_str(), *x, *y, *font)),
            _ => None,
        })
    }

    /// Replay the plan onto a surface.
    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S) {
        for op in &self.ops {
            match op {
                DrawOp::RoundedRect {
                    rect,
                    radius,
                    color,
                } => surface.fill_rounded_rect(*rect, *radius, *color),
                DrawOp::Line {
                    from,
                    to,
                    width,
                    color,
                } => surface.stroke_line(*from, *to, *width, *color),
                DrawOp::Text {
                    text,
                    x,
                    y,
                    font,
                    color,
                } => surface.fill_text(text, *x, *y, *font, *color),
            }
        }
    }
}

/// Empty strings count as absent, like a falsy field.
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}
