//! CSS color string parsing.
//!
//! Styles carry colors the way a canvas fill style does: `#rgb`, `#rgba`,
//! `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` or one of a few
//! named colors. Everything resolves to straight (non-premultiplied) RGBA.

use image::Rgba;

use crate::error::{Error, Result};

/// Parse a CSS color string into an RGBA pixel.
///
/// # Errors
///
/// Returns [`Error::InvalidColor`] if the string is not one of the supported
/// syntaxes or a component is out of range.
pub fn parse_color(input: &str) -> Result<Rgba<u8>> {
    let s = input.trim();
    let invalid = || Error::InvalidColor(input.to_string());

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }

    let lower = s.to_ascii_lowercase();
    if let Some(args) = functional_args(&lower, "rgba").or_else(|| functional_args(&lower, "rgb"))
    {
        return parse_functional(args).ok_or_else(invalid);
    }

    named(&lower).ok_or_else(invalid)
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Strip `name(` ... `)` and return the argument list.
fn functional_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_functional(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |p: &str| -> Option<u8> {
        let v: f32 = p.parse().ok()?;
        if !(0.0..=255.0).contains(&v) {
            return None;
        }
        Some(v.round() as u8)
    };

    let alpha = match parts.get(3) {
        Some(p) => {
            let a: f32 = p.parse().ok()?;
            if !(0.0..=1.0).contains(&a) {
                return None;
            }
            (a * 255.0).round() as u8
        }
        None => 255,
    };

    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

fn named(name: &str) -> Option<Rgba<u8>> {
    let rgba = match name {
        "black" => [0, 0, 0, 255],
        "white" => [255, 255, 255, 255],
        "red" => [255, 0, 0, 255],
        "green" => [0, 128, 0, 255],
        "blue" => [0, 0, 255, 255],
        "yellow" => [255, 255, 0, 255],
        "gray" | "grey" => [128, 128, 128, 255],
        "transparent" => [0, 0, 0, 0],
        _ => return None,
    };
    Some(Rgba(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#ABC").unwrap(), Rgba([170, 187, 204, 255]));
        assert_eq!(parse_color("#FF0000").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(parse_color("#00000080").unwrap(), Rgba([0, 0, 0, 128]));
        assert_eq!(parse_color("#0008").unwrap(), Rgba([0, 0, 0, 136]));
    }

    #[test]
    fn parses_functional_notation() {
        assert_eq!(
            parse_color("rgba(0,0,0,0.5)").unwrap(),
            Rgba([0, 0, 0, 128])
        );
        assert_eq!(
            parse_color("rgb( 12, 34 , 56 )").unwrap(),
            Rgba([12, 34, 56, 255])
        );
        assert_eq!(
            parse_color("RGBA(255, 255, 255, 1)").unwrap(),
            Rgba([255, 255, 255, 255])
        );
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!(parse_color("white").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color(" Black ").unwrap(), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_color("transparent").unwrap()[3], 0);
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in [
            "", "fff", "#ff", "#fffff", "#ggg", "#ééé", "rgb(1,2)", "rgba(0,0,0,2)",
            "rgb(300,0,0)", "rgb(1,2,3", "chartreuse-ish",
        ] {
            assert!(
                matches!(parse_color(bad), Err(Error::InvalidColor(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
