//! RGBA colors as stored by the configuration store.
//!
//! Channels `r`, `g`, `b` are bytes. Alpha is stored as a fraction in `[0, 1]`
//! and only converted to the engine's byte range by [`Rgba::to_engine`], which
//! the call surface invokes at the moment of the engine call.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{BridgeError, BridgeResult};

/// A color with byte channels and fractional alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha as a fraction in `[0, 1]`.
    pub a: f32,
}

impl Rgba {
    /// Create a color, clamping alpha into `[0, 1]`.
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        let a = if a.is_nan() { 1.0 } else { a.clamp(0.0, 1.0) };
        Self { r, g, b, a }
    }

    /// Create a fully opaque color.
    #[must_use]
    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// The same color with alpha brought back into `[0, 1]`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(self.r, self.g, self.b, self.a)
    }

    /// Channels in the engine's byte range, alpha scaled by 255.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_engine(&self) -> [u8; 4] {
        let alpha = (self.a.clamp(0.0, 1.0) * 255.0).round() as u8;
        [self.r, self.g, self.b, alpha]
    }
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*rgba?\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*(?:,\s*([\d.]+)\s*)?\)\s*$")
            .unwrap_or_else(|e| unreachable!("color pattern is a valid regex: {e}"))
    })
}

fn channel(text: &str, input: &str) -> BridgeResult<u8> {
    text.parse::<u8>()
        .map_err(|_| BridgeError::InvalidColor(input.to_string()))
}

impl FromStr for Rgba {
    type Err = BridgeError;

    /// Parse `rgb(r, g, b)` or `rgba(r, g, b, a)`. Alpha defaults to 1.
    fn from_str(s: &str) -> BridgeResult<Self> {
        let caps = color_pattern()
            .captures(s)
            .ok_or_else(|| BridgeError::InvalidColor(s.to_string()))?;

        let r = channel(&caps[1], s)?;
        let g = channel(&caps[2], s)?;
        let b = channel(&caps[3], s)?;
        let a = match caps.get(4) {
            Some(m) => {
                let a: f32 = m
                    .as_str()
                    .parse()
                    .map_err(|_| BridgeError::InvalidColor(s.to_string()))?;
                if !(0.0..=1.0).contains(&a) {
                    return Err(BridgeError::InvalidColor(s.to_string()));
                }
                a
            }
            None => 1.0,
        };

        Ok(Self { r, g, b, a })
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rgba_string() {
        let color: Rgba = "rgba(12, 34, 56, 0.5)".parse().unwrap();
        assert_eq!(color, Rgba::new(12, 34, 56, 0.5));
    }

    #[test]
    fn test_parses_rgb_string_with_default_alpha() {
        let color: Rgba = "rgb(255,0,128)".parse().unwrap();
        assert_eq!(color, Rgba::opaque(255, 0, 128));
    }

    #[test]
    fn test_display_reparses_to_same_channels() {
        for input in ["rgba(240, 240, 240, 1)", "rgba(0, 0, 0, 0.25)", "rgb(1, 2, 3)"] {
            let parsed: Rgba = input.parse().unwrap();
            let reparsed: Rgba = parsed.to_string().parse().unwrap();
            assert_eq!(parsed, reparsed, "round trip of {input}");
        }
    }

    #[test]
    fn test_rejects_malformed_strings() {
        for input in ["", "#ff0000", "rgba(1, 2)", "rgb(256, 0, 0)", "rgba(1, 2, 3, 1.5)"] {
            let result = input.parse::<Rgba>();
            assert!(
                matches!(result, Err(BridgeError::InvalidColor(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_engine_alpha_is_scaled_to_bytes() {
        assert_eq!(Rgba::new(1, 2, 3, 1.0).to_engine(), [1, 2, 3, 255]);
        assert_eq!(Rgba::new(1, 2, 3, 0.5).to_engine(), [1, 2, 3, 128]);
        assert_eq!(Rgba::new(1, 2, 3, 0.0).to_engine(), [1, 2, 3, 0]);
    }

    #[test]
    fn test_clamped_repairs_deserialized_alpha() {
        let raw: Rgba = serde_json::from_str(r#"{"r":0,"g":0,"b":0,"a":2.0}"#).unwrap();
        assert!((raw.clamped().a - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_new_clamps_alpha() {
        assert!((Rgba::new(0, 0, 0, 3.0).a - 1.0).abs() < f32::EPSILON);
        assert!(Rgba::new(0, 0, 0, -1.0).a.abs() < f32::EPSILON);
    }
}
