//! Color handling for the evaluator
//!
//! This module provides the Color type behind Sass color values. It can parse
//! hex literals and CSS color keywords, converts to and from HSL for the color
//! adjustment functions, and prints itself the way extracted values expect
//! (`rgb(...)` or `rgba(...)`).

use std::fmt;

use super::value::format_number;

/// Represents a color with RGBA components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red component (0-255)
    pub r: f64,
    /// Green component (0-255)
    pub g: f64,
    /// Blue component (0-255)
    pub b: f64,
    /// Alpha component (0.0-1.0)
    pub a: f64,
}

/// CSS color keywords with their hex values
const COLOR_KEYWORDS: &[(&str, &str)] = &[
    ("aqua", "00ffff"),
    ("black", "000000"),
    ("blue", "0000ff"),
    ("brown", "a52a2a"),
    ("crimson", "dc143c"),
    ("cyan", "00ffff"),
    ("darkblue", "00008b"),
    ("darkgray", "a9a9a9"),
    ("darkgreen", "006400"),
    ("darkgrey", "a9a9a9"),
    ("darkred", "8b0000"),
    ("fuchsia", "ff00ff"),
    ("gold", "ffd700"),
    ("gray", "808080"),
    ("green", "008000"),
    ("grey", "808080"),
    ("indigo", "4b0082"),
    ("lightblue", "add8e6"),
    ("lightgray", "d3d3d3"),
    ("lightgreen", "90ee90"),
    ("lightgrey", "d3d3d3"),
    ("lime", "00ff00"),
    ("magenta", "ff00ff"),
    ("maroon", "800000"),
    ("navy", "000080"),
    ("olive", "808000"),
    ("orange", "ffa500"),
    ("pink", "ffc0cb"),
    ("purple", "800080"),
    ("red", "ff0000"),
    ("silver", "c0c0c0"),
    ("teal", "008080"),
    ("tomato", "ff6347"),
    ("violet", "ee82ee"),
    ("white", "ffffff"),
    ("yellow", "ffff00"),
];

impl Color {
    /// Create a new color with RGB components and full opacity
    pub fn new_rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a new color with RGBA components, clamped to their valid ranges
    pub fn new_rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r.clamp(0.0, 255.0),
            g: g.clamp(0.0, 255.0),
            b: b.clamp(0.0, 255.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Parse a hex color string and return a Color
    /// Supports 3-digit (#rgb), 4-digit (#rgba), 6-digit (#rrggbb) and 8-digit (#rrggbbaa) formats
    pub fn from_hex(hex_value: &str) -> Option<Self> {
        let hex_part = hex_value.strip_prefix('#').unwrap_or(hex_value);
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).ok().map(f64::from);
        let short = |index: usize| channel(&hex_part[index..index + 1].repeat(2));
        let long = |index: usize| channel(&hex_part[index * 2..index * 2 + 2]);

        match hex_part.len() {
            3 => Some(Self::new_rgb(short(0)?, short(1)?, short(2)?)),
            4 => Some(Self::new_rgba(short(0)?, short(1)?, short(2)?, short(3)? / 255.0)),
            6 => Some(Self::new_rgb(long(0)?, long(1)?, long(2)?)),
            8 => Some(Self::new_rgba(long(0)?, long(1)?, long(2)?, long(3)? / 255.0)),
            _ => None,
        }
    }

    /// Look up a CSS color keyword (case-insensitive)
    pub fn from_keyword(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name == "transparent" {
            return Some(Self::new_rgba(0.0, 0.0, 0.0, 0.0));
        }
        COLOR_KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == name)
            .and_then(|(_, hex)| Self::from_hex(hex))
    }

    /// Create a color from hue in degrees and saturation and lightness in percent
    pub fn from_hsla(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Self {
        let h = hue.rem_euclid(360.0) / 360.0;
        let s = (saturation / 100.0).clamp(0.0, 1.0);
        let l = (lightness / 100.0).clamp(0.0, 1.0);

        let q = if l <= 0.5 { l * (s + 1.0) } else { l + s - l * s };
        let p = l * 2.0 - q;

        Self::new_rgba(
            hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0,
            hue_to_rgb(p, q, h) * 255.0,
            hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0,
            alpha,
        )
    }

    /// Hue in degrees (0-360), saturation and lightness in percent (0-100)
    pub fn to_hsl(&self) -> (f64, f64, f64) {
        let r = self.r / 255.0;
        let g = self.g / 255.0;
        let b = self.b / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let lightness = (max + min) / 2.0;

        if delta == 0.0 {
            return (0.0, 0.0, lightness * 100.0);
        }

        let saturation = if lightness < 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };
        let hue = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        (hue * 60.0, saturation * 100.0, lightness * 100.0)
    }

    /// Same channels with a different alpha
    pub fn with_alpha(&self, alpha: f64) -> Self {
        Self::new_rgba(self.r, self.g, self.b, alpha)
    }

    /// Blend two colors; `weight` (0-1) is the share of `self`, adjusted for
    /// the difference in alpha
    pub fn mix(&self, other: &Color, weight: f64) -> Self {
        let scaled = weight * 2.0 - 1.0;
        let alpha_delta = self.a - other.a;
        let combined = if scaled * alpha_delta == -1.0 {
            scaled
        } else {
            (scaled + alpha_delta) / (1.0 + scaled * alpha_delta)
        };
        let own = (combined + 1.0) / 2.0;
        let rest = 1.0 - own;

        Self::new_rgba(
            self.r * own + other.r * rest,
            self.g * own + other.g * rest,
            self.b * own + other.b * rest,
            self.a * weight + other.a * (1.0 - weight),
        )
    }

    /// Convert to hex string format (#rrggbb)
    pub fn to_hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            self.r.round() as u8,
            self.g.round() as u8,
            self.b.round() as u8
        )
    }
}

fn hue_to_rgb(p: f64, q: f64, hue: f64) -> f64 {
    let hue = if hue < 0.0 {
        hue + 1.0
    } else if hue > 1.0 {
        hue - 1.0
    } else {
        hue
    };

    if hue * 6.0 < 1.0 {
        p + (q - p) * hue * 6.0
    } else if hue * 2.0 < 1.0 {
        q
    } else if hue * 3.0 < 2.0 {
        p + (q - p) * (2.0 / 3.0 - hue) * 6.0
    } else {
        p
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, g, b) = (format_number(self.r), format_number(self.g), format_number(self.b));
        if self.a == 1.0 {
            write!(f, "rgb({}, {}, {})", r, g, b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", r, g, b, format_number(self.a))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_creation() {
        let color = Color::new_rgb(255.0, 128.0, 64.0);
        assert_eq!(color.r, 255.0);
        assert_eq!(color.g, 128.0);
        assert_eq!(color.b, 64.0);
        assert_eq!(color.a, 1.0);

        let clamped = Color::new_rgba(300.0, -4.0, 64.0, 1.5);
        assert_eq!(clamped.r, 255.0);
        assert_eq!(clamped.g, 0.0);
        assert_eq!(clamped.a, 1.0);
    }

    #[test]
    fn test_hex_parsing() {
        let color = Color::from_hex("#ff8040").unwrap();
        assert_eq!((color.r, color.g, color.b, color.a), (255.0, 128.0, 64.0, 1.0));

        let color = Color::from_hex("f84").unwrap();
        assert_eq!((color.r, color.g, color.b), (255.0, 136.0, 68.0));

        let color = Color::from_hex("#ff804080").unwrap();
        assert!((color.a - 0.5019608).abs() < 0.001); // 128/255

        let color = Color::from_hex("#f008").unwrap();
        assert_eq!(color.r, 255.0);
        assert!((color.a - 0.5333).abs() < 0.001); // 0x88/255

        assert!(Color::from_hex("#invalid").is_none());
        assert!(Color::from_hex("#ff").is_none());
        assert!(Color::from_hex("#fffff").is_none());
    }

    #[test]
    fn test_keywords() {
        assert_eq!(Color::from_keyword("red"), Some(Color::new_rgb(255.0, 0.0, 0.0)));
        assert_eq!(Color::from_keyword("White"), Some(Color::new_rgb(255.0, 255.0, 255.0)));
        assert_eq!(Color::from_keyword("transparent").map(|c| c.a), Some(0.0));
        assert!(Color::from_keyword("solid").is_none());
    }

    #[test]
    fn test_hsl_conversion() {
        let (h, s, l) = Color::new_rgb(255.0, 0.0, 0.0).to_hsl();
        assert_eq!((h, s, l), (0.0, 100.0, 50.0));

        let (h, s, l) = Color::from_hex("#336699").unwrap().to_hsl();
        assert!((h - 210.0).abs() < 1e-9);
        assert!((s - 50.0).abs() < 1e-9);
        assert!((l - 40.0).abs() < 1e-9);

        assert_eq!(Color::from_hsla(0.0, 100.0, 40.0, 1.0).to_string(), "rgb(204, 0, 0)");
        assert_eq!(Color::from_hsla(210.0, 50.0, 40.0, 1.0).to_hex(), "#336699");
        assert_eq!(Color::from_hsla(120.0, 0.0, 50.0, 0.5).to_string(), "rgba(127.5, 127.5, 127.5, 0.5)");
    }

    #[test]
    fn test_mix() {
        let black = Color::new_rgb(0.0, 0.0, 0.0);
        let white = Color::new_rgb(255.0, 255.0, 255.0);
        assert_eq!(black.mix(&white, 0.5).to_string(), "rgb(127.5, 127.5, 127.5)");
        assert_eq!(black.mix(&white, 1.0), black);
        assert_eq!(black.mix(&white, 0.0), white);

        let faded = Color::new_rgba(255.0, 0.0, 0.0, 0.0);
        let blue = Color::new_rgb(0.0, 0.0, 255.0);
        assert_eq!(faded.mix(&blue, 0.5).a, 0.5);
    }

    #[test]
    fn test_hex_conversion() {
        assert_eq!(Color::new_rgb(255.0, 128.0, 64.0).to_hex(), "#ff8040");
    }

    #[test]
    fn test_display() {
        assert_eq!(Color::new_rgb(255.0, 0.0, 0.0).to_string(), "rgb(255, 0, 0)");
        assert_eq!(
            Color::new_rgba(255.0, 0.0, 0.0, 0.5).to_string(),
            "rgba(255, 0, 0, 0.5)"
        );
        assert_eq!(Color::new_rgb(1.5, 2.0, 3.0).to_string(), "rgb(1.5, 2, 3)");
        assert_eq!(Color::new_rgb(0.8 * 255.0, 0.0, 0.0).to_string(), "rgb(204, 0, 0)");
    }
}
