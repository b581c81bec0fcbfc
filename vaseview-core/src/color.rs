//! RGB colors as used by view parameters and materials

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid color {0:?}, expected #rrggbb")]
pub struct ColorParseError(pub String);

/// An 8-bit-per-channel RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Channels as linear-ish floats in `[0, 1]`
    pub fn to_f32(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    /// Inverse of [`Rgb::to_f32`], clamping out-of-range channels
    pub fn from_f32(c: [f32; 3]) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(q(c[0]), q(c[1]), q(c[2]))
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Rgb::from_hex)
            .map_err(|_| ColorParseError(s.to_string()))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let red: Rgb = "#f14a4a".parse().unwrap();
        assert_eq!(red, Rgb::new(0xf1, 0x4a, 0x4a));
        assert_eq!(red.to_string(), "#f14a4a");
        assert_eq!("99DADA".parse::<Rgb>().unwrap(), Rgb::from_hex(0x99dada));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("#fff".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert!("".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_float_conversion_clamps() {
        assert_eq!(Rgb::from_f32([2.0, -1.0, 0.5]), Rgb::new(255, 0, 128));
        assert_eq!(Rgb::from_f32(Rgb::new(10, 20, 30).to_f32()), Rgb::new(10, 20, 30));
    }
}
