// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::{fmt, str::FromStr};

/// Four character code identifying a pixel encoding.
///
/// The code is stored as the four ASCII characters in the order they are
/// written, which is the little-endian byte order of the packed `u32` used by
/// the V4L2 ABI. Both views are bit-identical: `u32::from(YUYV)` is exactly
/// the value `v4l2_fourcc('Y', 'U', 'Y', 'V')`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

/// Planar YUV 4:2:0: full resolution Y plane, then quarter resolution U and V
/// planes.
pub const YUV420: FourCC = FourCC(*b"YU12");

/// Packed YUV 4:2:2, `Y0 U Y1 V` per pixel pair.
pub const YUYV: FourCC = FourCC(*b"YUYV");

/// Interleaved YUV 4:4:4, three bytes per pixel.
pub const YUV24: FourCC = FourCC(*b"YUV3");

/// 8-bit greyscale.
pub const GREY: FourCC = FourCC(*b"GREY");

/// 10-bit greyscale in a little-endian 16-bit container.
pub const Y10: FourCC = FourCC(*b"Y10 ");

/// 11-bit greyscale in a little-endian 16-bit container.
pub const Y11: FourCC = FourCC(*b"Y11 ");

/// 12-bit greyscale in a little-endian 16-bit container.
pub const Y12: FourCC = FourCC(*b"Y12 ");

/// 16-bit greyscale, little-endian.
pub const Y16: FourCC = FourCC(*b"Y16 ");

/// RGB 24-bit pixel format (8 bits per channel, no alpha)
pub const RGB3: FourCC = FourCC(*b"RGB3");

/// JFIF JPEG frame.
pub const JPEG: FourCC = FourCC(*b"JPEG");

/// Motion-JPEG frame, usually emitted without Huffman tables.
pub const MJPG: FourCC = FourCC(*b"MJPG");

/// PNG compressed frame.
pub const PNG: FourCC = FourCC(*b"PNG ");

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Significant bits per sample for the multi-bit greyscale formats.
    pub fn grey_bit_depth(&self) -> Option<u32> {
        match *self {
            Y10 => Some(10),
            Y11 => Some(11),
            Y12 => Some(12),
            Y16 => Some(16),
            _ => None,
        }
    }

    /// Whether frames in this format are compressed bitstreams rather than
    /// pixel arrays.
    pub fn is_compressed(&self) -> bool {
        matches!(*self, JPEG | MJPG | PNG)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(value: FourCC) -> Self {
        u32::from_le_bytes(value.0)
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(value: [u8; 4]) -> Self {
        FourCC(value)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FourCC('{self}')")
    }
}

/// Error returned when a string is not a valid four character code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFourCCError(pub String);

impl fmt::Display for ParseFourCCError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid fourcc {:?}: expected 1 to 4 ASCII characters", self.0)
    }
}

impl std::error::Error for ParseFourCCError {}

impl FromStr for FourCC {
    type Err = ParseFourCCError;

    /// Parses up to four ASCII characters, padding short codes with spaces
    /// the way V4L2 spells `Y12 `.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 4 || !s.is_ascii() {
            return Err(ParseFourCCError(s.to_string()));
        }
        let mut code = [b' '; 4];
        code[..s.len()].copy_from_slice(s.as_bytes());
        Ok(FourCC(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_value_matches_v4l2() {
        // v4l2_fourcc('Y', 'U', 'Y', 'V')
        let packed = b'Y' as u32 | (b'U' as u32) << 8 | (b'Y' as u32) << 16 | (b'V' as u32) << 24;
        assert_eq!(u32::from(YUYV), packed);
        assert_eq!(FourCC::from(packed), YUYV);
        assert_eq!(u32::from(JPEG), 0x4745_504A);
    }

    #[test]
    fn display_and_parse() {
        assert_eq!(YUV420.to_string(), "YU12");
        assert_eq!(format!("{:?}", Y12), "FourCC('Y12 ')");
        assert_eq!(FourCC::from(0).to_string(), "....");
        assert_eq!("Y12".parse::<FourCC>(), Ok(Y12));
        assert_eq!("RGB3".parse::<FourCC>(), Ok(RGB3));
        assert!("RGBA8".parse::<FourCC>().is_err());
        assert!("".parse::<FourCC>().is_err());
    }

    #[test]
    fn equality_is_exact() {
        assert_ne!(JPEG, MJPG);
        assert_ne!(Y12, FourCC(*b"Y12\0"));
        assert_eq!(Y16.grey_bit_depth(), Some(16));
        assert_eq!(GREY.grey_bit_depth(), None);
        assert!(MJPG.is_compressed());
        assert!(!YUYV.is_compressed());
    }
}
