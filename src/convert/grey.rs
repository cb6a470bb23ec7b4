// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Single-channel grey transforms.
//!
//! N-bit grey formats store each sample in a little-endian 16-bit container
//! with the unused high bits clear.

use super::{publish, source_bytes};
use crate::{
    error::Result,
    fourcc::{FourCC, GREY, RGB3},
    frame::FrameBuffer,
};
use tracing::trace;

#[inline]
fn to_grey8(sample: &[u8], shift: u32) -> u8 {
    (u16::from_le_bytes([sample[0], sample[1]]) >> shift) as u8
}

fn shift_for(bits: u32) -> u32 {
    bits.clamp(8, 16) - 8
}

/// N-bit grey to 8-bit grey, keeping the most significant bits.
pub fn grey_to_grey8(bits: u32, src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let input = source_bytes(src, src.format(), w * h * 2)?;
    let shift = shift_for(bits);
    trace!("Y{bits} -> GREY {w}x{h}");

    let len = w * h;
    dst.reserve(len)?;
    for (out, sample) in dst.data_mut()[..len]
        .iter_mut()
        .zip(input.chunks_exact(2))
    {
        *out = to_grey8(sample, shift);
    }
    publish(dst, src, GREY, len)
}

/// N-bit grey to RGB24 with the luma replicated into every channel.
pub fn grey_to_rgb24(bits: u32, src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let input = source_bytes(src, src.format(), w * h * 2)?;
    let shift = shift_for(bits);
    trace!("Y{bits} -> RGB3 {w}x{h}");

    let len = w * h * 3;
    dst.reserve(len)?;
    for (px, sample) in dst.data_mut()[..len]
        .chunks_exact_mut(3)
        .zip(input.chunks_exact(2))
    {
        px.fill(to_grey8(sample, shift));
    }
    publish(dst, src, RGB3, len)
}

/// 8-bit grey to RGB24.
pub fn grey8_to_rgb24(src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let input = source_bytes(src, GREY, w * h)?;

    let len = w * h * 3;
    dst.reserve(len)?;
    for (px, &luma) in dst.data_mut()[..len].chunks_exact_mut(3).zip(input) {
        px.fill(luma);
    }
    publish(dst, src, RGB3, len)
}

/// Copies a frame that is already in the requested layout.
pub fn copy_frame(
    src: &FrameBuffer,
    dst: &mut FrameBuffer,
    format: FourCC,
    bytes_per_pixel: usize,
) -> Result<()> {
    let len = src.width() as usize * src.height() as usize * bytes_per_pixel;
    let input = source_bytes(src, format, len)?;
    dst.reserve(len)?;
    dst.data_mut()[..len].copy_from_slice(&input[..len]);
    publish(dst, src, format, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::{Y12, Y16};

    #[test]
    fn twelve_bit_sample_maps_to_full_scale() {
        let src = FrameBuffer::from_bytes(1, 1, Y12, &0x0FF0u16.to_le_bytes()).unwrap();
        let mut dst = FrameBuffer::new();
        grey_to_grey8(12, &src, &mut dst).unwrap();
        assert_eq!(dst.format(), GREY);
        assert_eq!(dst.data(), &[0xFF]);
    }

    #[test]
    fn rgb_replicates_luma() {
        let samples: Vec<u8> = [0x0000u16, 0x8000, 0xFFFF]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let src = FrameBuffer::from_bytes(3, 1, Y16, &samples).unwrap();
        let mut dst = FrameBuffer::new();
        grey_to_rgb24(16, &src, &mut dst).unwrap();
        assert_eq!(dst.used(), 9);
        assert_eq!(dst.data(), &[0, 0, 0, 0x80, 0x80, 0x80, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn grey8_expands_to_rgb() {
        let src = FrameBuffer::from_bytes(2, 1, GREY, &[7, 200]).unwrap();
        let mut dst = FrameBuffer::new();
        grey8_to_rgb24(&src, &mut dst).unwrap();
        assert_eq!(dst.data(), &[7, 7, 7, 200, 200, 200]);
    }

    #[test]
    fn copy_keeps_geometry() {
        let src = FrameBuffer::from_bytes(2, 2, GREY, &[1, 2, 3, 4]).unwrap();
        let mut dst = FrameBuffer::new();
        copy_frame(&src, &mut dst, GREY, 1).unwrap();
        assert_eq!((dst.width(), dst.height(), dst.format()), (2, 2, GREY));
        assert_eq!(dst.data(), src.data());
    }
}
