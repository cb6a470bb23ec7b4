// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Chroma-subsampled YUV transforms.
//!
//! Colour conversion uses the BT.601 integer approximation on studio-swing
//! input (luma 16..235, chroma 16..240).

use super::{publish, source_bytes};
use crate::{
    error::Result,
    fourcc::{RGB3, YUV24, YUV420, YUYV},
    frame::FrameBuffer,
};
use tracing::trace;

/// Saturates a signed intermediate into the `0..=255` range.
#[inline]
pub fn clamp8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Converts one BT.601 Y'CbCr sample to RGB.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        clamp8((298 * c + 409 * e + 128) >> 8),
        clamp8((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp8((298 * c + 516 * d + 128) >> 8),
    ]
}

/// Offsets of the U and V planes and the length of a planar 4:2:0 frame.
fn planar_layout(width: usize, height: usize) -> (usize, usize, usize) {
    let u_plane = width * height;
    let v_plane = u_plane + width * height / 4;
    let needed = if width == 0 || height == 0 {
        0
    } else {
        v_plane + chroma_index(width, width - 1, height - 1) + 1
    };
    (u_plane, v_plane, needed)
}

#[inline]
fn chroma_index(width: usize, x: usize, y: usize) -> usize {
    y / 2 * (width / 2) + x / 2
}

/// Planar 4:2:0 to packed RGB24.
pub fn yuv420_to_rgb24(src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let (u_plane, v_plane, needed) = planar_layout(w, h);
    let input = source_bytes(src, YUV420, needed)?;
    trace!("YU12 -> RGB3 {w}x{h}");

    let len = w * h * 3;
    dst.reserve(len)?;
    let out = &mut dst.data_mut()[..len];
    for y in 0..h {
        let row = &mut out[y * w * 3..(y + 1) * w * 3];
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let c = chroma_index(w, x, y);
            px.copy_from_slice(&yuv_to_rgb(
                input[y * w + x],
                input[u_plane + c],
                input[v_plane + c],
            ));
        }
    }
    publish(dst, src, RGB3, len)
}

/// Byte length of a packed 4:2:2 frame, including the chroma of a trailing
/// odd column.
fn packed_len(width: usize, height: usize) -> usize {
    if width == 0 || height == 0 {
        0
    } else {
        (width - 1) / 2 * 4 + (height - 1) * width * 2 + 4
    }
}

/// Packed 4:2:2 (Y0 U Y1 V) to packed RGB24.
pub fn yuyv_to_rgb24(src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let input = source_bytes(src, YUYV, packed_len(w, h))?;
    trace!("YUYV -> RGB3 {w}x{h}");

    let len = w * h * 3;
    dst.reserve(len)?;
    let out = &mut dst.data_mut()[..len];
    for y in 0..h {
        let row = &mut out[y * w * 3..(y + 1) * w * 3];
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let chroma = x / 2 * 4 + y * w * 2;
            px.copy_from_slice(&yuv_to_rgb(
                input[(x + y * w) * 2],
                input[chroma + 1],
                input[chroma + 3],
            ));
        }
    }
    publish(dst, src, RGB3, len)
}

/// Planar 4:2:0 to interleaved 4:4:4, repeating each chroma sample over its
/// 2x2 block.
pub fn yuv420_to_yuv24(src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let (u_plane, v_plane, needed) = planar_layout(w, h);
    let input = source_bytes(src, YUV420, needed)?;
    trace!("YU12 -> YUV3 {w}x{h}");

    let len = w * h * 3;
    dst.reserve(len)?;
    let out = &mut dst.data_mut()[..len];
    for y in 0..h {
        let row = &mut out[y * w * 3..(y + 1) * w * 3];
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let c = chroma_index(w, x, y);
            px[0] = input[y * w + x];
            px[1] = input[u_plane + c];
            px[2] = input[v_plane + c];
        }
    }
    publish(dst, src, YUV24, len)
}
