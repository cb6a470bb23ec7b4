// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pixel-format conversion.
//!
//! [`convert_into`] applies one named transform into a caller-supplied
//! buffer. [`ConversionEngine`] chains transforms into complete paths (for
//! example `YU12 -> YUV3 -> JPEG`) and writes the results into a small pool of
//! reused buffers.

pub mod grey;
pub mod jpeg;
pub mod png;
pub mod yuv;

use crate::{
    error::{Error, Result},
    fourcc::{FourCC, GREY, JPEG, PNG, RGB3, YUV24, YUV420, YUYV},
    frame::FrameBuffer,
};
use std::fmt;
use tracing::{debug, instrument};

pub use jpeg::JpegEncoder;
pub use png::PngEncoder;
pub use yuv::{clamp8, yuv_to_rgb};

/// Number of output buffers cycled by a [`ConversionEngine`].
///
/// The second buffer is the scratch space of two-step paths, not room for a
/// second live result: only one result can be borrowed at a time.
pub const POOL_SIZE: usize = 2;

/// Representation requested from a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Packed 8-bit RGB.
    Rgb24,
    /// 8-bit single channel.
    Grey,
    /// Interleaved Y'CbCr 4:4:4.
    Yuv24,
    /// JPEG at `quality` 1..=100.
    Jpeg { quality: u8 },
    Png,
}

impl Target {
    /// Tag carried by frames in this representation.
    pub fn format(&self) -> FourCC {
        match self {
            Target::Rgb24 => RGB3,
            Target::Grey => GREY,
            Target::Yuv24 => YUV24,
            Target::Jpeg { .. } => JPEG,
            Target::Png => PNG,
        }
    }

    /// Bytes per pixel of uncompressed targets.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Target::Rgb24 | Target::Yuv24 => Some(3),
            Target::Grey => Some(1),
            Target::Jpeg { .. } | Target::Png => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.bytes_per_pixel().is_none()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Target::Rgb24 => f.write_str("RGB24"),
            Target::Grey => f.write_str("GREY"),
            Target::Yuv24 => f.write_str("YUV24"),
            Target::Jpeg { .. } => f.write_str("JPEG"),
            Target::Png => f.write_str("PNG"),
        }
    }
}

/// A codec writing compressed frames into a pre-sized byte slice.
pub trait Encoder {
    /// Tag of the produced frames.
    fn format(&self) -> FourCC;

    /// Worst-case encoded size of a `width` x `height` frame in `format`.
    fn bound(&self, width: u32, height: u32, format: FourCC) -> Result<usize>;

    /// Encodes `src` into `dst` and returns the number of bytes written.
    ///
    /// Fails with [`Error::EncodeOverflow`] when `dst` is shorter than the
    /// bound; nothing is truncated.
    fn encode(&mut self, src: &FrameBuffer, dst: &mut [u8]) -> Result<usize>;
}

/// Encodes `src` into `dst`, growing `dst` to the encoder's bound first.
pub fn encode_frame<E: Encoder + ?Sized>(
    encoder: &mut E,
    src: &FrameBuffer,
    dst: &mut FrameBuffer,
) -> Result<()> {
    let bound = encoder.bound(src.width(), src.height(), src.format())?;
    dst.reserve(bound)?;
    let written = encoder.encode(src, dst.data_mut())?;
    publish(dst, src, encoder.format(), written)
}

/// The used bytes of `src`, which must hold at least `needed`.
pub(crate) fn source_bytes(src: &FrameBuffer, format: FourCC, needed: usize) -> Result<&[u8]> {
    let data = src.data();
    if data.len() < needed {
        return Err(Error::Truncated {
            format,
            needed,
            available: data.len(),
        });
    }
    Ok(data)
}

/// Publishes a finished conversion with the geometry of its source.
pub(crate) fn publish(
    dst: &mut FrameBuffer,
    src: &FrameBuffer,
    format: FourCC,
    used: usize,
) -> Result<()> {
    dst.set_parameters(src.width(), src.height(), format, used)
}

/// A single transform from one tag to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Yuv420ToRgb24,
    YuyvToRgb24,
    Yuv420ToYuv24,
    GreyNToGrey8(u32),
    GreyNToRgb24(u32),
    Grey8ToRgb24,
    Copy(FourCC, usize),
    Mjpeg,
    Jpeg,
    Png,
}

fn transform_for(format: FourCC, target: Target) -> Option<Transform> {
    let transform = match (target, format) {
        (Target::Rgb24, YUV420) => Transform::Yuv420ToRgb24,
        (Target::Rgb24, YUYV) => Transform::YuyvToRgb24,
        (Target::Rgb24, GREY) => Transform::Grey8ToRgb24,
        (Target::Rgb24, RGB3) => Transform::Copy(RGB3, 3),
        (Target::Rgb24, f) => Transform::GreyNToRgb24(f.grey_bit_depth()?),
        (Target::Grey, GREY) => Transform::Copy(GREY, 1),
        (Target::Grey, f) => Transform::GreyNToGrey8(f.grey_bit_depth()?),
        (Target::Yuv24, YUV420) => Transform::Yuv420ToYuv24,
        (Target::Yuv24, YUV24) => Transform::Copy(YUV24, 3),
        (Target::Jpeg { .. }, f) if jpeg::is_mjpeg(f) => Transform::Mjpeg,
        (Target::Jpeg { .. }, RGB3 | GREY | YUV24) => Transform::Jpeg,
        (Target::Png, RGB3 | GREY) => Transform::Png,
        _ => return None,
    };
    Some(transform)
}

fn apply(
    transform: Transform,
    src: &FrameBuffer,
    dst: &mut FrameBuffer,
    jpeg: &mut JpegEncoder,
    png: &mut PngEncoder,
) -> Result<()> {
    match transform {
        Transform::Yuv420ToRgb24 => yuv::yuv420_to_rgb24(src, dst),
        Transform::YuyvToRgb24 => yuv::yuyv_to_rgb24(src, dst),
        Transform::Yuv420ToYuv24 => yuv::yuv420_to_yuv24(src, dst),
        Transform::GreyNToGrey8(bits) => grey::grey_to_grey8(bits, src, dst),
        Transform::GreyNToRgb24(bits) => grey::grey_to_rgb24(bits, src, dst),
        Transform::Grey8ToRgb24 => grey::grey8_to_rgb24(src, dst),
        Transform::Copy(format, bpp) => grey::copy_frame(src, dst, format, bpp),
        Transform::Mjpeg => jpeg::mjpeg_to_jpeg(src, dst),
        Transform::Jpeg => encode_frame(jpeg, src, dst),
        Transform::Png => encode_frame(png, src, dst),
    }
}

/// Applies the single transform from `src` to `target`, writing into `dst`.
///
/// Pairs without a direct transform fail with [`Error::UnsupportedFormat`]
/// before `dst` is touched. Multi-step paths such as `YU12` to JPEG go through
/// [`ConversionEngine::convert`].
pub fn convert_into(src: &FrameBuffer, dst: &mut FrameBuffer, target: Target) -> Result<()> {
    let transform = transform_for(src.format(), target).ok_or(Error::UnsupportedFormat {
        format: src.format(),
        target,
    })?;
    let quality = match target {
        Target::Jpeg { quality } => quality,
        _ => jpeg::DEFAULT_QUALITY,
    };
    apply(
        transform,
        src,
        dst,
        &mut JpegEncoder::new(quality),
        &mut PngEncoder,
    )
}

/// How a source reaches a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    /// The source already is the target representation.
    PassThrough,
    Direct(Transform),
    /// Two transforms through an intermediate representation.
    Staged(Transform, Transform),
}

fn plan(format: FourCC, target: Target) -> Option<Plan> {
    if target.is_compressed() && format == target.format() {
        return Some(Plan::PassThrough);
    }
    if let Some(transform) = transform_for(format, target) {
        return Some(Plan::Direct(transform));
    }
    let intermediate = match (target, format) {
        (Target::Jpeg { .. }, YUV420) => Target::Yuv24,
        (Target::Jpeg { .. } | Target::Png, YUYV | YUV420) => Target::Rgb24,
        (Target::Jpeg { .. } | Target::Png, f) if f.grey_bit_depth().is_some() => Target::Grey,
        _ => return None,
    };
    let first = transform_for(format, intermediate)?;
    let second = transform_for(intermediate.format(), target)?;
    Some(Plan::Staged(first, second))
}

/// Converts frames into a fixed pool of reused output buffers.
///
/// Each call writes its result into the next buffer of the pool, so
/// consecutive results never share storage. Two-step paths such as
/// `YU12 -> YUV3 -> JPEG` write their intermediate into the buffer that held
/// the previous result.
///
/// The returned reference borrows the engine, so a caller holds at most one
/// result at a time, whatever the pool size: a result cannot be kept across
/// the next call. Copy it with [`FrameBuffer::try_copy_from`] to keep it
/// longer.
///
/// ```
/// use edgefirst_capture::{
///     convert::{ConversionEngine, Target},
///     fourcc::YUV420,
///     frame::FrameBuffer,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let src = FrameBuffer::from_bytes(2, 2, YUV420, &[235, 235, 235, 235, 128, 128])?;
/// let mut engine = ConversionEngine::new();
/// let rgb = engine.convert(&src, Target::Rgb24)?;
/// assert_eq!(rgb.data(), &[255; 12]);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ConversionEngine {
    pool: [FrameBuffer; POOL_SIZE],
    next: usize,
    jpeg: JpegEncoder,
    png: PngEncoder,
}

impl ConversionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts `src` to `target`.
    ///
    /// Sources already in the requested compressed representation are
    /// returned unchanged.
    #[instrument(skip_all, fields(format = %src.format(), to = %target))]
    pub fn convert<'a>(
        &'a mut self,
        src: &'a FrameBuffer,
        target: Target,
    ) -> Result<&'a FrameBuffer> {
        let format = src.format();
        let plan = plan(format, target).ok_or(Error::UnsupportedFormat { format, target })?;
        if let Target::Jpeg { quality } = target {
            self.jpeg.set_quality(quality);
        }

        let out = self.next;
        let other = (out + 1) % POOL_SIZE;
        match plan {
            Plan::PassThrough => {
                debug!("{format} is already {target}");
                return Ok(src);
            }
            Plan::Direct(transform) => {
                let dst = &mut self.pool[out];
                apply(transform, src, dst, &mut self.jpeg, &mut self.png)?;
            }
            Plan::Staged(first, second) => {
                // the buffer holding the previous result doubles as scratch
                let (lo, hi) = self.pool.split_at_mut(1);
                let (dst, scratch) = if out == 0 {
                    (&mut lo[0], &mut hi[0])
                } else {
                    (&mut hi[0], &mut lo[0])
                };
                apply(first, src, scratch, &mut self.jpeg, &mut self.png)?;
                apply(second, scratch, dst, &mut self.jpeg, &mut self.png)?;
            }
        }
        debug!("{format} -> {target} in pool slot {out}");
        self.next = other;
        Ok(&self.pool[out])
    }
}
