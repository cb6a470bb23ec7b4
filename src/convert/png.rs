// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{source_bytes, Encoder, Target};
use crate::{
    error::{Error, Result},
    fourcc::{FourCC, GREY, PNG, RGB3},
    frame::FrameBuffer,
};
use image::{ExtendedColorType, ImageEncoder};
use std::io::{self, Write};
use tracing::trace;

/// PNG encoder for 8-bit grey and RGB24 frames.
#[derive(Debug, Default)]
pub struct PngEncoder;

/// Fixed-size byte sink that records when a write did not fit.
struct SliceSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
    overflow: Option<usize>,
}

impl Write for SliceSink<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.overflow = Some(end);
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "PNG destination exhausted",
            ));
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn color_type(format: FourCC) -> Option<(usize, ExtendedColorType)> {
    match format {
        GREY => Some((1, ExtendedColorType::L8)),
        RGB3 => Some((3, ExtendedColorType::Rgb8)),
        _ => None,
    }
}

impl Encoder for PngEncoder {
    fn format(&self) -> FourCC {
        PNG
    }

    /// Raw size plus one filter byte per row, worst-case deflate expansion
    /// and room for the signature and chunk headers.
    fn bound(&self, width: u32, height: u32, format: FourCC) -> Result<usize> {
        let (bpp, _) = color_type(format).ok_or(Error::UnsupportedFormat {
            format,
            target: Target::Png,
        })?;
        let raw = width as usize * height as usize * bpp;
        Ok(raw + height as usize + raw / 8 + 4096)
    }

    fn encode(&mut self, src: &FrameBuffer, dst: &mut [u8]) -> Result<usize> {
        let format = src.format();
        let (bpp, color) = color_type(format).ok_or(Error::UnsupportedFormat {
            format,
            target: Target::Png,
        })?;
        let (w, h) = (src.width(), src.height());
        let len = w as usize * h as usize * bpp;
        let pixels = source_bytes(src, format, len)?;
        trace!("{format} -> PNG {w}x{h}");

        let available = dst.len();
        let mut sink = SliceSink {
            buf: dst,
            pos: 0,
            overflow: None,
        };
        let res = image::codecs::png::PngEncoder::new(&mut sink).write_image(
            &pixels[..len],
            w,
            h,
            color,
        );
        match (res, sink.overflow) {
            (_, Some(needed)) => Err(Error::EncodeOverflow { needed, available }),
            (Err(e), None) => Err(e.into()),
            (Ok(()), None) => Ok(sink.pos),
        }
    }
}
