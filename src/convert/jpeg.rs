// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{publish, source_bytes, Encoder};
use crate::{
    error::{Error, Result},
    fourcc::{FourCC, GREY, JPEG, MJPG, RGB3, YUV24},
    frame::FrameBuffer,
};
use tracing::{debug, trace};
use turbojpeg::{Compressor, PixelFormat, Subsamp, YuvImage};

pub const DEFAULT_QUALITY: u8 = 90;

/// JPEG encoder for RGB24, 8-bit grey and interleaved YUV 4:4:4 frames.
///
/// The turbojpeg handle is created on first use and reused afterwards.
pub struct JpegEncoder {
    compressor: Option<Compressor>,
    quality: u8,
    scratch: Vec<u8>,
}

impl Default for JpegEncoder {
    fn default() -> Self {
        JpegEncoder::new(DEFAULT_QUALITY)
    }
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        JpegEncoder {
            compressor: None,
            quality: quality.clamp(1, 100),
            scratch: Vec::new(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality.clamp(1, 100);
    }

    fn compressor(&mut self, subsamp: Subsamp) -> Result<&mut Compressor> {
        if self.compressor.is_none() {
            debug!("creating turbojpeg compressor");
            self.compressor = Some(Compressor::new()?);
        }
        let compressor = self
            .compressor
            .as_mut()
            .ok_or_else(|| Error::Codec("turbojpeg compressor unavailable".to_string()))?;
        compressor.set_quality(self.quality as i32)?;
        compressor.set_subsamp(subsamp)?;
        Ok(compressor)
    }
}

fn layout(format: FourCC) -> Option<(usize, Subsamp)> {
    match format {
        RGB3 => Some((3, Subsamp::Sub2x2)),
        GREY => Some((1, Subsamp::Gray)),
        YUV24 => Some((3, Subsamp::None)),
        _ => None,
    }
}

impl Encoder for JpegEncoder {
    fn format(&self) -> FourCC {
        JPEG
    }

    fn bound(&self, width: u32, height: u32, format: FourCC) -> Result<usize> {
        let (_, subsamp) = layout(format).ok_or(Error::UnsupportedFormat {
            format,
            target: super::Target::Jpeg {
                quality: self.quality,
            },
        })?;
        Ok(turbojpeg::compressed_buf_len(
            width as usize,
            height as usize,
            subsamp,
        )?)
    }

    fn encode(&mut self, src: &FrameBuffer, dst: &mut [u8]) -> Result<usize> {
        let format = src.format();
        let needed = self.bound(src.width(), src.height(), format)?;
        if dst.len() < needed {
            return Err(Error::EncodeOverflow {
                needed,
                available: dst.len(),
            });
        }
        let (w, h) = (src.width() as usize, src.height() as usize);
        let (bpp, subsamp) = layout(format).ok_or(Error::UnsupportedFormat {
            format,
            target: super::Target::Jpeg {
                quality: self.quality,
            },
        })?;
        let pixels = source_bytes(src, format, w * h * bpp)?;
        trace!("{format} -> JPEG {w}x{h} quality {}", self.quality);

        let written = if format == YUV24 {
            // turbojpeg takes 4:4:4 Y'CbCr as separate planes
            let mut planes = std::mem::take(&mut self.scratch);
            planes.clear();
            planes.resize(w * h * 3, 0);
            let (y, uv) = planes.split_at_mut(w * h);
            let (u, v) = uv.split_at_mut(w * h);
            for (i, px) in pixels.chunks_exact(3).enumerate() {
                y[i] = px[0];
                u[i] = px[1];
                v[i] = px[2];
            }
            let image = YuvImage {
                pixels: planes.as_slice(),
                width: w,
                align: 1,
                height: h,
                subsamp,
            };
            let res = self
                .compressor(subsamp)
                .and_then(|c| Ok(c.compress_yuv_to_slice(image, dst)?));
            self.scratch = planes;
            res?
        } else {
            let image = turbojpeg::Image {
                pixels: &pixels[..w * h * bpp],
                width: w,
                pitch: w * bpp,
                height: h,
                format: if bpp == 1 {
                    PixelFormat::GRAY
                } else {
                    PixelFormat::RGB
                },
            };
            self.compressor(subsamp)?.compress_to_slice(image, dst)?
        };
        Ok(written)
    }
}

const MARKER_SOI: u8 = 0xD8;
const MARKER_SOS: u8 = 0xDA;
const MARKER_DHT: u8 = 0xC4;

const DC_LUMINANCE_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const DC_CHROMINANCE_BITS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const AC_LUMINANCE_BITS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
#[rustfmt::skip]
const AC_LUMINANCE_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

const AC_CHROMINANCE_BITS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
#[rustfmt::skip]
const AC_CHROMINANCE_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Table class/id, code counts and symbols of the standard Huffman tables.
const HUFFMAN_TABLES: [(u8, &[u8; 16], &[u8]); 4] = [
    (0x00, &DC_LUMINANCE_BITS, &DC_VALUES),
    (0x01, &DC_CHROMINANCE_BITS, &DC_VALUES),
    (0x10, &AC_LUMINANCE_BITS, &AC_LUMINANCE_VALUES),
    (0x11, &AC_CHROMINANCE_BITS, &AC_CHROMINANCE_VALUES),
];

/// Length of the DHT segment including its marker.
pub const DHT_SEGMENT_LEN: usize = 420;

/// Writes the standard DHT segment to the start of `out`.
fn write_dht(out: &mut [u8]) -> usize {
    let payload = DHT_SEGMENT_LEN - 2;
    out[..4].copy_from_slice(&[0xFF, MARKER_DHT, (payload >> 8) as u8, payload as u8]);
    let mut pos = 4;
    for (class_id, bits, values) in HUFFMAN_TABLES {
        out[pos] = class_id;
        out[pos + 1..pos + 17].copy_from_slice(bits);
        out[pos + 17..pos + 17 + values.len()].copy_from_slice(values);
        pos += 17 + values.len();
    }
    pos
}

/// Scans the marker segments of a JPEG stream up to the first SOS and
/// returns the SOS offset and whether a DHT segment was seen.
fn scan_headers(data: &[u8]) -> Result<(usize, bool)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != MARKER_SOI {
        return Err(Error::Codec("MJPEG frame does not start with SOI".to_string()));
    }
    let mut pos = 2;
    let mut has_dht = false;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(Error::Codec(format!("expected JPEG marker at offset {pos}")));
        }
        let marker = data[pos + 1];
        match marker {
            // fill byte
            0xFF => pos += 1,
            MARKER_SOS => return Ok((pos, has_dht)),
            0x01 | 0xD0..=0xD7 => pos += 2,
            _ => {
                if marker == MARKER_DHT {
                    has_dht = true;
                }
                if pos + 3 >= data.len() {
                    break;
                }
                let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + len;
            }
        }
    }
    Err(Error::Codec("MJPEG frame has no SOS marker".to_string()))
}

/// Rewrites a motion-JPEG frame into a standalone JPEG.
///
/// Many UVC cameras omit the Huffman tables and rely on the decoder knowing
/// the defaults; those are inserted ahead of the scan.
pub fn mjpeg_to_jpeg(src: &FrameBuffer, dst: &mut FrameBuffer) -> Result<()> {
    let data = src.data();
    let (sos, has_dht) = scan_headers(data)?;
    trace!("{} -> JPEG {} bytes, tables present: {has_dht}", src.format(), data.len());

    if has_dht {
        dst.reserve(data.len())?;
        dst.data_mut()[..data.len()].copy_from_slice(data);
        return publish(dst, src, JPEG, data.len());
    }

    let len = data.len() + DHT_SEGMENT_LEN;
    dst.reserve(len)?;
    let out = dst.data_mut();
    out[..sos].copy_from_slice(&data[..sos]);
    let written = write_dht(&mut out[sos..]);
    out[sos + written..len].copy_from_slice(&data[sos..]);
    publish(dst, src, JPEG, len)
}

/// Whether `format` is a motion-JPEG tag this module can rewrite.
pub fn is_mjpeg(format: FourCC) -> bool {
    format == MJPG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mjpeg(with_dht: bool) -> Vec<u8> {
        let mut bytes = vec![0xFF, MARKER_SOI, 0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46];
        if with_dht {
            bytes.extend([0xFF, MARKER_DHT, 0x00, 0x03, 0x00]);
        }
        bytes.extend([0xFF, MARKER_SOS, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn dht_segment_layout() {
        let mut out = [0u8; DHT_SEGMENT_LEN];
        assert_eq!(write_dht(&mut out), DHT_SEGMENT_LEN);
        assert_eq!(&out[..4], &[0xFF, 0xC4, 0x01, 0xA2]);
        assert_eq!(out[4], 0x00);
        assert_eq!(out[4 + 29], 0x01);
        assert_eq!(out[4 + 58], 0x10);
        assert_eq!(out[4 + 58 + 179], 0x11);
    }

    #[test]
    fn huffman_counts_match_symbols() {
        for (_, bits, values) in HUFFMAN_TABLES {
            let total: usize = bits.iter().map(|&b| b as usize).sum();
            assert_eq!(total, values.len());
        }
    }

    #[test]
    fn tables_inserted_before_scan() {
        let input = mjpeg(false);
        let src = FrameBuffer::from_bytes(16, 16, MJPG, &input).unwrap();
        let mut dst = FrameBuffer::new();
        mjpeg_to_jpeg(&src, &mut dst).unwrap();

        let out = dst.data();
        assert_eq!(dst.format(), JPEG);
        assert_eq!(out.len(), input.len() + DHT_SEGMENT_LEN);
        assert_eq!(&out[..8], &input[..8]);
        assert_eq!(&out[8..10], &[0xFF, MARKER_DHT]);
        assert_eq!(&out[8 + DHT_SEGMENT_LEN..], &input[8..]);
    }

    #[test]
    fn existing_tables_are_kept() {
        let input = mjpeg(true);
        let src = FrameBuffer::from_bytes(16, 16, MJPG, &input).unwrap();
        let mut dst = FrameBuffer::new();
        mjpeg_to_jpeg(&src, &mut dst).unwrap();
        assert_eq!(dst.data(), input.as_slice());
        assert_eq!(dst.format(), JPEG);
    }

    #[test]
    fn missing_soi_is_codec_error() {
        let src = FrameBuffer::from_bytes(16, 16, MJPG, &[0x00, 0x01, 0x02, 0x03]).unwrap();
        let mut dst = FrameBuffer::new();
        assert!(matches!(mjpeg_to_jpeg(&src, &mut dst), Err(Error::Codec(_))));
        assert_eq!(dst.used(), 0);
    }

    #[test]
    fn grey_encodes_to_jpeg() {
        let pixels: Vec<u8> = (0..64u8).map(|i| i * 4).collect();
        let src = FrameBuffer::from_bytes(8, 8, GREY, &pixels).unwrap();
        let mut encoder = JpegEncoder::new(80);
        let mut out = vec![0u8; encoder.bound(8, 8, GREY).unwrap()];
        let n = encoder.encode(&src, &mut out).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(&out[n - 2..n], &[0xFF, 0xD9]);
    }

    #[test]
    fn undersized_destination_overflows() {
        let src = FrameBuffer::from_bytes(8, 8, RGB3, &[128; 192]).unwrap();
        let mut encoder = JpegEncoder::default();
        let mut out = [0u8; 16];
        assert!(matches!(
            encoder.encode(&src, &mut out),
            Err(Error::EncodeOverflow { available: 16, .. })
        ));
        assert!(out.iter().all(|&b| b == 0));
    }
}
