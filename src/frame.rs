// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    fourcc::FourCC,
};
use std::fmt;
use tracing::debug;

/// Raw frame storage annotated with its geometry and pixel format.
///
/// A `FrameBuffer` is allocated lazily on the first size demand and then
/// reused for many frames: its capacity only ever grows. The buffer is not
/// `Clone`; frames move between owners and converters write into reused
/// buffers instead of duplicating payloads. [`FrameBuffer::try_copy_from`] is
/// the explicit escape hatch for callers that must keep a frame longer than
/// its producer allows.
///
/// # Example
///
/// ```
/// use edgefirst_capture::{fourcc::GREY, frame::FrameBuffer};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut frame = FrameBuffer::new();
/// frame.reserve(16)?;
/// frame.data_mut()[..16].fill(0x80);
/// frame.set_parameters(4, 4, GREY, 16)?;
/// assert_eq!(frame.data().len(), 16);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: FourCC,
    used: usize,
}

impl FrameBuffer {
    pub const fn new() -> Self {
        FrameBuffer {
            data: Vec::new(),
            width: 0,
            height: 0,
            format: FourCC([0; 4]),
            used: 0,
        }
    }

    /// Creates a filled frame from existing pixel data.
    pub fn from_bytes(width: u32, height: u32, format: FourCC, bytes: &[u8]) -> Result<Self> {
        let mut frame = FrameBuffer::new();
        frame.reserve(bytes.len())?;
        frame.data[..bytes.len()].copy_from_slice(bytes);
        frame.set_parameters(width, height, format, bytes.len())?;
        Ok(frame)
    }

    /// Ensures at least `len` bytes of storage, growing but never shrinking.
    pub fn reserve(&mut self, len: usize) -> Result<()> {
        if self.data.len() >= len {
            return Ok(());
        }
        let additional = len - self.data.len();
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| Error::OutOfMemory { requested: len })?;
        self.data.resize(len, 0);
        debug!("frame buffer grown to {len} bytes");
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> FourCC {
        self.format
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// The valid bytes of the current frame.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// The whole allocated storage, for producers filling the buffer.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Start of the underlying storage, used to tell pooled buffers apart.
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub fn set_used(&mut self, used: usize) -> Result<()> {
        if used > self.data.len() {
            return Err(Error::Overrun {
                used,
                capacity: self.data.len(),
            });
        }
        self.used = used;
        Ok(())
    }

    /// Publishes a frame: width, height, format and used length are updated
    /// together, and only once the payload has been written.
    pub fn set_parameters(
        &mut self,
        width: u32,
        height: u32,
        format: FourCC,
        used: usize,
    ) -> Result<()> {
        self.set_used(used)?;
        self.width = width;
        self.height = height;
        self.format = format;
        Ok(())
    }

    /// Clears the metadata, keeping the allocation.
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.format = FourCC::default();
        self.used = 0;
    }

    /// Copies another frame's payload and metadata into this buffer.
    pub fn try_copy_from(&mut self, other: &FrameBuffer) -> Result<()> {
        self.reserve(other.used)?;
        self.data[..other.used].copy_from_slice(other.data());
        self.set_parameters(other.width, other.height, other.format, other.used)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("used", &self.used)
            .field("capacity", &self.data.len())
            .finish()
    }
}

impl fmt::Display for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {}/{} bytes",
            self.width,
            self.height,
            self.format,
            self.used,
            self.data.len()
        )
    }
}
