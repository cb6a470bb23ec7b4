// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The control surface of a capture device.
//!
//! [`Driver`] is the seam between the capture state machine and the kernel.
//! Every operation returns the raw [`Errno`] so callers can tell the
//! distinguished signals apart: `EINVAL`/`ENOTTY` mean "not supported" or
//! "end of enumeration", `EAGAIN` means "try again". [`crate::v4l2::V4l2Fd`]
//! is the production implementation.

use crate::fourcc::FourCC;
use nix::errno::Errno;
use std::{fmt, io, path::Path};

/// Device capability flags reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub capture: bool,
    pub streaming: bool,
    pub read_write: bool,
    pub async_io: bool,
    pub m2m: bool,
}

/// One entry of the driver's supported pixel format list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescription {
    pub format: FourCC,
    pub description: String,
    pub compressed: bool,
    pub emulated: bool,
}

/// A resolution, or range of resolutions, supported for a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    Discrete {
        width: u32,
        height: u32,
    },
    Stepwise {
        min_width: u32,
        max_width: u32,
        step_width: u32,
        min_height: u32,
        max_height: u32,
        step_height: u32,
    },
    Continuous {
        min_width: u32,
        max_width: u32,
        min_height: u32,
        max_height: u32,
    },
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameSize::Discrete { width, height } => write!(f, "{width}x{height}"),
            FrameSize::Stepwise {
                min_width,
                max_width,
                step_width,
                min_height,
                max_height,
                step_height,
            } => write!(
                f,
                "{min_width}x{min_height} - {max_width}x{max_height} step {step_width}x{step_height}"
            ),
            FrameSize::Continuous {
                min_width,
                max_width,
                min_height,
                max_height,
            } => write!(f, "{min_width}x{min_height} - {max_width}x{max_height}"),
        }
    }
}

/// A supported pixel format together with its resolutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFormat {
    pub description: FormatDescription,
    pub sizes: Vec<FrameSize>,
}

/// The format the driver actually applied after negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub width: u32,
    pub height: u32,
    pub format: FourCC,
    pub bytes_per_line: u32,
    /// Maximum size in bytes of one frame.
    pub size_image: u32,
}

/// Location of one driver-owned ring buffer inside the device's mmap space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub index: u32,
    pub offset: u32,
    pub length: u32,
}

/// A filled buffer handed back by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeuedBuffer {
    pub index: u32,
    pub bytes_used: u32,
    pub sequence: u32,
}

/// One driver buffer mapped into the process address space.
///
/// Dropping a mapping unmaps it; [`Mapping::unmap`] does the same but reports
/// failure to the caller.
pub trait Mapping {
    fn as_slice(&self) -> &[u8];

    fn unmap(self) -> io::Result<()>;
}

/// Control operations of a V4L2-style capture device.
pub trait Driver {
    type Mapping: Mapping;

    /// Opens the device node at `path`.
    fn open(path: &Path) -> io::Result<Self>
    where
        Self: Sized;

    fn query_capabilities(&self) -> Result<Capabilities, Errno>;

    /// Describes the format at `index`; `EINVAL` past the last entry.
    fn enum_format(&self, index: u32) -> Result<FormatDescription, Errno>;

    /// Describes the resolution at `index` for `format`; `EINVAL` past the
    /// last entry.
    fn enum_frame_size(&self, format: FourCC, index: u32) -> Result<FrameSize, Errno>;

    /// Requests a format and returns what the driver actually applied.
    fn set_format(&self, width: u32, height: u32, format: FourCC)
        -> Result<NegotiatedFormat, Errno>;

    /// Requests `count` mmap buffers and returns the granted count.
    fn request_buffers(&self, count: u32) -> Result<u32, Errno>;

    fn query_buffer(&self, index: u32) -> Result<BufferInfo, Errno>;

    fn queue_buffer(&self, index: u32) -> Result<(), Errno>;

    /// Takes a filled buffer from the driver; `EAGAIN` when none is ready.
    fn dequeue_buffer(&self) -> Result<DequeuedBuffer, Errno>;

    fn stream_on(&self) -> Result<(), Errno>;

    fn stream_off(&self) -> Result<(), Errno>;

    fn map(&self, buffer: &BufferInfo) -> Result<Self::Mapping, Errno>;

    /// Reads one frame directly; `EAGAIN` when none is ready.
    fn read(&self, dst: &mut [u8]) -> Result<usize, Errno>;
}
