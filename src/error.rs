// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{convert::Target, fourcc::FourCC};
use std::io;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by capture devices, backends and converters.
///
/// "Not ready yet" conditions from the driver are retried where they occur and
/// never reach the caller. Everything else propagates without recovery.
#[derive(Debug, Error)]
pub enum Error {
    /// The device file is inaccessible or not a capture device.
    #[error("{device}: {source}")]
    DeviceOpen { device: String, source: io::Error },

    /// A lifecycle method was called out of order.
    #[error("sequence error: {0}")]
    Sequence(&'static str),

    /// A frame was requested from a device that is not running.
    #[error("device is not running")]
    NotReady,

    /// The device offers no capture strategy this crate can drive.
    #[error("unsupported capture I/O: {0}")]
    UnsupportedIo(String),

    /// The driver granted fewer than two ring slots.
    #[error("insufficient buffer memory: driver granted {granted} buffers, at least 2 are required")]
    InsufficientBuffers { granted: u32 },

    /// Dequeue, enqueue, mapping or read failure that is not a retry signal.
    #[error("{context}: {source}")]
    CaptureIo {
        context: &'static str,
        source: io::Error,
    },

    /// No conversion path for the source format and target.
    #[error("unsupported pixel format {format} for {target} conversion")]
    UnsupportedFormat { format: FourCC, target: Target },

    /// The source frame holds fewer bytes than its geometry requires.
    #[error("{format} frame too short: needed {needed} bytes, {available} available")]
    Truncated {
        format: FourCC,
        needed: usize,
        available: usize,
    },

    /// Growing a frame buffer failed.
    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },

    /// A used length larger than the allocated capacity.
    #[error("used length {used} exceeds buffer capacity {capacity}")]
    Overrun { used: usize, capacity: usize },

    /// The codec destination was sized too small.
    #[error("encoder destination overflow: needed {needed} bytes, {available} available")]
    EncodeOverflow { needed: usize, available: usize },

    /// The codec failed for a reason other than destination size.
    #[error("codec error: {0}")]
    Codec(String),
}

impl Error {
    pub(crate) fn capture_io(context: &'static str, errno: nix::errno::Errno) -> Self {
        Error::CaptureIo {
            context,
            source: io::Error::from(errno),
        }
    }
}

impl From<turbojpeg::Error> for Error {
    fn from(err: turbojpeg::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Codec(err.to_string())
    }
}
