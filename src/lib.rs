// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Capture Library
//!
//! Frame acquisition from V4L2 capture devices and software pixel-format
//! conversion for camera pipelines.
//!
//! ## Features
//!
//! - **Capture**: [`device::Device`] negotiates a format and reads frames
//!   through a memory-mapped ring of driver buffers, falling back to direct
//!   reads on devices without streaming support.
//! - **Conversion**: [`convert::ConversionEngine`] turns planar and packed
//!   YUV, N-bit grey and motion-JPEG frames into RGB24, grey, YUV 4:4:4, JPEG
//!   or PNG, writing into reused output buffers.
//! - **Frame storage**: [`frame::FrameBuffer`] grows on demand and is reused
//!   across frames.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_capture::{
//!     convert::{ConversionEngine, Target},
//!     device::Device,
//!     fourcc::YUYV,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut camera = Device::new("/dev/video0");
//! camera.open()?;
//! camera.set_format(1280, 720, YUYV)?;
//! camera.init()?;
//! camera.start()?;
//!
//! let mut engine = ConversionEngine::new();
//! let frame = camera.read_frame()?;
//! let jpeg = engine.convert(frame, Target::Jpeg { quality: 90 })?;
//! std::fs::write("frame.jpg", jpeg.data())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! Devices and engines are single-threaded. Use one instance per concurrent
//! capture or conversion path.
//!
//! ## Safety
//!
//! `unsafe` code is limited to the ioctl and mmap calls in [`v4l2`], made
//! through the low-level wrappers of the `v4l` crate.

pub mod convert;
pub mod device;
pub mod driver;
pub mod error;
pub mod fourcc;
pub mod frame;
pub mod io;
pub mod v4l2;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{Device, DeviceState};
pub use error::{Error, Result};
pub use fourcc::FourCC;
pub use frame::FrameBuffer;
