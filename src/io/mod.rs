// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Capture strategies.
//!
//! A [`CaptureBackend`] owns the protocol for acquiring one filled frame from
//! the device. The methods must be called in order:
//!
//! ```text
//! init -> start -> read, read, ... -> stop -> uninit
//! ```
//!
//! Calling `read` before `start`, `start` before `init`, or `init` twice fails
//! with [`Error::Sequence`](crate::error::Error::Sequence).

pub mod mmap;
pub mod rw;

use crate::{error::Result, frame::FrameBuffer};

pub use mmap::{MmapBackend, SlotState};
pub use rw::ReadWriteBackend;

pub trait CaptureBackend {
    /// Short name of the strategy for logging.
    fn name(&self) -> &'static str;

    /// Prepares the backend for frames of at most `max_frame_bytes`.
    fn init(&mut self, max_frame_bytes: u32) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    /// Blocks until the device produces a frame and stores it in `dst`.
    ///
    /// Only the payload and used length of `dst` are written; the caller owns
    /// the frame geometry.
    fn read(&mut self, dst: &mut FrameBuffer) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn uninit(&mut self) -> Result<()>;
}
