// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::CaptureBackend;
use crate::{
    driver::{Driver, Mapping},
    error::{Error, Result},
    frame::FrameBuffer,
};
use nix::errno::Errno;
use std::{io, rc::Rc, thread, time::Duration};
use tracing::{debug, info, trace, warn};

/// Number of ring slots requested from the driver. The driver may grant a
/// different count.
pub const REQUESTED_SLOTS: u32 = 4;

/// With a single slot the driver would fill the memory the application is
/// still reading.
pub const MIN_SLOTS: u32 = 2;

/// Sleep between dequeue attempts while the driver has no filled slot.
pub const DEQUEUE_RETRY: Duration = Duration::from_millis(2);

/// Ownership state of one ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No memory mapped for the slot.
    Unmapped,
    /// Mapped but not handed to the driver.
    MappedIdle,
    /// Enqueued; the driver may fill it at any time.
    Queued,
    /// Dequeued; the application may read it.
    Filled,
}

struct Slot<M> {
    index: u32,
    mapping: Option<M>,
    state: SlotState,
}

/// Capture through a ring of driver-owned buffers mapped into the process.
///
/// Every filled slot is copied into the caller's [`FrameBuffer`] and handed
/// straight back to the driver, which keeps the ring cycling and means the
/// caller never observes memory the driver is overwriting.
pub struct MmapBackend<D: Driver> {
    driver: Rc<D>,
    slots: Vec<Slot<D::Mapping>>,
    max_frame_bytes: u32,
    initialized: bool,
    streaming: bool,
}

impl<D: Driver> MmapBackend<D> {
    pub fn new(driver: Rc<D>) -> Self {
        MmapBackend {
            driver,
            slots: Vec::new(),
            max_frame_bytes: 0,
            initialized: false,
            streaming: false,
        }
    }

    /// Number of slots granted by the driver during `init`.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|slot| slot.state).collect()
    }

    fn release_driver_buffers(&self) {
        if let Err(e) = self.driver.request_buffers(0) {
            debug!("releasing driver buffers failed: {e}");
        }
    }

    fn map_slots(&self, granted: u32) -> Result<Vec<Slot<D::Mapping>>> {
        let mut slots = Vec::with_capacity(granted as usize);
        for index in 0..granted {
            let info = self
                .driver
                .query_buffer(index)
                .map_err(|e| Error::capture_io("error while querying buffer", e))?;
            let mapping = self
                .driver
                .map(&info)
                .map_err(|e| Error::capture_io("error while creating mmap", e))?;
            slots.push(Slot {
                index,
                mapping: Some(mapping),
                state: SlotState::MappedIdle,
            });
        }
        Ok(slots)
    }
}

fn copy_out(src: &[u8], used: usize, reserve: usize, dst: &mut FrameBuffer) -> Result<()> {
    dst.reserve(reserve.max(used))?;
    dst.data_mut()[..used].copy_from_slice(&src[..used]);
    dst.set_used(used)
}

impl<D: Driver> CaptureBackend for MmapBackend<D> {
    fn name(&self) -> &'static str {
        "mmap"
    }

    fn init(&mut self, max_frame_bytes: u32) -> Result<()> {
        if self.initialized {
            return Err(Error::Sequence("mmap capture is already initialized"));
        }
        debug!("initializing MMAP-IO for frames up to {max_frame_bytes} bytes");

        let granted = match self.driver.request_buffers(REQUESTED_SLOTS) {
            Ok(granted) => granted,
            Err(Errno::EINVAL) => {
                return Err(Error::UnsupportedIo(
                    "device does not support memory-mapped streaming".to_string(),
                ))
            }
            Err(e) => return Err(Error::capture_io("error while requesting mmap buffers", e)),
        };
        if granted < MIN_SLOTS {
            self.release_driver_buffers();
            return Err(Error::InsufficientBuffers { granted });
        }
        info!("driver allocated {granted} buffers");

        // mappings created before a failure are unmapped when `map_slots` drops them
        let slots = match self.map_slots(granted) {
            Ok(slots) => slots,
            Err(e) => {
                self.release_driver_buffers();
                return Err(e);
            }
        };

        self.slots = slots;
        self.max_frame_bytes = max_frame_bytes;
        self.initialized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::Sequence("start() called before init()"));
        }
        if self.streaming {
            return Err(Error::Sequence("mmap capture is already streaming"));
        }
        debug!("starting MMAP-IO");

        for slot in &mut self.slots {
            self.driver
                .queue_buffer(slot.index)
                .map_err(|e| Error::capture_io("error while queuing buffer", e))?;
            slot.state = SlotState::Queued;
        }
        self.driver
            .stream_on()
            .map_err(|e| Error::capture_io("error while starting stream", e))?;
        self.streaming = true;
        Ok(())
    }

    fn read(&mut self, dst: &mut FrameBuffer) -> Result<()> {
        if !self.streaming {
            return Err(Error::Sequence("read() called before start()"));
        }

        let buf = loop {
            match self.driver.dequeue_buffer() {
                Ok(buf) => break buf,
                Err(Errno::EAGAIN) => {
                    trace!("no frame ready");
                    thread::sleep(DEQUEUE_RETRY);
                }
                Err(e) => return Err(Error::capture_io("error while reading image", e)),
            }
        };

        let count = self.slots.len();
        let slot = self
            .slots
            .get_mut(buf.index as usize)
            .ok_or_else(|| Error::CaptureIo {
                context: "dequeued buffer index out of range",
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("index {} with {count} slots", buf.index),
                ),
            })?;
        slot.state = SlotState::Filled;
        trace!(
            index = buf.index,
            bytes_used = buf.bytes_used,
            sequence = buf.sequence,
            "dequeued"
        );

        let copied = match &slot.mapping {
            Some(mapping) => {
                let src = mapping.as_slice();
                let used = (buf.bytes_used as usize).min(src.len());
                copy_out(src, used, self.max_frame_bytes as usize, dst)
            }
            None => Err(Error::Sequence("dequeued an unmapped slot")),
        };

        // the slot goes back to the driver even when the copy failed
        self.driver
            .queue_buffer(slot.index)
            .map_err(|e| Error::capture_io("error while re-queuing buffer", e))?;
        slot.state = SlotState::Queued;

        copied
    }

    fn stop(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }
        debug!("stopping MMAP-IO");

        self.driver
            .stream_off()
            .map_err(|e| Error::capture_io("error while stopping stream", e))?;
        self.streaming = false;
        // STREAMOFF returns every queued buffer to the application
        for slot in &mut self.slots {
            slot.state = SlotState::MappedIdle;
        }
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::Sequence("uninit() called before init()"));
        }
        debug!("un-initializing MMAP-IO");

        let stopped = self.stop();

        let mut unmapped = Ok(());
        for slot in &mut self.slots {
            if let Some(mapping) = slot.mapping.take() {
                if let Err(e) = mapping.unmap() {
                    warn!("error while unmapping buffer {}: {e}", slot.index);
                    if unmapped.is_ok() {
                        unmapped = Err(Error::CaptureIo {
                            context: "error while unmapping buffer",
                            source: e,
                        });
                    }
                }
            }
            slot.state = SlotState::Unmapped;
        }
        self.streaming = false;
        self.initialized = false;
        self.release_driver_buffers();

        stopped.and(unmapped)
    }
}

impl<D: Driver> Drop for MmapBackend<D> {
    fn drop(&mut self) {
        if self.initialized {
            if let Err(e) = self.uninit() {
                warn!("mmap teardown failed: {e}");
            }
        }
    }
}
