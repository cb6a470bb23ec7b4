// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::CaptureBackend;
use crate::{
    driver::Driver,
    error::{Error, Result},
    frame::FrameBuffer,
};
use nix::errno::Errno;
use std::{io, rc::Rc, thread, time::Duration};
use tracing::{debug, trace};

/// Sleep between read attempts while the device has no frame.
pub const READ_RETRY: Duration = Duration::from_micros(10);

/// Capture by reading frames straight from the device node.
///
/// There is no ring and no buffer handoff: each `read` fills the caller's
/// buffer directly.
pub struct ReadWriteBackend<D: Driver> {
    driver: Rc<D>,
    max_frame_bytes: u32,
    initialized: bool,
    started: bool,
}

impl<D: Driver> ReadWriteBackend<D> {
    pub fn new(driver: Rc<D>) -> Self {
        ReadWriteBackend {
            driver,
            max_frame_bytes: 0,
            initialized: false,
            started: false,
        }
    }
}

impl<D: Driver> CaptureBackend for ReadWriteBackend<D> {
    fn name(&self) -> &'static str {
        "read/write"
    }

    fn init(&mut self, max_frame_bytes: u32) -> Result<()> {
        if self.initialized {
            return Err(Error::Sequence("read/write capture is already initialized"));
        }
        debug!("initializing R/W-IO for frames up to {max_frame_bytes} bytes");
        self.max_frame_bytes = max_frame_bytes;
        self.initialized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::Sequence("start() called before init()"));
        }
        if self.started {
            return Err(Error::Sequence("read/write capture is already started"));
        }
        debug!("starting R/W-IO");
        self.started = true;
        Ok(())
    }

    fn read(&mut self, dst: &mut FrameBuffer) -> Result<()> {
        if !self.started {
            return Err(Error::Sequence("read() called before start()"));
        }
        let max = self.max_frame_bytes as usize;
        dst.reserve(max)?;

        let read = loop {
            match self.driver.read(&mut dst.data_mut()[..max]) {
                Ok(0) => {
                    return Err(Error::CaptureIo {
                        context: "error while reading image",
                        source: io::Error::from(io::ErrorKind::UnexpectedEof),
                    })
                }
                Ok(n) => break n,
                Err(Errno::EAGAIN) => {
                    trace!("no frame ready");
                    thread::sleep(READ_RETRY);
                }
                Err(e) => return Err(Error::capture_io("error while reading image", e)),
            }
        };
        dst.set_used(read)
    }

    fn stop(&mut self) -> Result<()> {
        if self.started {
            debug!("stopping R/W-IO");
            self.started = false;
        }
        Ok(())
    }

    fn uninit(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::Sequence("uninit() called before init()"));
        }
        debug!("un-initializing R/W-IO");
        self.started = false;
        self.initialized = false;
        Ok(())
    }
}
