// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scriptable in-memory [`Driver`] for exercising the capture state machine
//! without hardware.

use crate::{
    driver::{
        BufferInfo, Capabilities, DequeuedBuffer, Driver, FormatDescription, FrameSize, Mapping,
        NegotiatedFormat,
    },
    fourcc::{FourCC, YUV420, YUYV},
};
use nix::errno::Errno;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io,
    path::Path,
    rc::Rc,
};

#[derive(Default)]
struct Stats {
    queued: Cell<usize>,
    maps: Cell<usize>,
    unmaps: Cell<usize>,
    dequeue_attempts: Cell<usize>,
    read_attempts: Cell<usize>,
    released: Cell<usize>,
}

pub(crate) struct MockMapping {
    data: Vec<u8>,
    stats: Rc<Stats>,
    fail_unmap: bool,
    released: bool,
}

impl Mapping for MockMapping {
    fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn unmap(mut self) -> io::Result<()> {
        self.released = true;
        self.stats.unmaps.set(self.stats.unmaps.get() + 1);
        if self.fail_unmap {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(())
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        if !self.released {
            self.stats.unmaps.set(self.stats.unmaps.get() + 1);
        }
    }
}

pub(crate) struct MockDriver {
    caps: Capabilities,
    formats: Vec<(FormatDescription, Vec<FrameSize>)>,
    substitute: Option<FourCC>,
    granted: u32,
    reqbufs_error: Option<Errno>,
    map_failure: Option<u32>,
    unmap_failure: bool,
    dequeue_error: Option<Errno>,
    stream_off_error: Option<Errno>,
    read_error: Option<Errno>,
    not_ready: Cell<u32>,
    ring: RefCell<VecDeque<u32>>,
    streaming: Cell<bool>,
    sequence: Cell<u32>,
    stats: Rc<Stats>,
}

fn description(format: FourCC) -> FormatDescription {
    FormatDescription {
        format,
        description: format.to_string(),
        compressed: format.is_compressed(),
        emulated: false,
    }
}

impl MockDriver {
    /// Bytes reported as used for every captured frame.
    pub const FRAME_BYTES: usize = 48;
    /// Length of every ring buffer.
    pub const BUFFER_BYTES: u32 = 64;
    /// Byte written by direct reads.
    pub const READ_FILL: u8 = 0xAB;

    fn with_caps(caps: Capabilities) -> Self {
        MockDriver {
            caps,
            formats: vec![
                (
                    description(YUYV),
                    vec![
                        FrameSize::Discrete {
                            width: 640,
                            height: 480,
                        },
                        FrameSize::Discrete {
                            width: 320,
                            height: 240,
                        },
                    ],
                ),
                (
                    description(YUV420),
                    vec![FrameSize::Discrete {
                        width: 640,
                        height: 480,
                    }],
                ),
            ],
            substitute: None,
            granted: 4,
            reqbufs_error: None,
            map_failure: None,
            unmap_failure: false,
            dequeue_error: None,
            stream_off_error: None,
            read_error: None,
            not_ready: Cell::new(0),
            ring: RefCell::new(VecDeque::new()),
            streaming: Cell::new(false),
            sequence: Cell::new(0),
            stats: Rc::new(Stats::default()),
        }
    }

    pub fn streaming() -> Self {
        Self::with_caps(Capabilities {
            driver: "mock".to_string(),
            card: "Mock Camera".to_string(),
            capture: true,
            streaming: true,
            read_write: true,
            ..Default::default()
        })
    }

    pub fn read_write_only() -> Self {
        Self::with_caps(Capabilities {
            driver: "mock".to_string(),
            capture: true,
            read_write: true,
            ..Default::default()
        })
    }

    pub fn without_io() -> Self {
        Self::with_caps(Capabilities {
            driver: "mock".to_string(),
            capture: true,
            ..Default::default()
        })
    }

    pub fn output_only() -> Self {
        Self::with_caps(Capabilities {
            driver: "mock".to_string(),
            streaming: true,
            ..Default::default()
        })
    }

    pub fn with_granted(mut self, granted: u32) -> Self {
        self.granted = granted;
        self
    }

    pub fn with_substitute(mut self, format: FourCC) -> Self {
        self.substitute = Some(format);
        self
    }

    pub fn with_reqbufs_error(mut self, errno: Errno) -> Self {
        self.reqbufs_error = Some(errno);
        self
    }

    /// Fails mapping the buffer at `index`.
    pub fn with_map_failure(mut self, index: u32) -> Self {
        self.map_failure = Some(index);
        self
    }

    pub fn with_unmap_failure(mut self) -> Self {
        self.unmap_failure = true;
        self
    }

    pub fn with_dequeue_error(mut self, errno: Errno) -> Self {
        self.dequeue_error = Some(errno);
        self
    }

    pub fn with_stream_off_error(mut self, errno: Errno) -> Self {
        self.stream_off_error = Some(errno);
        self
    }

    pub fn with_read_error(mut self, errno: Errno) -> Self {
        self.read_error = Some(errno);
        self
    }

    /// Reports "try again" for the first `count` dequeue or read attempts.
    pub fn with_not_ready(self, count: u32) -> Self {
        self.not_ready.set(count);
        self
    }

    pub fn queued(&self) -> usize {
        self.stats.queued.get()
    }

    pub fn maps(&self) -> usize {
        self.stats.maps.get()
    }

    pub fn unmaps(&self) -> usize {
        self.stats.unmaps.get()
    }

    pub fn dequeue_attempts(&self) -> usize {
        self.stats.dequeue_attempts.get()
    }

    pub fn read_attempts(&self) -> usize {
        self.stats.read_attempts.get()
    }

    pub fn released(&self) -> usize {
        self.stats.released.get()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.get()
    }

    fn take_not_ready(&self) -> bool {
        let remaining = self.not_ready.get();
        if remaining > 0 {
            self.not_ready.set(remaining - 1);
            return true;
        }
        false
    }
}

impl Driver for MockDriver {
    type Mapping = MockMapping;

    fn open(_path: &Path) -> io::Result<Self> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }

    fn query_capabilities(&self) -> Result<Capabilities, Errno> {
        Ok(self.caps.clone())
    }

    fn enum_format(&self, index: u32) -> Result<FormatDescription, Errno> {
        self.formats
            .get(index as usize)
            .map(|(desc, _)| desc.clone())
            .ok_or(Errno::EINVAL)
    }

    fn enum_frame_size(&self, format: FourCC, index: u32) -> Result<FrameSize, Errno> {
        self.formats
            .iter()
            .find(|(desc, _)| desc.format == format)
            .and_then(|(_, sizes)| sizes.get(index as usize).copied())
            .ok_or(Errno::EINVAL)
    }

    fn set_format(
        &self,
        width: u32,
        height: u32,
        format: FourCC,
    ) -> Result<NegotiatedFormat, Errno> {
        let format = self.substitute.unwrap_or(format);
        Ok(NegotiatedFormat {
            width,
            height,
            format,
            bytes_per_line: width * 2,
            size_image: width * height * 2,
        })
    }

    fn request_buffers(&self, count: u32) -> Result<u32, Errno> {
        if let Some(errno) = self.reqbufs_error {
            return Err(errno);
        }
        if count == 0 {
            self.stats.released.set(self.stats.released.get() + 1);
            return Ok(0);
        }
        Ok(self.granted)
    }

    fn query_buffer(&self, index: u32) -> Result<BufferInfo, Errno> {
        if index >= self.granted {
            return Err(Errno::EINVAL);
        }
        Ok(BufferInfo {
            index,
            offset: index * 4096,
            length: Self::BUFFER_BYTES,
        })
    }

    fn queue_buffer(&self, index: u32) -> Result<(), Errno> {
        self.ring.borrow_mut().push_back(index);
        self.stats.queued.set(self.stats.queued.get() + 1);
        Ok(())
    }

    fn dequeue_buffer(&self) -> Result<DequeuedBuffer, Errno> {
        self.stats
            .dequeue_attempts
            .set(self.stats.dequeue_attempts.get() + 1);
        if !self.streaming.get() {
            return Err(Errno::EINVAL);
        }
        if let Some(errno) = self.dequeue_error {
            return Err(errno);
        }
        if self.take_not_ready() {
            return Err(Errno::EAGAIN);
        }
        let index = self.ring.borrow_mut().pop_front().ok_or(Errno::EAGAIN)?;
        let sequence = self.sequence.get();
        self.sequence.set(sequence + 1);
        Ok(DequeuedBuffer {
            index,
            bytes_used: Self::FRAME_BYTES as u32,
            sequence,
        })
    }

    fn stream_on(&self) -> Result<(), Errno> {
        self.streaming.set(true);
        Ok(())
    }

    fn stream_off(&self) -> Result<(), Errno> {
        if let Some(errno) = self.stream_off_error {
            return Err(errno);
        }
        self.streaming.set(false);
        self.ring.borrow_mut().clear();
        Ok(())
    }

    fn map(&self, buffer: &BufferInfo) -> Result<MockMapping, Errno> {
        if self.map_failure == Some(buffer.index) {
            return Err(Errno::ENOMEM);
        }
        self.stats.maps.set(self.stats.maps.get() + 1);
        Ok(MockMapping {
            data: vec![buffer.index as u8 + 1; buffer.length as usize],
            stats: self.stats.clone(),
            fail_unmap: self.unmap_failure,
            released: false,
        })
    }

    fn read(&self, dst: &mut [u8]) -> Result<usize, Errno> {
        self.stats
            .read_attempts
            .set(self.stats.read_attempts.get() + 1);
        if let Some(errno) = self.read_error {
            return Err(errno);
        }
        if self.take_not_ready() {
            return Err(Errno::EAGAIN);
        }
        let n = dst.len().min(Self::FRAME_BYTES);
        dst[..n].fill(Self::READ_FILL);
        Ok(n)
    }
}
