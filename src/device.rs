// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    driver::{Capabilities, Driver, FrameSize, NegotiatedFormat, SupportedFormat},
    error::{Error, Result},
    fourcc::FourCC,
    frame::FrameBuffer,
    io::{CaptureBackend, MmapBackend, ReadWriteBackend},
    v4l2::V4l2Fd,
};
use nix::errno::Errno;
use std::{
    fmt, io,
    path::{Path, PathBuf},
    rc::Rc,
};
use tracing::{debug, info, warn};

/// Lifecycle state of a [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceState {
    Closed,
    Open,
    FormatSet,
    Initialized,
    Running,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DeviceState::Closed => "closed",
            DeviceState::Open => "open",
            DeviceState::FormatSet => "format set",
            DeviceState::Initialized => "initialized",
            DeviceState::Running => "running",
        };
        f.write_str(name)
    }
}

/// A capture device driven through the open, negotiate, init, start, read
/// sequence.
///
/// The capture strategy is chosen once by [`Device::init`] from the
/// advertised capabilities: the mmap ring when the device streams, direct
/// reads otherwise. Frames returned by [`Device::read_frame`] always carry the
/// format the driver actually applied, which may differ from the one
/// requested.
///
/// ```no_run
/// use edgefirst_capture::{device::Device, fourcc::YUYV};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut camera = Device::new("/dev/video0");
/// camera.open()?;
/// camera.set_format(640, 480, YUYV)?;
/// camera.init()?;
/// camera.start()?;
/// let frame = camera.read_frame()?;
/// println!("captured {frame}");
/// # Ok(())
/// # }
/// ```
pub struct Device<D: Driver + 'static = V4l2Fd> {
    name: String,
    path: PathBuf,
    driver: Option<Rc<D>>,
    state: DeviceState,
    capabilities: Capabilities,
    formats: Vec<SupportedFormat>,
    negotiated: Option<NegotiatedFormat>,
    backend: Option<Box<dyn CaptureBackend>>,
    frame: FrameBuffer,
}

impl Device<V4l2Fd> {
    /// Creates a closed device for the V4L2 node at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Device::build(path.display().to_string(), path, None)
    }
}

impl<D: Driver + 'static> Device<D> {
    /// Creates a closed device around an already opened driver.
    pub fn with_driver(name: impl Into<String>, driver: D) -> Self {
        let name = name.into();
        Device::build(name.clone(), PathBuf::from(name), Some(Rc::new(driver)))
    }

    fn build(name: String, path: PathBuf, driver: Option<Rc<D>>) -> Self {
        Device {
            name,
            path,
            driver,
            state: DeviceState::Closed,
            capabilities: Capabilities::default(),
            formats: Vec::new(),
            negotiated: None,
            backend: None,
            frame: FrameBuffer::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Formats and resolutions enumerated when the device was opened.
    pub fn supported_formats(&self) -> &[SupportedFormat] {
        &self.formats
    }

    /// The format the driver applied, once negotiated.
    pub fn format(&self) -> Option<NegotiatedFormat> {
        self.negotiated
    }

    /// Name of the selected capture strategy, once initialized.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|backend| backend.name())
    }

    pub fn driver(&self) -> Option<&D> {
        self.driver.as_deref()
    }

    fn open_error(&self, source: io::Error) -> Error {
        Error::DeviceOpen {
            device: self.name.clone(),
            source,
        }
    }

    fn active_driver(&self) -> Result<&Rc<D>> {
        self.driver
            .as_ref()
            .ok_or(Error::Sequence("device is not open"))
    }

    /// Opens the device, checks it can capture and enumerates its formats.
    pub fn open(&mut self) -> Result<()> {
        if self.state != DeviceState::Closed {
            return Ok(());
        }

        // a supplied driver stays in place when the checks below fail
        let driver = match &self.driver {
            Some(driver) => driver.clone(),
            None => Rc::new(D::open(&self.path).map_err(|e| self.open_error(e))?),
        };

        let capabilities = match driver.query_capabilities() {
            Ok(caps) => caps,
            Err(Errno::EINVAL | Errno::ENOTTY) => {
                return Err(self.open_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "not a V4L2 device",
                )))
            }
            Err(e) => return Err(self.open_error(io::Error::from(e))),
        };
        if !capabilities.capture {
            return Err(self.open_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a video capture device",
            )));
        }
        debug!(
            "{}: {} ({}) streaming={} read/write={}",
            self.name,
            capabilities.card,
            capabilities.driver,
            capabilities.streaming,
            capabilities.read_write
        );

        self.formats = enumerate_formats(driver.as_ref(), &self.name);
        self.capabilities = capabilities;
        self.driver = Some(driver);
        self.state = DeviceState::Open;
        Ok(())
    }

    /// Negotiates the capture format and returns what the driver applied.
    pub fn set_format(
        &mut self,
        width: u32,
        height: u32,
        format: FourCC,
    ) -> Result<NegotiatedFormat> {
        if !matches!(self.state, DeviceState::Open | DeviceState::FormatSet) {
            return Err(Error::Sequence(
                "set_format() requires an open, uninitialized device",
            ));
        }
        let actual = self
            .active_driver()?
            .set_format(width, height, format)
            .map_err(|e| Error::capture_io("error while setting format", e))?;

        if actual.format != format {
            warn!(
                "{}: driver substituted {} for requested {}",
                self.name, actual.format, format
            );
        }
        if actual.width != width || actual.height != height {
            warn!(
                "{}: driver adjusted {width}x{height} to {}x{}",
                self.name, actual.width, actual.height
            );
        }
        info!(
            "{}: negotiated {}x{} {} ({} bytes per frame)",
            self.name, actual.width, actual.height, actual.format, actual.size_image
        );

        self.negotiated = Some(actual);
        self.state = DeviceState::FormatSet;
        Ok(actual)
    }

    /// Selects the capture strategy and prepares it for the negotiated
    /// format.
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            DeviceState::Initialized | DeviceState::Running => return Ok(()),
            DeviceState::FormatSet => {}
            _ => return Err(Error::Sequence("init() called before set_format()")),
        }
        let negotiated = self
            .negotiated
            .ok_or(Error::Sequence("init() called before set_format()"))?;
        let max_frame_bytes = negotiated
            .size_image
            .max(negotiated.bytes_per_line * negotiated.height);

        if self.backend.is_none() {
            let driver = self.active_driver()?.clone();
            let backend: Box<dyn CaptureBackend> = if self.capabilities.streaming {
                Box::new(MmapBackend::new(driver))
            } else if self.capabilities.read_write {
                Box::new(ReadWriteBackend::new(driver))
            } else {
                return Err(Error::UnsupportedIo(format!(
                    "{} supports neither streaming nor read/write I/O",
                    self.name
                )));
            };
            info!("{}: using {} capture", self.name, backend.name());
            self.backend = Some(backend);
        }

        if let Some(backend) = self.backend.as_mut() {
            backend.init(max_frame_bytes)?;
        }
        self.state = DeviceState::Initialized;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            DeviceState::Running => return Ok(()),
            DeviceState::Initialized => {}
            _ => return Err(Error::Sequence("start() called before init()")),
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or(Error::Sequence("start() called before init()"))?;
        backend.start()?;
        debug!("{}: capture started", self.name);
        self.state = DeviceState::Running;
        Ok(())
    }

    /// Stops capturing. Does nothing unless the device is running.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != DeviceState::Running {
            return Ok(());
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.stop()?;
        }
        self.state = DeviceState::Initialized;
        debug!("{}: capture stopped", self.name);
        Ok(())
    }

    /// Releases the capture resources, stopping first when running.
    ///
    /// On failure the ring state is unknown; the device returns to
    /// [`DeviceState::FormatSet`] and needs a full [`Device::init`].
    pub fn uninit(&mut self) -> Result<()> {
        if self.state < DeviceState::Initialized {
            return Ok(());
        }
        let stopped = self.stop();
        self.state = DeviceState::FormatSet;
        let released = match self.backend.as_mut() {
            Some(backend) => backend.uninit(),
            None => Ok(()),
        };
        self.frame.reset();
        stopped.and(released)
    }

    /// Tears the device down completely and closes the node.
    pub fn close(&mut self) -> Result<()> {
        if self.state == DeviceState::Closed {
            return Ok(());
        }
        let released = self.uninit();
        self.backend = None;
        self.driver = None;
        self.negotiated = None;
        self.formats.clear();
        self.capabilities = Capabilities::default();
        self.state = DeviceState::Closed;
        debug!("{}: closed", self.name);
        released
    }

    /// Captures the next frame into the device's own buffer.
    ///
    /// The frame stays valid until the next call.
    pub fn read_frame(&mut self) -> Result<&FrameBuffer> {
        let mut frame = std::mem::take(&mut self.frame);
        let res = self.read_frame_into(&mut frame);
        self.frame = frame;
        res.map(|_| &self.frame)
    }

    /// Captures the next frame into a caller-owned buffer.
    pub fn read_frame_into(&mut self, dst: &mut FrameBuffer) -> Result<()> {
        if self.state != DeviceState::Running {
            return Err(Error::NotReady);
        }
        let negotiated = self.negotiated.ok_or(Error::NotReady)?;
        let backend = self.backend.as_mut().ok_or(Error::NotReady)?;
        backend.read(dst)?;
        let used = dst.used();
        dst.set_parameters(negotiated.width, negotiated.height, negotiated.format, used)
    }
}

fn enumerate_formats<D: Driver>(driver: &D, name: &str) -> Vec<SupportedFormat> {
    let mut formats = Vec::new();
    for index in 0.. {
        let description = match driver.enum_format(index) {
            Ok(description) => description,
            Err(Errno::EINVAL | Errno::ENOTTY) => break,
            Err(e) => {
                warn!("{name}: skipping formats from index {index}: {e}");
                break;
            }
        };

        let mut sizes = Vec::new();
        for size_index in 0.. {
            match driver.enum_frame_size(description.format, size_index) {
                Ok(size) => {
                    let last = !matches!(size, FrameSize::Discrete { .. });
                    sizes.push(size);
                    // stepwise and continuous ranges are reported as a single entry
                    if last {
                        break;
                    }
                }
                Err(Errno::EINVAL | Errno::ENOTTY) => break,
                Err(e) => {
                    warn!(
                        "{name}: skipping {} sizes from index {size_index}: {e}",
                        description.format
                    );
                    break;
                }
            }
        }

        debug!(
            "{name}: {} '{}' {}",
            description.format,
            description.description,
            sizes
                .iter()
                .map(FrameSize::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        formats.push(SupportedFormat { description, sizes });
    }
    formats
}

impl<D: Driver + 'static> Drop for Device<D> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}: teardown failed: {e}", self.name);
        }
    }
}

impl<D: Driver + 'static> fmt::Debug for Device<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("format", &self.negotiated)
            .field("backend", &self.backend_name())
            .finish()
    }
}
