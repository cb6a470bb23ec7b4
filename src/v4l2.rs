// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    driver::{
        BufferInfo, Capabilities, DequeuedBuffer, Driver, FormatDescription, FrameSize, Mapping,
        NegotiatedFormat,
    },
    fourcc::FourCC,
};
use libc::{c_int, c_void, MAP_SHARED, PROT_READ, PROT_WRITE};
use nix::errno::Errno;
use std::{
    fmt, io, mem,
    os::fd::RawFd,
    path::Path,
    ptr::{null_mut, NonNull},
    slice::from_raw_parts,
};
use tracing::{debug, warn};
use v4l::{
    buffer::Type,
    format::FieldOrder,
    v4l2::{self, vidioc},
    v4l_sys::*,
    Memory,
};

const CAPTURE: u32 = Type::VideoCapture as u32;

/// The errno carried by an I/O error, `EIO` when there is none.
fn errno_of(err: &io::Error) -> Errno {
    Errno::from_raw(err.raw_os_error().unwrap_or(libc::EIO))
}

/// Repeats an ioctl until it completes or fails with something other than
/// `EINTR`.
fn xioctl(mut f: impl FnMut() -> io::Result<()>) -> Result<(), Errno> {
    loop {
        match f() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(errno_of(&e)),
        }
    }
}

fn arg<T>(value: &mut T) -> *mut c_void {
    (value as *mut T).cast::<c_void>()
}

/// Converts a NUL padded kernel string field into an owned string.
fn c_str_lossy(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn capabilities(cap: &v4l2_capability) -> Capabilities {
    let flags = if cap.capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
        cap.device_caps
    } else {
        cap.capabilities
    };
    Capabilities {
        driver: c_str_lossy(&cap.driver),
        card: c_str_lossy(&cap.card),
        bus_info: c_str_lossy(&cap.bus_info),
        capture: flags & V4L2_CAP_VIDEO_CAPTURE != 0,
        streaming: flags & V4L2_CAP_STREAMING != 0,
        read_write: flags & V4L2_CAP_READWRITE != 0,
        async_io: flags & V4L2_CAP_ASYNCIO != 0,
        m2m: flags & V4L2_CAP_VIDEO_M2M != 0,
    }
}

fn frame_size(size: &v4l2_frmsizeenum) -> FrameSize {
    // SAFETY: the union member is selected by the type the driver reported
    unsafe {
        let discrete = size.__bindgen_anon_1.discrete;
        let stepwise = size.__bindgen_anon_1.stepwise;
        match size.type_ {
            v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE => FrameSize::Discrete {
                width: discrete.width,
                height: discrete.height,
            },
            v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_CONTINUOUS => FrameSize::Continuous {
                min_width: stepwise.min_width,
                max_width: stepwise.max_width,
                min_height: stepwise.min_height,
                max_height: stepwise.max_height,
            },
            _ => FrameSize::Stepwise {
                min_width: stepwise.min_width,
                max_width: stepwise.max_width,
                step_width: stepwise.step_width,
                min_height: stepwise.min_height,
                max_height: stepwise.max_height,
                step_height: stepwise.step_height,
            },
        }
    }
}

/// An open V4L2 capture device node.
///
/// `v4l` opens nodes non-blocking, so dequeue and read report `EAGAIN`
/// instead of sleeping in the kernel. The node is closed when the
/// underlying [`v4l::Device`] drops.
pub struct V4l2Fd {
    device: v4l::Device,
    fd: RawFd,
}

impl V4l2Fd {
    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    /// The `v4l` device handle, for controls this crate does not wrap.
    pub fn device(&self) -> &v4l::Device {
        &self.device
    }

    fn capture_buffer(index: u32) -> v4l2_buffer {
        // SAFETY: plain-old-data kernel struct, all-zero is a valid value
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = CAPTURE;
        buf.memory = Memory::Mmap as u32;
        buf.index = index;
        buf
    }
}

impl fmt::Debug for V4l2Fd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "V4l2Fd({})", self.fd)
    }
}

impl Driver for V4l2Fd {
    type Mapping = MappedRegion;

    fn open(path: &Path) -> io::Result<Self> {
        let device = v4l::Device::with_path(path)?;
        let fd = device.handle().fd();
        Ok(V4l2Fd { device, fd })
    }

    fn query_capabilities(&self) -> Result<Capabilities, Errno> {
        let mut cap: v4l2_capability = unsafe { mem::zeroed() };
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_QUERYCAP, arg(&mut cap)) })?;
        Ok(capabilities(&cap))
    }

    fn enum_format(&self, index: u32) -> Result<FormatDescription, Errno> {
        let mut desc: v4l2_fmtdesc = unsafe { mem::zeroed() };
        desc.index = index;
        desc.type_ = CAPTURE;
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_ENUM_FMT, arg(&mut desc)) })?;
        Ok(FormatDescription {
            format: FourCC::from(desc.pixelformat),
            description: c_str_lossy(&desc.description),
            compressed: desc.flags & V4L2_FMT_FLAG_COMPRESSED != 0,
            emulated: desc.flags & V4L2_FMT_FLAG_EMULATED != 0,
        })
    }

    fn enum_frame_size(&self, format: FourCC, index: u32) -> Result<FrameSize, Errno> {
        let mut size: v4l2_frmsizeenum = unsafe { mem::zeroed() };
        size.index = index;
        size.pixel_format = format.into();
        xioctl(|| unsafe {
            v4l2::ioctl(self.fd, vidioc::VIDIOC_ENUM_FRAMESIZES, arg(&mut size))
        })?;
        Ok(frame_size(&size))
    }

    fn set_format(
        &self,
        width: u32,
        height: u32,
        format: FourCC,
    ) -> Result<NegotiatedFormat, Errno> {
        let mut fmt: v4l2_format = unsafe { mem::zeroed() };
        fmt.type_ = CAPTURE;
        // SAFETY: VIDEO_CAPTURE formats always use the `pix` member
        let mut pix = unsafe { fmt.fmt.pix };
        pix.width = width;
        pix.height = height;
        pix.pixelformat = format.into();
        pix.field = FieldOrder::Any as u32;
        fmt.fmt.pix = pix;
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_S_FMT, arg(&mut fmt)) })?;
        let pix = unsafe { fmt.fmt.pix };
        Ok(NegotiatedFormat {
            width: pix.width,
            height: pix.height,
            format: FourCC::from(pix.pixelformat),
            bytes_per_line: pix.bytesperline,
            size_image: pix.sizeimage,
        })
    }

    fn request_buffers(&self, count: u32) -> Result<u32, Errno> {
        let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
        req.count = count;
        req.type_ = CAPTURE;
        req.memory = Memory::Mmap as u32;
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_REQBUFS, arg(&mut req)) })?;
        Ok(req.count)
    }

    fn query_buffer(&self, index: u32) -> Result<BufferInfo, Errno> {
        let mut buf = Self::capture_buffer(index);
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_QUERYBUF, arg(&mut buf)) })?;
        Ok(BufferInfo {
            index: buf.index,
            // SAFETY: MMAP buffers report their location through `offset`
            offset: unsafe { buf.m.offset },
            length: buf.length,
        })
    }

    fn queue_buffer(&self, index: u32) -> Result<(), Errno> {
        let mut buf = Self::capture_buffer(index);
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_QBUF, arg(&mut buf)) })
    }

    fn dequeue_buffer(&self) -> Result<DequeuedBuffer, Errno> {
        let mut buf = Self::capture_buffer(0);
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_DQBUF, arg(&mut buf)) })?;
        Ok(DequeuedBuffer {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
        })
    }

    fn stream_on(&self) -> Result<(), Errno> {
        let mut type_ = CAPTURE as c_int;
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_STREAMON, arg(&mut type_)) })
    }

    fn stream_off(&self) -> Result<(), Errno> {
        let mut type_ = CAPTURE as c_int;
        xioctl(|| unsafe { v4l2::ioctl(self.fd, vidioc::VIDIOC_STREAMOFF, arg(&mut type_)) })
    }

    fn map(&self, buffer: &BufferInfo) -> Result<MappedRegion, Errno> {
        MappedRegion::new(self.fd, buffer.offset, buffer.length as usize)
    }

    fn read(&self, dst: &mut [u8]) -> Result<usize, Errno> {
        loop {
            let n = unsafe { libc::read(self.fd, dst.as_mut_ptr().cast::<c_void>(), dst.len()) };
            match Errno::result(n) {
                Err(Errno::EINTR) => continue,
                res => return res.map(|n| n as usize),
            }
        }
    }
}

/// One driver buffer mapped shared into this process.
///
/// The mapping is released exactly once: either through [`Mapping::unmap`],
/// which reports failure, or on drop, which logs it.
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedRegion {
    fn new(fd: RawFd, offset: u32, len: usize) -> Result<Self, Errno> {
        if len == 0 {
            return Err(Errno::EINVAL);
        }
        let ptr = unsafe {
            v4l2::mmap(
                null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        }
        .map_err(|e| errno_of(&e))?;
        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or(Errno::EFAULT)?;
        debug!("mapped {len} bytes at offset {offset:#x}");
        Ok(MappedRegion { ptr, len })
    }

    fn release(&mut self) -> io::Result<()> {
        unsafe { v4l2::munmap(self.ptr.as_ptr().cast::<c_void>(), self.len) }
    }
}

impl Mapping for MappedRegion {
    fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn unmap(mut self) -> io::Result<()> {
        let res = self.release();
        mem::forget(self);
        res
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("unmap failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_str_stops_at_nul() {
        let mut card = [0u8; 32];
        card[..6].copy_from_slice(b"webcam");
        assert_eq!(c_str_lossy(&card), "webcam");
        assert_eq!(c_str_lossy(b"full"), "full");
    }

    #[test]
    fn errno_follows_os_error() {
        let err = io::Error::from_raw_os_error(libc::EAGAIN);
        assert_eq!(errno_of(&err), Errno::EAGAIN);
        let err = io::Error::new(io::ErrorKind::Other, "no errno");
        assert_eq!(errno_of(&err), Errno::EIO);
    }

    #[test]
    fn interrupted_ioctl_is_retried() {
        let mut calls = 0;
        let res = xioctl(|| {
            calls += 1;
            match calls {
                1 | 2 => Err(io::Error::from_raw_os_error(libc::EINTR)),
                _ => Err(io::Error::from_raw_os_error(libc::ENOTTY)),
            }
        });
        assert_eq!(res, Err(Errno::ENOTTY));
        assert_eq!(calls, 3);
    }

    #[test]
    fn device_caps_take_precedence() {
        let mut cap: v4l2_capability = unsafe { mem::zeroed() };
        cap.driver[..8].copy_from_slice(b"uvcvideo");
        cap.capabilities = V4L2_CAP_DEVICE_CAPS | V4L2_CAP_VIDEO_CAPTURE | V4L2_CAP_VIDEO_M2M;
        cap.device_caps = V4L2_CAP_VIDEO_CAPTURE | V4L2_CAP_STREAMING;

        let caps = capabilities(&cap);
        assert_eq!(caps.driver, "uvcvideo");
        assert!(caps.capture);
        assert!(caps.streaming);
        assert!(!caps.m2m);
        assert!(!caps.read_write);
    }

    #[test]
    fn frame_size_follows_reported_type() {
        let mut size: v4l2_frmsizeenum = unsafe { mem::zeroed() };
        size.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_DISCRETE;
        size.__bindgen_anon_1.discrete = v4l2_frmsize_discrete {
            width: 640,
            height: 480,
        };
        assert_eq!(
            frame_size(&size),
            FrameSize::Discrete {
                width: 640,
                height: 480
            }
        );

        size.type_ = v4l2_frmsizetypes_V4L2_FRMSIZE_TYPE_CONTINUOUS;
        size.__bindgen_anon_1.stepwise = v4l2_frmsize_stepwise {
            min_width: 16,
            max_width: 1920,
            step_width: 1,
            min_height: 16,
            max_height: 1080,
            step_height: 1,
        };
        assert!(matches!(
            frame_size(&size),
            FrameSize::Continuous {
                max_width: 1920,
                max_height: 1080,
                ..
            }
        ));
    }
}
