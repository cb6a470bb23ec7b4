// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Capture tests against a real camera.
//!
//! Run with `cargo test -- --ignored` on a target with a UVC or ISP camera.
//! The device defaults to `/dev/video0` and can be overridden with the
//! `DEVICE` environment variable.

use edgefirst_capture::{
    convert::{ConversionEngine, Target},
    device::{Device, DeviceState},
    error::Error as CaptureError,
    fourcc,
};
use serial_test::serial;
use std::{env, error::Error, time::Instant};

fn camera() -> Device {
    Device::new(env::var("DEVICE").unwrap_or_else(|_| "/dev/video0".to_string()))
}

#[test]
#[ignore = "requires a capture device"]
#[serial]
fn test_enumerate() -> Result<(), Box<dyn Error>> {
    let mut cam = camera();
    cam.open()?;
    let caps = cam.capabilities();
    println!("{} ({}) on {}", caps.card, caps.driver, caps.bus_info);
    assert!(caps.capture);
    assert!(!cam.supported_formats().is_empty());
    for format in cam.supported_formats() {
        println!("{} {}", format.description.format, format.description.description);
    }
    Ok(())
}

#[test]
#[ignore = "requires a capture device"]
#[serial]
fn test_capture_frames() -> Result<(), Box<dyn Error>> {
    let mut cam = camera();
    cam.open()?;
    let negotiated = cam.set_format(640, 480, fourcc::YUYV)?;
    cam.init()?;
    cam.start()?;
    assert_eq!(cam.state(), DeviceState::Running);

    let mut engine = ConversionEngine::new();
    for _ in 0..10 {
        let now = Instant::now();
        let frame = cam.read_frame()?;
        println!("{frame} in {:?}", now.elapsed());
        assert_eq!(frame.format(), negotiated.format);
        assert_eq!(frame.width(), negotiated.width);
        assert!(frame.used() > 0);

        match engine.convert(frame, Target::Jpeg { quality: 80 }) {
            Ok(jpeg) => assert_eq!(&jpeg.data()[..2], &[0xFF, 0xD8]),
            Err(CaptureError::UnsupportedFormat { format, .. }) => {
                println!("no JPEG path for {format}")
            }
            Err(e) => return Err(e.into()),
        }
    }

    cam.stop()?;
    cam.stop()?;
    cam.close()?;
    assert_eq!(cam.state(), DeviceState::Closed);
    Ok(())
}

#[test]
#[ignore = "requires a capture device"]
#[serial]
fn test_restart() -> Result<(), Box<dyn Error>> {
    let mut cam = camera();
    cam.open()?;
    cam.set_format(640, 480, fourcc::YUYV)?;
    for _ in 0..3 {
        cam.init()?;
        cam.start()?;
        cam.read_frame()?;
        cam.uninit()?;
        assert_eq!(cam.state(), DeviceState::FormatSet);
    }
    Ok(())
}
