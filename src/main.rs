// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_capture::{convert::ConversionEngine, device::Device, driver::FrameSize};
use serde_json::json;
use std::{error::Error, fs, time::Instant};
use tracing::{debug, info, info_span, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt as _, EnvFilter, Layer as _, Registry};

mod args;

fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy(),
    );

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(LevelFilter::INFO)),
        Err(_) => None,
    };

    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default().with_filter(level))
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn print_info(camera: &Device) -> Result<(), Box<dyn Error>> {
    let caps = camera.capabilities();
    let formats: Vec<_> = camera
        .supported_formats()
        .iter()
        .map(|format| {
            json!({
                "fourcc": format.description.format.to_string(),
                "description": format.description.description,
                "compressed": format.description.compressed,
                "emulated": format.description.emulated,
                "sizes": format.sizes.iter().map(FrameSize::to_string).collect::<Vec<_>>(),
            })
        })
        .collect();

    let info = json!({
        "device": camera.name(),
        "driver": caps.driver,
        "card": caps.card,
        "bus_info": caps.bus_info,
        "capabilities": {
            "capture": caps.capture,
            "streaming": caps.streaming,
            "read_write": caps.read_write,
            "async_io": caps.async_io,
            "m2m": caps.m2m,
        },
        "formats": formats,
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut camera = Device::new(&args.device);
    camera.open()?;
    if args.info {
        return print_info(&camera);
    }

    let negotiated = camera.set_format(args.width(), args.height(), args.format)?;
    camera.init()?;
    camera.start()?;
    info!(
        "capturing {} frames of {}x{} {} using {} I/O",
        args.frames,
        negotiated.width,
        negotiated.height,
        negotiated.format,
        camera.backend_name().unwrap_or("unknown")
    );

    fs::create_dir_all(&args.output_dir)?;
    let target = args.output.target(args.quality);
    let mut engine = ConversionEngine::new();

    for index in 0..args.frames {
        let _span = info_span!("frame", index).entered();

        let start = Instant::now();
        let frame = camera.read_frame()?;
        let captured = start.elapsed();

        let start = Instant::now();
        let output = match target {
            Some(target) => engine.convert(frame, target)?,
            None => frame,
        };
        let converted = start.elapsed();

        let path = args
            .output_dir
            .join(format!("frame-{index:04}.{}", args.output.extension()));
        fs::write(&path, output.data())?;
        info!(
            "{} {} bytes (capture {:.2?}, convert {:.2?})",
            path.display(),
            output.used(),
            captured,
            converted
        );

        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }
    }

    camera.stop()?;
    camera.close()?;
    debug!("done");
    Ok(())
}
