// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_capture::{convert::Target, fourcc::FourCC};
use std::path::PathBuf;

/// Representation written for each captured frame.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum OutputFormat {
    /// JPEG files
    Jpeg,
    /// PNG files
    Png,
    /// Packed 8-bit RGB
    Rgb,
    /// 8-bit greyscale
    Grey,
    /// Interleaved YUV 4:4:4
    Yuv24,
    /// Frames exactly as delivered by the driver
    Raw,
}

impl OutputFormat {
    /// Conversion target, or `None` for raw output.
    pub fn target(&self, quality: u8) -> Option<Target> {
        match self {
            OutputFormat::Jpeg => Some(Target::Jpeg { quality }),
            OutputFormat::Png => Some(Target::Png),
            OutputFormat::Rgb => Some(Target::Rgb24),
            OutputFormat::Grey => Some(Target::Grey),
            OutputFormat::Yuv24 => Some(Target::Yuv24),
            OutputFormat::Raw => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Rgb => "rgb",
            OutputFormat::Grey => "grey",
            OutputFormat::Yuv24 => "yuv",
            OutputFormat::Raw => "raw",
        }
    }
}

/// Command-line arguments for EdgeFirst Capture.
///
/// Captures a number of frames from a V4L2 device, converts each one and
/// writes it to the output directory. Arguments can be specified via command
/// line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-capture --device /dev/video0 --format YUYV --frames 10 --output png
///
/// # Via environment variables
/// export DEVICE=/dev/video2
/// export OUTPUT=jpeg
/// edgefirst-capture
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture device path
    #[arg(short, long, env = "DEVICE", default_value = "/dev/video0")]
    pub device: PathBuf,

    /// Requested capture resolution in pixels (width height)
    #[arg(
        short,
        long,
        env = "CAPTURE_SIZE",
        default_value = "640 480",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub size: Vec<u32>,

    /// Requested pixel format as a four character code (YUYV, YU12, MJPG, Y12...)
    #[arg(short, long, env = "FORMAT", default_value = "YUYV")]
    pub format: FourCC,

    /// Number of frames to capture
    #[arg(short = 'n', long, env = "FRAMES", default_value = "1")]
    pub frames: u32,

    /// Output representation
    #[arg(short, long, env = "OUTPUT", default_value = "jpeg", value_enum)]
    pub output: OutputFormat,

    /// JPEG quality (1-100)
    #[arg(short, long, env = "QUALITY", default_value = "90", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Directory receiving the frame files
    #[arg(long, env = "OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Print the device capabilities and supported formats as JSON and exit
    #[arg(long)]
    pub info: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    pub fn width(&self) -> u32 {
        self.size[0]
    }

    pub fn height(&self) -> u32 {
        self.size[1]
    }
}
