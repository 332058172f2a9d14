use crate::enums::{Filtering, Processor, RunMode};
use crate::gpu_renderer::DeviceSelection;
use crate::verifier::{ArtifactPaths, Tolerance};

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--frame-check must be at least 2, got {0}")]
    FrameCheckTooSmall(u32),

    #[error("Frame size must be non-zero, got {0}x{1}")]
    EmptyFrame(usize, usize),

    #[error("Frame size {0}x{1} is too large")]
    FrameTooLarge(usize, usize),

    #[error("--headless needs an automated mode (drop --noqatest or add --noprompt)")]
    HeadlessInteractive,

    #[error("--volume-dim takes exactly three values (depth,height,width), got {0:?}")]
    VolumeDim(Vec<usize>),
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "volume-slice",
    about = "Renders slices of a raw 3D volume with a wgpu compute kernel",
    version
)]
pub struct Cli {
    /// Run interactively instead of the automated readback test
    #[arg(long)]
    pub noqatest: bool,

    /// Force the automated readback test even with --noqatest
    #[arg(long)]
    pub noprompt: bool,

    /// Verify the presented frame as an image instead of the raw output buffer
    #[arg(long)]
    pub glverify: bool,

    /// GPU adapter index; defaults to the highest performance adapter
    #[arg(long)]
    pub device: Option<usize>,

    /// Resample on the CPU instead of the GPU
    #[arg(long)]
    pub cpu: bool,

    /// Render without opening a window
    #[arg(long)]
    pub headless: bool,

    /// Exit with status 1 when a frame does not match its reference
    #[arg(long)]
    pub strict: bool,

    /// Start with nearest instead of linear sampling
    #[arg(long)]
    pub nearest: bool,

    /// Raw 8-bit volume file
    #[arg(long, default_value = "Bucky.raw")]
    pub volume: String,

    /// Volume dimensions as depth,height,width
    #[arg(long, value_delimiter = ',', default_values_t = [32usize, 32, 32])]
    pub volume_dim: Vec<usize>,

    /// Extra directory searched for the volume and reference files
    #[arg(long)]
    pub data_dir: Vec<PathBuf>,

    /// Directory captured frames are written to
    #[arg(long, default_value = ".")]
    pub artifact_dir: PathBuf,

    /// Frames per sample window
    #[arg(long, default_value_t = 4)]
    pub frame_check: u32,

    #[arg(long, default_value_t = 512)]
    pub width: usize,

    #[arg(long, default_value_t = 512)]
    pub height: usize,
}

/// Everything a run needs, resolved from the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub mode: RunMode,
    pub processor: Processor,
    pub device: DeviceSelection,
    pub headless: bool,
    pub strict: bool,
    pub filtering: Filtering,
    pub volume: String,
    pub volume_dim: (usize, usize, usize),
    pub data_dirs: Vec<PathBuf>,
    pub artifacts: ArtifactPaths,
    pub tolerance: Tolerance,
    pub frame_check: u32,
    pub frame_size: (usize, usize),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::QaReadback,
            processor: Processor::GPU,
            device: DeviceSelection::HighPerformance,
            headless: false,
            strict: false,
            filtering: Filtering::Linear,
            volume: "Bucky.raw".to_string(),
            volume_dim: (32, 32, 32),
            data_dirs: Vec::new(),
            artifacts: ArtifactPaths::default(),
            tolerance: Tolerance::default(),
            frame_check: 4,
            frame_size: (512, 512),
        }
    }
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        if self.glverify {
            RunMode::GlVerify
        } else if !self.noqatest || self.noprompt {
            RunMode::QaReadback
        } else {
            RunMode::Interactive
        }
    }
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mode = cli.mode();

        if cli.frame_check < 2 {
            return Err(ConfigError::FrameCheckTooSmall(cli.frame_check));
        }
        if cli.width == 0 || cli.height == 0 {
            return Err(ConfigError::EmptyFrame(cli.width, cli.height));
        }
        let fits_u32 = u32::try_from(cli.width).is_ok() && u32::try_from(cli.height).is_ok();
        if !fits_u32 || frame_bytes(cli.width, cli.height).is_none() {
            return Err(ConfigError::FrameTooLarge(cli.width, cli.height));
        }
        if cli.headless && !mode.is_automated() {
            return Err(ConfigError::HeadlessInteractive);
        }

        let volume_dim = match cli.volume_dim.as_slice() {
            &[depth, height, width] => (depth, height, width),
            other => return Err(ConfigError::VolumeDim(other.to_vec())),
        };

        Ok(Self {
            mode,
            processor: if cli.cpu { Processor::CPU } else { Processor::GPU },
            device: cli
                .device
                .map_or(DeviceSelection::HighPerformance, DeviceSelection::Index),
            headless: cli.headless,
            strict: cli.strict,
            filtering: if cli.nearest {
                Filtering::Nearest
            } else {
                Filtering::Linear
            },
            volume: cli.volume,
            volume_dim,
            artifacts: ArtifactPaths {
                output_dir: cli.artifact_dir,
                reference_dirs: cli.data_dir.clone(),
                ..ArtifactPaths::default()
            },
            data_dirs: cli.data_dir,
            tolerance: Tolerance::default(),
            frame_check: cli.frame_check,
            frame_size: (cli.width, cli.height),
        })
    }
}

fn frame_bytes(width: usize, height: usize) -> Option<usize> {
    width
        .checked_mul(height)?
        .checked_mul(std::mem::size_of::<u32>())
}

const LONG_FLAGS: &[&str] = &[
    "noqatest",
    "noprompt",
    "glverify",
    "device",
    "cpu",
    "headless",
    "strict",
    "nearest",
    "volume",
    "volume-dim",
    "data-dir",
    "artifact-dir",
    "frame-check",
    "width",
    "height",
];

/// Rewrites single-dash long flags (`-noqatest`, `-device=1`) to their
/// double-dash form so existing test scripts keep working.
pub fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if LONG_FLAGS.contains(&name) {
                format!("--{rest}")
            } else {
                arg
            }
        })
        .collect()
}
