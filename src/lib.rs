//! # Volume-slice library
//!
//! This crate renders cross-sections of a raw 8-bit volume and can check the
//! rendered frames against reference files.

//!
//! The volume is uploaded into a 3D texture and every frame a wgpu compute
//! kernel resamples the slice at the current depth cursor `w` into a frame
//! buffer, which is then shown in a window. A CPU renderer with the same
//! sampling rules exists for machines without a usable adapter and for tests.
//! The slice cursor moves forward every frame while animation is on.
//!
//! Runs come in three modes:
//!  - Interactive: the window stays open, keys move the cursor
//!  - QA readback: the renderer's output buffer is compared word by word
//!  - GL verify: the presented frame is compared as a PPM image
//!
//!  Automated runs capture exactly one frame per sample window, report
//!  `PASSED` or `FAILED!` and stop.
//!
//! # Controls
//!
//!  - `+` / `-`: step the slice cursor
//!  - `f`: toggle linear and nearest sampling
//!  - space: toggle animation
//!  - escape: quit
//!
//! # Examples
//!
//! ## Rendering one slice on the CPU
//!
//! ```no_run
//! # use volume_slice::{VolumeLoader, CpuRenderer, FrameBuffer, Filtering, Renderer};
//! let volume = VolumeLoader::load_raw("Bucky.raw", (32, 32, 32))
//!     .expect("should have loaded the volume");
//! let mut renderer = CpuRenderer::new(volume, Filtering::Linear);
//! let mut frame = FrameBuffer::new(512, 512);
//! renderer
//!     .render(0.5, &mut frame)
//!     .expect("should have rendered the center slice");
//! ```

pub mod app;
pub mod config;
pub mod controller;
pub mod display;
pub mod enums;
pub mod gpu_renderer;
mod interpolator;
pub mod renderer;
pub mod verifier;
pub mod volume;
pub mod volume_loader;

pub use controller::{FrameController, QaSummary, TickOutcome};
pub use enums::{Filtering, KeyOutcome, RunMode, VerifyMode};
pub use renderer::{CpuRenderer, FrameBuffer, Renderer};
pub use volume::Volume;
pub use volume_loader::VolumeLoader;
