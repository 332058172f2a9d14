use crate::enums::Filtering;
use crate::volume::Volume;

use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No GPU adapter available: {0}")]
    NoAdapter(String),

    #[error("GPU device index {index} out of range ({available} adapters found)")]
    InvalidDevice { index: usize, available: usize },

    #[error("Failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("Readback channel closed before the buffer was mapped")]
    MapCancelled,

    #[error("GPU poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("Volume of {0:?} voxels cannot be uploaded as a 3D texture")]
    VolumeTooLarge((usize, usize, usize)),

    #[error("A {width}x{height} frame exceeds the device buffer or dispatch limits")]
    FrameTooLarge { width: usize, height: usize },

    #[error("Frame buffer holds {actual} pixels, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}

/// Host-side image shared between the renderer and the display surface.
///
/// Each pixel is `0x00RRGGBB`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub(crate) fn check_size(&self) -> Result<(), RenderError> {
        let expected = self.width * self.height;
        if self.pixels.len() != expected {
            return Err(RenderError::FrameSize {
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn grey(level: u8) -> u32 {
        let level = level as u32;
        (level << 16) | (level << 8) | level
    }
}

/// Fills a frame with one slice of a volume.
pub trait Renderer {
    /// Resamples the slice at depth `cursor` into `output`.
    fn render(&mut self, cursor: f32, output: &mut FrameBuffer) -> Result<(), RenderError>;

    fn set_filtering(&mut self, filtering: Filtering);
}

/// Resamples on the CPU with the same addressing and quantization as the GPU kernel.
pub struct CpuRenderer {
    volume: Volume,
    filtering: Filtering,
}

impl CpuRenderer {
    pub fn new(volume: Volume, filtering: Filtering) -> Self {
        Self { volume, filtering }
    }

    pub fn filtering(&self) -> Filtering {
        self.filtering
    }
}

impl Renderer for CpuRenderer {
    fn render(&mut self, cursor: f32, output: &mut FrameBuffer) -> Result<(), RenderError> {
        output.check_size()?;
        let (width, height) = (output.width, output.height);
        if width == 0 || height == 0 {
            return Ok(());
        }
        let volume = &self.volume;
        let filtering = self.filtering;

        output
            .pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let v = y as f32 / height as f32;
                for (x, pixel) in row.iter_mut().enumerate() {
                    let u = x as f32 / width as f32;
                    let voxel = volume.sample(u, v, cursor, filtering);
                    *pixel = FrameBuffer::grey(Volume::normalize_to_u8(voxel));
                }
            });
        Ok(())
    }

    fn set_filtering(&mut self, filtering: Filtering) {
        self.filtering = filtering;
    }
}
