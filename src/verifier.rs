//! Captures rendered frames, stores them and compares them against references.
//!
//! Two capture paths exist. Binary captures store the renderer's output
//! buffer as little-endian `u32` words and compare word by word. Image
//! captures store the presented frame as a binary PPM and compare the decoded
//! RGB components.
//!
//! Both comparisons share [`Tolerance`]: a component mismatches when it
//! differs from the reference by more than `epsilon`, and the comparison
//! passes while mismatches stay below `threshold` of all components.

use crate::enums::VerifyMode;
use crate::renderer::FrameBuffer;
use crate::volume_loader::find_asset;

use image::{ImageFormat, RgbImage};
use log::{info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Reference file '{0}' not found in any search path")]
    MissingReference(String),

    #[error("No presented frame available for read-back")]
    NothingPresented,

    #[error("Binary file '{path}' holds {actual} bytes, expected {expected}")]
    BinarySize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    /// Largest per-component difference that still counts as equal.
    pub epsilon: f32,
    /// Fraction of components allowed to exceed `epsilon`.
    pub threshold: f32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            epsilon: 5.0,
            threshold: 0.15,
        }
    }
}

impl Tolerance {
    /// Compares two equally long sequences component-wise.
    pub fn compare<T: Copy + Into<f64>>(&self, reference: &[T], data: &[T]) -> bool {
        if reference.len() != data.len() {
            return false;
        }
        let epsilon = self.epsilon as f64;
        let mismatches = reference
            .iter()
            .zip(data)
            .filter(|&(&r, &d)| (r.into() - d.into()).abs() > epsilon)
            .count();

        if mismatches > 0 {
            warn!(
                "{} of {} components differ by more than {}",
                mismatches,
                reference.len(),
                self.epsilon
            );
        }

        if self.threshold == 0.0 {
            mismatches == 0
        } else {
            reference.len() as f64 * self.threshold as f64 > mismatches as f64
        }
    }
}

/// File names of captured frames and their references.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactPaths {
    /// Directory captured frames are written to.
    pub output_dir: PathBuf,
    pub image_output: String,
    pub image_reference: String,
    pub binary_output: String,
    pub binary_reference: String,
    /// Extra directories searched for references before the defaults.
    pub reference_dirs: Vec<PathBuf>,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            image_output: "simpleTexture3D.ppm".to_string(),
            image_reference: "ref_simpleTex3D.ppm".to_string(),
            binary_output: "simpleTexture3D.bin".to_string(),
            binary_reference: "ref_texture3D.bin".to_string(),
            reference_dirs: Vec::new(),
        }
    }
}

/// Checks one captured frame.
pub trait FrameVerifier {
    /// Persists `frame` and compares it with the matching reference.
    ///
    /// Returns `Ok(false)` on a mismatch; errors mean the check could not run.
    fn verify(&mut self, mode: VerifyMode, frame: &FrameBuffer) -> Result<bool, VerifyError>;
}

/// Verifier backed by reference files on disk.
pub struct ReferenceVerifier {
    artifacts: ArtifactPaths,
    tolerance: Tolerance,
}

impl ReferenceVerifier {
    pub fn new(artifacts: ArtifactPaths, tolerance: Tolerance) -> Self {
        Self {
            artifacts,
            tolerance,
        }
    }

    /// Converts a frame into an RGB image.
    pub fn capture(frame: &FrameBuffer) -> RgbImage {
        RgbImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
            let pixel = frame.pixels[y as usize * frame.width + x as usize];
            image::Rgb([(pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8])
        })
    }

    /// Writes `image` as a binary PPM.
    pub fn save(image: &RgbImage, path: &Path) -> Result<(), VerifyError> {
        image.save_with_format(path, ImageFormat::Pnm)?;
        Ok(())
    }

    /// Compares two image files.
    ///
    /// Differing dimensions are a mismatch, not an error.
    pub fn diff(output: &Path, reference: &Path, tolerance: Tolerance) -> Result<bool, VerifyError> {
        let output = image::open(output)?.to_rgb8();
        let reference = image::open(reference)?.to_rgb8();

        if output.dimensions() != reference.dimensions() {
            warn!(
                "Image sizes differ: {:?} vs reference {:?}",
                output.dimensions(),
                reference.dimensions()
            );
            return Ok(false);
        }
        Ok(tolerance.compare(reference.as_raw(), output.as_raw()))
    }

    /// Writes the frame as little-endian `u32` words.
    pub fn save_binary(frame: &FrameBuffer, path: &Path) -> Result<(), VerifyError> {
        let bytes: Vec<u8> = frame
            .pixels
            .iter()
            .flat_map(|pixel| pixel.to_le_bytes())
            .collect();
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Reads `len` little-endian `u32` words.
    pub fn load_binary(path: &Path, len: usize) -> Result<Vec<u32>, VerifyError> {
        let bytes = fs::read(path)?;
        let expected = len * std::mem::size_of::<u32>();
        if bytes.len() < expected {
            return Err(VerifyError::BinarySize {
                path: path.to_path_buf(),
                expected,
                actual: bytes.len(),
            });
        }
        Ok(bytes[..expected]
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }

    /// Compares the first `len` words of two binary captures.
    pub fn diff_binary(
        output: &Path,
        reference: &Path,
        len: usize,
        tolerance: Tolerance,
    ) -> Result<bool, VerifyError> {
        let output = Self::load_binary(output, len)?;
        let reference = Self::load_binary(reference, len)?;
        Ok(tolerance.compare(&reference, &output))
    }

    fn locate_reference(&self, name: &str) -> Result<PathBuf, VerifyError> {
        let roots = crate::volume_loader::search_roots(&self.artifacts.reference_dirs);
        find_asset(name, &roots).ok_or_else(|| VerifyError::MissingReference(name.to_string()))
    }
}

impl FrameVerifier for ReferenceVerifier {
    fn verify(&mut self, mode: VerifyMode, frame: &FrameBuffer) -> Result<bool, VerifyError> {
        let passed = match mode {
            VerifyMode::Binary => {
                let reference = self.locate_reference(&self.artifacts.binary_reference)?;
                let output = self.artifacts.output_dir.join(&self.artifacts.binary_output);
                Self::save_binary(frame, &output)?;
                info!(
                    "Comparing '{}' against '{}'",
                    output.display(),
                    reference.display()
                );
                Self::diff_binary(&output, &reference, frame.len(), self.tolerance)?
            }
            VerifyMode::Image => {
                let reference = self.locate_reference(&self.artifacts.image_reference)?;
                let output = self.artifacts.output_dir.join(&self.artifacts.image_output);
                Self::save(&Self::capture(frame), &output)?;
                info!(
                    "Comparing '{}' against '{}'",
                    output.display(),
                    reference.display()
                );
                Self::diff(&output, &reference, self.tolerance)?
            }
        };
        Ok(passed)
    }
}
