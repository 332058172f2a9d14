use crate::enums::Filtering;
use crate::interpolator::Interpolator;

use ndarray::Array3;

/// An 8-bit scalar voxel grid.
#[derive(Clone, Debug, Default)]
pub struct Volume {
    pub data: Array3<u8>,
}

impl Volume {
    pub fn new(data: Array3<u8>) -> Self {
        Self { data }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    /// Number of voxels, which is also the size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Samples the volume at normalized coordinates with repeat addressing.
    ///
    /// Returns a value in `[0, 1]`.
    pub fn sample(&self, u: f32, v: f32, w: f32, filtering: Filtering) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let view = self.data.view();
        match filtering {
            Filtering::Linear => Interpolator::trilinear(&view, u, v, w),
            Filtering::Nearest => Interpolator::nearest(&view, u, v, w),
        }
    }

    /// Quantizes a normalized sample to a display level.
    #[inline]
    pub fn normalize_to_u8(value: f32) -> u8 {
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}
