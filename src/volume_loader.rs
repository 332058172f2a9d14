use crate::volume::Volume;

use log::{info, warn};
use ndarray::Array3;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Volume file '{0}' not found in any search path")]
    NotFound(String),

    #[error("Volume file '{path}' holds {actual} bytes, expected {expected}")]
    Truncated {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Volume dimensions must be non-zero")]
    EmptyDimensions,

    #[error("Volume of {0:?} voxels does not fit in memory")]
    TooLarge((usize, usize, usize)),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a raw 8-bit volume from a file
    ///
    /// # Arguments
    ///
    /// * `path` - File holding `depth * height * width` bytes, x fastest
    /// * `dim` - Dimensions as (depth, height, width)
    ///
    /// # Errors
    ///
    /// Returns error if a dimension is zero, the voxel count overflows, or the
    /// file cannot be read or is shorter than the volume
    pub fn load_raw(
        path: impl AsRef<Path>,
        dim: (usize, usize, usize),
    ) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        let expected = voxel_count(dim)?;
        let bytes = fs::read(path)?;

        if bytes.len() < expected {
            return Err(VolumeLoaderError::Truncated {
                path: path.to_path_buf(),
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            warn!(
                "'{}' is {} bytes, using the first {}",
                path.display(),
                bytes.len(),
                expected
            );
        }

        let volume = Self::load_from_bytes(&bytes[..expected], dim)?;
        info!("Read '{}', {} bytes", path.display(), expected);
        Ok(volume)
    }

    /// Build a volume from bytes already in memory
    pub fn load_from_bytes(
        bytes: &[u8],
        dim: (usize, usize, usize),
    ) -> Result<Volume, VolumeLoaderError> {
        let expected = voxel_count(dim)?;
        if bytes.len() < expected {
            return Err(VolumeLoaderError::Truncated {
                path: PathBuf::new(),
                expected,
                actual: bytes.len(),
            });
        }
        let data = Array3::from_shape_vec(dim, bytes[..expected].to_vec())
            .map_err(|_| VolumeLoaderError::EmptyDimensions)?;
        Ok(Volume::new(data))
    }

    /// Locate `name` via [`find_asset`] and load it
    pub fn load_named(
        name: &str,
        extra_dirs: &[PathBuf],
        dim: (usize, usize, usize),
    ) -> Result<Volume, VolumeLoaderError> {
        let roots = search_roots(extra_dirs);
        let path =
            find_asset(name, &roots).ok_or_else(|| VolumeLoaderError::NotFound(name.to_string()))?;
        Self::load_raw(path, dim)
    }
}

fn voxel_count(dim: (usize, usize, usize)) -> Result<usize, VolumeLoaderError> {
    if dim.0 == 0 || dim.1 == 0 || dim.2 == 0 {
        return Err(VolumeLoaderError::EmptyDimensions);
    }
    dim.0
        .checked_mul(dim.1)
        .and_then(|n| n.checked_mul(dim.2))
        .ok_or(VolumeLoaderError::TooLarge(dim))
}

/// Directories searched for data files, most specific first.
///
/// `extra_dirs` come first, then the working directory and the directory of
/// the running executable together with their `data` siblings.
pub fn search_roots(extra_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = extra_dirs.to_vec();

    if let Ok(cwd) = std::env::current_dir() {
        let data = cwd.join("data");
        roots.extend([cwd, data]);
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let data = exe_dir.join("data");
        let parent_data = exe_dir.join("..").join("data");
        let grandparent_data = exe_dir.join("..").join("..").join("data");
        roots.extend([exe_dir, data, parent_data, grandparent_data]);
    }

    roots
}

/// Returns the first `root/name` that exists as a file.
pub fn find_asset(name: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_absolute() {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    roots
        .iter()
        .map(|root| root.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_exact_size_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.raw");
        let bytes: Vec<u8> = (0..8u8).collect();
        fs::write(&path, &bytes).unwrap();

        let volume = VolumeLoader::load_raw(&path, (2, 2, 2)).unwrap();
        assert_eq!(volume.dim(), (2, 2, 2));
        // x varies fastest
        assert_eq!(volume.data()[[0, 0, 1]], 1);
        assert_eq!(volume.data()[[0, 1, 0]], 2);
        assert_eq!(volume.data()[[1, 0, 0]], 4);
    }

    #[test]
    fn short_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.raw");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        let err = VolumeLoader::load_raw(&path, (2, 2, 2)).unwrap_err();
        assert!(matches!(
            err,
            VolumeLoaderError::Truncated {
                expected: 8,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn long_file_uses_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.raw");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[9u8; 12]).unwrap();
        drop(file);

        let volume = VolumeLoader::load_raw(&path, (2, 2, 2)).unwrap();
        assert_eq!(volume.len(), 8);
        assert!(volume.data().iter().all(|&v| v == 9));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VolumeLoader::load_raw(dir.path().join("nope.raw"), (1, 1, 1)).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::Io(_)));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let err = VolumeLoader::load_from_bytes(&[], (0, 4, 4)).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::EmptyDimensions));
    }

    #[test]
    fn zero_dimension_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let err = VolumeLoader::load_raw(dir.path().join("absent.raw"), (4, 0, 4)).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::EmptyDimensions));
    }

    #[test]
    fn overflowing_dimensions_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.raw");
        fs::write(&path, [0u8; 8]).unwrap();

        let dim = (usize::MAX / 2, 4, 1);
        let err = VolumeLoader::load_raw(&path, dim).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::TooLarge(d) if d == dim));

        let err = VolumeLoader::load_from_bytes(&[0u8; 8], (2, usize::MAX, 2)).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::TooLarge(_)));
    }

    #[test]
    fn find_asset_respects_root_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("ref.bin"), b"b").unwrap();

        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            find_asset("ref.bin", &roots),
            Some(second.path().join("ref.bin"))
        );

        fs::write(first.path().join("ref.bin"), b"a").unwrap();
        assert_eq!(
            find_asset("ref.bin", &roots),
            Some(first.path().join("ref.bin"))
        );
    }

    #[test]
    fn find_asset_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_asset("missing.ppm", &[dir.path().to_path_buf()]), None);
    }

    #[test]
    fn load_named_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = VolumeLoader::load_named(
            "definitely-not-here-7f3a.raw",
            &[dir.path().to_path_buf()],
            (1, 1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, VolumeLoaderError::NotFound(_)));
    }
}
