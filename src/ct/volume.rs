use nalgebra::Matrix4;
use ndarray::Array3;
use ndarray_npy::{read_npy, ReadNpyError};
use std::path::Path;

use crate::error::{LocError, LocResult};
use crate::pointcloud::Coordinate;

/// A CT intensity volume in voxel order plus its voxel-to-world affine.
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<f32>,
    pub affine: Matrix4<f64>,
}

impl Volume {
    pub fn new(data: Array3<f32>, affine: Matrix4<f64>) -> Self {
        Volume { data, affine }
    }

    pub fn with_identity_affine(data: Array3<f32>) -> Self {
        Volume::new(data, Matrix4::identity())
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// `q`-th percentile of the finite intensities, interpolated linearly
    /// between the two closest ranks.
    pub fn percentile(&self, q: f64) -> Option<f64> {
        let mut values: Vec<f32> = self.data.iter().copied().filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return None;
        }

        let rank = q.clamp(0.0, 100.0) / 100.0 * (values.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let (_, lo_value, above) = values.select_nth_unstable_by(lo, |a, b| a.total_cmp(b));
        let lo_value = *lo_value as f64;
        let frac = rank - lo as f64;
        if frac == 0.0 || above.is_empty() {
            return Some(lo_value);
        }
        let hi_value = above.iter().copied().fold(f32::INFINITY, f32::min) as f64;
        Some(lo_value + (hi_value - lo_value) * frac)
    }

    /// Voxel indices whose intensity is at or above `value`.
    pub fn coordinates_at_or_above(&self, value: f64) -> Vec<Coordinate> {
        self.data
            .indexed_iter()
            .filter(|(_, v)| (**v as f64) >= value)
            .map(|((i, j, k), _)| Coordinate::new(i as f64, j as f64, k as f64))
            .collect()
    }

    /// The voxel axis that contributes most to world x (left/right).
    pub fn lateral_axis(&self) -> usize {
        (0..3)
            .max_by(|a, b| {
                self.affine[(0, *a)]
                    .abs()
                    .total_cmp(&self.affine[(0, *b)].abs())
            })
            .unwrap_or(0)
    }
}

/// Reads a volume from disk. Implemented by hosts for formats the crate
/// does not read itself.
pub trait VolumeLoader {
    fn load(&self, path: &Path) -> LocResult<Volume>;
}

/// Loads 3D `.npy` arrays of common numeric dtypes. The affine is the
/// identity, so voxel x is treated as world x.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpyVolumeLoader;

impl VolumeLoader for NpyVolumeLoader {
    fn load(&self, path: &Path) -> LocResult<Volume> {
        if !path.exists() {
            return Err(LocError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "volume file does not exist"),
            ));
        }

        let data = read_as_f32(path).map_err(|e| LocError::Volume {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::info!("loaded volume {:?} with shape {:?}", path, data.dim());
        Ok(Volume::with_identity_affine(data))
    }
}

fn read_as_f32(path: &Path) -> Result<Array3<f32>, ReadNpyError> {
    macro_rules! try_dtype {
        ($t:ty) => {
            match read_npy::<_, Array3<$t>>(path) {
                Ok(arr) => return Ok(arr.mapv(|v| v as f32)),
                Err(ReadNpyError::WrongDescriptor(_)) => {}
                Err(e) => return Err(e),
            }
        };
    }

    try_dtype!(f32);
    try_dtype!(f64);
    try_dtype!(i16);
    try_dtype!(u16);
    try_dtype!(i32);
    try_dtype!(u8);
    read_npy::<_, Array3<f32>>(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray_npy::write_npy;

    #[test]
    fn test_percentile_matches_linear_interpolation() {
        let data = Array3::from_shape_vec((1, 1, 5), vec![4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        let volume = Volume::with_identity_affine(data);
        assert_relative_eq!(volume.percentile(50.0).unwrap(), 3.0);
        assert_relative_eq!(volume.percentile(100.0).unwrap(), 5.0);
        assert_relative_eq!(volume.percentile(0.0).unwrap(), 1.0);
        // rank 3.6 between 4 and 5
        assert_relative_eq!(volume.percentile(90.0).unwrap(), 4.6, epsilon = 1e-9);
    }

    #[test]
    fn test_threshold_keeps_voxels_at_value() {
        let mut data = Array3::<f32>::zeros((3, 3, 3));
        data[(1, 2, 0)] = 10.0;
        data[(0, 0, 1)] = 10.0;
        let volume = Volume::with_identity_affine(data);
        let coords = volume.coordinates_at_or_above(10.0);
        assert_eq!(coords.len(), 2);
        assert!(coords.contains(&Coordinate::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn test_lateral_axis_follows_affine() {
        let mut affine = Matrix4::<f64>::zeros();
        affine[(0, 1)] = -0.5;
        affine[(1, 0)] = 0.5;
        affine[(2, 2)] = 1.0;
        affine[(3, 3)] = 1.0;
        let volume = Volume::new(Array3::zeros((2, 2, 2)), affine);
        assert_eq!(volume.lateral_axis(), 1);
    }

    #[test]
    fn test_npy_loader_converts_integer_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ct.npy");
        let data = Array3::<i16>::from_elem((2, 3, 4), 7);
        write_npy(&path, &data).unwrap();

        let volume = NpyVolumeLoader.load(&path).unwrap();
        assert_eq!(volume.shape(), (2, 3, 4));
        assert_eq!(volume.data[(1, 2, 3)], 7.0);
    }

    #[test]
    fn test_npy_loader_missing_file() {
        let res = NpyVolumeLoader.load(Path::new("data/fixtures/missing.npy"));
        assert!(matches!(res, Err(LocError::Io { .. })));
    }
}
