use nalgebra::Vector3;

/// A voxel-space position. Fractional once centroids are involved.
pub type Coordinate = Vector3<f64>;

/// Coordinates closer than this on every axis share one set key.
pub const KEY_RESOLUTION: f64 = 1e-3;

/// Quantized form of a [`Coordinate`] used for set membership.
///
/// Exact float equality breaks as soon as a centroid has been computed, so
/// each axis is rounded to the nearest multiple of [`KEY_RESOLUTION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey(i64, i64, i64);

impl From<&Coordinate> for CoordKey {
    fn from(c: &Coordinate) -> Self {
        let q = |v: f64| (v / KEY_RESOLUTION).round() as i64;
        CoordKey(q(c.x), q(c.y), q(c.z))
    }
}

impl From<Coordinate> for CoordKey {
    fn from(c: Coordinate) -> Self {
        CoordKey::from(&c)
    }
}

/// Mean of `points`; NaN on every axis for an empty slice.
pub fn centroid(points: &[Coordinate]) -> Coordinate {
    let n = points.len() as f64;
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc: Coordinate, p| acc + p);
    sum / n
}

/// Midpoint between two positions.
pub fn midpoint(a: &Coordinate, b: &Coordinate) -> Coordinate {
    (a + b) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rounding() {
        let a = CoordKey::from(Vector3::new(1.0004, 2.0, 3.0));
        let b = CoordKey::from(Vector3::new(0.9996, 2.0, 3.0));
        let c = CoordKey::from(Vector3::new(1.002, 2.0, 3.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_centroid_of_empty_is_nan() {
        let c = centroid(&[]);
        assert!(c.x.is_nan() && c.y.is_nan() && c.z.is_nan());
    }
}
