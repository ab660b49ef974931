use ndarray::Array3;
use rand::prelude::*;
use std::collections::HashSet;

use crate::ct::Volume;
use crate::lead::{Lead, LeadType};
use crate::pointcloud::Coordinate;

/// Intensity of every bright voxel in a synthetic volume.
pub const BRIGHT: f32 = 1000.0;

/// Percentile that keeps exactly the bright voxels of a synthetic volume,
/// as long as at least 0.01% of its voxels are bright.
pub const CLUSTER_PERCENTILE: f64 = 99.99;

/// Cubic volume of side `size`: a bright ball of radius 2 around every
/// center plus `noise` distinct bright voxels at least 12 voxels away from
/// all centers.
pub fn synthetic_volume(size: usize, centers: &[Coordinate], noise: usize, seed: u64) -> Volume {
    let mut data = Array3::<f32>::zeros((size, size, size));

    for center in centers {
        for ((i, j, k), value) in data.indexed_iter_mut() {
            let p = Coordinate::new(i as f64, j as f64, k as f64);
            if (p - center).norm_squared() <= 4.0 {
                *value = BRIGHT;
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut placed = HashSet::new();
    while placed.len() < noise {
        let voxel = (
            rng.random_range(0..size),
            rng.random_range(0..size),
            rng.random_range(0..size),
        );
        let p = Coordinate::new(voxel.0 as f64, voxel.1 as f64, voxel.2 as f64);
        if centers.iter().all(|c| (p - c).norm() >= 12.0) && placed.insert(voxel) {
            data[voxel] = BRIGHT;
        }
    }

    Volume::with_identity_affine(data)
}

/// Depth lead `label` with `n` contacts, every one localized `step` apart
/// starting at `start`.
pub fn localized_depth_lead(label: &str, n: usize, start: Coordinate, step: Coordinate) -> Lead {
    let mut lead = Lead::new(label, LeadType::Depth, (1, n), 4.0, step.norm(), None, false);
    for number in 1..=n {
        let location = (1, number as i64);
        lead.add_contact(
            &number.to_string(),
            start + step * (number - 1) as f64,
            location,
            0,
            false,
        )
        .unwrap();
    }
    lead
}
