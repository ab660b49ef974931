use nalgebra::{DMatrix, Vector3};
use std::collections::BTreeMap;

use super::{Contact, Lead, LeadLayout};
use crate::error::{LocError, LocResult};
use crate::pointcloud::Coordinate;

const DEGENERATE_EPS: f64 = 1e-9;

impl Lead {
    /// Fills every empty primary slot from the contacts seeded so far.
    ///
    /// Linear leads interpolate between the two seeded neighbours of a slot and
    /// extrapolate past the ends in steps of `spacing` along the end segment.
    /// Planar leads fit `center = o + col * a + row * b` to every seeded slot
    /// by least squares. Nothing is written unless every slot can be placed.
    /// Returns the number of contacts added.
    pub fn interpolate(&mut self) -> LocResult<usize> {
        let placed = match self.layout() {
            LeadLayout::Linear => self.interpolate_linear()?,
            LeadLayout::Planar => self.interpolate_planar()?,
        };

        let added = placed.len();
        for contact in placed {
            self.contacts.insert(contact.label.clone(), contact);
        }
        log::info!("lead {}: interpolated {} contacts", self.label, added);
        Ok(added)
    }

    fn empty_slots(&self, seeded: &BTreeMap<usize, Coordinate>) -> Vec<usize> {
        (0..self.slot_count())
            .filter(|i| !seeded.contains_key(i))
            // a contact confirmed elsewhere may already own the slot's label
            .filter(|i| !self.contacts.contains_key(&self.slot_label(self.slot_at(*i))))
            .collect()
    }

    fn new_contact(&self, index: usize, center: Coordinate) -> Contact {
        let slot = self.slot_at(index);
        Contact {
            label: self.slot_label(slot),
            center,
            lead_location: self.location_of(slot),
            lead_group: 0,
        }
    }

    fn interpolate_linear(&self) -> LocResult<Vec<Contact>> {
        let seeded = self.seeded_slots();
        if seeded.len() < 2 {
            return Err(LocError::InsufficientContacts {
                lead: self.label.clone(),
                required: 2,
                found: seeded.len(),
            });
        }

        // for a single row or column the row-major index is the position on the line
        let known: Vec<(usize, Coordinate)> = seeded.iter().map(|(i, c)| (*i, *c)).collect();
        let first = known[0];
        let last = known[known.len() - 1];

        let mut placed = Vec::new();
        for index in self.empty_slots(&seeded) {
            let center = if index < first.0 {
                let dir = self.unit_direction(&known[0], &known[1])?;
                first.1 - dir * self.spacing * (first.0 - index) as f64
            } else if index > last.0 {
                let dir = self.unit_direction(&known[known.len() - 2], &last)?;
                last.1 + dir * self.spacing * (index - last.0) as f64
            } else {
                let upper = known
                    .iter()
                    .position(|(i, _)| *i > index)
                    .unwrap_or(known.len() - 1);
                let (ia, ca) = known[upper - 1];
                let (ib, cb) = known[upper];
                let t = (index - ia) as f64 / (ib - ia) as f64;
                ca + (cb - ca) * t
            };
            placed.push(self.new_contact(index, center));
        }
        Ok(placed)
    }

    fn unit_direction(
        &self,
        from: &(usize, Coordinate),
        to: &(usize, Coordinate),
    ) -> LocResult<Coordinate> {
        let delta = to.1 - from.1;
        let norm = delta.norm();
        if norm < DEGENERATE_EPS {
            return Err(LocError::DegenerateGeometry {
                lead: self.label.clone(),
                reason: format!(
                    "contacts {} and {} share one center, cannot extrapolate",
                    from.0 + 1,
                    to.0 + 1
                ),
            });
        }
        Ok(delta / norm)
    }

    fn interpolate_planar(&self) -> LocResult<Vec<Contact>> {
        let seeded = self.seeded_slots();
        if seeded.len() < 3 {
            return Err(LocError::InsufficientContacts {
                lead: self.label.clone(),
                required: 3,
                found: seeded.len(),
            });
        }

        let n = seeded.len();
        let mut design = DMatrix::<f64>::zeros(n, 3);
        let mut targets = DMatrix::<f64>::zeros(n, 3);
        for (row, (index, center)) in seeded.iter().enumerate() {
            let (col, grid_row) = self.slot_at(*index);
            design[(row, 0)] = 1.0;
            design[(row, 1)] = col as f64;
            design[(row, 2)] = grid_row as f64;
            for axis in 0..3 {
                targets[(row, axis)] = center[axis];
            }
        }

        if !spans_plane(&design) {
            return Err(LocError::DegenerateGeometry {
                lead: self.label.clone(),
                reason: "seeded contacts are collinear on the grid".to_string(),
            });
        }

        let svd = design.svd(true, true);
        let coeffs = svd
            .solve(&targets, DEGENERATE_EPS)
            .map_err(|e| LocError::DegenerateGeometry {
                lead: self.label.clone(),
                reason: e.to_string(),
            })?;

        let origin = Vector3::new(coeffs[(0, 0)], coeffs[(0, 1)], coeffs[(0, 2)]);
        let along_col = Vector3::new(coeffs[(1, 0)], coeffs[(1, 1)], coeffs[(1, 2)]);
        let along_row = Vector3::new(coeffs[(2, 0)], coeffs[(2, 1)], coeffs[(2, 2)]);

        Ok(self
            .empty_slots(&seeded)
            .into_iter()
            .map(|index| {
                let (col, row) = self.slot_at(index);
                let center = origin + along_col * col as f64 + along_row * row as f64;
                self.new_contact(index, center)
            })
            .collect())
    }
}

/// True when the `(1, col, row)` rows are not all on one grid line.
fn spans_plane(design: &DMatrix<f64>) -> bool {
    let c0 = design[(0, 1)];
    let r0 = design[(0, 2)];
    let mut first_dir: Option<(f64, f64)> = None;
    for i in 1..design.nrows() {
        let d = (design[(i, 1)] - c0, design[(i, 2)] - r0);
        if d.0 == 0.0 && d.1 == 0.0 {
            continue;
        }
        match first_dir {
            None => first_dir = Some(d),
            Some(f) => {
                if (f.0 * d.1 - f.1 * d.0).abs() > DEGENERATE_EPS {
                    return true;
                }
            }
        }
    }
    false
}
