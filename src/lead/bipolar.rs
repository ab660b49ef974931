use super::{Lead, LeadLayout};
use crate::pointcloud::{midpoint, Coordinate};

/// Virtual contact halfway between two adjacent primary contacts.
#[derive(Debug, Clone, PartialEq)]
pub struct BipolarPair {
    /// `<lead><a>-<lead><b>`, lower contact number first.
    pub name: String,
    pub first: String,
    pub second: String,
    pub center: Coordinate,
    pub lead_locations: ((i64, i64), (i64, i64)),
}

impl Lead {
    /// Pairs of neighbouring localized primary contacts.
    ///
    /// Neighbours on a linear lead are consecutive contacts. On a planar grid
    /// both horizontal and vertical neighbours are paired: all horizontal
    /// pairs row by row first, then all vertical pairs. Diagonals are never
    /// paired.
    pub fn bipolar_pairs(&self) -> Vec<BipolarPair> {
        let seeded = self.seeded_slots();
        let (width, height) = self.dimensions;
        let mut pairs = Vec::new();

        let mut push = |a: (usize, usize), b: (usize, usize)| {
            let (ia, ib) = (self.slot_index(a), self.slot_index(b));
            if let (Some(ca), Some(cb)) = (seeded.get(&ia), seeded.get(&ib)) {
                let first = self.slot_label(a);
                let second = self.slot_label(b);
                pairs.push(BipolarPair {
                    name: format!("{lead}{}-{lead}{}", first, second, lead = self.label),
                    first,
                    second,
                    center: midpoint(ca, cb),
                    lead_locations: (self.location_of(a), self.location_of(b)),
                });
            }
        };

        match self.layout() {
            LeadLayout::Linear => {
                for index in 1..self.slot_count() {
                    push(self.slot_at(index - 1), self.slot_at(index));
                }
            }
            LeadLayout::Planar => {
                for row in 0..height {
                    for col in 1..width {
                        push((col - 1, row), (col, row));
                    }
                }
                for row in 1..height {
                    for col in 0..width {
                        push((col, row - 1), (col, row));
                    }
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use crate::lead::{Lead, LeadType};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_depth_pairs() {
        let mut lead = Lead::new("LA", LeadType::Depth, (1, 10), 4.0, 5.0, None, false);
        for n in 1..=10usize {
            let loc = lead.location_of_number(n).unwrap();
            lead.add_contact(&n.to_string(), Vector3::new(0.0, 0.0, n as f64 * 5.0), loc, 0, false)
                .unwrap();
        }

        let pairs = lead.bipolar_pairs();
        assert_eq!(pairs.len(), 9);
        assert_eq!(pairs[0].name, "LA1-LA2");
        assert_eq!(pairs[8].name, "LA9-LA10");
        for (i, pair) in pairs.iter().enumerate() {
            let expected = Vector3::new(0.0, 0.0, (i as f64 + 1.5) * 5.0);
            assert_relative_eq!(pair.center, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gap_breaks_pairs() {
        let mut lead = Lead::new("LA", LeadType::Depth, (1, 4), 4.0, 5.0, None, false);
        for n in [1usize, 2, 4] {
            let loc = lead.location_of_number(n).unwrap();
            lead.add_contact(&n.to_string(), Vector3::zeros(), loc, 0, false)
                .unwrap();
        }
        let names: Vec<String> = lead.bipolar_pairs().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["LA1-LA2".to_string()]);
    }

    #[test]
    fn test_grid_pairs_are_horizontal_and_vertical() {
        let mut grid = Lead::new("G", LeadType::Grid, (2, 2), 5.0, 10.0, None, false);
        for n in 1..=4usize {
            let loc = grid.location_of_number(n).unwrap();
            grid.add_contact(&n.to_string(), Vector3::zeros(), loc, 0, false)
                .unwrap();
        }
        let names: Vec<String> = grid.bipolar_pairs().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["G1-G2", "G3-G4", "G1-G3", "G2-G4"]);
    }
}
