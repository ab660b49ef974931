pub mod bipolar;
pub mod interpolation;
pub mod micro;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{LocError, LocResult};
use crate::pointcloud::Coordinate;

pub use bipolar::BipolarPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadType {
    Depth,
    Grid,
    Strip,
}

impl LeadType {
    pub fn from_code(code: &str) -> Option<LeadType> {
        match code.trim() {
            "D" | "d" => Some(LeadType::Depth),
            "G" | "g" => Some(LeadType::Grid),
            "S" | "s" => Some(LeadType::Strip),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LeadType::Depth => "D",
            LeadType::Grid => "G",
            LeadType::Strip => "S",
        }
    }
}

impl fmt::Display for LeadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Micro-contacts that sit next to every primary contact of a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroSpec {
    pub name: String,
    /// Micro-contacts derived per primary contact.
    pub count: usize,
    /// Distance between consecutive micro-contacts, in voxels.
    pub offset: f64,
}

/// Whether the contact slots form a line or a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadLayout {
    Linear,
    Planar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedingState {
    NoContactsSeeded,
    PartiallySeeded,
    FullySeeded,
}

/// A localized contact. `label` is the part after the lead label, so contact
/// `3` of lead `LA` is displayed as `LA3`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub label: String,
    pub center: Coordinate,
    /// Slot on the lead in the configured index base.
    pub lead_location: (i64, i64),
    /// 0 for primary contacts, > 0 for derived micro-contacts.
    pub lead_group: i32,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        self.lead_group == 0
    }
}

#[derive(Debug, Clone)]
pub struct Lead {
    pub label: String,
    pub lead_type: LeadType,
    /// `(width, height)` in contact slots.
    pub dimensions: (usize, usize),
    pub radius: f64,
    pub spacing: f64,
    pub micros: Option<MicroSpec>,
    /// 0 when lead locations are zero-indexed, 1 otherwise.
    pub index_offset: i64,
    pub contacts: BTreeMap<String, Contact>,
}

impl Lead {
    pub fn new(
        label: impl Into<String>,
        lead_type: LeadType,
        dimensions: (usize, usize),
        radius: f64,
        spacing: f64,
        micros: Option<MicroSpec>,
        zero_index: bool,
    ) -> Self {
        Lead {
            label: label.into(),
            lead_type,
            dimensions: (dimensions.0.max(1), dimensions.1.max(1)),
            radius,
            spacing,
            micros,
            index_offset: if zero_index { 0 } else { 1 },
            contacts: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> LeadLayout {
        if self.dimensions.0 == 1 || self.dimensions.1 == 1 {
            LeadLayout::Linear
        } else {
            LeadLayout::Planar
        }
    }

    pub fn slot_count(&self) -> usize {
        self.dimensions.0 * self.dimensions.1
    }

    /// Row-major index of a 0-based `(col, row)` slot.
    pub(crate) fn slot_index(&self, slot: (usize, usize)) -> usize {
        slot.1 * self.dimensions.0 + slot.0
    }

    pub(crate) fn slot_at(&self, index: usize) -> (usize, usize) {
        (index % self.dimensions.0, index / self.dimensions.0)
    }

    /// Contact label for a 0-based slot: its 1-based row-major number.
    pub fn slot_label(&self, slot: (usize, usize)) -> String {
        (self.slot_index(slot) + 1).to_string()
    }

    pub fn location_of(&self, slot: (usize, usize)) -> (i64, i64) {
        (
            slot.0 as i64 + self.index_offset,
            slot.1 as i64 + self.index_offset,
        )
    }

    /// Inverse of [`Lead::location_of`]; `None` when out of bounds.
    pub fn slot_of(&self, location: (i64, i64)) -> Option<(usize, usize)> {
        let col = location.0 - self.index_offset;
        let row = location.1 - self.index_offset;
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.dimensions.0 || row >= self.dimensions.1 {
            return None;
        }
        Some((col, row))
    }

    /// Location of the `number`-th slot (1-based, row-major).
    pub fn location_of_number(&self, number: usize) -> Option<(i64, i64)> {
        if number == 0 || number > self.slot_count() {
            return None;
        }
        Some(self.location_of(self.slot_at(number - 1)))
    }

    pub fn contact_name(&self, contact: &Contact) -> String {
        format!("{}{}", self.label, contact.label)
    }

    pub fn get_contact(&self, label: &str) -> Option<&Contact> {
        self.contacts.get(label)
    }

    pub fn contact_at(&self, location: (i64, i64), group: i32) -> Option<&Contact> {
        self.contacts
            .values()
            .find(|c| c.lead_location == location && c.lead_group == group)
    }

    pub fn primary_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values().filter(|c| c.is_primary())
    }

    /// Primary contacts keyed by 0-based slot, skipping any out of bounds.
    pub(crate) fn seeded_slots(&self) -> BTreeMap<usize, Coordinate> {
        self.primary_contacts()
            .filter_map(|c| {
                self.slot_of(c.lead_location)
                    .map(|slot| (self.slot_index(slot), c.center))
            })
            .collect()
    }

    /// First slot whose location is free and whose label is not already used
    /// by a contact placed elsewhere.
    fn next_slot(&self) -> Option<(usize, usize)> {
        (0..self.slot_count()).map(|i| self.slot_at(i)).find(|slot| {
            self.contact_at(self.location_of(*slot), 0).is_none()
                && !self.contacts.contains_key(&self.slot_label(*slot))
        })
    }

    /// Label of the first empty slot in row-major order.
    pub fn next_contact_label(&self) -> Option<String> {
        self.next_slot().map(|slot| self.slot_label(slot))
    }

    /// Location of the first empty slot in row-major order.
    pub fn next_contact_loc(&self) -> Option<(i64, i64)> {
        self.next_slot().map(|slot| self.location_of(slot))
    }

    /// Records `center` as the next suggested contact.
    pub fn seed_next_contact(&mut self, center: Coordinate) -> LocResult<&Contact> {
        let slot = self
            .next_slot()
            .ok_or_else(|| LocError::LeadFull(self.label.clone()))?;
        let label = self.slot_label(slot);
        let contact = Contact {
            label: label.clone(),
            center,
            lead_location: self.location_of(slot),
            lead_group: 0,
        };
        log::debug!("seeding {}{} at {:?}", self.label, label, center);
        self.contacts.insert(label.clone(), contact);
        Ok(&self.contacts[&label])
    }

    /// Records a contact at `location`.
    ///
    /// Re-using an existing label re-assigns that contact. Unless `confirmed`
    /// is set, a location outside the lead or a location already held by a
    /// different contact in the same group is rejected.
    pub fn add_contact(
        &mut self,
        label: &str,
        center: Coordinate,
        location: (i64, i64),
        group: i32,
        confirmed: bool,
    ) -> LocResult<()> {
        if !confirmed {
            if self.slot_of(location).is_none() {
                return Err(LocError::OutOfBounds {
                    lead: self.label.clone(),
                    location,
                    dimensions: self.dimensions,
                });
            }
            if let Some(existing) = self.contact_at(location, group) {
                if existing.label != label {
                    return Err(LocError::DuplicateLocation {
                        lead: self.label.clone(),
                        existing: existing.label.clone(),
                        location,
                        group,
                    });
                }
            }
        }

        self.contacts.insert(
            label.to_string(),
            Contact {
                label: label.to_string(),
                center,
                lead_location: location,
                lead_group: group,
            },
        );
        Ok(())
    }

    pub fn remove_contact(&mut self, label: &str) -> LocResult<Contact> {
        self.contacts
            .remove(label)
            .ok_or_else(|| LocError::UnknownContact {
                lead: self.label.clone(),
                contact: label.to_string(),
            })
    }

    pub fn seeding_state(&self) -> SeedingState {
        let seeded = self.seeded_slots().len();
        if seeded == 0 {
            SeedingState::NoContactsSeeded
        } else if seeded < self.slot_count() {
            SeedingState::PartiallySeeded
        } else {
            SeedingState::FullySeeded
        }
    }

    /// Contacts ordered by their number, primaries before their micros.
    pub fn sorted_contacts(&self) -> Vec<&Contact> {
        let mut contacts: Vec<&Contact> = self.contacts.values().collect();
        contacts.sort_by(|a, b| {
            contact_number(&a.label)
                .cmp(&contact_number(&b.label))
                .then(a.lead_group.cmp(&b.lead_group))
                .then_with(|| a.label.cmp(&b.label))
        });
        contacts
    }

    /// Applies `f` to every contact center.
    pub fn transform_centers(&mut self, f: impl Fn(&Coordinate) -> Coordinate) {
        for contact in self.contacts.values_mut() {
            contact.center = f(&contact.center);
        }
    }
}

/// Leading integer of a contact label, `u64::MAX` when there is none.
pub fn contact_number(label: &str) -> u64 {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn depth(n: usize) -> Lead {
        Lead::new("LA", LeadType::Depth, (1, n), 4.0, 5.0, None, false)
    }

    #[test]
    fn test_next_contact_follows_row_major_order() {
        let mut grid = Lead::new("G", LeadType::Grid, (2, 2), 5.0, 10.0, None, false);
        assert_eq!(grid.next_contact_label().as_deref(), Some("1"));
        assert_eq!(grid.next_contact_loc(), Some((1, 1)));

        grid.seed_next_contact(Vector3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(grid.next_contact_label().as_deref(), Some("2"));
        assert_eq!(grid.next_contact_loc(), Some((2, 1)));

        grid.seed_next_contact(Vector3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(grid.next_contact_loc(), Some((1, 2)));
    }

    #[test]
    fn test_seeding_fills_gaps_first() {
        let mut lead = depth(4);
        lead.add_contact("1", Vector3::zeros(), (1, 1), 0, false).unwrap();
        lead.add_contact("3", Vector3::zeros(), (1, 3), 0, false).unwrap();
        assert_eq!(lead.next_contact_label().as_deref(), Some("2"));
        lead.seed_next_contact(Vector3::zeros()).unwrap();
        assert_eq!(lead.next_contact_label().as_deref(), Some("4"));
        lead.seed_next_contact(Vector3::zeros()).unwrap();
        assert_eq!(lead.next_contact_label(), None);
        assert_eq!(lead.seeding_state(), SeedingState::FullySeeded);
        assert!(matches!(
            lead.seed_next_contact(Vector3::zeros()),
            Err(LocError::LeadFull(_))
        ));
    }

    #[test]
    fn test_seeding_skips_labels_used_elsewhere() {
        let mut lead = depth(4);
        // contact "2" placed at the tip slot
        lead.add_contact("2", Vector3::new(1.0, 1.0, 1.0), (1, 1), 0, false)
            .unwrap();
        assert_eq!(lead.next_contact_label().as_deref(), Some("3"));
        assert_eq!(lead.next_contact_loc(), Some((1, 3)));

        let seeded = lead.seed_next_contact(Vector3::new(9.0, 9.0, 9.0)).unwrap();
        assert_eq!(seeded.label, "3");
        assert_eq!(lead.contacts["2"].lead_location, (1, 1));
        assert_eq!(lead.contacts["2"].center, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(lead.contact_at((1, 1), 0).map(|c| c.label.as_str()), Some("2"));
    }

    #[test]
    fn test_zero_indexed_locations() {
        let mut lead = Lead::new("LA", LeadType::Depth, (1, 3), 4.0, 5.0, None, true);
        assert_eq!(lead.next_contact_loc(), Some((0, 0)));
        assert!(lead.add_contact("3", Vector3::zeros(), (0, 3), 0, false).is_err());
        assert!(lead.add_contact("3", Vector3::zeros(), (0, 2), 0, false).is_ok());
    }

    #[test]
    fn test_duplicate_location_needs_confirmation() {
        let mut lead = depth(4);
        lead.add_contact("1", Vector3::zeros(), (1, 1), 0, false).unwrap();

        let res = lead.add_contact("5", Vector3::zeros(), (1, 1), 0, false);
        assert!(matches!(res, Err(LocError::DuplicateLocation { .. })));
        assert_eq!(lead.contacts.len(), 1);

        // same label is a re-assignment
        lead.add_contact("1", Vector3::new(1.0, 1.0, 1.0), (1, 1), 0, false)
            .unwrap();
        assert_eq!(lead.contacts["1"].center, Vector3::new(1.0, 1.0, 1.0));

        lead.add_contact("5", Vector3::zeros(), (1, 1), 0, true).unwrap();
        assert_eq!(lead.contacts.len(), 2);
    }

    #[test]
    fn test_out_of_bounds_location() {
        let mut lead = depth(4);
        let res = lead.add_contact("5", Vector3::zeros(), (1, 5), 0, false);
        assert!(matches!(res, Err(LocError::OutOfBounds { .. })));
        assert!(lead.contacts.is_empty());
        // confirmed contacts outside the lead are kept but never interpolated from
        lead.add_contact("5", Vector3::zeros(), (1, 5), 0, true).unwrap();
        assert_eq!(lead.seeded_slots().len(), 0);
    }

    #[test]
    fn test_remove_contact() {
        let mut lead = depth(2);
        lead.seed_next_contact(Vector3::zeros()).unwrap();
        assert!(lead.remove_contact("1").is_ok());
        assert!(matches!(
            lead.remove_contact("1"),
            Err(LocError::UnknownContact { .. })
        ));
    }

    #[test]
    fn test_sorted_contacts_numeric_order() {
        let mut lead = depth(12);
        for n in [10, 2, 1] {
            let loc = lead.location_of_number(n).unwrap();
            lead.add_contact(&n.to_string(), Vector3::zeros(), loc, 0, false)
                .unwrap();
        }
        let labels: Vec<&str> = lead
            .sorted_contacts()
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(labels, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_layout() {
        assert_eq!(depth(8).layout(), LeadLayout::Linear);
        let strip = Lead::new("S", LeadType::Strip, (6, 1), 5.0, 10.0, None, false);
        assert_eq!(strip.layout(), LeadLayout::Linear);
        let grid = Lead::new("G", LeadType::Grid, (8, 8), 5.0, 10.0, None, false);
        assert_eq!(grid.layout(), LeadLayout::Planar);
    }
}
