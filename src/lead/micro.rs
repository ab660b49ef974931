use super::{Contact, Lead, LeadLayout};
use crate::error::{LocError, LocResult};
use crate::pointcloud::Coordinate;

impl Lead {
    /// Derives the micro-contacts of every primary contact without touching
    /// the lead.
    ///
    /// Micro `j` of a primary sits `j * offset` past it along the lead axis,
    /// towards contact 1. It shares the primary's location, uses group `j` and
    /// is labeled `<primary>u<j>`.
    pub fn micro_contacts(&self) -> LocResult<Vec<Contact>> {
        let unavailable = |reason: &str| LocError::MicroUnavailable {
            lead: self.label.clone(),
            reason: reason.to_string(),
        };

        let spec = self
            .micros
            .as_ref()
            .ok_or_else(|| unavailable("lead has no micro-contact specification"))?;
        if self.layout() != LeadLayout::Linear {
            return Err(unavailable("micro-contacts need a depth or strip lead"));
        }

        let seeded = self.seeded_slots();
        let (first, last) = match (seeded.iter().next(), seeded.iter().next_back()) {
            (Some(first), Some(last)) if first.0 != last.0 => (first, last),
            _ => {
                return Err(unavailable(
                    "need two localized primary contacts to fix the lead axis",
                ))
            }
        };
        let axis: Coordinate = last.1 - first.1;
        let norm = axis.norm();
        if norm < 1e-9 {
            return Err(unavailable("primary contacts share one center"));
        }
        let towards_tip = -axis / norm;

        let mut micros = Vec::new();
        for primary in self.primary_contacts() {
            for j in 1..=spec.count {
                micros.push(Contact {
                    label: format!("{}u{}", primary.label, j),
                    center: primary.center + towards_tip * spec.offset * j as f64,
                    lead_location: primary.lead_location,
                    lead_group: j as i32,
                });
            }
        }
        Ok(micros)
    }

    /// Replaces this lead's micro-contacts with freshly derived ones.
    pub fn add_micro_contacts(&mut self) -> LocResult<usize> {
        let micros = self.micro_contacts()?;
        Ok(self.apply_micro_contacts(micros))
    }

    pub(crate) fn apply_micro_contacts(&mut self, micros: Vec<Contact>) -> usize {
        self.contacts.retain(|_, c| c.is_primary());
        let added = micros.len();
        for micro in micros {
            self.contacts.insert(micro.label.clone(), micro);
        }
        log::info!("lead {}: added {} micro-contacts", self.label, added);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::{LeadType, MicroSpec};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn bf() -> MicroSpec {
        MicroSpec {
            name: "BF".to_string(),
            count: 3,
            offset: 1.5,
        }
    }

    fn lead_with(micros: Option<MicroSpec>) -> Lead {
        let mut lead = Lead::new("LA", LeadType::Depth, (1, 4), 4.0, 5.0, micros, false);
        for n in 1..=4usize {
            let loc = lead.location_of_number(n).unwrap();
            lead.add_contact(
                &n.to_string(),
                Vector3::new(0.0, 0.0, 5.0 * n as f64),
                loc,
                0,
                false,
            )
            .unwrap();
        }
        lead
    }

    #[test]
    fn test_micro_contacts_follow_axis() {
        let mut lead = lead_with(Some(bf()));
        let added = lead.add_micro_contacts().unwrap();
        assert_eq!(added, 12);

        let m = &lead.contacts["1u2"];
        assert_relative_eq!(m.center, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-12);
        assert_eq!(m.lead_group, 2);
        assert_eq!(m.lead_location, (1, 1));
    }

    #[test]
    fn test_micro_contacts_are_replaced_not_duplicated() {
        let mut lead = lead_with(Some(bf()));
        lead.add_micro_contacts().unwrap();
        lead.add_micro_contacts().unwrap();
        assert_eq!(lead.contacts.len(), 4 + 12);
    }

    #[test]
    fn test_no_spec_is_reported() {
        let mut lead = lead_with(None);
        assert!(matches!(
            lead.add_micro_contacts(),
            Err(LocError::MicroUnavailable { .. })
        ));
        assert_eq!(lead.contacts.len(), 4);
    }
}
