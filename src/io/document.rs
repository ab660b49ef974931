use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::ct::{CoordinateSystem, CT};
use crate::error::{LocError, LocResult};
use crate::lead::{BipolarPair, Contact, Lead, LeadType, MicroSpec};
use crate::pointcloud::Coordinate;

/// Position of a contact in every coordinate space it is known in. Only CT
/// voxel space is produced here; other tools add their own spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSpaces {
    pub ct_voxel: SpacePoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacePoint {
    pub raw: [f64; 3],
}

impl CoordinateSpaces {
    fn ct_voxel(center: &Coordinate) -> Self {
        CoordinateSpaces {
            ct_voxel: SpacePoint {
                raw: [center.x, center.y, center.z],
            },
        }
    }

    fn center(&self) -> Coordinate {
        let [x, y, z] = self.ct_voxel.raw;
        Coordinate::new(x, y, z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub lead_location: (i64, i64),
    #[serde(default)]
    pub lead_group: i32,
    pub coordinate_spaces: CoordinateSpaces,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub name: String,
    pub names: (String, String),
    pub lead_locations: ((i64, i64), (i64, i64)),
    pub coordinate_spaces: CoordinateSpaces,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    /// One-letter lead type code.
    #[serde(rename = "type")]
    pub lead_type: String,
    pub dimensions: (usize, usize),
    pub radius: f64,
    pub spacing: f64,
    #[serde(default)]
    pub micros: Option<MicroSpec>,
    pub contacts: Vec<ContactRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<PairRecord>,
}

/// Every lead of a session with its localized contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LeadsDocument {
    #[serde(default)]
    pub coordinate_system: Option<CoordinateSystem>,
    pub leads: BTreeMap<String, LeadRecord>,
}

impl LeadsDocument {
    pub fn from_json_str(contents: &str) -> LocResult<LeadsDocument> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn to_json_string(&self) -> LocResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl LeadRecord {
    fn from_lead(lead: &Lead, include_bipolar: bool) -> Self {
        let contacts = lead
            .sorted_contacts()
            .into_iter()
            .map(|c| ContactRecord {
                name: c.label.clone(),
                lead_location: c.lead_location,
                lead_group: c.lead_group,
                coordinate_spaces: CoordinateSpaces::ct_voxel(&c.center),
            })
            .collect();
        let pairs = if include_bipolar {
            lead.bipolar_pairs().iter().map(PairRecord::from).collect()
        } else {
            Vec::new()
        };

        LeadRecord {
            lead_type: lead.lead_type.code().to_string(),
            dimensions: lead.dimensions,
            radius: lead.radius,
            spacing: lead.spacing,
            micros: lead.micros.clone(),
            contacts,
            pairs,
        }
    }

    fn to_lead(&self, label: &str, zero_index: bool) -> LocResult<Lead> {
        let lead_type = LeadType::from_code(&self.lead_type).ok_or_else(|| {
            LocError::Document(format!(
                "lead {} has unknown type '{}'",
                label, self.lead_type
            ))
        })?;
        let mut lead = Lead::new(
            label,
            lead_type,
            self.dimensions,
            self.radius,
            self.spacing,
            self.micros.clone(),
            zero_index,
        );
        for record in &self.contacts {
            if lead.contacts.contains_key(&record.name) {
                return Err(LocError::Document(format!(
                    "lead {} lists contact {} twice",
                    label, record.name
                )));
            }
            lead.contacts.insert(
                record.name.clone(),
                Contact {
                    label: record.name.clone(),
                    center: record.coordinate_spaces.center(),
                    lead_location: record.lead_location,
                    lead_group: record.lead_group,
                },
            );
        }
        Ok(lead)
    }
}

impl From<&BipolarPair> for PairRecord {
    fn from(pair: &BipolarPair) -> Self {
        PairRecord {
            name: pair.name.clone(),
            names: (pair.first.clone(), pair.second.clone()),
            lead_locations: pair.lead_locations,
            coordinate_spaces: CoordinateSpaces::ct_voxel(&pair.center),
        }
    }
}

impl CT {
    /// Snapshot of every lead and contact.
    pub fn to_dict(&self) -> LeadsDocument {
        self.to_document(false)
    }

    pub(crate) fn to_document(&self, include_bipolar: bool) -> LeadsDocument {
        LeadsDocument {
            coordinate_system: Some(self.coordinate_system()),
            leads: self
                .get_leads()
                .iter()
                .map(|(label, lead)| (label.clone(), LeadRecord::from_lead(lead, include_bipolar)))
                .collect(),
        }
    }

    /// Replaces every lead with the ones in `document`. Contacts are restored
    /// as saved, without location checks. When the document was written in
    /// the other coordinate system, its centers are mirrored into the
    /// current one. Before a CT is loaded the engine adopts the document's
    /// system instead. Nothing changes if the document is invalid.
    pub fn from_dict(&mut self, document: &LeadsDocument) -> LocResult<usize> {
        let zero_index = self.config().zero_index_lead;
        let mut leads = document
            .leads
            .iter()
            .map(|(label, record)| record.to_lead(label, zero_index))
            .collect::<LocResult<Vec<Lead>>>()?;

        match document.coordinate_system {
            Some(system) if system != self.coordinate_system() && self.is_loaded() => {
                let flip = self.lateral_flip()?;
                for lead in &mut leads {
                    lead.transform_centers(&flip);
                }
            }
            Some(system) if !self.is_loaded() => self.assume_coordinate_system(system)?,
            _ => {}
        }

        let mut restored = 0;
        let labels: Vec<String> = self.get_leads().keys().cloned().collect();
        for label in labels {
            self.delete_lead(&label)?;
        }
        for lead in leads {
            restored += lead.contacts.len();
            self.insert_lead(lead);
        }
        log::info!(
            "restored {} contacts on {} leads",
            restored,
            self.get_leads().len()
        );
        Ok(restored)
    }

    /// Reads a JSON leads document and restores it with [`CT::from_dict`].
    pub fn from_json<P: AsRef<Path>>(&mut self, path: P) -> LocResult<usize> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| LocError::io(path, e))?;
        let document = LeadsDocument::from_json_str(&contents)?;
        self.from_dict(&document)
    }
}
