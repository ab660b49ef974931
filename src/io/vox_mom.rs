use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::ct::{LeadDefinition, CT};
use crate::error::{LocError, LocResult};
use crate::lead::{contact_number, Lead};
use crate::pointcloud::Coordinate;

/// One line of a flat coordinate file: `name x y z type width height`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxMomRecord {
    pub lead: String,
    pub contact: String,
    pub center: Coordinate,
    pub type_code: String,
    pub dimensions: (usize, usize),
}

fn record_line(name: &str, c: &Coordinate, code: &str, (w, h): (usize, usize)) -> String {
    format!("{}\t{}\t{}\t{}\t{}\t{}\t{}\n", name, c.x, c.y, c.z, code, w, h)
}

/// Tab-separated lines for every contact, followed by the bipolar pairs of
/// each lead when `include_bipolar` is set.
pub fn encode<'a>(leads: impl IntoIterator<Item = &'a Lead>, include_bipolar: bool) -> String {
    let mut out = String::new();
    for lead in leads {
        let code = lead.lead_type.code();
        for contact in lead.sorted_contacts() {
            let name = lead.contact_name(contact);
            out.push_str(&record_line(&name, &contact.center, code, lead.dimensions));
        }
        if include_bipolar {
            for pair in lead.bipolar_pairs() {
                out.push_str(&record_line(&pair.name, &pair.center, code, lead.dimensions));
            }
        }
    }
    out
}

/// Parses a flat coordinate file. Columns may be split by tabs or spaces.
/// Blank lines, `#` comments and bipolar pairs (names containing `-`) are
/// skipped; anything else that does not parse is an error.
pub fn decode<R: Read>(reader: R, origin: &Path) -> LocResult<Vec<VoxMomRecord>> {
    let mut records = Vec::new();
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| LocError::io(origin, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let format_err = |reason: String| LocError::Format {
            path: origin.to_path_buf(),
            line: line_no,
            reason,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 {
            return Err(format_err(format!("expected 7 columns, found {}", fields.len())));
        }
        if fields[0].contains('-') {
            log::debug!("{:?} line {}: skipping bipolar pair {}", origin, line_no, fields[0]);
            continue;
        }

        let (lead, contact) = split_contact_name(fields[0])
            .ok_or_else(|| format_err(format!("'{}' has no contact number", fields[0])))?;
        let mut xyz = [0.0; 3];
        for (axis, field) in fields[1..4].iter().enumerate() {
            xyz[axis] = field
                .parse()
                .map_err(|_| format_err(format!("'{}' is not a coordinate", field)))?;
        }
        let mut dims = [0usize; 2];
        for (axis, field) in fields[5..7].iter().enumerate() {
            dims[axis] = field
                .parse()
                .map_err(|_| format_err(format!("'{}' is not a lead dimension", field)))?;
        }

        records.push(VoxMomRecord {
            lead: lead.to_string(),
            contact: contact.to_string(),
            center: Coordinate::new(xyz[0], xyz[1], xyz[2]),
            type_code: fields[4].to_string(),
            dimensions: (dims[0], dims[1]),
        });
    }
    Ok(records)
}

/// Splits `LA10` into `("LA", "10")` and `LA1u2` into `("LA", "1u2")`.
fn split_contact_name(name: &str) -> Option<(&str, &str)> {
    let trimmed = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == name.len() {
        return None;
    }

    let mut split = trimmed.len();
    if let Some(before_u) = trimmed.strip_suffix('u') {
        let lead = before_u.trim_end_matches(|c: char| c.is_ascii_digit());
        if lead.len() < before_u.len() && !lead.is_empty() {
            split = lead.len();
        }
    }
    if split == 0 {
        return None;
    }
    Some((&name[..split], &name[split..]))
}

/// Group of a decoded contact label: `j` for micro `<n>u<j>`, 0 otherwise.
fn micro_group(contact: &str) -> i32 {
    contact
        .split_once('u')
        .and_then(|(_, j)| j.parse().ok())
        .unwrap_or(0)
}

impl CT {
    /// Imports a flat coordinate file. Leads named in the file are redefined
    /// from the catalog and filled with its contacts; other leads are kept.
    /// Returns the number of contacts imported.
    pub fn import_vox_mom<P: AsRef<Path>>(&mut self, path: P) -> LocResult<usize> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| LocError::io(path, e))?;
        let records = decode(file, path)?;

        let mut leads: BTreeMap<String, Lead> = BTreeMap::new();
        for record in &records {
            let lead = match leads.entry(record.lead.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let definition =
                        LeadDefinition::new(&record.lead, &record.type_code, record.dimensions);
                    entry.insert(self.build_lead(&definition)?)
                }
            };

            let number = contact_number(&record.contact) as usize;
            let location = lead.location_of_number(number).ok_or_else(|| LocError::OutOfBounds {
                lead: record.lead.clone(),
                location: (lead.index_offset, number as i64),
                dimensions: lead.dimensions,
            })?;
            lead.add_contact(
                &record.contact,
                record.center,
                location,
                micro_group(&record.contact),
                false,
            )?;
        }

        for lead in leads.into_values() {
            self.insert_lead(lead);
        }
        log::info!("imported {} contacts from {:?}", records.len(), path);
        Ok(records.len())
    }
}
