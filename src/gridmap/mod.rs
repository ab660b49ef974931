//! Channel-mapping files that tie hardware channels to electrode contacts.
//!
//! ```text
//! GridId,Template,Location,Hemisphere,Label,ChannelID,GridElectrode
//! 0,SpencerDepth1x10,Amygdala,Left,LA,1:10,1:10
//! 1,SpencerDepth1x10,HippocampusHead,Left,LHH,11:20,1:10
//! ```
//!
//! When the sixth header column is `ChannelID` the ranges in that column are
//! hardware channel numbers; otherwise the column only holds indices and no
//! channel IDs are recorded.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{LocError, LocResult};
use crate::lead::LeadType;

const MIN_FIELDS: usize = 7;
const DUMMY_LOCATION: &str = "NoWhere";
const CHANNEL_ID_HEADER: &str = "ChannelID";

/// Side of implantation. Values other than left/right are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    Left,
    Right,
    Other(String),
}

impl Hemisphere {
    fn parse(s: &str) -> Hemisphere {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Hemisphere::Left,
            "right" | "r" => Hemisphere::Right,
            _ => Hemisphere::Other(s.to_string()),
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hemisphere::Left => write!(f, "Left"),
            Hemisphere::Right => write!(f, "Right"),
            Hemisphere::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridContact {
    /// Acquisition-system channel number, when the file carries them.
    pub channel_id: Option<u32>,
    /// Position within the electrode, 0-based.
    pub local_channel_idx: usize,
    /// Running count over the whole file, 1-based. Unique but carries no
    /// anatomical meaning.
    pub global_channel_idx: usize,
    pub contact_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Electrode {
    pub grid_id: i64,
    pub template: String,
    pub location: String,
    pub hemisphere: Hemisphere,
    pub label: String,
    pub channel_ids: Option<Vec<u32>>,
    pub contacts: Vec<GridContact>,
}

impl Electrode {
    pub fn number_of_channels(&self) -> usize {
        self.contacts.len()
    }

    /// Lead type implied by the template name, e.g. `SpencerDepth1x10`.
    pub fn lead_type(&self) -> LeadType {
        let t = self.template.to_ascii_lowercase();
        if t.contains("grid") {
            LeadType::Grid
        } else if t.contains("strip") {
            LeadType::Strip
        } else {
            LeadType::Depth
        }
    }

    /// `(width, height)` from a trailing `AxB` in the template, falling back
    /// to a single column holding every contact.
    pub fn dimensions(&self) -> (usize, usize) {
        parse_template_dims(&self.template)
            .filter(|(w, h)| w * h >= self.contacts.len())
            .unwrap_or((1, self.contacts.len().max(1)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridMap {
    pub channel_ids_present: bool,
    pub contact_total: usize,
    pub electrodes: Vec<Electrode>,
}

impl GridMap {
    pub fn parse<P: AsRef<Path>>(path: P) -> LocResult<GridMap> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LocError::io(path, e))?;
        Self::parse_reader(file, path)
    }

    /// Parses grid-map text; `origin` only labels errors.
    pub fn parse_reader<R: Read>(reader: R, origin: &Path) -> LocResult<GridMap> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut map = GridMap::default();
        let mut records = rdr.records();

        let header = match records.next() {
            Some(Ok(h)) => h,
            Some(Err(e)) => return Err(csv_error(origin, 1, e)),
            None => {
                return Err(LocError::GridMap {
                    path: origin.to_path_buf(),
                    line: 1,
                    reason: "file is empty".to_string(),
                })
            }
        };
        map.channel_ids_present = header.get(5) == Some(CHANNEL_ID_HEADER);

        for result in records {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line() as usize);
                    return Err(csv_error(origin, line, e));
                }
            };
            let line = record.position().map_or(0, |p| p.line() as usize);

            if record.len() < MIN_FIELDS {
                if record.iter().any(|f| !f.is_empty()) {
                    log::debug!("GridMap::parse: skipping incomplete line {}", line);
                }
                continue;
            }
            if &record[2] == DUMMY_LOCATION {
                log::debug!("GridMap::parse: skipping dummy electrode {}", &record[4]);
                continue;
            }

            let electrode = map.parse_electrode(&record, origin, line)?;
            log::debug!(
                "GridMap::parse: parsed {} contacts for electrode {}",
                electrode.contacts.len(),
                electrode.label
            );
            map.electrodes.push(electrode);
        }

        log::debug!(
            "GridMap::parse: parsed {} electrodes with {} contacts",
            map.electrodes.len(),
            map.contact_total
        );
        Ok(map)
    }

    fn parse_electrode(
        &mut self,
        record: &StringRecord,
        origin: &Path,
        line: usize,
    ) -> LocResult<Electrode> {
        let bad = |reason: String| LocError::GridMap {
            path: origin.to_path_buf(),
            line,
            reason,
        };

        let grid_id: i64 = record[0]
            .parse()
            .map_err(|_| bad(format!("GridId '{}' is not an integer", &record[0])))?;
        let hemisphere = Hemisphere::parse(&record[3]);
        if let Hemisphere::Other(side) = &hemisphere {
            log::debug!("GridMap::parse: electrode {} has hemisphere '{}'", &record[4], side);
        }
        let label = record[4].to_string();
        let template = record[1].to_string();

        let channel_ids = if self.channel_ids_present {
            Some(parse_range(&record[5]).map_err(bad)?)
        } else {
            None
        };
        let contact_range = parse_range(&record[6]).map_err(bad)?;

        if let Some(ids) = &channel_ids {
            if ids.len() != contact_range.len() {
                return Err(LocError::ChannelMismatch {
                    path: origin.to_path_buf(),
                    line,
                    label,
                    channels: ids.len(),
                    contacts: contact_range.len(),
                });
            }
        }

        let mut contacts = Vec::with_capacity(contact_range.len());
        for local_idx in 0..contact_range.len() {
            self.contact_total += 1;
            contacts.push(GridContact {
                channel_id: channel_ids.as_ref().map(|ids| ids[local_idx]),
                local_channel_idx: local_idx,
                global_channel_idx: self.contact_total,
                contact_type: template.clone(),
            });
        }

        Ok(Electrode {
            grid_id,
            template,
            location: record[2].to_string(),
            hemisphere,
            label,
            channel_ids,
            contacts,
        })
    }

    pub fn electrode(&self, label: &str) -> Option<&Electrode> {
        self.electrodes.iter().find(|e| e.label == label)
    }
}

/// Expands an inclusive `start:end` range.
fn parse_range(field: &str) -> Result<Vec<u32>, String> {
    let (start, end) = field
        .split_once(':')
        .ok_or_else(|| format!("range '{}' is not of the form start:end", field))?;
    let start: u32 = start
        .trim()
        .parse()
        .map_err(|_| format!("range start '{}' is not an integer", start))?;
    let end: u32 = end
        .trim()
        .parse()
        .map_err(|_| format!("range end '{}' is not an integer", end))?;
    if end < start {
        return Err(format!("range {}:{} runs backwards", start, end));
    }
    Ok((start..=end).collect())
}

fn parse_template_dims(template: &str) -> Option<(usize, usize)> {
    let digits_start = template
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == 'x' || *c == 'X')
        .last()
        .map(|(i, _)| i)?;
    let suffix = &template[digits_start..];
    let (w, h) = suffix.split_once(|c| c == 'x' || c == 'X')?;
    let w: usize = w.parse().ok()?;
    let h: usize = h.parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

fn csv_error(origin: &Path, line: usize, e: csv::Error) -> LocError {
    LocError::GridMap {
        path: PathBuf::from(origin),
        line,
        reason: e.to_string(),
    }
}
