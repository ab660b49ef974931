use pyo3::prelude::*;

use crate::ct::ContactListing;
use crate::gridmap::{Electrode, GridContact};
use crate::lead::Contact;

/// Python representation of a localized contact
///
/// Attributes:
///     lead (str): Label of the lead the contact belongs to
///     label (str): Contact label within the lead, e.g. "3" or "3u1"
///     display (str): Label rendered with the configured display template
///     center (float, float, float): Voxel coordinates of the contact
///     lead_location (int, int): Slot on the lead
///     lead_group (int): 0 for primary contacts, > 0 for micro-contacts
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyContact {
    #[pyo3(get)]
    pub lead: String,
    #[pyo3(get)]
    pub label: String,
    #[pyo3(get)]
    pub display: String,
    #[pyo3(get)]
    pub center: (f64, f64, f64),
    #[pyo3(get)]
    pub lead_location: (i64, i64),
    #[pyo3(get)]
    pub lead_group: i32,
}

#[pymethods]
impl PyContact {
    fn __repr__(&self) -> String {
        format!(
            "Contact({}, center=({:.2}, {:.2}, {:.2}), location={:?}, group={})",
            self.display,
            self.center.0,
            self.center.1,
            self.center.2,
            self.lead_location,
            self.lead_group
        )
    }
}

impl From<&ContactListing> for PyContact {
    fn from(listing: &ContactListing) -> Self {
        PyContact {
            lead: listing.lead.clone(),
            label: listing.contact.clone(),
            display: listing.display.clone(),
            center: (listing.center.x, listing.center.y, listing.center.z),
            lead_location: listing.lead_location,
            lead_group: listing.lead_group,
        }
    }
}

impl PyContact {
    pub fn from_contact(lead: &str, display: String, contact: &Contact) -> Self {
        PyContact {
            lead: lead.to_string(),
            label: contact.label.clone(),
            display,
            center: (contact.center.x, contact.center.y, contact.center.z),
            lead_location: contact.lead_location,
            lead_group: contact.lead_group,
        }
    }
}

/// Python representation of one contact of a grid-map electrode
///
/// Attributes:
///     channel_id (int | None): Hardware channel, when the map lists them
///     local_channel_idx (int): 0-based position within the electrode
///     global_channel_idx (int): 1-based running index across the file
///     contact_type (str): Template of the electrode
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyGridContact {
    #[pyo3(get)]
    pub channel_id: Option<u32>,
    #[pyo3(get)]
    pub local_channel_idx: usize,
    #[pyo3(get)]
    pub global_channel_idx: usize,
    #[pyo3(get)]
    pub contact_type: String,
}

impl From<&GridContact> for PyGridContact {
    fn from(c: &GridContact) -> Self {
        PyGridContact {
            channel_id: c.channel_id,
            local_channel_idx: c.local_channel_idx,
            global_channel_idx: c.global_channel_idx,
            contact_type: c.contact_type.clone(),
        }
    }
}

/// Python representation of a grid-map electrode
///
/// Example:
///     >>> electrodes = voxloc.parse_gridmap("data/gridmap.csv")
///     >>> electrodes[1].contacts[0].global_channel_idx
///     11
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyElectrode {
    #[pyo3(get)]
    pub grid_id: i64,
    #[pyo3(get)]
    pub template: String,
    #[pyo3(get)]
    pub location: String,
    #[pyo3(get)]
    pub hemisphere: String,
    #[pyo3(get)]
    pub label: String,
    #[pyo3(get)]
    pub channel_ids: Option<Vec<u32>>,
    #[pyo3(get)]
    pub contacts: Vec<PyGridContact>,
}

#[pymethods]
impl PyElectrode {
    fn __repr__(&self) -> String {
        format!(
            "Electrode({}, template={}, location={}, hemisphere={}, contacts={})",
            self.label,
            self.template,
            self.location,
            self.hemisphere,
            self.contacts.len()
        )
    }

    fn __len__(&self) -> usize {
        self.contacts.len()
    }
}

impl From<&Electrode> for PyElectrode {
    fn from(e: &Electrode) -> Self {
        PyElectrode {
            grid_id: e.grid_id,
            template: e.template.clone(),
            location: e.location.clone(),
            hemisphere: e.hemisphere.to_string(),
            label: e.label.clone(),
            channel_ids: e.channel_ids.clone(),
            contacts: e.contacts.iter().map(PyGridContact::from).collect(),
        }
    }
}
