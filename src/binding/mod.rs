pub mod classes;

use nalgebra::Vector3;
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::Config;
use crate::ct::{LeadDefinition, CT};
use crate::error::LocError;
use crate::gridmap::GridMap;
use crate::io::{self, LeadsDocument};
use classes::{PyContact, PyElectrode};

fn to_py_err(e: LocError) -> PyErr {
    match e {
        LocError::UnknownLead(_) | LocError::UnknownContact { .. } => {
            PyKeyError::new_err(e.to_string())
        }
        LocError::DuplicateLocation { .. }
        | LocError::OutOfBounds { .. }
        | LocError::EmptySelection
        | LocError::InsufficientContacts { .. }
        | LocError::DegenerateGeometry { .. }
        | LocError::MicroUnavailable { .. }
        | LocError::UnsupportedFormat(_)
        | LocError::Config(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn to_coordinate(p: (f64, f64, f64)) -> Vector3<f64> {
    Vector3::new(p.0, p.1, p.2)
}

fn tuple(v: &Vector3<f64>) -> (f64, f64, f64) {
    (v.x, v.y, v.z)
}

/// Parses a grid-map CSV into its electrodes.
///
/// Rows with fewer than seven fields and dummy electrodes located at
/// ``NoWhere`` are skipped.
///
/// Example:
///
/// .. code-block:: python
///
///    import voxloc
///    electrodes = voxloc.parse_gridmap("data/gridmap.csv")
#[pyfunction]
pub fn parse_gridmap(path: &str) -> PyResult<Vec<PyElectrode>> {
    let gridmap = GridMap::parse(path).map_err(to_py_err)?;
    Ok(gridmap.electrodes.iter().map(PyElectrode::from).collect())
}

/// Interactive contact localization on one CT.
///
/// Example:
///
/// .. code-block:: python
///
///    import voxloc
///    ct = voxloc.PyCT("config.toml")
///    ct.load("ct.npy")
///    ct.set_leads(["LA"], ["D"], [(1, 10)])
///    ct.select_coordinate((48.0, 48.0, 48.0), lead="LA")
///    ct.seed_selection("LA")
#[pyclass(name = "PyCT")]
pub struct PyCT {
    inner: CT,
}

#[pymethods]
impl PyCT {
    /// Creates an engine from a TOML configuration, or the defaults.
    #[new]
    #[pyo3(signature = (config_path = None))]
    fn new(config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => {
                Config::from_toml_file(path).map_err(|e| PyValueError::new_err(format!("{:#}", e)))?
            }
            None => Config::default(),
        };
        Ok(PyCT {
            inner: CT::new(config),
        })
    }

    /// Loads an ``.npy`` volume. ``threshold`` defaults to the configured
    /// percentile. Returns the number of voxels kept.
    #[pyo3(signature = (filename, threshold = None))]
    fn load(&mut self, filename: &str, threshold: Option<f64>) -> PyResult<usize> {
        let threshold = threshold.unwrap_or(self.inner.config().ct_threshold);
        self.inner.load(filename, threshold).map_err(to_py_err)
    }

    fn set_threshold(&mut self, threshold: f64) -> PyResult<usize> {
        self.inner.set_threshold(threshold).map_err(to_py_err)
    }

    #[getter]
    fn threshold(&self) -> f64 {
        self.inner.threshold()
    }

    #[getter]
    fn filename(&self) -> Option<String> {
        self.inner.filename().map(|p| p.display().to_string())
    }

    fn remove_isolated_points(&mut self) -> PyResult<usize> {
        self.inner.remove_isolated_points().map_err(to_py_err)
    }

    fn select_points_near(&mut self, point: (f64, f64, f64), radius: f64) -> PyResult<usize> {
        self.inner
            .select_points_near(&to_coordinate(point), radius)
            .map_err(to_py_err)
    }

    /// Centroid of the selection; NaN when nothing is selected.
    fn selection_center(&self) -> (f64, f64, f64) {
        tuple(&self.inner.selection_center())
    }

    fn center_selection(&mut self, iterations: usize, radius: f64) -> PyResult<(f64, f64, f64)> {
        self.inner
            .center_selection(iterations, radius)
            .map(|c| tuple(&c))
            .map_err(to_py_err)
    }

    /// Selects around a click. The radius is taken from ``lead`` when given,
    /// else from ``radius``, else from the configuration.
    #[pyo3(signature = (point, radius = None, lead = None, center = true))]
    fn select_coordinate(
        &mut self,
        point: (f64, f64, f64),
        radius: Option<f64>,
        lead: Option<&str>,
        center: bool,
    ) -> PyResult<(f64, f64, f64)> {
        let radius = match (lead, radius) {
            (Some(_), _) | (None, None) => self.inner.selection_radius(lead).map_err(to_py_err)?,
            (None, Some(r)) => r,
        };
        self.inner
            .select_coordinate(&to_coordinate(point), radius, center)
            .map(|c| tuple(&c))
            .map_err(to_py_err)
    }

    fn clear_selection(&mut self) {
        self.inner.clear_selection();
    }

    fn confirm_selected_electrode(&mut self, name: &str) -> PyResult<usize> {
        self.inner
            .confirm_selected_electrode(name)
            .map_err(to_py_err)
    }

    /// Replaces the leads. Contacts of leads that keep their label survive.
    #[pyo3(signature = (labels, types, dimensions, micros = None))]
    fn set_leads(
        &mut self,
        labels: Vec<String>,
        types: Vec<String>,
        dimensions: Vec<(usize, usize)>,
        micros: Option<Vec<String>>,
    ) -> PyResult<()> {
        if labels.len() != types.len() || labels.len() != dimensions.len() {
            return Err(PyValueError::new_err(
                "labels, types and dimensions must have the same length",
            ));
        }
        let micros = micros.unwrap_or_default();
        let definitions: Vec<LeadDefinition> = labels
            .iter()
            .zip(types.iter())
            .zip(dimensions.iter())
            .enumerate()
            .map(|(i, ((label, code), dims))| {
                let definition = LeadDefinition::new(label, code, *dims);
                match micros.get(i) {
                    Some(m) => definition.with_micro(m),
                    None => definition,
                }
            })
            .collect();
        self.inner.set_leads(&definitions).map_err(to_py_err)
    }

    fn delete_lead(&mut self, label: &str) -> PyResult<()> {
        self.inner.delete_lead(label).map(|_| ()).map_err(to_py_err)
    }

    fn lead_labels(&self) -> Vec<String> {
        self.inner.get_leads().keys().cloned().collect()
    }

    /// Label and location of the next empty slot of ``lead``.
    fn next_contact(&self, lead: &str) -> PyResult<Option<(String, (i64, i64))>> {
        let lead = self.inner.get_lead(lead).map_err(to_py_err)?;
        Ok(lead.next_contact_label().zip(lead.next_contact_loc()))
    }

    fn contact_exists(&self, lead: &str, contact: &str) -> PyResult<bool> {
        self.inner.contact_exists(lead, contact).map_err(to_py_err)
    }

    #[pyo3(signature = (lead, location, group = 0))]
    fn lead_location_exists(&self, lead: &str, location: (i64, i64), group: i32) -> PyResult<bool> {
        self.inner
            .lead_location_exists(lead, location, group)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (lead, contact, location, group = 0, confirmed = false))]
    fn add_selection_to_lead(
        &mut self,
        lead: &str,
        contact: &str,
        location: (i64, i64),
        group: i32,
        confirmed: bool,
    ) -> PyResult<(f64, f64, f64)> {
        self.inner
            .add_selection_to_lead(lead, contact, location, group, confirmed)
            .map(|c| tuple(&c))
            .map_err(to_py_err)
    }

    fn seed_selection(&mut self, lead: &str) -> PyResult<PyContact> {
        let contact = self.inner.seed_selection(lead).map_err(to_py_err)?;
        let display = self.inner.config().display_contact(
            lead,
            &contact.label,
            contact.lead_location,
            contact.lead_group,
        );
        Ok(PyContact::from_contact(lead, display, &contact))
    }

    fn remove_contact(&mut self, lead: &str, contact: &str) -> PyResult<()> {
        self.inner
            .remove_contact(lead, contact)
            .map(|_| ())
            .map_err(to_py_err)
    }

    fn interpolate(&mut self, lead: &str) -> PyResult<usize> {
        self.inner.interpolate(lead).map_err(to_py_err)
    }

    fn add_micro_contacts(&mut self) -> PyResult<usize> {
        self.inner.add_micro_contacts().map_err(to_py_err)
    }

    /// Toggles RAS/LAS and returns the new convention.
    fn switch_coordinate_system(&mut self) -> PyResult<String> {
        self.inner
            .switch_coordinate_system()
            .map(|s| s.to_string())
            .map_err(to_py_err)
    }

    /// Per-axis coordinates of the cloud ``label`` (``_ct``, ``_selected``,
    /// ``_leads`` or an electrode cloud).
    fn xyz(&self, label: &str) -> Option<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        self.inner.xyz(label)
    }

    fn contacts(&self) -> Vec<PyContact> {
        self.inner
            .contact_listing()
            .iter()
            .map(PyContact::from)
            .collect()
    }

    fn load_gridmap(&mut self, path: &str) -> PyResult<Vec<PyElectrode>> {
        let gridmap = self.inner.load_gridmap(path).map_err(to_py_err)?;
        Ok(gridmap.electrodes.iter().map(PyElectrode::from).collect())
    }

    /// Leads document as a JSON string.
    fn to_dict(&self) -> PyResult<String> {
        self.inner.to_dict().to_json_string().map_err(to_py_err)
    }

    fn from_dict(&mut self, json: &str) -> PyResult<usize> {
        let document = LeadsDocument::from_json_str(json).map_err(to_py_err)?;
        self.inner.from_dict(&document).map_err(to_py_err)
    }

    fn from_json(&mut self, path: &str) -> PyResult<usize> {
        self.inner.from_json(path).map_err(to_py_err)
    }

    fn import_vox_mom(&mut self, path: &str) -> PyResult<usize> {
        self.inner.import_vox_mom(path).map_err(to_py_err)
    }

    #[pyo3(signature = (path, format, include_bipolar = false))]
    fn saveas(&self, path: &str, format: &str, include_bipolar: bool) -> PyResult<()> {
        self.inner
            .saveas(path, format, include_bipolar)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (path = io::AUTOSAVE_FILE))]
    fn save_session(&self, path: &str) -> PyResult<()> {
        io::save_session(&self.inner, path)
            .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))
    }

    #[pyo3(signature = (path = io::AUTOSAVE_FILE))]
    fn recover_session(&mut self, path: &str) -> PyResult<bool> {
        io::recover_session(&mut self.inner, path)
            .map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))
    }
}
