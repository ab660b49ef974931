pub mod volume;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{LocError, LocResult};
use crate::gridmap::GridMap;
use crate::lead::{BipolarPair, Contact, Lead, LeadType};
use crate::pointcloud::{CloudKind, Coordinate, PointCloud};

pub use volume::{NpyVolumeLoader, Volume, VolumeLoader};

pub const CT_CLOUD: &str = "_ct";
pub const SELECTED_CLOUD: &str = "_selected";
pub const LEADS_CLOUD: &str = "_leads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoordinateSystem {
    Ras,
    Las,
}

impl CoordinateSystem {
    fn toggled(self) -> Self {
        match self {
            CoordinateSystem::Ras => CoordinateSystem::Las,
            CoordinateSystem::Las => CoordinateSystem::Ras,
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Ras => write!(f, "RAS"),
            CoordinateSystem::Las => write!(f, "LAS"),
        }
    }
}

/// What the host asks for when defining a lead; physical properties come
/// from the configured lead-type catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadDefinition {
    pub label: String,
    pub type_code: String,
    pub dimensions: (usize, usize),
    /// Name of a configured micro spec, `None` for plain leads.
    pub micro: Option<String>,
}

impl LeadDefinition {
    pub fn new(label: &str, type_code: &str, dimensions: (usize, usize)) -> Self {
        LeadDefinition {
            label: label.to_string(),
            type_code: type_code.to_string(),
            dimensions,
            micro: None,
        }
    }

    pub fn with_micro(mut self, micro: &str) -> Self {
        self.micro = Some(micro.to_string());
        self
    }
}

/// One row of the contact listing shown next to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactListing {
    pub lead: String,
    pub contact: String,
    /// `lead_display` rendered for this contact.
    pub display: String,
    pub center: Coordinate,
    pub lead_location: (i64, i64),
    pub lead_group: i32,
}

/// The selection engine: one CT, its thresholded point cloud, the current
/// interactive selection and every lead being localized.
///
/// Single-writer and not thread-safe. Hosts that call in from several threads
/// must wrap it in their own lock.
#[derive(Debug)]
pub struct CT {
    config: Config,
    filename: Option<PathBuf>,
    volume: Option<Volume>,
    threshold: f64,
    native_system: CoordinateSystem,
    coordinate_system: CoordinateSystem,
    all_points: PointCloud,
    selected_points: PointCloud,
    electrode_clouds: BTreeMap<String, (CloudKind, PointCloud)>,
    leads: BTreeMap<String, Lead>,
}

impl CT {
    /// An engine with no volume; selections fail until one is loaded.
    pub fn new(config: Config) -> Self {
        let threshold = config.ct_threshold;
        CT {
            config,
            filename: None,
            volume: None,
            threshold,
            native_system: CoordinateSystem::Ras,
            coordinate_system: CoordinateSystem::Ras,
            all_points: PointCloud::empty(CT_CLOUD),
            selected_points: PointCloud::empty(SELECTED_CLOUD),
            electrode_clouds: BTreeMap::new(),
            leads: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_loaded(&self) -> bool {
        self.volume.is_some()
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    /// Loads an `.npy` volume and thresholds it at `percentile`.
    pub fn load<P: AsRef<Path>>(&mut self, filename: P, percentile: f64) -> LocResult<usize> {
        self.load_with(&NpyVolumeLoader, filename, percentile)
    }

    pub fn load_with<P: AsRef<Path>>(
        &mut self,
        loader: &dyn VolumeLoader,
        filename: P,
        percentile: f64,
    ) -> LocResult<usize> {
        let path = filename.as_ref();
        let volume = loader.load(path)?;
        let kept = self.set_volume(volume, percentile)?;
        self.filename = Some(path.to_path_buf());
        Ok(kept)
    }

    /// Replaces the volume and rebuilds the master cloud. Leads are kept.
    ///
    /// Without localized contacts the coordinate system resets to the
    /// volume's own. Otherwise the current system is kept and the new cloud
    /// is mirrored into it, so stored centers still land on their voxels.
    pub fn set_volume(&mut self, volume: Volume, percentile: f64) -> LocResult<usize> {
        let native = if volume.affine[(0, volume.lateral_axis())] < 0.0 {
            CoordinateSystem::Las
        } else {
            CoordinateSystem::Ras
        };
        let has_contacts = self.leads.values().any(|l| !l.contacts.is_empty());
        self.volume = Some(volume);
        self.filename = None;
        self.native_system = native;
        if !has_contacts {
            self.coordinate_system = native;
        } else if self.coordinate_system != native {
            log::info!(
                "volume is {}, keeping {} for the localized contacts",
                native,
                self.coordinate_system
            );
        }
        self.electrode_clouds.clear();
        self.set_threshold(percentile)
    }

    /// Records the system of contacts restored before any volume is loaded.
    /// The next [`CT::set_volume`] mirrors its cloud into that system.
    pub(crate) fn assume_coordinate_system(&mut self, system: CoordinateSystem) -> LocResult<()> {
        if self.is_loaded() {
            return Err(LocError::Config(
                "coordinate system can only be assumed before a CT is loaded".to_string(),
            ));
        }
        self.coordinate_system = system;
        Ok(())
    }

    /// Re-thresholds the loaded volume at `percentile`. Clears the selection.
    /// Returns the size of the new master cloud.
    pub fn set_threshold(&mut self, percentile: f64) -> LocResult<usize> {
        let volume = self.volume.as_ref().ok_or(LocError::NoCtLoaded)?;
        if !(percentile > 0.0 && percentile <= 100.0) {
            return Err(LocError::Config(format!(
                "threshold percentile {} is outside (0, 100]",
                percentile
            )));
        }

        let cutoff = volume.percentile(percentile).ok_or_else(|| LocError::Volume {
            path: self.filename.clone().unwrap_or_default(),
            reason: "volume has no finite intensities".to_string(),
        })?;
        let mut cloud = PointCloud::new(CT_CLOUD, volume.coordinates_at_or_above(cutoff));
        if self.coordinate_system != self.native_system {
            let flip = self.lateral_flip()?;
            cloud.map_in_place(&flip);
        }

        log::info!(
            "threshold {}th percentile (intensity {}) keeps {} voxels",
            percentile,
            cutoff,
            cloud.len()
        );
        self.threshold = percentile;
        self.all_points = cloud;
        self.selected_points.clear();
        Ok(self.all_points.len())
    }

    /// Drops speckle from the master cloud. Returns the number of points removed.
    pub fn remove_isolated_points(&mut self) -> LocResult<usize> {
        self.ensure_loaded()?;
        Ok(self.all_points.remove_isolated_points())
    }

    fn ensure_loaded(&self) -> LocResult<()> {
        if self.volume.is_none() {
            return Err(LocError::NoCtLoaded);
        }
        Ok(())
    }

    // ---- selection ----

    /// Replaces the selection with the master-cloud points within `radius`.
    pub fn select_points_near(&mut self, point: &Coordinate, radius: f64) -> LocResult<usize> {
        self.ensure_loaded()?;
        let found = self.all_points.get_points_in_range(point, radius);
        self.selected_points.clear();
        self.selected_points.add_coordinates(found);
        log::debug!(
            "selected {} points within {} of {:?}",
            self.selected_points.len(),
            radius,
            point
        );
        Ok(self.selected_points.len())
    }

    /// Centroid of the selection, NaN on every axis when nothing is selected.
    pub fn selection_center(&self) -> Coordinate {
        self.selected_points.centroid()
    }

    /// Snaps the selection onto the local cluster: `iterations` times,
    /// re-selects around the centroid of the current selection. Stops early
    /// once the selection is empty.
    ///
    /// Returns the centroid of the final selection, which is also what a
    /// commit stores. It can differ from the last query center when the
    /// loop has not converged.
    pub fn center_selection(&mut self, iterations: usize, radius: f64) -> LocResult<Coordinate> {
        self.ensure_loaded()?;
        let mut center = self.selection_center();
        for _ in 0..iterations {
            if center.iter().any(|v| v.is_nan()) {
                break;
            }
            self.select_points_near(&center, radius)?;
            center = self.selection_center();
        }
        Ok(center)
    }

    /// Selects around a click and, when `center` is set, refines the
    /// selection with the configured number of iterations.
    pub fn select_coordinate(
        &mut self,
        point: &Coordinate,
        radius: f64,
        center: bool,
    ) -> LocResult<Coordinate> {
        self.select_points_near(point, radius)?;
        if center {
            self.center_selection(self.config.selection_iterations, radius)
        } else {
            Ok(self.selection_center())
        }
    }

    /// Selection radius for clicks on `lead`, or the default radius.
    pub fn selection_radius(&self, lead: Option<&str>) -> LocResult<f64> {
        match lead {
            Some(label) => Ok(self.get_lead(label)?.radius),
            None => Ok(self.config.selection_radius),
        }
    }

    pub fn selected_points(&self) -> &PointCloud {
        &self.selected_points
    }

    pub fn clear_selection(&mut self) {
        self.selected_points.clear();
    }

    fn committed_center(&self) -> LocResult<Coordinate> {
        self.ensure_loaded()?;
        let center = self.selection_center();
        if self.selected_points.is_empty() || center.iter().any(|v| v.is_nan()) {
            return Err(LocError::EmptySelection);
        }
        Ok(center)
    }

    /// Stores the selection as a confirmed electrode cloud named `name` and
    /// clears it.
    pub fn confirm_selected_electrode(&mut self, name: &str) -> LocResult<usize> {
        self.committed_center()?;
        let points = self.selected_points.coordinates().to_vec();
        let entry = self
            .electrode_clouds
            .entry(name.to_string())
            .or_insert_with(|| (CloudKind::ConfirmedElectrode, PointCloud::empty(name)));
        entry.0 = CloudKind::ConfirmedElectrode;
        entry.1.add_coordinates(points);
        let size = entry.1.len();
        self.selected_points.clear();
        Ok(size)
    }

    /// Registers an electrode cloud produced outside the engine, replacing
    /// any cloud with the same label.
    pub fn add_electrode_cloud(&mut self, kind: CloudKind, cloud: PointCloud) {
        self.electrode_clouds
            .insert(cloud.label.clone(), (kind, cloud));
    }

    /// Point cloud to render under `label`.
    pub fn point_cloud(&self, label: &str) -> Option<PointCloud> {
        match label {
            CT_CLOUD => Some(self.all_points.clone()),
            SELECTED_CLOUD => Some(self.selected_points.clone()),
            LEADS_CLOUD => Some(PointCloud::new(
                LEADS_CLOUD,
                self.leads
                    .values()
                    .flat_map(|lead| lead.contacts.values().map(|c| c.center)),
            )),
            _ => self
                .electrode_clouds
                .get(label)
                .map(|(_, cloud)| cloud.clone()),
        }
    }

    pub fn cloud_kind(&self, label: &str) -> Option<CloudKind> {
        match label {
            CT_CLOUD => Some(CloudKind::Ct),
            SELECTED_CLOUD => Some(CloudKind::Selected),
            _ => self.electrode_clouds.get(label).map(|(kind, _)| *kind),
        }
    }

    /// Labels of the electrode clouds of one kind.
    pub fn electrode_cloud_labels(&self, kind: CloudKind) -> Vec<&str> {
        self.electrode_clouds
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(label, _)| label.as_str())
            .collect()
    }

    pub fn xyz(&self, label: &str) -> Option<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        self.point_cloud(label).map(|cloud| cloud.xyz())
    }

    // ---- leads ----

    /// Builds a lead from the configured catalog.
    pub fn build_lead(&self, definition: &LeadDefinition) -> LocResult<Lead> {
        let spec = self
            .config
            .lead_type(&definition.type_code)
            .ok_or_else(|| {
                LocError::Config(format!("unknown lead type '{}'", definition.type_code))
            })?;
        let lead_type = LeadType::from_code(&definition.type_code).ok_or_else(|| {
            LocError::Config(format!("unknown lead type '{}'", definition.type_code))
        })?;
        let micros = match definition.micro.as_deref() {
            Some(name) if !name.is_empty() && !name.eq_ignore_ascii_case("none") => {
                let spec = self.config.micro(name).ok_or_else(|| {
                    LocError::Config(format!("unknown micro spec '{}'", name))
                })?;
                Some(spec.clone())
            }
            _ => None,
        };

        Ok(Lead::new(
            definition.label.as_str(),
            lead_type,
            definition.dimensions,
            spec.radius,
            spec.spacing,
            micros,
            self.config.zero_index_lead,
        ))
    }

    /// Replaces the set of leads. Contacts of leads that keep their label
    /// survive. Nothing changes if any definition is invalid.
    pub fn set_leads(&mut self, definitions: &[LeadDefinition]) -> LocResult<()> {
        let mut leads = BTreeMap::new();
        for definition in definitions {
            let mut lead = self.build_lead(definition)?;
            if let Some(old) = self.leads.get(&definition.label) {
                lead.contacts = old.contacts.clone();
            }
            leads.insert(lead.label.clone(), lead);
        }

        for dropped in self.leads.keys().filter(|label| !leads.contains_key(*label)) {
            log::info!("lead {} removed", dropped);
        }
        self.leads = leads;
        Ok(())
    }

    /// Inserts a fully built lead, replacing one with the same label.
    pub fn insert_lead(&mut self, lead: Lead) {
        self.leads.insert(lead.label.clone(), lead);
    }

    pub fn delete_lead(&mut self, label: &str) -> LocResult<Lead> {
        self.leads
            .remove(label)
            .ok_or_else(|| LocError::UnknownLead(label.to_string()))
    }

    pub fn get_lead(&self, label: &str) -> LocResult<&Lead> {
        self.leads
            .get(label)
            .ok_or_else(|| LocError::UnknownLead(label.to_string()))
    }

    pub fn get_lead_mut(&mut self, label: &str) -> LocResult<&mut Lead> {
        self.leads
            .get_mut(label)
            .ok_or_else(|| LocError::UnknownLead(label.to_string()))
    }

    pub fn get_leads(&self) -> &BTreeMap<String, Lead> {
        &self.leads
    }

    /// Defines one lead per electrode of a grid map. Returns the parsed map.
    pub fn load_gridmap<P: AsRef<Path>>(&mut self, path: P) -> LocResult<GridMap> {
        let gridmap = GridMap::parse(path)?;
        let definitions: Vec<LeadDefinition> = gridmap
            .electrodes
            .iter()
            .map(|e| LeadDefinition::new(&e.label, e.lead_type().code(), e.dimensions()))
            .collect();
        self.set_leads(&definitions)?;
        log::info!("defined {} leads from grid map", definitions.len());
        Ok(gridmap)
    }

    // ---- contacts ----

    pub fn contact_exists(&self, lead: &str, contact: &str) -> LocResult<bool> {
        Ok(self.get_lead(lead)?.get_contact(contact).is_some())
    }

    pub fn lead_location_exists(
        &self,
        lead: &str,
        location: (i64, i64),
        group: i32,
    ) -> LocResult<bool> {
        Ok(self.get_lead(lead)?.contact_at(location, group).is_some())
    }

    /// Commits the selection centroid as `contact` of `lead` and clears the
    /// selection. Duplicate or out-of-bounds locations need `confirmed`.
    pub fn add_selection_to_lead(
        &mut self,
        lead: &str,
        contact: &str,
        location: (i64, i64),
        group: i32,
        confirmed: bool,
    ) -> LocResult<Coordinate> {
        let center = self.committed_center()?;
        self.get_lead_mut(lead)?
            .add_contact(contact, center, location, group, confirmed)?;
        log::info!("{}{} localized at {:?}", lead, contact, center);
        self.selected_points.clear();
        Ok(center)
    }

    /// Commits the selection centroid as the next suggested contact of `lead`.
    pub fn seed_selection(&mut self, lead: &str) -> LocResult<Contact> {
        let center = self.committed_center()?;
        let contact = self.get_lead_mut(lead)?.seed_next_contact(center)?.clone();
        self.selected_points.clear();
        Ok(contact)
    }

    pub fn remove_contact(&mut self, lead: &str, contact: &str) -> LocResult<Contact> {
        self.get_lead_mut(lead)?.remove_contact(contact)
    }

    pub fn interpolate(&mut self, lead: &str) -> LocResult<usize> {
        self.get_lead_mut(lead)?.interpolate()
    }

    /// Derives micro-contacts for every lead with a micro spec. If any lead
    /// fails, no lead is changed.
    pub fn add_micro_contacts(&mut self) -> LocResult<usize> {
        let mut derived = Vec::new();
        for (label, lead) in self.leads.iter().filter(|(_, l)| l.micros.is_some()) {
            derived.push((label.clone(), lead.micro_contacts()?));
        }

        let mut added = 0;
        for (label, micros) in derived {
            if let Some(lead) = self.leads.get_mut(&label) {
                added += lead.apply_micro_contacts(micros);
            }
        }
        Ok(added)
    }

    pub fn bipolar_pairs(&self) -> Vec<BipolarPair> {
        self.leads
            .values()
            .flat_map(|lead| lead.bipolar_pairs())
            .collect()
    }

    /// Every contact by lead label then contact number.
    pub fn contact_listing(&self) -> Vec<ContactListing> {
        self.leads
            .values()
            .flat_map(|lead| {
                lead.sorted_contacts().into_iter().map(move |c| ContactListing {
                    lead: lead.label.clone(),
                    contact: c.label.clone(),
                    display: self.config.display_contact(
                        &lead.label,
                        &c.label,
                        c.lead_location,
                        c.lead_group,
                    ),
                    center: c.center,
                    lead_location: c.lead_location,
                    lead_group: c.lead_group,
                })
            })
            .collect()
    }

    // ---- coordinate system ----

    /// Mirror along the voxel axis that runs left/right.
    pub(crate) fn lateral_flip(&self) -> LocResult<impl Fn(&Coordinate) -> Coordinate> {
        let volume = self.volume.as_ref().ok_or(LocError::NoCtLoaded)?;
        let axis = volume.lateral_axis();
        let extent = match axis {
            0 => volume.shape().0,
            1 => volume.shape().1,
            _ => volume.shape().2,
        } as f64;
        Ok(move |c: &Coordinate| {
            let mut out = *c;
            out[axis] = (extent - 1.0) - c[axis];
            out
        })
    }

    /// Toggles between RAS and LAS. Every cloud and contact center is
    /// mirrored together so they stay aligned.
    pub fn switch_coordinate_system(&mut self) -> LocResult<CoordinateSystem> {
        let flip = self.lateral_flip()?;
        self.all_points.map_in_place(&flip);
        self.selected_points.map_in_place(&flip);
        for (_, cloud) in self.electrode_clouds.values_mut() {
            cloud.map_in_place(&flip);
        }
        for lead in self.leads.values_mut() {
            lead.transform_centers(&flip);
        }
        self.coordinate_system = self.coordinate_system.toggled();
        log::info!("switched to {}", self.coordinate_system);
        Ok(self.coordinate_system)
    }
}
