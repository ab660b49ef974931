//! Interactive localization of implanted electrode contacts on a thresholded
//! CT point cloud.
//!
//! [`ct::CT`] owns the master cloud, the interactive selection and every
//! [`lead::Lead`] being localized. Grid maps are read by [`gridmap`], leads
//! are saved and restored through [`io`].

pub mod config;
pub mod ct;
pub mod error;
pub mod gridmap;
pub mod io;
pub mod lead;
pub mod pointcloud;
mod utils;

#[cfg(feature = "python")]
mod binding;

pub use config::Config;
pub use ct::{LeadDefinition, CT};
pub use error::{LocError, LocResult};
pub use gridmap::GridMap;
pub use lead::{Contact, Lead, LeadType};
pub use pointcloud::{Coordinate, PointCloud};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn voxloc(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(binding::parse_gridmap, m)?)?;

    m.add_class::<binding::PyCT>()?;
    m.add_class::<binding::classes::PyContact>()?;
    m.add_class::<binding::classes::PyElectrode>()?;
    m.add_class::<binding::classes::PyGridContact>()?;
    Ok(())
}
