pub mod document;
pub mod export;
pub mod session;
pub mod vox_mom;

pub use document::{ContactRecord, CoordinateSpaces, LeadRecord, LeadsDocument, PairRecord};
pub use export::ExportFormat;
pub use session::{recover_session, recover_session_with, save_session, SessionState, AUTOSAVE_FILE};
pub use vox_mom::VoxMomRecord;
