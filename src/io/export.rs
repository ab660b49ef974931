use std::fs;
use std::path::Path;

use crate::ct::CT;
use crate::error::{LocError, LocResult};
use crate::io::vox_mom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl ExportFormat {
    /// Accepts `json`/`txt` with or without the leading dot.
    pub fn parse(format: &str) -> LocResult<ExportFormat> {
        match format.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "txt" => Ok(ExportFormat::Text),
            _ => Err(LocError::UnsupportedFormat(format.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> LocResult<ExportFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ExportFormat::parse(ext)
    }
}

impl CT {
    /// Writes every localized contact to `path`, plus the bipolar pairs of
    /// each lead when `include_bipolar` is set.
    pub fn saveas<P: AsRef<Path>>(
        &self,
        path: P,
        format: &str,
        include_bipolar: bool,
    ) -> LocResult<()> {
        let path = path.as_ref();
        let contents = match ExportFormat::parse(format)? {
            ExportFormat::Json => self.to_document(include_bipolar).to_json_string()?,
            ExportFormat::Text => vox_mom::encode(self.get_leads().values(), include_bipolar),
        };
        fs::write(path, contents).map_err(|e| LocError::io(path, e))?;
        log::info!(
            "saved {} contacts to {}",
            self.get_leads().values().map(|l| l.contacts.len()).sum::<usize>(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::io::document::LeadsDocument;
    use crate::utils::test_utils::localized_depth_lead;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn ct_with_depth_lead() -> CT {
        let mut ct = CT::new(Config::default());
        ct.insert_lead(localized_depth_lead(
            "LA",
            10,
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 3.0, 4.0),
        ));
        ct
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(ExportFormat::parse(".json").unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::parse("TXT").unwrap(), ExportFormat::Text);
        assert_eq!(
            ExportFormat::from_path(Path::new("out/coords.txt")).unwrap(),
            ExportFormat::Text
        );
        assert!(matches!(
            ExportFormat::parse(".csv"),
            Err(LocError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_json_export_with_bipolar_pairs() {
        let ct = ct_with_depth_lead();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxel_coordinates.json");
        ct.saveas(&path, ".json", true).unwrap();

        let document =
            LeadsDocument::from_json_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let pairs = &document.leads["LA"].pairs;
        assert_eq!(pairs.len(), 9);
        assert_eq!(pairs[0].name, "LA1-LA2");
        assert_eq!(pairs[8].name, "LA9-LA10");
        for (i, pair) in pairs.iter().enumerate() {
            let [x, y, z] = pair.coordinate_spaces.ct_voxel.raw;
            let expected = Vector3::new(0.0, 3.0, 4.0) * (i as f64 + 0.5);
            assert_relative_eq!(Vector3::new(x, y, z), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_text_export_without_pairs() {
        let ct = ct_with_depth_lead();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxel_coordinates.txt");
        ct.saveas(&path, "txt", false).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 10);
        assert!(!text.contains('-'));
    }

    #[test]
    fn test_unwritable_path() {
        let ct = ct_with_depth_lead();
        let res = ct.saveas("/nonexistent-dir/out.json", "json", false);
        assert!(matches!(res, Err(LocError::Io { .. })));
    }
}
