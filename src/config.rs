use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::LocError;
use crate::lead::{LeadType, MicroSpec};

const DISPLAY_PLACEHOLDERS: [&str; 5] = ["lead", "contact", "x", "y", "group"];

/// Physical properties shared by every lead of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadTypeSpec {
    pub name: String,
    /// Distance between neighbouring contacts, in voxels.
    pub spacing: f64,
    /// Selection radius used when clicking contacts of this type, in voxels.
    pub radius: f64,
}

/// Every key the localization core reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Intensity percentile above which CT voxels enter the master cloud.
    pub ct_threshold: f64,
    /// Number of re-centering passes after a click.
    pub selection_iterations: usize,
    /// Radius used when no lead is selected.
    pub selection_radius: f64,
    /// When set, lead locations are `[0, width)`; otherwise `[1, width]`.
    pub zero_index_lead: bool,
    /// Keyed by the one-letter type code (`D`, `G`, `S`, ...).
    pub lead_types: BTreeMap<String, LeadTypeSpec>,
    pub micros: BTreeMap<String, MicroSpec>,
    pub lead_display: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut lead_types = BTreeMap::new();
        lead_types.insert(
            "D".to_string(),
            LeadTypeSpec {
                name: "Depth".to_string(),
                spacing: 5.0,
                radius: 4.0,
            },
        );
        lead_types.insert(
            "G".to_string(),
            LeadTypeSpec {
                name: "Grid".to_string(),
                spacing: 10.0,
                radius: 5.0,
            },
        );
        lead_types.insert(
            "S".to_string(),
            LeadTypeSpec {
                name: "Strip".to_string(),
                spacing: 10.0,
                radius: 5.0,
            },
        );

        Config {
            ct_threshold: 99.96,
            selection_iterations: 2,
            selection_radius: 5.0,
            zero_index_lead: false,
            lead_types,
            micros: BTreeMap::new(),
            lead_display: "{lead}{contact}".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration {:?}", path.as_ref()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid configuration in {:?}", path.as_ref()))
    }

    pub fn validate(&self) -> Result<(), LocError> {
        if !(self.ct_threshold > 0.0 && self.ct_threshold <= 100.0) {
            return Err(LocError::Config(format!(
                "ct_threshold must lie in (0, 100], got {}",
                self.ct_threshold
            )));
        }
        if !(self.selection_radius > 0.0) {
            return Err(LocError::Config(format!(
                "selection_radius must be positive, got {}",
                self.selection_radius
            )));
        }
        for (code, spec) in &self.lead_types {
            if LeadType::from_code(code).is_none() {
                return Err(LocError::Config(format!("unknown lead type code '{}'", code)));
            }
            if !(spec.spacing > 0.0) || !(spec.radius > 0.0) {
                return Err(LocError::Config(format!(
                    "lead type '{}' needs positive spacing and radius",
                    code
                )));
            }
        }
        for (key, micro) in &self.micros {
            if micro.count == 0 {
                return Err(LocError::Config(format!("micro spec '{}' has zero contacts", key)));
            }
            if !(micro.offset > 0.0) {
                return Err(LocError::Config(format!(
                    "micro spec '{}' needs a positive offset",
                    key
                )));
            }
        }
        check_display_template(&self.lead_display)
    }

    pub fn lead_type(&self, code: &str) -> Option<&LeadTypeSpec> {
        self.lead_types.get(code)
    }

    /// Looks up a micro spec by name. `None` and empty names mean "no micros".
    pub fn micro(&self, name: &str) -> Option<&MicroSpec> {
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            return None;
        }
        self.micros.get(name)
    }

    /// Renders `lead_display` for one contact.
    pub fn display_contact(
        &self,
        lead: &str,
        contact: &str,
        location: (i64, i64),
        group: i32,
    ) -> String {
        self.lead_display
            .replace("{lead}", lead)
            .replace("{contact}", contact)
            .replace("{x}", &location.0.to_string())
            .replace("{y}", &location.1.to_string())
            .replace("{group}", &group.to_string())
            .trim()
            .to_string()
    }
}

fn check_display_template(template: &str) -> Result<(), LocError> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            LocError::Config(format!("unterminated placeholder in '{}'", template))
        })?;
        let key = &after[..end];
        if !DISPLAY_PLACEHOLDERS.contains(&key) {
            return Err(LocError::Config(format!(
                "unknown placeholder '{{{}}}' in lead_display",
                key
            )));
        }
        rest = &after[end + 1..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.zero_index_lead);
        assert!(config.lead_type("D").is_some());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            ct_threshold = 99.5
            zero_index_lead = true

            [micros.BF]
            name = "BF"
            count = 8
            offset = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.ct_threshold, 99.5);
        assert!(config.zero_index_lead);
        assert_eq!(config.selection_iterations, 2);
        assert_eq!(config.micro("BF").unwrap().count, 8);
        assert!(config.micro("None").is_none());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let res = Config::from_toml_str("ct_threshold = 120.0");
        assert!(res.is_err());
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let res = Config::from_toml_str(r#"lead_display = "{lead}{colour}""#);
        assert!(res.is_err());
    }

    #[test]
    fn test_display_contact() {
        let mut config = Config::default();
        config.lead_display = "{lead}{contact} ({x}, {y})".to_string();
        assert_eq!(config.display_contact("LA", "3", (1, 3), 0), "LA3 (1, 3)");
    }

    #[test]
    fn test_fixture_config_loads() {
        let config = Config::from_toml_file("data/fixtures/config.toml").unwrap();
        assert_eq!(config.selection_iterations, 3);
        assert!(config.micro("BF").is_some());
    }
}
