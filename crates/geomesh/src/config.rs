//! Session and meshing options
//!
//! Both option sets are plain serde values, stored as RON like the rest of the
//! workspace's files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::Dim;

/// Options applied when a geometry session opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Name of the kernel model
    pub model_name: String,
    /// Lower bound on element size, applied at open
    pub characteristic_length_min: Option<f64>,
    /// Upper bound on element size, applied at open
    pub characteristic_length_max: Option<f64>,
    /// Distance under which curve end points count as coincident
    pub loop_tolerance: f64,
    /// Let the kernel print to the terminal
    pub verbose: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model_name: "geomesh".to_string(),
            characteristic_length_min: None,
            characteristic_length_max: None,
            loop_tolerance: 1e-10,
            verbose: false,
        }
    }
}

impl SessionOptions {
    /// Options with a custom model name
    pub fn named(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Save options to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        save_ron(self, path.as_ref())
    }

    /// Load options from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_ron(path.as_ref())
    }

    /// Parse options from RON text
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Serialize options to RON text
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        to_ron(self)
    }
}

/// Options for one mesh generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Highest dimension to mesh
    pub dim: Dim,
    /// Element order, left to the kernel when unset
    pub order: Option<usize>,
    /// Kernel meshing algorithm number
    pub algorithm: Option<i32>,
    /// Let the kernel print to the terminal while meshing
    pub verbose: bool,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            dim: Dim::Volume,
            order: None,
            algorithm: None,
            verbose: false,
        }
    }
}

impl MeshOptions {
    /// Mesh up to `dim` with kernel defaults otherwise
    pub fn with_dim(dim: Dim) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }

    /// Save options to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        save_ron(self, path.as_ref())
    }

    /// Load options from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_ron(path.as_ref())
    }
}

fn to_ron<T: Serialize>(value: &T) -> Result<String, ConfigError> {
    ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
        .map_err(|e| ConfigError::Serialize(e.to_string()))
}

fn save_ron<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let content = to_ron(value)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
}

fn load_ron<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    ron::from_str(&content).map_err(|e| ConfigError::Deserialize(e.to_string()))
}

/// Option file errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_options_ron() {
        let options = SessionOptions {
            characteristic_length_max: Some(0.5),
            ..SessionOptions::named("plate")
        };
        let text = options.to_ron().unwrap();
        assert_eq!(SessionOptions::from_ron(&text).unwrap(), options);
    }

    #[test]
    fn test_missing_fields_default() {
        let options = SessionOptions::from_ron("(model_name: \"part\")").unwrap();
        assert_eq!(options.model_name, "part");
        assert_eq!(options.characteristic_length_min, None);
        assert!(!options.verbose);
    }

    #[test]
    fn test_mesh_options_file() {
        let path = std::env::temp_dir().join("geomesh_mesh_options_test.ron");
        let options = MeshOptions {
            order: Some(2),
            ..MeshOptions::with_dim(Dim::Surface)
        };
        options.save(&path).unwrap();
        assert_eq!(MeshOptions::load(&path).unwrap(), options);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bad_ron_is_rejected() {
        assert!(matches!(
            SessionOptions::from_ron("(model_name: 3"),
            Err(ConfigError::Deserialize(_))
        ));
    }
}
