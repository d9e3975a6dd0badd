/// Read-only access to the saved selector presets
///
/// The presets file is a JSON array written by the interactive control surface.
/// The bridge only lists it; writing presets is somebody else's job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up when no explicit path is configured
pub const DEFAULT_SELECTORS_FILE: &str = "saved_selectors.json";

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Saved selectors file not found (looked in: {})", format_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to read selectors from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON format in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_action() -> String {
    "click".to_string()
}

/// One named selector preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSelector {
    pub name: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
    /// Fields this bridge does not know about, preserved as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response payload of `list_saved_selectors`
#[derive(Debug, Clone, Serialize)]
pub struct SelectorListing {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub selectors: Vec<SavedSelector>,
}

/// Locates and reads the presets file
#[derive(Debug, Clone)]
pub struct SelectorStore {
    candidates: Vec<PathBuf>,
}

impl SelectorStore {
    /// Use `path` if given, otherwise the default lookup locations
    pub fn new(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::at(path),
            None => Self {
                candidates: default_locations(),
            },
        }
    }

    /// Read from exactly one file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    /// First candidate that exists on disk
    pub fn locate(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }

    pub fn load(&self) -> Result<SelectorListing, SelectorError> {
        let path = self.locate().ok_or_else(|| SelectorError::NotFound {
            searched: self.candidates.clone(),
        })?;

        let raw = std::fs::read_to_string(path).map_err(|source| SelectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let selectors: Vec<SavedSelector> =
            serde_json::from_str(&raw).map_err(|source| SelectorError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let file_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        tracing::debug!(count = selectors.len(), file = %file_path, "Loaded saved selectors");

        Ok(SelectorListing {
            success: true,
            message: "Saved selectors loaded successfully".to_string(),
            file_path,
            selectors,
        })
    }
}

/// Working directory first, then the per-user config directory
fn default_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        locations.push(cwd.join(DEFAULT_SELECTORS_FILE));
    }
    if let Some(config) = dirs::config_dir() {
        locations.push(config.join("browser-bridge").join(DEFAULT_SELECTORS_FILE));
    }
    locations
}
