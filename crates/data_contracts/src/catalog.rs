//! Ordered class catalog. Every component keys off catalog position, never by name.

use crate::label_map::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Classes of the reference street-scene dataset, in label-index order.
pub const REFERENCE_CLASSES: [&str; 12] = [
    "sky",
    "building",
    "column/pole",
    "road",
    "side walk",
    "vegetation",
    "traffic light",
    "fence",
    "vehicle",
    "pedestrian",
    "bicyclist",
    "void",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml parse error at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported catalog format {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub classes: Vec<String>,
}

/// Immutable ordered list of class names; index `i` is class id `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogFile", into = "CatalogFile")]
pub struct ClassCatalog {
    names: Vec<String>,
}

impl ClassCatalog {
    pub fn new<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ValidationError::EmptyCatalog);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ValidationError::BlankClassName(i));
            }
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::DuplicateClass(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// The 12-class street-scene catalog.
    pub fn reference() -> Self {
        Self {
            names: REFERENCE_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load from a `.toml` (`classes = [...]`) or `.json` (`{"classes": [...]}`) file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&raw).map_err(|e| CatalogError::Toml {
                path: path.to_path_buf(),
                source: e,
            }),
            Some("json") => serde_json::from_str(&raw).map_err(|e| CatalogError::Json {
                path: path.to_path_buf(),
                source: e,
            }),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, class: usize) -> Option<&str> {
        self.names.get(class).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(String::as_str).enumerate()
    }
}

impl Default for ClassCatalog {
    fn default() -> Self {
        Self::reference()
    }
}

impl TryFrom<CatalogFile> for ClassCatalog {
    type Error = ValidationError;

    fn try_from(file: CatalogFile) -> Result<Self, Self::Error> {
        ClassCatalog::new(file.classes)
    }
}

impl From<ClassCatalog> for CatalogFile {
    fn from(catalog: ClassCatalog) -> Self {
        CatalogFile {
            classes: catalog.names,
        }
    }
}
