//! Compilation units as handed over by the upstream loader

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::source::ClassSource;

/// Errors loading a compilation unit from disk
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid unit description
    #[error("Invalid compilation unit: {0}")]
    Json(#[from] serde_json::Error),
}

/// One compilation unit: a batch of resolved classes sharing a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// Unit name (diagnostics only)
    pub name: String,
    /// Class whose static `main()` runs the program
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Classes in any order
    #[serde(default)]
    pub classes: Vec<ClassSource>,
}

impl CompilationUnit {
    /// Empty unit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            classes: Vec::new(),
        }
    }

    /// Set the entry class
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Add a class
    pub fn with_class(mut self, class: ClassSource) -> Self {
        self.classes.push(class);
        self
    }

    /// Parse a unit from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON unit file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_unit() {
        let unit = CompilationUnit::from_json_str(r#"{"name": "empty"}"#).unwrap();
        assert_eq!(unit, CompilationUnit::new("empty"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CompilationUnit::from_json_str("{\"classes\": 3}"),
            Err(LoadError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CompilationUnit::load("/nonexistent/unit.json"),
            Err(LoadError::Io(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_entry() {
        let unit = CompilationUnit::new("app")
            .with_entry("Main")
            .with_class(ClassSource::new("Main"));
        let json = unit.to_json_pretty().unwrap();
        assert_eq!(CompilationUnit::from_json_str(&json).unwrap(), unit);
    }
}
