//! CJ-002: Manifest parsing and validation.
//!
//! Parses conjure.yaml and validates structural constraints:
//! - Root name must not be empty
//! - Child units must be named `<root>-<language>`
//! - Unit directories must be distinct
//! - Generator and version coordinates must parse
//! - Product dependencies need every required field

use super::error::{Error, Result};
use super::naming;
use super::types::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn invalid(message: String) -> ValidationError {
    ValidationError { message }
}

/// Parse a conjure.yaml file from disk.
pub fn parse_manifest_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io("cannot read", path, e))?;
    parse_manifest(&content)
}

/// Parse a conjure.yaml from a string.
pub fn parse_manifest(yaml: &str) -> Result<Manifest> {
    serde_yaml_ng::from_str(yaml).map_err(|e| Error::Manifest(format!("YAML parse error: {}", e)))
}

/// Validate a parsed manifest. Returns a list of errors (empty = valid).
pub fn validate_manifest(manifest: &Manifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if manifest.root.trim().is_empty() {
        errors.push(invalid("root must not be empty".to_string()));
        return errors;
    }

    let mut dirs: HashMap<PathBuf, &str> = HashMap::new();
    for (name, unit) in &manifest.units {
        if let Err(e) = naming::derive_language(&manifest.root, name) {
            errors.push(invalid(e.to_string()));
        }
        let dir = unit.dir.clone().unwrap_or_else(|| PathBuf::from(name));
        if dir.as_os_str().is_empty() || dir == Path::new(".") {
            errors.push(invalid(format!("unit '{}' cannot share the root directory", name)));
        }
        if let Some(other) = dirs.insert(dir.clone(), name) {
            errors.push(invalid(format!(
                "units '{}' and '{}' share directory {}",
                other,
                name,
                dir.display()
            )));
        }
    }

    for generator in &manifest.generators {
        match Coordinate::parse(generator) {
            Ok(c) if c.version.is_none() => errors.push(invalid(format!(
                "generator '{}' must pin a version",
                generator
            ))),
            Ok(_) => {}
            Err(e) => errors.push(invalid(e.to_string())),
        }
    }

    for (module, version) in &manifest.versions {
        match Coordinate::parse(module) {
            Ok(c) if c.version.is_some() || c.extension.is_some() => errors.push(invalid(format!(
                "version key '{}' must be group:name",
                module
            ))),
            Ok(_) => {}
            Err(e) => errors.push(invalid(e.to_string())),
        }
        if version.trim().is_empty() {
            errors.push(invalid(format!("version for '{}' is empty", module)));
        }
    }

    for (i, dep) in manifest.product_dependencies.iter().enumerate() {
        let fields = [
            ("product_group", &dep.product_group),
            ("product_name", &dep.product_name),
            ("minimum_version", &dep.minimum_version),
            ("maximum_version", &dep.maximum_version),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                errors.push(invalid(format!(
                    "product dependency #{} has empty {}",
                    i + 1,
                    field
                )));
            }
        }
    }

    errors
}
