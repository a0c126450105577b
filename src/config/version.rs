//! Version gating for targets using semver constraints
//!
//! A target may name an npm package and a range like ">=4.0.0, <5.0.0"; the
//! installed version is read from `node_modules/<package>/package.json`.

use semver::{Version, VersionReq};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors during version gating
#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
    /// Package manifest could not be read
    ManifestUnreadable { path: PathBuf, source: String },
    /// Package manifest is not valid JSON or has no version
    ManifestInvalid { path: PathBuf, source: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
            VersionError::ManifestUnreadable { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            VersionError::ManifestInvalid { path, source } => {
                write!(f, "invalid package manifest {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for VersionError {}

#[derive(Deserialize)]
struct PackageManifest {
    version: String,
}

/// Path of the manifest for `package` installed under `workspace`.
pub fn manifest_path(workspace: &Path, package: &str) -> PathBuf {
    workspace
        .join("node_modules")
        .join(package)
        .join("package.json")
}

/// Read the installed version of `package` from its `package.json`.
///
/// Scoped names (`@scope/name`) map to nested directories as npm lays them out.
pub fn package_version(workspace: &Path, package: &str) -> Result<String, VersionError> {
    let path = manifest_path(workspace, package);
    let contents = fs::read_to_string(&path).map_err(|e| VersionError::ManifestUnreadable {
        path: path.clone(),
        source: e.to_string(),
    })?;
    let manifest: PackageManifest =
        serde_json::from_str(&contents).map_err(|e| VersionError::ManifestInvalid {
            path: path.clone(),
            source: e.to_string(),
        })?;
    Ok(manifest.version)
}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use regex_compat::config::version::matches_requirement;
///
/// assert!(matches_requirement("4.3.0", Some(">=4.0.0")).unwrap());
/// assert!(matches_requirement("4.3.0", Some(">=4.0.0, <5.0.0")).unwrap());
/// assert!(!matches_requirement("3.9.1", Some(">=4.0.0")).unwrap());
///
/// // None requirement means "apply to all versions"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let req_str = match requirement.map(str::trim) {
        None | Some("") => return Ok(true),
        Some(req) => req,
    };

    let version = Version::parse(version).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        source: e.to_string(),
    })?;

    Ok(req.matches(&version))
}
