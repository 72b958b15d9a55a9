//! Manifest file discovery.
//!
//! The manifest lives in the project's `.hookwarden/` directory. YAML is
//! preferred; a JSON manifest is accepted since JSON parses as YAML.

use crate::error::{ConfigError, ConfigResult};
use hookwarden_common::HOOKWARDEN_DIR_NAME;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Candidate manifest file names, in precedence order.
pub const MANIFEST_FILE_NAMES: [&str; 3] = ["hooks.yaml", "hooks.yml", "hooks.json"];

/// Find the manifest for a project.
///
/// An explicit path always wins and must exist. Otherwise the first existing
/// candidate under `<project_root>/.hookwarden/` is used.
pub fn discover_manifest(project_root: &Path, explicit: Option<&Path>) -> ConfigResult<PathBuf> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_root.join(path)
        };
        if path.is_file() {
            debug!(target: "hook_config", path = %path.display(), "Using explicit manifest");
            return Ok(path);
        }
        return Err(ConfigError::ManifestNotFound {
            searched: path.display().to_string(),
        });
    }

    let dir = project_root.join(HOOKWARDEN_DIR_NAME);
    for name in MANIFEST_FILE_NAMES {
        let candidate = dir.join(name);
        trace!(target: "hook_config", candidate = %candidate.display(), "Checking manifest candidate");
        if candidate.is_file() {
            debug!(target: "hook_config", path = %candidate.display(), "Discovered manifest");
            return Ok(candidate);
        }
    }

    Err(ConfigError::ManifestNotFound {
        searched: MANIFEST_FILE_NAMES
            .iter()
            .map(|name| dir.join(name).display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_preferred_over_json() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(HOOKWARDEN_DIR_NAME);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("hooks.json"), "{}").unwrap();
        fs::write(dir.join("hooks.yaml"), "").unwrap();

        let found = discover_manifest(temp.path(), None).unwrap();
        assert_eq!(found, dir.join("hooks.yaml"));
    }

    #[test]
    fn test_explicit_path_relative_to_project() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("custom.yaml"), "").unwrap();

        let found = discover_manifest(temp.path(), Some(Path::new("custom.yaml"))).unwrap();
        assert_eq!(found, temp.path().join("custom.yaml"));
    }

    #[test]
    fn test_missing_manifest_lists_candidates() {
        let temp = TempDir::new().unwrap();
        let err = discover_manifest(temp.path(), None).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("hooks.yaml"));
        assert!(text.contains("hooks.json"));
    }
}
