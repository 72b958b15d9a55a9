//! Project, manifest, and audit log resolution shared by all commands.

use crate::error::{CliError, CliResult};
use hookwarden_audit::{AuditLogger, AuditResult, RotationPolicy, SecurityEvent};
use hookwarden_common::{find_project_root_from, Severity};
use hookwarden_config::{discover_manifest, load_file, AuditSettings, ConfigError, HookManifest};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where hookwarden is operating.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Project root; scripts and working directories are confined under it
    pub project_root: PathBuf,
    /// Explicit manifest path, absolute
    pub manifest: Option<PathBuf>,
}

impl ProjectContext {
    /// Resolve the project from CLI flags and the current directory.
    pub fn resolve(project_root: Option<&Path>, manifest: Option<&Path>) -> CliResult<Self> {
        let cwd = std::env::current_dir().map_err(CliError::CurrentDir)?;
        let project_root = match project_root {
            Some(root) => absolutize(&cwd, root),
            None => find_project_root_from(&cwd).unwrap_or_else(|| cwd.clone()),
        };
        debug!(target: "hook_config", root = %project_root.display(), "Resolved project root");
        Ok(Self {
            project_root,
            manifest: manifest.map(|m| absolutize(&cwd, m)),
        })
    }

    /// Path of the manifest that would be loaded.
    pub fn manifest_path(&self) -> Result<PathBuf, ConfigError> {
        discover_manifest(&self.project_root, self.manifest.as_deref())
    }

    /// Load and validate the manifest.
    ///
    /// A schema failure is also written to the audit log as a
    /// `manifest_invalid` security event.
    pub fn load_manifest(&self) -> Result<HookManifest, ConfigError> {
        let path = self.manifest_path()?;
        match load_file(&path) {
            Ok(manifest) => Ok(manifest),
            Err(ConfigError::Schema(e)) => {
                let event = SecurityEvent::new(
                    "manifest_invalid",
                    e.severity(),
                    "hook manifest failed schema validation",
                    serde_json::json!({
                        "manifest": path.display().to_string(),
                        "violations": e.violations.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    }),
                );
                if let Err(audit_err) = self
                    .audit_logger(&AuditSettings::default())
                    .and_then(|logger| logger.append_security_event(&event))
                {
                    warn!(target: "hook_audit", error = %audit_err, "Could not record invalid manifest");
                }
                Err(ConfigError::Schema(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Audit settings from the manifest, or the defaults when the manifest
    /// cannot be loaded. Used by commands that only read the log.
    pub fn audit_settings(&self) -> AuditSettings {
        match self.manifest_path().and_then(|p| load_file(&p)) {
            Ok(manifest) => manifest.audit,
            Err(e) => {
                debug!(target: "hook_config", error = %e, "Using default audit settings");
                AuditSettings::default()
            }
        }
    }

    /// Open the audit log described by `settings`.
    pub fn audit_logger(&self, settings: &AuditSettings) -> AuditResult<AuditLogger> {
        AuditLogger::new(
            self.project_root.join(&settings.path),
            RotationPolicy {
                max_size_bytes: settings.max_size_bytes,
                max_files: settings.max_files,
            },
        )
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
