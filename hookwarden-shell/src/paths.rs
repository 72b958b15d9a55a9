//! Script path and working directory validators.
//!
//! Both validators canonicalize (resolving symlinks) and then compare the
//! result against the canonical root component by component. A string
//! prefix check would accept `/repo/.hookwarden/hooks-evil` for a root of
//! `/repo/.hookwarden/hooks`.

use crate::error::{CwdViolation, PathViolation};
use hookwarden_common::{has_parent_segments, is_descendant_of};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Owner-execute permission bit.
const OWNER_EXECUTE: u32 = 0o100;

/// Resolve a declared script path against `hooks_root`.
///
/// Returns the canonical absolute path only when every check passes:
/// no `..` segment, not absolute, exists, canonical path inside the
/// canonical hooks root, regular file with the owner-execute bit.
pub fn resolve_script(declared: &Path, hooks_root: &Path) -> Result<PathBuf, PathViolation> {
    if declared.is_absolute() || declared.has_root() {
        warn!(target: "hook_security", path = %declared.display(), "Absolute script path rejected");
        return Err(PathViolation::Absolute {
            declared: declared.to_path_buf(),
        });
    }
    if has_parent_segments(declared) {
        warn!(target: "hook_security", path = %declared.display(), "Script path traversal rejected");
        return Err(PathViolation::Traversal {
            declared: declared.to_path_buf(),
        });
    }

    let root = fs::canonicalize(hooks_root).map_err(|_| PathViolation::NotFound {
        path: hooks_root.to_path_buf(),
    })?;
    let joined = root.join(declared);
    let resolved = fs::canonicalize(&joined).map_err(|_| PathViolation::NotFound { path: joined })?;

    if !is_descendant_of(&resolved, &root) || resolved == root {
        warn!(
            target: "hook_security",
            declared = %declared.display(),
            resolved = %resolved.display(),
            "Script resolves outside hooks directory"
        );
        return Err(PathViolation::OutsideRoot {
            declared: declared.to_path_buf(),
            resolved,
        });
    }

    let metadata = fs::metadata(&resolved).map_err(|_| PathViolation::NotFound {
        path: resolved.clone(),
    })?;
    if !metadata.is_file() || metadata.permissions().mode() & OWNER_EXECUTE == 0 {
        return Err(PathViolation::NotExecutable { path: resolved });
    }

    debug!(target: "hook_security", script = %resolved.display(), "Script path validated");
    Ok(resolved)
}

/// Resolve a declared working directory against `project_root`.
///
/// `.` maps to the project root itself.
pub fn resolve_working_directory(
    declared: &Path,
    project_root: &Path,
) -> Result<PathBuf, CwdViolation> {
    if declared.is_absolute() || declared.has_root() {
        warn!(target: "hook_security", path = %declared.display(), "Absolute working directory rejected");
        return Err(CwdViolation::Absolute {
            declared: declared.to_path_buf(),
        });
    }

    let root = fs::canonicalize(project_root).map_err(|_| CwdViolation::NotFound {
        path: project_root.to_path_buf(),
    })?;
    if declared == Path::new(".") || declared.as_os_str().is_empty() {
        return Ok(root);
    }

    let joined = root.join(declared);
    let resolved = fs::canonicalize(&joined).map_err(|_| CwdViolation::NotFound { path: joined })?;
    if !is_descendant_of(&resolved, &root) {
        warn!(
            target: "hook_security",
            declared = %declared.display(),
            resolved = %resolved.display(),
            "Working directory resolves outside project"
        );
        return Err(CwdViolation::OutsideRoot {
            declared: declared.to_path_buf(),
            resolved,
        });
    }
    if !resolved.is_dir() {
        return Err(CwdViolation::NotADirectory { path: resolved });
    }
    Ok(resolved)
}
