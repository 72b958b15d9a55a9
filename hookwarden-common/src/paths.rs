//! Project root discovery and path containment helpers.

use std::path::{Component, Path, PathBuf};

/// Name of the per-project hookwarden directory.
pub const HOOKWARDEN_DIR_NAME: &str = ".hookwarden";

/// Maximum number of parent directories to walk when searching for a project root.
const MAX_DIRECTORY_DEPTH: usize = 64;

/// Find the project root by walking up from `start_dir`.
///
/// The nearest ancestor (including `start_dir` itself) that contains either a
/// `.git` entry or a `.hookwarden` directory is the project root.
pub fn find_project_root_from(start_dir: &Path) -> Option<PathBuf> {
    let mut path = start_dir;
    let mut depth = 0;

    loop {
        if depth >= MAX_DIRECTORY_DEPTH {
            break;
        }

        if path.join(".git").exists() || path.join(HOOKWARDEN_DIR_NAME).is_dir() {
            return Some(path.to_path_buf());
        }

        match path.parent() {
            Some(parent) => {
                path = parent;
                depth += 1;
            }
            None => break,
        }
    }

    None
}

/// Returns true if any component of `path` is a `..` segment.
pub fn has_parent_segments(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Returns true if `candidate` is `root` or lies underneath it.
///
/// Comparison is component by component, so `/srv/hooks-evil` is not a
/// descendant of `/srv/hooks`. Both paths are expected to be canonical already;
/// this function does not touch the filesystem.
pub fn is_descendant_of(candidate: &Path, root: &Path) -> bool {
    let mut candidate_components = candidate.components();
    for root_component in root.components() {
        match candidate_components.next() {
            Some(c) if c == root_component => continue,
            _ => return false,
        }
    }
    true
}
