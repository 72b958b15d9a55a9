//! Integration tests for loading manifests from disk.

use hookwarden_config::{
    discover_manifest, load_file, ConfigError, EventContext, FailMode, HookAction,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MANIFEST: &str = r#"
version: "1.0"
defaults:
  timeout: 45
  fail_mode: continue
hooks:
  - name: format-check
    description: Verify formatting before a commit lands
    events:
      - type: vcs.pre-commit
    script: format-check.sh
    fail_mode: stop
  - name: release-notes
    events:
      - type: workflow.completed
        filter:
          workflow: "release-*"
    command: ./scripts/notes.sh
    env:
      NOTES_FORMAT: markdown
  - name: disabled-hook
    enabled: false
    events:
      - type: "*"
    command: "true"
"#;

fn write_project(manifest: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".hookwarden");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("hooks.yaml"), manifest).unwrap();
    temp
}

#[test]
fn test_load_discovered_manifest() {
    let project = write_project(MANIFEST);
    let path = discover_manifest(project.path(), None).unwrap();
    let manifest = load_file(&path).unwrap();

    assert_eq!(manifest.hooks.len(), 3);
    let first = &manifest.hooks[0];
    assert_eq!(first.fail_mode, FailMode::Stop);
    assert_eq!(first.timeout.as_secs(), 45);
    assert_eq!(
        first.action,
        HookAction::Script(PathBuf::from("format-check.sh"))
    );
    assert_eq!(
        first.description.as_deref(),
        Some("Verify formatting before a commit lands")
    );
}

#[test]
fn test_hooks_for_respects_order_filters_and_enabled() {
    let project = write_project(MANIFEST);
    let manifest = load_file(&project.path().join(".hookwarden/hooks.yaml")).unwrap();

    let release = EventContext::new("workflow.completed", br#"{"workflow": "release-2.1"}"#);
    let names: Vec<_> = manifest.hooks_for(&release).map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["release-notes"]);

    let nightly = EventContext::new("workflow.completed", br#"{"workflow": "nightly"}"#);
    assert_eq!(manifest.hooks_for(&nightly).count(), 0);

    // The wildcard hook is disabled, so unrelated events match nothing.
    let other = EventContext::new("task.created", b"{}");
    assert_eq!(manifest.hooks_for(&other).count(), 0);
}

#[test]
fn test_json_manifest_is_accepted() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".hookwarden");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("hooks.json"),
        r#"{"version": "1.0", "hooks": [{"name": "j", "events": [{"type": "a"}], "command": "true"}]}"#,
    )
    .unwrap();

    let path = discover_manifest(temp.path(), None).unwrap();
    assert_eq!(load_file(&path).unwrap().hooks[0].name, "j");
}

#[test]
fn test_invalid_manifest_file_is_schema_error() {
    let project = write_project("version: 1\nhooks:\n  - name: Bad\n    events: [{type: a}]\n    command: x\n");
    let err = load_file(&project.path().join(".hookwarden/hooks.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Schema(_)));
}

#[test]
fn test_unreadable_manifest_is_read_error() {
    let temp = TempDir::new().unwrap();
    let err = load_file(&temp.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileRead { .. }));
}
