//! Skill bundle manifests.
//!
//! A manifest lists every file in a `.skillkit` bundle so an installed copy
//! can be synchronized against a newer source bundle: files present only in
//! the source are added, shared files are overwritten, and files present
//! only in the destination's old manifest are removed.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SkillError};

/// Manifest schema version.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Manifest file name inside a bundle.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
    /// Relative paths with forward slashes, sorted.
    pub files: Vec<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SkillError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Counts reported after a bundle update.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Generate a manifest for the bundle rooted at `bundle_dir` and write it
/// to `manifest.json` inside it.
pub fn generate(bundle_dir: &Path) -> Result<Manifest> {
    if !bundle_dir.is_dir() {
        return Err(SkillError::InvalidInput {
            skill: "manifest_generate".into(),
            reason: format!("bundle directory not found: {}", bundle_dir.display()),
        });
    }

    let mut files = Vec::new();
    collect_files(bundle_dir, bundle_dir, &mut files)?;
    files.sort();

    let manifest = Manifest {
        version: MANIFEST_VERSION.to_owned(),
        generated_at: Utc::now(),
        files,
    };
    manifest.save(&bundle_dir.join(MANIFEST_FILE))?;
    info!(
        bundle = %bundle_dir.display(),
        files = manifest.files.len(),
        "manifest generated"
    );
    Ok(manifest)
}

/// Recursively list files under `dir` as bundle-relative paths.
///
/// The manifest itself and dotfiles are excluded. Separators are normalized
/// to forward slashes so manifests compare equal across platforms.
fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            collect_files(&path, base, out)?;
        } else if name != MANIFEST_FILE && !name.starts_with('.') {
            let relative = path
                .strip_prefix(base)
                .map_err(|_| SkillError::ExecutionFailed {
                    skill: "manifest_generate".into(),
                    reason: format!("path escapes bundle: {}", path.display()),
                })?;
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

/// Synchronize `dest_dir` to match the bundle at `source_dir`.
///
/// The source manifest is authoritative. The destination's previous
/// manifest, when present, decides which files are safe to delete; without
/// one nothing is deleted. The manifest file is copied last so an
/// interrupted update re-runs from the old state.
pub fn update(source_dir: &Path, dest_dir: &Path) -> Result<UpdateReport> {
    let source_manifest_path = source_dir.join(MANIFEST_FILE);
    if !source_manifest_path.exists() {
        return Err(SkillError::InvalidInput {
            skill: "manifest_update".into(),
            reason: format!("source manifest not found: {}", source_manifest_path.display()),
        });
    }
    let source_manifest = Manifest::load(&source_manifest_path)?;

    let dest_manifest_path = dest_dir.join(MANIFEST_FILE);
    let dest_manifest = if dest_manifest_path.exists() {
        match Manifest::load(&dest_manifest_path) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "destination manifest unreadable, treating as fresh install");
                None
            }
        }
    } else {
        None
    };

    let new_files: BTreeSet<&str> =
        source_manifest.files.iter().map(String::as_str).collect();
    let old_files: BTreeSet<&str> = dest_manifest
        .as_ref()
        .map(|m| m.files.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let mut report = UpdateReport::default();

    for file in &new_files {
        let src = source_dir.join(file);
        let dest = dest_dir.join(file);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let existed = dest.exists();
        copy_replacing(&src, &dest)?;
        if existed {
            report.updated += 1;
        } else {
            report.added += 1;
        }
    }

    // Deletion is scoped to what the old manifest claims was installed.
    for file in old_files.difference(&new_files) {
        let dest = dest_dir.join(file);
        if dest.exists() {
            match std::fs::remove_file(&dest) {
                Ok(()) => {
                    report.deleted += 1;
                    prune_empty_dirs(dest.parent(), dest_dir);
                }
                Err(e) => warn!(file = file, error = %e, "failed to delete"),
            }
        }
    }

    copy_replacing(&source_manifest_path, &dest_manifest_path)?;
    debug!(
        added = report.added,
        updated = report.updated,
        deleted = report.deleted,
        "bundle update complete"
    );
    Ok(report)
}

/// Copy src over dest, removing dest first to break any hard link.
fn copy_replacing(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_file(dest)?;
    }
    std::fs::copy(src, dest)?;
    Ok(())
}

/// Remove now-empty directories from `start` up to (but not including)
/// `stop`.
fn prune_empty_dirs(start: Option<&Path>, stop: &Path) {
    let mut current = start;
    while let Some(dir) = current {
        if dir == stop {
            break;
        }
        let empty = std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !empty || std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, content).expect("write");
    }

    #[test]
    fn generate_lists_sorted_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_file(&dir.path().join("skills/media/run.md"), "m");
        write_file(&dir.path().join("settings.json"), "{}");
        write_file(&dir.path().join(".hidden"), "x");

        let manifest = generate(dir.path()).expect("generate");
        assert_eq!(manifest.files, ["settings.json", "skills/media/run.md"]);
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert!(dir.path().join(MANIFEST_FILE).exists());

        // Regenerating must not pick up the manifest itself.
        let again = generate(dir.path()).expect("regenerate");
        assert_eq!(again.files, manifest.files);
    }

    #[test]
    fn generate_rejects_missing_directory() {
        let err = generate(Path::new("/nonexistent/bundle")).expect_err("should fail");
        assert!(matches!(err, SkillError::InvalidInput { .. }));
    }

    #[test]
    fn update_adds_updates_and_deletes() {
        let source = tempfile::tempdir().expect("tempdir");
        let dest = tempfile::tempdir().expect("tempdir");

        write_file(&source.path().join("kept.md"), "new content");
        write_file(&source.path().join("added.md"), "brand new");
        generate(source.path()).expect("source manifest");

        write_file(&dest.path().join("kept.md"), "old content");
        write_file(&dest.path().join("stale/old.md"), "remove me");
        generate(dest.path()).expect("dest manifest");

        let report = update(source.path(), dest.path()).expect("update");
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 1);

        let kept = std::fs::read_to_string(dest.path().join("kept.md")).expect("read");
        assert_eq!(kept, "new content");
        assert!(dest.path().join("added.md").exists());
        assert!(!dest.path().join("stale/old.md").exists());
        // Emptied directory is pruned.
        assert!(!dest.path().join("stale").exists());

        let dest_manifest =
            Manifest::load(&dest.path().join(MANIFEST_FILE)).expect("load");
        let mut expected: Vec<String> = vec!["added.md".into(), "kept.md".into()];
        expected.sort();
        assert_eq!(dest_manifest.files, expected);
    }

    #[test]
    fn update_without_dest_manifest_deletes_nothing() {
        let source = tempfile::tempdir().expect("tempdir");
        let dest = tempfile::tempdir().expect("tempdir");

        write_file(&source.path().join("a.md"), "a");
        generate(source.path()).expect("source manifest");
        write_file(&dest.path().join("unrelated.md"), "keep");

        let report = update(source.path(), dest.path()).expect("update");
        assert_eq!(report.added, 1);
        assert_eq!(report.deleted, 0);
        assert!(dest.path().join("unrelated.md").exists());
    }

    #[test]
    fn update_requires_source_manifest() {
        let source = tempfile::tempdir().expect("tempdir");
        let dest = tempfile::tempdir().expect("tempdir");
        let err = update(source.path(), dest.path()).expect_err("should fail");
        assert!(matches!(err, SkillError::InvalidInput { .. }));
    }
}
