//! Writing structured edits to the working tree

use anyhow::{bail, Context};
use codeweave_core::protocol::ApplyReport;
use codeweave_core::FileEdit;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve a model-supplied path under `root`
///
/// Only plain relative paths are accepted; absolute paths and `..`
/// components would escape the project.
fn resolve(root: &Path, relative: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(relative);
    if relative.trim().is_empty() {
        bail!("edit has an empty path");
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => bail!("refusing to write '{}': path leaves the project", relative),
            Component::RootDir | Component::Prefix(_) => {
                bail!("refusing to write '{}': path is absolute", relative)
            }
        }
    }
    Ok(root.join(path))
}

/// Write every edit under `root`, creating parent directories as needed
///
/// All paths are checked before anything is written. The report lists
/// only files that were actually written.
pub fn write_edits(root: &Path, edits: &[FileEdit]) -> anyhow::Result<ApplyReport> {
    let targets = edits
        .iter()
        .map(|edit| resolve(root, &edit.path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut report = ApplyReport::default();
    for (edit, target) in edits.iter().zip(targets) {
        let existed = target.is_file();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        fs::write(&target, &edit.content).with_context(|| format!("writing {}", edit.path))?;

        if existed {
            report.updated.push(edit.path.clone());
        } else {
            report.created.push(edit.path.clone());
        }
    }
    Ok(report)
}
