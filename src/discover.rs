//! Find the `prod` directories to migrate and the entries inside them.
//!
//! Layout: `{base_dir}/{name}{suffix}/{user}/prod/{entry}`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const LOST_FOUND: &str = "lost+found";
pub const PROD_DIR: &str = "prod";

// Sorted child directories of `dir` whose name satisfies `keep`.
fn child_dirs(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))? {
        let entry = entry.with_context(|| format!("Failed to iterate {}", dir.display()))?;
        let path = entry.path();
        if !path.is_dir() { continue; }
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(raw) => {
                log::warn!("Skipping non UTF-8 directory name {:?} in {}", raw, dir.display());
                continue;
            }
        };
        if keep(&name) { out.push((name, path)); }
    }
    out.sort();
    Ok(out)
}

/// Direct children of `base_dir` ending in `suffix`. A missing or unreadable
/// base dir is logged and yields nothing.
pub fn suffix_roots(base_dir: &Path, suffix: &str) -> Vec<PathBuf> {
    if !base_dir.exists() {
        log::warn!("The directory {} does not exist.", base_dir.display());
        return Vec::new();
    }
    match child_dirs(base_dir, |name| name.ends_with(suffix)) {
        Ok(dirs) => dirs.into_iter().map(|(_, p)| p).collect(),
        Err(e) => {
            log::warn!("Skipping {}: {:#}", base_dir.display(), e);
            Vec::new()
        }
    }
}

/// `<root>/<child>/prod` for every child of each root that has one. Roots
/// that cannot be read are logged and skipped.
pub fn prod_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut prods = Vec::new();
    for root in roots {
        let children = match child_dirs(root, |name| name != LOST_FOUND) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Skipping {}: {:#}", root.display(), e);
                continue;
            }
        };
        for (_, child) in children {
            let prod = child.join(PROD_DIR);
            if prod.is_dir() { prods.push(prod); }
        }
    }
    prods
}

/// Directories directly under a prod root, minus excluded basenames.
pub fn entries(prod_dir: &Path, exclude: &[String]) -> Result<Vec<(String, PathBuf)>> {
    child_dirs(prod_dir, |name| !exclude.iter().any(|x| x == name))
}

/// Child directory names of `dir`; used to look for stranded merges.
pub fn subdirectory_names(dir: &Path) -> Result<Vec<String>> {
    Ok(child_dirs(dir, |_| true)?.into_iter().map(|(n, _)| n).collect())
}
