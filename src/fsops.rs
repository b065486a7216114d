use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

/// The two mutations a migration performs. Everything else only reads.
pub trait FsMutator {
    /// Move the directory `from` to exactly `to` (not into it).
    fn move_dir(&self, from: &Path, to: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl FsMutator for HostFs {
    fn move_dir(&self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() { anyhow::bail!("Destination already exists: {}", to.display()); }
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                log::info!("{} and {} are on different devices, copying", from.display(), to.display());
                copy_tree(from, to)?;
                fs::remove_dir_all(from)
                    .with_context(|| format!("Copied but failed to remove source: {}", from.display()))
            }
            Err(e) => Err(e).with_context(|| format!("Failed to move {} to {}", from.display(), to.display())),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        // fs::rename would silently replace an empty directory
        if to.exists() { anyhow::bail!("Destination already exists: {}", to.display()); }
        fs::rename(from, to)
            .with_context(|| format!("Failed to rename {} to {}", from.display(), to.display()))
    }
}

// Recursive copy that keeps symlinks as symlinks.
fn copy_tree(src_root: &Path, dst_root: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src_root) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src_root.display()))?;
        let path = entry.path();
        let rel = path
            .strip_prefix(src_root)
            .with_context(|| format!("Path not under source root: {}", path.display()))?;
        let target = dst_root.join(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            fs::create_dir_all(&target)?;
            let perms = fs::metadata(path)?.permissions();
            fs::set_permissions(&target, perms)?;
        } else if ft.is_symlink() {
            let link = fs::read_link(path)?;
            copy_symlink(&link, &target)?;
        } else {
            if let Some(parent) = target.parent() { fs::create_dir_all(parent)?; }
            fs::copy(path, &target)
                .with_context(|| format!("Failed to copy {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, target)
        .with_context(|| format!("Failed to recreate symlink: {}", target.display()))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    anyhow::bail!("Cannot copy symlink {} -> {} on this platform", target.display(), link.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_dir_keeps_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("old");
        fs::create_dir_all(from.join("nested")).unwrap();
        fs::write(from.join("nested/file.txt"), "data").unwrap();
        let parent = tmp.path().join("new");
        fs::create_dir(&parent).unwrap();
        let to = parent.join("old");

        HostFs.move_dir(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(to.join("nested/file.txt")).unwrap(), "data");
    }

    #[test]
    fn rename_refuses_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        assert!(HostFs.rename(&a, &b).is_err());
        assert!(a.exists());
    }

    #[test]
    fn copy_tree_copies_files_and_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/c.txt"), "c").unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        let dst = tmp.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/c.txt")).unwrap(), "c");
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    }
}
