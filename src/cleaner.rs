//! Removal of directories left empty after a pass's moves.
//!
//! The sweep is bounded to one organized root, works deepest-first so a
//! directory emptied by removing its children is itself collected, and never
//! touches the special folders or the root. A directory that cannot be
//! removed (permissions, a concurrent write racing the sweep) is logged and
//! skipped.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Cleans empty directories under an organized root.
pub struct FolderCleaner {
    /// Folder names that are never removed or descended into.
    protected: Vec<String>,
}

impl FolderCleaner {
    pub fn new(protected: Vec<String>) -> Self {
        Self { protected }
    }

    /// Remove empty directories below `root`, deepest-first.
    ///
    /// Returns the number of directories removed. The root itself and any
    /// protected folder survive even when empty.
    pub fn clean(&self, root: &Path) -> usize {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot read root for cleanup");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && !self.is_protected(&path) {
                removed += self.clean_tree(&path);
            }
        }
        removed
    }

    fn is_protected(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|name| self.protected.iter().any(|p| p == name.as_ref()))
    }

    /// Post-order removal of one subtree. Returns directories removed.
    fn clean_tree(&self, dir: &Path) -> usize {
        let mut removed = 0;

        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() && !self.is_protected(&path) {
                    removed += self.clean_tree(&path);
                }
            }
        }

        if dir_is_empty(dir) {
            match fs::remove_dir(dir) {
                Ok(()) => {
                    debug!(dir = %dir.display(), "removed empty folder");
                    removed += 1;
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "could not remove empty folder");
                }
            }
        }

        removed
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cleaner() -> FolderCleaner {
        FolderCleaner::new(vec!["Manual".to_string(), "Review".to_string()])
    }

    #[test]
    fn test_removes_nested_empty_dirs() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("Documents/PDF/report")).expect("mkdir");

        let removed = cleaner().clean(temp.path());

        assert_eq!(removed, 3);
        assert!(!temp.path().join("Documents").exists());
    }

    #[test]
    fn test_keeps_dirs_with_files() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("Documents/PDF")).expect("mkdir");
        fs::write(temp.path().join("Documents/PDF/a.pdf"), "x").expect("write");
        fs::create_dir_all(temp.path().join("Documents/TXT")).expect("mkdir");

        let removed = cleaner().clean(temp.path());

        assert_eq!(removed, 1);
        assert!(temp.path().join("Documents/PDF/a.pdf").exists());
        assert!(!temp.path().join("Documents/TXT").exists());
    }

    #[test]
    fn test_special_folders_survive_even_empty() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir(temp.path().join("Manual")).expect("mkdir");
        fs::create_dir(temp.path().join("Review")).expect("mkdir");

        let removed = cleaner().clean(temp.path());

        assert_eq!(removed, 0);
        assert!(temp.path().join("Manual").exists());
        assert!(temp.path().join("Review").exists());
    }

    #[test]
    fn test_manual_subtree_is_not_entered() {
        let temp = TempDir::new().expect("temp dir");
        fs::create_dir_all(temp.path().join("Manual/empty_inside")).expect("mkdir");

        cleaner().clean(temp.path());

        assert!(temp.path().join("Manual/empty_inside").exists());
    }

    #[test]
    fn test_root_itself_is_never_removed() {
        let temp = TempDir::new().expect("temp dir");
        let removed = cleaner().clean(temp.path());
        assert_eq!(removed, 0);
        assert!(temp.path().exists());
    }
}
