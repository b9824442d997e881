//! Snapshot of the content root's immediate subdirectories.

use std::{fs, path::Path, sync::Arc};

use crate::domain::{entities::Category, error::ContentError};

/// Category listing, always replaced as a whole.
///
/// Readers receive the snapshot `Arc`, so a reload never exposes a partially
/// built list and never mutates a list a reader is holding.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    snapshot: Arc<[Category]>,
}

impl DirectoryIndex {
    /// List the directories directly under `root`, sorted by name.
    fn scan(root: &Path) -> Result<Vec<Category>, ContentError> {
        let entries = fs::read_dir(root).map_err(|err| ContentError::io(root, err))?;

        let mut categories = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ContentError::io(root, err))?;
            let file_type = entry
                .file_type()
                .map_err(|err| ContentError::io(entry.path(), err))?;
            if file_type.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                categories.push(Category {
                    path: name.clone(),
                    name,
                });
            }
        }
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Rescan `root` and install the result as the new snapshot.
    ///
    /// On error the previous snapshot stays in place.
    pub fn reload(&mut self, root: &Path) -> Result<Arc<[Category]>, ContentError> {
        self.snapshot = Self::scan(root)?.into();
        Ok(self.list())
    }

    pub fn list(&self) -> Arc<[Category]> {
        Arc::clone(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_keeps_directories_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("rust")).expect("mkdir");
        fs::create_dir(dir.path().join("go")).expect("mkdir");
        fs::write(dir.path().join("about.md"), "about").expect("write");

        let mut index = DirectoryIndex::default();
        let categories = index.reload(dir.path()).expect("reload");

        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["go", "rust"]);
        assert_eq!(categories[0].path, "go");
        assert_eq!(index.list().len(), 2);
    }

    #[test]
    fn held_snapshots_are_not_mutated_by_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("rust")).expect("mkdir");

        let mut index = DirectoryIndex::default();
        let before = index.reload(dir.path()).expect("reload");
        fs::create_dir(dir.path().join("zig")).expect("mkdir");
        let after = index.reload(dir.path()).expect("reload");

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("rust")).expect("mkdir");

        let mut index = DirectoryIndex::default();
        index.reload(dir.path()).expect("reload");
        let missing = dir.path().join("gone");
        assert!(index.reload(&missing).is_err());
        assert_eq!(index.list().len(), 1);
    }
}
