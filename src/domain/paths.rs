//! Mapping between filesystem paths, cache keys and (category, title) pairs.

use std::{
    ffi::OsStr,
    fs, io,
    path::{Component, Path, PathBuf},
};

use super::error::ContentError;

/// Split a root-anchored path into `(category, title)`.
///
/// The input is relative and starts with the content root's own directory
/// name, e.g. `md/notes/rust/intro.md`. Everything between the first and the
/// last separator is the category (`notes/rust`), and the title runs from the
/// last separator to the last dot (`intro`). A path with a single separator
/// has an empty category. A path with no extension yields a title running to
/// the end of the string.
pub fn resolve(path: &str) -> (&str, &str) {
    let mut root_end = 0;
    let mut last_sep = 0;
    let mut last_dot = None;

    for (index, byte) in path.bytes().enumerate() {
        match byte {
            b'/' if root_end == 0 => root_end = index + 1,
            b'/' => last_sep = index,
            b'.' => last_dot = Some(index),
            _ => {}
        }
    }

    let (category, title_start) = if last_sep == 0 {
        ("", root_end)
    } else {
        (&path[root_end..last_sep], last_sep + 1)
    };
    let title_end = match last_dot {
        Some(dot) if dot >= title_start => dot,
        _ => path.len(),
    };

    (category, &path[title_start..title_end])
}

/// The directory tree content is served from, plus the extension that marks
/// a file as content.
#[derive(Debug, Clone)]
pub struct ContentRoot {
    dir: PathBuf,
    label: String,
    extension: String,
}

impl ContentRoot {
    /// Build a root without touching the filesystem. `extension` may be given
    /// with or without its leading dot.
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        let dir = dir.into();
        let label = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        let extension = extension.trim_start_matches('.').to_string();
        Self {
            dir,
            label,
            extension,
        }
    }

    /// Canonicalize `dir` so that paths reported by the filesystem watcher can
    /// be mapped back to cache keys.
    pub fn open(dir: impl AsRef<Path>, extension: &str) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        let canonical = fs::canonicalize(dir).map_err(|err| ContentError::io(dir, err))?;
        if !canonical.is_dir() {
            return Err(ContentError::io(
                canonical,
                io::Error::new(io::ErrorKind::NotADirectory, "content root is not a directory"),
            ));
        }
        Ok(Self::new(canonical, extension))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Tracked extension including its leading dot.
    pub fn extension(&self) -> String {
        format!(".{}", self.extension)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        path.extension().and_then(OsStr::to_str) == Some(self.extension.as_str())
    }

    pub fn is_tracked_key(&self, key: &str) -> bool {
        self.is_tracked(Path::new(key))
    }

    /// Cache key for a filesystem path under the root. The root itself maps to `""`.
    pub fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.dir).ok()?;
        Some(join_components(relative))
    }

    /// Normalize a request path into a cache key, rejecting `..` segments.
    pub fn normalize(&self, raw: &str) -> Result<String, ContentError> {
        let mut segments = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy()),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => return Err(ContentError::invalid_path(raw)),
            }
        }
        Ok(segments.join("/"))
    }

    pub fn fs_path(&self, key: &str) -> PathBuf {
        if key.is_empty() {
            return self.dir.clone();
        }
        key.split('/')
            .fold(self.dir.clone(), |path, segment| path.join(segment))
    }

    /// Key prefixed with the root's directory name, the form [`resolve`] expects.
    pub fn anchored(&self, key: &str) -> String {
        format!("{}/{key}", self.label)
    }
}

fn join_components(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_splits_category_and_title() {
        assert_eq!(resolve("a/b/c.md"), ("b", "c"));
        assert_eq!(resolve("b.md"), ("", "b"));
        assert_eq!(resolve("a/b/c.d.md"), ("b", "c.d"));
    }

    #[test]
    fn resolve_keeps_nested_categories() {
        assert_eq!(resolve("md/notes/rust/intro.md"), ("notes/rust", "intro"));
        assert_eq!(resolve("md/intro.md"), ("", "intro"));
    }

    #[test]
    fn resolve_without_extension_does_not_panic() {
        assert_eq!(resolve("md/notes/README"), ("notes", "README"));
        assert_eq!(resolve("md/v1.2/README"), ("v1.2", "README"));
        assert_eq!(resolve(""), ("", ""));
        assert_eq!(resolve("md/"), ("", ""));
    }

    #[test]
    fn keys_are_relative_to_the_root() {
        let root = ContentRoot::new("/srv/md", ".md");
        assert_eq!(
            root.key_for(Path::new("/srv/md/notes/a.md")).as_deref(),
            Some("notes/a.md")
        );
        assert_eq!(root.key_for(Path::new("/srv/md")).as_deref(), Some(""));
        assert_eq!(root.key_for(Path::new("/elsewhere/a.md")), None);
        assert_eq!(root.anchored("notes/a.md"), "md/notes/a.md");
        assert_eq!(root.fs_path("notes/a.md"), PathBuf::from("/srv/md/notes/a.md"));
    }

    #[test]
    fn extension_matching_ignores_leading_dot() {
        let dotted = ContentRoot::new("md", ".md");
        let bare = ContentRoot::new("md", "md");
        for root in [dotted, bare] {
            assert_eq!(root.extension(), ".md");
            assert!(root.is_tracked_key("notes/a.md"));
            assert!(!root.is_tracked_key("notes/a.markdown"));
            assert!(!root.is_tracked_key("notes"));
        }
    }

    #[test]
    fn normalize_rejects_parent_segments() {
        let root = ContentRoot::new("md", ".md");
        assert_eq!(root.normalize("/notes/./a.md").expect("valid"), "notes/a.md");
        assert_eq!(root.normalize("").expect("valid"), "");
        assert!(matches!(
            root.normalize("notes/../../etc/passwd"),
            Err(ContentError::InvalidPath { .. })
        ));
    }
}
