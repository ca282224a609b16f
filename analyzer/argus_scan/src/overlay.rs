//! File overlay: path → bytes, consulted before disk.
//!
//! Tools seed the overlay to analyze unsaved or generated files without
//! touching disk. Keys may be absolute or relative to the module root;
//! lookups normalize both sides.

use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

/// In-memory file contents layered over the filesystem.
#[derive(Clone, Default, Debug)]
pub struct Overlay {
    files: FxHashMap<PathBuf, Vec<u8>>,
}

/// Lexically normalize a path: drop `.` segments, resolve `..` where
/// possible. No filesystem access.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

impl Overlay {
    pub fn new() -> Self {
        Overlay::default()
    }

    /// Insert or replace an overlay entry.
    pub fn add(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(normalize(&path.into()), contents.into());
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a path, trying the module-root-relative spelling as
    /// well.
    pub fn get(&self, path: &Path, module_root: Option<&Path>) -> Option<&[u8]> {
        let normalized = normalize(path);
        if let Some(contents) = self.files.get(&normalized) {
            return Some(contents);
        }
        if let Some(root) = module_root {
            if let Ok(rel) = normalized.strip_prefix(normalize(root)) {
                return self.files.get(rel).map(Vec::as_slice);
            }
            // A relative key may also be asked for with a relative path
            // rooted differently; try re-rooting.
            if normalized.is_relative() {
                let rooted = normalize(&root.join(&normalized));
                if let Some(contents) = self.files.get(&rooted) {
                    return Some(contents);
                }
            }
        }
        None
    }

    /// Directories (absolute, deduplicated) of overlay entries at or
    /// below `base`.
    pub fn dirs_under(&self, base: &Path, module_root: Option<&Path>) -> Vec<PathBuf> {
        let base = normalize(base);
        let mut out: Vec<PathBuf> = Vec::new();
        for key in self.files_under(&base, module_root) {
            if let Some(parent) = key.parent() {
                out.push(parent.to_path_buf());
            }
        }
        out.sort();
        out.dedup();
        out
    }

    fn files_under(&self, base: &Path, module_root: Option<&Path>) -> Vec<PathBuf> {
        let rel_base = module_root.and_then(|root| base.strip_prefix(normalize(root)).ok());
        let mut out = Vec::new();
        for key in self.files.keys() {
            if key.starts_with(base) {
                out.push(key.clone());
            } else if let (Some(rel), Some(root)) = (rel_base, module_root) {
                if key.is_relative() && key.starts_with(rel) {
                    out.push(root.join(key));
                }
            }
        }
        out
    }

    /// Overlay entries that live directly inside `dir`.
    pub fn files_in(&self, dir: &Path, module_root: Option<&Path>) -> Vec<PathBuf> {
        let dir = normalize(dir);
        let rel_dir = module_root.and_then(|root| dir.strip_prefix(normalize(root)).ok());
        let mut out = Vec::new();
        for key in self.files.keys() {
            let matches = key.parent() == Some(dir.as_path())
                || rel_dir.is_some_and(|rel| key.parent() == Some(rel));
            if matches {
                // Report the absolute spelling so scan results are
                // uniform regardless of where the bytes came from.
                if key.is_relative() {
                    if let Some(root) = module_root {
                        out.push(root.join(key));
                        continue;
                    }
                }
                out.push(key.clone());
            }
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overlay_absolute_lookup() {
        let mut overlay = Overlay::new();
        overlay.add("/mod/pkg/a.go", b"package pkg".to_vec());
        assert_eq!(
            overlay.get(Path::new("/mod/pkg/a.go"), None),
            Some(b"package pkg".as_slice())
        );
        assert_eq!(overlay.get(Path::new("/mod/pkg/b.go"), None), None);
    }

    #[test]
    fn test_overlay_module_relative_lookup() {
        let mut overlay = Overlay::new();
        overlay.add("pkg/a.go", b"package pkg".to_vec());
        let root = Path::new("/work/mod");
        assert_eq!(
            overlay.get(Path::new("/work/mod/pkg/a.go"), Some(root)),
            Some(b"package pkg".as_slice())
        );
    }

    #[test]
    fn test_overlay_files_in_dir() {
        let mut overlay = Overlay::new();
        overlay.add("pkg/a.go", b"".to_vec());
        overlay.add("pkg/b.go", b"".to_vec());
        overlay.add("pkg/nested/c.go", b"".to_vec());
        let root = Path::new("/m");
        let files = overlay.files_in(Path::new("/m/pkg"), Some(root));
        assert_eq!(
            files,
            vec![PathBuf::from("/m/pkg/a.go"), PathBuf::from("/m/pkg/b.go")]
        );
    }

    #[test]
    fn test_normalize_dot_segments() {
        let mut overlay = Overlay::new();
        overlay.add("/m/./pkg/../pkg/a.go", b"x".to_vec());
        assert_eq!(
            overlay.get(Path::new("/m/pkg/a.go"), None),
            Some(b"x".as_slice())
        );
    }
}
