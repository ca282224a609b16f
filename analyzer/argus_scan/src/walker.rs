//! Module walker: breadth-first traversal of the import graph using
//! the imports-only fast path.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::ScanError;
use crate::session::{PackageImports, Session};

/// Traverses packages starting from a pattern, parsing only import
/// sections, and lets a visitor decide which edges to follow.
pub struct Walker<'s> {
    session: &'s Session,
}

impl<'s> Walker<'s> {
    pub fn new(session: &'s Session) -> Self {
        Walker { session }
    }

    /// Expand `pattern` and visit packages breadth-first.
    ///
    /// The visitor receives each package's [`PackageImports`] and
    /// returns the import paths it wants followed; paths already
    /// visited (or not locatable) are skipped. Returns the visit order.
    pub fn walk<V>(&self, pattern: &str, mut visitor: V) -> Result<Vec<String>, ScanError>
    where
        V: FnMut(&PackageImports) -> Vec<String>,
    {
        let mut queue: VecDeque<String> = self.expand_pattern(pattern)?.into();
        let mut visited: FxHashSet<String> = queue.iter().cloned().collect();
        let mut order: Vec<String> = Vec::new();

        while let Some(import_path) = queue.pop_front() {
            let Some(imports) = self.imports_of(&import_path)? else {
                continue;
            };
            order.push(import_path);
            for next in visitor(&imports) {
                if visited.insert(next.clone()) {
                    if self.session.locator().locate(&next).is_ok() {
                        queue.push_back(next);
                    } else {
                        debug!(import_path = %next, "walk target not locatable, skipping");
                    }
                }
            }
        }
        Ok(order)
    }

    /// All module packages that import `target`, sorted.
    pub fn find_importers(&self, target: &str) -> Result<Vec<String>, ScanError> {
        let mut importers = Vec::new();
        for import_path in self.module_packages()? {
            if let Some(imports) = self.imports_of(&import_path)? {
                if imports.imports.iter().any(|i| i == target) {
                    importers.push(import_path);
                }
            }
        }
        Ok(importers)
    }

    /// Like [`Walker::find_importers`], but pre-filters files with a
    /// plain text search for the quoted import path before parsing.
    pub fn find_importers_aggressively(&self, target: &str) -> Result<Vec<String>, ScanError> {
        let needle = format!("\"{target}\"");
        let mut importers = Vec::new();
        for import_path in self.module_packages()? {
            let Ok((dir, _)) = self.session.locator().locate(&import_path) else {
                continue;
            };
            let files = self.session.list_go_files(&dir);
            let candidates: Vec<PathBuf> = files
                .into_iter()
                .filter(|path| {
                    self.session
                        .read_file(path)
                        .map(|src| src.contains(&needle))
                        .unwrap_or(false)
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let imports = self
                .session
                .scan_imports_only(&candidates, &dir, &import_path)?;
            if imports.imports.iter().any(|i| i == target) {
                importers.push(import_path);
            }
        }
        Ok(importers)
    }

    /// One full imports-only scan of the module:
    /// import path → list of importers.
    pub fn build_reverse_dependency_map(
        &self,
    ) -> Result<FxHashMap<String, Vec<String>>, ScanError> {
        let mut reverse: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for import_path in self.module_packages()? {
            if let Some(imports) = self.imports_of(&import_path)? {
                for dep in &imports.imports {
                    reverse
                        .entry(dep.clone())
                        .or_default()
                        .push(import_path.clone());
                }
            }
        }
        Ok(reverse)
    }

    // ------------------------------------------------------------------

    /// Imports-only scan of one package; `None` when the directory has
    /// no source files.
    fn imports_of(&self, import_path: &str) -> Result<Option<PackageImports>, ScanError> {
        let (dir, _) = match self.session.locator().locate(import_path) {
            Ok(found) => found,
            Err(ScanError::PackageNotFound { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let files = self.session.list_go_files(&dir);
        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.session.scan_imports_only(&files, &dir, import_path)?))
    }

    /// Expand a walk pattern to initial import paths.
    ///
    /// `./...` and `prefix/...` expand by directory walk; anything else
    /// is a single import path.
    fn expand_pattern(&self, pattern: &str) -> Result<Vec<String>, ScanError> {
        let module = self.session.module();
        let pattern = match pattern.strip_prefix("./") {
            Some(rest) if rest == "..." => format!("{}/...", module.path),
            Some(rest) => format!("{}/{rest}", module.path),
            None => pattern.to_string(),
        };
        match pattern.strip_suffix("/...") {
            None => Ok(vec![pattern]),
            Some(prefix) => {
                let (base_dir, _) = self.session.locator().locate(prefix)?;
                Ok(self.packages_under(prefix, &base_dir))
            }
        }
    }

    /// Packages of the whole module, sorted by import path.
    fn module_packages(&self) -> Result<Vec<String>, ScanError> {
        let module = self.session.module().clone();
        Ok(self.packages_under(&module.path, &module.dir))
    }

    /// Directories at or below `dir` that contain Go files, mapped to
    /// import paths rooted at `prefix`. Skips `testdata`, `vendor`,
    /// hidden, and underscore directories.
    fn packages_under(&self, prefix: &str, dir: &Path) -> Vec<String> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        collect_dirs(dir, &mut dirs);
        // Overlay-only packages have no on-disk directory.
        let root = self.session.module().dir.clone();
        for overlay_dir in self.session.overlay().dirs_under(dir, Some(&root)) {
            dirs.push(overlay_dir);
        }
        dirs.sort();
        dirs.dedup();

        let mut packages = Vec::new();
        for package_dir in dirs {
            if self.session.list_go_files(&package_dir).is_empty() {
                continue;
            }
            let Ok(rel) = package_dir.strip_prefix(dir) else {
                continue;
            };
            let rel = rel.to_string_lossy();
            let import_path = if rel.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}/{}", rel.replace('\\', "/"))
            };
            packages.push(import_path);
        }
        packages.sort();
        packages.dedup();
        packages
    }
}

fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) {
    out.push(dir.to_path_buf());
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == "testdata" || name == "vendor" || name.starts_with('.') || name.starts_with('_')
        {
            continue;
        }
        collect_dirs(&path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Overlay;
    use pretty_assertions::assert_eq;

    fn module_session() -> Session {
        let mut overlay = Overlay::new();
        overlay.add("/demo/go.mod", "module example.com/demo\n");
        overlay.add(
            "/demo/main.go",
            "package main\n\nimport (\n\t\"example.com/demo/svc\"\n\t\"example.com/demo/util\"\n)\n",
        );
        overlay.add(
            "/demo/svc/svc.go",
            "package svc\n\nimport \"example.com/demo/util\"\n",
        );
        overlay.add("/demo/util/util.go", "package util\n");
        Session::builder("/demo").overlay(overlay).build().unwrap()
    }

    #[test]
    fn test_walk_breadth_first_follows_visitor() {
        let session = module_session();
        let walker = Walker::new(&session);
        let mut seen = Vec::new();
        let order = walker
            .walk("example.com/demo", |pkg| {
                seen.push(pkg.import_path.clone());
                pkg.imports.clone()
            })
            .unwrap();
        assert_eq!(
            order,
            vec![
                "example.com/demo",
                "example.com/demo/svc",
                "example.com/demo/util",
            ]
        );
        assert_eq!(seen, order);

        // Idempotent: a second walk visits the same set in the same
        // order.
        let again = walker.walk("example.com/demo", |pkg| pkg.imports.clone()).unwrap();
        assert_eq!(again, order);
    }

    #[test]
    fn test_walk_visitor_can_prune() {
        let session = module_session();
        let walker = Walker::new(&session);
        let order = walker.walk("example.com/demo", |_| Vec::new()).unwrap();
        assert_eq!(order, vec!["example.com/demo"]);
    }

    #[test]
    fn test_walk_glob_pattern() {
        let session = module_session();
        let walker = Walker::new(&session);
        let order = walker.walk("example.com/demo/...", |_| Vec::new()).unwrap();
        assert_eq!(
            order,
            vec![
                "example.com/demo",
                "example.com/demo/svc",
                "example.com/demo/util",
            ]
        );
    }

    #[test]
    fn test_find_importers() {
        let session = module_session();
        let walker = Walker::new(&session);
        let importers = walker.find_importers("example.com/demo/util").unwrap();
        assert_eq!(importers, vec!["example.com/demo", "example.com/demo/svc"]);
        let aggressive = walker
            .find_importers_aggressively("example.com/demo/util")
            .unwrap();
        assert_eq!(aggressive, importers);
    }

    #[test]
    fn test_reverse_dependency_map() {
        let session = module_session();
        let walker = Walker::new(&session);
        let reverse = walker.build_reverse_dependency_map().unwrap();
        assert_eq!(
            reverse.get("example.com/demo/util"),
            Some(&vec![
                "example.com/demo".to_string(),
                "example.com/demo/svc".to_string()
            ])
        );
        assert_eq!(
            reverse.get("example.com/demo/svc"),
            Some(&vec!["example.com/demo".to_string()])
        );
    }
}
