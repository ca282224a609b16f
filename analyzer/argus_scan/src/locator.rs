//! Module locator: import path → directory.
//!
//! Finds the main module by walking up from the working directory until
//! a `go.mod` appears (overlay first, then disk), parses its `module`,
//! `require`, and `replace` directives, and answers `locate` queries by
//! longest-prefix matching. In external-resolver mode it also searches
//! the module cache (`root/<module>@<version>/…`, with the cache's
//! upper-case escaping) and a standard-library source tree.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::ScanError;
use crate::overlay::Overlay;

/// A module known to the locator.
#[derive(Clone, Debug)]
pub struct Module {
    /// Module path from the `module` directive.
    pub path: String,
    /// On-disk root directory.
    pub dir: PathBuf,
    /// Declared Go version, if any.
    pub go_version: Option<String>,
}

/// One `replace` directive.
#[derive(Clone, Debug)]
struct Replace {
    old_path: String,
    /// Module path or a filesystem path (starting with `./`, `../`, or
    /// `/`).
    new_path: String,
    new_version: Option<String>,
}

/// Parsed `go.mod`.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    pub module_path: String,
    pub go_version: Option<String>,
    /// `require`d module → version.
    pub requires: FxHashMap<String, String>,
    replaces: Vec<Replace>,
}

impl Manifest {
    /// Parse the line-oriented `go.mod` grammar.
    pub fn parse(path: &Path, text: &str) -> Result<Manifest, ScanError> {
        let mut manifest = Manifest::default();
        // Inside a `require (` / `replace (` block.
        let mut block: Option<&str> = None;

        for raw_line in text.lines() {
            let line = match raw_line.split_once("//") {
                Some((before, _)) => before.trim(),
                None => raw_line.trim(),
            };
            if line.is_empty() {
                continue;
            }
            if line == ")" {
                block = None;
                continue;
            }
            if let Some(kind) = block {
                match kind {
                    "require" => manifest.parse_require(line),
                    _ => manifest.parse_replace(line),
                }
                continue;
            }

            let (directive, rest) = match line.split_once(char::is_whitespace) {
                Some((d, r)) => (d, r.trim()),
                None => (line, ""),
            };
            match directive {
                "module" => {
                    manifest.module_path = rest.trim_matches('"').to_string();
                }
                "go" => manifest.go_version = Some(rest.to_string()),
                "require" if rest == "(" => block = Some("require"),
                "require" => manifest.parse_require(rest),
                "replace" if rest == "(" => block = Some("replace"),
                "replace" => manifest.parse_replace(rest),
                // toolchain, retract, exclude: irrelevant here.
                _ => {}
            }
        }

        if manifest.module_path.is_empty() {
            return Err(ScanError::Manifest {
                path: path.to_path_buf(),
                message: "missing module directive".to_string(),
            });
        }
        Ok(manifest)
    }

    fn parse_require(&mut self, line: &str) {
        let mut parts = line.split_whitespace();
        if let (Some(path), Some(version)) = (parts.next(), parts.next()) {
            self.requires
                .insert(path.to_string(), version.to_string());
        }
    }

    fn parse_replace(&mut self, line: &str) {
        let Some((old, new)) = line.split_once("=>") else {
            return;
        };
        let old_path = match old.split_whitespace().next() {
            Some(p) => p.to_string(),
            None => return,
        };
        let mut new_parts = new.split_whitespace();
        let Some(new_path) = new_parts.next() else {
            return;
        };
        self.replaces.push(Replace {
            old_path,
            new_path: new_path.to_string(),
            new_version: new_parts.next().map(str::to_string),
        });
    }
}

/// Escape a module path for the module cache directory layout, which
/// replaces each upper-case letter with `!` + lower-case.
fn escape_cache_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Resolution mode: module-only, or also the module cache and standard
/// library tree.
#[derive(Clone, Debug)]
pub struct Locator {
    module: Module,
    manifest: Manifest,
    external: bool,
    cache_roots: Vec<PathBuf>,
    std_roots: Vec<PathBuf>,
}

impl Locator {
    /// Discover the main module: walk upward from `workdir` until a
    /// `go.mod` is found, consulting `overlay` before disk.
    pub fn discover(
        workdir: &Path,
        overlay: &Overlay,
        external: bool,
        cache_roots: Vec<PathBuf>,
        std_roots: Vec<PathBuf>,
    ) -> Result<Locator, ScanError> {
        let mut dir = workdir.to_path_buf();
        loop {
            let candidate = dir.join("go.mod");
            let text = match overlay.get(&candidate, Some(&dir)) {
                Some(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                None => std::fs::read_to_string(&candidate).ok(),
            };
            if let Some(text) = text {
                let manifest = Manifest::parse(&candidate, &text)?;
                debug!(module = %manifest.module_path, dir = %dir.display(), "module root found");
                let module = Module {
                    path: manifest.module_path.clone(),
                    dir,
                    go_version: manifest.go_version.clone(),
                };
                return Ok(Locator {
                    module,
                    manifest,
                    external,
                    cache_roots,
                    std_roots,
                });
            }
            if !dir.pop() {
                return Err(ScanError::ModuleRootNotFound {
                    dir: workdir.to_path_buf(),
                });
            }
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Resolve an import path to `(directory, module identifier)`.
    pub fn locate(&self, import_path: &str) -> Result<(PathBuf, String), ScanError> {
        // Main module, longest prefix first by construction (a module
        // never nests another in this resolver).
        if let Some(rest) = path_suffix(&self.module.path, import_path) {
            return Ok((self.module.dir.join(rest), self.module.path.clone()));
        }

        // Replace directives, longest matching old path wins.
        let mut best: Option<&Replace> = None;
        for replace in &self.manifest.replaces {
            if path_suffix(&replace.old_path, import_path).is_some() {
                let better = best.is_none_or(|b| replace.old_path.len() > b.old_path.len());
                if better {
                    best = Some(replace);
                }
            }
        }
        if let Some(replace) = best {
            // `rest` is non-None by the loop above.
            if let Some(rest) = path_suffix(&replace.old_path, import_path) {
                if replace.new_path.starts_with('.') || replace.new_path.starts_with('/') {
                    let dir = self.module.dir.join(&replace.new_path).join(rest);
                    return Ok((dir, replace.old_path.clone()));
                }
                if self.external {
                    let version = replace
                        .new_version
                        .clone()
                        .or_else(|| self.manifest.requires.get(&replace.new_path).cloned());
                    if let Some(dir) =
                        self.cache_dir(&replace.new_path, version.as_deref(), rest)
                    {
                        return Ok((dir, replace.new_path.clone()));
                    }
                }
            }
        }

        if self.external {
            // Required modules out of the cache.
            let mut best_prefix: Option<(&str, &str)> = None;
            for (module_path, version) in &self.manifest.requires {
                if path_suffix(module_path, import_path).is_some() {
                    let better =
                        best_prefix.is_none_or(|(b, _)| module_path.len() > b.len());
                    if better {
                        best_prefix = Some((module_path, version));
                    }
                }
            }
            if let Some((module_path, version)) = best_prefix {
                if let Some(rest) = path_suffix(module_path, import_path) {
                    if let Some(dir) = self.cache_dir(module_path, Some(version), rest) {
                        return Ok((dir, module_path.to_string()));
                    }
                }
            }

            // Standard library: first segment has no dot.
            let first = import_path.split('/').next().unwrap_or("");
            if !first.contains('.') {
                for root in &self.std_roots {
                    let dir = root.join(import_path);
                    if dir.is_dir() {
                        return Ok((dir, "std".to_string()));
                    }
                }
            }
        }

        Err(ScanError::PackageNotFound {
            import_path: import_path.to_string(),
        })
    }

    fn cache_dir(&self, module_path: &str, version: Option<&str>, rest: &str) -> Option<PathBuf> {
        let escaped = escape_cache_path(module_path);
        for root in &self.cache_roots {
            if let Some(version) = version {
                let dir = root.join(format!("{escaped}@{version}")).join(rest);
                if dir.is_dir() {
                    return Some(dir);
                }
            }
            // Unversioned layout (vendored or test fixtures).
            let dir = root.join(&escaped).join(rest);
            if dir.is_dir() {
                return Some(dir);
            }
        }
        None
    }
}

/// If `import_path` is `prefix` or starts with `prefix/`, the remainder
/// (possibly empty).
fn path_suffix<'a>(prefix: &str, import_path: &'a str) -> Option<&'a str> {
    if import_path == prefix {
        return Some("");
    }
    import_path
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_manifest_parse() {
        let text = "module example.com/demo\n\ngo 1.22\n\nrequire (\n\tgithub.com/pkg/errors v0.9.1\n\tgolang.org/x/sync v0.7.0 // indirect\n)\n\nreplace example.com/fork => ../fork\n";
        let manifest = Manifest::parse(Path::new("go.mod"), text).unwrap();
        assert_eq!(manifest.module_path, "example.com/demo");
        assert_eq!(manifest.go_version.as_deref(), Some("1.22"));
        assert_eq!(
            manifest.requires.get("github.com/pkg/errors").map(String::as_str),
            Some("v0.9.1")
        );
        assert_eq!(manifest.replaces.len(), 1);
        assert_eq!(manifest.replaces[0].new_path, "../fork");
    }

    #[test]
    fn test_manifest_requires_module_directive() {
        let err = Manifest::parse(Path::new("go.mod"), "go 1.21\n").unwrap_err();
        assert!(matches!(err, ScanError::Manifest { .. }));
    }

    #[test]
    fn test_locate_in_main_module() {
        let mut overlay = Overlay::new();
        overlay.add("/work/demo/go.mod", b"module example.com/demo\n".to_vec());
        let locator = Locator::discover(
            Path::new("/work/demo"),
            &overlay,
            false,
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let (dir, module) = locator.locate("example.com/demo/internal/svc").unwrap();
        assert_eq!(dir, PathBuf::from("/work/demo/internal/svc"));
        assert_eq!(module, "example.com/demo");

        let (dir, _) = locator.locate("example.com/demo").unwrap();
        assert_eq!(dir, PathBuf::from("/work/demo"));

        assert!(matches!(
            locator.locate("example.com/other"),
            Err(ScanError::PackageNotFound { .. })
        ));
    }

    #[test]
    fn test_locate_prefers_longest_prefix_no_partial_segment() {
        let mut overlay = Overlay::new();
        overlay.add("/m/go.mod", b"module example.com/ab\n".to_vec());
        let locator =
            Locator::discover(Path::new("/m"), &overlay, false, Vec::new(), Vec::new()).unwrap();
        // `example.com/abc` must not match module `example.com/ab`.
        assert!(locator.locate("example.com/abc").is_err());
    }

    #[test]
    fn test_escape_cache_path() {
        assert_eq!(
            escape_cache_path("github.com/BurntSushi/toml"),
            "github.com/!burnt!sushi/toml"
        );
    }
}
