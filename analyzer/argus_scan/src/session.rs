//! The scan session: cache, identity map, policy, and the public
//! scanner surface.
//!
//! A [`Session`] is created once per analysis run via
//! [`Session::builder`]. It owns the module locator, the file overlay,
//! the package cache, and the placeholder identity map; everything else
//! borrows from it. Scanning the same import path twice returns the
//! same `Arc<PackageInfo>`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use argus_syntax::ast;
use argus_syntax::LineIndex;

use crate::entity::{FieldType, PackageInfo, TypeFlags, TypeInfo, TypeKind};
use crate::error::ScanError;
use crate::locator::{Locator, Module};
use crate::overlay::Overlay;
use crate::scanner::{self, LiftCtx};

/// Cooperative cancellation token checked between file completions.
#[derive(Clone, Default, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Predicate deciding whether a package is analyzed deeply.
pub type ScanPolicy = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Result of the imports-only fast path over one package.
#[derive(Debug, Clone)]
pub struct PackageImports {
    pub import_path: String,
    pub name: String,
    pub dir: PathBuf,
    /// Union of all files' imports, sorted and deduplicated.
    pub imports: Vec<String>,
    /// Per-file partition of the same.
    pub file_imports: FxHashMap<PathBuf, Vec<String>>,
}

/// `pattern` is an import path or a `prefix/...` glob; `...` alone
/// matches everything.
pub(crate) fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern == "..." {
        return true;
    }
    match pattern.strip_suffix("/...") {
        Some(prefix) => path == prefix || path.starts_with(&format!("{prefix}/")),
        None => pattern == path,
    }
}

pub struct SessionBuilder {
    workdir: PathBuf,
    policy: Option<ScanPolicy>,
    declarations_only: Vec<String>,
    overlay: Overlay,
    include_tests: bool,
    parallelism: Option<usize>,
    external_resolver: bool,
    cache_roots: Vec<PathBuf>,
    std_roots: Vec<PathBuf>,
    cancel: CancelToken,
    overrides: FxHashMap<(String, String), Arc<TypeInfo>>,
}

impl SessionBuilder {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        SessionBuilder {
            workdir: workdir.into(),
            policy: None,
            declarations_only: Vec::new(),
            overlay: Overlay::new(),
            include_tests: false,
            parallelism: None,
            external_resolver: false,
            cache_roots: Vec::new(),
            std_roots: Vec::new(),
            cancel: CancelToken::new(),
            overrides: FxHashMap::default(),
        }
    }

    /// Pin the resolution of an external type: any `FieldType` naming
    /// `(pkg_path, name)` resolves to `info` without scanning.
    pub fn external_type_override(
        mut self,
        pkg_path: impl Into<String>,
        name: impl Into<String>,
        info: Arc<TypeInfo>,
    ) -> Self {
        self.overrides.insert((pkg_path.into(), name.into()), info);
        self
    }

    /// Scan policy; the default allows exactly the main module.
    pub fn policy(mut self, policy: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Packages matching these patterns are scanned without function
    /// bodies.
    pub fn declarations_only(mut self, patterns: Vec<String>) -> Self {
        self.declarations_only = patterns;
        self
    }

    pub fn overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn include_tests(mut self, include: bool) -> Self {
        self.include_tests = include;
        self
    }

    /// Bound on parallel file parsing; default is rayon's.
    pub fn parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }

    /// Also search the module cache and standard library tree.
    pub fn external_resolver(mut self, enabled: bool) -> Self {
        self.external_resolver = enabled;
        self
    }

    pub fn cache_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.cache_roots = roots;
        self
    }

    pub fn std_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.std_roots = roots;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> Result<Session, ScanError> {
        let mut cache_roots = self.cache_roots;
        if self.external_resolver && cache_roots.is_empty() {
            if let Ok(gomodcache) = std::env::var("GOMODCACHE") {
                cache_roots.push(PathBuf::from(gomodcache));
            } else if let Ok(gopath) = std::env::var("GOPATH") {
                cache_roots.push(PathBuf::from(gopath).join("pkg/mod"));
            }
        }
        let locator = Locator::discover(
            &self.workdir,
            &self.overlay,
            self.external_resolver,
            cache_roots,
            self.std_roots,
        )?;
        let module_path = locator.module().path.clone();
        let policy = self.policy.unwrap_or_else(|| {
            let prefix = module_path;
            Arc::new(move |path: &str| {
                path == prefix || path.starts_with(&format!("{prefix}/"))
            })
        });
        let pool = self
            .parallelism
            .and_then(|n| rayon::ThreadPoolBuilder::new().num_threads(n).build().ok());
        Ok(Session {
            locator,
            overlay: self.overlay,
            policy,
            declarations_only: self.declarations_only,
            include_tests: self.include_tests,
            cancel: self.cancel,
            pool,
            cache: RwLock::new(FxHashMap::default()),
            placeholders: RwLock::new(FxHashMap::default()),
            overrides: self.overrides,
        })
    }
}

/// The toolkit session: scanner surface plus shared caches.
pub struct Session {
    locator: Locator,
    overlay: Overlay,
    policy: ScanPolicy,
    declarations_only: Vec<String>,
    include_tests: bool,
    cancel: CancelToken,
    /// Dedicated parse pool when a parallelism bound was requested.
    pool: Option<rayon::ThreadPool>,
    /// Canonical import path → scanned package. Never invalidated.
    cache: RwLock<FxHashMap<String, Arc<PackageInfo>>>,
    /// Identity map for unresolved placeholder TypeInfos, so repeated
    /// failed resolutions return pointer-identical records.
    placeholders: RwLock<FxHashMap<(String, String), Arc<TypeInfo>>>,
    /// Externally pinned resolutions, consulted before everything else.
    overrides: FxHashMap<(String, String), Arc<TypeInfo>>,
}

impl Session {
    pub fn builder(workdir: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder::new(workdir)
    }

    pub fn module(&self) -> &Module {
        self.locator.module()
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Whether `import_path` may be walked deeply by the evaluator.
    pub fn policy_allows(&self, import_path: &str) -> bool {
        (self.policy)(import_path)
    }

    pub fn is_declarations_only(&self, import_path: &str) -> bool {
        self.declarations_only
            .iter()
            .any(|p| pattern_matches(p, import_path))
    }

    fn check_cancel(&self) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            Err(ScanError::Canceled)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // File access

    /// Read a file, overlay first.
    pub fn read_file(&self, path: &Path) -> Result<String, ScanError> {
        if let Some(bytes) = self.overlay.get(path, Some(&self.locator.module().dir)) {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }
        std::fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Candidate source files of a directory: overlay entries plus
    /// on-disk `.go` files, sorted, test files filtered by the session
    /// option.
    pub fn list_go_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = self
            .overlay
            .files_in(dir, Some(&self.locator.module().dir));
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "go") && path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();
        files.dedup();
        files.retain(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            if !name.ends_with(".go") || name.starts_with('.') || name.starts_with('_') {
                return false;
            }
            self.include_tests || !name.ends_with("_test.go")
        });
        files
    }

    // ------------------------------------------------------------------
    // Scanning

    /// Scan the package at `import_path` (cached, idempotent).
    pub fn scan_package_by_import(&self, import_path: &str) -> Result<Arc<PackageInfo>, ScanError> {
        if let Some(pkg) = self.cache.read().get(import_path) {
            return Ok(Arc::clone(pkg));
        }
        let (dir, module) = self.locator.locate(import_path)?;
        debug!(import_path, module, dir = %dir.display(), "scanning package");
        let files = self.list_go_files(&dir);
        if files.is_empty() {
            return Err(ScanError::NoSourceFiles { dir });
        }
        self.scan_files(&files, &dir, import_path)
    }

    /// Scan an explicit file set as one package (cached under
    /// `import_path`).
    pub fn scan_files(
        &self,
        paths: &[PathBuf],
        dir: &Path,
        import_path: &str,
    ) -> Result<Arc<PackageInfo>, ScanError> {
        if let Some(pkg) = self.cache.read().get(import_path) {
            return Ok(Arc::clone(pkg));
        }
        self.check_cancel()?;

        let sources: Vec<(PathBuf, String)> = paths
            .iter()
            .map(|path| Ok((path.clone(), self.read_file(path)?)))
            .collect::<Result<_, ScanError>>()?;

        let parse_all = || -> Result<Vec<Arc<ast::File>>, ScanError> {
            sources
                .par_iter()
                .map(|(path, src)| {
                    if self.cancel.is_cancelled() {
                        return Err(ScanError::Canceled);
                    }
                    argus_syntax::parse_file(path.clone(), src)
                        .map(Arc::new)
                        .map_err(|source| {
                            let pos = LineIndex::new(src).position(source.offset());
                            ScanError::Parse {
                                path: path.clone(),
                                line: pos.line,
                                column: pos.column,
                                source,
                            }
                        })
                })
                .collect()
        };
        let files = match &self.pool {
            Some(pool) => pool.install(parse_all),
            None => parse_all(),
        }?;
        self.check_cancel()?;

        let declarations_only = self.is_declarations_only(import_path);
        let pkg = scanner::assemble_package(import_path, dir.to_path_buf(), files, declarations_only)?;
        let pkg = Arc::new(pkg);

        // First insert wins, preserving pointer identity for
        // concurrent scans of the same path.
        let mut cache = self.cache.write();
        if let Some(existing) = cache.get(import_path) {
            return Ok(Arc::clone(existing));
        }
        cache.insert(import_path.to_string(), Arc::clone(&pkg));
        Ok(pkg)
    }

    /// Fast path: package name and imports of every file in a
    /// directory, without parsing past the import section.
    pub fn scan_imports_only(
        &self,
        paths: &[PathBuf],
        dir: &Path,
        import_path: &str,
    ) -> Result<PackageImports, ScanError> {
        self.check_cancel()?;
        let mut name = String::new();
        let mut union: Vec<String> = Vec::new();
        let mut file_imports: FxHashMap<PathBuf, Vec<String>> = FxHashMap::default();

        for path in paths {
            let src = self.read_file(path)?;
            let parsed =
                argus_syntax::parse_imports_only(path.clone(), &src).map_err(|source| {
                    let pos = LineIndex::new(&src).position(source.offset());
                    ScanError::Parse {
                        path: path.clone(),
                        line: pos.line,
                        column: pos.column,
                        source,
                    }
                })?;
            let file_name = parsed.package.name;
            let base = file_name.strip_suffix("_test").unwrap_or(&file_name);
            if name.is_empty() || name == "main" {
                name = base.to_string();
            }
            let mut imports: Vec<String> =
                parsed.imports.into_iter().map(|spec| spec.path).collect();
            imports.sort();
            imports.dedup();
            union.extend(imports.iter().cloned());
            file_imports.insert(path.clone(), imports);
        }
        union.sort();
        union.dedup();

        Ok(PackageImports {
            import_path: import_path.to_string(),
            name,
            dir: dir.to_path_buf(),
            imports: union,
            file_imports,
        })
    }

    // ------------------------------------------------------------------
    // Resolution

    /// Intern an unresolved placeholder for `(pkg_path, name)`.
    pub fn placeholder_for(&self, pkg_path: &str, name: &str) -> Arc<TypeInfo> {
        let key = (pkg_path.to_string(), name.to_string());
        if let Some(existing) = self.placeholders.read().get(&key) {
            return Arc::clone(existing);
        }
        let mut map = self.placeholders.write();
        Arc::clone(
            map.entry(key)
                .or_insert_with(|| Arc::new(TypeInfo::placeholder(pkg_path, name))),
        )
    }

    /// Resolve a syntactic type reference to its declaration.
    ///
    /// Never fails: out-of-policy, unlocatable, and shape-only types
    /// come back as interned placeholders with `unresolved` set. The
    /// scan policy is consulted *before* any scanning happens.
    pub fn resolve_type(&self, field_type: &Arc<FieldType>) -> Arc<TypeInfo> {
        let leaf = field_type.leaf();
        if let Some(cached) = leaf.cached_definition() {
            return cached;
        }

        if !self.overrides.is_empty() {
            let key = (leaf.full_import_path.clone(), leaf.name.clone());
            if let Some(pinned) = self.overrides.get(&key) {
                leaf.cache_definition(pinned);
                return Arc::clone(pinned);
            }
        }

        let unresolvable = leaf.name.is_empty()
            || leaf.flags.intersects(
                TypeFlags::BUILTIN
                    | TypeFlags::TYPE_PARAM
                    | TypeFlags::MAP
                    | TypeFlags::FUNC
                    | TypeFlags::CONSTRAINT,
            );
        if unresolvable {
            return self.placeholder_for("", &leaf.name);
        }
        if leaf.full_import_path.is_empty() {
            return self.placeholder_for("", &leaf.name);
        }

        if !self.policy_allows(&leaf.full_import_path) {
            debug!(
                path = %leaf.full_import_path,
                name = %leaf.name,
                "type resolution denied by scan policy"
            );
            let placeholder = self.placeholder_for(&leaf.full_import_path, &leaf.name);
            leaf.cache_definition(&placeholder);
            return placeholder;
        }

        match self.scan_package_by_import(&leaf.full_import_path) {
            Ok(pkg) => match pkg.lookup_type(&leaf.name) {
                Some(info) => {
                    leaf.cache_definition(info);
                    Arc::clone(info)
                }
                None => self.placeholder_for(&leaf.full_import_path, &leaf.name),
            },
            Err(err) => {
                warn!(
                    path = %leaf.full_import_path,
                    name = %leaf.name,
                    error = %err,
                    "type resolution failed"
                );
                let placeholder = self.placeholder_for(&leaf.full_import_path, &leaf.name);
                leaf.cache_definition(&placeholder);
                placeholder
            }
        }
    }

    /// Follow `Alias` underlying links to the terminal declaration.
    /// Cycle-guarded: revisiting a type on the same chain stops the
    /// walk and returns the last resolved record.
    pub fn resolve_alias_chain(&self, info: &Arc<TypeInfo>) -> Arc<TypeInfo> {
        let mut visited: Vec<(String, String)> = Vec::new();
        let mut current = Arc::clone(info);
        loop {
            if current.kind != TypeKind::Alias {
                return current;
            }
            let key = (current.pkg_path.clone(), current.name.clone());
            if visited.contains(&key) {
                return current;
            }
            visited.push(key);
            let Some(underlying) = &current.underlying else {
                return current;
            };
            let next = self.resolve_type(underlying);
            if next.unresolved {
                return current;
            }
            current = next;
        }
    }

    /// Lift a type expression to the FieldType IR in the context of
    /// `file` within the package at `pkg_path`.
    pub fn type_info_from_expr(
        &self,
        file: &ast::File,
        expr: ast::ExprId,
        generic_params: &[String],
        pkg_path: &str,
    ) -> Arc<FieldType> {
        let imports = scanner::build_import_lookup(file);
        let ctx = LiftCtx {
            pkg_path,
            imports: &imports,
            type_params: generic_params.to_vec(),
        };
        scanner::type_info_from_expr(file, expr, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn demo_session() -> Session {
        let mut overlay = Overlay::new();
        overlay.add("/demo/go.mod", "module example.com/demo\n\ngo 1.22\n");
        overlay.add(
            "/demo/svc/svc.go",
            "package svc\n\ntype Service struct{ Name string }\n\nfunc Run() {}\n",
        );
        overlay.add(
            "/demo/svc/extra.go",
            "package svc\n\nconst Version = \"1.0\"\n",
        );
        Session::builder("/demo").overlay(overlay).build().unwrap()
    }

    #[test]
    fn test_scan_is_cached_by_pointer_identity() {
        let session = demo_session();
        let first = session
            .scan_package_by_import("example.com/demo/svc")
            .unwrap();
        let second = session
            .scan_package_by_import("example.com/demo/svc")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "svc");
        assert_eq!(first.files.len(), 2);
        assert!(first.lookup_type("Service").is_some());
        assert!(first.lookup_function("Run").is_some());
    }

    #[test]
    fn test_default_policy_is_main_module() {
        let session = demo_session();
        assert!(session.policy_allows("example.com/demo/svc"));
        assert!(!session.policy_allows("example.com/elsewhere"));
    }

    #[test]
    fn test_resolve_type_in_policy() {
        let session = demo_session();
        let ft = Arc::new(FieldType::named(
            "Service",
            "svc",
            "example.com/demo/svc",
        ));
        let info = session.resolve_type(&ft);
        assert!(!info.unresolved);
        assert_eq!(info.name, "Service");
        // Second resolution hits the FieldType cache and stays
        // pointer-identical.
        let again = session.resolve_type(&ft);
        assert!(Arc::ptr_eq(&info, &again));
    }

    #[test]
    fn test_resolve_type_out_of_policy_returns_interned_placeholder() {
        let session = demo_session();
        let ft = Arc::new(FieldType::named("Thing", "ext", "example.com/ext"));
        let placeholder = session.resolve_type(&ft);
        assert!(placeholder.unresolved);
        assert_eq!(placeholder.pkg_path, "example.com/ext");
        let ft2 = Arc::new(FieldType::named("Thing", "ext", "example.com/ext"));
        let again = session.resolve_type(&ft2);
        assert!(Arc::ptr_eq(&placeholder, &again));
    }

    #[test]
    fn test_unknown_package_is_not_fatal_for_resolution() {
        let session = Session::builder("/demo")
            .overlay({
                let mut o = Overlay::new();
                o.add("/demo/go.mod", "module example.com/demo\n");
                o
            })
            .policy(|_| true)
            .build()
            .unwrap();
        let ft = Arc::new(FieldType::named(
            "Missing",
            "nowhere",
            "example.com/demo/nowhere",
        ));
        let info = session.resolve_type(&ft);
        assert!(info.unresolved);
    }

    #[test]
    fn test_scan_imports_only() {
        let mut overlay = Overlay::new();
        overlay.add("/demo/go.mod", "module example.com/demo\n");
        overlay.add(
            "/demo/app/main.go",
            "package main\n\nimport (\n\t\"fmt\"\n\t\"example.com/demo/svc\"\n)\n\nfunc main() { fmt.Println(svc.Run) }\n",
        );
        overlay.add(
            "/demo/app/other.go",
            "package main\n\nimport \"os\"\n\nvar _ = os.Args\n",
        );
        let session = Session::builder("/demo").overlay(overlay).build().unwrap();
        let paths = vec![
            PathBuf::from("/demo/app/main.go"),
            PathBuf::from("/demo/app/other.go"),
        ];
        let imports = session
            .scan_imports_only(&paths, Path::new("/demo/app"), "example.com/demo/app")
            .unwrap();
        assert_eq!(imports.name, "main");
        assert_eq!(
            imports.imports,
            vec!["example.com/demo/svc", "fmt", "os"]
        );
        assert_eq!(
            imports.file_imports[&paths[1]],
            vec!["os".to_string()]
        );
    }

    #[test]
    fn test_cancel_token_aborts_scan() {
        let mut overlay = Overlay::new();
        overlay.add("/demo/go.mod", "module example.com/demo\n");
        overlay.add("/demo/p/a.go", "package p\n");
        let token = CancelToken::new();
        token.cancel();
        let session = Session::builder("/demo")
            .overlay(overlay)
            .cancel_token(token)
            .build()
            .unwrap();
        let err = session
            .scan_package_by_import("example.com/demo/p")
            .unwrap_err();
        assert!(matches!(err, ScanError::Canceled));
    }

    #[test]
    fn test_scan_from_disk_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/disk\n").unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(
            dir.path().join("pkg/a.go"),
            "package pkg\n\nfunc A() {}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("pkg/a_test.go"),
            "package pkg\n\nfunc TestA(t T) {}\n",
        )
        .unwrap();

        let session = Session::builder(dir.path()).build().unwrap();
        let pkg = session
            .scan_package_by_import("example.com/disk/pkg")
            .unwrap();
        assert_eq!(pkg.files.len(), 1, "_test.go excluded by default");
        assert!(pkg.lookup_function("A").is_some());

        let with_tests = Session::builder(dir.path())
            .include_tests(true)
            .build()
            .unwrap();
        let pkg = with_tests
            .scan_package_by_import("example.com/disk/pkg")
            .unwrap();
        assert_eq!(pkg.files.len(), 2);
        assert!(pkg.lookup_function("TestA").is_some());
    }

    #[test]
    fn test_external_type_override_pins_resolution() {
        let mut overlay = Overlay::new();
        overlay.add("/demo/go.mod", "module example.com/demo\n");
        let pinned = Arc::new(TypeInfo::placeholder("example.com/ext", "Time"));
        let session = Session::builder("/demo")
            .overlay(overlay)
            .external_type_override("example.com/ext", "Time", Arc::clone(&pinned))
            .build()
            .unwrap();
        let ft = Arc::new(FieldType::named("Time", "ext", "example.com/ext"));
        assert!(Arc::ptr_eq(&session.resolve_type(&ft), &pinned));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("a/b/...", "a/b"));
        assert!(pattern_matches("a/b/...", "a/b/c/d"));
        assert!(!pattern_matches("a/b/...", "a/bc"));
        assert!(pattern_matches("...", "anything"));
        assert!(pattern_matches("a/b", "a/b"));
    }
}
