//! Scanner error taxonomy.
//!
//! These are the *fatal* errors: they abort the call that triggered
//! them. Unresolvable types are not errors — they come back as
//! placeholder `TypeInfo`s with `unresolved` set, and the caller
//! decides whether to tolerate that.

use std::path::PathBuf;

use thiserror::Error;

use argus_syntax::ParseError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("parse {}:{line}:{column}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: u32,
        column: u32,
        #[source]
        source: ParseError,
    },

    #[error("package not found: {import_path}")]
    PackageNotFound { import_path: String },

    #[error("mismatched package names in {}: {names:?}", dir.display())]
    MismatchedPackageNames { dir: PathBuf, names: Vec<String> },

    #[error("no Go source files in {}", dir.display())]
    NoSourceFiles { dir: PathBuf },

    #[error("go.mod {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("module root not found above {}", dir.display())]
    ModuleRootNotFound { dir: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan canceled")]
    Canceled,
}
