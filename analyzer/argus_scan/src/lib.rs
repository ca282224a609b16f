//! Argus scan — lazy, module-aware scanner for Go packages.
//!
//! The session (see [`Session`]) resolves import paths through the
//! module manifest, parses package sources (overlay first, disk
//! second), and lifts them into the typed entity model: [`PackageInfo`]
//! with its [`TypeInfo`]s, [`FunctionInfo`]s, [`ConstantInfo`]s, and
//! [`VariableInfo`]s. Cross-package type references stay syntactic
//! ([`FieldType`]) until someone asks for [`Session::resolve_type`].
//!
//! Scanning is cached per canonical import path and never invalidated
//! within a session; rescanning returns pointer-identical packages.

mod consteval;
pub mod entity;
pub mod error;
pub mod locator;
pub mod methodset;
pub mod overlay;
mod scanner;
pub mod session;
pub mod walker;

pub use entity::{
    ConstValue, ConstantInfo, FieldInfo, FieldType, FuncSigInfo, FunctionInfo, InterfaceInfo,
    MethodSpec, PackageInfo, ParamInfo, StructInfo, TypeFlags, TypeInfo, TypeKind, TypeParamInfo,
    UnionTerm, VariableInfo,
};
pub use error::ScanError;
pub use locator::{Locator, Manifest, Module};
pub use methodset::{find_method, implements, interface_method, interface_method_set, MethodLookup};
pub use overlay::Overlay;
pub use scanner::build_import_lookup;
pub use session::{CancelToken, PackageImports, ScanPolicy, Session, SessionBuilder};
pub use walker::Walker;
