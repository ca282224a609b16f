//! The semantic entity model: packages, types, functions, constants.
//!
//! Two layers of type representation:
//!
//! - [`FieldType`] is the *syntactic* reference to a type at a use
//!   site (`*pkg.T`, `[]byte`, `map[string]V`). It is cheap, carries
//!   flags and element/key references, and resolves lazily to a
//!   [`TypeInfo`] on demand.
//! - [`TypeInfo`] is the resolved record of a named type declaration.
//!   Identity is `(import path, name)`; the session's identity map
//!   guarantees `Arc` pointer equality for repeated lookups.
//!
//! `FieldType` caches its resolution as a `Weak` reference: the session
//! owns the strong one, which keeps self-referential types
//! (`type T []*T`) from leaking.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use argus_syntax::ast;
use argus_syntax::Span;

bitflags! {
    /// Shape flags on a [`FieldType`].
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct TypeFlags: u16 {
        const POINTER    = 1 << 0;
        const SLICE      = 1 << 1;
        const ARRAY      = 1 << 2;
        const MAP        = 1 << 3;
        const CHAN       = 1 << 4;
        const VARIADIC   = 1 << 5;
        const BUILTIN    = 1 << 6;
        const TYPE_PARAM = 1 << 7;
        const CONSTRAINT = 1 << 8;
        const FUNC       = 1 << 9;
        /// `~T` approximation term inside a constraint.
        const TILDE      = 1 << 10;
    }
}

/// A parameter or result in a function signature.
#[derive(Clone, Debug)]
pub struct ParamInfo {
    /// Empty for unnamed parameters/results.
    pub name: String,
    pub ty: Arc<FieldType>,
}

/// A function signature in FieldType terms.
#[derive(Clone, Debug, Default)]
pub struct FuncSigInfo {
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
}

impl fmt::Display for FuncSigInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("func(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p.ty)?;
        }
        f.write_str(")")?;
        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0].ty),
            _ => {
                f.write_str(" (")?;
                for (i, r) in self.results.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", r.ty)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A generic type parameter.
#[derive(Clone, Debug)]
pub struct TypeParamInfo {
    pub name: String,
    pub constraint: Option<Arc<FieldType>>,
}

/// Syntactic reference to a type as written at a use site.
#[derive(Debug)]
pub struct FieldType {
    /// Base name (`T` in `*pkg.T`); empty for containers and literals.
    pub name: String,
    /// Package qualifier as written locally (`pkg` in `pkg.T`).
    pub pkg_name: String,
    /// Canonical import path of the declaring package; empty for
    /// builtins, type parameters, and unqualifiable shapes.
    pub full_import_path: String,
    pub flags: TypeFlags,
    /// Pointee / element for pointer, slice, array, chan, variadic;
    /// value type for maps; single term for `~T`.
    pub elem: Option<Arc<FieldType>>,
    /// Key type for maps.
    pub map_key: Option<Arc<FieldType>>,
    /// Type arguments of a generic instantiation, or the terms of a
    /// union constraint.
    pub type_args: Vec<Arc<FieldType>>,
    /// Signature for function types.
    pub func_sig: Option<Arc<FuncSigInfo>>,
    /// Array length as written (`4` in `[4]byte`), best effort.
    pub array_len: Option<String>,
    /// Lazily cached resolution.
    resolved: RwLock<Option<Weak<TypeInfo>>>,
}

impl FieldType {
    fn bare(flags: TypeFlags) -> FieldType {
        FieldType {
            name: String::new(),
            pkg_name: String::new(),
            full_import_path: String::new(),
            flags,
            elem: None,
            map_key: None,
            type_args: Vec::new(),
            func_sig: None,
            array_len: None,
            resolved: RwLock::new(None),
        }
    }

    pub fn named(
        name: impl Into<String>,
        pkg_name: impl Into<String>,
        full_import_path: impl Into<String>,
    ) -> FieldType {
        FieldType {
            name: name.into(),
            pkg_name: pkg_name.into(),
            full_import_path: full_import_path.into(),
            ..FieldType::bare(TypeFlags::empty())
        }
    }

    pub fn builtin(name: impl Into<String>) -> FieldType {
        FieldType {
            name: name.into(),
            ..FieldType::bare(TypeFlags::BUILTIN)
        }
    }

    pub fn type_param(name: impl Into<String>) -> FieldType {
        FieldType {
            name: name.into(),
            ..FieldType::bare(TypeFlags::TYPE_PARAM)
        }
    }

    /// An opaque shape with no useful name (`struct{…}` literals and
    /// parse oddities).
    pub fn opaque(name: impl Into<String>) -> FieldType {
        FieldType {
            name: name.into(),
            ..FieldType::bare(TypeFlags::empty())
        }
    }

    pub fn pointer(elem: Arc<FieldType>) -> FieldType {
        FieldType {
            elem: Some(elem),
            ..FieldType::bare(TypeFlags::POINTER)
        }
    }

    pub fn slice(elem: Arc<FieldType>) -> FieldType {
        FieldType {
            elem: Some(elem),
            ..FieldType::bare(TypeFlags::SLICE)
        }
    }

    pub fn array(elem: Arc<FieldType>, len: Option<String>) -> FieldType {
        FieldType {
            elem: Some(elem),
            array_len: len,
            ..FieldType::bare(TypeFlags::ARRAY)
        }
    }

    pub fn map(key: Arc<FieldType>, value: Arc<FieldType>) -> FieldType {
        FieldType {
            map_key: Some(key),
            elem: Some(value),
            ..FieldType::bare(TypeFlags::MAP)
        }
    }

    pub fn chan(elem: Arc<FieldType>) -> FieldType {
        FieldType {
            elem: Some(elem),
            ..FieldType::bare(TypeFlags::CHAN)
        }
    }

    pub fn variadic(elem: Arc<FieldType>) -> FieldType {
        FieldType {
            elem: Some(elem),
            ..FieldType::bare(TypeFlags::VARIADIC)
        }
    }

    pub fn func(sig: FuncSigInfo) -> FieldType {
        FieldType {
            name: "func".to_string(),
            func_sig: Some(Arc::new(sig)),
            ..FieldType::bare(TypeFlags::FUNC)
        }
    }

    /// A union constraint (`A | ~B`).
    pub fn union(terms: Vec<Arc<FieldType>>) -> FieldType {
        FieldType {
            type_args: terms,
            ..FieldType::bare(TypeFlags::CONSTRAINT)
        }
    }

    /// A `~T` approximation term.
    pub fn tilde(elem: Arc<FieldType>) -> FieldType {
        FieldType {
            elem: Some(elem),
            ..FieldType::bare(TypeFlags::CONSTRAINT | TypeFlags::TILDE)
        }
    }

    /// Instantiation `G[T, U]`: `base` with `args`.
    pub fn instantiated(base: FieldType, args: Vec<Arc<FieldType>>) -> FieldType {
        FieldType {
            type_args: args,
            ..base
        }
    }

    #[inline]
    pub fn is_pointer(&self) -> bool {
        self.flags.contains(TypeFlags::POINTER)
    }

    #[inline]
    pub fn is_builtin(&self) -> bool {
        self.flags.contains(TypeFlags::BUILTIN)
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.flags.contains(TypeFlags::VARIADIC)
    }

    /// Innermost element type: peels pointers, slices, arrays, and
    /// variadics. Maps and funcs stop the walk.
    pub fn leaf(&self) -> &FieldType {
        let mut cur = self;
        loop {
            let peel = cur.flags.intersects(
                TypeFlags::POINTER | TypeFlags::SLICE | TypeFlags::ARRAY | TypeFlags::VARIADIC,
            );
            match (&cur.elem, peel) {
                (Some(elem), true) => cur = elem,
                _ => return cur,
            }
        }
    }

    /// The cached resolution, if it is still alive.
    pub fn cached_definition(&self) -> Option<Arc<TypeInfo>> {
        self.resolved.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn cache_definition(&self, info: &Arc<TypeInfo>) {
        *self.resolved.write() = Some(Arc::downgrade(info));
    }

    /// The `pkgPath.Name` (or `*pkgPath.Name`) key used for
    /// possible-type tracking.
    pub fn type_key(&self) -> String {
        if self.is_pointer() {
            if let Some(elem) = &self.elem {
                return format!("*{}", elem.type_key());
            }
        }
        if self.full_import_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.full_import_path, self.name)
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.contains(TypeFlags::VARIADIC) {
            if let Some(elem) = &self.elem {
                return write!(f, "...{elem}");
            }
        }
        if self.flags.contains(TypeFlags::POINTER) {
            if let Some(elem) = &self.elem {
                return write!(f, "*{elem}");
            }
        }
        if self.flags.contains(TypeFlags::SLICE) {
            if let Some(elem) = &self.elem {
                return write!(f, "[]{elem}");
            }
        }
        if self.flags.contains(TypeFlags::ARRAY) {
            if let Some(elem) = &self.elem {
                let len = self.array_len.as_deref().unwrap_or("");
                return write!(f, "[{len}]{elem}");
            }
        }
        if self.flags.contains(TypeFlags::MAP) {
            if let (Some(key), Some(value)) = (&self.map_key, &self.elem) {
                return write!(f, "map[{key}]{value}");
            }
        }
        if self.flags.contains(TypeFlags::CHAN) {
            if let Some(elem) = &self.elem {
                return write!(f, "chan {elem}");
            }
        }
        if self.flags.contains(TypeFlags::TILDE) {
            if let Some(elem) = &self.elem {
                return write!(f, "~{elem}");
            }
        }
        if self.flags.contains(TypeFlags::CONSTRAINT) && !self.type_args.is_empty() {
            let terms: Vec<String> = self.type_args.iter().map(|t| t.to_string()).collect();
            return f.write_str(&terms.join(" | "));
        }
        if let Some(sig) = &self.func_sig {
            return write!(f, "{sig}");
        }

        if self.full_import_path.is_empty() {
            f.write_str(&self.name)?;
        } else {
            write!(f, "{}.{}", self.full_import_path, self.name)?;
        }
        if !self.type_args.is_empty() {
            let args: Vec<String> = self.type_args.iter().map(|t| t.to_string()).collect();
            write!(f, "[{}]", args.join(", "))?;
        }
        Ok(())
    }
}

/// Which variant of declaration a [`TypeInfo`] records.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    Struct,
    Interface,
    /// A defined or aliased type with an underlying type
    /// (`type Color int`, `type A = B`).
    Alias,
    Func,
    /// Placeholder for an unresolved or still-scanning type.
    Unknown,
}

/// One struct field.
#[derive(Clone, Debug)]
pub struct FieldInfo {
    /// Field name; for embedded fields, the base name of the embedded
    /// type.
    pub name: String,
    pub ty: Arc<FieldType>,
    pub embedded: bool,
    pub tag: Option<String>,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct StructInfo {
    pub fields: Vec<FieldInfo>,
}

/// One method in an interface body.
#[derive(Clone, Debug)]
pub struct MethodSpec {
    pub name: String,
    pub doc: Option<String>,
    pub sig: FuncSigInfo,
}

/// One term of a type-set union.
#[derive(Clone, Debug)]
pub struct UnionTerm {
    pub ty: Arc<FieldType>,
    pub tilde: bool,
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceInfo {
    pub methods: Vec<MethodSpec>,
    /// Embedded interfaces (`io.Reader` inside another interface).
    pub embedded: Vec<Arc<FieldType>>,
    /// Type-set terms; when non-empty this is a constraint interface
    /// and `embedded` stays empty.
    pub unions: Vec<UnionTerm>,
}

/// Resolved record of a named type declaration.
#[derive(Debug)]
pub struct TypeInfo {
    pub pkg_path: String,
    pub name: String,
    pub doc: Option<String>,
    pub kind: TypeKind,
    /// True only for `type A = B` (assignment aliases).
    pub is_alias: bool,
    pub type_params: Vec<TypeParamInfo>,
    pub struct_info: Option<StructInfo>,
    pub interface_info: Option<InterfaceInfo>,
    pub func_sig: Option<FuncSigInfo>,
    /// Underlying type for `TypeKind::Alias`.
    pub underlying: Option<Arc<FieldType>>,
    /// Set when the declaring package was out of policy, missing, or
    /// unparseable; the record then carries identity only.
    pub unresolved: bool,
    pub is_enum: bool,
    pub enum_members: Vec<Arc<ConstantInfo>>,
    pub file: Option<PathBuf>,
    pub decl_span: Span,
}

impl TypeInfo {
    /// An empty placeholder for `(pkg_path, name)`; used both as the
    /// pre-fill shell during scanning and as the unresolved stand-in.
    pub fn placeholder(pkg_path: impl Into<String>, name: impl Into<String>) -> TypeInfo {
        TypeInfo {
            pkg_path: pkg_path.into(),
            name: name.into(),
            doc: None,
            kind: TypeKind::Unknown,
            is_alias: false,
            type_params: Vec::new(),
            struct_info: None,
            interface_info: None,
            func_sig: None,
            underlying: None,
            unresolved: true,
            is_enum: false,
            enum_members: Vec::new(),
            file: None,
            decl_span: Span::DUMMY,
        }
    }

    /// `pkgPath.Name` identity key.
    pub fn key(&self) -> String {
        if self.pkg_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.pkg_path, self.name)
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A scanned function or method.
#[derive(Debug)]
pub struct FunctionInfo {
    pub pkg_path: String,
    pub name: String,
    pub doc: Option<String>,
    pub receiver: Option<ParamInfo>,
    pub type_params: Vec<TypeParamInfo>,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
    /// File carrying the declaration (and the body arena).
    pub file: Arc<ast::File>,
    /// `None` for bodyless declarations and declarations-only scans.
    pub body: Option<ast::StmtId>,
    pub decl_span: Span,
}

impl FunctionInfo {
    /// `(base type name, receiver is pointer)` for methods.
    pub fn receiver_base(&self) -> Option<(String, bool)> {
        let recv = self.receiver.as_ref()?;
        let leaf = recv.ty.leaf();
        Some((leaf.name.clone(), recv.ty.is_pointer()))
    }

    /// Fully qualified name: `pkg.Func`, `(pkg.T).Method`, or
    /// `(*pkg.T).Method`.
    pub fn qualified_name(&self) -> String {
        match self.receiver_base() {
            Some((base, pointer)) => {
                let star = if pointer { "*" } else { "" };
                format!("({star}{}.{base}).{}", self.pkg_path, self.name)
            }
            None => format!("{}.{}", self.pkg_path, self.name),
        }
    }
}

/// A constant value folded at scan time.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Not evaluable (cross-package reference, overflow, panic in
    /// folding, unsupported construct).
    Unknown,
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
            ConstValue::Str(v) => write!(f, "{v:?}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// A scanned constant.
#[derive(Debug)]
pub struct ConstantInfo {
    pub pkg_path: String,
    pub name: String,
    pub doc: Option<String>,
    pub ty: Option<Arc<FieldType>>,
    pub value: ConstValue,
    /// Position within the enclosing `const` group, when the group
    /// uses `iota`-style inheritance.
    pub iota: Option<i64>,
    /// Name of the enum type this constant belongs to, set by the
    /// enum-linking pass.
    pub enum_of: Option<String>,
    pub exported: bool,
    pub decl_span: Span,
}

/// A scanned package-level variable.
#[derive(Debug)]
pub struct VariableInfo {
    pub pkg_path: String,
    pub name: String,
    pub doc: Option<String>,
    pub ty: Option<Arc<FieldType>>,
    /// Initializer expression, when present.
    pub init: Option<(Arc<ast::File>, ast::ExprId)>,
    pub exported: bool,
    pub decl_span: Span,
}

/// One scanned package: files plus everything declared in them.
#[derive(Debug)]
pub struct PackageInfo {
    pub import_path: String,
    pub name: String,
    pub dir: PathBuf,
    pub file_paths: Vec<PathBuf>,
    pub files: Vec<Arc<ast::File>>,
    pub types: Vec<Arc<TypeInfo>>,
    pub functions: Vec<Arc<FunctionInfo>>,
    pub constants: Vec<Arc<ConstantInfo>>,
    pub variables: Vec<Arc<VariableInfo>>,
    type_index: FxHashMap<String, usize>,
    func_index: FxHashMap<String, usize>,
    const_index: FxHashMap<String, usize>,
    var_index: FxHashMap<String, usize>,
    /// Receiver base type name → method indexes into `functions`.
    method_index: FxHashMap<String, Vec<usize>>,
}

impl PackageInfo {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        import_path: String,
        name: String,
        dir: PathBuf,
        file_paths: Vec<PathBuf>,
        files: Vec<Arc<ast::File>>,
        types: Vec<Arc<TypeInfo>>,
        functions: Vec<Arc<FunctionInfo>>,
        constants: Vec<Arc<ConstantInfo>>,
        variables: Vec<Arc<VariableInfo>>,
    ) -> PackageInfo {
        let mut pkg = PackageInfo {
            import_path,
            name,
            dir,
            file_paths,
            files,
            types,
            functions,
            constants,
            variables,
            type_index: FxHashMap::default(),
            func_index: FxHashMap::default(),
            const_index: FxHashMap::default(),
            var_index: FxHashMap::default(),
            method_index: FxHashMap::default(),
        };
        for (i, t) in pkg.types.iter().enumerate() {
            pkg.type_index.insert(t.name.clone(), i);
        }
        for (i, f) in pkg.functions.iter().enumerate() {
            match f.receiver_base() {
                Some((base, _)) => pkg.method_index.entry(base).or_default().push(i),
                None => {
                    pkg.func_index.insert(f.name.clone(), i);
                }
            }
        }
        for (i, c) in pkg.constants.iter().enumerate() {
            pkg.const_index.insert(c.name.clone(), i);
        }
        for (i, v) in pkg.variables.iter().enumerate() {
            pkg.var_index.insert(v.name.clone(), i);
        }
        pkg
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.type_index.get(name).map(|&i| &self.types[i])
    }

    /// Top-level function (not a method) by name.
    pub fn lookup_function(&self, name: &str) -> Option<&Arc<FunctionInfo>> {
        self.func_index.get(name).map(|&i| &self.functions[i])
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&Arc<ConstantInfo>> {
        self.const_index.get(name).map(|&i| &self.constants[i])
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&Arc<VariableInfo>> {
        self.var_index.get(name).map(|&i| &self.variables[i])
    }

    /// Methods declared on `type_name` (either receiver form).
    pub fn methods_of(&self, type_name: &str) -> impl Iterator<Item = &Arc<FunctionInfo>> {
        self.method_index
            .get(type_name)
            .into_iter()
            .flatten()
            .map(|&i| &self.functions[i])
    }

    /// A single method by receiver base and name.
    pub fn method(&self, type_name: &str, method: &str) -> Option<&Arc<FunctionInfo>> {
        self.methods_of(type_name).find(|f| f.name == method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_type_display() {
        let t = Arc::new(FieldType::named("Person", "other", "example.com/m/other"));
        assert_eq!(t.to_string(), "example.com/m/other.Person");
        let p = Arc::new(FieldType::pointer(Arc::clone(&t)));
        assert_eq!(p.to_string(), "*example.com/m/other.Person");
        let s = Arc::new(FieldType::slice(Arc::clone(&p)));
        assert_eq!(s.to_string(), "[]*example.com/m/other.Person");
        let m = FieldType::map(Arc::new(FieldType::builtin("string")), s);
        assert_eq!(m.to_string(), "map[string][]*example.com/m/other.Person");
    }

    #[test]
    fn test_field_type_leaf_and_key() {
        let t = Arc::new(FieldType::named("T", "", "example.com/m/a"));
        let wrapped = Arc::new(FieldType::slice(Arc::new(FieldType::pointer(Arc::clone(
            &t,
        )))));
        assert_eq!(wrapped.leaf().name, "T");
        let ptr = Arc::new(FieldType::pointer(t));
        assert_eq!(ptr.type_key(), "*example.com/m/a.T");
    }

    #[test]
    fn test_field_type_resolution_cache_is_weak() {
        let ft = FieldType::named("T", "", "p");
        let info = Arc::new(TypeInfo::placeholder("p", "T"));
        ft.cache_definition(&info);
        assert!(ft.cached_definition().is_some());
        drop(info);
        assert!(ft.cached_definition().is_none());
    }

    #[test]
    fn test_func_sig_display() {
        let sig = FuncSigInfo {
            params: vec![ParamInfo {
                name: "n".to_string(),
                ty: Arc::new(FieldType::builtin("int")),
            }],
            results: vec![
                ParamInfo {
                    name: String::new(),
                    ty: Arc::new(FieldType::builtin("string")),
                },
                ParamInfo {
                    name: String::new(),
                    ty: Arc::new(FieldType::builtin("error")),
                },
            ],
            variadic: false,
        };
        assert_eq!(sig.to_string(), "func(int) (string, error)");
    }
}
