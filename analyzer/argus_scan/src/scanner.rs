//! Lifting parsed files into the entity model.
//!
//! This module is pure: it takes already-parsed files and produces a
//! [`PackageInfo`]. I/O, caching, and parallel parsing live in the
//! session.
//!
//! The scan runs in passes over exclusively-owned data and only then
//! freezes everything behind `Arc`:
//!
//! 1. package-name dominance over the parsed files
//! 2. type placeholders for every top-level type declaration
//! 3. type body fill (struct fields, interface sets, alias underlying)
//! 4. functions, constants (iota groups), variables
//! 5. constant evaluation (cycle-guarded, panic-guarded)
//! 6. enum linking

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use argus_syntax::ast::{
    self, Decl, DeclKind, ExprKind, Field, FuncType, InterfaceElem, Spec, UnaryOp,
};

use crate::consteval::{evaluate_constants, PendingConst};
use crate::entity::{
    ConstValue, ConstantInfo, FieldInfo, FieldType, FuncSigInfo, FunctionInfo, InterfaceInfo,
    MethodSpec, PackageInfo, ParamInfo, StructInfo, TypeInfo, TypeKind, TypeParamInfo, UnionTerm,
    VariableInfo,
};
use crate::error::ScanError;

/// Predeclared type names of the universe scope.
const BUILTIN_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr",
];

pub(crate) fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Context for lifting type expressions in one file.
pub(crate) struct LiftCtx<'a> {
    pub pkg_path: &'a str,
    /// Local import name → canonical import path.
    pub imports: &'a FxHashMap<String, String>,
    /// Generic type parameter names currently in scope.
    pub type_params: Vec<String>,
}

/// Map each import's local name to its path. Named imports win; the
/// default local name is the last path segment. Blank imports are
/// skipped, dot imports keyed under `.`.
pub fn build_import_lookup(file: &ast::File) -> FxHashMap<String, String> {
    let mut lookup = FxHashMap::default();
    for import in &file.imports {
        let local = match &import.name {
            Some(name) if name.is_blank() => continue,
            Some(name) => name.name.clone(),
            None => import
                .path
                .rsplit('/')
                .next()
                .unwrap_or(import.path.as_str())
                .to_string(),
        };
        lookup.insert(local, import.path.clone());
    }
    lookup
}

/// Lift a syntactic type expression to the [`FieldType`] IR.
pub(crate) fn type_info_from_expr(
    file: &ast::File,
    id: ast::ExprId,
    ctx: &LiftCtx<'_>,
) -> Arc<FieldType> {
    match &file.expr(id).kind {
        ExprKind::Ident(name) => Arc::new(lift_ident(name, ctx)),
        ExprKind::Paren(inner) => type_info_from_expr(file, *inner, ctx),
        ExprKind::Selector { x, sel } => {
            let pkg_name = match &file.expr(*x).kind {
                ExprKind::Ident(name) => name.clone(),
                _ => String::new(),
            };
            let full = ctx.imports.get(&pkg_name).cloned().unwrap_or_default();
            Arc::new(FieldType::named(sel.name.clone(), pkg_name, full))
        }
        ExprKind::Star(inner) => Arc::new(FieldType::pointer(type_info_from_expr(
            file, *inner, ctx,
        ))),
        ExprKind::ArrayType { len, elem } => {
            let elem_ty = type_info_from_expr(file, *elem, ctx);
            match len {
                None => Arc::new(FieldType::slice(elem_ty)),
                Some(len) => {
                    let text = match &file.expr(*len).kind {
                        ExprKind::BasicLit { value, .. } => Some(value.clone()),
                        ExprKind::Ident(name) => Some(name.clone()),
                        _ => None,
                    };
                    Arc::new(FieldType::array(elem_ty, text))
                }
            }
        }
        ExprKind::MapType { key, value } => Arc::new(FieldType::map(
            type_info_from_expr(file, *key, ctx),
            type_info_from_expr(file, *value, ctx),
        )),
        ExprKind::ChanType { elem, .. } => {
            Arc::new(FieldType::chan(type_info_from_expr(file, *elem, ctx)))
        }
        ExprKind::Ellipsis { elem } => match elem {
            Some(elem) => Arc::new(FieldType::variadic(type_info_from_expr(file, *elem, ctx))),
            None => Arc::new(FieldType::opaque("...")),
        },
        ExprKind::FuncType(sig) => Arc::new(FieldType::func(lift_signature(file, sig, ctx))),
        ExprKind::Index { x, indices } => {
            let base = type_info_from_expr(file, *x, ctx);
            let args = indices
                .iter()
                .map(|&arg| type_info_from_expr(file, arg, ctx))
                .collect();
            // Rebuild the base with arguments attached; the base is a
            // fresh Arc from this walk, never shared.
            let base = FieldType::named(
                base.name.clone(),
                base.pkg_name.clone(),
                base.full_import_path.clone(),
            );
            Arc::new(FieldType::instantiated(base, args))
        }
        ExprKind::Unary {
            op: UnaryOp::Tilde,
            x,
        } => Arc::new(FieldType::tilde(type_info_from_expr(file, *x, ctx))),
        ExprKind::Binary { x, y, .. } => {
            // `A | B` union in constraint position.
            let mut terms = Vec::new();
            flatten_union(file, *x, ctx, &mut terms);
            flatten_union(file, *y, ctx, &mut terms);
            Arc::new(FieldType::union(terms))
        }
        ExprKind::StructType { .. } => Arc::new(FieldType::opaque("struct{}")),
        ExprKind::InterfaceType { elems } if elems.is_empty() => {
            Arc::new(FieldType::builtin("any"))
        }
        ExprKind::InterfaceType { .. } => Arc::new(FieldType::opaque("interface{}")),
        _ => Arc::new(FieldType::opaque("")),
    }
}

fn lift_ident(name: &str, ctx: &LiftCtx<'_>) -> FieldType {
    if ctx.type_params.iter().any(|p| p == name) {
        FieldType::type_param(name)
    } else if is_builtin_type(name) {
        FieldType::builtin(name)
    } else {
        FieldType::named(name, "", ctx.pkg_path)
    }
}

fn flatten_union(
    file: &ast::File,
    id: ast::ExprId,
    ctx: &LiftCtx<'_>,
    out: &mut Vec<Arc<FieldType>>,
) {
    if let ExprKind::Binary { x, y, .. } = &file.expr(id).kind {
        flatten_union(file, *x, ctx, out);
        flatten_union(file, *y, ctx, out);
        return;
    }
    out.push(type_info_from_expr(file, id, ctx));
}

/// Lift a syntactic signature to [`FuncSigInfo`].
pub(crate) fn lift_signature(
    file: &ast::File,
    sig: &FuncType,
    ctx: &LiftCtx<'_>,
) -> FuncSigInfo {
    let params = lift_field_list(file, &sig.params, ctx);
    let results = lift_field_list(file, &sig.results, ctx);
    let variadic = params.last().is_some_and(|p| p.ty.is_variadic());
    FuncSigInfo {
        params,
        results,
        variadic,
    }
}

fn lift_field_list(file: &ast::File, fields: &[Field], ctx: &LiftCtx<'_>) -> Vec<ParamInfo> {
    let mut out = Vec::new();
    for field in fields {
        let ty = type_info_from_expr(file, field.ty, ctx);
        if field.names.is_empty() {
            out.push(ParamInfo {
                name: String::new(),
                ty,
            });
        } else {
            for name in &field.names {
                out.push(ParamInfo {
                    name: name.name.clone(),
                    ty: Arc::clone(&ty),
                });
            }
        }
    }
    out
}

fn lift_type_params(
    file: &ast::File,
    fields: &[Field],
    ctx: &mut LiftCtx<'_>,
) -> Vec<TypeParamInfo> {
    // Names enter scope before constraints are lifted so that
    // `[S ~[]E, E any]` sees `E` as a parameter.
    for field in fields {
        for name in &field.names {
            ctx.type_params.push(name.name.clone());
        }
    }
    let mut out = Vec::new();
    for field in fields {
        let constraint = Some(type_info_from_expr(file, field.ty, ctx));
        for name in &field.names {
            out.push(TypeParamInfo {
                name: name.name.clone(),
                constraint: constraint.clone(),
            });
        }
    }
    out
}

// ----------------------------------------------------------------------
// Package-name dominance

/// Resolve the package's short name across files, per the dominance
/// rules: `main` loses to any other name, and `X_test` folds into `X`.
/// Returns the winning name and the indexes of the files to keep.
fn dominant_package_name(
    dir: &PathBuf,
    files: &[Arc<ast::File>],
) -> Result<(String, Vec<usize>), ScanError> {
    let mut names: Vec<&str> = files.iter().map(|f| f.package.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    if names.len() == 1 {
        return Ok((names[0].to_string(), (0..files.len()).collect()));
    }

    let bases: FxHashSet<&str> = names
        .iter()
        .map(|n| n.strip_suffix("_test").unwrap_or(n))
        .collect();

    let winner = if bases.len() == 1 {
        // {X, X_test} folds under X.
        bases.iter().next().map(|s| (*s).to_string())
    } else {
        // Ignore `main` when another name exists.
        let non_main: Vec<&&str> = bases.iter().filter(|b| **b != "main").collect();
        if non_main.len() == 1 {
            Some((*non_main[0]).to_string())
        } else {
            None
        }
    };

    let Some(winner) = winner else {
        return Err(ScanError::MismatchedPackageNames {
            dir: dir.clone(),
            names: names.iter().map(|s| (*s).to_string()).collect(),
        });
    };

    let kept = files
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            let name = f.package.name.as_str();
            name == winner || name.strip_suffix("_test") == Some(winner.as_str())
        })
        .map(|(i, _)| i)
        .collect();
    Ok((winner, kept))
}

// ----------------------------------------------------------------------
// Assembly

/// Build a [`PackageInfo`] from parsed files (scan steps 2–7).
pub(crate) fn assemble_package(
    import_path: &str,
    dir: PathBuf,
    files: Vec<Arc<ast::File>>,
    declarations_only: bool,
) -> Result<PackageInfo, ScanError> {
    let (pkg_name, kept) = dominant_package_name(&dir, &files)?;
    let files: Vec<Arc<ast::File>> = kept.into_iter().map(|i| Arc::clone(&files[i])).collect();
    let file_paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
    debug!(import_path, name = %pkg_name, files = files.len(), "assembling package");

    let import_lookups: Vec<FxHashMap<String, String>> =
        files.iter().map(|f| build_import_lookup(f)).collect();

    // Pass 1: placeholders for every top-level type declaration.
    let mut types: Vec<TypeInfo> = Vec::new();
    let mut type_index: FxHashMap<String, usize> = FxHashMap::default();
    // (file index, spec) pairs for the fill pass.
    let mut type_specs: Vec<(usize, ast::TypeSpec)> = Vec::new();

    for (file_index, file) in files.iter().enumerate() {
        for decl in &file.decls {
            let Decl::Gen(gen) = decl else { continue };
            if gen.kind != DeclKind::Type {
                continue;
            }
            for spec in &gen.specs {
                let Spec::Type(type_spec) = spec else { continue };
                let mut info = TypeInfo::placeholder(import_path, type_spec.name.name.clone());
                info.doc = type_spec.doc.clone().or_else(|| gen.doc.clone());
                info.file = Some(file.path.clone());
                info.decl_span = type_spec.span;
                info.unresolved = false;
                type_index.insert(type_spec.name.name.clone(), types.len());
                types.push(info);
                type_specs.push((file_index, type_spec.clone()));
            }
        }
    }

    // Pass 2: fill type bodies.
    for (spec_pos, (file_index, spec)) in type_specs.iter().enumerate() {
        let file = &files[*file_index];
        let mut ctx = LiftCtx {
            pkg_path: import_path,
            imports: &import_lookups[*file_index],
            type_params: Vec::new(),
        };
        let type_params = lift_type_params(file, &spec.type_params, &mut ctx);
        let info = &mut types[spec_pos];
        info.type_params = type_params;
        info.is_alias = spec.assign;
        fill_type_body(file, spec, info, &ctx);
    }

    // Pass 3: functions, constants, variables.
    let mut functions: Vec<FunctionInfo> = Vec::new();
    let mut variables: Vec<VariableInfo> = Vec::new();
    let mut pending_consts: Vec<PendingConst> = Vec::new();
    // Parallel to `pending_consts`: everything needed to build the
    // final ConstantInfo once values are known.
    struct ConstMeta {
        doc: Option<String>,
        ty: Option<Arc<FieldType>>,
        exported: bool,
        span: argus_syntax::Span,
        iota: Option<i64>,
    }
    let mut const_meta: Vec<ConstMeta> = Vec::new();

    for (file_index, file) in files.iter().enumerate() {
        let imports = &import_lookups[file_index];
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => {
                    let mut ctx = LiftCtx {
                        pkg_path: import_path,
                        imports,
                        type_params: Vec::new(),
                    };
                    functions.push(lift_function(
                        file,
                        Arc::clone(&files[file_index]),
                        func,
                        import_path,
                        declarations_only,
                        &mut ctx,
                    ));
                }
                Decl::Gen(gen) => match gen.kind {
                    DeclKind::Const => {
                        let ctx = LiftCtx {
                            pkg_path: import_path,
                            imports,
                            type_params: Vec::new(),
                        };
                        let mut inherited_ty: Option<Arc<FieldType>> = None;
                        let mut inherited_values: Vec<ast::ExprId> = Vec::new();
                        for (spec_index, spec) in gen.specs.iter().enumerate() {
                            let Spec::Value(value_spec) = spec else { continue };
                            if !value_spec.values.is_empty() || value_spec.ty.is_some() {
                                inherited_ty = value_spec
                                    .ty
                                    .map(|ty| type_info_from_expr(file, ty, &ctx));
                                inherited_values = value_spec.values.clone();
                            }
                            for (i, name) in value_spec.names.iter().enumerate() {
                                pending_consts.push(PendingConst {
                                    name: name.name.clone(),
                                    file: Arc::clone(&files[file_index]),
                                    expr: inherited_values.get(i).copied(),
                                    iota: Some(spec_index as i64),
                                    value: None,
                                });
                                const_meta.push(ConstMeta {
                                    doc: value_spec.doc.clone().or_else(|| gen.doc.clone()),
                                    ty: inherited_ty.clone(),
                                    exported: name.is_exported(),
                                    span: value_spec.span,
                                    iota: Some(spec_index as i64),
                                });
                            }
                        }
                    }
                    DeclKind::Var => {
                        let ctx = LiftCtx {
                            pkg_path: import_path,
                            imports,
                            type_params: Vec::new(),
                        };
                        for spec in &gen.specs {
                            let Spec::Value(value_spec) = spec else { continue };
                            let ty = value_spec
                                .ty
                                .map(|ty| type_info_from_expr(file, ty, &ctx));
                            for (i, name) in value_spec.names.iter().enumerate() {
                                variables.push(VariableInfo {
                                    pkg_path: import_path.to_string(),
                                    name: name.name.clone(),
                                    doc: value_spec.doc.clone().or_else(|| gen.doc.clone()),
                                    ty: ty.clone(),
                                    init: value_spec
                                        .values
                                        .get(i)
                                        .map(|&e| (Arc::clone(&files[file_index]), e)),
                                    exported: name.is_exported(),
                                    decl_span: value_spec.span,
                                });
                            }
                        }
                    }
                    DeclKind::Type | DeclKind::Import => {}
                },
            }
        }
    }

    // Pass 4: constant evaluation.
    evaluate_constants(&mut pending_consts);

    let mut constants: Vec<ConstantInfo> = pending_consts
        .into_iter()
        .zip(const_meta)
        .map(|(pending, meta)| ConstantInfo {
            pkg_path: import_path.to_string(),
            name: pending.name,
            doc: meta.doc,
            ty: meta.ty,
            value: pending.value.unwrap_or(ConstValue::Unknown),
            iota: meta.iota,
            enum_of: None,
            exported: meta.exported,
            decl_span: meta.span,
        })
        .collect();

    // Pass 5: enum linking. A constant whose declared type is a named
    // type of this package becomes a member of that type.
    let mut members_by_type: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (const_pos, constant) in constants.iter_mut().enumerate() {
        let Some(ty) = &constant.ty else { continue };
        if ty.full_import_path != import_path || ty.name.is_empty() {
            continue;
        }
        if let Some(&type_pos) = type_index.get(&ty.name) {
            constant.enum_of = Some(ty.name.clone());
            members_by_type.entry(type_pos).or_default().push(const_pos);
        }
    }

    // Freeze constants, then attach members while types are still
    // exclusively owned.
    let constants: Vec<Arc<ConstantInfo>> = constants.into_iter().map(Arc::new).collect();
    for (type_pos, member_positions) in members_by_type {
        let info = &mut types[type_pos];
        info.is_enum = true;
        for pos in member_positions {
            info.enum_members.push(Arc::clone(&constants[pos]));
        }
    }

    Ok(PackageInfo::assemble(
        import_path.to_string(),
        pkg_name,
        dir,
        file_paths,
        files,
        types.into_iter().map(Arc::new).collect(),
        functions.into_iter().map(Arc::new).collect(),
        constants,
        variables.into_iter().map(Arc::new).collect(),
    ))
}

fn fill_type_body(file: &ast::File, spec: &ast::TypeSpec, info: &mut TypeInfo, ctx: &LiftCtx<'_>) {
    match &file.expr(spec.ty).kind {
        ExprKind::StructType { fields } => {
            info.kind = TypeKind::Struct;
            info.struct_info = Some(lift_struct(file, fields, ctx));
        }
        ExprKind::InterfaceType { elems } => {
            info.kind = TypeKind::Interface;
            info.interface_info = Some(lift_interface(file, elems, ctx));
        }
        ExprKind::FuncType(sig) => {
            info.kind = TypeKind::Func;
            info.func_sig = Some(lift_signature(file, sig, ctx));
        }
        _ => {
            info.kind = TypeKind::Alias;
            info.underlying = Some(type_info_from_expr(file, spec.ty, ctx));
        }
    }
}

fn lift_struct(file: &ast::File, fields: &[Field], ctx: &LiftCtx<'_>) -> StructInfo {
    let mut out = StructInfo::default();
    for field in fields {
        let ty = type_info_from_expr(file, field.ty, ctx);
        if field.names.is_empty() {
            let name = ty.leaf().name.clone();
            out.fields.push(FieldInfo {
                name,
                ty,
                embedded: true,
                tag: field.tag.clone(),
                doc: field.doc.clone(),
            });
        } else {
            for name in &field.names {
                out.fields.push(FieldInfo {
                    name: name.name.clone(),
                    ty: Arc::clone(&ty),
                    embedded: false,
                    tag: field.tag.clone(),
                    doc: field.doc.clone(),
                });
            }
        }
    }
    out
}

fn lift_interface(file: &ast::File, elems: &[InterfaceElem], ctx: &LiftCtx<'_>) -> InterfaceInfo {
    let mut out = InterfaceInfo::default();

    // A `|` (or `~`) in a non-method position makes this a type-set
    // interface: every non-method term becomes a union entry.
    let type_set = elems.iter().any(|e| {
        matches!(e, InterfaceElem::Embedded { ty } if matches!(
            file.expr(*ty).kind,
            ExprKind::Binary { .. } | ExprKind::Unary { op: UnaryOp::Tilde, .. }
        ))
    });

    for elem in elems {
        match elem {
            InterfaceElem::Method { doc, name, sig } => {
                out.methods.push(MethodSpec {
                    name: name.name.clone(),
                    doc: doc.clone(),
                    sig: lift_signature(file, sig, ctx),
                });
            }
            InterfaceElem::Embedded { ty } => {
                if type_set {
                    let lifted = type_info_from_expr(file, *ty, ctx);
                    push_union_terms(&lifted, &mut out.unions);
                } else {
                    out.embedded.push(type_info_from_expr(file, *ty, ctx));
                }
            }
        }
    }
    out
}

fn push_union_terms(lifted: &Arc<FieldType>, out: &mut Vec<UnionTerm>) {
    use crate::entity::TypeFlags;
    if lifted.flags.contains(TypeFlags::TILDE) {
        if let Some(elem) = &lifted.elem {
            out.push(UnionTerm {
                ty: Arc::clone(elem),
                tilde: true,
            });
        }
        return;
    }
    if lifted.flags.contains(TypeFlags::CONSTRAINT) {
        for term in &lifted.type_args {
            push_union_terms(term, out);
        }
        return;
    }
    out.push(UnionTerm {
        ty: Arc::clone(lifted),
        tilde: false,
    });
}

fn lift_function(
    file: &ast::File,
    file_arc: Arc<ast::File>,
    func: &ast::FuncDecl,
    pkg_path: &str,
    declarations_only: bool,
    ctx: &mut LiftCtx<'_>,
) -> FunctionInfo {
    // Receiver type arguments (`func (l *List[T]) …`) introduce type
    // parameters for the whole declaration.
    if let Some(recv) = &func.recv {
        collect_receiver_type_params(file, recv.ty, &mut ctx.type_params);
    }
    let type_params = lift_type_params(file, &func.sig.type_params, ctx);

    let receiver = func.recv.as_ref().map(|recv| ParamInfo {
        name: recv
            .names
            .first()
            .map(|n| n.name.clone())
            .unwrap_or_default(),
        ty: type_info_from_expr(file, recv.ty, ctx),
    });

    let sig = lift_signature(file, &func.sig, ctx);
    let body = if declarations_only { None } else { func.body };

    FunctionInfo {
        pkg_path: pkg_path.to_string(),
        name: func.name.name.clone(),
        doc: func.doc.clone(),
        receiver,
        type_params,
        params: sig.params,
        results: sig.results,
        variadic: sig.variadic,
        file: file_arc,
        body,
        decl_span: func.span,
    }
}

fn collect_receiver_type_params(file: &ast::File, ty: ast::ExprId, out: &mut Vec<String>) {
    match &file.expr(ty).kind {
        ExprKind::Star(inner) | ExprKind::Paren(inner) => {
            collect_receiver_type_params(file, *inner, out);
        }
        ExprKind::Index { indices, .. } => {
            for &index in indices {
                if let ExprKind::Ident(name) = &file.expr(index).kind {
                    out.push(name.clone());
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan_one(src: &str) -> PackageInfo {
        let file = Arc::new(argus_syntax::parse_file("/m/p/a.go", src).unwrap());
        assemble_package("example.com/m/p", PathBuf::from("/m/p"), vec![file], false).unwrap()
    }

    #[test]
    fn test_struct_type_lift() {
        let pkg = scan_one(
            "package p\n\nimport \"example.com/m/other\"\n\n// User is a user.\ntype User struct {\n\t*Base\n\tName string\n\tFriend *other.User\n}\n",
        );
        let user = pkg.lookup_type("User").unwrap();
        assert_eq!(user.kind, TypeKind::Struct);
        assert_eq!(user.doc.as_deref(), Some("User is a user."));
        let fields = &user.struct_info.as_ref().unwrap().fields;
        assert_eq!(fields.len(), 3);
        assert!(fields[0].embedded);
        assert_eq!(fields[0].name, "Base");
        assert_eq!(fields[2].ty.to_string(), "*example.com/m/other.User");
        assert_eq!(
            fields[2].ty.leaf().full_import_path,
            "example.com/m/other"
        );
    }

    #[test]
    fn test_interface_lift_methods_and_embedded() {
        let pkg = scan_one(
            "package p\n\nimport \"io\"\n\ntype Walker interface {\n\tio.Reader\n\tWalk(dir string) error\n}\n",
        );
        let walker = pkg.lookup_type("Walker").unwrap();
        assert_eq!(walker.kind, TypeKind::Interface);
        let iface = walker.interface_info.as_ref().unwrap();
        assert_eq!(iface.methods.len(), 1);
        assert_eq!(iface.methods[0].name, "Walk");
        assert_eq!(iface.embedded.len(), 1);
        assert!(iface.unions.is_empty());
    }

    #[test]
    fn test_interface_union_lift() {
        let pkg = scan_one(
            "package p\n\ntype Number interface {\n\t~int | float64\n}\n",
        );
        let number = pkg.lookup_type("Number").unwrap();
        let iface = number.interface_info.as_ref().unwrap();
        assert!(iface.embedded.is_empty(), "unions must not land in embedded");
        assert_eq!(iface.unions.len(), 2);
        assert!(iface.unions[0].tilde);
        assert_eq!(iface.unions[0].ty.name, "int");
        assert!(!iface.unions[1].tilde);
    }

    #[test]
    fn test_enum_linking() {
        let pkg = scan_one(
            "package p\n\ntype Color int\n\nconst (\n\tRed Color = iota\n\tGreen\n\tBlue\n)\n",
        );
        let color = pkg.lookup_type("Color").unwrap();
        assert!(color.is_enum);
        assert_eq!(color.enum_members.len(), 3);
        let values: Vec<_> = color
            .enum_members
            .iter()
            .map(|m| (m.iota, m.value.clone()))
            .collect();
        assert_eq!(
            values,
            vec![
                (Some(0), ConstValue::Int(0)),
                (Some(1), ConstValue::Int(1)),
                (Some(2), ConstValue::Int(2)),
            ]
        );
        assert_eq!(
            pkg.lookup_constant("Green").unwrap().enum_of.as_deref(),
            Some("Color")
        );
    }

    #[test]
    fn test_methods_indexed_by_receiver_base() {
        let pkg = scan_one(
            "package p\n\ntype Person struct{ Name string }\n\nfunc (p Person) Greet() string { return p.Name }\n\nfunc (p *Person) Rename(n string) { p.Name = n }\n\nfunc Top() {}\n",
        );
        assert!(pkg.lookup_function("Top").is_some());
        assert!(pkg.lookup_function("Greet").is_none(), "methods are not top-level");
        let methods: Vec<_> = pkg.methods_of("Person").map(|m| m.name.clone()).collect();
        assert_eq!(methods, vec!["Greet", "Rename"]);
        let rename = pkg.method("Person", "Rename").unwrap();
        assert_eq!(rename.receiver_base(), Some(("Person".to_string(), true)));
        assert_eq!(
            rename.qualified_name(),
            "(*example.com/m/p.Person).Rename"
        );
    }

    #[test]
    fn test_self_referential_type_scans() {
        let pkg = scan_one("package p\n\ntype T []*T\n");
        let t = pkg.lookup_type("T").unwrap();
        assert_eq!(t.kind, TypeKind::Alias);
        let underlying = t.underlying.as_ref().unwrap();
        // []*T — rendering terminates.
        assert_eq!(underlying.to_string(), "[]*example.com/m/p.T");
        assert_eq!(underlying.leaf().name, "T");
    }

    #[test]
    fn test_generic_type_params_in_scope() {
        let pkg = scan_one(
            "package p\n\ntype List[T any] struct {\n\titems []T\n}\n\nfunc (l *List[T]) Push(v T) {}\n",
        );
        let list = pkg.lookup_type("List").unwrap();
        assert_eq!(list.type_params.len(), 1);
        let items = &list.struct_info.as_ref().unwrap().fields[0];
        use crate::entity::TypeFlags;
        assert!(items.ty.leaf().flags.contains(TypeFlags::TYPE_PARAM));
        let push = pkg.method("List", "Push").unwrap();
        assert!(push.params[0].ty.flags.contains(TypeFlags::TYPE_PARAM));
    }

    #[test]
    fn test_package_name_dominance() {
        let a = Arc::new(argus_syntax::parse_file("/d/a.go", "package demo\n").unwrap());
        let b =
            Arc::new(argus_syntax::parse_file("/d/a_test.go", "package demo_test\n").unwrap());
        let main = Arc::new(argus_syntax::parse_file("/d/gen.go", "package main\n").unwrap());
        let pkg = assemble_package(
            "example.com/demo",
            PathBuf::from("/d"),
            vec![a, b, main],
            false,
        )
        .unwrap();
        assert_eq!(pkg.name, "demo");
        assert_eq!(pkg.files.len(), 2, "main file is dropped");

        let x = Arc::new(argus_syntax::parse_file("/d/x.go", "package x\n").unwrap());
        let y = Arc::new(argus_syntax::parse_file("/d/y.go", "package y\n").unwrap());
        let err =
            assemble_package("example.com/d", PathBuf::from("/d"), vec![x, y], false).unwrap_err();
        assert!(matches!(err, ScanError::MismatchedPackageNames { .. }));
    }

    #[test]
    fn test_declarations_only_clears_bodies() {
        let file = Arc::new(
            argus_syntax::parse_file("/m/p/a.go", "package p\n\nfunc F() int { return 1 }\n")
                .unwrap(),
        );
        let pkg = assemble_package("example.com/m/p", PathBuf::from("/m/p"), vec![file], true)
            .unwrap();
        assert!(pkg.lookup_function("F").unwrap().body.is_none());
    }

    #[test]
    fn test_import_lookup_naming() {
        let file = Arc::new(
            argus_syntax::parse_file(
                "a.go",
                "package p\n\nimport (\n\t\"fmt\"\n\tr \"example.com/x/renamed\"\n\t_ \"embed\"\n)\n",
            )
            .unwrap(),
        );
        let lookup = build_import_lookup(&file);
        assert_eq!(lookup.get("fmt").map(String::as_str), Some("fmt"));
        assert_eq!(
            lookup.get("r").map(String::as_str),
            Some("example.com/x/renamed")
        );
        assert!(!lookup.contains_key("_"));
    }
}
