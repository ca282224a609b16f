//! The symbolic evaluator.
//!
//! One `Evaluator` walks AST nodes in an environment, producing an
//! [`Object`] per node. The walk is reachability-oriented: loops run
//! their bodies once over symbolic bindings, branches all execute, and
//! calls into out-of-policy packages return placeholders instead of
//! being walked.
//!
//! `eval()` dispatch is split across focused modules, the way the
//! statement/expression groups split naturally:
//!
//! - `expr`: literals, identifiers, operators
//! - `selector`: member access and method resolution
//! - `call`: calls, builtins, intrinsic dispatch, recursion guards
//! - `control`: if / for / range / switch / type switch / select
//! - `assign`: definitions, assignments, tuple unpacking
//! - `composite`: composite literals and conversions

mod assign;
mod call;
mod composite;
mod control;
mod expr;
mod selector;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use argus_scan::{
    build_import_lookup, ConstValue, ConstantInfo, FieldType, FunctionInfo, PackageInfo, Session,
    TypeInfo, TypeKind, VariableInfo,
};
use argus_syntax::ast;
use argus_syntax::Span;

use crate::env::Env;
use crate::intrinsics::IntrinsicRegistry;
use crate::object::{
    ErrorObj, FunctionObj, IntrinsicFn, Object, PackageObj, PlaceholderObj, TypeObj, VariableObj,
};
use crate::stack::CallStack;

/// Default bound on the evaluator call stack.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Per-file evaluation context: the file (arena owner), its package,
/// and the file's import lookup.
pub struct FileCtx {
    pub file: Arc<ast::File>,
    pub pkg: Arc<PackageInfo>,
    pub imports: FxHashMap<String, String>,
}

impl FileCtx {
    pub fn new(file: Arc<ast::File>, pkg: Arc<PackageInfo>) -> FileCtx {
        let imports = build_import_lookup(&file);
        FileCtx { file, pkg, imports }
    }

    pub(crate) fn position_of(&self, span: Span) -> String {
        self.file.position_of(span)
    }
}

pub struct Evaluator {
    session: Arc<Session>,
    intrinsics: IntrinsicRegistry,
    pub(crate) stack: CallStack,
    /// `(qualified name, argument inspection)` keys of calls currently
    /// on the stack; breaks same-signature infinite recursion.
    pub(crate) active_calls: RefCell<FxHashSet<String>>,
    /// Package import path → lazily populated package-level
    /// environment.
    pkg_envs: RefCell<FxHashMap<String, Env>>,
    warnings: RefCell<Vec<String>>,
    warned: RefCell<FxHashSet<String>>,
}

impl Evaluator {
    pub fn new(session: Arc<Session>) -> Evaluator {
        Evaluator::with_max_depth(session, DEFAULT_MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(session: Arc<Session>, max_depth: usize) -> Evaluator {
        Evaluator {
            session,
            intrinsics: IntrinsicRegistry::new(),
            stack: CallStack::new(max_depth),
            active_calls: RefCell::new(FxHashSet::default()),
            pkg_envs: RefCell::new(FxHashMap::default()),
            warnings: RefCell::new(Vec::new()),
            warned: RefCell::new(FxHashSet::default()),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // ------------------------------------------------------------------
    // Intrinsics surface

    pub fn register_intrinsic(
        &self,
        key: impl Into<String>,
        f: impl Fn(&Evaluator, &[Object]) -> Object + 'static,
    ) {
        self.intrinsics.register(key, Rc::new(f));
    }

    pub fn register_default_intrinsic(
        &self,
        f: impl Fn(&Evaluator, &[Object]) -> Object + 'static,
    ) {
        self.intrinsics.register_default(Rc::new(f));
    }

    pub fn push_intrinsics(&self) {
        self.intrinsics.push();
    }

    pub fn pop_intrinsics(&self) {
        self.intrinsics.pop();
    }

    pub(crate) fn intrinsic(&self, key: &str) -> Option<IntrinsicFn> {
        self.intrinsics.lookup(key)
    }

    /// Invoke the default intrinsic (if registered) with
    /// `(callee, args…)` for observation.
    pub(crate) fn observe_call(&self, callee: &Object, args: &[Object]) {
        if let Some(observer) = self.intrinsics.default_intrinsic() {
            let mut observed = Vec::with_capacity(args.len() + 1);
            observed.push(callee.clone());
            observed.extend_from_slice(args);
            let _ = observer(self, &observed);
        }
    }

    // ------------------------------------------------------------------
    // Warnings

    /// Log a warning once per `key`; duplicates are dropped.
    pub(crate) fn warn_once(&self, key: &str, message: String) {
        if !self.warned.borrow_mut().insert(key.to_string()) {
            return;
        }
        warn!("{message}");
        self.warnings.borrow_mut().push(message);
    }

    /// Drain and return the warnings accumulated during the walk.
    pub fn finalize(&self) -> Vec<String> {
        self.warned.borrow_mut().clear();
        std::mem::take(&mut *self.warnings.borrow_mut())
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Errors

    pub(crate) fn error_at(&self, ctx: &FileCtx, span: Span, message: impl Into<String>) -> Object {
        Object::Error(Rc::new(ErrorObj {
            message: message.into(),
            position: Some(ctx.position_of(span)),
            stack: self.stack.snapshot(),
        }))
    }

    // ------------------------------------------------------------------
    // Package environments and symbol materialization

    /// The lazily populated package-level environment for `pkg`.
    pub fn package_env(&self, pkg: &Arc<PackageInfo>) -> Env {
        if let Some(env) = self.pkg_envs.borrow().get(&pkg.import_path) {
            return env.clone();
        }
        let env = Env::new();
        self.pkg_envs
            .borrow_mut()
            .insert(pkg.import_path.clone(), env.clone());
        env
    }

    fn package_env_by_path(&self, path: &str) -> Env {
        if let Some(env) = self.pkg_envs.borrow().get(path) {
            return env.clone();
        }
        let env = Env::new();
        self.pkg_envs
            .borrow_mut()
            .insert(path.to_string(), env.clone());
        env
    }

    /// A `Package` object for an import path; its contents load on
    /// first member access.
    pub(crate) fn package_object(&self, path: &str) -> Object {
        Object::Package(Rc::new(PackageObj {
            path: path.to_string(),
            info: RefCell::new(None),
            env: self.package_env_by_path(path),
        }))
    }

    /// Materialize a package-level symbol as an object, memoized into
    /// the package env.
    pub(crate) fn package_member(&self, pkg: &Arc<PackageInfo>, name: &str) -> Option<Object> {
        let env = self.package_env(pkg);
        if let Some(obj) = env.get(name) {
            return Some(obj);
        }
        let obj = if let Some(func) = pkg.lookup_function(name) {
            self.resolve_function(pkg, func)
        } else if let Some(constant) = pkg.lookup_constant(name) {
            self.constant_object(constant)
        } else if let Some(variable) = pkg.lookup_variable(name) {
            self.variable_object(variable)
        } else if let Some(info) = pkg.lookup_type(name) {
            self.type_object(info)
        } else {
            return None;
        };
        env.set_local(name, obj.clone());
        Some(obj)
    }

    /// A full `Function` object when the package is in policy and the
    /// body survived scanning; a placeholder bound to the
    /// `FunctionInfo` otherwise.
    pub fn resolve_function(&self, pkg: &Arc<PackageInfo>, info: &Arc<FunctionInfo>) -> Object {
        if self.session.policy_allows(&pkg.import_path) && info.body.is_some() {
            return Object::Function(Rc::new(FunctionObj {
                name: info.name.clone(),
                info: Some(Arc::clone(info)),
                params: info.params.clone(),
                results: info.results.clone(),
                variadic: info.variadic,
                file: Arc::clone(&info.file),
                pkg: Arc::clone(pkg),
                body: info.body,
                env: self.package_env(pkg),
                receiver: None,
            }));
        }
        let mut placeholder = PlaceholderObj::new(format!(
            "function {} is out of policy or has no body",
            info.qualified_name()
        ));
        placeholder.underlying_function = Some(Arc::clone(info));
        Object::placeholder(placeholder)
    }

    pub(crate) fn constant_object(&self, constant: &Arc<ConstantInfo>) -> Object {
        match &constant.value {
            ConstValue::Int(v) => Object::Integer(*v),
            ConstValue::Float(v) => Object::Float(*v),
            ConstValue::Str(v) => Object::string(v.clone()),
            ConstValue::Bool(v) => Object::Boolean(*v),
            ConstValue::Unknown => {
                let mut placeholder =
                    PlaceholderObj::new(format!("constant {} has unknown value", constant.name));
                if let Some(ty) = &constant.ty {
                    placeholder.static_type = Some(Arc::clone(ty));
                }
                Object::placeholder(placeholder)
            }
        }
    }

    pub(crate) fn variable_object(&self, variable: &Arc<VariableInfo>) -> Object {
        let interface_typed = variable
            .ty
            .as_ref()
            .map(|ty| self.is_interface_type(ty))
            .unwrap_or(false);
        let mut initial = PlaceholderObj::new(format!("package variable {}", variable.name));
        if let Some(ty) = &variable.ty {
            initial.static_type = Some(Arc::clone(ty));
            let info = self.session.resolve_type(ty);
            if !info.unresolved {
                initial.type_info = Some(info);
            }
        }
        Object::Variable(Rc::new(VariableObj {
            name: variable.name.clone(),
            static_type: variable.ty.clone(),
            interface_typed,
            value: RefCell::new(Object::placeholder(initial)),
            possible_types: RefCell::new(FxHashSet::default()),
        }))
    }

    pub(crate) fn type_object(&self, info: &Arc<TypeInfo>) -> Object {
        let field_type = Arc::new(FieldType::named(
            info.name.clone(),
            "",
            info.pkg_path.clone(),
        ));
        field_type.cache_definition(info);
        Object::Type(Rc::new(TypeObj {
            field_type,
            info: Some(Arc::clone(info)),
        }))
    }

    pub(crate) fn is_interface_type(&self, ty: &Arc<FieldType>) -> bool {
        if ty.is_builtin() && ty.name == "any" {
            return true;
        }
        let info = self.session.resolve_type(ty);
        !info.unresolved && info.kind == TypeKind::Interface
    }

    // ------------------------------------------------------------------
    // Entry points

    /// Build a callable object for a scanned function.
    pub fn function_object(&self, info: &Arc<FunctionInfo>) -> Result<Object, argus_scan::ScanError> {
        let pkg = self.session.scan_package_by_import(&info.pkg_path)?;
        Ok(self.resolve_function(&pkg, info))
    }

    /// Apply a callable to arguments (the public entry used by tools).
    pub fn apply(&self, func: &Object, args: Vec<Object>) -> Object {
        self.observe_call(func, &args);
        self.apply_inner(func, args, None)
    }

    /// Convenience: scan `pkg_path`, look up a top-level function, and
    /// apply it to placeholder-free arguments.
    pub fn apply_named(&self, pkg_path: &str, name: &str) -> Object {
        let pkg = match self.session.scan_package_by_import(pkg_path) {
            Ok(pkg) => pkg,
            Err(err) => return Object::error_msg(err.to_string()),
        };
        let Some(info) = pkg.lookup_function(name) else {
            return Object::error_msg(format!("function {pkg_path}.{name} not found"));
        };
        let func = self.resolve_function(&pkg, info);
        self.apply(&func, Vec::new())
    }

    // ------------------------------------------------------------------
    // Statement dispatch

    pub fn eval_stmt(&self, ctx: &FileCtx, id: ast::StmtId, env: &Env) -> Object {
        let stmt = ctx.file.stmt(id);
        match &stmt.kind {
            ast::StmtKind::Bad | ast::StmtKind::Empty => Object::Nil,

            ast::StmtKind::Block(stmts) => {
                let child = env.enclosed();
                self.eval_block(ctx, stmts, &child)
            }

            ast::StmtKind::Expr(expr) => self.eval_expr(ctx, *expr, env),

            ast::StmtKind::Decl(decl) => self.eval_decl_stmt(ctx, decl, env),

            ast::StmtKind::Labeled { stmt, .. } => self.eval_stmt(ctx, *stmt, env),

            ast::StmtKind::Send { chan, value } => {
                let chan = self.eval_expr(ctx, *chan, env);
                if chan.is_error() {
                    return chan;
                }
                let value = self.eval_expr(ctx, *value, env);
                if value.is_error() {
                    return value;
                }
                Object::Nil
            }

            ast::StmtKind::IncDec { x, .. } => {
                let target = self.eval_expr(ctx, *x, env);
                if let Object::Variable(var) = &target {
                    let current = var.value.borrow().clone();
                    let next = match current {
                        Object::Integer(v) => Object::Integer(v.wrapping_add(1)),
                        other => other,
                    };
                    *var.value.borrow_mut() = next;
                }
                if target.is_error() {
                    target
                } else {
                    Object::Nil
                }
            }

            ast::StmtKind::Assign { lhs, op, rhs } => self.eval_assign(ctx, lhs, *op, rhs, env),

            // `go` / `defer`: evaluate the call immediately for its
            // argument side effects and tracing; scheduling is not
            // modeled.
            ast::StmtKind::Go(call) | ast::StmtKind::Defer(call) => {
                let result = self.eval_expr(ctx, *call, env);
                if result.is_error() {
                    result
                } else {
                    Object::Nil
                }
            }

            ast::StmtKind::Return(exprs) => self.eval_return(ctx, exprs, env),

            ast::StmtKind::Branch { kind, label } => {
                let label = label.as_ref().map(|l| l.name.clone());
                match kind {
                    ast::BranchKind::Break => Object::Break { label },
                    ast::BranchKind::Continue => Object::Continue { label },
                    // goto and fallthrough add nothing to a walk that
                    // already visits every statement once.
                    ast::BranchKind::Goto | ast::BranchKind::Fallthrough => Object::Nil,
                }
            }

            ast::StmtKind::If { .. }
            | ast::StmtKind::For { .. }
            | ast::StmtKind::Range { .. }
            | ast::StmtKind::Switch { .. }
            | ast::StmtKind::TypeSwitch { .. }
            | ast::StmtKind::Select { .. } => self.eval_control(ctx, id, env),

            ast::StmtKind::Case { .. } | ast::StmtKind::Comm { .. } => {
                // Only reachable through switch/select handling.
                Object::Nil
            }
        }
    }

    /// Evaluate statements in order; control-flow objects short-circuit.
    pub(crate) fn eval_block(&self, ctx: &FileCtx, stmts: &[ast::StmtId], env: &Env) -> Object {
        let mut last = Object::Nil;
        for &stmt in stmts {
            let result = self.eval_stmt(ctx, stmt, env);
            if result.is_control() {
                return result;
            }
            last = result;
        }
        last
    }

    fn eval_return(&self, ctx: &FileCtx, exprs: &[ast::ExprId], env: &Env) -> Object {
        match exprs.len() {
            0 => Object::Return(Rc::new(Object::Nil)),
            1 => {
                let value = self.eval_expr(ctx, exprs[0], env);
                if value.is_error() {
                    return value;
                }
                Object::Return(Rc::new(value.unwrap_value()))
            }
            _ => {
                let mut values = Vec::with_capacity(exprs.len());
                for &expr in exprs {
                    let value = self.eval_expr(ctx, expr, env);
                    if value.is_error() {
                        return value;
                    }
                    values.push(value.unwrap_value());
                }
                Object::Return(Rc::new(Object::MultiReturn(Rc::new(values))))
            }
        }
    }

    /// `const`/`var`/`type` declarations in statement position.
    fn eval_decl_stmt(&self, ctx: &FileCtx, decl: &ast::GenDecl, env: &Env) -> Object {
        match decl.kind {
            ast::DeclKind::Type | ast::DeclKind::Import => Object::Nil,
            ast::DeclKind::Const | ast::DeclKind::Var => {
                for spec in &decl.specs {
                    let ast::Spec::Value(value_spec) = spec else { continue };
                    let declared_ty = value_spec.ty.map(|ty| {
                        self.session
                            .type_info_from_expr(&ctx.file, ty, &[], &ctx.pkg.import_path)
                    });
                    for (i, name) in value_spec.names.iter().enumerate() {
                        let value = match value_spec.values.get(i) {
                            Some(&expr) => {
                                let v = self.eval_expr(ctx, expr, env);
                                if v.is_error() {
                                    return v;
                                }
                                v.unwrap_value()
                            }
                            None => match &declared_ty {
                                Some(ty) => self.zero_value(ty),
                                None => Object::Nil,
                            },
                        };
                        if name.is_blank() {
                            continue;
                        }
                        let var = self.new_variable(
                            name.name.clone(),
                            declared_ty.clone(),
                            value,
                        );
                        env.set_local(name.name.clone(), var);
                    }
                }
                Object::Nil
            }
        }
    }

    /// Fresh variable binding; records the initial value in the
    /// possible-types set when the static type is an interface.
    pub(crate) fn new_variable(
        &self,
        name: String,
        static_type: Option<Arc<FieldType>>,
        value: Object,
    ) -> Object {
        let interface_typed = static_type
            .as_ref()
            .map(|ty| self.is_interface_type(ty))
            .unwrap_or(false);
        let var = VariableObj {
            name,
            static_type,
            interface_typed,
            value: RefCell::new(value.unwrap_value()),
            possible_types: RefCell::new(FxHashSet::default()),
        };
        if var.interface_typed {
            if let Some(key) = var.value.borrow().type_key() {
                var.possible_types.borrow_mut().insert(key);
            }
        }
        Object::Variable(Rc::new(var))
    }

    /// A placeholder shaped like the zero value of `ty`.
    pub(crate) fn zero_value(&self, ty: &Arc<FieldType>) -> Object {
        let mut placeholder = PlaceholderObj::new("zero value").with_type(Arc::clone(ty));
        let info = self.session.resolve_type(ty);
        if !info.unresolved {
            placeholder.type_info = Some(info);
        }
        Object::placeholder(placeholder)
    }
}
