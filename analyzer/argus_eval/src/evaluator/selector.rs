//! Selector evaluation: package members, method resolution, field
//! access, interface dispatch.

use std::rc::Rc;
use std::sync::Arc;

use argus_scan::{
    find_method, interface_method, FunctionInfo, MethodLookup, TypeInfo, TypeKind,
};
use argus_syntax::ast::{self, Ident};
use argus_syntax::Span;

use crate::env::Env;
use crate::object::{FunctionObj, Object, PlaceholderObj};

use super::{Evaluator, FileCtx};

impl Evaluator {
    pub(crate) fn eval_selector(
        &self,
        ctx: &FileCtx,
        x: ast::ExprId,
        sel: &Ident,
        span: Span,
        env: &Env,
    ) -> Object {
        let base = self.eval_expr(ctx, x, env);
        match &base {
            Object::Error(_) => base,
            Object::Package(pkg_obj) => self.package_selector(ctx, pkg_obj, sel, span),
            _ => self.member_access(ctx, base.clone(), sel, span),
        }
    }

    // ------------------------------------------------------------------
    // Package members

    fn package_selector(
        &self,
        ctx: &FileCtx,
        pkg_obj: &Rc<crate::object::PackageObj>,
        sel: &Ident,
        span: Span,
    ) -> Object {
        // Intrinsic keys shadow scanned symbols.
        let key = format!("{}.{}", pkg_obj.path, sel.name);
        if let Some(intrinsic) = self.intrinsic(&key) {
            return Object::Intrinsic(intrinsic);
        }

        // Load the package lazily. This scans even out-of-policy
        // packages: declarations must be visible for signatures and
        // placeholders; the policy only gates body walking (an
        // intentional bypass).
        let info = {
            let cached = pkg_obj.info.borrow().clone();
            match cached {
                Some(info) => info,
                None => match self.session().scan_package_by_import(&pkg_obj.path) {
                    Ok(info) => {
                        *pkg_obj.info.borrow_mut() = Some(Arc::clone(&info));
                        info
                    }
                    Err(err) => {
                        self.warn_once(
                            &key,
                            format!("package {} could not be scanned: {err}", pkg_obj.path),
                        );
                        return Object::placeholder(PlaceholderObj::new(format!(
                            "member {} of unscannable package {}",
                            sel.name, pkg_obj.path
                        )));
                    }
                },
            }
        };

        if !sel.is_exported() {
            return self.error_at(
                ctx,
                span,
                format!("cannot refer to unexported name {}.{}", pkg_obj.path, sel.name),
            );
        }
        match self.package_member(&info, &sel.name) {
            Some(obj) => obj,
            None => self.error_at(
                ctx,
                span,
                format!("undefined: {}.{}", pkg_obj.path, sel.name),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Instance / variable / placeholder members

    fn member_access(&self, ctx: &FileCtx, base: Object, sel: &Ident, span: Span) -> Object {
        match base.clone() {
            Object::Variable(var) => {
                if var.interface_typed {
                    if let Some(static_type) = &var.static_type {
                        let info = self.session().resolve_type(static_type);
                        if !info.unresolved && info.kind == TypeKind::Interface {
                            let possible: Vec<String> =
                                var.possible_types.borrow().iter().cloned().collect();
                            return self.interface_member(ctx, &info, sel, span, base, possible);
                        }
                    }
                }
                let inner = var.value.borrow().clone();
                self.member_on_value(ctx, base, inner, sel, span, true)
            }
            Object::Pointer(p) => {
                let inner = p.pointee.borrow().clone();
                self.member_on_value(ctx, base, inner, sel, span, true)
            }
            inner => self.member_on_value(ctx, base, inner, sel, span, false),
        }
    }

    /// `receiver` is the original object (kept for binding and field
    /// routing); `value` is the unwrapped payload being selected on.
    fn member_on_value(
        &self,
        ctx: &FileCtx,
        receiver: Object,
        value: Object,
        sel: &Ident,
        span: Span,
        addressable: bool,
    ) -> Object {
        match value {
            Object::Instance(inst) => self.concrete_member(
                ctx,
                receiver,
                Arc::clone(&inst.type_info),
                sel,
                span,
                addressable,
            ),
            Object::Pointer(p) => {
                let inner = p.pointee.borrow().clone();
                self.member_on_value(ctx, receiver, inner, sel, span, true)
            }
            Object::Variable(v) => {
                let inner = v.value.borrow().clone();
                self.member_on_value(ctx, receiver, inner, sel, span, true)
            }
            Object::Placeholder(p) => {
                if let Some(info) = &p.type_info {
                    if info.kind == TypeKind::Interface {
                        let possible = p.possible_concrete_types.clone();
                        return self.interface_member(ctx, info, sel, span, receiver, possible);
                    }
                    if !info.unresolved {
                        // Symbolic values are treated as addressable:
                        // the analysis must not drop pointer-receiver
                        // methods it cannot rule out.
                        return self.concrete_member(
                            ctx,
                            receiver,
                            Arc::clone(info),
                            sel,
                            span,
                            true,
                        );
                    }
                }
                let reason = format!(
                    "member {} of symbolic value ({})",
                    sel.name, p.reason
                );
                self.warn_once(&reason, reason.clone());
                Object::placeholder(PlaceholderObj::new(reason).with_origin(receiver))
            }
            Object::Type(t) => {
                // Method expression `T.Method`.
                match &t.info {
                    Some(info) => self.concrete_member(
                        ctx,
                        Object::Type(Rc::clone(&t)),
                        Arc::clone(info),
                        sel,
                        span,
                        true,
                    ),
                    None => self.error_at(
                        ctx,
                        span,
                        format!("no method {} on builtin type {}", sel.name, t.field_type),
                    ),
                }
            }
            Object::Error(e) => Object::Error(e),
            other => self.error_at(
                ctx,
                span,
                format!(
                    "undefined field or method {} on {}",
                    sel.name,
                    other.inspect()
                ),
            ),
        }
    }

    fn concrete_member(
        &self,
        ctx: &FileCtx,
        receiver: Object,
        info: Arc<TypeInfo>,
        sel: &Ident,
        span: Span,
        addressable: bool,
    ) -> Object {
        let type_key = info.key();

        // Method intrinsics, value and pointer receiver forms.
        for key in [
            format!("({type_key}).{}", sel.name),
            format!("(*{type_key}).{}", sel.name),
        ] {
            if let Some(intrinsic) = self.intrinsic(&key) {
                return bind_receiver_intrinsic(intrinsic, receiver);
            }
        }

        match find_method(self.session(), &info, &sel.name, addressable) {
            MethodLookup::Found(func) => self.method_object(&func, receiver),
            MethodLookup::UnresolvedEmbedded { embedded } => {
                let warn_key = format!("{type_key}.{}", sel.name);
                self.warn_once(
                    &warn_key,
                    format!(
                        "assuming method exists on unresolved embedded type: method_name={:?} type={} embedded={}",
                        sel.name,
                        type_key,
                        embedded.key(),
                    ),
                );
                Object::placeholder(
                    PlaceholderObj::new(format!(
                        "method {} assumed on unresolved embedded type {}",
                        sel.name,
                        embedded.key()
                    ))
                    .with_origin(receiver),
                )
            }
            MethodLookup::NotFound => self.field_member(ctx, receiver, &info, sel, span),
        }
    }

    fn field_member(
        &self,
        ctx: &FileCtx,
        receiver: Object,
        info: &Arc<TypeInfo>,
        sel: &Ident,
        span: Span,
    ) -> Object {
        // Concrete value first.
        if let Some(value) = receiver.field(&sel.name) {
            return value;
        }
        // Static fields, including promotion through embedded structs.
        let mut visited = rustc_hash::FxHashSet::default();
        if let Some(field_ty) = self.find_field_type(info, &sel.name, &mut visited) {
            let mut placeholder = PlaceholderObj::new(format!("field {}", sel.name))
                .with_type(Arc::clone(&field_ty))
                .with_origin(receiver);
            let resolved = self.session().resolve_type(&field_ty);
            if !resolved.unresolved {
                placeholder.type_info = Some(resolved);
            }
            return Object::placeholder(placeholder);
        }
        if info.interface_info.is_some() {
            return self.interface_member(ctx, info, sel, span, receiver, Vec::new());
        }
        self.error_at(
            ctx,
            span,
            format!("undefined: {}.{}", info.key(), sel.name),
        )
    }

    fn find_field_type(
        &self,
        info: &Arc<TypeInfo>,
        name: &str,
        visited: &mut rustc_hash::FxHashSet<(String, String)>,
    ) -> Option<Arc<argus_scan::FieldType>> {
        if !visited.insert((info.pkg_path.clone(), info.name.clone())) {
            return None;
        }
        let struct_info = info.struct_info.as_ref()?;
        for field in &struct_info.fields {
            if field.name == name {
                return Some(Arc::clone(&field.ty));
            }
        }
        for field in &struct_info.fields {
            if !field.embedded {
                continue;
            }
            let embedded = self.session().resolve_type(&field.ty);
            if embedded.unresolved {
                continue;
            }
            if let Some(found) = self.find_field_type(&embedded, name, visited) {
                return Some(found);
            }
        }
        None
    }

    /// Interface member: a placeholder abstracting the interface
    /// method, carrying the variable's tracked concrete types.
    fn interface_member(
        &self,
        ctx: &FileCtx,
        info: &Arc<TypeInfo>,
        sel: &Ident,
        span: Span,
        receiver: Object,
        possible: Vec<String>,
    ) -> Object {
        match interface_method(self.session(), info, &sel.name) {
            Some(method) => {
                let mut placeholder = PlaceholderObj::new(format!(
                    "interface method {}.{}",
                    info.key(),
                    sel.name
                ));
                placeholder.underlying_method = Some(method);
                placeholder.possible_concrete_types = possible;
                placeholder.origin = Some(receiver);
                Object::placeholder(placeholder)
            }
            None => self.error_at(
                ctx,
                span,
                format!("interface {} has no method {}", info.key(), sel.name),
            ),
        }
    }

    /// A callable for a found method, bound to its receiver. Policy
    /// and body availability decide between a real function object and
    /// a placeholder.
    pub(crate) fn method_object(&self, func: &Arc<FunctionInfo>, receiver: Object) -> Object {
        let pkg = match self.session().scan_package_by_import(&func.pkg_path) {
            Ok(pkg) => pkg,
            Err(_) => {
                let mut placeholder = PlaceholderObj::new(format!(
                    "method {} of unscannable package",
                    func.qualified_name()
                ));
                placeholder.underlying_function = Some(Arc::clone(func));
                return Object::placeholder(placeholder);
            }
        };
        if self.session().policy_allows(&func.pkg_path) && func.body.is_some() {
            let receiver_name = func
                .receiver
                .as_ref()
                .map(|r| r.name.clone())
                .unwrap_or_default();
            return Object::Function(Rc::new(FunctionObj {
                name: func.name.clone(),
                info: Some(Arc::clone(func)),
                params: func.params.clone(),
                results: func.results.clone(),
                variadic: func.variadic,
                file: Arc::clone(&func.file),
                pkg: Arc::clone(&pkg),
                body: func.body,
                env: self.package_env(&pkg),
                receiver: Some((receiver_name, receiver)),
            }));
        }
        let mut placeholder = PlaceholderObj::new(format!(
            "method {} is out of policy or has no body",
            func.qualified_name()
        ));
        placeholder.underlying_function = Some(Arc::clone(func));
        placeholder.origin = Some(receiver);
        Object::placeholder(placeholder)
    }
}

/// Wrap a method intrinsic so the receiver is prepended to the
/// caller's arguments.
fn bind_receiver_intrinsic(
    intrinsic: crate::object::IntrinsicFn,
    receiver: Object,
) -> Object {
    Object::Intrinsic(Rc::new(move |ev, args| {
        let mut bound = Vec::with_capacity(args.len() + 1);
        bound.push(receiver.clone());
        bound.extend_from_slice(args);
        intrinsic(ev, &bound)
    }))
}
