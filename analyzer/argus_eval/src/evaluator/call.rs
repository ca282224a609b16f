//! Call evaluation: dispatch, application, builtins, and the guards
//! that keep symbolic recursion finite.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use argus_scan::{FieldType, ParamInfo, TypeFlags};
use argus_syntax::ast::{self, ExprKind};

use crate::env::Env;
use crate::object::{
    FunctionObj, InstanceObj, MapObj, Object, PlaceholderObj, PointerObj,
};
use crate::stack::Frame;

use super::expr::{channel_of, placeholder_signature, slice_of};
use super::{Evaluator, FileCtx};

impl Evaluator {
    pub(crate) fn eval_call(&self, ctx: &FileCtx, id: ast::ExprId, env: &Env) -> Object {
        let expr = ctx.file.expr(id);
        let ExprKind::Call {
            func,
            args,
            ellipsis,
        } = &expr.kind
        else {
            return self.error_at(ctx, expr.span, "internal: not a call expression");
        };

        let callee = self.eval_expr(ctx, *func, env);
        if callee.is_error() {
            return callee;
        }

        let mut arg_objs = Vec::with_capacity(args.len());
        for &arg in args {
            let value = self.eval_expr(ctx, arg, env);
            if value.is_error() {
                return value;
            }
            arg_objs.push(value.unwrap_value());
        }

        // The default intrinsic observes every call, in or out of
        // policy, before dispatch.
        self.observe_call(&callee, &arg_objs);

        let position = Some(ctx.position_of(expr.span));
        self.dispatch_call(&callee, arg_objs, *ellipsis, position)
    }

    /// Apply without re-observing (the caller already has).
    pub(crate) fn apply_inner(
        &self,
        callee: &Object,
        args: Vec<Object>,
        position: Option<String>,
    ) -> Object {
        self.dispatch_call(callee, args, false, position)
    }

    fn dispatch_call(
        &self,
        callee: &Object,
        args: Vec<Object>,
        spread: bool,
        position: Option<String>,
    ) -> Object {
        match callee {
            Object::Variable(v) => {
                let inner = v.value.borrow().clone();
                self.dispatch_call(&inner, args, spread, position)
            }
            Object::Intrinsic(f) => f(self, &args),
            Object::Function(f) => self.apply_function(f, args, spread, position),
            Object::Placeholder(p) => self.call_placeholder(p, &args),
            Object::Type(t) => self.convert(t, args),
            Object::Error(e) => Object::Error(Rc::clone(e)),
            Object::Nil => Object::error_msg("call of nil"),
            other => Object::error_msg(format!("not callable: {}", other.inspect())),
        }
    }

    // ------------------------------------------------------------------
    // Function application

    fn apply_function(
        &self,
        f: &Rc<FunctionObj>,
        mut args: Vec<Object>,
        spread: bool,
        position: Option<String>,
    ) -> Object {
        let qualified = f.qualified_name();

        if spread && !f.variadic {
            return Object::error_msg(format!(
                "cannot use ... in call to non-variadic {qualified}"
            ));
        }

        // `f(g())` where g returns a tuple feeds the tuple's parts.
        if args.len() == 1 && f.params.len() > 1 {
            if let Object::MultiReturn(values) = &args[0] {
                args = values.as_ref().clone();
            }
        }

        let Some(body) = f.body else {
            return synth_results(&f.results);
        };

        let signature = format!(
            "{qualified}({})",
            args.iter()
                .map(Object::inspect)
                .collect::<Vec<_>>()
                .join(", ")
        );
        if self.active_calls.borrow().contains(&signature) {
            self.warn_once(
                &signature,
                format!("recursion detected, cutting off call: {signature}"),
            );
            return synth_results(&f.results);
        }
        if !self.stack.push(Frame {
            name: qualified.clone(),
            position,
            signature: signature.clone(),
        }) {
            self.warn_once(
                "max-call-depth",
                format!("max call depth exceeded at {qualified}"),
            );
            return synth_results(&f.results);
        }
        self.active_calls.borrow_mut().insert(signature.clone());

        let call_env = f.env.enclosed();
        if let Some((name, value)) = &f.receiver {
            if !name.is_empty() && name != "_" {
                call_env.set_local(name.clone(), value.clone());
            }
        }
        self.bind_params(f, &args, spread, &call_env);
        for result in &f.results {
            if !result.name.is_empty() && result.name != "_" {
                call_env.set_local(result.name.clone(), self.zero_value(&result.ty));
            }
        }

        let fctx = FileCtx::new(Arc::clone(&f.file), Arc::clone(&f.pkg));
        let outcome = self.eval_stmt(&fctx, body, &call_env);

        self.active_calls.borrow_mut().remove(&signature);
        self.stack.pop();

        match outcome {
            Object::Return(value) => (*value).clone(),
            err @ Object::Error(_) => err,
            // A stray break/continue stops at the function boundary.
            _ => Object::Nil,
        }
    }

    fn bind_params(&self, f: &Rc<FunctionObj>, args: &[Object], spread: bool, env: &Env) {
        let fixed = if f.variadic {
            f.params.len().saturating_sub(1)
        } else {
            f.params.len()
        };
        for (i, param) in f.params.iter().take(fixed).enumerate() {
            let value = args
                .get(i)
                .cloned()
                .unwrap_or_else(|| self.zero_value(&param.ty));
            if param.name.is_empty() || param.name == "_" {
                continue;
            }
            let var = self.new_variable(param.name.clone(), Some(Arc::clone(&param.ty)), value);
            env.set_local(param.name.clone(), var);
        }
        if f.variadic {
            if let Some(param) = f.params.last() {
                if param.name.is_empty() || param.name == "_" {
                    return;
                }
                let rest: Vec<Object> = args.iter().skip(fixed).cloned().collect();
                let value = if spread && rest.len() == 1 {
                    rest.into_iter().next().unwrap_or(Object::Nil)
                } else {
                    let elem = param.ty.elem.clone();
                    slice_of(elem, rest)
                };
                let var =
                    self.new_variable(param.name.clone(), Some(Arc::clone(&param.ty)), value);
                env.set_local(param.name.clone(), var);
            }
        }
    }

    /// Calling a placeholder with a known signature synthesizes typed
    /// placeholder results; without one, a bare placeholder.
    fn call_placeholder(&self, p: &Rc<PlaceholderObj>, _args: &[Object]) -> Object {
        if let Some(sig) = placeholder_signature(p) {
            return synth_results(&sig.results);
        }
        Object::placeholder(PlaceholderObj::new(format!(
            "result of calling symbolic value ({})",
            p.reason
        )))
    }

    /// Type conversion `T(x)`: scalars flow through; everything else
    /// becomes a placeholder typed `T` that keeps its origin.
    fn convert(&self, t: &Rc<crate::object::TypeObj>, args: Vec<Object>) -> Object {
        let Some(value) = args.into_iter().next() else {
            return Object::placeholder(
                PlaceholderObj::new("conversion without operand")
                    .with_type(Arc::clone(&t.field_type)),
            );
        };
        match value {
            v @ (Object::Integer(_)
            | Object::Float(_)
            | Object::Complex { .. }
            | Object::Str(_)
            | Object::Boolean(_)) => v,
            other => {
                let mut placeholder = PlaceholderObj::new("type conversion")
                    .with_type(Arc::clone(&t.field_type))
                    .with_origin(other);
                placeholder.type_info = t.info.clone();
                Object::placeholder(placeholder)
            }
        }
    }

    // ------------------------------------------------------------------
    // Builtins

    /// The universe-scope builtin functions, as intrinsic objects.
    pub(crate) fn builtin_object(&self, name: &str) -> Option<Object> {
        let builtin: crate::object::IntrinsicFn = match name {
            "len" | "cap" => Rc::new(|_, args| match args.first() {
                Some(Object::Str(s)) => Object::Integer(s.len() as i64),
                Some(Object::Slice(s)) => Object::Integer(s.elems.borrow().len() as i64),
                Some(Object::Map(m)) => Object::Integer(m.entries.borrow().len() as i64),
                _ => Object::placeholder(
                    PlaceholderObj::new("len of symbolic value")
                        .with_type(Arc::new(FieldType::builtin("int"))),
                ),
            }),
            "make" => Rc::new(|_, args| match args.first() {
                Some(Object::Type(t)) => {
                    let ty = &t.field_type;
                    if ty.flags.contains(TypeFlags::MAP) {
                        Object::Map(Rc::new(MapObj {
                            key_type: ty.map_key.clone(),
                            value_type: ty.elem.clone(),
                            entries: RefCell::new(Vec::new()),
                        }))
                    } else if ty.flags.contains(TypeFlags::CHAN) {
                        channel_of(ty.elem.clone())
                    } else {
                        slice_of(ty.elem.clone(), Vec::new())
                    }
                }
                _ => Object::placeholder(PlaceholderObj::new("make of unknown type")),
            }),
            "new" => Rc::new(|ev, args| match args.first() {
                Some(Object::Type(t)) => {
                    let zero = match &t.info {
                        Some(info) if !info.unresolved => Object::Instance(Rc::new(InstanceObj {
                            type_info: Arc::clone(info),
                            field_type: Some(Arc::clone(&t.field_type)),
                            fields: RefCell::new(rustc_hash::FxHashMap::default()),
                        })),
                        _ => ev.zero_value(&t.field_type),
                    };
                    Object::Pointer(Rc::new(PointerObj {
                        pointee: RefCell::new(zero),
                    }))
                }
                _ => Object::placeholder(PlaceholderObj::new("new of unknown type")),
            }),
            "append" => Rc::new(|_, args| match args.first() {
                Some(Object::Slice(s)) => {
                    let mut elems = s.elems.borrow().clone();
                    elems.extend(args.iter().skip(1).cloned());
                    slice_of(s.elem_type.clone(), elems)
                }
                _ => Object::placeholder(PlaceholderObj::new("append to symbolic slice")),
            }),
            "copy" => Rc::new(|_, _| {
                Object::placeholder(
                    PlaceholderObj::new("copy length")
                        .with_type(Arc::new(FieldType::builtin("int"))),
                )
            }),
            "min" | "max" => Rc::new(|_, args| {
                args.first()
                    .cloned()
                    .unwrap_or_else(|| Object::placeholder(PlaceholderObj::new("min/max")))
            }),
            // Side effects only; panics do not unwind the walk.
            "panic" => Rc::new(|_, _| Object::placeholder(PlaceholderObj::new("panic"))),
            "recover" => Rc::new(|_, _| Object::Nil),
            "delete" | "close" | "clear" | "print" | "println" => Rc::new(|_, _| Object::Nil),
            "complex" => Rc::new(|_, args| match (args.first(), args.get(1)) {
                (Some(Object::Float(re)), Some(Object::Float(im))) => Object::Complex {
                    re: *re,
                    im: *im,
                },
                _ => Object::placeholder(PlaceholderObj::new("complex of symbolic parts")),
            }),
            "real" => Rc::new(|_, args| match args.first() {
                Some(Object::Complex { re, .. }) => Object::Float(*re),
                _ => Object::placeholder(
                    PlaceholderObj::new("real of symbolic value")
                        .with_type(Arc::new(FieldType::builtin("float64"))),
                ),
            }),
            "imag" => Rc::new(|_, args| match args.first() {
                Some(Object::Complex { im, .. }) => Object::Float(*im),
                _ => Object::placeholder(
                    PlaceholderObj::new("imag of symbolic value")
                        .with_type(Arc::new(FieldType::builtin("float64"))),
                ),
            }),
            _ => return None,
        };
        Some(Object::Intrinsic(builtin))
    }
}

/// Placeholder results shaped by a result list: none, one, or a tuple.
pub(crate) fn synth_results(results: &[ParamInfo]) -> Object {
    match results.len() {
        0 => Object::Nil,
        1 => Object::placeholder(
            PlaceholderObj::new("symbolic result").with_type(Arc::clone(&results[0].ty)),
        ),
        _ => {
            let values = results
                .iter()
                .map(|r| {
                    Object::placeholder(
                        PlaceholderObj::new("symbolic result").with_type(Arc::clone(&r.ty)),
                    )
                })
                .collect();
            Object::MultiReturn(Rc::new(values))
        }
    }
}

