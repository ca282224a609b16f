//! Expression dispatch: literals, identifiers, operators.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use argus_scan::{FieldType, FuncSigInfo, ParamInfo};
use argus_syntax::ast::{self, BinaryOp, ExprKind, LitKind, UnaryOp};
use argus_syntax::literal;

use crate::env::Env;
use crate::object::{ChannelObj, FunctionObj, Object, PlaceholderObj, PointerObj, SliceObj, TypeObj};

use super::{Evaluator, FileCtx};

impl Evaluator {
    pub fn eval_expr(&self, ctx: &FileCtx, id: ast::ExprId, env: &Env) -> Object {
        let expr = ctx.file.expr(id);
        match &expr.kind {
            ExprKind::Bad => self.error_at(ctx, expr.span, "malformed expression"),

            ExprKind::Ident(name) => self.eval_ident(ctx, name, expr.span, env),

            ExprKind::BasicLit { kind, value } => self.eval_literal(*kind, value),

            ExprKind::Paren(inner) => self.eval_expr(ctx, *inner, env),

            ExprKind::Selector { x, sel } => self.eval_selector(ctx, *x, sel, expr.span, env),

            ExprKind::Call { .. } => self.eval_call(ctx, id, env),

            ExprKind::CompositeLit { .. } => self.eval_composite(ctx, id, env),

            ExprKind::KeyValue { value, .. } => self.eval_expr(ctx, *value, env),

            ExprKind::FuncLit { ty, body } => self.eval_func_lit(ctx, ty, *body, env),

            ExprKind::TypeAssert { x, ty } => self.eval_type_assert(ctx, *x, *ty, expr.span, env),

            ExprKind::Index { x, indices } => self.eval_index(ctx, *x, indices, env),

            ExprKind::Slice { x, low, high, max } => {
                for part in [low, high, max].into_iter().flatten() {
                    let v = self.eval_expr(ctx, *part, env);
                    if v.is_error() {
                        return v;
                    }
                }
                let base = self.eval_expr(ctx, *x, env);
                match base.unwrap_value() {
                    s @ Object::Slice(_) => s,
                    Object::Error(e) => Object::Error(e),
                    other => Object::placeholder(
                        PlaceholderObj::new("slice expression").with_origin(other),
                    ),
                }
            }

            ExprKind::Star(inner) => self.eval_star(ctx, *inner, env),

            ExprKind::Unary { op, x } => self.eval_unary(ctx, *op, *x, env),

            ExprKind::Binary { op, x, y } => self.eval_binary(ctx, *op, *x, *y, env),

            // Type expressions in value position (conversions,
            // composite literal types, make() arguments).
            ExprKind::Ellipsis { .. }
            | ExprKind::ArrayType { .. }
            | ExprKind::StructType { .. }
            | ExprKind::FuncType(_)
            | ExprKind::InterfaceType { .. }
            | ExprKind::MapType { .. }
            | ExprKind::ChanType { .. } => self.type_expr_object(ctx, id),
        }
    }

    /// Lift a type expression into a `Type` object.
    pub(crate) fn type_expr_object(&self, ctx: &FileCtx, id: ast::ExprId) -> Object {
        let field_type =
            self.session()
                .type_info_from_expr(&ctx.file, id, &[], &ctx.pkg.import_path);
        let info = {
            let resolved = self.session().resolve_type(&field_type);
            if resolved.unresolved {
                None
            } else {
                Some(resolved)
            }
        };
        Object::Type(Rc::new(TypeObj { field_type, info }))
    }

    fn eval_literal(&self, kind: LitKind, text: &str) -> Object {
        match kind {
            LitKind::Int => match literal::parse_int(text) {
                Some(v) => Object::Integer(v),
                None => Object::placeholder(PlaceholderObj::new("unparseable int literal")),
            },
            LitKind::Float => match literal::parse_float(text) {
                Some(v) => Object::Float(v),
                None => Object::placeholder(PlaceholderObj::new("unparseable float literal")),
            },
            LitKind::Imag => match literal::parse_imag(text) {
                Some(im) => Object::Complex { re: 0.0, im },
                None => Object::placeholder(PlaceholderObj::new("unparseable imaginary literal")),
            },
            LitKind::Rune => match literal::parse_rune(text) {
                Some(c) => Object::Integer(c as i64),
                None => Object::placeholder(PlaceholderObj::new("unparseable rune literal")),
            },
            LitKind::String => match literal::unquote_string(text) {
                Some(s) => Object::string(s),
                None => Object::placeholder(PlaceholderObj::new("unparseable string literal")),
            },
        }
    }

    fn eval_ident(&self, ctx: &FileCtx, name: &str, span: argus_syntax::Span, env: &Env) -> Object {
        // Intrinsic keys shadow everything.
        let key = format!("{}.{name}", ctx.pkg.import_path);
        if let Some(intrinsic) = self.intrinsic(&key) {
            return Object::Intrinsic(intrinsic);
        }
        if let Some(obj) = env.get(name) {
            return obj;
        }
        if let Some(obj) = self.package_member(&ctx.pkg, name) {
            return obj;
        }
        if let Some(path) = ctx.imports.get(name) {
            return self.package_object(path);
        }
        // Universe scope.
        match name {
            "nil" => Object::Nil,
            "true" => Object::Boolean(true),
            "false" => Object::Boolean(false),
            _ => {
                if let Some(builtin) = self.builtin_object(name) {
                    builtin
                } else if self.is_builtin_type_name(name) {
                    let ty = Arc::new(FieldType::builtin(name));
                    Object::Type(Rc::new(TypeObj {
                        field_type: ty,
                        info: None,
                    }))
                } else {
                    self.error_at(ctx, span, format!("identifier not found: {name}"))
                }
            }
        }
    }

    pub(crate) fn is_builtin_type_name(&self, name: &str) -> bool {
        matches!(
            name,
            "any" | "bool"
                | "byte"
                | "comparable"
                | "complex64"
                | "complex128"
                | "error"
                | "float32"
                | "float64"
                | "int"
                | "int8"
                | "int16"
                | "int32"
                | "int64"
                | "rune"
                | "string"
                | "uint"
                | "uint8"
                | "uint16"
                | "uint32"
                | "uint64"
                | "uintptr"
        )
    }

    fn eval_func_lit(
        &self,
        ctx: &FileCtx,
        sig: &ast::FuncType,
        body: ast::StmtId,
        env: &Env,
    ) -> Object {
        let lift = |fields: &[ast::Field]| -> Vec<ParamInfo> {
            let mut out = Vec::new();
            for field in fields {
                let ty = self.session().type_info_from_expr(
                    &ctx.file,
                    field.ty,
                    &[],
                    &ctx.pkg.import_path,
                );
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
        };
        let params = lift(&sig.params);
        let results = lift(&sig.results);
        let variadic = params.last().is_some_and(|p| p.ty.is_variadic());
        Object::Function(Rc::new(FunctionObj {
            name: String::new(),
            info: None,
            params,
            results,
            variadic,
            file: Arc::clone(&ctx.file),
            pkg: Arc::clone(&ctx.pkg),
            body: Some(body),
            env: env.clone(),
            receiver: None,
        }))
    }

    /// Single-value type assertion `x.(T)`: a placeholder typed `T`
    /// that keeps a link to `x` so later member access can route to
    /// the concrete value.
    fn eval_type_assert(
        &self,
        ctx: &FileCtx,
        x: ast::ExprId,
        ty: Option<ast::ExprId>,
        span: argus_syntax::Span,
        env: &Env,
    ) -> Object {
        let value = self.eval_expr(ctx, x, env);
        if value.is_error() {
            return value;
        }
        let Some(ty) = ty else {
            return self.error_at(ctx, span, "x.(type) outside a type switch");
        };
        Object::placeholder(self.assertion_placeholder(ctx, ty, value))
    }

    /// Placeholder for a value narrowed to the type expression `ty`.
    pub(crate) fn assertion_placeholder(
        &self,
        ctx: &FileCtx,
        ty: ast::ExprId,
        origin: Object,
    ) -> PlaceholderObj {
        let field_type =
            self.session()
                .type_info_from_expr(&ctx.file, ty, &[], &ctx.pkg.import_path);
        let mut placeholder = PlaceholderObj::new("type assertion")
            .with_type(Arc::clone(&field_type))
            .with_origin(origin);
        let info = self.session().resolve_type(&field_type);
        if !field_type.leaf().is_builtin() {
            placeholder.type_info = Some(info);
        }
        placeholder
    }

    fn eval_index(&self, ctx: &FileCtx, x: ast::ExprId, indices: &[ast::ExprId], env: &Env) -> Object {
        let base = self.eval_expr(ctx, x, env);
        if base.is_error() {
            return base;
        }
        for &index in indices {
            let v = self.eval_expr(ctx, index, env);
            if v.is_error() {
                return v;
            }
        }
        match base.unwrap_value() {
            // Generic instantiation: the instantiated callable/type is
            // the same object for tracing purposes.
            t @ (Object::Type(_) | Object::Function(_)) => t,
            Object::Slice(s) => match s.elem_type.clone() {
                Some(elem) => Object::placeholder(
                    PlaceholderObj::new("slice element").with_type(elem),
                ),
                None => Object::placeholder(PlaceholderObj::new("slice element")),
            },
            Object::Map(m) => match m.value_type.clone() {
                Some(value) => Object::placeholder(
                    PlaceholderObj::new("map value").with_type(value),
                ),
                None => Object::placeholder(PlaceholderObj::new("map value")),
            },
            Object::Str(_) => Object::placeholder(
                PlaceholderObj::new("string index").with_type(Arc::new(FieldType::builtin("byte"))),
            ),
            other => {
                Object::placeholder(PlaceholderObj::new("index expression").with_origin(other))
            }
        }
    }

    fn eval_star(&self, ctx: &FileCtx, inner: ast::ExprId, env: &Env) -> Object {
        let value = self.eval_expr(ctx, inner, env);
        match value.unwrap_value() {
            Object::Pointer(p) => p.pointee.borrow().clone(),
            Object::Type(t) => Object::Type(Rc::new(TypeObj {
                field_type: Arc::new(FieldType::pointer(Arc::clone(&t.field_type))),
                info: t.info.clone(),
            })),
            Object::Placeholder(p) => {
                let mut deref = PlaceholderObj::new("dereference of symbolic pointer");
                if let Some(ty) = &p.static_type {
                    if ty.is_pointer() {
                        if let Some(elem) = &ty.elem {
                            deref.static_type = Some(Arc::clone(elem));
                        }
                    }
                }
                deref.type_info = p.type_info.clone();
                deref.origin = Some(Object::Placeholder(Rc::clone(&p)));
                Object::placeholder(deref)
            }
            Object::Error(e) => Object::Error(e),
            other => Object::placeholder(
                PlaceholderObj::new("dereference of non-pointer").with_origin(other),
            ),
        }
    }

    fn eval_unary(&self, ctx: &FileCtx, op: UnaryOp, x: ast::ExprId, env: &Env) -> Object {
        let operand = self.eval_expr(ctx, x, env);
        if operand.is_error() {
            return operand;
        }
        match op {
            UnaryOp::Addr => Object::Pointer(Rc::new(PointerObj {
                pointee: RefCell::new(operand),
            })),
            UnaryOp::Recv => match operand.unwrap_value() {
                Object::Channel(ch) => match ch.elem_type.clone() {
                    Some(elem) => Object::placeholder(
                        PlaceholderObj::new("channel receive").with_type(elem),
                    ),
                    None => Object::placeholder(PlaceholderObj::new("channel receive")),
                },
                _ => Object::placeholder(PlaceholderObj::new("channel receive")),
            },
            UnaryOp::Plus => operand.unwrap_value(),
            UnaryOp::Minus => match operand.unwrap_value() {
                Object::Integer(v) => Object::Integer(v.wrapping_neg()),
                Object::Float(v) => Object::Float(-v),
                Object::Complex { re, im } => Object::Complex { re: -re, im: -im },
                other => self.symbolic_binary_result(&other, &Object::Nil),
            },
            UnaryOp::Not => match operand.unwrap_value() {
                Object::Boolean(v) => Object::Boolean(!v),
                _ => Object::placeholder(
                    PlaceholderObj::new("logical not")
                        .with_type(Arc::new(FieldType::builtin("bool"))),
                ),
            },
            UnaryOp::Xor => match operand.unwrap_value() {
                Object::Integer(v) => Object::Integer(!v),
                other => self.symbolic_binary_result(&other, &Object::Nil),
            },
            UnaryOp::Tilde => Object::placeholder(PlaceholderObj::new("constraint term")),
        }
    }

    fn eval_binary(
        &self,
        ctx: &FileCtx,
        op: BinaryOp,
        x: ast::ExprId,
        y: ast::ExprId,
        env: &Env,
    ) -> Object {
        let lhs = self.eval_expr(ctx, x, env);
        if lhs.is_error() {
            return lhs;
        }
        let rhs = self.eval_expr(ctx, y, env);
        if rhs.is_error() {
            return rhs;
        }
        let lhs = lhs.unwrap_value();
        let rhs = rhs.unwrap_value();

        if op.is_comparison() {
            return match fold_comparison(op, &lhs, &rhs) {
                Some(result) => Object::Boolean(result),
                None => Object::placeholder(
                    PlaceholderObj::new("symbolic comparison")
                        .with_type(Arc::new(FieldType::builtin("bool"))),
                ),
            };
        }

        match (op, &lhs, &rhs) {
            (BinaryOp::LogicalAnd, Object::Boolean(a), Object::Boolean(b)) => {
                Object::Boolean(*a && *b)
            }
            (BinaryOp::LogicalOr, Object::Boolean(a), Object::Boolean(b)) => {
                Object::Boolean(*a || *b)
            }
            (BinaryOp::LogicalAnd | BinaryOp::LogicalOr, _, _) => Object::placeholder(
                PlaceholderObj::new("symbolic logical operation")
                    .with_type(Arc::new(FieldType::builtin("bool"))),
            ),
            _ => match fold_arithmetic(op, &lhs, &rhs) {
                Some(result) => result,
                None => self.symbolic_binary_result(&lhs, &rhs),
            },
        }
    }

    /// Placeholder for an unfoldable operation, typed from whichever
    /// operand carries static type information.
    pub(crate) fn symbolic_binary_result(&self, lhs: &Object, rhs: &Object) -> Object {
        let inferred = static_type_of(lhs).or_else(|| static_type_of(rhs));
        let mut placeholder = PlaceholderObj::new("symbolic operation");
        placeholder.static_type = inferred;
        Object::placeholder(placeholder)
    }
}

pub(crate) fn static_type_of(obj: &Object) -> Option<Arc<FieldType>> {
    match obj {
        Object::Placeholder(p) => p.static_type.clone(),
        Object::Variable(v) => v
            .static_type
            .clone()
            .or_else(|| static_type_of(&v.value.borrow())),
        Object::Integer(_) => Some(Arc::new(FieldType::builtin("int"))),
        Object::Float(_) => Some(Arc::new(FieldType::builtin("float64"))),
        Object::Str(_) => Some(Arc::new(FieldType::builtin("string"))),
        Object::Boolean(_) => Some(Arc::new(FieldType::builtin("bool"))),
        Object::Instance(inst) => inst.field_type.clone(),
        _ => None,
    }
}

/// Channel object helper shared with `make`.
pub(crate) fn channel_of(elem: Option<Arc<FieldType>>) -> Object {
    Object::Channel(Rc::new(ChannelObj { elem_type: elem }))
}

/// Slice object helper shared with `make` / `append` / literals.
pub(crate) fn slice_of(elem: Option<Arc<FieldType>>, elems: Vec<Object>) -> Object {
    Object::Slice(Rc::new(SliceObj {
        elem_type: elem,
        elems: RefCell::new(elems),
    }))
}

/// Signature of a placeholder's known callable, if any.
pub(crate) fn placeholder_signature(p: &PlaceholderObj) -> Option<FuncSigInfo> {
    if let Some(func) = &p.underlying_function {
        return Some(FuncSigInfo {
            params: func.params.clone(),
            results: func.results.clone(),
            variadic: func.variadic,
        });
    }
    if let Some(method) = &p.underlying_method {
        return Some(method.sig.clone());
    }
    if let Some(ty) = &p.static_type {
        if let Some(sig) = &ty.func_sig {
            return Some((**sig).clone());
        }
    }
    None
}

fn fold_comparison(op: BinaryOp, lhs: &Object, rhs: &Object) -> Option<bool> {
    let ordering = match (lhs, rhs) {
        (Object::Integer(a), Object::Integer(b)) => a.partial_cmp(b),
        (Object::Float(a), Object::Float(b)) => a.partial_cmp(b),
        (Object::Integer(a), Object::Float(b)) => (*a as f64).partial_cmp(b),
        (Object::Float(a), Object::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Object::Str(a), Object::Str(b)) => a.partial_cmp(b),
        (Object::Boolean(a), Object::Boolean(b)) => match op {
            BinaryOp::Eq => return Some(a == b),
            BinaryOp::NotEq => return Some(a != b),
            _ => None,
        },
        (Object::Nil, Object::Nil) => match op {
            BinaryOp::Eq => return Some(true),
            BinaryOp::NotEq => return Some(false),
            _ => None,
        },
        _ => None,
    }?;
    Some(match op {
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::NotEq => !ordering.is_eq(),
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::GtEq => ordering.is_ge(),
        _ => return None,
    })
}

pub(crate) fn fold_arithmetic(op: BinaryOp, lhs: &Object, rhs: &Object) -> Option<Object> {
    // Promote mixed int/float like the constant folder does.
    let (lhs, rhs) = match (lhs.clone(), rhs.clone()) {
        (Object::Integer(a), Object::Float(b)) => (Object::Float(a as f64), Object::Float(b)),
        (Object::Float(a), Object::Integer(b)) => (Object::Float(a), Object::Float(b as f64)),
        other => other,
    };
    Some(match (op, lhs, rhs) {
        (BinaryOp::Add, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_add(b)?)
        }
        (BinaryOp::Sub, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_sub(b)?)
        }
        (BinaryOp::Mul, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_mul(b)?)
        }
        (BinaryOp::Quo, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_div(b)?)
        }
        (BinaryOp::Rem, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_rem(b)?)
        }
        (BinaryOp::And, Object::Integer(a), Object::Integer(b)) => Object::Integer(a & b),
        (BinaryOp::Or, Object::Integer(a), Object::Integer(b)) => Object::Integer(a | b),
        (BinaryOp::Xor, Object::Integer(a), Object::Integer(b)) => Object::Integer(a ^ b),
        (BinaryOp::AndNot, Object::Integer(a), Object::Integer(b)) => Object::Integer(a & !b),
        (BinaryOp::Shl, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_shl(u32::try_from(b).ok()?)?)
        }
        (BinaryOp::Shr, Object::Integer(a), Object::Integer(b)) => {
            Object::Integer(a.checked_shr(u32::try_from(b).ok()?)?)
        }
        (BinaryOp::Add, Object::Float(a), Object::Float(b)) => Object::Float(a + b),
        (BinaryOp::Sub, Object::Float(a), Object::Float(b)) => Object::Float(a - b),
        (BinaryOp::Mul, Object::Float(a), Object::Float(b)) => Object::Float(a * b),
        (BinaryOp::Quo, Object::Float(a), Object::Float(b)) => Object::Float(a / b),
        (
            BinaryOp::Add,
            Object::Complex { re: ar, im: ai },
            Object::Complex { re: br, im: bi },
        ) => Object::Complex {
            re: ar + br,
            im: ai + bi,
        },
        (
            BinaryOp::Sub,
            Object::Complex { re: ar, im: ai },
            Object::Complex { re: br, im: bi },
        ) => Object::Complex {
            re: ar - br,
            im: ai - bi,
        },
        (BinaryOp::Add, Object::Str(a), Object::Str(b)) => {
            Object::string(format!("{a}{b}"))
        }
        _ => return None,
    })
}
