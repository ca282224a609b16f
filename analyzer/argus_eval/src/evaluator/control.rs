//! Control flow: every branch is entered once over symbolic bindings.
//!
//! Loops do not iterate and switches do not select — reachability needs
//! each body walked exactly once in a fresh scope. Conditions and
//! iteration clauses are still evaluated for their side effects.

use std::sync::Arc;

use argus_scan::{FieldType, TypeFlags};
use argus_syntax::ast::{self, ExprKind, StmtKind};

use crate::env::Env;
use crate::object::{Object, PlaceholderObj};

use super::{Evaluator, FileCtx};

/// Discriminant for "both branches agree" checks.
fn control_kind(obj: &Object) -> Option<u8> {
    match obj {
        Object::Return(_) => Some(0),
        Object::Break { .. } => Some(1),
        Object::Continue { .. } => Some(2),
        Object::Error(_) => Some(3),
        _ => None,
    }
}

impl Evaluator {
    pub(crate) fn eval_control(&self, ctx: &FileCtx, id: ast::StmtId, env: &Env) -> Object {
        let stmt = ctx.file.stmt(id);
        match &stmt.kind {
            StmtKind::If {
                init,
                cond,
                then,
                els,
            } => self.eval_if(ctx, *init, *cond, *then, *els, env),

            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => self.eval_for(ctx, *init, *cond, *post, *body, env),

            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => self.eval_range(ctx, *key, *value, *define, *x, *body, env),

            StmtKind::Switch { init, tag, cases } => self.eval_switch(ctx, *init, *tag, cases, env),

            StmtKind::TypeSwitch {
                init,
                assign,
                cases,
            } => self.eval_type_switch(ctx, *init, *assign, cases, env),

            StmtKind::Select { cases } => self.eval_select(ctx, cases, env),

            _ => Object::Nil,
        }
    }

    fn eval_if(
        &self,
        ctx: &FileCtx,
        init: Option<ast::StmtId>,
        cond: ast::ExprId,
        then: ast::StmtId,
        els: Option<ast::StmtId>,
        env: &Env,
    ) -> Object {
        let scope = env.enclosed();
        if let Some(init) = init {
            let result = self.eval_stmt(ctx, init, &scope);
            if result.is_control() {
                return result;
            }
        }
        let cond = self.eval_expr(ctx, cond, &scope);
        if cond.is_error() {
            return cond;
        }

        let then_result = self.eval_stmt(ctx, then, &scope);
        let else_result = els.map(|e| self.eval_stmt(ctx, e, &scope));

        // Both branches agreeing on a control-flow kind propagates it;
        // anything else falls through — never the concrete value of a
        // single branch.
        match (&then_result, &else_result) {
            (a, Some(b)) => match (control_kind(a), control_kind(b)) {
                (Some(ka), Some(kb)) if ka == kb => then_result,
                _ => Object::Nil,
            },
            _ => Object::Nil,
        }
    }

    fn eval_for(
        &self,
        ctx: &FileCtx,
        init: Option<ast::StmtId>,
        cond: Option<ast::ExprId>,
        post: Option<ast::StmtId>,
        body: ast::StmtId,
        env: &Env,
    ) -> Object {
        let scope = env.enclosed();
        if let Some(init) = init {
            let result = self.eval_stmt(ctx, init, &scope);
            if result.is_control() {
                return result;
            }
        }
        if let Some(cond) = cond {
            let result = self.eval_expr(ctx, cond, &scope);
            if result.is_error() {
                return result;
            }
        }
        let outcome = self.eval_stmt(ctx, body, &scope);
        if let Some(post) = post {
            let result = self.eval_stmt(ctx, post, &scope);
            if result.is_error() {
                return result;
            }
        }
        loop_outcome(outcome)
    }

    fn eval_range(
        &self,
        ctx: &FileCtx,
        key: Option<ast::ExprId>,
        value: Option<ast::ExprId>,
        define: bool,
        x: ast::ExprId,
        body: ast::StmtId,
        env: &Env,
    ) -> Object {
        let scope = env.enclosed();
        let collection = self.eval_expr(ctx, x, &scope);
        if collection.is_error() {
            return collection;
        }

        let (key_ty, value_ty) = range_binding_types(&collection);
        if let Some(key) = key {
            let result = self.bind_range_var(ctx, key, key_ty, define, &scope);
            if result.is_error() {
                return result;
            }
        }
        if let Some(value) = value {
            let result = self.bind_range_var(ctx, value, value_ty, define, &scope);
            if result.is_error() {
                return result;
            }
        }

        loop_outcome(self.eval_stmt(ctx, body, &scope))
    }

    fn bind_range_var(
        &self,
        ctx: &FileCtx,
        target: ast::ExprId,
        ty: Option<Arc<FieldType>>,
        define: bool,
        scope: &Env,
    ) -> Object {
        let mut placeholder = PlaceholderObj::new("range binding");
        if let Some(ty) = &ty {
            placeholder.static_type = Some(Arc::clone(ty));
            let info = self.session().resolve_type(ty);
            if !info.unresolved {
                placeholder.type_info = Some(info);
            }
        }
        let value = Object::placeholder(placeholder);

        if let ExprKind::Ident(name) = &ctx.file.expr(target).kind {
            if name == "_" {
                return Object::Nil;
            }
            if define {
                let var = self.new_variable(name.clone(), ty, value);
                scope.set_local(name.clone(), var);
            } else {
                let existing = scope.get(name);
                match existing {
                    Some(Object::Variable(var)) => *var.value.borrow_mut() = value,
                    _ => scope.set(name, value),
                }
            }
            return Object::Nil;
        }
        // Non-identifier targets (field, index): evaluate for effects.
        let result = self.eval_expr(ctx, target, scope);
        if result.is_error() {
            result
        } else {
            Object::Nil
        }
    }

    fn eval_switch(
        &self,
        ctx: &FileCtx,
        init: Option<ast::StmtId>,
        tag: Option<ast::ExprId>,
        cases: &[ast::StmtId],
        env: &Env,
    ) -> Object {
        let scope = env.enclosed();
        if let Some(init) = init {
            let result = self.eval_stmt(ctx, init, &scope);
            if result.is_control() {
                return result;
            }
        }
        if let Some(tag) = tag {
            let result = self.eval_expr(ctx, tag, &scope);
            if result.is_error() {
                return result;
            }
        }

        let mut first_error = None;
        for &case in cases {
            let StmtKind::Case { exprs, body } = &ctx.file.stmt(case).kind else {
                continue;
            };
            let case_scope = scope.enclosed();
            for &expr in exprs {
                let value = self.eval_expr(ctx, expr, &case_scope);
                if value.is_error() && first_error.is_none() {
                    first_error = Some(value);
                }
            }
            let outcome = self.eval_block(ctx, body, &case_scope);
            if outcome.is_error() && first_error.is_none() {
                first_error = Some(outcome);
            }
        }
        first_error.unwrap_or(Object::Nil)
    }

    fn eval_type_switch(
        &self,
        ctx: &FileCtx,
        init: Option<ast::StmtId>,
        assign: ast::StmtId,
        cases: &[ast::StmtId],
        env: &Env,
    ) -> Object {
        let scope = env.enclosed();
        if let Some(init) = init {
            let result = self.eval_stmt(ctx, init, &scope);
            if result.is_control() {
                return result;
            }
        }

        // `v := x.(type)` or a bare `x.(type)`.
        let (binding, subject_expr) = match &ctx.file.stmt(assign).kind {
            StmtKind::Assign { lhs, rhs, .. } => {
                let name = lhs.first().and_then(|&l| match &ctx.file.expr(l).kind {
                    ExprKind::Ident(name) if name != "_" => Some(name.clone()),
                    _ => None,
                });
                let subject = rhs.first().and_then(|&r| match &ctx.file.expr(r).kind {
                    ExprKind::TypeAssert { x, .. } => Some(*x),
                    _ => None,
                });
                (name, subject)
            }
            StmtKind::Expr(expr) => match &ctx.file.expr(*expr).kind {
                ExprKind::TypeAssert { x, .. } => (None, Some(*x)),
                _ => (None, None),
            },
            _ => (None, None),
        };
        let Some(subject_expr) = subject_expr else {
            return self.error_at(
                ctx,
                ctx.file.stmt(assign).span,
                "malformed type switch guard",
            );
        };
        let subject = self.eval_expr(ctx, subject_expr, &scope);
        if subject.is_error() {
            return subject;
        }
        let subject = subject.unwrap_value();

        let mut first_error = None;
        for &case in cases {
            let StmtKind::Case { exprs, body } = &ctx.file.stmt(case).kind else {
                continue;
            };
            let case_scope = scope.enclosed();
            if let Some(name) = &binding {
                let bound = self.type_switch_binding(ctx, exprs, &subject);
                let var = self.new_variable(name.clone(), super::expr::static_type_of(&bound), bound);
                case_scope.set_local(name.clone(), var);
            }
            let outcome = self.eval_block(ctx, body, &case_scope);
            if outcome.is_error() && first_error.is_none() {
                first_error = Some(outcome);
            }
        }
        first_error.unwrap_or(Object::Nil)
    }

    /// The object bound to the switch variable in one case: a
    /// placeholder narrowed to the single case type, or the original
    /// value for `default`, multi-type cases, and `nil`.
    fn type_switch_binding(
        &self,
        ctx: &FileCtx,
        exprs: &[ast::ExprId],
        subject: &Object,
    ) -> Object {
        if exprs.len() != 1 {
            return subject.clone();
        }
        let ty = exprs[0];
        if let ExprKind::Ident(name) = &ctx.file.expr(ty).kind {
            if name == "nil" {
                return subject.clone();
            }
        }
        Object::placeholder(self.assertion_placeholder(ctx, ty, subject.clone()))
    }

    fn eval_select(&self, ctx: &FileCtx, cases: &[ast::StmtId], env: &Env) -> Object {
        let mut first_error = None;
        for &case in cases {
            let StmtKind::Comm { comm, body } = &ctx.file.stmt(case).kind else {
                continue;
            };
            let case_scope = env.enclosed();
            if let Some(comm) = comm {
                let result = self.eval_stmt(ctx, *comm, &case_scope);
                if result.is_error() && first_error.is_none() {
                    first_error = Some(result);
                }
            }
            let outcome = self.eval_block(ctx, body, &case_scope);
            if outcome.is_error() && first_error.is_none() {
                first_error = Some(outcome);
            }
        }
        first_error.unwrap_or(Object::Nil)
    }
}

/// Break/continue are consumed by the nearest enclosing loop; return
/// and error keep propagating.
fn loop_outcome(outcome: Object) -> Object {
    match outcome {
        Object::Break { .. } | Object::Continue { .. } => Object::Nil,
        other => other,
    }
}

/// Key/value binding types for `range` over a collection.
fn range_binding_types(
    collection: &Object,
) -> (Option<Arc<FieldType>>, Option<Arc<FieldType>>) {
    let int = || Some(Arc::new(FieldType::builtin("int")));
    match collection.unwrap_value() {
        Object::Slice(s) => (int(), s.elem_type.clone()),
        Object::Map(m) => (m.key_type.clone(), m.value_type.clone()),
        Object::Str(_) => (int(), Some(Arc::new(FieldType::builtin("rune")))),
        Object::Channel(ch) => (ch.elem_type.clone(), None),
        Object::Integer(_) => (int(), None),
        Object::Placeholder(p) => match &p.static_type {
            Some(ty) if ty.flags.contains(TypeFlags::MAP) => {
                (ty.map_key.clone(), ty.elem.clone())
            }
            Some(ty)
                if ty
                    .flags
                    .intersects(TypeFlags::SLICE | TypeFlags::ARRAY | TypeFlags::VARIADIC) =>
            {
                (int(), ty.elem.clone())
            }
            Some(ty) if ty.flags.contains(TypeFlags::CHAN) => (ty.elem.clone(), None),
            _ => (None, None),
        },
        _ => (None, None),
    }
}
