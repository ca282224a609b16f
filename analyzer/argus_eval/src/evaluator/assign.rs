//! Assignments: definitions, mutations, tuple unpacking, comma-ok
//! forms, and interface possible-type tracking.

use argus_syntax::ast::{self, AssignOp, BinaryOp, ExprKind, UnaryOp};

use crate::env::Env;
use crate::object::{Object, PlaceholderObj};

use super::expr::{fold_arithmetic, static_type_of};
use super::{Evaluator, FileCtx};

impl Evaluator {
    pub(crate) fn eval_assign(
        &self,
        ctx: &FileCtx,
        lhs: &[ast::ExprId],
        op: AssignOp,
        rhs: &[ast::ExprId],
        env: &Env,
    ) -> Object {
        match op {
            AssignOp::Assign | AssignOp::Define => {}
            _ => return self.eval_op_assign(ctx, lhs, op, rhs, env),
        }
        let define = op == AssignOp::Define;

        // Comma-ok: `v, ok := x.(T)` / `m[k]` / `<-ch`. The ok is
        // pinned to true — assertions are never refuted symbolically.
        if lhs.len() == 2 && rhs.len() == 1 {
            if let Some(values) = self.comma_ok_values(ctx, rhs[0], env) {
                return self.assign_values(ctx, lhs, values, define, env);
            }
        }

        // All right-hand sides evaluate before any assignment.
        let values = if rhs.len() == 1 && lhs.len() > 1 {
            let value = self.eval_expr(ctx, rhs[0], env);
            if value.is_error() {
                return value;
            }
            match value.unwrap_value() {
                Object::MultiReturn(values) => values.as_ref().clone(),
                other => {
                    // Arity mismatch that is not a tuple: pad with
                    // placeholders rather than guessing.
                    let mut padded = vec![other];
                    while padded.len() < lhs.len() {
                        padded.push(Object::placeholder(PlaceholderObj::new(
                            "missing assignment value",
                        )));
                    }
                    padded
                }
            }
        } else {
            let mut values = Vec::with_capacity(rhs.len());
            for &expr in rhs {
                let value = self.eval_expr(ctx, expr, env);
                if value.is_error() {
                    return value;
                }
                values.push(value.unwrap_value());
            }
            values
        };

        self.assign_values(ctx, lhs, values, define, env)
    }

    fn comma_ok_values(
        &self,
        ctx: &FileCtx,
        rhs: ast::ExprId,
        env: &Env,
    ) -> Option<Vec<Object>> {
        let ok = Object::Boolean(true);
        match &ctx.file.expr(rhs).kind {
            ExprKind::TypeAssert { x, ty: Some(ty) } => {
                let value = self.eval_expr(ctx, *x, env);
                if value.is_error() {
                    return Some(vec![value, ok]);
                }
                let placeholder = self.assertion_placeholder(ctx, *ty, value.unwrap_value());
                Some(vec![Object::placeholder(placeholder), ok])
            }
            ExprKind::Index { .. } | ExprKind::Unary { op: UnaryOp::Recv, .. } => {
                let value = self.eval_expr(ctx, rhs, env);
                Some(vec![value.unwrap_value(), ok])
            }
            _ => None,
        }
    }

    fn assign_values(
        &self,
        ctx: &FileCtx,
        lhs: &[ast::ExprId],
        values: Vec<Object>,
        define: bool,
        env: &Env,
    ) -> Object {
        for (i, &target) in lhs.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or_else(|| {
                Object::placeholder(PlaceholderObj::new("missing assignment value"))
            });
            let result = self.assign_one(ctx, target, value, define, env);
            if result.is_error() {
                return result;
            }
        }
        Object::Nil
    }

    fn assign_one(
        &self,
        ctx: &FileCtx,
        target: ast::ExprId,
        value: Object,
        define: bool,
        env: &Env,
    ) -> Object {
        match &ctx.file.expr(target).kind {
            ExprKind::Ident(name) if name == "_" => Object::Nil,

            ExprKind::Ident(name) => {
                if define {
                    let var =
                        self.new_variable(name.clone(), static_type_of(&value), value);
                    env.set_local(name.clone(), var);
                    return Object::Nil;
                }
                match env.get(name) {
                    Some(Object::Variable(var)) => {
                        *var.value.borrow_mut() = value.clone();
                        if var.interface_typed {
                            if let Some(key) = value.type_key() {
                                var.possible_types.borrow_mut().insert(key);
                            }
                        }
                        Object::Nil
                    }
                    Some(_) | None => {
                        env.set(name, value);
                        Object::Nil
                    }
                }
            }

            ExprKind::Paren(inner) => self.assign_one(ctx, *inner, value, define, env),

            ExprKind::Selector { x, sel } => {
                let base = self.eval_expr(ctx, *x, env);
                if base.is_error() {
                    return base;
                }
                set_field(&base, &sel.name, value);
                Object::Nil
            }

            ExprKind::Index { x, indices } => {
                let base = self.eval_expr(ctx, *x, env);
                if base.is_error() {
                    return base;
                }
                for &index in indices {
                    let idx = self.eval_expr(ctx, index, env);
                    if idx.is_error() {
                        return idx;
                    }
                }
                if let Object::Map(map) = base.unwrap_value() {
                    map.entries.borrow_mut().push((
                        Object::placeholder(PlaceholderObj::new("map key")),
                        value,
                    ));
                }
                Object::Nil
            }

            ExprKind::Star(inner) => {
                let pointer = self.eval_expr(ctx, *inner, env);
                if pointer.is_error() {
                    return pointer;
                }
                if let Object::Pointer(p) = pointer.unwrap_value() {
                    *p.pointee.borrow_mut() = value;
                }
                Object::Nil
            }

            _ => {
                let result = self.eval_expr(ctx, target, env);
                if result.is_error() {
                    result
                } else {
                    Object::Nil
                }
            }
        }
    }

    /// `x op= y`: fold when both sides are concrete, otherwise leave a
    /// symbolic value behind.
    fn eval_op_assign(
        &self,
        ctx: &FileCtx,
        lhs: &[ast::ExprId],
        op: AssignOp,
        rhs: &[ast::ExprId],
        env: &Env,
    ) -> Object {
        let (&target, &operand) = match (lhs.first(), rhs.first()) {
            (Some(t), Some(o)) => (t, o),
            _ => return Object::Nil,
        };
        let current = self.eval_expr(ctx, target, env);
        if current.is_error() {
            return current;
        }
        let operand = self.eval_expr(ctx, operand, env);
        if operand.is_error() {
            return operand;
        }
        let folded = binary_of(op)
            .and_then(|bin| {
                fold_arithmetic(bin, &current.unwrap_value(), &operand.unwrap_value())
            })
            .unwrap_or_else(|| {
                self.symbolic_binary_result(&current.unwrap_value(), &operand.unwrap_value())
            });
        self.assign_one(ctx, target, folded, false, env)
    }
}

/// Store a field through variable/pointer/placeholder wrappers.
fn set_field(base: &Object, name: &str, value: Object) {
    match base {
        Object::Variable(v) => set_field(&v.value.borrow().clone(), name, value),
        Object::Pointer(p) => set_field(&p.pointee.borrow().clone(), name, value),
        Object::Instance(inst) => {
            inst.fields.borrow_mut().insert(name.to_string(), value);
        }
        Object::Placeholder(p) => {
            if let Some(origin) = &p.origin {
                set_field(origin, name, value);
            }
        }
        _ => {}
    }
}

fn binary_of(op: AssignOp) -> Option<BinaryOp> {
    Some(match op {
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Quo => BinaryOp::Quo,
        AssignOp::Rem => BinaryOp::Rem,
        AssignOp::And => BinaryOp::And,
        AssignOp::Or => BinaryOp::Or,
        AssignOp::Xor => BinaryOp::Xor,
        AssignOp::Shl => BinaryOp::Shl,
        AssignOp::Shr => BinaryOp::Shr,
        AssignOp::AndNot => BinaryOp::AndNot,
        AssignOp::Assign | AssignOp::Define => return None,
    })
}
