//! Constant folding at scan time.
//!
//! Evaluates `const` initializers (including `iota` groups) with
//! dependency-driven, cycle-guarded recursion. Folding one constant is
//! wrapped in `catch_unwind`: a panic in host arithmetic marks that
//! constant unknown instead of aborting the package scan.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use argus_syntax::ast::{self, BinaryOp, ExprKind, LitKind, UnaryOp};
use argus_syntax::literal;

use crate::entity::ConstValue;

/// A constant awaiting evaluation: its initializer expression plus the
/// iota index of its spec within the group.
pub(crate) struct PendingConst {
    pub name: String,
    pub file: Arc<ast::File>,
    /// `None` when the spec (and its inherited predecessors) had no
    /// initializer for this position.
    pub expr: Option<ast::ExprId>,
    pub iota: Option<i64>,
    pub value: Option<ConstValue>,
}

/// Evaluate every pending constant in place.
pub(crate) fn evaluate_constants(pending: &mut [PendingConst]) {
    let index: FxHashMap<String, usize> = pending
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect();
    for i in 0..pending.len() {
        let mut visiting = FxHashSet::default();
        eval_pending(pending, &index, i, &mut visiting);
    }
}

fn eval_pending(
    pending: &mut [PendingConst],
    index: &FxHashMap<String, usize>,
    i: usize,
    visiting: &mut FxHashSet<usize>,
) -> ConstValue {
    if let Some(value) = &pending[i].value {
        return value.clone();
    }
    if !visiting.insert(i) {
        debug!(name = %pending[i].name, "constant initializer cycle");
        pending[i].value = Some(ConstValue::Unknown);
        return ConstValue::Unknown;
    }

    let value = match pending[i].expr {
        None => ConstValue::Unknown,
        Some(expr) => {
            let file = Arc::clone(&pending[i].file);
            let iota = pending[i].iota;
            std::panic::catch_unwind(AssertUnwindSafe(|| {
                eval_expr(&file, expr, iota, pending, index, visiting)
            }))
            .unwrap_or(ConstValue::Unknown)
        }
    };

    visiting.remove(&i);
    pending[i].value = Some(value.clone());
    value
}

fn eval_expr(
    file: &ast::File,
    id: ast::ExprId,
    iota: Option<i64>,
    pending: &mut [PendingConst],
    index: &FxHashMap<String, usize>,
    visiting: &mut FxHashSet<usize>,
) -> ConstValue {
    match &file.expr(id).kind {
        ExprKind::BasicLit { kind, value } => literal_value(*kind, value),
        ExprKind::Paren(inner) => eval_expr(file, *inner, iota, pending, index, visiting),
        ExprKind::Ident(name) => match name.as_str() {
            "iota" => iota.map_or(ConstValue::Unknown, ConstValue::Int),
            "true" => ConstValue::Bool(true),
            "false" => ConstValue::Bool(false),
            _ => match index.get(name) {
                Some(&j) => eval_pending(pending, index, j, visiting),
                None => ConstValue::Unknown,
            },
        },
        ExprKind::Unary { op, x } => {
            let value = eval_expr(file, *x, iota, pending, index, visiting);
            eval_unary(*op, value)
        }
        ExprKind::Binary { op, x, y } => {
            let lhs = eval_expr(file, *x, iota, pending, index, visiting);
            let rhs = eval_expr(file, *y, iota, pending, index, visiting);
            eval_binary(*op, lhs, rhs)
        }
        // A single-argument call in constant position is a conversion:
        // `Color(iota)`, `int64(x)`. Fold the operand.
        ExprKind::Call { args, .. } if args.len() == 1 => {
            eval_expr(file, args[0], iota, pending, index, visiting)
        }
        _ => ConstValue::Unknown,
    }
}

fn literal_value(kind: LitKind, text: &str) -> ConstValue {
    match kind {
        LitKind::Int => literal::parse_int(text).map_or(ConstValue::Unknown, ConstValue::Int),
        LitKind::Float => {
            literal::parse_float(text).map_or(ConstValue::Unknown, ConstValue::Float)
        }
        LitKind::Rune => {
            literal::parse_rune(text).map_or(ConstValue::Unknown, |c| ConstValue::Int(c as i64))
        }
        LitKind::String => {
            literal::unquote_string(text).map_or(ConstValue::Unknown, ConstValue::Str)
        }
        LitKind::Imag => ConstValue::Unknown,
    }
}

fn eval_unary(op: UnaryOp, value: ConstValue) -> ConstValue {
    match (op, value) {
        (UnaryOp::Plus, v @ (ConstValue::Int(_) | ConstValue::Float(_))) => v,
        (UnaryOp::Minus, ConstValue::Int(v)) => {
            v.checked_neg().map_or(ConstValue::Unknown, ConstValue::Int)
        }
        (UnaryOp::Minus, ConstValue::Float(v)) => ConstValue::Float(-v),
        (UnaryOp::Xor, ConstValue::Int(v)) => ConstValue::Int(!v),
        (UnaryOp::Not, ConstValue::Bool(v)) => ConstValue::Bool(!v),
        _ => ConstValue::Unknown,
    }
}

fn eval_binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> ConstValue {
    use ConstValue::{Bool, Float, Int, Str};

    // Numeric promotion: int op float folds as float.
    let (lhs, rhs) = match (lhs, rhs) {
        (Int(a), Float(b)) => (Float(a as f64), Float(b)),
        (Float(a), Int(b)) => (Float(a), Float(b as f64)),
        other => other,
    };

    match (op, lhs, rhs) {
        (BinaryOp::Add, Int(a), Int(b)) => a.checked_add(b).map_or(ConstValue::Unknown, Int),
        (BinaryOp::Sub, Int(a), Int(b)) => a.checked_sub(b).map_or(ConstValue::Unknown, Int),
        (BinaryOp::Mul, Int(a), Int(b)) => a.checked_mul(b).map_or(ConstValue::Unknown, Int),
        (BinaryOp::Quo, Int(a), Int(b)) => a.checked_div(b).map_or(ConstValue::Unknown, Int),
        (BinaryOp::Rem, Int(a), Int(b)) => a.checked_rem(b).map_or(ConstValue::Unknown, Int),
        (BinaryOp::And, Int(a), Int(b)) => Int(a & b),
        (BinaryOp::Or, Int(a), Int(b)) => Int(a | b),
        (BinaryOp::Xor, Int(a), Int(b)) => Int(a ^ b),
        (BinaryOp::AndNot, Int(a), Int(b)) => Int(a & !b),
        (BinaryOp::Shl, Int(a), Int(b)) => u32::try_from(b)
            .ok()
            .and_then(|shift| a.checked_shl(shift))
            .map_or(ConstValue::Unknown, Int),
        (BinaryOp::Shr, Int(a), Int(b)) => u32::try_from(b)
            .ok()
            .and_then(|shift| a.checked_shr(shift))
            .map_or(ConstValue::Unknown, Int),

        (BinaryOp::Add, Float(a), Float(b)) => Float(a + b),
        (BinaryOp::Sub, Float(a), Float(b)) => Float(a - b),
        (BinaryOp::Mul, Float(a), Float(b)) => Float(a * b),
        (BinaryOp::Quo, Float(a), Float(b)) => Float(a / b),

        (BinaryOp::Add, Str(a), Str(b)) => Str(a + &b),

        (BinaryOp::Eq, a, b) => compare(&a, &b).map_or(ConstValue::Unknown, Bool),
        (BinaryOp::NotEq, a, b) => compare(&a, &b).map_or(ConstValue::Unknown, |eq| Bool(!eq)),
        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::LtEq, Int(a), Int(b)) => Bool(a <= b),
        (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinaryOp::GtEq, Int(a), Int(b)) => Bool(a >= b),
        (BinaryOp::Lt, Float(a), Float(b)) => Bool(a < b),
        (BinaryOp::LtEq, Float(a), Float(b)) => Bool(a <= b),
        (BinaryOp::Gt, Float(a), Float(b)) => Bool(a > b),
        (BinaryOp::GtEq, Float(a), Float(b)) => Bool(a >= b),

        (BinaryOp::LogicalAnd, Bool(a), Bool(b)) => Bool(a && b),
        (BinaryOp::LogicalOr, Bool(a), Bool(b)) => Bool(a || b),

        _ => ConstValue::Unknown,
    }
}

fn compare(a: &ConstValue, b: &ConstValue) -> Option<bool> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(x == y),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(x == y),
        (ConstValue::Str(x), ConstValue::Str(y)) => Some(x == y),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(x == y),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pending_from(src: &str) -> Vec<PendingConst> {
        let file = Arc::new(argus_syntax::parse_file("consts.go", src).unwrap());
        let mut out = Vec::new();
        for decl in &file.decls {
            let ast::Decl::Gen(gen) = decl else { continue };
            if gen.kind != ast::DeclKind::Const {
                continue;
            }
            let mut inherited: Vec<ast::ExprId> = Vec::new();
            for (spec_index, spec) in gen.specs.iter().enumerate() {
                let ast::Spec::Value(value_spec) = spec else {
                    continue;
                };
                if !value_spec.values.is_empty() {
                    inherited = value_spec.values.clone();
                }
                for (i, name) in value_spec.names.iter().enumerate() {
                    out.push(PendingConst {
                        name: name.name.clone(),
                        file: Arc::clone(&file),
                        expr: inherited.get(i).copied(),
                        iota: Some(spec_index as i64),
                        value: None,
                    });
                }
            }
        }
        out
    }

    #[test]
    fn test_iota_sequence() {
        let mut pending =
            pending_from("package p\n\nconst (\n\tRed = iota\n\tGreen\n\tBlue\n)\n");
        evaluate_constants(&mut pending);
        let values: Vec<_> = pending.iter().map(|c| c.value.clone().unwrap()).collect();
        assert_eq!(
            values,
            vec![ConstValue::Int(0), ConstValue::Int(1), ConstValue::Int(2)]
        );
    }

    #[test]
    fn test_iota_with_shift() {
        let mut pending =
            pending_from("package p\n\nconst (\n\t_ = iota\n\tKB = 1 << (10 * iota)\n\tMB\n)\n");
        evaluate_constants(&mut pending);
        assert_eq!(pending[1].value, Some(ConstValue::Int(1024)));
        assert_eq!(pending[2].value, Some(ConstValue::Int(1024 * 1024)));
    }

    #[test]
    fn test_reference_and_arithmetic() {
        let mut pending = pending_from(
            "package p\n\nconst (\n\tA = 2\n\tB = A * 3\n\tC = \"x\" + \"y\"\n\tD = A > 1\n)\n",
        );
        evaluate_constants(&mut pending);
        assert_eq!(pending[1].value, Some(ConstValue::Int(6)));
        assert_eq!(pending[2].value, Some(ConstValue::Str("xy".to_string())));
        assert_eq!(pending[3].value, Some(ConstValue::Bool(true)));
    }

    #[test]
    fn test_cycle_is_unknown() {
        let mut pending = pending_from("package p\n\nconst (\n\tA = B\n\tB = A\n)\n");
        evaluate_constants(&mut pending);
        assert_eq!(pending[0].value, Some(ConstValue::Unknown));
    }

    #[test]
    fn test_division_by_zero_is_unknown() {
        let mut pending = pending_from("package p\n\nconst A = 1 / 0\n");
        evaluate_constants(&mut pending);
        assert_eq!(pending[0].value, Some(ConstValue::Unknown));
    }

    #[test]
    fn test_conversion_folds_operand() {
        let mut pending =
            pending_from("package p\n\nconst (\n\tA Color = Color(iota + 1)\n)\n");
        evaluate_constants(&mut pending);
        assert_eq!(pending[0].value, Some(ConstValue::Int(1)));
    }
}
