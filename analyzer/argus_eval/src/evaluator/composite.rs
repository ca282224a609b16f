//! Composite literals.
//!
//! In-policy named types materialize as `Instance`s with a field map;
//! out-of-policy and unresolved types materialize as placeholders that
//! still carry the syntactic `FieldType`. Slice and map literals build
//! real slice/map objects so `range` and `len` stay precise.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use argus_scan::{FieldType, TypeFlags, TypeInfo, TypeKind};
use argus_syntax::ast::{self, ExprKind};

use crate::env::Env;
use crate::object::{InstanceObj, MapObj, Object, PlaceholderObj};

use super::expr::slice_of;
use super::{Evaluator, FileCtx};

impl Evaluator {
    pub(crate) fn eval_composite(&self, ctx: &FileCtx, id: ast::ExprId, env: &Env) -> Object {
        let expr = ctx.file.expr(id);
        let ExprKind::CompositeLit { ty, elems } = &expr.kind else {
            return self.error_at(ctx, expr.span, "internal: not a composite literal");
        };
        let Some(ty) = ty else {
            // Type-elided nested literal reaching here without an
            // expected type: evaluate children, stay symbolic.
            for &elem in elems {
                let value = self.eval_elem(ctx, elem, None, env);
                if value.is_error() {
                    return value;
                }
            }
            return Object::placeholder(PlaceholderObj::new("untyped composite literal"));
        };
        let field_type =
            self.session()
                .type_info_from_expr(&ctx.file, *ty, &[], &ctx.pkg.import_path);
        self.composite_of_type(ctx, &field_type, elems, env)
    }

    fn composite_of_type(
        &self,
        ctx: &FileCtx,
        field_type: &Arc<FieldType>,
        elems: &[ast::ExprId],
        env: &Env,
    ) -> Object {
        if field_type
            .flags
            .intersects(TypeFlags::SLICE | TypeFlags::ARRAY)
        {
            let elem_ty = field_type.elem.clone();
            let mut values = Vec::with_capacity(elems.len());
            for &elem in elems {
                let value = self.eval_elem(ctx, elem, elem_ty.as_ref(), env);
                if value.is_error() {
                    return value;
                }
                values.push(value);
            }
            return slice_of(elem_ty, values);
        }

        if field_type.flags.contains(TypeFlags::MAP) {
            let value_ty = field_type.elem.clone();
            let mut entries = Vec::with_capacity(elems.len());
            for &elem in elems {
                match &ctx.file.expr(elem).kind {
                    ExprKind::KeyValue { key, value } => {
                        let key = self.eval_elem(ctx, *key, field_type.map_key.as_ref(), env);
                        if key.is_error() {
                            return key;
                        }
                        let value = self.eval_elem(ctx, *value, value_ty.as_ref(), env);
                        if value.is_error() {
                            return value;
                        }
                        entries.push((key, value));
                    }
                    _ => {
                        let value = self.eval_elem(ctx, elem, value_ty.as_ref(), env);
                        if value.is_error() {
                            return value;
                        }
                    }
                }
            }
            return Object::Map(Rc::new(MapObj {
                key_type: field_type.map_key.clone(),
                value_type: value_ty,
                entries: RefCell::new(entries),
            }));
        }

        // Named (possibly instantiated or pointer-free) type.
        let leaf = field_type.leaf();
        if !leaf.full_import_path.is_empty()
            && !self.session().policy_allows(&leaf.full_import_path)
        {
            for &elem in elems {
                let value = self.eval_elem(ctx, elem, None, env);
                if value.is_error() {
                    return value;
                }
            }
            let mut placeholder = PlaceholderObj::new(format!(
                "composite literal of out-of-policy type {leaf}"
            ))
            .with_type(Arc::clone(field_type));
            placeholder.type_info = Some(self.session().resolve_type(field_type));
            return Object::placeholder(placeholder);
        }

        let info = self.session().resolve_type(field_type);
        if info.unresolved {
            for &elem in elems {
                let value = self.eval_elem(ctx, elem, None, env);
                if value.is_error() {
                    return value;
                }
            }
            return Object::placeholder(
                PlaceholderObj::new(format!("composite literal of unresolved type {leaf}"))
                    .with_type(Arc::clone(field_type))
                    .with_info(info),
            );
        }

        // `type Points []Point` literals follow the underlying shape.
        if info.kind == TypeKind::Alias {
            if let Some(underlying) = info.underlying.clone() {
                if underlying
                    .flags
                    .intersects(TypeFlags::SLICE | TypeFlags::ARRAY | TypeFlags::MAP)
                {
                    return self.composite_of_type(ctx, &underlying, elems, env);
                }
            }
        }

        self.instance_literal(ctx, &info, field_type, elems, env)
    }

    fn instance_literal(
        &self,
        ctx: &FileCtx,
        info: &Arc<TypeInfo>,
        field_type: &Arc<FieldType>,
        elems: &[ast::ExprId],
        env: &Env,
    ) -> Object {
        let mut fields: FxHashMap<String, Object> = FxHashMap::default();
        let struct_fields = info
            .struct_info
            .as_ref()
            .map(|s| s.fields.as_slice())
            .unwrap_or(&[]);

        for (i, &elem) in elems.iter().enumerate() {
            match &ctx.file.expr(elem).kind {
                ExprKind::KeyValue { key, value } => {
                    let name = match &ctx.file.expr(*key).kind {
                        ExprKind::Ident(name) => name.clone(),
                        _ => {
                            let evaluated = self.eval_expr(ctx, *key, env);
                            if evaluated.is_error() {
                                return evaluated;
                            }
                            continue;
                        }
                    };
                    let expected = struct_fields
                        .iter()
                        .find(|f| f.name == name)
                        .map(|f| Arc::clone(&f.ty));
                    let value = self.eval_elem(ctx, *value, expected.as_ref(), env);
                    if value.is_error() {
                        return value;
                    }
                    fields.insert(name, value);
                }
                _ => {
                    // Positional elements follow declaration order.
                    let expected = struct_fields.get(i);
                    let value = self.eval_elem(
                        ctx,
                        elem,
                        expected.map(|f| &f.ty),
                        env,
                    );
                    if value.is_error() {
                        return value;
                    }
                    if let Some(field) = expected {
                        fields.insert(field.name.clone(), value);
                    }
                }
            }
        }

        Object::Instance(Rc::new(InstanceObj {
            type_info: Arc::clone(info),
            field_type: Some(Arc::clone(field_type)),
            fields: RefCell::new(fields),
        }))
    }

    /// One literal element; `{…}` with an elided type builds a value of
    /// the expected element type.
    fn eval_elem(
        &self,
        ctx: &FileCtx,
        elem: ast::ExprId,
        expected: Option<&Arc<FieldType>>,
        env: &Env,
    ) -> Object {
        if let ExprKind::CompositeLit { ty: None, elems } = &ctx.file.expr(elem).kind {
            if let Some(expected) = expected {
                return self.composite_of_type(ctx, expected, elems, env);
            }
        }
        let value = self.eval_expr(ctx, elem, env);
        if value.is_error() {
            value
        } else {
            value.unwrap_value()
        }
    }
}
