//! Parser tests over small but realistic files.

use pretty_assertions::assert_eq;

use crate::ast::{
    AssignOp, Decl, DeclKind, ExprKind, File, InterfaceElem, LitKind, Spec, StmtKind, UnaryOp,
};
use crate::parse_file;

fn parse(src: &str) -> File {
    match parse_file("test.go", src) {
        Ok(file) => file,
        Err(err) => panic!("parse failed at offset {}: {err}", err.offset()),
    }
}

#[test]
fn test_package_clause_and_imports() {
    let file = parse(
        r#"// Package demo does demo things.
package demo

import (
	"fmt"
	renamed "strings"
	_ "embed"
)

import "os"
"#,
    );
    assert_eq!(file.package.name, "demo");
    assert_eq!(file.doc.as_deref(), Some("Package demo does demo things."));
    let paths: Vec<_> = file.imports.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, vec!["fmt", "strings", "embed", "os"]);
    assert_eq!(file.imports[1].name.as_ref().map(|n| n.name.as_str()), Some("renamed"));
    assert_eq!(file.imports[2].name.as_ref().map(|n| n.name.as_str()), Some("_"));
}

#[test]
fn test_const_group_with_iota() {
    let file = parse(
        "package p\n\ntype Color int\n\nconst (\n\tRed Color = iota\n\tGreen\n\tBlue\n)\n",
    );
    let Some(Decl::Gen(gen)) = file.decls.get(1) else {
        panic!("expected const group");
    };
    assert_eq!(gen.kind, DeclKind::Const);
    assert!(gen.grouped);
    assert_eq!(gen.specs.len(), 3);
    let Spec::Value(first) = &gen.specs[0] else {
        panic!("expected value spec");
    };
    assert_eq!(first.names[0].name, "Red");
    assert!(first.ty.is_some());
    assert_eq!(first.values.len(), 1);
    let Spec::Value(second) = &gen.specs[1] else {
        panic!("expected value spec");
    };
    assert!(second.ty.is_none());
    assert!(second.values.is_empty());
}

#[test]
fn test_func_decl_with_receiver_and_doc() {
    let file = parse(
        "package p\n\n// Greet says hello.\n// Second line.\nfunc (p *Person) Greet(name string) (string, error) {\n\treturn name, nil\n}\n",
    );
    let Some(Decl::Func(func)) = file.decls.first() else {
        panic!("expected func decl");
    };
    assert_eq!(func.name.name, "Greet");
    assert_eq!(func.doc.as_deref(), Some("Greet says hello.\nSecond line."));
    let recv = func.recv.as_ref().map(|r| r.names[0].name.as_str());
    assert_eq!(recv, Some("p"));
    assert_eq!(func.sig.params.len(), 1);
    assert_eq!(func.sig.results.len(), 2);
    assert!(func.body.is_some());
}

#[test]
fn test_struct_with_embedded_and_tags() {
    let file = parse(
        "package p\n\ntype User struct {\n\t*Base\n\tName string `json:\"name\"`\n\tAge, Height int\n}\n",
    );
    let Some(Decl::Gen(gen)) = file.decls.first() else {
        panic!("expected type decl");
    };
    let Spec::Type(spec) = &gen.specs[0] else {
        panic!("expected type spec");
    };
    let ExprKind::StructType { fields } = &file.expr(spec.ty).kind else {
        panic!("expected struct type");
    };
    assert_eq!(fields.len(), 3);
    assert!(fields[0].names.is_empty(), "embedded field has no names");
    assert_eq!(fields[1].tag.as_deref(), Some("`json:\"name\"`"));
    assert_eq!(fields[2].names.len(), 2);
}

#[test]
fn test_interface_with_union_terms() {
    let file = parse(
        "package p\n\ntype Number interface {\n\t~int | ~float64\n\tString() string\n}\n",
    );
    let Some(Decl::Gen(gen)) = file.decls.first() else {
        panic!("expected type decl");
    };
    let Spec::Type(spec) = &gen.specs[0] else {
        panic!("expected type spec");
    };
    let ExprKind::InterfaceType { elems } = &file.expr(spec.ty).kind else {
        panic!("expected interface type");
    };
    assert_eq!(elems.len(), 2);
    let InterfaceElem::Embedded { ty } = &elems[0] else {
        panic!("expected embedded union term");
    };
    let ExprKind::Binary { x, .. } = &file.expr(*ty).kind else {
        panic!("expected union `|`");
    };
    let ExprKind::Unary { op, .. } = &file.expr(*x).kind else {
        panic!("expected approximation term");
    };
    assert_eq!(*op, UnaryOp::Tilde);
    assert!(matches!(elems[1], InterfaceElem::Method { .. }));
}

#[test]
fn test_generic_type_and_func() {
    let file = parse(
        "package p\n\ntype Pair[K comparable, V any] struct {\n\tKey K\n\tVal V\n}\n\nfunc Map[T, U any](in []T, f func(T) U) []U {\n\treturn nil\n}\n",
    );
    let Some(Decl::Gen(gen)) = file.decls.first() else {
        panic!("expected type decl");
    };
    let Spec::Type(spec) = &gen.specs[0] else {
        panic!("expected type spec");
    };
    assert_eq!(spec.type_params.len(), 2);
    let Some(Decl::Func(func)) = file.decls.get(1) else {
        panic!("expected func decl");
    };
    assert_eq!(func.sig.type_params.len(), 1);
    assert_eq!(func.sig.type_params[0].names.len(), 2);
}

#[test]
fn test_array_type_is_not_type_params() {
    let file = parse("package p\n\ntype Buf [16]byte\n\ntype Vec []int\n");
    for decl in &file.decls {
        let Decl::Gen(gen) = decl else { continue };
        let Spec::Type(spec) = &gen.specs[0] else {
            continue;
        };
        assert!(spec.type_params.is_empty());
        assert!(matches!(
            file.expr(spec.ty).kind,
            ExprKind::ArrayType { .. }
        ));
    }
}

#[test]
fn test_type_switch_statement() {
    let file = parse(
        "package p\n\nfunc f(i interface{}) {\n\tswitch v := i.(type) {\n\tcase int:\n\t\t_ = v\n\tdefault:\n\t\t_ = v\n\t}\n}\n",
    );
    let Some(Decl::Func(func)) = file.decls.first() else {
        panic!("expected func");
    };
    let body = func.body.unwrap();
    let StmtKind::Block(stmts) = &file.stmt(body).kind else {
        panic!("expected block");
    };
    let StmtKind::TypeSwitch { assign, cases, .. } = &file.stmt(stmts[0]).kind else {
        panic!("expected type switch, got {:?}", file.stmt(stmts[0]).kind);
    };
    assert_eq!(cases.len(), 2);
    let StmtKind::Assign { op, .. } = &file.stmt(*assign).kind else {
        panic!("expected guard assignment");
    };
    assert_eq!(*op, AssignOp::Define);
}

#[test]
fn test_composite_literal_gating_in_if_header() {
    // `T{}` directly in an if header must not be taken as a literal,
    // but a parenthesized one is fine.
    let file = parse(
        "package p\n\nfunc f() {\n\tif x == (T{}) {\n\t\treturn\n\t}\n\tfor i := 0; i < 3; i++ {\n\t\tf()\n\t}\n}\n",
    );
    assert_eq!(file.decls.len(), 1);
}

#[test]
fn test_composite_literals_and_nesting() {
    let file = parse(
        "package p\n\nvar m = map[string][]Point{\n\t\"a\": {{X: 1, Y: 2}, {X: 3}},\n}\n",
    );
    let Some(Decl::Gen(gen)) = file.decls.first() else {
        panic!("expected var decl");
    };
    let Spec::Value(spec) = &gen.specs[0] else {
        panic!("expected value spec");
    };
    let ExprKind::CompositeLit { ty: Some(_), elems } = &file.expr(spec.values[0]).kind else {
        panic!("expected composite literal");
    };
    let ExprKind::KeyValue { value, .. } = &file.expr(elems[0]).kind else {
        panic!("expected keyed element");
    };
    let ExprKind::CompositeLit { ty: None, elems } = &file.expr(*value).kind else {
        panic!("expected elided-type literal");
    };
    assert_eq!(elems.len(), 2);
}

#[test]
fn test_channel_operations_and_select() {
    let file = parse(
        "package p\n\nfunc f(ch chan int, done <-chan struct{}) {\n\tgo func() {\n\t\tch <- 1\n\t}()\n\tselect {\n\tcase v := <-ch:\n\t\t_ = v\n\tcase <-done:\n\tdefault:\n\t}\n}\n",
    );
    assert_eq!(file.decls.len(), 1);
}

#[test]
fn test_defer_and_method_chain() {
    let file = parse(
        "package p\n\nfunc f() {\n\tdefer mu.Unlock()\n\tx := a.b.C(1, 2).D()\n\t_ = x\n}\n",
    );
    assert_eq!(file.decls.len(), 1);
}

#[test]
fn test_slice_expressions() {
    let file = parse(
        "package p\n\nfunc f(b []byte) []byte {\n\t_ = b[1:]\n\t_ = b[:2]\n\t_ = b[1:2:3]\n\treturn b[:]\n}\n",
    );
    assert_eq!(file.decls.len(), 1);
}

#[test]
fn test_variadic_call_and_spread() {
    let file = parse(
        "package p\n\nfunc f(args ...string) {\n\tf(args...)\n\tf(\"a\", \"b\")\n}\n",
    );
    let Some(Decl::Func(func)) = file.decls.first() else {
        panic!("expected func");
    };
    let ExprKind::Ellipsis { .. } = &file.expr(func.sig.params[0].ty).kind else {
        panic!("expected variadic parameter type");
    };
}

#[test]
fn test_string_literal_kinds() {
    let file = parse("package p\n\nvar a, b = \"x\\n\", `raw`\n");
    let Some(Decl::Gen(gen)) = file.decls.first() else {
        panic!("expected var");
    };
    let Spec::Value(spec) = &gen.specs[0] else {
        panic!("expected value spec");
    };
    for &value in &spec.values {
        assert!(matches!(
            file.expr(value).kind,
            ExprKind::BasicLit {
                kind: LitKind::String,
                ..
            }
        ));
    }
}

#[test]
fn test_parse_error_reports_offset() {
    let err = parse_file("bad.go", "package p\n\nfunc (x {}\n").unwrap_err();
    assert!(err.offset() > 0);
}

#[test]
fn test_labeled_statement_and_branch() {
    let file = parse(
        "package p\n\nfunc f() {\nloop:\n\tfor {\n\t\tbreak loop\n\t}\n}\n",
    );
    assert_eq!(file.decls.len(), 1);
}

#[test]
fn test_doc_comment_attaches_to_spec_in_group() {
    let file = parse(
        "package p\n\nconst (\n\t// A is first.\n\tA = 1\n\n\t// B is second.\n\tB = 2\n)\n",
    );
    let Some(Decl::Gen(gen)) = file.decls.first() else {
        panic!("expected const group");
    };
    let Spec::Value(a) = &gen.specs[0] else {
        panic!("expected value spec");
    };
    assert_eq!(a.doc.as_deref(), Some("A is first."));
    let Spec::Value(b) = &gen.specs[1] else {
        panic!("expected value spec");
    };
    assert_eq!(b.doc.as_deref(), Some("B is second."));
}
