//! AST for Go source files.
//!
//! A parsed [`File`] owns an [`Arena`] of expression and statement
//! nodes plus the top-level declarations. Consumers share files behind
//! `Arc` and reference nodes by id.

mod arena;
pub mod expr;
pub mod stmt;

pub use arena::{Arena, ExprId, StmtId};
pub use expr::{BinaryOp, ChanDir, Expr, ExprKind, LitKind, UnaryOp};
pub use stmt::{AssignOp, BranchKind, Stmt, StmtKind};

use std::path::PathBuf;

use crate::span::{LineIndex, Span};

/// An identifier with its span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident { name: name.into(), span }
    }

    /// The blank identifier `_`.
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }

    /// Go exports identifiers that start with an upper-case letter.
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }
}

/// One field (or parameter, or result) declaration.
///
/// `names` is empty for embedded struct fields and unnamed
/// parameters/results.
#[derive(Clone, Debug)]
pub struct Field {
    pub doc: Option<String>,
    pub names: Vec<Ident>,
    pub ty: ExprId,
    /// Struct field tag, with its original quoting.
    pub tag: Option<String>,
    pub span: Span,
}

/// A function signature: type parameters, parameters, results.
#[derive(Clone, Debug, Default)]
pub struct FuncType {
    pub type_params: Vec<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

/// One element of an interface body.
#[derive(Clone, Debug)]
pub enum InterfaceElem {
    /// A method: `Name(params) results`.
    Method {
        doc: Option<String>,
        name: Ident,
        sig: Box<FuncType>,
    },
    /// An embedded interface or a type-set term (possibly a `|` union
    /// or a `~T` approximation element).
    Embedded { ty: ExprId },
}

/// `import` / `const` / `var` / `type` keyword of a [`GenDecl`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DeclKind {
    Import,
    Const,
    Var,
    Type,
}

/// A single import.
#[derive(Clone, Debug)]
pub struct ImportSpec {
    pub doc: Option<String>,
    /// Local name override (`f "fmt"`), including `_` and `.`.
    pub name: Option<Ident>,
    /// Import path with quotes removed.
    pub path: String,
    pub span: Span,
}

/// Names/type/values of one `const` or `var` spec line.
#[derive(Clone, Debug)]
pub struct ValueSpec {
    pub doc: Option<String>,
    pub names: Vec<Ident>,
    pub ty: Option<ExprId>,
    pub values: Vec<ExprId>,
    pub span: Span,
}

/// One `type` spec.
#[derive(Clone, Debug)]
pub struct TypeSpec {
    pub doc: Option<String>,
    pub name: Ident,
    pub type_params: Vec<Field>,
    /// True for `type A = B` aliases.
    pub assign: bool,
    pub ty: ExprId,
    pub span: Span,
}

/// One spec inside a [`GenDecl`].
#[derive(Clone, Debug)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

/// A (possibly grouped) `import`/`const`/`var`/`type` declaration.
#[derive(Clone, Debug)]
pub struct GenDecl {
    /// Comment above the `const`/`var`/`type` keyword; specs fall back
    /// to this when they have no doc of their own.
    pub doc: Option<String>,
    pub kind: DeclKind,
    /// True when written with parentheses (`const ( ... )`).
    pub grouped: bool,
    pub specs: Vec<Spec>,
    pub span: Span,
}

/// A `func` declaration (function or method).
#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub doc: Option<String>,
    /// Receiver field for methods.
    pub recv: Option<Field>,
    pub name: Ident,
    pub sig: FuncType,
    /// `None` for bodyless declarations (assembly stubs, externs).
    pub body: Option<StmtId>,
    pub span: Span,
}

/// A top-level declaration.
#[derive(Clone, Debug)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

/// A parsed source file.
#[derive(Debug)]
pub struct File {
    pub path: PathBuf,
    pub package: Ident,
    /// Package doc comment (above the `package` clause).
    pub doc: Option<String>,
    /// All imports, flattened across import declarations.
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub arena: Arena,
    pub line_index: LineIndex,
}

impl File {
    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        self.arena.expr(id)
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        self.arena.stmt(id)
    }

    /// Render a node span as `path:line:col`.
    pub fn position_of(&self, span: Span) -> String {
        let pos = self.line_index.position(span.start);
        format!("{}:{}", self.path.display(), pos)
    }
}
