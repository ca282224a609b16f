//! Node arena.
//!
//! Expression and statement nodes live in per-file vectors and are
//! addressed by `u32` ids instead of boxes, so entity records elsewhere
//! can hold on to a node with `(Arc<File>, id)` without self-referential
//! lifetimes.

use std::fmt;

use super::expr::Expr;
use super::stmt::Stmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id! {
    /// Index of an [`Expr`] in its file's arena.
    ExprId
}

define_id! {
    /// Index of a [`Stmt`] in its file's arena.
    StmtId
}

/// Per-file node storage.
#[derive(Default, Debug)]
pub struct Arena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId::new(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId::new(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    /// Replace a statement in place.
    ///
    /// The scanner uses this to clear function bodies in
    /// declarations-only packages.
    pub fn replace_stmt(&mut self, id: StmtId, stmt: Stmt) {
        self.stmts[id.index()] = stmt;
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}
