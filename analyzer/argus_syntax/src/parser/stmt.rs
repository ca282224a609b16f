//! Statement parsing.

use crate::ast::{AssignOp, BranchKind, ExprId, ExprKind, Stmt, StmtId, StmtKind};
use crate::error::ParseError;
use crate::token::TokenKind;

use super::Parser;

/// Result of parsing a "simple statement" position, which in a `for`
/// header may turn out to be a range clause.
enum Simple {
    Stmt(StmtId),
    Range {
        key: Option<ExprId>,
        value: Option<ExprId>,
        define: bool,
        x: ExprId,
    },
}

impl Parser<'_> {
    pub(crate) fn alloc_stmt(&mut self, kind: StmtKind, start: u32) -> StmtId {
        let span = self.span_from(start);
        self.arena.alloc_stmt(Stmt::new(kind, span))
    }

    /// Parse one statement, including its terminating semicolon.
    pub(crate) fn parse_stmt(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;

        // Labels and empty statements terminate differently.
        if self.at(TokenKind::Ident) && self.peek_kind(1) == TokenKind::Colon {
            let label = self.parse_ident()?;
            self.advance(); // :
            let stmt = self.parse_stmt()?;
            return Ok(self.alloc_stmt(StmtKind::Labeled { label, stmt }, start));
        }
        if self.at(TokenKind::Semi) {
            self.advance();
            return Ok(self.alloc_stmt(StmtKind::Empty, start));
        }

        let id = match self.kind() {
            TokenKind::Const | TokenKind::Var | TokenKind::Type => {
                let decl = self.parse_gen_decl()?;
                self.alloc_stmt(StmtKind::Decl(decl), start)
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Select => self.parse_select()?,
            TokenKind::LBrace => self.parse_block()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Go => {
                self.advance();
                let call = self.parse_expr()?;
                self.alloc_stmt(StmtKind::Go(call), start)
            }
            TokenKind::Defer => {
                self.advance();
                let call = self.parse_expr()?;
                self.alloc_stmt(StmtKind::Defer(call), start)
            }
            TokenKind::Break => self.parse_branch(BranchKind::Break)?,
            TokenKind::Continue => self.parse_branch(BranchKind::Continue)?,
            TokenKind::Goto => self.parse_branch(BranchKind::Goto)?,
            TokenKind::Fallthrough => {
                self.advance();
                self.alloc_stmt(
                    StmtKind::Branch {
                        kind: BranchKind::Fallthrough,
                        label: None,
                    },
                    start,
                )
            }
            _ => match self.parse_simple_stmt(false)? {
                Simple::Stmt(id) => id,
                Simple::Range { .. } => return self.unexpected("statement"),
            },
        };
        self.expect_semi()?;
        Ok(id)
    }

    /// `{ stmts }`.
    pub(crate) fn parse_block(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc_stmt(StmtKind::Block(stmts), start))
    }

    fn parse_branch(&mut self, kind: BranchKind) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.advance();
        let label = if self.at(TokenKind::Ident) {
            Some(self.parse_ident()?)
        } else {
            None
        };
        Ok(self.alloc_stmt(StmtKind::Branch { kind, label }, start))
    }

    fn parse_return(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.advance();
        let results = if matches!(
            self.kind(),
            TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Eof
        ) {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        Ok(self.alloc_stmt(StmtKind::Return(results), start))
    }

    // ------------------------------------------------------------------
    // Simple statements

    fn parse_simple_stmt(&mut self, allow_range: bool) -> Result<Simple, ParseError> {
        let start = self.span().start;
        let lhs = self.parse_expr_list()?;

        if let Some(op) = assign_op(self.kind()) {
            self.advance();
            if allow_range && self.at(TokenKind::Range) {
                if !matches!(op, AssignOp::Define | AssignOp::Assign) {
                    return self.unexpected("':=' or '=' before 'range'");
                }
                if lhs.len() > 2 {
                    return self.error_at(start, "too many variables in range clause");
                }
                self.advance();
                let x = self.parse_expr()?;
                let mut iter = lhs.into_iter();
                return Ok(Simple::Range {
                    key: iter.next(),
                    value: iter.next(),
                    define: op == AssignOp::Define,
                    x,
                });
            }
            let rhs = self.parse_expr_list()?;
            return Ok(Simple::Stmt(self.alloc_stmt(
                StmtKind::Assign { lhs, op, rhs },
                start,
            )));
        }

        if lhs.len() != 1 {
            return self.unexpected("assignment");
        }
        let x = lhs[0];

        match self.kind() {
            TokenKind::Arrow => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Simple::Stmt(self.alloc_stmt(
                    StmtKind::Send { chan: x, value },
                    start,
                )))
            }
            TokenKind::Inc => {
                self.advance();
                Ok(Simple::Stmt(
                    self.alloc_stmt(StmtKind::IncDec { x, inc: true }, start),
                ))
            }
            TokenKind::Dec => {
                self.advance();
                Ok(Simple::Stmt(
                    self.alloc_stmt(StmtKind::IncDec { x, inc: false }, start),
                ))
            }
            _ => Ok(Simple::Stmt(self.alloc_stmt(StmtKind::Expr(x), start))),
        }
    }

    /// The expression of a simple statement, for use as a condition or
    /// switch tag.
    fn simple_expr(&mut self, simple: &Simple) -> Result<ExprId, ParseError> {
        if let Simple::Stmt(id) = simple {
            if let StmtKind::Expr(e) = self.arena.stmt(*id).kind {
                return Ok(e);
            }
        }
        self.unexpected("expression")
    }

    // ------------------------------------------------------------------
    // Control flow

    fn parse_if(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.advance(); // if
        let (init, cond) = self.parse_header_cond()?;
        let then = self.parse_block()?;
        let els = if self.eat(TokenKind::Else).is_some() {
            if self.at(TokenKind::If) {
                Some(self.parse_if()?)
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(self.alloc_stmt(StmtKind::If { init, cond, then, els }, start))
    }

    /// `[init ;] cond` of an `if` header.
    fn parse_header_cond(&mut self) -> Result<(Option<StmtId>, ExprId), ParseError> {
        self.with_closed_exprs(|p| {
            let first = p.parse_simple_stmt(false)?;
            if p.at(TokenKind::Semi) {
                p.advance();
                let init = match first {
                    Simple::Stmt(id) => Some(id),
                    Simple::Range { .. } => return p.unexpected("statement"),
                };
                let second = p.parse_simple_stmt(false)?;
                let cond = p.simple_expr(&second)?;
                Ok((init, cond))
            } else {
                let cond = p.simple_expr(&first)?;
                Ok((None, cond))
            }
        })
    }

    fn parse_for(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.advance(); // for

        if self.at(TokenKind::LBrace) {
            let body = self.parse_block()?;
            return Ok(self.alloc_stmt(
                StmtKind::For {
                    init: None,
                    cond: None,
                    post: None,
                    body,
                },
                start,
            ));
        }

        enum Header {
            Loop {
                init: Option<StmtId>,
                cond: Option<ExprId>,
                post: Option<StmtId>,
            },
            Range {
                key: Option<ExprId>,
                value: Option<ExprId>,
                define: bool,
                x: ExprId,
            },
        }

        let header = self.with_closed_exprs(|p| {
            if p.at(TokenKind::Range) {
                // `for range x`
                p.advance();
                let x = p.parse_expr()?;
                return Ok(Header::Range {
                    key: None,
                    value: None,
                    define: false,
                    x,
                });
            }
            if p.at(TokenKind::Semi) {
                // `for ; cond ; post`
                p.advance();
                let (cond, post) = p.parse_for_tail()?;
                return Ok(Header::Loop {
                    init: None,
                    cond,
                    post,
                });
            }
            match p.parse_simple_stmt(true)? {
                Simple::Range {
                    key,
                    value,
                    define,
                    x,
                } => Ok(Header::Range {
                    key,
                    value,
                    define,
                    x,
                }),
                first @ Simple::Stmt(_) => {
                    if p.at(TokenKind::Semi) {
                        p.advance();
                        let init = match first {
                            Simple::Stmt(id) => Some(id),
                            Simple::Range { .. } => None,
                        };
                        let (cond, post) = p.parse_for_tail()?;
                        Ok(Header::Loop { init, cond, post })
                    } else {
                        // `for cond { ... }`
                        let cond = p.simple_expr(&first)?;
                        Ok(Header::Loop {
                            init: None,
                            cond: Some(cond),
                            post: None,
                        })
                    }
                }
            }
        })?;

        let body = self.parse_block()?;
        Ok(match header {
            Header::Loop { init, cond, post } => self.alloc_stmt(
                StmtKind::For {
                    init,
                    cond,
                    post,
                    body,
                },
                start,
            ),
            Header::Range {
                key,
                value,
                define,
                x,
            } => self.alloc_stmt(
                StmtKind::Range {
                    key,
                    value,
                    define,
                    x,
                    body,
                },
                start,
            ),
        })
    }

    /// `cond ; [post]` after the first semicolon of a three-clause
    /// `for` header.
    fn parse_for_tail(
        &mut self,
    ) -> Result<(Option<ExprId>, Option<StmtId>), ParseError> {
        let cond = if self.at(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semi)?;
        let post = if self.at(TokenKind::LBrace) {
            None
        } else {
            match self.parse_simple_stmt(false)? {
                Simple::Stmt(id) => Some(id),
                Simple::Range { .. } => return self.unexpected("statement"),
            }
        };
        Ok((cond, post))
    }

    fn parse_switch(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.advance(); // switch

        let mut init = None;
        let mut guard = None;
        if !self.at(TokenKind::LBrace) {
            self.with_closed_exprs(|p| {
                let first = p.parse_simple_stmt(false)?;
                if p.at(TokenKind::Semi) {
                    p.advance();
                    init = match first {
                        Simple::Stmt(id) => Some(id),
                        Simple::Range { .. } => return p.unexpected("statement"),
                    };
                    if !p.at(TokenKind::LBrace) {
                        match p.parse_simple_stmt(false)? {
                            Simple::Stmt(id) => guard = Some(id),
                            Simple::Range { .. } => return p.unexpected("statement"),
                        }
                    }
                } else {
                    match first {
                        Simple::Stmt(id) => guard = Some(id),
                        Simple::Range { .. } => return p.unexpected("statement"),
                    }
                }
                Ok(())
            })?;
        }

        let type_switch = guard.is_some_and(|g| self.is_type_switch_guard(g));

        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            cases.push(self.parse_case_clause()?);
        }
        self.expect(TokenKind::RBrace)?;

        if type_switch {
            // Presence checked above.
            let assign = match guard {
                Some(g) => g,
                None => return self.error_at(start, "missing type switch guard"),
            };
            return Ok(self.alloc_stmt(
                StmtKind::TypeSwitch {
                    init,
                    assign,
                    cases,
                },
                start,
            ));
        }

        let tag = match guard {
            None => None,
            Some(g) => match self.arena.stmt(g).kind {
                StmtKind::Expr(e) => Some(e),
                _ => return self.error_at(start, "switch guard must be an expression"),
            },
        };
        Ok(self.alloc_stmt(StmtKind::Switch { init, tag, cases }, start))
    }

    /// `v := x.(type)` or a bare `x.(type)` expression statement.
    fn is_type_switch_guard(&self, stmt: StmtId) -> bool {
        let is_type_assert = |e: ExprId| {
            matches!(
                self.arena.expr(e).kind,
                ExprKind::TypeAssert { ty: None, .. }
            )
        };
        match &self.arena.stmt(stmt).kind {
            StmtKind::Expr(e) => is_type_assert(*e),
            StmtKind::Assign { op, rhs, .. } => {
                *op == AssignOp::Define && rhs.len() == 1 && is_type_assert(rhs[0])
            }
            _ => false,
        }
    }

    fn parse_case_clause(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        let exprs = if self.eat(TokenKind::Case).is_some() {
            self.with_open_exprs(|p| p.parse_expr_list())?
        } else {
            self.expect(TokenKind::Default)?;
            Vec::new()
        };
        self.expect(TokenKind::Colon)?;
        let body = self.parse_case_body()?;
        Ok(self.alloc_stmt(StmtKind::Case { exprs, body }, start))
    }

    fn parse_case_body(&mut self) -> Result<Vec<StmtId>, ParseError> {
        let mut body = Vec::new();
        while !matches!(
            self.kind(),
            TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
        ) {
            body.push(self.parse_stmt()?);
        }
        Ok(body)
    }

    fn parse_select(&mut self) -> Result<StmtId, ParseError> {
        let start = self.span().start;
        self.advance(); // select
        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let case_start = self.span().start;
            let comm = if self.eat(TokenKind::Case).is_some() {
                match self.parse_simple_stmt(false)? {
                    Simple::Stmt(id) => Some(id),
                    Simple::Range { .. } => return self.unexpected("statement"),
                }
            } else {
                self.expect(TokenKind::Default)?;
                None
            };
            self.expect(TokenKind::Colon)?;
            let body = self.parse_case_body()?;
            cases.push(self.alloc_stmt(StmtKind::Comm { comm, body }, case_start));
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc_stmt(StmtKind::Select { cases }, start))
    }
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Assign => AssignOp::Assign,
        TokenKind::Define => AssignOp::Define,
        TokenKind::PlusEq => AssignOp::Add,
        TokenKind::MinusEq => AssignOp::Sub,
        TokenKind::StarEq => AssignOp::Mul,
        TokenKind::SlashEq => AssignOp::Quo,
        TokenKind::PercentEq => AssignOp::Rem,
        TokenKind::AmpEq => AssignOp::And,
        TokenKind::PipeEq => AssignOp::Or,
        TokenKind::CaretEq => AssignOp::Xor,
        TokenKind::ShlEq => AssignOp::Shl,
        TokenKind::ShrEq => AssignOp::Shr,
        TokenKind::AmpCaretEq => AssignOp::AndNot,
        _ => return None,
    })
}
