//! Type expression parsing.

use smallvec::SmallVec;

use crate::ast::{
    ChanDir, Expr, ExprId, ExprKind, Field, FuncType, Ident, InterfaceElem, UnaryOp,
};
use crate::error::ParseError;
use crate::token::TokenKind;

use super::Parser;

impl Parser<'_> {
    /// True when the current token can start a type expression.
    pub(crate) fn starts_type(&self) -> bool {
        use TokenKind::*;
        matches!(
            self.kind(),
            Ident | LBracket | Star | Map | Chan | Func | Interface | Struct | LParen | Ellipsis
                | Arrow
        )
    }

    /// Parse a type expression.
    pub(crate) fn parse_type(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        match self.kind() {
            TokenKind::Ident => self.parse_type_name(),
            TokenKind::Star => {
                self.advance();
                let elem = self.parse_type()?;
                Ok(self.alloc(ExprKind::Star(elem), start))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                Ok(self.alloc(ExprKind::Paren(inner), start))
            }
            TokenKind::LBracket => self.parse_array_or_slice(),
            TokenKind::Map => {
                self.advance();
                self.expect(TokenKind::LBracket)?;
                let key = self.with_open_exprs(|p| p.parse_type())?;
                self.expect(TokenKind::RBracket)?;
                let value = self.parse_type()?;
                Ok(self.alloc(ExprKind::MapType { key, value }, start))
            }
            TokenKind::Chan => {
                self.advance();
                let dir = if self.eat(TokenKind::Arrow).is_some() {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.parse_type()?;
                Ok(self.alloc(ExprKind::ChanType { dir, elem }, start))
            }
            TokenKind::Arrow => {
                self.advance();
                self.expect(TokenKind::Chan)?;
                let elem = self.parse_type()?;
                Ok(self.alloc(
                    ExprKind::ChanType {
                        dir: ChanDir::Recv,
                        elem,
                    },
                    start,
                ))
            }
            TokenKind::Func => {
                self.advance();
                let sig = self.parse_signature()?;
                Ok(self.alloc(ExprKind::FuncType(Box::new(sig)), start))
            }
            TokenKind::Interface => self.parse_interface_type(),
            TokenKind::Struct => self.parse_struct_type(),
            TokenKind::Ellipsis => {
                self.advance();
                let elem = if self.starts_type() {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                Ok(self.alloc(ExprKind::Ellipsis { elem }, start))
            }
            _ => self.unexpected("type"),
        }
    }

    /// `T`, `pkg.T`, optionally instantiated: `T[int]`, `pkg.T[K, V]`.
    fn parse_type_name(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let name = self.parse_ident()?;
        let mut x = self.alloc(ExprKind::Ident(name.name), start);
        if self.at(TokenKind::Dot) {
            self.advance();
            let sel = self.parse_ident()?;
            x = self.alloc(ExprKind::Selector { x, sel }, start);
        }
        if self.at(TokenKind::LBracket) {
            self.advance();
            let indices = self.with_open_exprs(|p| {
                let mut indices = vec![p.parse_type()?];
                while p.eat(TokenKind::Comma).is_some() {
                    if p.at(TokenKind::RBracket) {
                        break;
                    }
                    indices.push(p.parse_type()?);
                }
                Ok(indices)
            })?;
            self.expect(TokenKind::RBracket)?;
            x = self.alloc(ExprKind::Index { x, indices }, start);
        }
        Ok(x)
    }

    /// `[]T`, `[N]T`, `[...]T`.
    fn parse_array_or_slice(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        self.advance(); // [
        let len = if self.at(TokenKind::RBracket) {
            None
        } else if self.at(TokenKind::Ellipsis) {
            let ell_start = self.span().start;
            self.advance();
            Some(self.alloc(ExprKind::Ellipsis { elem: None }, ell_start))
        } else {
            Some(self.with_open_exprs(|p| p.parse_expr())?)
        };
        self.expect(TokenKind::RBracket)?;
        let elem = self.parse_type()?;
        Ok(self.alloc(ExprKind::ArrayType { len, elem }, start))
    }

    /// `struct { fields }`.
    pub(crate) fn parse_struct_type(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        self.advance(); // struct
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            fields.push(self.parse_struct_field()?);
            self.expect_semi()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc(ExprKind::StructType { fields }, start))
    }

    fn parse_struct_field(&mut self) -> Result<Field, ParseError> {
        let doc = self.doc_before();
        let start = self.span().start;

        // Embedded: `T`, `*T`, `pkg.T`, `*pkg.T` — an identifier not
        // followed by more of a field declaration, or a leading star.
        let embedded = match self.kind() {
            TokenKind::Star => true,
            TokenKind::Ident => matches!(
                self.peek_kind(1),
                TokenKind::Dot
                    | TokenKind::Semi
                    | TokenKind::Str
                    | TokenKind::RawStr
                    | TokenKind::RBrace
            ),
            _ => false,
        };

        if embedded {
            let ty = self.parse_type()?;
            let tag = self.parse_field_tag();
            return Ok(Field {
                doc,
                names: Vec::new(),
                ty,
                tag,
                span: self.span_from(start),
            });
        }

        let mut names = vec![self.parse_ident()?];
        while self.eat(TokenKind::Comma).is_some() {
            names.push(self.parse_ident()?);
        }
        let ty = self.parse_type()?;
        let tag = self.parse_field_tag();
        Ok(Field {
            doc,
            names,
            ty,
            tag,
            span: self.span_from(start),
        })
    }

    fn parse_field_tag(&mut self) -> Option<String> {
        if self.at(TokenKind::Str) || self.at(TokenKind::RawStr) {
            let token = self.advance();
            Some(self.text(token).to_string())
        } else {
            None
        }
    }

    /// `interface { methods and type terms }`.
    pub(crate) fn parse_interface_type(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        self.advance(); // interface
        self.expect(TokenKind::LBrace)?;
        let mut elems = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let doc = self.doc_before();
            if self.at(TokenKind::Ident) && self.peek_kind(1) == TokenKind::LParen {
                let name = self.parse_ident()?;
                let sig = self.parse_signature()?;
                elems.push(InterfaceElem::Method {
                    doc,
                    name,
                    sig: Box::new(sig),
                });
            } else {
                let ty = self.parse_constraint()?;
                elems.push(InterfaceElem::Embedded { ty });
            }
            self.expect_semi()?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc(ExprKind::InterfaceType { elems }, start))
    }

    /// A type-set constraint: `T`, `~T`, `A | ~B | C`.
    pub(crate) fn parse_constraint(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let mut x = self.parse_constraint_term()?;
        while self.eat(TokenKind::Pipe).is_some() {
            let y = self.parse_constraint_term()?;
            x = self.alloc(
                ExprKind::Binary {
                    op: crate::ast::BinaryOp::Or,
                    x,
                    y,
                },
                start,
            );
        }
        Ok(x)
    }

    fn parse_constraint_term(&mut self) -> Result<ExprId, ParseError> {
        if self.at(TokenKind::Tilde) {
            let start = self.span().start;
            self.advance();
            let x = self.parse_type()?;
            Ok(self.alloc(
                ExprKind::Unary {
                    op: UnaryOp::Tilde,
                    x,
                },
                start,
            ))
        } else {
            self.parse_type()
        }
    }

    // ------------------------------------------------------------------
    // Signatures and parameter lists

    /// `(params) results` — the part after `func` and after a method
    /// name. Type parameters are handled by the callers that allow
    /// them.
    pub(crate) fn parse_signature(&mut self) -> Result<FuncType, ParseError> {
        self.expect(TokenKind::LParen)?;
        let params = self.parse_param_list(TokenKind::RParen, false)?;
        self.expect(TokenKind::RParen)?;
        let results = self.parse_results()?;
        Ok(FuncType {
            type_params: Vec::new(),
            params,
            results,
        })
    }

    pub(crate) fn parse_results(&mut self) -> Result<Vec<Field>, ParseError> {
        if self.eat(TokenKind::LParen).is_some() {
            let results = self.parse_param_list(TokenKind::RParen, false)?;
            self.expect(TokenKind::RParen)?;
            return Ok(results);
        }
        // A single unparenthesized result type, if one is present.
        // `{`, `;`, `)` etc. all mean "no results". An identifier could
        // only be a type here.
        if self.starts_type_no_paren() {
            let start = self.span().start;
            let ty = self.parse_type()?;
            return Ok(vec![Field {
                doc: None,
                names: Vec::new(),
                ty,
                tag: None,
                span: self.span_from(start),
            }]);
        }
        Ok(Vec::new())
    }

    fn starts_type_no_paren(&self) -> bool {
        use TokenKind::*;
        matches!(
            self.kind(),
            Ident | LBracket | Star | Map | Chan | Func | Interface | Struct | Arrow
        )
    }

    /// Bracketed generic type parameter list: `[T any, K comparable]`.
    pub(crate) fn parse_type_params(&mut self) -> Result<Vec<Field>, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let params = self.parse_param_list(TokenKind::RBracket, true)?;
        self.expect(TokenKind::RBracket)?;
        Ok(params)
    }

    /// Parse a parameter list up to (not including) `closing`.
    ///
    /// Go permits `a, b int, c string` as well as bare type lists
    /// (`int, string`); names and types are only distinguishable once
    /// the whole list is read, so this collects `(expr, optional type)`
    /// entries and then distributes types backwards over name-only
    /// entries, exactly the way the reference grammar resolves it.
    pub(crate) fn parse_param_list(
        &mut self,
        closing: TokenKind,
        constraint_mode: bool,
    ) -> Result<Vec<Field>, ParseError> {
        struct Entry {
            first: ExprId,
            ty: Option<ExprId>,
            doc: Option<String>,
            start: u32,
            end: u32,
        }

        let mut entries: Vec<Entry> = Vec::new();
        while !self.at(closing) && !self.at(TokenKind::Eof) {
            let doc = self.doc_before();
            let start = self.span().start;
            let first = if constraint_mode {
                self.parse_constraint()?
            } else {
                self.parse_type()?
            };
            let ty = if constraint_mode {
                if self.at(closing) || self.at(TokenKind::Comma) {
                    None
                } else {
                    Some(self.parse_constraint()?)
                }
            } else if self.starts_type() {
                Some(self.parse_type()?)
            } else {
                None
            };
            entries.push(Entry {
                first,
                ty,
                doc,
                start,
                end: self.prev_end,
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        let named = entries.iter().any(|e| e.ty.is_some());
        if !named {
            // Every entry is a bare type.
            return Ok(entries
                .into_iter()
                .map(|e| Field {
                    doc: e.doc,
                    names: Vec::new(),
                    ty: e.first,
                    tag: None,
                    span: crate::span::Span::new(e.start, e.end),
                })
                .collect());
        }

        // Named mode: distribute each explicit type backwards over the
        // preceding name-only entries (`a, b int` → a int, b int).
        let mut fields: Vec<Field> = Vec::new();
        let mut pending: SmallVec<[(Ident, Option<String>, u32); 4]> = SmallVec::new();
        for entry in entries {
            let name = self.expr_as_ident(entry.first).ok_or(ParseError::Message {
                offset: entry.start,
                message: "mixed named and unnamed parameters".to_string(),
            })?;
            pending.push((name, entry.doc, entry.start));
            if let Some(ty) = entry.ty {
                let doc = pending[0].1.clone();
                let start = pending[0].2;
                let names = pending.drain(..).map(|(n, _, _)| n).collect();
                fields.push(Field {
                    doc,
                    names,
                    ty,
                    tag: None,
                    span: crate::span::Span::new(start, entry.end),
                });
            }
        }
        if let Some((_, _, start)) = pending.first() {
            return self.error_at(*start, "parameter is missing a type");
        }
        Ok(fields)
    }

    /// If `id` is a plain identifier expression, return it as an
    /// [`Ident`].
    pub(crate) fn expr_as_ident(&self, id: ExprId) -> Option<Ident> {
        match &self.arena.expr(id).kind {
            ExprKind::Ident(name) => Some(Ident::new(name.clone(), self.arena.expr(id).span)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------

    pub(crate) fn alloc(&mut self, kind: ExprKind, start: u32) -> ExprId {
        let span = self.span_from(start);
        self.arena.alloc_expr(Expr::new(kind, span))
    }
}
