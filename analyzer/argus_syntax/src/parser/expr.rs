//! Expression parsing: precedence climbing over unary/postfix chains.

use crate::ast::{BinaryOp, ExprId, ExprKind, LitKind, UnaryOp};
use crate::error::ParseError;
use crate::token::TokenKind;

use super::Parser;

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Result<ExprId, ParseError> {
        self.parse_binary(1)
    }

    pub(crate) fn parse_expr_list(&mut self) -> Result<Vec<ExprId>, ParseError> {
        let mut list = vec![self.parse_expr()?];
        while self.eat(TokenKind::Comma).is_some() {
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let mut x = self.parse_unary()?;
        while let Some(prec) = self.kind().binary_prec() {
            if prec < min_prec {
                break;
            }
            let op = binary_op(self.kind());
            self.advance();
            let y = self.parse_binary(prec + 1)?;
            x = self.alloc(ExprKind::Binary { op, x, y }, start);
        }
        Ok(x)
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let op = match self.kind() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Caret => UnaryOp::Xor,
            TokenKind::Amp => UnaryOp::Addr,
            TokenKind::Arrow => {
                if self.peek_kind(1) == TokenKind::Chan {
                    // `<-chan T` is a type operand, not a receive.
                    return self.parse_type();
                }
                UnaryOp::Recv
            }
            TokenKind::Star => {
                self.advance();
                let x = self.parse_unary()?;
                return Ok(self.alloc(ExprKind::Star(x), start));
            }
            _ => return self.parse_primary(),
        };
        self.advance();
        let x = self.parse_unary()?;
        Ok(self.alloc(ExprKind::Unary { op, x }, start))
    }

    fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let mut x = self.parse_operand()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    if self.eat(TokenKind::LParen).is_some() {
                        let ty = if self.at(TokenKind::Type) {
                            self.advance();
                            None
                        } else {
                            Some(self.with_open_exprs(|p| p.parse_type())?)
                        };
                        self.expect(TokenKind::RParen)?;
                        x = self.alloc(ExprKind::TypeAssert { x, ty }, start);
                    } else {
                        let sel = self.parse_ident()?;
                        x = self.alloc(ExprKind::Selector { x, sel }, start);
                    }
                }
                TokenKind::LParen => {
                    self.advance();
                    let (args, ellipsis) = self.with_open_exprs(|p| {
                        let mut args = Vec::new();
                        let mut ellipsis = false;
                        while !p.at(TokenKind::RParen) && !p.at(TokenKind::Eof) {
                            args.push(p.parse_expr()?);
                            if p.eat(TokenKind::Ellipsis).is_some() {
                                ellipsis = true;
                            }
                            if p.eat(TokenKind::Comma).is_none() {
                                break;
                            }
                        }
                        Ok((args, ellipsis))
                    })?;
                    self.expect(TokenKind::RParen)?;
                    x = self.alloc(
                        ExprKind::Call {
                            func: x,
                            args,
                            ellipsis,
                        },
                        start,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    x = self.with_open_exprs(|p| p.parse_index_or_slice(x, start))?;
                    self.expect(TokenKind::RBracket)?;
                }
                TokenKind::LBrace => {
                    if !self.composite_lit_ok(x) {
                        break;
                    }
                    let elems = self.parse_composite_body()?;
                    x = self.alloc(
                        ExprKind::CompositeLit {
                            ty: Some(x),
                            elems,
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        Ok(x)
    }

    /// After `x[`: an index, a generic instantiation, or a slice
    /// expression. The closing bracket is left for the caller.
    fn parse_index_or_slice(&mut self, x: ExprId, start: u32) -> Result<ExprId, ParseError> {
        if self.at(TokenKind::Colon) {
            self.advance();
            return self.parse_slice_rest(x, None, start);
        }
        let first = self.parse_expr()?;
        if self.eat(TokenKind::Colon).is_some() {
            return self.parse_slice_rest(x, Some(first), start);
        }
        let mut indices = vec![first];
        while self.eat(TokenKind::Comma).is_some() {
            if self.at(TokenKind::RBracket) {
                break;
            }
            indices.push(self.parse_expr()?);
        }
        Ok(self.alloc(ExprKind::Index { x, indices }, start))
    }

    fn parse_slice_rest(
        &mut self,
        x: ExprId,
        low: Option<ExprId>,
        start: u32,
    ) -> Result<ExprId, ParseError> {
        let high = if self.at(TokenKind::Colon) || self.at(TokenKind::RBracket) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let max = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(self.alloc(ExprKind::Slice { x, low, high, max }, start))
    }

    fn parse_operand(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        match self.kind() {
            TokenKind::Ident => {
                let token = self.advance();
                let name = self.text(token).to_string();
                Ok(self.alloc(ExprKind::Ident(name), start))
            }
            TokenKind::Int => self.lit(LitKind::Int),
            TokenKind::Float => self.lit(LitKind::Float),
            TokenKind::Imag => self.lit(LitKind::Imag),
            TokenKind::Rune => self.lit(LitKind::Rune),
            TokenKind::Str | TokenKind::RawStr => self.lit(LitKind::String),
            TokenKind::LParen => {
                self.advance();
                let inner = self.with_open_exprs(|p| p.parse_expr())?;
                self.expect(TokenKind::RParen)?;
                Ok(self.alloc(ExprKind::Paren(inner), start))
            }
            TokenKind::Func => {
                self.advance();
                let sig = self.parse_signature()?;
                if self.at(TokenKind::LBrace) {
                    let body = self.with_open_exprs(|p| p.parse_block())?;
                    Ok(self.alloc(
                        ExprKind::FuncLit {
                            ty: Box::new(sig),
                            body,
                        },
                        start,
                    ))
                } else {
                    Ok(self.alloc(ExprKind::FuncType(Box::new(sig)), start))
                }
            }
            // Type operands: `[]T{...}`, `map[K]V{...}`, conversions
            // like `[]byte(s)`, `struct{...}{...}`.
            TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Interface
            | TokenKind::Struct => self.parse_type(),
            _ => self.unexpected("expression"),
        }
    }

    fn lit(&mut self, kind: LitKind) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let token = self.advance();
        let value = self.text(token).to_string();
        Ok(self.alloc(ExprKind::BasicLit { kind, value }, start))
    }

    /// Composite literals are always allowed for literal array / map /
    /// struct types; for named types they require a non-negative
    /// expression level (i.e. not directly in a control-flow header).
    fn composite_lit_ok(&self, x: ExprId) -> bool {
        match &self.arena.expr(x).kind {
            ExprKind::ArrayType { .. } | ExprKind::MapType { .. } | ExprKind::StructType { .. } => {
                true
            }
            ExprKind::Ident(_) | ExprKind::Selector { .. } | ExprKind::Index { .. } => {
                self.composite_ok()
            }
            _ => false,
        }
    }

    /// `{ elem, elem, ... }` — the body of a composite literal.
    fn parse_composite_body(&mut self) -> Result<Vec<ExprId>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let elems = self.with_open_exprs(|p| {
            let mut elems = Vec::new();
            while !p.at(TokenKind::RBrace) && !p.at(TokenKind::Eof) {
                elems.push(p.parse_composite_elem()?);
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            Ok(elems)
        })?;
        self.expect(TokenKind::RBrace)?;
        Ok(elems)
    }

    fn parse_composite_elem(&mut self) -> Result<ExprId, ParseError> {
        let start = self.span().start;
        let first = self.parse_composite_value()?;
        if self.eat(TokenKind::Colon).is_some() {
            let value = self.parse_composite_value()?;
            return Ok(self.alloc(
                ExprKind::KeyValue {
                    key: first,
                    value,
                },
                start,
            ));
        }
        Ok(first)
    }

    /// A literal element value: a nested brace literal with elided
    /// type, or a plain expression.
    fn parse_composite_value(&mut self) -> Result<ExprId, ParseError> {
        if self.at(TokenKind::LBrace) {
            let start = self.span().start;
            let elems = self.parse_composite_body()?;
            return Ok(self.alloc(ExprKind::CompositeLit { ty: None, elems }, start));
        }
        self.parse_expr()
    }
}

fn binary_op(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::OrOr => BinaryOp::LogicalOr,
        TokenKind::AndAnd => BinaryOp::LogicalAnd,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Pipe => BinaryOp::Or,
        TokenKind::Caret => BinaryOp::Xor,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Quo,
        TokenKind::Percent => BinaryOp::Rem,
        TokenKind::Shl => BinaryOp::Shl,
        TokenKind::Shr => BinaryOp::Shr,
        TokenKind::Amp => BinaryOp::And,
        TokenKind::AmpCaret => BinaryOp::AndNot,
        // binary_prec() gates which kinds reach here
        _ => BinaryOp::Add,
    }
}
