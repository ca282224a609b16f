//! Top-level declaration parsing.

use crate::ast::{
    Decl, DeclKind, Field, FuncDecl, GenDecl, Ident, ImportSpec, Spec, TypeSpec, ValueSpec,
};
use crate::error::ParseError;
use crate::literal::unquote_string;
use crate::token::TokenKind;

use super::Parser;

impl Parser<'_> {
    pub(crate) fn parse_top_decl(&mut self) -> Result<Decl, ParseError> {
        let decl = match self.kind() {
            TokenKind::Import | TokenKind::Const | TokenKind::Var | TokenKind::Type => {
                Decl::Gen(self.parse_gen_decl()?)
            }
            TokenKind::Func => Decl::Func(self.parse_func_decl()?),
            _ => return self.unexpected("declaration"),
        };
        self.expect_semi()?;
        Ok(decl)
    }

    /// A (possibly grouped) `import`/`const`/`var`/`type` declaration,
    /// without its terminating semicolon.
    pub(crate) fn parse_gen_decl(&mut self) -> Result<GenDecl, ParseError> {
        let doc = self.doc_before();
        let start = self.span().start;
        let kind = match self.kind() {
            TokenKind::Import => DeclKind::Import,
            TokenKind::Const => DeclKind::Const,
            TokenKind::Var => DeclKind::Var,
            TokenKind::Type => DeclKind::Type,
            _ => return self.unexpected("declaration keyword"),
        };
        self.advance();

        let mut specs = Vec::new();
        let grouped = self.eat(TokenKind::LParen).is_some();
        if grouped {
            while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                specs.push(self.parse_spec(kind)?);
                self.expect_semi()?;
            }
            self.expect(TokenKind::RParen)?;
        } else {
            specs.push(self.parse_spec(kind)?);
        }

        Ok(GenDecl {
            doc,
            kind,
            grouped,
            specs,
            span: self.span_from(start),
        })
    }

    fn parse_spec(&mut self, kind: DeclKind) -> Result<Spec, ParseError> {
        match kind {
            DeclKind::Import => self.parse_import_spec(),
            DeclKind::Const | DeclKind::Var => self.parse_value_spec(),
            DeclKind::Type => self.parse_type_spec(),
        }
    }

    fn parse_import_spec(&mut self) -> Result<Spec, ParseError> {
        let doc = self.doc_before();
        let start = self.span().start;
        let name = match self.kind() {
            TokenKind::Ident => Some(self.parse_ident()?),
            TokenKind::Dot => {
                let token = self.advance();
                Some(Ident::new(".", token.span))
            }
            _ => None,
        };
        if !self.at(TokenKind::Str) && !self.at(TokenKind::RawStr) {
            return self.unexpected("import path");
        }
        let token = self.advance();
        let raw = self.text(token);
        let path = match unquote_string(raw) {
            Some(path) if !path.is_empty() => path,
            _ => return self.error_at(token.span.start, format!("invalid import path {raw}")),
        };
        Ok(Spec::Import(ImportSpec {
            doc,
            name,
            path,
            span: self.span_from(start),
        }))
    }

    fn parse_value_spec(&mut self) -> Result<Spec, ParseError> {
        let doc = self.doc_before();
        let start = self.span().start;
        let mut names = vec![self.parse_ident()?];
        while self.eat(TokenKind::Comma).is_some() {
            names.push(self.parse_ident()?);
        }
        let ty = if self.starts_type() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.eat(TokenKind::Assign).is_some() {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Ok(Spec::Value(ValueSpec {
            doc,
            names,
            ty,
            values,
            span: self.span_from(start),
        }))
    }

    fn parse_type_spec(&mut self) -> Result<Spec, ParseError> {
        let doc = self.doc_before();
        let start = self.span().start;
        let name = self.parse_ident()?;
        let type_params = if self.at(TokenKind::LBracket) && self.lbracket_is_type_params() {
            self.parse_type_params()?
        } else {
            Vec::new()
        };
        let assign = self.eat(TokenKind::Assign).is_some();
        let ty = self.parse_type()?;
        Ok(Spec::Type(TypeSpec {
            doc,
            name,
            type_params,
            assign,
            ty,
            span: self.span_from(start),
        }))
    }

    /// Disambiguate `type A[T any] ...` (type parameters) from
    /// `type A [N]int` (array type). A `[` followed by an identifier
    /// that is itself followed by the start of a constraint is a type
    /// parameter list; everything else is an array or slice type.
    fn lbracket_is_type_params(&self) -> bool {
        if self.peek_kind(1) != TokenKind::Ident {
            return false;
        }
        matches!(
            self.peek_kind(2),
            TokenKind::Ident
                | TokenKind::Comma
                | TokenKind::Interface
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Struct
                | TokenKind::LBracket
                | TokenKind::Star
                | TokenKind::Tilde
                | TokenKind::Arrow
                | TokenKind::Ellipsis
        )
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        let doc = self.doc_before();
        let start = self.span().start;
        self.expect(TokenKind::Func)?;

        let recv = if self.at(TokenKind::LParen) {
            Some(self.parse_receiver()?)
        } else {
            None
        };

        let name = self.parse_ident()?;
        let type_params = if self.at(TokenKind::LBracket) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        let mut sig = self.parse_signature()?;
        sig.type_params = type_params;

        let body = if self.at(TokenKind::LBrace) {
            Some(self.with_open_exprs(|p| p.parse_block())?)
        } else {
            None
        };

        Ok(FuncDecl {
            doc,
            recv,
            name,
            sig,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_receiver(&mut self) -> Result<Field, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut fields = self.parse_param_list(TokenKind::RParen, false)?;
        let paren_span = self.expect(TokenKind::RParen)?.span;
        if fields.len() != 1 {
            return self.error_at(paren_span.start, "method has more than one receiver");
        }
        // Receiver lists allow at most one name.
        Ok(fields.remove(0))
    }
}
