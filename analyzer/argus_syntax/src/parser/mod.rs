//! Recursive-descent parser for Go source.
//!
//! One `Parser` type, extended by grammar modules:
//!
//! - `decl`: top-level declarations (`import`, `const`, `var`, `type`,
//!   `func`) and spec groups
//! - `ty`: type expressions, parameter lists, constraints
//! - `stmt`: statements and control flow
//! - `expr`: operand/postfix/binary expression parsing
//!
//! The parser fails fast: the first error aborts the file, matching the
//! scanner's parse-failure semantics. `expr_level` gates composite
//! literals in control-flow headers the way the Go grammar requires
//! (negative level: a `{` after a bare type name opens the block, not a
//! literal).

mod decl;
mod expr;
mod stmt;
mod ty;

use std::path::PathBuf;

use crate::ast::{Arena, Decl, File, Ident, ImportSpec};
use crate::error::ParseError;
use crate::lexer::lex;
use crate::span::{LineIndex, Span};
use crate::token::{Comment, Token, TokenKind};

/// Result of the imports-only fast path.
pub struct ImportsOnly {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
}

/// Parse only the package clause and import section of a file.
///
/// Stops at the first non-import declaration without parsing it, which
/// makes whole-module import walks cheap.
pub fn parse_imports_only(path: impl Into<PathBuf>, src: &str) -> Result<ImportsOnly, ParseError> {
    let _ = path.into();
    let lexed = lex(src)?;
    let mut parser = Parser {
        src,
        tokens: lexed.tokens,
        comments: lexed.comments,
        line_index: LineIndex::new(src),
        pos: 0,
        prev_end: 0,
        arena: Arena::new(),
        expr_level: 0,
    };
    parser.expect(TokenKind::Package)?;
    let package = parser.parse_ident()?;
    parser.expect_semi()?;

    let mut imports = Vec::new();
    while parser.at(TokenKind::Import) {
        let gen = parser.parse_gen_decl()?;
        parser.expect_semi()?;
        for spec in gen.specs {
            if let crate::ast::Spec::Import(import) = spec {
                imports.push(import);
            }
        }
    }
    Ok(ImportsOnly { package, imports })
}

/// Parse one source file.
pub fn parse_file(path: impl Into<PathBuf>, src: &str) -> Result<File, ParseError> {
    let lexed = lex(src)?;
    let mut parser = Parser {
        src,
        tokens: lexed.tokens,
        comments: lexed.comments,
        line_index: LineIndex::new(src),
        pos: 0,
        prev_end: 0,
        arena: Arena::new(),
        expr_level: 0,
    };
    parser.file(path.into())
}

pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    line_index: LineIndex,
    pos: usize,
    /// End offset of the most recently consumed token.
    prev_end: u32,
    pub(crate) arena: Arena,
    /// Composite-literal gate: negative inside control-flow headers.
    expr_level: i32,
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Token access

    #[inline]
    pub(crate) fn tok(&self) -> Token {
        self.tokens[self.pos]
    }

    #[inline]
    pub(crate) fn kind(&self) -> TokenKind {
        self.tok().kind
    }

    #[inline]
    pub(crate) fn span(&self) -> Span {
        self.tok().span
    }

    /// Kind of the token `n` ahead of the current one.
    pub(crate) fn peek_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    pub(crate) fn text(&self, token: Token) -> &'a str {
        &self.src[token.span.range()]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.tok();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        self.prev_end = token.span.end;
        token
    }

    #[inline]
    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Span from `start` to the end of the last consumed token.
    #[inline]
    pub(crate) fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    // ------------------------------------------------------------------
    // Errors and expectations

    pub(crate) fn unexpected<T>(&self, expected: &str) -> Result<T, ParseError> {
        let token = self.tok();
        let found = if token.kind == TokenKind::Semi && token.span.is_empty() {
            "newline".to_string()
        } else {
            token.kind.describe().to_string()
        };
        Err(ParseError::Unexpected {
            offset: token.span.start,
            expected: expected.to_string(),
            found,
        })
    }

    pub(crate) fn error_at<T>(&self, offset: u32, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError::Message {
            offset,
            message: message.into(),
        })
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            self.unexpected(kind.describe())
        }
    }

    /// Consume a terminating semicolon. Optional before `)` and `}`,
    /// per the Go grammar.
    pub(crate) fn expect_semi(&mut self) -> Result<(), ParseError> {
        match self.kind() {
            TokenKind::Semi => {
                self.advance();
                Ok(())
            }
            TokenKind::RParen | TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => self.unexpected("';'"),
        }
    }

    pub(crate) fn parse_ident(&mut self) -> Result<Ident, ParseError> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(Ident::new(self.text(token), token.span))
    }

    // ------------------------------------------------------------------
    // Composite-literal gating

    /// Run `f` with composite literals disabled (control-flow headers).
    pub(crate) fn with_closed_exprs<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = self.expr_level;
        self.expr_level = -1;
        let out = f(self);
        self.expr_level = saved;
        out
    }

    /// Run `f` with composite literals re-enabled (inside parens,
    /// brackets, literal bodies, and function literal bodies).
    pub(crate) fn with_open_exprs<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = self.expr_level;
        self.expr_level = saved.max(0) + 1;
        let out = f(self);
        self.expr_level = saved;
        out
    }

    #[inline]
    pub(crate) fn composite_ok(&self) -> bool {
        self.expr_level >= 0
    }

    // ------------------------------------------------------------------
    // Doc comments

    /// The comment block immediately above the current token, if it is
    /// adjacent (no blank line, no intervening token).
    pub(crate) fn doc_before(&self) -> Option<String> {
        let cur = self.tok();
        let lower = if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        };
        let decl_line = self.line_index.line(cur.span.start);

        let in_range: Vec<&Comment> = self
            .comments
            .iter()
            .filter(|c| c.span.start >= lower && c.span.end <= cur.span.start)
            .collect();

        let mut block: Vec<&Comment> = Vec::new();
        let mut expected_line = decl_line;
        for &comment in in_range.iter().rev() {
            let end_line = self.line_index.line(comment.span.end);
            if end_line + 1 != expected_line {
                break;
            }
            expected_line = self.line_index.line(comment.span.start);
            block.push(comment);
        }
        if block.is_empty() {
            return None;
        }
        block.reverse();
        Some(
            block
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    // ------------------------------------------------------------------
    // File

    fn file(&mut self, path: PathBuf) -> Result<File, ParseError> {
        let doc = self.doc_before();
        self.expect(TokenKind::Package)?;
        let package = self.parse_ident()?;
        self.expect_semi()?;

        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            decls.push(self.parse_top_decl()?);
        }

        let mut imports: Vec<ImportSpec> = Vec::new();
        for decl in &decls {
            if let Decl::Gen(gen) = decl {
                for spec in &gen.specs {
                    if let crate::ast::Spec::Import(import) = spec {
                        imports.push(import.clone());
                    }
                }
            }
        }

        Ok(File {
            path,
            package,
            doc,
            imports,
            decls,
            arena: std::mem::take(&mut self.arena),
            line_index: self.line_index.clone(),
        })
    }
}
