//! Lexer for Go source built on logos.
//!
//! Two layers: a raw logos token stream, then a cooking pass that
//! strips comments (keeping them for doc attachment), applies Go's
//! automatic semicolon insertion, and appends an EOF token.

use logos::Logos;

use crate::error::ParseError;
use crate::span::Span;
use crate::token::{Comment, Token, TokenKind};

/// Raw token produced by logos, before semicolon insertion.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum RawToken {
    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
    BlockComment,

    #[token("\n")]
    Newline,

    #[token("break")]
    Break,
    #[token("case")]
    Case,
    #[token("chan")]
    Chan,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("default")]
    Default,
    #[token("defer")]
    Defer,
    #[token("else")]
    Else,
    #[token("fallthrough")]
    Fallthrough,
    #[token("for")]
    For,
    #[token("func")]
    Func,
    #[token("go")]
    Go,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("package")]
    Package,
    #[token("range")]
    Range,
    #[token("return")]
    Return,
    #[token("select")]
    Select,
    #[token("struct")]
    Struct,
    #[token("switch")]
    Switch,
    #[token("type")]
    Type,
    #[token("var")]
    Var,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Ident,

    #[regex(r"0[xX][0-9a-fA-F_]+|0[bB][01_]+|0[oO][0-7_]+|[0-9][0-9_]*")]
    Int,

    #[regex(r"[0-9][0-9_]*\.[0-9_]*(?:[eE][+-]?[0-9]+)?|[0-9][0-9_]*[eE][+-]?[0-9]+|\.[0-9][0-9_]*(?:[eE][+-]?[0-9]+)?")]
    Float,

    #[regex(r"(?:[0-9][0-9_]*(?:\.[0-9_]*)?(?:[eE][+-]?[0-9]+)?|\.[0-9][0-9_]*(?:[eE][+-]?[0-9]+)?)i")]
    Imag,

    #[regex(r"'(?:[^'\\\n]|\\[^\n])*'")]
    Rune,

    #[regex(r#""(?:[^"\\\n]|\\[^\n])*""#)]
    Str,

    #[regex(r"`[^`]*`")]
    RawStr,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AmpCaret,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&^=")]
    AmpCaretEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("<-")]
    Arrow,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("==")]
    EqEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Assign,
    #[token("!")]
    Not,
    #[token("~")]
    Tilde,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token(":=")]
    Define,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    LParen,
    #[token("[")]
    LBracket,
    #[token("{")]
    LBrace,
    #[token(")")]
    RParen,
    #[token("]")]
    RBracket,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
}

fn convert(raw: RawToken) -> TokenKind {
    use RawToken as R;
    use TokenKind as T;
    match raw {
        R::LineComment | R::BlockComment | R::Newline => {
            // Stripped by the cooking pass before conversion.
            T::Eof
        }
        R::Break => T::Break,
        R::Case => T::Case,
        R::Chan => T::Chan,
        R::Const => T::Const,
        R::Continue => T::Continue,
        R::Default => T::Default,
        R::Defer => T::Defer,
        R::Else => T::Else,
        R::Fallthrough => T::Fallthrough,
        R::For => T::For,
        R::Func => T::Func,
        R::Go => T::Go,
        R::Goto => T::Goto,
        R::If => T::If,
        R::Import => T::Import,
        R::Interface => T::Interface,
        R::Map => T::Map,
        R::Package => T::Package,
        R::Range => T::Range,
        R::Return => T::Return,
        R::Select => T::Select,
        R::Struct => T::Struct,
        R::Switch => T::Switch,
        R::Type => T::Type,
        R::Var => T::Var,
        R::Ident => T::Ident,
        R::Int => T::Int,
        R::Float => T::Float,
        R::Imag => T::Imag,
        R::Rune => T::Rune,
        R::Str => T::Str,
        R::RawStr => T::RawStr,
        R::Plus => T::Plus,
        R::Minus => T::Minus,
        R::Star => T::Star,
        R::Slash => T::Slash,
        R::Percent => T::Percent,
        R::Amp => T::Amp,
        R::Pipe => T::Pipe,
        R::Caret => T::Caret,
        R::Shl => T::Shl,
        R::Shr => T::Shr,
        R::AmpCaret => T::AmpCaret,
        R::PlusEq => T::PlusEq,
        R::MinusEq => T::MinusEq,
        R::StarEq => T::StarEq,
        R::SlashEq => T::SlashEq,
        R::PercentEq => T::PercentEq,
        R::AmpEq => T::AmpEq,
        R::PipeEq => T::PipeEq,
        R::CaretEq => T::CaretEq,
        R::ShlEq => T::ShlEq,
        R::ShrEq => T::ShrEq,
        R::AmpCaretEq => T::AmpCaretEq,
        R::AndAnd => T::AndAnd,
        R::OrOr => T::OrOr,
        R::Arrow => T::Arrow,
        R::Inc => T::Inc,
        R::Dec => T::Dec,
        R::EqEq => T::EqEq,
        R::Lt => T::Lt,
        R::Gt => T::Gt,
        R::Assign => T::Assign,
        R::Not => T::Not,
        R::Tilde => T::Tilde,
        R::NotEq => T::NotEq,
        R::LtEq => T::LtEq,
        R::GtEq => T::GtEq,
        R::Define => T::Define,
        R::Ellipsis => T::Ellipsis,
        R::LParen => T::LParen,
        R::LBracket => T::LBracket,
        R::LBrace => T::LBrace,
        R::RParen => T::RParen,
        R::RBracket => T::RBracket,
        R::RBrace => T::RBrace,
        R::Comma => T::Comma,
        R::Semi => T::Semi,
        R::Colon => T::Colon,
        R::Dot => T::Dot,
    }
}

/// Lexed file: cooked tokens plus the comments stripped from them.
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

/// Strip comment markers, one line at a time.
fn comment_text(raw: &str) -> String {
    let body = if let Some(rest) = raw.strip_prefix("//") {
        rest
    } else {
        raw.trim_start_matches("/*").trim_end_matches("*/")
    };
    body.lines()
        .map(|line| line.strip_prefix(' ').unwrap_or(line).trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lex a whole file.
///
/// Comments are collected into `Lexed::comments`; the token stream has
/// automatic semicolons inserted per the Go rule (a newline after a
/// statement-terminating token becomes a `;`). A block comment that
/// spans lines counts as a newline for insertion purposes.
pub fn lex(src: &str) -> Result<Lexed, ParseError> {
    let mut tokens = Vec::new();
    let mut comments = Vec::new();
    let mut lexer = RawToken::lexer(src);

    // ASI applies when the previous cooked token can end a statement.
    let mut pending_asi = false;

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start as u32, lexer.span().end as u32);
        let raw = match result {
            Ok(raw) => raw,
            Err(()) => {
                return Err(ParseError::InvalidToken {
                    offset: span.start,
                    found: lexer.slice().chars().next().unwrap_or('\u{FFFD}'),
                });
            }
        };
        match raw {
            RawToken::Newline => {
                if pending_asi {
                    tokens.push(Token::new(TokenKind::Semi, Span::at(span.start)));
                    pending_asi = false;
                }
            }
            RawToken::LineComment | RawToken::BlockComment => {
                let slice = lexer.slice();
                comments.push(Comment {
                    span,
                    text: comment_text(slice),
                });
                if raw == RawToken::BlockComment && slice.contains('\n') && pending_asi {
                    tokens.push(Token::new(TokenKind::Semi, Span::at(span.start)));
                    pending_asi = false;
                }
            }
            _ => {
                let kind = convert(raw);
                pending_asi = kind.terminates_statement();
                tokens.push(Token::new(kind, span));
            }
        }
    }

    let eof_at = src.len() as u32;
    if pending_asi {
        tokens.push(Token::new(TokenKind::Semi, Span::at(eof_at)));
    }
    tokens.push(Token::new(TokenKind::Eof, Span::at(eof_at)));

    Ok(Lexed { tokens, comments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_semicolon_insertion_after_ident() {
        use TokenKind::*;
        assert_eq!(
            kinds("x := 1\ny := 2\n"),
            vec![Ident, Define, Int, Semi, Ident, Define, Int, Semi, Eof]
        );
    }

    #[test]
    fn test_no_semicolon_after_operator() {
        use TokenKind::*;
        assert_eq!(kinds("x +\ny"), vec![Ident, Plus, Ident, Semi, Eof]);
    }

    #[test]
    fn test_semicolon_after_closing_brace() {
        use TokenKind::*;
        assert_eq!(
            kinds("f()\n}"),
            vec![Ident, LParen, RParen, Semi, RBrace, Eof]
        );
    }

    #[test]
    fn test_comments_collected_not_tokenized() {
        let lexed = lex("// doc line\nx // trailing\n").unwrap();
        let kinds: Vec<_> = lexed.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Semi, TokenKind::Eof]);
        assert_eq!(lexed.comments.len(), 2);
        assert_eq!(lexed.comments[0].text, "doc line");
    }

    #[test]
    fn test_operator_maximal_munch() {
        use TokenKind::*;
        assert_eq!(kinds("a &^= b"), vec![Ident, AmpCaretEq, Ident, Semi, Eof]);
        assert_eq!(kinds("a <- b"), vec![Ident, Arrow, Ident, Semi, Eof]);
        assert_eq!(kinds("a < -b"), vec![Ident, Lt, Minus, Ident, Semi, Eof]);
    }

    #[test]
    fn test_numeric_literals() {
        use TokenKind::*;
        assert_eq!(kinds("0x1F"), vec![Int, Semi, Eof]);
        assert_eq!(kinds("3.14"), vec![Float, Semi, Eof]);
        assert_eq!(kinds("1e9"), vec![Float, Semi, Eof]);
        assert_eq!(kinds("2i"), vec![Imag, Semi, Eof]);
        assert_eq!(kinds("1_000"), vec![Int, Semi, Eof]);
    }

    #[test]
    fn test_string_literals() {
        use TokenKind::*;
        assert_eq!(kinds(r#""a\"b""#), vec![Str, Semi, Eof]);
        assert_eq!(kinds("`raw\nstring`"), vec![RawStr, Semi, Eof]);
        assert_eq!(kinds(r"'\n'"), vec![Rune, Semi, Eof]);
    }

    #[test]
    fn test_multiline_block_comment_counts_as_newline() {
        use TokenKind::*;
        assert_eq!(kinds("x /* a\nb */ y"), vec![Ident, Semi, Ident, Semi, Eof]);
    }
}
