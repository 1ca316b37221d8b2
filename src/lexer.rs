use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Display};

use lazy_static::lazy_static;

use crate::error::{IntoPositioned, ParseError, TokenError};
use crate::parser;
use crate::source::SourceFile;

/// 1-indexed source position of a token's first byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl TokenKind {
    pub fn at(self, pos: Pos) -> Token {
        Token { kind: self, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Any single-character token, carrying its raw ASCII byte.
    Sym(u8),
    // compound operators
    Arrow,
    PlusPlus,
    MinusMinus,
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    ColonColon,
    Shl,
    Shr,
    Ge,
    Le,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    CaretEq,
    PipeEq,
    ShlEq,
    ShrEq,
    Ellipsis,
    // keywords
    Fn,
    Extern,
    Struct,
    Enum,
    Import,
    Cast,
    If,
    For,
    Switch,
    Case,
    As,
    Break,
    Else,
    Defer,
    Overload,
    // compiler directives
    Run,
    Interp,
    Size,
    Default,
    Union,
    Intrinsic,
    CallConv,
    IsDefined,
    EndIs,
    // primaries
    Ident(String),
    ConstStr(String),
    Number(String),
    Char(u8),
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sym(b) => write!(f, "'{}'", *b as char),
            Self::Ident(name) => write!(f, "identifier \"{name}\""),
            Self::ConstStr(s) => write!(f, "string \"{s}\""),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Char(c) => write!(f, "character '{}'", *c as char),
            Self::Eof => write!(f, "end of file"),
            kind => {
                let lexeme = KEYWORDS
                    .iter()
                    .find(|(_, v)| *v == kind)
                    .map(|(k, _)| *k)
                    .unwrap_or("?");

                write!(f, "'{lexeme}'")
            }
        }
    }
}

lazy_static! {
    /// One table for keywords, compound punctuation and `$` directives, the
    /// shared lookup target of identifier lexing, longest-match punctuation
    /// and directive lexing.
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        use TokenKind::*;

        [
            ("fn", Fn),
            ("extern", Extern),
            ("struct", Struct),
            ("enum", Enum),
            ("import", Import),
            ("cast", Cast),
            ("if", If),
            ("for", For),
            ("switch", Switch),
            ("case", Case),
            ("as", As),
            ("break", Break),
            ("else", Else),
            ("defer", Defer),
            ("overload", Overload),
            ("->", Arrow),
            ("++", PlusPlus),
            ("--", MinusMinus),
            ("||", OrOr),
            ("&&", AndAnd),
            ("==", EqEq),
            ("!=", NotEq),
            ("::", ColonColon),
            ("<<", Shl),
            (">>", Shr),
            (">=", Ge),
            ("<=", Le),
            ("+=", PlusEq),
            ("-=", MinusEq),
            ("*=", StarEq),
            ("/=", SlashEq),
            ("%=", PercentEq),
            ("&=", AmpEq),
            ("^=", CaretEq),
            ("|=", PipeEq),
            ("<<=", ShlEq),
            (">>=", ShrEq),
            ("...", Ellipsis),
            ("$run", Run),
            ("$interp", Interp),
            ("$size", Size),
            ("$default", Default),
            ("$union", Union),
            ("$intrinsic", Intrinsic),
            ("$call", CallConv),
            ("$is_defined", IsDefined),
            ("$end_is", EndIs),
        ]
        .into_iter()
        .collect()
    };
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0c)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn escape_byte(b: u8) -> Option<u8> {
    Some(match b {
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        b'\\' => b'\\',
        b'\'' => b'\'',
        b'"' => b'"',
        b'?' => b'?',
        b'0' => 0,
        _ => return None,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("expected hex digits after 0x")]
    MissingHexDigits,
    #[error("number has an extra decimal point")]
    ExtraDecimalPoint,
    #[error("expected end of string literal, found end of file")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("character literal contains more than one character")]
    MultiByteChar,
    #[error("unknown compiler directive '{0}'")]
    UnknownDirective(String),
    #[error("unterminated block comment")]
    UnterminatedComment,
}

/// Byte-cursor scanner over a [`SourceFile`]. Holds the scan index and the
/// 1-indexed line/column bookkeeping. It borrows the source mutably because
/// string-escape sequences are collapsed in place, so token positions after
/// a string literal reflect the compacted buffer.
pub struct Lexer<'a> {
    source: &'a mut SourceFile,
    at: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a mut SourceFile) -> Self {
        Self {
            source,
            at: 0,
            line: 1,
            column: 1,
        }
    }

    fn cur(&self) -> u8 {
        self.source.data()[self.at]
    }

    fn peek(&self) -> u8 {
        *self.source.data().get(self.at + 1).unwrap_or(&0)
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) -> Result<(), TokenError> {
        match self.cur() {
            0 => Err(ErrorKind::UnexpectedEof.at(self.pos())),
            b'\n' => {
                self.line += 1;
                self.column = 1;
                self.at += 1;
                Ok(())
            }
            _ => {
                self.column += 1;
                self.at += 1;
                Ok(())
            }
        }
    }

    /// Rewind to `to`, restoring the column bookkeeping. Only called within
    /// a punctuation run, which never spans a newline.
    fn rewind_to(&mut self, to: usize) {
        while self.at != to {
            self.at -= 1;
            self.column -= 1;
        }
    }

    fn lexeme(&self, from: usize) -> String {
        String::from_utf8_lossy(&self.source.data()[from..self.at]).into_owned()
    }

    pub fn lex(mut self) -> Result<Vec<Token>, TokenError> {
        let mut tokens = vec![];

        while let Some(token) = self.token()? {
            tokens.push(token);
        }

        tokens.push(TokenKind::Eof.at(self.pos()));
        tracing::debug!(tokens = tokens.len(), "lexed source file");

        Ok(tokens)
    }

    fn token(&mut self) -> Result<Option<Token>, TokenError> {
        while is_whitespace(self.cur()) {
            self.advance()?;
        }

        let start = self.pos();
        let from = self.at;
        let c = self.cur();

        if c == 0 {
            return Ok(None);
        }

        if is_ident_start(c) {
            return self.identifier(start, from).map(Some);
        }

        if c.is_ascii_digit() {
            return self.number(start, from).map(Some);
        }

        match c {
            b'"' => self.string(start, from).map(Some),
            b'\'' => self.char_literal(start).map(Some),
            b'$' => self.directive(start, from).map(Some),
            _ => self.punctuation(start, from),
        }
    }

    fn identifier(&mut self, start: Pos, from: usize) -> Result<Token, TokenError> {
        while is_ident_continue(self.cur()) {
            self.advance()?;
        }

        let lexeme = self.lexeme(from);

        Ok(match KEYWORDS.get(lexeme.as_str()) {
            Some(kind) => kind.clone().at(start),
            None => TokenKind::Ident(lexeme).at(start),
        })
    }

    fn number(&mut self, start: Pos, from: usize) -> Result<Token, TokenError> {
        if self.cur() == b'0' && self.peek() == b'x' {
            self.advance()?;
            self.advance()?;

            if !self.cur().is_ascii_hexdigit() {
                return Err(ErrorKind::MissingHexDigits.at(start));
            }

            let mut value: u64 = 0;

            while self.cur().is_ascii_hexdigit() {
                let digit = (self.cur() as char).to_digit(16).unwrap_or(0) as u64;
                value = value.wrapping_mul(16).wrapping_add(digit);
                self.advance()?;
            }

            // hex literals re-encode as their decimal representation
            return Ok(TokenKind::Number(value.to_string()).at(start));
        }

        let mut found_dot = false;

        loop {
            self.advance()?;

            if self.cur() == b'.' {
                if found_dot {
                    return Err(ErrorKind::ExtraDecimalPoint.at(start));
                }

                found_dot = true;
            }

            if !self.cur().is_ascii_digit() && self.cur() != b'.' {
                break;
            }
        }

        Ok(TokenKind::Number(self.lexeme(from)).at(start))
    }

    fn string(&mut self, start: Pos, from: usize) -> Result<Token, TokenError> {
        self.advance()?;

        loop {
            match self.cur() {
                b'"' => break,
                0 => return Err(ErrorKind::UnterminatedString.at(start)),
                b'\\' => {
                    let escaped = self.source.data()[self.at + 1];
                    let byte = escape_byte(escaped)
                        .ok_or_else(|| ErrorKind::InvalidEscape(escaped as char).at(start))?;

                    // collapse the two escape bytes into one; the column is
                    // intentionally not advanced, later positions reflect
                    // the shortened buffer
                    self.source.collapse_escape(self.at, byte);
                    self.at += 1;
                }
                _ => self.advance()?,
            }
        }

        self.advance()?;

        let content = String::from_utf8_lossy(&self.source.data()[from + 1..self.at - 1]);

        Ok(TokenKind::ConstStr(content.into_owned()).at(start))
    }

    fn char_literal(&mut self, start: Pos) -> Result<Token, TokenError> {
        self.advance()?;
        let c = self.cur();
        self.advance()?;

        if self.cur() != b'\'' {
            return Err(ErrorKind::MultiByteChar.at(start));
        }

        self.advance()?;

        Ok(TokenKind::Char(c).at(start))
    }

    fn directive(&mut self, start: Pos, from: usize) -> Result<Token, TokenError> {
        self.advance()?;

        while is_ident_continue(self.cur()) {
            self.advance()?;
        }

        let lexeme = self.lexeme(from);

        match KEYWORDS.get(lexeme.as_str()) {
            Some(kind) => Ok(kind.clone().at(start)),
            None => Err(ErrorKind::UnknownDirective(lexeme).at(start)),
        }
    }

    fn line_comment(&mut self) -> Result<(), TokenError> {
        while self.cur() != b'\n' && self.cur() != 0 {
            self.advance()?;
        }

        if self.cur() == b'\n' {
            self.advance()?;
        }

        Ok(())
    }

    fn block_comment(&mut self, start: Pos) -> Result<(), TokenError> {
        self.advance()?;
        self.advance()?;

        let mut depth = 1;

        while depth > 0 {
            match self.cur() {
                0 => return Err(ErrorKind::UnterminatedComment.at(start)),
                b'/' if self.peek() == b'*' => {
                    self.advance()?;
                    self.advance()?;
                    depth += 1;
                }
                b'*' if self.peek() == b'/' => {
                    self.advance()?;
                    self.advance()?;
                    depth -= 1;
                }
                _ => self.advance()?,
            }
        }

        Ok(())
    }

    /// Longest-match punctuation: consume the whole run of bytes that are
    /// neither alphanumeric nor whitespace, then try progressively shorter
    /// prefixes against the keyword table, rewinding to the end of the
    /// match. A single unmatched byte is emitted as a `Sym` of that byte.
    fn punctuation(&mut self, start: Pos, from: usize) -> Result<Option<Token>, TokenError> {
        if self.cur() == b'/' && self.peek() == b'/' {
            self.line_comment()?;
            return self.token();
        }

        if self.cur() == b'/' && self.peek() == b'*' {
            self.block_comment(start)?;
            return self.token();
        }

        while !is_whitespace(self.cur()) && !self.cur().is_ascii_alphanumeric() {
            if self.cur() == 0 {
                break;
            }

            self.advance()?;
        }

        let mut len = self.at - from;

        if len == 1 {
            return Ok(Some(TokenKind::Sym(self.source.data()[from]).at(start)));
        }

        while len > 1 {
            let prefix = std::str::from_utf8(&self.source.data()[from..from + len]).ok();

            if let Some(kind) = prefix.and_then(|p| KEYWORDS.get(p)) {
                let kind = kind.clone();
                self.rewind_to(from + len);
                return Ok(Some(kind.at(start)));
            }

            len -= 1;
        }

        self.rewind_to(from + 1);

        Ok(Some(TokenKind::Sym(self.source.data()[from]).at(start)))
    }
}

/// Bidirectional cursor over the lexed token sequence with a save/restore
/// point for speculative parsing.
pub struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
    saved: usize,
}

impl Cursor {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            saved: 0,
        }
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub fn prev(&self) -> Option<&Token> {
        self.pos.checked_sub(1).map(|n| &self.tokens[n])
    }

    pub fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    /// Step forward and return the now-previous token. The cursor clamps at
    /// the trailing EOF token.
    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();

        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }

        token
    }

    pub fn save(&mut self) {
        self.saved = self.pos;
    }

    pub fn restore(&mut self) {
        self.pos = self.saved;
    }

    /// Advance and verify the consumed token, reporting `expected` on a
    /// mismatch.
    pub fn expect(
        &mut self,
        kind: TokenKind,
        expected: impl Into<Cow<'static, str>>,
    ) -> Result<Token, ParseError> {
        let token = self.advance();

        if token.kind != kind {
            return Err(parser::ErrorKind::UnexpectedToken {
                expected: expected.into(),
                actual: token.kind.to_string(),
            }
            .at(token.pos));
        }

        Ok(token)
    }
}
