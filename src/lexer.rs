//! Lexer (tokenizer) for C/C++ declaration surfaces.
//!
//! Converts raw source text into a flat [`Token`] vector terminated by an
//! explicit [`TokenKind::Eof`] token. Comments are not discarded: they are
//! emitted as tokens so the doc-comment associator can decide attachment.
//! Preprocessor directive lines (`#...`) are recognized structurally and
//! passed through as opaque tokens without being expanded. The lexer never
//! performs I/O.
//!
//! Angle brackets are emitted as plain punctuation; disambiguation between
//! "less-than" and "template argument list" is deferred to the parser.

use thiserror::Error;

use crate::ast::SourceLocation;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lang::LanguageConfig;

/// Punctuation and operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,     // (
    RParen,     // )
    LBrace,     // {
    RBrace,     // }
    LBracket,   // [
    RBracket,   // ]
    Semicolon,  // ;
    Comma,      // ,
    Star,       // *
    Amp,        // &
    AmpAmp,     // &&
    Lt,         // <
    Gt,         // >
    Le,         // <=
    Ge,         // >=
    LtLt,       // <<
    GtGt,       // >>
    Colon,      // :
    ColonColon, // ::
    Tilde,      // ~
    Eq,         // =
    EqEq,       // ==
    NotEq,      // !=
    Dot,        // .
    Arrow,      // ->
    Plus,       // +
    PlusPlus,   // ++
    Minus,      // -
    MinusMinus, // --
    Slash,      // /
    Percent,    // %
    Bang,       // !
    Pipe,       // |
    PipePipe,   // ||
    Caret,      // ^
    Question,   // ?
    Ellipsis,   // ...
}

impl Punct {
    pub fn as_str(self) -> &'static str {
        match self {
            Punct::LParen => "(",
            Punct::RParen => ")",
            Punct::LBrace => "{",
            Punct::RBrace => "}",
            Punct::LBracket => "[",
            Punct::RBracket => "]",
            Punct::Semicolon => ";",
            Punct::Comma => ",",
            Punct::Star => "*",
            Punct::Amp => "&",
            Punct::AmpAmp => "&&",
            Punct::Lt => "<",
            Punct::Gt => ">",
            Punct::Le => "<=",
            Punct::Ge => ">=",
            Punct::LtLt => "<<",
            Punct::GtGt => ">>",
            Punct::Colon => ":",
            Punct::ColonColon => "::",
            Punct::Tilde => "~",
            Punct::Eq => "=",
            Punct::EqEq => "==",
            Punct::NotEq => "!=",
            Punct::Dot => ".",
            Punct::Arrow => "->",
            Punct::Plus => "+",
            Punct::PlusPlus => "++",
            Punct::Minus => "-",
            Punct::MinusMinus => "--",
            Punct::Slash => "/",
            Punct::Percent => "%",
            Punct::Bang => "!",
            Punct::Pipe => "|",
            Punct::PipePipe => "||",
            Punct::Caret => "^",
            Punct::Question => "?",
            Punct::Ellipsis => "...",
        }
    }
}

/// Comment flavor, kept so the associator can report ranges faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    Line,
    Block,
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,
    Punct(Punct),
    Comment(CommentStyle),
    /// An entire `#...` directive line, unexpanded.
    Preprocessor,
    Eof,
}

/// One lexed token: kind, raw source text, and start position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub loc: SourceLocation,
}

impl Token {
    /// Comments and preprocessor lines are trivia for the grammar but not
    /// for the doc-comment associator.
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Comment(_) | TokenKind::Preprocessor)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Position just past the last character of this token.
    pub fn end_location(&self) -> SourceLocation {
        let mut line = self.loc.line;
        let mut column = self.loc.column;
        for ch in self.text.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        SourceLocation::new(line, column, self.loc.offset + self.text.len())
    }
}

/// Fatal lexer conditions. Everything else degrades into a diagnostic and
/// the lexer keeps going.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { location: SourceLocation },
    #[error("unterminated character literal")]
    UnterminatedChar { location: SourceLocation },
    #[error("unterminated block comment")]
    UnterminatedComment { location: SourceLocation },
    #[error("token budget of {limit} exceeded")]
    TokenBudgetExceeded {
        limit: usize,
        location: SourceLocation,
    },
}

impl LexError {
    pub fn location(&self) -> SourceLocation {
        match self {
            LexError::UnterminatedString { location }
            | LexError::UnterminatedChar { location }
            | LexError::UnterminatedComment { location }
            | LexError::TokenBudgetExceeded { location, .. } => *location,
        }
    }

    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            LexError::TokenBudgetExceeded { .. } => DiagnosticKind::ResourceLimitExceeded,
            _ => DiagnosticKind::TruncatedInput,
        }
    }
}

/// Lexer over an in-memory source buffer.
pub struct Lexer<'a> {
    input: Vec<char>,
    config: &'a LanguageConfig,
    position: usize,
    line: usize,
    column: usize,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, config: &'a LanguageConfig) -> Self {
        Self {
            input: input.chars().collect(),
            config,
            position: 0,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// Tokenize the entire input.
    ///
    /// Recoverable oddities (unexpected characters) are reported through
    /// `diags` and skipped; only truncated input and the token budget abort.
    pub fn tokenize(
        &mut self,
        max_tokens: usize,
        diags: &mut Diagnostics,
    ) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    loc: self.current_location(),
                });
                break;
            }

            let token = self.next_token(diags)?;
            if let Some(token) = token {
                tokens.push(token);
                if tokens.len() > max_tokens {
                    return Err(LexError::TokenBudgetExceeded {
                        limit: max_tokens,
                        location: self.current_location(),
                    });
                }
            }
        }

        log::trace!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }

    /// Lex one token. Returns `None` when an unexpected character was
    /// reported and skipped.
    fn next_token(&mut self, diags: &mut Diagnostics) -> Result<Option<Token>, LexError> {
        let loc = self.current_location();
        let start = self.position;
        let ch = match self.advance() {
            Some(ch) => ch,
            None => return Ok(None),
        };

        let kind = match ch {
            '#' => return Ok(Some(self.preprocessor_line(loc, start))),
            '"' => return self.string_literal(loc, start).map(Some),
            '\'' => return self.char_literal(loc, start).map(Some),
            '0'..='9' => return Ok(Some(self.number_literal(loc, start))),
            'a'..='z' | 'A'..='Z' | '_' => return Ok(Some(self.identifier_or_keyword(loc, start))),

            '/' => {
                if self.peek() == Some('/') {
                    return Ok(Some(self.line_comment(loc, start)));
                } else if self.peek() == Some('*') {
                    return self.block_comment(loc, start).map(Some);
                }
                TokenKind::Punct(Punct::Slash)
            }
            '+' => {
                if self.consume_if('+') {
                    TokenKind::Punct(Punct::PlusPlus)
                } else {
                    TokenKind::Punct(Punct::Plus)
                }
            }
            '-' => {
                if self.consume_if('-') {
                    TokenKind::Punct(Punct::MinusMinus)
                } else if self.consume_if('>') {
                    TokenKind::Punct(Punct::Arrow)
                } else {
                    TokenKind::Punct(Punct::Minus)
                }
            }
            '*' => TokenKind::Punct(Punct::Star),
            '%' => TokenKind::Punct(Punct::Percent),
            '=' => {
                if self.consume_if('=') {
                    TokenKind::Punct(Punct::EqEq)
                } else {
                    TokenKind::Punct(Punct::Eq)
                }
            }
            '!' => {
                if self.consume_if('=') {
                    TokenKind::Punct(Punct::NotEq)
                } else {
                    TokenKind::Punct(Punct::Bang)
                }
            }
            '<' => {
                if self.consume_if('=') {
                    TokenKind::Punct(Punct::Le)
                } else if self.consume_if('<') {
                    TokenKind::Punct(Punct::LtLt)
                } else {
                    TokenKind::Punct(Punct::Lt)
                }
            }
            '>' => {
                if self.consume_if('=') {
                    TokenKind::Punct(Punct::Ge)
                } else if self.consume_if('>') {
                    TokenKind::Punct(Punct::GtGt)
                } else {
                    TokenKind::Punct(Punct::Gt)
                }
            }
            '&' => {
                if self.consume_if('&') {
                    TokenKind::Punct(Punct::AmpAmp)
                } else {
                    TokenKind::Punct(Punct::Amp)
                }
            }
            '|' => {
                if self.consume_if('|') {
                    TokenKind::Punct(Punct::PipePipe)
                } else {
                    TokenKind::Punct(Punct::Pipe)
                }
            }
            ':' => {
                if self.consume_if(':') {
                    TokenKind::Punct(Punct::ColonColon)
                } else {
                    TokenKind::Punct(Punct::Colon)
                }
            }
            '.' => {
                if self.peek() == Some('.') && self.peek_ahead(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Punct(Punct::Ellipsis)
                } else {
                    TokenKind::Punct(Punct::Dot)
                }
            }
            '^' => TokenKind::Punct(Punct::Caret),
            '~' => TokenKind::Punct(Punct::Tilde),
            '?' => TokenKind::Punct(Punct::Question),
            '(' => TokenKind::Punct(Punct::LParen),
            ')' => TokenKind::Punct(Punct::RParen),
            '{' => TokenKind::Punct(Punct::LBrace),
            '}' => TokenKind::Punct(Punct::RBrace),
            '[' => TokenKind::Punct(Punct::LBracket),
            ']' => TokenKind::Punct(Punct::RBracket),
            ';' => TokenKind::Punct(Punct::Semicolon),
            ',' => TokenKind::Punct(Punct::Comma),

            _ => {
                diags.push(
                    DiagnosticKind::SyntaxError,
                    format!("unexpected character '{}'", ch),
                    loc,
                );
                return Ok(None);
            }
        };

        Ok(Some(Token {
            kind,
            text: self.slice_from(start),
            loc,
        }))
    }

    /// A whole `#...` line, including backslash-newline continuations.
    fn preprocessor_line(&mut self, loc: SourceLocation, start: usize) -> Token {
        while let Some(ch) = self.peek() {
            if ch == '\\' && self.peek_ahead(1) == Some('\n') {
                self.advance();
                self.advance();
                continue;
            }
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        Token {
            kind: TokenKind::Preprocessor,
            text: self.slice_from(start),
            loc,
        }
    }

    /// String literal, captured verbatim with quotes and escapes intact.
    /// Escape recognition only has to be good enough to find the closing
    /// quote; unknown escapes pass through (this is extraction, not
    /// compilation).
    fn string_literal(&mut self, loc: SourceLocation, start: usize) -> Result<Token, LexError> {
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.advance();
                self.advance();
                continue;
            }
            if ch == '"' {
                self.advance();
                return Ok(Token {
                    kind: TokenKind::StringLiteral,
                    text: self.slice_from(start),
                    loc,
                });
            }
            self.advance();
        }
        Err(LexError::UnterminatedString { location: loc })
    }

    /// Character literal, captured verbatim.
    fn char_literal(&mut self, loc: SourceLocation, start: usize) -> Result<Token, LexError> {
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.advance();
                self.advance();
                continue;
            }
            if ch == '\'' {
                self.advance();
                return Ok(Token {
                    kind: TokenKind::CharLiteral,
                    text: self.slice_from(start),
                    loc,
                });
            }
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        Err(LexError::UnterminatedChar { location: loc })
    }

    /// Integer or float literal: decimal, hex, fraction, exponent, and the
    /// usual suffix letters.
    fn number_literal(&mut self, loc: SourceLocation, start: usize) -> Token {
        let mut is_float = false;

        if self.slice_from(start) == "0" && matches!(self.peek(), Some('x') | Some('X')) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
            if self.peek() == Some('.')
                && matches!(self.peek_ahead(1), Some(c) if c.is_ascii_digit())
            {
                is_float = true;
                self.advance();
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
            if matches!(self.peek(), Some('e') | Some('E')) {
                let mut lookahead = 1;
                if matches!(self.peek_ahead(1), Some('+') | Some('-')) {
                    lookahead = 2;
                }
                if matches!(self.peek_ahead(lookahead), Some(c) if c.is_ascii_digit()) {
                    is_float = true;
                    for _ in 0..=lookahead {
                        self.advance();
                    }
                    while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                        self.advance();
                    }
                }
            }
        }

        while matches!(
            self.peek(),
            Some('u') | Some('U') | Some('l') | Some('L') | Some('f') | Some('F')
        ) {
            if matches!(self.peek(), Some('f') | Some('F')) {
                is_float = true;
            }
            self.advance();
        }

        Token {
            kind: if is_float {
                TokenKind::FloatLiteral
            } else {
                TokenKind::IntLiteral
            },
            text: self.slice_from(start),
            loc,
        }
    }

    fn identifier_or_keyword(&mut self, loc: SourceLocation, start: usize) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = self.slice_from(start);
        let kind = if self.config.is_keyword(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        Token { kind, text, loc }
    }

    fn line_comment(&mut self, loc: SourceLocation, start: usize) -> Token {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        Token {
            kind: TokenKind::Comment(CommentStyle::Line),
            text: self.slice_from(start),
            loc,
        }
    }

    fn block_comment(&mut self, loc: SourceLocation, start: usize) -> Result<Token, LexError> {
        self.advance(); // '*'
        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(Token {
                    kind: TokenKind::Comment(CommentStyle::Block),
                    text: self.slice_from(start),
                    loc,
                });
            }
            self.advance();
        }
        Err(LexError::UnterminatedComment { location: loc })
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r') | Some('\n')) {
            self.advance();
        }
    }

    /// Collect the characters lexed since `start` into the token text.
    fn slice_from(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn consume_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.input.get(self.position).copied()?;
        self.position += 1;
        self.offset += ch.len_utf8();

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset)
    }
}
