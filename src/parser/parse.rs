//! Parser coordinator: cursor state, helper methods, error recovery, and
//! the translation-unit entry point.

use thiserror::Error;

use crate::ast::{DocComment, SourceLocation, TranslationUnit};
use crate::comments::DocMap;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lang::{Language, LanguageConfig, ParseOptions};
use crate::lexer::{Punct, Token, TokenKind};

/// Parser failure modes.
///
/// `Syntax` is recoverable: the caller reports it and resynchronizes.
/// `DepthExceeded` is fatal for the file and propagates out of the parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },
    #[error("nesting depth limit of {limit} exceeded")]
    DepthExceeded {
        limit: usize,
        location: SourceLocation,
    },
}

impl ParseError {
    pub fn location(&self) -> SourceLocation {
        match self {
            ParseError::Syntax { location, .. } => *location,
            ParseError::DepthExceeded { location, .. } => *location,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseError::DepthExceeded { .. })
    }
}

/// Recursive descent parser over a trivia-free token vector.
pub struct Parser<'a> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    pub(crate) config: &'a LanguageConfig,
    pub(crate) max_depth: usize,
    pub(crate) depth: usize,
    pub(crate) docs: DocMap,
    pub(crate) diags: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    /// `tokens` must already be filtered of comments and preprocessor
    /// directives and terminated by an `Eof` token; `docs` was built from
    /// the unfiltered stream.
    pub fn new(
        tokens: Vec<Token>,
        docs: DocMap,
        config: &'a LanguageConfig,
        options: &ParseOptions,
        diags: &'a mut Diagnostics,
    ) -> Self {
        Self {
            tokens,
            position: 0,
            config,
            max_depth: options.max_nesting_depth,
            depth: 0,
            docs,
            diags,
        }
    }

    /// Parse the whole translation unit, recovering from syntax errors at
    /// declaration boundaries. Only the nesting budget aborts.
    pub fn parse_unit(&mut self) -> Result<TranslationUnit, ParseError> {
        let mut unit = TranslationUnit::default();

        while !self.is_at_end() {
            let before = self.position;
            match self.parse_declaration("") {
                Ok(item) => {
                    unit.decls.extend(item.decls);
                    unit.vars.extend(item.vars);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.diags
                        .push(DiagnosticKind::SyntaxError, e.to_string(), e.location());
                    self.resync();
                }
            }
            // A stuck cursor would loop forever; force progress.
            if self.position == before && !self.is_at_end() {
                self.bump();
            }
        }

        log::debug!(
            "parsed {} top-level declarations, {} diagnostics",
            unit.decls.len(),
            self.diags.len()
        );
        Ok(unit)
    }

    /// Orphaned doc comments left after the parse.
    pub fn into_orphans(self) -> Vec<DocComment> {
        self.docs.into_orphans()
    }

    // ----- cursor helpers -----

    pub(crate) fn peek(&self) -> &Token {
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().expect("token stream has Eof"))
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> &Token {
        self.tokens
            .get(self.position + n)
            .unwrap_or_else(|| self.tokens.last().expect("token stream has Eof"))
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        // Park on Eof rather than run off the end.
        if !token.is_eof() {
            self.position += 1;
        }
        token
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().loc
    }

    /// End position of the most recently consumed token.
    pub(crate) fn prev_end(&self) -> SourceLocation {
        if self.position == 0 {
            return self.current_location();
        }
        self.tokens[self.position - 1].end_location()
    }

    pub(crate) fn check_punct(&self, p: Punct) -> bool {
        self.peek().kind == TokenKind::Punct(p)
    }

    pub(crate) fn match_punct(&mut self, p: Punct) -> bool {
        if self.check_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_keyword(&self, word: &str) -> bool {
        self.peek().kind == TokenKind::Keyword && self.peek().text == word
    }

    pub(crate) fn match_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_ident(&self) -> bool {
        self.peek().kind == TokenKind::Ident
    }

    /// Contextual keywords (`override`, `final`) are ordinary identifiers.
    pub(crate) fn match_contextual(&mut self, word: &str) -> bool {
        if self.check_ident() && self.peek().text == word {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, p: Punct, context: &str) -> Result<Token, ParseError> {
        if self.check_punct(p) {
            Ok(self.bump())
        } else {
            Err(self.error(format!(
                "expected '{}' {}, found {}",
                p.as_str(),
                context,
                describe(self.peek())
            )))
        }
    }

    pub(crate) fn expect_ident(&mut self, context: &str) -> Result<Token, ParseError> {
        if self.check_ident() {
            Ok(self.bump())
        } else {
            Err(self.error(format!(
                "expected identifier {}, found {}",
                context,
                describe(self.peek())
            )))
        }
    }

    pub(crate) fn error(&self, message: String) -> ParseError {
        ParseError::Syntax {
            message,
            location: self.current_location(),
        }
    }

    /// Claim the doc comment pending at the current token, if any.
    pub(crate) fn take_doc(&mut self) -> Option<DocComment> {
        self.docs.take(self.peek().loc.offset)
    }

    pub(crate) fn is_cpp(&self) -> bool {
        self.config.language == Language::Cpp
    }

    // ----- nesting budget -----

    pub(crate) fn enter_nested(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::DepthExceeded {
                limit: self.max_depth,
                location: self.current_location(),
            });
        }
        Ok(())
    }

    pub(crate) fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ----- recovery -----

    /// Skip tokens until a declaration boundary: a `;` at brace depth 0
    /// relative to the error (consumed), or a `}` closing an aggregate we
    /// were inside (left for the enclosing production to consume).
    pub(crate) fn resync(&mut self) {
        let mut depth: usize = 0;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Punct(Punct::Semicolon) if depth == 0 => {
                    self.bump();
                    return;
                }
                TokenKind::Punct(Punct::LBrace) => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::Punct(Punct::RBrace) => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Consume a balanced `{ ... }` group (method or function body) without
    /// interpreting its contents.
    pub(crate) fn skip_balanced_braces(&mut self) -> Result<(), ParseError> {
        self.expect_punct(Punct::LBrace, "to open body")?;
        let mut depth: usize = 1;
        while depth > 0 {
            if self.is_at_end() {
                return Err(self.error("unterminated body at end of input".to_string()));
            }
            match self.bump().kind {
                TokenKind::Punct(Punct::LBrace) => depth += 1,
                TokenKind::Punct(Punct::RBrace) => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Skip an initializer expression up to `;` or a top-level `,`,
    /// tolerating nested braces, parens, and brackets.
    pub(crate) fn skip_initializer(&mut self) {
        let mut depth: usize = 0;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Punct(Punct::Semicolon) | TokenKind::Punct(Punct::Comma)
                    if depth == 0 =>
                {
                    return;
                }
                TokenKind::Punct(Punct::LBrace)
                | TokenKind::Punct(Punct::LParen)
                | TokenKind::Punct(Punct::LBracket) => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::Punct(Punct::RBrace)
                | TokenKind::Punct(Punct::RParen)
                | TokenKind::Punct(Punct::RBracket) => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }
}

/// Human-readable token description for error messages.
pub(crate) fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of file".to_string(),
        TokenKind::Ident => format!("identifier '{}'", token.text),
        TokenKind::Keyword => format!("'{}'", token.text),
        _ => format!("'{}'", token.text),
    }
}
