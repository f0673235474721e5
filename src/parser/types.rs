//! Type descriptor parsing: builtin and named types, pointer/reference
//! suffixes, array dimensions, parameter lists, and the bounded-lookahead
//! template-argument heuristic.

use crate::ast::{Param, TypeDesc};
use crate::lexer::{Punct, TokenKind};

use super::parse::{describe, ParseError, Parser};

/// Lookahead budget for the template-argument heuristic. Full
/// disambiguation of `<` needs semantic context this crate does not have;
/// the bounded scan is documented best-effort.
const TEMPLATE_LOOKAHEAD_BUDGET: usize = 64;

impl Parser<'_> {
    /// Parse a complete type: qualifiers, base, then pointer/reference
    /// suffixes. Array dimensions are the declarator's business, not the
    /// type's.
    pub(crate) fn parse_type(&mut self) -> Result<TypeDesc, ParseError> {
        let base = self.parse_base_type()?;
        Ok(self.parse_type_suffix(base))
    }

    /// `const`/`volatile` are recognized and dropped: the model records
    /// declaration structure, not cv-qualification.
    pub(crate) fn skip_cv_qualifiers(&mut self) {
        while self.check_keyword("const") || self.check_keyword("volatile") {
            self.bump();
        }
    }

    /// The undecorated base type: a (possibly multi-word) builtin, an
    /// aggregate tag reference (`struct Node`), or a qualified named type
    /// with optional template arguments.
    pub(crate) fn parse_base_type(&mut self) -> Result<TypeDesc, ParseError> {
        self.skip_cv_qualifiers();

        if self.check_keyword("struct") || self.check_keyword("union") || self.check_keyword("class")
        {
            self.bump();
            let tag = self.expect_ident("after aggregate keyword in type position")?;
            return Ok(TypeDesc::named(tag.text));
        }

        if self.peek().kind == TokenKind::Keyword
            && self.config.is_builtin_type_word(&self.peek().text)
        {
            let mut words = vec![self.bump().text];
            while self.peek().kind == TokenKind::Keyword
                && self.config.is_builtin_type_word(&self.peek().text)
            {
                words.push(self.bump().text);
            }
            return Ok(TypeDesc::named(words.join(" ")));
        }

        if self.check_ident() {
            let path = self.parse_qualified_name()?;
            return Ok(TypeDesc::named(path));
        }

        Err(self.error(format!("expected type, found {}", describe(self.peek()))))
    }

    /// Pointer and (C++) reference suffixes, with interleaved qualifiers
    /// (`int * const *`).
    pub(crate) fn parse_type_suffix(&mut self, mut ty: TypeDesc) -> TypeDesc {
        loop {
            if self.match_punct(Punct::Star) {
                self.skip_cv_qualifiers();
                ty = TypeDesc::Pointer {
                    inner: Box::new(ty),
                };
            } else if self.is_cpp() && self.match_punct(Punct::Amp) {
                ty = TypeDesc::Reference {
                    inner: Box::new(ty),
                };
            } else {
                break;
            }
        }
        ty
    }

    /// A possibly `::`-qualified name, with template arguments folded into
    /// the textual path when the angle-bracket heuristic succeeds
    /// (`std::vector<int>`).
    pub(crate) fn parse_qualified_name(&mut self) -> Result<String, ParseError> {
        let first = self.expect_ident("to start qualified name")?;
        let mut path = first.text;

        while self.check_punct(Punct::ColonColon) && self.peek_ahead(1).kind == TokenKind::Ident {
            self.bump();
            path.push_str("::");
            path.push_str(&self.bump().text);
        }

        if self.check_punct(Punct::Lt) {
            if let Some(args) = self.try_template_args() {
                path.push_str(&args);
            }
        }

        Ok(path)
    }

    /// Bounded-lookahead template-argument scan.
    ///
    /// An identifier immediately followed by `<` in type position is tried
    /// as a template instantiation: scan for the matching unbalanced `>`
    /// within the token budget, stopping at `;`, `{`, `}`, or end of input.
    /// On failure the cursor backtracks and `<` stays a comparison operator.
    fn try_template_args(&mut self) -> Option<String> {
        let saved = self.position;
        let mut out = String::from("<");
        let mut depth: usize = 1;
        self.bump(); // '<'

        for _ in 0..TEMPLATE_LOOKAHEAD_BUDGET {
            match self.peek().kind {
                TokenKind::Eof
                | TokenKind::Punct(Punct::Semicolon)
                | TokenKind::Punct(Punct::LBrace)
                | TokenKind::Punct(Punct::RBrace) => break,
                TokenKind::Punct(Punct::Lt) => {
                    depth += 1;
                    out.push('<');
                    self.bump();
                }
                TokenKind::Punct(Punct::Gt) => {
                    depth -= 1;
                    out.push('>');
                    self.bump();
                    if depth == 0 {
                        return Some(out);
                    }
                }
                TokenKind::Punct(Punct::GtGt) => {
                    // Closes two levels (`vector<vector<int>>`).
                    self.bump();
                    out.push_str(">>");
                    if depth == 2 {
                        return Some(out);
                    }
                    if depth < 2 {
                        break;
                    }
                    depth -= 2;
                }
                TokenKind::Punct(Punct::Comma) => {
                    out.push_str(", ");
                    self.bump();
                }
                _ => {
                    let token = self.bump();
                    append_token_text(&mut out, &token.text);
                }
            }
        }

        self.position = saved;
        None
    }

    /// Trailing `[N]` / `[]` dimensions on a declarator. Non-constant
    /// dimension expressions are recorded as unspecified.
    pub(crate) fn parse_array_dims(&mut self) -> Result<Vec<Option<u64>>, ParseError> {
        let mut dims = Vec::new();
        while self.match_punct(Punct::LBracket) {
            if self.match_punct(Punct::RBracket) {
                dims.push(None);
                continue;
            }
            if self.peek().kind == TokenKind::IntLiteral {
                let token = self.bump();
                dims.push(parse_int_literal(&token.text));
            } else {
                while !self.check_punct(Punct::RBracket)
                    && !self.check_punct(Punct::Semicolon)
                    && !self.is_at_end()
                {
                    self.bump();
                }
                dims.push(None);
            }
            self.expect_punct(Punct::RBracket, "after array dimension")?;
        }
        Ok(dims)
    }

    /// Parameter list after a consumed `(`. `(void)` means no parameters;
    /// default arguments are skipped; parameter names are optional.
    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();

        if self.match_punct(Punct::RParen) {
            return Ok(params);
        }
        if self.check_keyword("void")
            && self.peek_ahead(1).kind == TokenKind::Punct(Punct::RParen)
        {
            self.bump();
            self.bump();
            return Ok(params);
        }

        loop {
            if self.match_punct(Punct::Ellipsis) {
                params.push(Param {
                    name: None,
                    ty: TypeDesc::named("..."),
                });
            } else {
                let ty = self.parse_type()?;
                let name = if self.check_ident() {
                    Some(self.bump().text)
                } else {
                    None
                };
                let dims = self.parse_array_dims()?;
                let ty = if dims.is_empty() {
                    ty
                } else {
                    TypeDesc::Array {
                        elem: Box::new(ty),
                        dims,
                    }
                };
                if self.match_punct(Punct::Eq) {
                    self.skip_initializer();
                }
                params.push(Param { name, ty });
            }

            if !self.match_punct(Punct::Comma) {
                break;
            }
        }

        self.expect_punct(Punct::RParen, "after parameter list")?;
        Ok(params)
    }

    /// Parameter types of a function-pointer declarator, names discarded.
    pub(crate) fn parse_fnptr_param_types(&mut self) -> Result<Vec<TypeDesc>, ParseError> {
        Ok(self.parse_params()?.into_iter().map(|p| p.ty).collect())
    }
}

/// Join token text into a rendered fragment, inserting a space only between
/// two word characters.
pub(crate) fn append_token_text(out: &mut String, text: &str) {
    let joins_words = out
        .chars()
        .last()
        .map(|c| c.is_alphanumeric() || c == '_')
        .unwrap_or(false)
        && text
            .chars()
            .next()
            .map(|c| c.is_alphanumeric() || c == '_')
            .unwrap_or(false);
    if joins_words {
        out.push(' ');
    }
    out.push_str(text);
}

/// Parse a decimal or hex integer literal, suffixes tolerated.
pub(crate) fn parse_int_literal(text: &str) -> Option<u64> {
    let trimmed = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse().ok()
    }
}
