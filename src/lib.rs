//! # Introduction
//!
//! declex extracts declaration structure from C and C++ source: struct,
//! class, union, and typedef shapes, member lists with documentation
//! comments attached, inheritance relationships, and a qualified-name
//! symbol table. It is a declaration recognizer, not a compiler frontend:
//! function bodies are skipped, expressions are never evaluated, and the
//! preprocessor is not run.
//!
//! ## Extraction pipeline
//!
//! ```text
//! Source → Lexer → Doc association → Parser → Symbol table → Diagnostics
//! ```
//!
//! 1. [`lexer`] — tokenises the source, keeping comments and preprocessor
//!    lines as tokens so later stages can claim them.
//! 2. [`comments`] — associates contiguous comment runs with the
//!    declaration that immediately follows them.
//! 3. [`parser`] — recursive descent over the declaration grammar, with
//!    per-declaration error recovery.
//! 4. [`symbols`] — lifts the parsed unit into a scope tree with a flat
//!    qualified-name index; tables from separate files merge associatively.
//! 5. [`diagnostics`] — structured records collected across every stage,
//!    sorted by file and position.
//!
//! Malformed input degrades the result instead of failing it: a syntax
//! error costs one declaration, and only resource-limit or truncation
//! conditions abandon a file (returning an empty table carrying the fatal
//! diagnostic).
//!
//! ## Example
//!
//! ```
//! use declex::{extract, Language};
//!
//! let table = extract("struct Point { int x; int y; };", "point.h", Language::C);
//! assert!(table.lookup("Point").is_some());
//! assert!(table.diagnostics.is_empty());
//! ```

pub mod ast;
pub mod canon;
pub mod comments;
pub mod diagnostics;
pub mod lang;
pub mod lexer;
pub mod parser;
pub mod symbols;

pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use lang::{Language, LanguageConfig, ParseOptions};
pub use symbols::{SymbolKind, SymbolTable};

use comments::DocMap;
use diagnostics::Diagnostics;
use lexer::{Lexer, Token};
use parser::Parser;

/// Extract the symbol table of one source buffer with default options.
pub fn extract(source: &str, file: &str, language: Language) -> SymbolTable {
    extract_with(source, file, &ParseOptions::new(language))
}

/// Extract the symbol table of one source buffer.
///
/// Never fails: recoverable problems become diagnostics on the returned
/// table, and a fatal condition (truncated input, resource limit) yields an
/// empty table whose diagnostics say why.
pub fn extract_with(source: &str, file: &str, options: &ParseOptions) -> SymbolTable {
    let config = LanguageConfig::new(options.language);
    let mut diags = Diagnostics::new(file);

    let tokens = match Lexer::new(source, &config).tokenize(options.max_tokens, &mut diags) {
        Ok(tokens) => tokens,
        Err(err) => {
            let kind = err.diagnostic_kind();
            let loc = err.location();
            diags.push(kind, err.to_string(), loc);
            return SymbolTable::empty(file, diags);
        }
    };

    let docs = DocMap::build(&tokens);
    let significant: Vec<Token> = tokens.into_iter().filter(|t| !t.is_trivia()).collect();

    let mut parser = Parser::new(significant, docs, &config, options, &mut diags);
    match parser.parse_unit() {
        Ok(unit) => {
            let orphans = parser.into_orphans();
            SymbolTable::build(file, unit, diags, orphans)
        }
        Err(err) => {
            let loc = err.location();
            let msg = err.to_string();
            drop(parser);
            diags.push(DiagnosticKind::ResourceLimitExceeded, msg, loc);
            SymbolTable::empty(file, diags)
        }
    }
}
