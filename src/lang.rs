//! Per-invocation language configuration.
//!
//! The active keyword set is passed explicitly into each parse; there is no
//! process-wide mutable state. The C configuration simply leaves `class`,
//! `template`, and `namespace` out of the keyword set, which disables those
//! productions structurally: the words lex as plain identifiers.

use rustc_hash::FxHashSet;
use serde::Serialize;

/// Language variant selector, switching the active keyword set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
}

/// Keywords shared by both variants.
const C_KEYWORDS: &[&str] = &[
    "struct", "union", "typedef", "const", "static", "extern", "inline", "volatile", "register",
    "unsigned", "signed", "int", "char", "float", "double", "void", "long", "short",
];

/// Additional C++ keywords.
const CPP_KEYWORDS: &[&str] = &[
    "class",
    "public",
    "protected",
    "private",
    "virtual",
    "template",
    "typename",
    "namespace",
    "bool",
];

/// Words that can combine into a multi-word builtin type
/// (`unsigned long int`, `long double`, ...).
const BUILTIN_TYPE_WORDS: &[&str] = &[
    "unsigned", "signed", "int", "char", "float", "double", "void", "long", "short", "bool",
];

/// Immutable keyword configuration handed to the lexer and parser.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    pub language: Language,
    keywords: FxHashSet<&'static str>,
}

impl LanguageConfig {
    pub fn new(language: Language) -> Self {
        let mut keywords: FxHashSet<&'static str> = C_KEYWORDS.iter().copied().collect();
        if language == Language::Cpp {
            keywords.extend(CPP_KEYWORDS.iter().copied());
        }
        Self { language, keywords }
    }

    pub fn c() -> Self {
        Self::new(Language::C)
    }

    pub fn cpp() -> Self {
        Self::new(Language::Cpp)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    /// True for keywords that may open or extend a builtin type name.
    pub fn is_builtin_type_word(&self, word: &str) -> bool {
        BUILTIN_TYPE_WORDS.contains(&word) && self.is_keyword(word)
    }
}

/// Resource and language options for one parse invocation.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub language: Language,
    /// Maximum aggregate/namespace nesting depth before the file's parse is
    /// aborted with `ResourceLimitExceeded`.
    pub max_nesting_depth: usize,
    /// Maximum number of tokens per file before the same abort.
    pub max_tokens: usize,
}

impl ParseOptions {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            max_nesting_depth: 64,
            max_tokens: 1_000_000,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new(Language::Cpp)
    }
}
