//! Recursive-descent recognizer for the C/C++ declaration surface.
//!
//! This module transforms the token stream into declaration nodes:
//! - [`parse`]: Parser struct, cursor helpers, error recovery, and the
//!   translation-unit entry point
//! - [`declarations`]: aggregates, typedefs, namespaces, members, functions
//! - [`types`]: type descriptors, parameter lists, and the bounded-lookahead
//!   template-argument heuristic
//!
//! # Scope
//!
//! The grammar targets declarations only (types, members, signatures,
//! hierarchies). Function bodies are skipped as balanced brace groups;
//! expression parsing is out of scope. Preprocessor directives arrive as
//! opaque tokens and are filtered before parsing.
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser`
//! blocks, allowing each module to extend the Parser with related
//! functionality while maintaining access to the shared parser state. On a
//! token sequence that matches no production the parser emits a
//! `SyntaxError` diagnostic and resynchronizes at the next declaration
//! boundary; it never abandons the file for one bad declaration.

pub mod declarations;
pub mod parse;
pub mod types;

pub use parse::{ParseError, Parser};
