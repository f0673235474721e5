//! Doc-comment association.
//!
//! A comment run attaches to the declaration immediately following it only
//! when no blank line separates them. Multiple contiguous comment blocks
//! concatenate in source order into one [`DocComment`]. Runs that attach to
//! nothing are retained as orphans on the symbol table.
//!
//! Association is keyed by the byte offset of the next significant token:
//! the parser claims the pending comment when it starts a declaration (or a
//! field/method) at that offset, and everything left unclaimed after the
//! parse becomes an orphan.

use rustc_hash::FxHashMap;

use crate::ast::{DocComment, SourceRange};
use crate::lexer::{Token, TokenKind};

/// Pending doc comments, keyed by the offset of the token they precede.
#[derive(Debug, Default)]
pub struct DocMap {
    pending: FxHashMap<usize, DocComment>,
    orphans: Vec<DocComment>,
}

impl DocMap {
    /// Scan the full token stream (comments included) and group comment runs.
    pub fn build(tokens: &[Token]) -> Self {
        let mut map = DocMap::default();
        let mut i = 0;

        while i < tokens.len() {
            if !matches!(tokens[i].kind, TokenKind::Comment(_)) {
                i += 1;
                continue;
            }

            // Collect a run of line-contiguous comment blocks.
            let start = tokens[i].loc;
            let mut text = tokens[i].text.clone();
            let mut end = tokens[i].end_location();
            i += 1;
            while i < tokens.len()
                && matches!(tokens[i].kind, TokenKind::Comment(_))
                && tokens[i].loc.line <= end.line + 1
            {
                text.push('\n');
                text.push_str(&tokens[i].text);
                end = tokens[i].end_location();
                i += 1;
            }

            let doc = DocComment {
                text,
                range: SourceRange::new(start, end),
            };

            // Attach to the next significant token unless a blank line (or a
            // preprocessor directive) intervenes.
            match tokens.get(i) {
                Some(next)
                    if !next.is_eof()
                        && next.kind != TokenKind::Preprocessor
                        && next.loc.line <= end.line + 1 =>
                {
                    map.pending.insert(next.loc.offset, doc);
                }
                _ => map.orphans.push(doc),
            }
        }

        map
    }

    /// Claim the comment pending at a declaration's first token, if any.
    pub fn take(&mut self, offset: usize) -> Option<DocComment> {
        self.pending.remove(&offset)
    }

    /// Move a pending comment's claim point. The parser uses this when it
    /// consumes tokens no production claims (access labels), so a comment
    /// written before `public:` still documents the member after it.
    pub fn retarget(&mut self, from: usize, to: usize) {
        if let Some(doc) = self.pending.remove(&from) {
            self.pending.entry(to).or_insert(doc);
        }
    }

    /// Unclaimed comments, in source order.
    pub fn into_orphans(self) -> Vec<DocComment> {
        let mut orphans = self.orphans;
        orphans.extend(self.pending.into_values());
        orphans.sort_by_key(|d| d.range.start.offset);
        orphans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lang::LanguageConfig;
    use crate::lexer::Lexer;

    fn tokens(source: &str) -> Vec<Token> {
        let cfg = LanguageConfig::cpp();
        let mut diags = Diagnostics::new("test.cpp");
        Lexer::new(source, &cfg).tokenize(1_000_000, &mut diags).unwrap()
    }

    fn offset_of(toks: &[Token], text: &str) -> usize {
        toks.iter().find(|t| t.text == text).unwrap().loc.offset
    }

    #[test]
    fn test_attaches_without_blank_line() {
        let toks = tokens("// Simple struct\nstruct Point { int x; };");
        let mut map = DocMap::build(&toks);
        let doc = map.take(offset_of(&toks, "struct")).unwrap();
        assert_eq!(doc.text, "// Simple struct");
    }

    #[test]
    fn test_blank_line_orphans_comment() {
        let toks = tokens("// floating note\n\nstruct Point { int x; };");
        let mut map = DocMap::build(&toks);
        assert!(map.take(offset_of(&toks, "struct")).is_none());
        let orphans = map.into_orphans();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].text, "// floating note");
    }

    #[test]
    fn test_contiguous_blocks_concatenate() {
        let toks = tokens("// first\n// second\nstruct Point {};");
        let mut map = DocMap::build(&toks);
        let doc = map.take(offset_of(&toks, "struct")).unwrap();
        assert_eq!(doc.text, "// first\n// second");
    }

    #[test]
    fn test_block_comment_attaches() {
        let toks = tokens("/**\n * C test fixture.\n */\nstruct Point {};");
        let mut map = DocMap::build(&toks);
        let doc = map.take(offset_of(&toks, "struct")).unwrap();
        assert!(doc.text.starts_with("/**"));
        assert!(doc.text.ends_with("*/"));
    }

    #[test]
    fn test_retarget_moves_claim_point() {
        let toks = tokens("// for the member\npublic:\nint x;");
        let mut map = DocMap::build(&toks);
        map.retarget(offset_of(&toks, "public"), offset_of(&toks, "int"));
        assert!(map.take(offset_of(&toks, "public")).is_none());
        let doc = map.take(offset_of(&toks, "int")).unwrap();
        assert_eq!(doc.text, "// for the member");
    }

    #[test]
    fn test_trailing_comment_is_orphan() {
        let toks = tokens("struct Point {};\n// trailing");
        let map = DocMap::build(&toks);
        let orphans = map.into_orphans();
        assert_eq!(orphans.len(), 1);
    }

    #[test]
    fn test_directive_breaks_attachment() {
        let toks = tokens("// about the include\n#include <stdio.h>\nint x;");
        let map = DocMap::build(&toks);
        let orphans = map.into_orphans();
        assert_eq!(orphans.len(), 1);
    }
}
