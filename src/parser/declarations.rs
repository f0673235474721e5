//! Declaration parsing: aggregates with base lists and template parameters,
//! typedefs, forward declarations, namespaces, members (fields, methods,
//! nested and anonymous aggregates, function pointers, bit-fields), and
//! free functions.
//!
//! Trailing identifiers after an aggregate body are recorded as typedef
//! aliases only when a `typedef` keyword was seen; otherwise they are
//! instance variables, which belong to the enclosing scope and not to the
//! type. Function and method bodies are skipped as balanced brace groups.

use rustc_hash::FxHashSet;

use crate::ast::{
    join_path, Aggregate, AggregateKind, Declaration, DocComment, Field, ForwardDecl, Function,
    InstanceVar, Member, Namespace, Param, SourceLocation, SourceRange, Typedef, TypeDesc,
    Visibility,
};
use crate::canon;
use crate::diagnostics::DiagnosticKind;
use crate::lexer::{Punct, TokenKind};

use super::parse::{ParseError, Parser};
use super::types::parse_int_literal;

/// Output of one declaration production: zero or more declarations plus any
/// instance variables that belong to the enclosing scope.
#[derive(Debug, Default)]
pub struct ParsedItem {
    pub decls: Vec<Declaration>,
    pub vars: Vec<InstanceVar>,
}

impl ParsedItem {
    fn decl(decl: Declaration) -> Self {
        Self {
            decls: vec![decl],
            vars: Vec::new(),
        }
    }
}

impl Parser<'_> {
    /// Parse one declaration at the given scope path.
    pub(crate) fn parse_declaration(&mut self, path: &str) -> Result<ParsedItem, ParseError> {
        // Stray semicolons are legal and empty.
        if self.match_punct(Punct::Semicolon) {
            return Ok(ParsedItem::default());
        }

        let doc = self.take_doc();
        let start = self.current_location();

        if self.is_cpp() && self.check_keyword("template") {
            let template_params = self.parse_template_params()?;
            if self.check_keyword("struct")
                || self.check_keyword("class")
                || self.check_keyword("union")
            {
                return self.parse_aggregate_decl(path, doc, template_params, false, start);
            }
            // Template free function: the parameter list is not modeled on
            // functions, only the signature is.
            return self.parse_function_or_var(path, doc, start);
        }

        if self.check_keyword("typedef") {
            return self.parse_typedef(path, doc, start);
        }

        if self.check_keyword("struct") || self.check_keyword("union") || self.check_keyword("class")
        {
            // Distinguish the aggregate productions from a declaration that
            // merely uses the tag as a type:
            //   struct Name { ... };     aggregate definition
            //   struct Name : Base {     aggregate definition
            //   struct Name;             forward declaration
            //   struct Name fn(...);     function returning the tag
            //   struct Name var;         instance variable
            if self.peek_ahead(1).kind == TokenKind::Ident {
                match self.peek_ahead(2).kind {
                    TokenKind::Punct(Punct::LBrace)
                    | TokenKind::Punct(Punct::Colon)
                    | TokenKind::Punct(Punct::Semicolon) => {
                        return self.parse_aggregate_decl(path, doc, Vec::new(), false, start)
                    }
                    _ => return self.parse_function_or_var(path, doc, start),
                }
            }
            return self.parse_aggregate_decl(path, doc, Vec::new(), false, start);
        }

        if self.is_cpp() && self.check_keyword("namespace") {
            return self.parse_namespace(path, doc, start);
        }

        self.parse_function_or_var(path, doc, start)
    }

    /// `template < ... >` parameter list, split on top-level commas and
    /// rendered textually (`typename T`, `int N`).
    fn parse_template_params(&mut self) -> Result<Vec<String>, ParseError> {
        self.bump(); // 'template'
        self.expect_punct(Punct::Lt, "after 'template'")?;

        let mut params = Vec::new();
        let mut current = String::new();
        let mut depth: usize = 1;

        loop {
            match self.peek().kind {
                TokenKind::Eof
                | TokenKind::Punct(Punct::Semicolon)
                | TokenKind::Punct(Punct::LBrace) => {
                    return Err(self.error("unterminated template parameter list".to_string()));
                }
                TokenKind::Punct(Punct::Lt) => {
                    depth += 1;
                    self.bump();
                    current.push('<');
                }
                TokenKind::Punct(Punct::Gt) => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    current.push('>');
                }
                TokenKind::Punct(Punct::GtGt) => {
                    self.bump();
                    if depth <= 2 {
                        depth = 0;
                        break;
                    }
                    depth -= 2;
                    current.push_str(">>");
                }
                TokenKind::Punct(Punct::Comma) if depth == 1 => {
                    self.bump();
                    params.push(current.trim().to_string());
                    current.clear();
                }
                _ => {
                    let token = self.bump();
                    super::types::append_token_text(&mut current, &token.text);
                }
            }
        }

        if !current.trim().is_empty() {
            params.push(current.trim().to_string());
        }
        Ok(params)
    }

    /// An aggregate declaration at scope level: forward declaration, full
    /// definition with optional typedef aliases or instance variables, or a
    /// typedef of a bare tag reference.
    fn parse_aggregate_decl(
        &mut self,
        path: &str,
        doc: Option<DocComment>,
        template_params: Vec<String>,
        typedef_ctx: bool,
        start: SourceLocation,
    ) -> Result<ParsedItem, ParseError> {
        let kind = self.aggregate_keyword()?;

        // `struct Name;` with no body: forward declaration.
        if self.check_ident() && self.peek_ahead(1).kind == TokenKind::Punct(Punct::Semicolon) {
            let name = self.bump().text;
            self.bump(); // ';'
            return Ok(ParsedItem::decl(Declaration::ForwardDecl(ForwardDecl {
                tag: kind,
                path: join_path(path, &name),
                name,
                doc,
                range: SourceRange::new(start, self.prev_end()),
            })));
        }

        // `typedef struct Foo Bar;` / `typedef struct Foo *Ptr;` with no
        // body: alias of a tag reference.
        if typedef_ctx
            && self.check_ident()
            && !matches!(
                self.peek_ahead(1).kind,
                TokenKind::Punct(Punct::LBrace) | TokenKind::Punct(Punct::Colon)
            )
        {
            let tag = self.bump().text;
            let target = self.parse_type_suffix(TypeDesc::named(tag));
            let name = self.expect_ident("for typedef alias")?.text;
            self.expect_punct(Punct::Semicolon, "after typedef")?;
            return Ok(ParsedItem::decl(Declaration::Typedef(Typedef {
                path: join_path(path, &name),
                name,
                target,
                doc,
                range: SourceRange::new(start, self.prev_end()),
            })));
        }

        let mut agg = self.parse_aggregate_core(kind, path)?;
        agg.template_params = template_params;
        agg.doc = doc;

        let mut item = ParsedItem::default();

        if typedef_ctx {
            loop {
                // Pointer aliases (`typedef struct {...} *P;`) are recorded
                // by name; the indirection is not modeled on aliases.
                while self.match_punct(Punct::Star) {}
                let alias = self.expect_ident("for typedef alias")?.text;
                agg.aliases.push(alias);
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
            if agg.name.is_empty() {
                // Anonymous aggregate adopts its first alias as its name.
                agg.name = agg.aliases[0].clone();
            }
        } else {
            while !self.check_punct(Punct::Semicolon) && !self.is_at_end() {
                while self.match_punct(Punct::Star) {}
                let var = self.expect_ident("for instance variable")?;
                let var_start = var.loc;
                self.parse_array_dims()?;
                if self.match_punct(Punct::Eq) {
                    self.skip_initializer();
                }
                item.vars.push(InstanceVar {
                    name: var.text,
                    type_name: if agg.name.is_empty() {
                        format!("<anonymous {}>", kind.keyword())
                    } else {
                        agg.name.clone()
                    },
                    range: SourceRange::new(var_start, self.prev_end()),
                });
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
        }

        self.expect_punct(Punct::Semicolon, "after aggregate declaration")?;
        agg.range = SourceRange::new(start, self.prev_end());

        if agg.name.is_empty() {
            // An anonymous aggregate is never a first-class scope-level
            // declaration; with instance variables its shape is referenced
            // anonymously, without any it is an error.
            if item.vars.is_empty() {
                self.diags.push(
                    DiagnosticKind::SyntaxError,
                    "anonymous aggregate has no declarator".to_string(),
                    start,
                );
            }
            return Ok(item);
        }

        let mut decl = agg.into_decl(kind);
        // The path was computed before an anonymous tag adopted its alias;
        // recompute top-down.
        decl.set_parent_path(path);
        item.decls.push(decl);
        Ok(item)
    }

    /// Tag, optional base list, and brace-delimited member list. The caller
    /// decides what the trailing declarators mean.
    fn parse_aggregate_core(
        &mut self,
        kind: AggregateKind,
        parent_path: &str,
    ) -> Result<Aggregate, ParseError> {
        let name = if self.check_ident() {
            self.bump().text
        } else {
            String::new()
        };
        let agg_path = join_path(parent_path, &name);

        let mut bases = Vec::new();
        if self.is_cpp() && kind != AggregateKind::Union && self.check_punct(Punct::Colon) {
            self.bump();
            bases = self.parse_base_list(kind)?;
        }

        let members = self.parse_member_list(kind, &agg_path, &name)?;

        Ok(Aggregate {
            name,
            path: agg_path,
            members,
            bases,
            template_params: Vec::new(),
            defined: true,
            aliases: Vec::new(),
            visibility: None,
            doc: None,
            range: SourceRange::at(self.prev_end()),
        })
    }

    /// `: access Name, access Name, ...` with per-kind default access.
    fn parse_base_list(&mut self, kind: AggregateKind) -> Result<Vec<crate::ast::BaseClass>, ParseError> {
        let mut bases = Vec::new();
        loop {
            let mut access = kind.default_visibility();
            loop {
                if self.match_keyword("public") {
                    access = Visibility::Public;
                } else if self.match_keyword("protected") {
                    access = Visibility::Protected;
                } else if self.match_keyword("private") {
                    access = Visibility::Private;
                } else if self.match_keyword("virtual") {
                    // Virtual inheritance: the relationship is recorded, the
                    // sharing semantics are not modeled.
                } else {
                    break;
                }
            }
            let name = self.parse_qualified_name()?;
            bases.push(crate::ast::BaseClass {
                name,
                access,
                resolved: false,
            });
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        Ok(bases)
    }

    /// `{ member* }` with per-member recovery and access-label tracking.
    fn parse_member_list(
        &mut self,
        kind: AggregateKind,
        agg_path: &str,
        tag: &str,
    ) -> Result<Vec<Member>, ParseError> {
        self.expect_punct(Punct::LBrace, "to open aggregate body")?;
        self.enter_nested()?;

        let mut members: Vec<Member> = Vec::new();
        let mut vis = kind.default_visibility();
        let mut anon_counter: usize = 0;

        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            if self.is_cpp()
                && (self.check_keyword("public")
                    || self.check_keyword("protected")
                    || self.check_keyword("private"))
                && self.peek_ahead(1).kind == TokenKind::Punct(Punct::Colon)
            {
                let label_offset = self.current_location().offset;
                let word = self.bump().text;
                self.bump(); // ':'
                vis = match word.as_str() {
                    "public" => Visibility::Public,
                    "protected" => Visibility::Protected,
                    _ => Visibility::Private,
                };
                // A comment written before the label documents the member
                // after it.
                let next_offset = self.current_location().offset;
                self.docs.retarget(label_offset, next_offset);
                continue;
            }
            if self.match_punct(Punct::Semicolon) {
                continue;
            }

            let before = self.position;
            match self.parse_member(agg_path, tag, vis, &mut members, &mut anon_counter) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.diags
                        .push(DiagnosticKind::SyntaxError, e.to_string(), e.location());
                    self.resync();
                }
            }
            if self.position == before && !self.check_punct(Punct::RBrace) && !self.is_at_end() {
                self.bump();
            }
        }

        let closed = self.expect_punct(Punct::RBrace, "to close aggregate body");
        self.exit_nested();
        closed?;
        self.enforce_member_uniqueness(&mut members);
        Ok(members)
    }

    /// Names are unique within one aggregate's direct member list; shadowing
    /// across inheritance is resolved at lookup time, not here.
    fn enforce_member_uniqueness(&mut self, members: &mut Vec<Member>) {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut kept = Vec::with_capacity(members.len());
        for member in members.drain(..) {
            let name = member.name().to_string();
            if name.is_empty() || seen.insert(name.clone()) {
                kept.push(member);
            } else {
                let loc = member.range().start;
                self.diags.push(
                    DiagnosticKind::DuplicateDefinition,
                    format!("duplicate member `{}`", name),
                    loc,
                );
            }
        }
        *members = kept;
    }

    /// One member declaration: nested typedef, destructor, constructor,
    /// nested/anonymous aggregate, method, function-pointer field, or a
    /// comma-separated field list. Fields are committed as soon as their
    /// declarator completes, so a later error in the same line still leaves
    /// the recovered fields in place.
    fn parse_member(
        &mut self,
        agg_path: &str,
        tag: &str,
        vis: Visibility,
        members: &mut Vec<Member>,
        anon_counter: &mut usize,
    ) -> Result<(), ParseError> {
        let mut doc = self.take_doc();
        let start = self.current_location();
        let record_vis = if self.is_cpp() { Some(vis) } else { None };

        if self.check_keyword("typedef") {
            let item = self.parse_typedef(agg_path, doc, start)?;
            for decl in item.decls {
                members.push(Member::Nested(Box::new(decl)));
            }
            return Ok(());
        }

        let mut is_virtual = false;
        let mut is_static = false;
        loop {
            if self.match_keyword("virtual") {
                is_virtual = true;
            } else if self.match_keyword("static") {
                is_static = true;
            } else if self.match_keyword("inline") {
                // Recognized, not modeled.
            } else {
                break;
            }
        }

        // Destructor: `~Name(...)`.
        if self.is_cpp()
            && self.check_punct(Punct::Tilde)
            && self.peek_ahead(1).kind == TokenKind::Ident
        {
            self.bump();
            let name = format!("~{}", self.bump().text);
            self.expect_punct(Punct::LParen, "after destructor name")?;
            let params = self.parse_params()?;
            let func = self.parse_method_tail(
                name,
                TypeDesc::named(""),
                params,
                is_virtual,
                is_static,
                agg_path,
                Some(agg_path.to_string()),
                record_vis,
                doc,
                start,
            )?;
            members.push(Member::Method(func));
            return Ok(());
        }

        // Constructor: the member name repeats the tag and is immediately
        // called.
        if self.is_cpp()
            && !tag.is_empty()
            && self.check_ident()
            && self.peek().text == tag
            && self.peek_ahead(1).kind == TokenKind::Punct(Punct::LParen)
        {
            let name = self.bump().text;
            self.bump(); // '('
            let params = self.parse_params()?;
            let func = self.parse_method_tail(
                name,
                TypeDesc::named(""),
                params,
                is_virtual,
                is_static,
                agg_path,
                Some(agg_path.to_string()),
                record_vis,
                doc,
                start,
            )?;
            members.push(Member::Method(func));
            return Ok(());
        }

        // Nested aggregate definition, named or anonymous.
        if self.check_keyword("struct") || self.check_keyword("union") || self.check_keyword("class")
        {
            let defines = match self.peek_ahead(1).kind {
                TokenKind::Punct(Punct::LBrace) => true,
                TokenKind::Ident => matches!(
                    self.peek_ahead(2).kind,
                    TokenKind::Punct(Punct::LBrace) | TokenKind::Punct(Punct::Colon)
                ),
                _ => false,
            };
            if defines {
                return self.parse_nested_aggregate(
                    agg_path,
                    record_vis,
                    doc,
                    start,
                    members,
                    anon_counter,
                );
            }
            // Otherwise it is a plain tag-typed member like
            // `struct Node *next;` and falls through to field parsing.
        }

        let base = self.parse_base_type()?;
        let mut first = true;

        loop {
            let ty = self.parse_type_suffix(base.clone());

            // Function-pointer field: `Ret (*name)(ParamTypes);` is data,
            // not code.
            if self.check_punct(Punct::LParen)
                && self.peek_ahead(1).kind == TokenKind::Punct(Punct::Star)
            {
                self.bump();
                self.bump();
                let name = self.expect_ident("for function pointer member")?.text;
                self.expect_punct(Punct::RParen, "after function pointer name")?;
                self.expect_punct(Punct::LParen, "to open function pointer parameters")?;
                let param_types = self.parse_fnptr_param_types()?;
                members.push(Member::Field(Field {
                    name,
                    synthesized: false,
                    ty: TypeDesc::FunctionPointer {
                        ret: Box::new(ty),
                        params: param_types,
                    },
                    array_dims: Vec::new(),
                    bit_width: None,
                    visibility: record_vis,
                    doc: doc.take(),
                    range: SourceRange::new(start, self.prev_end()),
                }));
            } else {
                let name = self.expect_ident("for member name")?.text;

                if first && self.check_punct(Punct::LParen) {
                    self.bump();
                    let params = self.parse_params()?;
                    let func = self.parse_method_tail(
                        name,
                        ty,
                        params,
                        is_virtual,
                        is_static,
                        agg_path,
                        Some(agg_path.to_string()),
                        record_vis,
                        doc,
                        start,
                    )?;
                    members.push(Member::Method(func));
                    return Ok(());
                }

                let array_dims = self.parse_array_dims()?;
                let bit_width = if self.match_punct(Punct::Colon) {
                    if self.peek().kind == TokenKind::IntLiteral {
                        parse_int_literal(&self.bump().text).and_then(|n| u32::try_from(n).ok())
                    } else {
                        return Err(self.error("expected bit-field width".to_string()));
                    }
                } else {
                    None
                };
                if self.match_punct(Punct::Eq) {
                    // C++11 default member initializer.
                    self.skip_initializer();
                }
                members.push(Member::Field(Field {
                    name,
                    synthesized: false,
                    ty,
                    array_dims,
                    bit_width,
                    visibility: record_vis,
                    doc: doc.take(),
                    range: SourceRange::new(start, self.prev_end()),
                }));
            }

            first = false;
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }

        self.expect_punct(Punct::Semicolon, "after member declaration")?;
        Ok(())
    }

    /// A nested aggregate definition inside a member list.
    ///
    /// Anonymous bodies become a field of `InlineAggregate` type, under the
    /// trailing declarator name or a synthesized `__anonN` one; named bodies
    /// become a nested type member plus, when a declarator follows, an
    /// ordinary tag-typed field. No flattening happens here.
    #[allow(clippy::too_many_arguments)]
    fn parse_nested_aggregate(
        &mut self,
        agg_path: &str,
        record_vis: Option<Visibility>,
        doc: Option<DocComment>,
        start: SourceLocation,
        members: &mut Vec<Member>,
        anon_counter: &mut usize,
    ) -> Result<(), ParseError> {
        let kind = self.aggregate_keyword()?;
        let mut inner = self.parse_aggregate_core(kind, agg_path)?;
        inner.doc = doc;
        inner.visibility = record_vis;

        if inner.name.is_empty() {
            let mut stars = 0;
            while self.match_punct(Punct::Star) {
                stars += 1;
            }
            let (field_name, synthesized) = if self.check_ident() {
                (self.bump().text, false)
            } else {
                let name = format!("__anon{}", *anon_counter);
                *anon_counter += 1;
                (name, true)
            };
            let array_dims = self.parse_array_dims()?;
            inner.range = SourceRange::new(start, self.prev_end());

            let mut decl = inner.into_decl(kind);
            decl.repath(join_path(agg_path, &field_name));
            let mut ty = TypeDesc::InlineAggregate {
                decl: Box::new(decl),
            };
            for _ in 0..stars {
                ty = TypeDesc::Pointer {
                    inner: Box::new(ty),
                };
            }

            self.expect_punct(Punct::Semicolon, "after anonymous aggregate member")?;
            members.push(Member::Field(Field {
                name: field_name,
                synthesized,
                ty,
                array_dims,
                bit_width: None,
                visibility: record_vis,
                doc: None,
                range: SourceRange::new(start, self.prev_end()),
            }));
            return Ok(());
        }

        inner.range = SourceRange::new(start, self.prev_end());
        let tag_name = inner.name.clone();
        members.push(Member::Nested(Box::new(inner.into_decl(kind))));

        if self.check_ident() || self.check_punct(Punct::Star) {
            let mut ty = TypeDesc::named(tag_name);
            while self.match_punct(Punct::Star) {
                ty = TypeDesc::Pointer {
                    inner: Box::new(ty),
                };
            }
            let name_tok = self.expect_ident("for member name")?;
            let field_start = name_tok.loc;
            let array_dims = self.parse_array_dims()?;
            members.push(Member::Field(Field {
                name: name_tok.text,
                synthesized: false,
                ty,
                array_dims,
                bit_width: None,
                visibility: record_vis,
                doc: None,
                range: SourceRange::new(field_start, self.prev_end()),
            }));
        }

        self.expect_punct(Punct::Semicolon, "after nested aggregate")?;
        Ok(())
    }

    /// Method/function signature tail: trailing qualifiers, `= 0` /
    /// `= default` / `= delete`, constructor initializer list, and the body
    /// (skipped) or `;`.
    #[allow(clippy::too_many_arguments)]
    fn parse_method_tail(
        &mut self,
        name: String,
        ret: TypeDesc,
        params: Vec<Param>,
        is_virtual: bool,
        is_static: bool,
        scope_path: &str,
        enclosing: Option<String>,
        visibility: Option<Visibility>,
        doc: Option<DocComment>,
        start: SourceLocation,
    ) -> Result<Function, ParseError> {
        let mut is_const = false;
        let mut is_override = false;
        let mut is_pure_virtual = false;

        loop {
            if self.match_keyword("const") {
                is_const = true;
            } else if self.match_contextual("override") {
                is_override = true;
            } else if self.match_contextual("final") {
                // Recognized, not modeled.
            } else {
                break;
            }
        }

        if self.match_punct(Punct::Eq) {
            if self.peek().kind == TokenKind::IntLiteral && self.peek().text == "0" {
                self.bump();
                is_pure_virtual = true;
            } else if self.match_contextual("default") || self.match_contextual("delete") {
                // Defaulted or deleted special member; the signature is all
                // that is modeled.
            } else {
                return Err(
                    self.error("expected '0', 'default', or 'delete' after '='".to_string())
                );
            }
        }

        // Constructor initializer list precedes the body.
        if self.check_punct(Punct::Colon) {
            while !self.check_punct(Punct::LBrace)
                && !self.check_punct(Punct::Semicolon)
                && !self.is_at_end()
            {
                self.bump();
            }
        }

        if self.check_punct(Punct::LBrace) {
            self.skip_balanced_braces()?;
        } else {
            self.expect_punct(Punct::Semicolon, "after function declaration")?;
        }

        Ok(Function {
            path: join_path(scope_path, &name),
            name,
            ret,
            params,
            is_virtual,
            is_pure_virtual,
            is_override,
            is_const,
            is_static,
            enclosing,
            visibility,
            doc,
            range: SourceRange::new(start, self.prev_end()),
        })
    }

    /// `typedef` of a plain type, a function pointer, a tag reference, or
    /// an aggregate definition (handled by the aggregate production with
    /// aliases enabled).
    fn parse_typedef(
        &mut self,
        path: &str,
        doc: Option<DocComment>,
        start: SourceLocation,
    ) -> Result<ParsedItem, ParseError> {
        self.bump(); // 'typedef'

        if self.check_keyword("struct") || self.check_keyword("union") || self.check_keyword("class")
        {
            return self.parse_aggregate_decl(path, doc, Vec::new(), true, start);
        }

        let base = self.parse_base_type()?;
        let ty = self.parse_type_suffix(base);

        if self.check_punct(Punct::LParen) && self.peek_ahead(1).kind == TokenKind::Punct(Punct::Star)
        {
            self.bump();
            self.bump();
            let name = self.expect_ident("for typedef name")?.text;
            self.expect_punct(Punct::RParen, "after typedef name")?;
            self.expect_punct(Punct::LParen, "to open parameter types")?;
            let params = self.parse_fnptr_param_types()?;
            self.expect_punct(Punct::Semicolon, "after typedef")?;
            return Ok(ParsedItem::decl(Declaration::Typedef(Typedef {
                path: join_path(path, &name),
                name,
                target: TypeDesc::FunctionPointer {
                    ret: Box::new(ty),
                    params,
                },
                doc,
                range: SourceRange::new(start, self.prev_end()),
            })));
        }

        let name = self.expect_ident("for typedef name")?.text;
        let dims = self.parse_array_dims()?;
        let target = if dims.is_empty() {
            ty
        } else {
            TypeDesc::Array {
                elem: Box::new(ty),
                dims,
            }
        };
        self.expect_punct(Punct::Semicolon, "after typedef")?;
        Ok(ParsedItem::decl(Declaration::Typedef(Typedef {
            path: join_path(path, &name),
            name,
            target,
            doc,
            range: SourceRange::new(start, self.prev_end()),
        })))
    }

    /// `namespace Name { ... }`: re-enter the declaration parser against
    /// the same token stream with an extended scope path.
    fn parse_namespace(
        &mut self,
        path: &str,
        doc: Option<DocComment>,
        start: SourceLocation,
    ) -> Result<ParsedItem, ParseError> {
        self.bump(); // 'namespace'
        let name = if self.check_ident() {
            self.bump().text
        } else {
            String::new()
        };
        let ns_path = join_path(path, &name);

        self.expect_punct(Punct::LBrace, "to open namespace body")?;
        self.enter_nested()?;

        let mut decls = Vec::new();
        let mut vars = Vec::new();
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            let before = self.position;
            match self.parse_declaration(&ns_path) {
                Ok(item) => {
                    decls.extend(item.decls);
                    vars.extend(item.vars);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.diags
                        .push(DiagnosticKind::SyntaxError, e.to_string(), e.location());
                    self.resync();
                }
            }
            if self.position == before && !self.check_punct(Punct::RBrace) && !self.is_at_end() {
                self.bump();
            }
        }

        let closed = self.expect_punct(Punct::RBrace, "to close namespace body");
        self.exit_nested();
        closed?;

        Ok(ParsedItem::decl(Declaration::Namespace(Namespace {
            name,
            path: ns_path,
            decls,
            vars,
            doc,
            range: SourceRange::new(start, self.prev_end()),
        })))
    }

    /// A free function (definition or prototype) or scope-level variable
    /// declarators.
    fn parse_function_or_var(
        &mut self,
        path: &str,
        doc: Option<DocComment>,
        start: SourceLocation,
    ) -> Result<ParsedItem, ParseError> {
        let mut is_static = false;
        loop {
            if self.match_keyword("static") {
                is_static = true;
            } else if self.check_keyword("extern") {
                self.bump();
                // `extern "C" { ... }`: parse the contents in place.
                if self.peek().kind == TokenKind::StringLiteral {
                    self.bump();
                    if self.check_punct(Punct::LBrace) {
                        return self.parse_extern_block(path);
                    }
                }
            } else if self.match_keyword("inline") {
                // Recognized, not modeled.
            } else {
                break;
            }
        }

        let base = self.parse_base_type()?;
        let mut item = ParsedItem::default();
        let mut doc = doc;
        let mut first = true;

        loop {
            let ty = self.parse_type_suffix(base.clone());
            let name_tok = self.expect_ident("for declarator")?;
            let name = name_tok.text;

            if first && self.check_punct(Punct::LParen) {
                self.bump();
                let params = self.parse_params()?;
                let func = self.parse_method_tail(
                    name,
                    ty,
                    params,
                    false,
                    is_static,
                    path,
                    None,
                    None,
                    doc.take(),
                    start,
                )?;
                item.decls.push(Declaration::Function(func));
                return Ok(item);
            }

            self.parse_array_dims()?;
            if self.match_punct(Punct::Eq) {
                self.skip_initializer();
            }
            item.vars.push(InstanceVar {
                name,
                type_name: canon::type_text(&ty),
                range: SourceRange::new(name_tok.loc, self.prev_end()),
            });

            first = false;
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }

        self.expect_punct(Punct::Semicolon, "after declaration")?;
        Ok(item)
    }

    /// Body of `extern "C" { ... }`, parsed at the same scope path.
    fn parse_extern_block(&mut self, path: &str) -> Result<ParsedItem, ParseError> {
        self.bump(); // '{'
        let mut item = ParsedItem::default();
        while !self.check_punct(Punct::RBrace) && !self.is_at_end() {
            let before = self.position;
            match self.parse_declaration(path) {
                Ok(inner) => {
                    item.decls.extend(inner.decls);
                    item.vars.extend(inner.vars);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.diags
                        .push(DiagnosticKind::SyntaxError, e.to_string(), e.location());
                    self.resync();
                }
            }
            if self.position == before && !self.check_punct(Punct::RBrace) && !self.is_at_end() {
                self.bump();
            }
        }
        self.expect_punct(Punct::RBrace, "to close extern block")?;
        Ok(item)
    }

    fn aggregate_keyword(&mut self) -> Result<AggregateKind, ParseError> {
        let token = self.bump();
        match token.text.as_str() {
            "struct" => Ok(AggregateKind::Struct),
            "class" => Ok(AggregateKind::Class),
            "union" => Ok(AggregateKind::Union),
            _ => Err(self.error(format!("expected aggregate keyword, found '{}'", token.text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Declaration, Member, TypeDesc};
    use crate::comments::DocMap;
    use crate::diagnostics::Diagnostics;
    use crate::lang::{Language, LanguageConfig, ParseOptions};
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn parse_ok(source: &str, language: Language) -> crate::ast::TranslationUnit {
        let (unit, diags) = parse(source, language);
        assert_eq!(diags.len(), 0, "unexpected diagnostics");
        unit
    }

    fn parse(source: &str, language: Language) -> (crate::ast::TranslationUnit, Diagnostics) {
        let cfg = LanguageConfig::new(language);
        let opts = ParseOptions::new(language);
        let mut diags = Diagnostics::new("test");
        let tokens = Lexer::new(source, &cfg)
            .tokenize(opts.max_tokens, &mut diags)
            .unwrap();
        let docs = DocMap::build(&tokens);
        let significant = tokens.into_iter().filter(|t| !t.is_trivia()).collect();
        let mut parser = Parser::new(significant, docs, &cfg, &opts, &mut diags);
        let unit = parser.parse_unit().unwrap();
        (unit, diags)
    }

    fn only_aggregate(unit: &crate::ast::TranslationUnit) -> &crate::ast::Aggregate {
        unit.decls[0].as_aggregate().expect("aggregate declaration")
    }

    #[test]
    fn test_simple_struct() {
        let unit = parse_ok("struct Point { int x; int y; };", Language::C);
        let agg = only_aggregate(&unit);
        assert_eq!(agg.name, "Point");
        assert_eq!(agg.members.len(), 2);
        assert!(matches!(&unit.decls[0], Declaration::Struct(_)));
    }

    #[test]
    fn test_typedef_struct_alias() {
        let unit = parse_ok(
            "typedef struct Rectangle { int width; int height; } Rectangle;",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.name, "Rectangle");
        assert_eq!(agg.aliases, vec!["Rectangle".to_string()]);
    }

    #[test]
    fn test_anonymous_typedef_adopts_alias() {
        let unit = parse_ok(
            "typedef struct { float x; float y; float z; } Vector3D;",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.name, "Vector3D");
        assert_eq!(agg.path, "Vector3D");
        assert_eq!(agg.members.len(), 3);
    }

    #[test]
    fn test_trailing_identifier_is_instance_var() {
        let unit = parse_ok("struct Tag { int a; } instance;", Language::C);
        assert_eq!(unit.decls.len(), 1);
        assert_eq!(unit.vars.len(), 1);
        assert_eq!(unit.vars[0].name, "instance");
        assert_eq!(unit.vars[0].type_name, "Tag");
    }

    #[test]
    fn test_forward_declaration() {
        let unit = parse_ok("struct ForwardDeclared;", Language::C);
        assert!(matches!(&unit.decls[0], Declaration::ForwardDecl(f) if f.name == "ForwardDeclared"));
    }

    #[test]
    fn test_self_referential_pointer() {
        let unit = parse_ok(
            "struct Node { int data; struct Node *next; };",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        match &agg.members[1] {
            Member::Field(f) => {
                assert_eq!(f.ty, TypeDesc::pointer(TypeDesc::named("Node")));
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_function_pointer_members() {
        let unit = parse_ok(
            "typedef struct { int (*add)(int, int); int (*subtract)(int, int); } Calculator;",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.members.len(), 2);
        for member in &agg.members {
            match member {
                Member::Field(f) => match &f.ty {
                    TypeDesc::FunctionPointer { ret, params } => {
                        assert_eq!(**ret, TypeDesc::named("int"));
                        assert_eq!(params.len(), 2);
                    }
                    other => panic!("expected function pointer, got {:?}", other),
                },
                _ => panic!("expected field"),
            }
        }
    }

    #[test]
    fn test_anonymous_nested_struct_named_field() {
        let unit = parse_ok(
            "struct Person { char name[50]; struct { char city[50]; int zip; } address; };",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.members.len(), 2);
        match &agg.members[1] {
            Member::Field(f) => {
                assert_eq!(f.name, "address");
                assert!(!f.synthesized);
                match &f.ty {
                    TypeDesc::InlineAggregate { decl } => {
                        assert_eq!(decl.path(), "Person.address");
                        assert_eq!(decl.as_aggregate().unwrap().members.len(), 2);
                    }
                    other => panic!("expected inline aggregate, got {:?}", other),
                }
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_anonymous_union_without_declarator() {
        let unit = parse_ok(
            "struct Variant { int type; union { int i; float f; }; };",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        match &agg.members[1] {
            Member::Field(f) => {
                assert_eq!(f.name, "__anon0");
                assert!(f.synthesized);
                assert!(matches!(f.ty, TypeDesc::InlineAggregate { .. }));
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_class_with_inheritance_and_methods() {
        let unit = parse_ok(
            "class Dog : public Animal { public: std::string speak() const override; private: std::string breed_; };",
            Language::Cpp,
        );
        let agg = only_aggregate(&unit);
        assert!(matches!(&unit.decls[0], Declaration::Class(_)));
        assert_eq!(agg.bases.len(), 1);
        assert_eq!(agg.bases[0].name, "Animal");
        assert_eq!(agg.bases[0].access, crate::ast::Visibility::Public);
        match &agg.members[0] {
            Member::Method(m) => {
                assert_eq!(m.name, "speak");
                assert!(m.is_const);
                assert!(m.is_override);
                assert_eq!(m.ret, TypeDesc::named("std::string"));
                assert_eq!(m.enclosing.as_deref(), Some("Dog"));
            }
            _ => panic!("expected method"),
        }
        match &agg.members[1] {
            Member::Field(f) => {
                assert_eq!(f.visibility, Some(crate::ast::Visibility::Private));
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_abstract_class() {
        let unit = parse_ok(
            "class Shape { public: virtual ~Shape() = default; virtual double area() const = 0; };",
            Language::Cpp,
        );
        let agg = only_aggregate(&unit);
        match &agg.members[0] {
            Member::Method(m) => {
                assert_eq!(m.name, "~Shape");
                assert!(m.is_virtual);
            }
            _ => panic!("expected method"),
        }
        match &agg.members[1] {
            Member::Method(m) => {
                assert!(m.is_pure_virtual);
                assert!(m.is_const);
            }
            _ => panic!("expected method"),
        }
    }

    #[test]
    fn test_constructor_with_initializer_list() {
        let unit = parse_ok(
            "class Animal { public: Animal(const std::string &name) : name_(name) {} };",
            Language::Cpp,
        );
        let agg = only_aggregate(&unit);
        match &agg.members[0] {
            Member::Method(m) => {
                assert_eq!(m.name, "Animal");
                assert_eq!(m.params.len(), 1);
                assert!(matches!(m.params[0].ty, TypeDesc::Reference { .. }));
            }
            _ => panic!("expected method"),
        }
    }

    #[test]
    fn test_template_class() {
        let unit = parse_ok(
            "template <typename T> class Container { public: void add(const T &item) {} private: std::vector<T> items_; };",
            Language::Cpp,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.template_params, vec!["typename T".to_string()]);
        match &agg.members[1] {
            Member::Field(f) => {
                assert_eq!(f.ty, TypeDesc::named("std::vector<T>"));
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_namespace_nesting() {
        let unit = parse_ok(
            "namespace utils { class Logger { public: void log(const std::string &m) {} }; struct Config { int port; }; }",
            Language::Cpp,
        );
        match &unit.decls[0] {
            Declaration::Namespace(ns) => {
                assert_eq!(ns.name, "utils");
                assert_eq!(ns.decls.len(), 2);
                assert_eq!(ns.decls[0].path(), "utils.Logger");
                assert_eq!(ns.decls[1].path(), "utils.Config");
            }
            other => panic!("expected namespace, got {:?}", other),
        }
    }

    #[test]
    fn test_free_function_with_body_skipped() {
        let unit = parse_ok(
            "struct Point create_point(int x, int y) { struct Point p; p.x = x; return p; }",
            Language::C,
        );
        match &unit.decls[0] {
            Declaration::Function(f) => {
                assert_eq!(f.name, "create_point");
                assert_eq!(f.ret, TypeDesc::named("Point"));
                assert_eq!(f.params.len(), 2);
                assert!(f.enclosing.is_none());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_bit_field() {
        let unit = parse_ok("struct Flags { unsigned int ready : 1; };", Language::C);
        let agg = only_aggregate(&unit);
        match &agg.members[0] {
            Member::Field(f) => assert_eq!(f.bit_width, Some(1)),
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_multiple_declarators_per_line() {
        let unit = parse_ok("struct P { int x, y; char *s, c; };", Language::C);
        let agg = only_aggregate(&unit);
        assert_eq!(agg.members.len(), 4);
        match (&agg.members[2], &agg.members[3]) {
            (Member::Field(s), Member::Field(c)) => {
                assert!(matches!(s.ty, TypeDesc::Pointer { .. }));
                // The pointer binds to the declarator, not the line.
                assert_eq!(c.ty, TypeDesc::named("char"));
            }
            _ => panic!("expected fields"),
        }
    }

    #[test]
    fn test_function_pointer_typedef() {
        let unit = parse_ok("typedef int (*BinaryOp)(int, int);", Language::C);
        match &unit.decls[0] {
            Declaration::Typedef(t) => {
                assert_eq!(t.name, "BinaryOp");
                assert!(matches!(t.target, TypeDesc::FunctionPointer { .. }));
            }
            other => panic!("expected typedef, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_member_keeps_recovered_fields() {
        let (unit, diags) = parse("struct Bad { int x int y; };", Language::C);
        assert_eq!(diags.len(), 1);
        let agg = only_aggregate(&unit);
        assert_eq!(agg.name, "Bad");
        assert_eq!(agg.members.len(), 1);
        assert_eq!(agg.members[0].name(), "x");
    }

    #[test]
    fn test_duplicate_member_keeps_first() {
        let (unit, diags) = parse("struct D { int x; float x; };", Language::C);
        assert_eq!(diags.len(), 1);
        let agg = only_aggregate(&unit);
        assert_eq!(agg.members.len(), 1);
        match &agg.members[0] {
            Member::Field(f) => assert_eq!(f.ty, TypeDesc::named("int")),
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_doc_comment_attachment() {
        let unit = parse_ok(
            "// Simple struct\nstruct Point {\n  // x coordinate\n  int x;\n};",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.doc.as_ref().unwrap().text, "// Simple struct");
        match &agg.members[0] {
            Member::Field(f) => {
                assert_eq!(f.doc.as_ref().unwrap().text, "// x coordinate");
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_doc_comment_through_access_label() {
        let unit = parse_ok(
            "class C {\n// first member\npublic:\n  int x;\n};",
            Language::Cpp,
        );
        let agg = only_aggregate(&unit);
        match &agg.members[0] {
            Member::Field(f) => {
                assert_eq!(f.doc.as_ref().unwrap().text, "// first member");
            }
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_oversized_bit_field_width_unrecorded() {
        let unit = parse_ok("struct B { unsigned int x : 0x1FFFFFFFF; };", Language::C);
        let agg = only_aggregate(&unit);
        match &agg.members[0] {
            Member::Field(f) => assert_eq!(f.bit_width, None),
            _ => panic!("expected field"),
        }
    }

    #[test]
    fn test_extern_c_block() {
        let unit = parse_ok(
            "extern \"C\" { struct Wire { int id; }; void send(struct Wire *w); }",
            Language::Cpp,
        );
        assert_eq!(unit.decls.len(), 2);
    }

    #[test]
    fn test_named_nested_aggregate() {
        let unit = parse_ok(
            "struct Outer { struct Inner { int v; } in; };",
            Language::C,
        );
        let agg = only_aggregate(&unit);
        assert_eq!(agg.members.len(), 2);
        assert!(matches!(&agg.members[0], Member::Nested(d) if d.path() == "Outer.Inner"));
        assert!(matches!(&agg.members[1], Member::Field(f) if f.name == "in"));
    }
}
