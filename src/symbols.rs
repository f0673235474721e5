//! Scope tree and symbol table.
//!
//! The builder lifts a parsed translation unit into a tree of named scopes:
//! namespaces become child scopes (same-name siblings merge into one), all
//! other declarations stay in the scope that declared them, and aggregate
//! bodies remain ordered member lists rather than scopes of their own.
//!
//! Types reference each other by qualified dotted path, never by embedded
//! ownership, so the table stays acyclic even for self-referential and
//! mutually recursive types. Resolution happens in passes after insertion:
//! base-class names resolve outward along the enclosing scope chain, and
//! forward declarations that were never completed are reported unless a
//! definition is visible somewhere on that chain.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::ast::{
    join_path, Declaration, DocComment, InstanceVar, Member, SourceRange, TranslationUnit,
    TypeDesc,
};
use crate::canon;
use crate::diagnostics::{sort_records, Diagnostic, DiagnosticKind, Diagnostics};

/// What a qualified path names in the flat index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Aggregate,
    Typedef,
    Function,
    Forward,
    Field,
    Method,
    Scope,
}

/// One named scope: the file root, or a namespace.
#[derive(Debug, Default, Serialize)]
pub struct Scope {
    pub name: String,
    pub path: String,
    pub decls: Vec<Declaration>,
    pub vars: Vec<InstanceVar>,
    pub children: Vec<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
}

impl Scope {
    fn named(name: String, path: String, doc: Option<DocComment>) -> Self {
        Scope {
            name,
            path,
            doc,
            ..Scope::default()
        }
    }
}

/// The extraction result for one or more files: a scope tree, the flat
/// qualified-name index, diagnostics, and doc comments nothing claimed.
#[derive(Debug, Serialize)]
pub struct SymbolTable {
    pub files: Vec<String>,
    pub root: Scope,
    pub diagnostics: Vec<Diagnostic>,
    pub orphan_comments: Vec<DocComment>,
    #[serde(skip)]
    index: FxHashMap<String, SymbolKind>,
    /// Defining file and range per qualified path, for cross-file duplicate
    /// attribution during merges.
    #[serde(skip)]
    provenance: FxHashMap<String, (String, SourceRange)>,
}

impl SymbolTable {
    /// An empty table carrying only diagnostics, for files whose parse
    /// aborted fatally.
    pub fn empty(file: &str, diags: Diagnostics) -> Self {
        SymbolTable {
            files: vec![file.to_string()],
            root: Scope::default(),
            diagnostics: diags.into_sorted(),
            orphan_comments: Vec::new(),
            index: FxHashMap::default(),
            provenance: FxHashMap::default(),
        }
    }

    /// Build the table for one parsed file.
    pub fn build(
        file: &str,
        unit: TranslationUnit,
        mut diags: Diagnostics,
        orphan_comments: Vec<DocComment>,
    ) -> Self {
        let mut root = Scope::default();
        let mut provenance = FxHashMap::default();
        // The flat index is filled as a byproduct of the insertion walk.
        let mut index = FxHashMap::default();
        insert_unit(
            &mut root,
            unit.decls,
            unit.vars,
            file,
            &mut diags,
            &mut provenance,
            &mut index,
        );

        resolve_bases(&mut root, &mut Vec::new(), &index, &mut diags);
        report_dangling_forwards(&root, &mut Vec::new(), &index, &mut diags);

        SymbolTable {
            files: vec![file.to_string()],
            root,
            diagnostics: diags.into_sorted(),
            orphan_comments,
            index,
            provenance,
        }
    }

    /// Kind of the symbol at a qualified dotted path, if any.
    pub fn kind_of(&self, path: &str) -> Option<SymbolKind> {
        self.index.get(path).copied()
    }

    /// Walk the scope tree to the declaration at a qualified dotted path.
    /// Members (fields, methods) are not declarations; use [`kind_of`] for
    /// their existence.
    ///
    /// [`kind_of`]: SymbolTable::kind_of
    pub fn lookup(&self, path: &str) -> Option<&Declaration> {
        let mut scope = &self.root;
        let mut rest = path;
        // Descend through child scopes as long as a segment names one.
        'outer: loop {
            let (seg, tail) = match rest.split_once('.') {
                Some((seg, tail)) => (seg, Some(tail)),
                None => (rest, None),
            };
            for child in &scope.children {
                if child.name == seg {
                    match tail {
                        Some(tail) => {
                            scope = child;
                            rest = tail;
                            continue 'outer;
                        }
                        None => return None,
                    }
                }
            }
            break;
        }
        // The remaining segments address a declaration and, below it,
        // nested types.
        let (seg, tail) = match rest.split_once('.') {
            Some((seg, tail)) => (seg, Some(tail)),
            None => (rest, None),
        };
        let decl = scope.decls.iter().find(|d| d.name() == seg)?;
        match tail {
            None => Some(decl),
            Some(tail) => lookup_nested(decl, tail),
        }
    }

    /// Merge two tables into one. The fold is associative: scopes merge by
    /// name, shape-identical definitions deduplicate silently, divergent
    /// ones keep the first and report the second with both locations, and a
    /// forward declaration in one file is completed by a definition in
    /// another. Diagnostics come out sorted by file and position.
    pub fn merge(mut self, other: SymbolTable) -> SymbolTable {
        let mut diagnostics = self.diagnostics;
        diagnostics.extend(other.diagnostics);

        merge_scope(
            &mut self.root,
            other.root,
            &mut self.provenance,
            &other.provenance,
            &mut diagnostics,
        );
        for (path, origin) in other.provenance {
            self.provenance.entry(path).or_insert(origin);
        }

        for file in other.files {
            if !self.files.contains(&file) {
                self.files.push(file);
            }
        }
        self.orphan_comments.extend(other.orphan_comments);

        let mut index = FxHashMap::default();
        collect_kinds(&self.root, &mut index);
        // Definitions from the other table may complete bases this one
        // could not resolve.
        resolve_merged_bases(&mut self.root, &mut Vec::new(), &index);

        sort_records(&mut diagnostics);
        SymbolTable {
            files: self.files,
            root: self.root,
            diagnostics,
            orphan_comments: self.orphan_comments,
            index,
            provenance: self.provenance,
        }
    }
}

fn lookup_nested<'a>(decl: &'a Declaration, path: &str) -> Option<&'a Declaration> {
    let (seg, tail) = match path.split_once('.') {
        Some((seg, tail)) => (seg, Some(tail)),
        None => (path, None),
    };
    let agg = decl.as_aggregate()?;
    for member in &agg.members {
        let nested = match member {
            Member::Nested(d) if d.name() == seg => d,
            Member::Field(f) if f.name == seg => match &f.ty {
                TypeDesc::InlineAggregate { decl } => decl,
                _ => continue,
            },
            _ => continue,
        };
        return match tail {
            None => Some(nested),
            Some(tail) => lookup_nested(nested, tail),
        };
    }
    None
}

// ----- insertion -----

fn insert_unit(
    scope: &mut Scope,
    decls: Vec<Declaration>,
    vars: Vec<InstanceVar>,
    file: &str,
    diags: &mut Diagnostics,
    provenance: &mut FxHashMap<String, (String, SourceRange)>,
    index: &mut FxHashMap<String, SymbolKind>,
) {
    scope.vars.extend(vars);
    for decl in decls {
        match decl {
            Declaration::Namespace(ns) => {
                let idx = match scope.children.iter().position(|c| c.name == ns.name) {
                    Some(idx) => {
                        if scope.children[idx].doc.is_none() {
                            scope.children[idx].doc = ns.doc;
                        }
                        idx
                    }
                    None => {
                        index.insert(ns.path.clone(), SymbolKind::Scope);
                        scope
                            .children
                            .push(Scope::named(ns.name, ns.path, ns.doc));
                        scope.children.len() - 1
                    }
                };
                insert_unit(
                    &mut scope.children[idx],
                    ns.decls,
                    ns.vars,
                    file,
                    diags,
                    provenance,
                    index,
                );
            }
            other => insert_decl(scope, other, file, diags, provenance, index),
        }
    }
}

fn insert_decl(
    scope: &mut Scope,
    decl: Declaration,
    file: &str,
    diags: &mut Diagnostics,
    provenance: &mut FxHashMap<String, (String, SourceRange)>,
    index: &mut FxHashMap<String, SymbolKind>,
) {
    let name = decl.name().to_string();
    let existing = if name.is_empty() {
        None
    } else {
        scope.decls.iter().position(|d| d.name() == name)
    };

    let Some(pos) = existing else {
        provenance.insert(decl.path().to_string(), (file.to_string(), decl.range()));
        collect_decl_kinds(&decl, index);
        scope.decls.push(decl);
        return;
    };

    let incoming_forward = matches!(decl, Declaration::ForwardDecl(_));
    let existing_forward = matches!(scope.decls[pos], Declaration::ForwardDecl(_));

    if incoming_forward {
        // Already declared or defined under this name; a repeated forward
        // declaration adds nothing.
        return;
    }
    if existing_forward {
        // Definition completes the forward declaration in place, keeping
        // the declaration's position in the scope. The index entry is
        // overwritten by the definition's kind.
        provenance.insert(decl.path().to_string(), (file.to_string(), decl.range()));
        collect_decl_kinds(&decl, index);
        scope.decls[pos] = decl;
        return;
    }

    if is_tag_self_typedef(&decl, &name) && scope.decls[pos].as_aggregate().is_some() {
        // The tag is already defined; the self-typedef adds nothing.
        return;
    }
    if is_tag_self_typedef(&scope.decls[pos], &name) && decl.as_aggregate().is_some() {
        // The definition completes the self-typedef in place, like a
        // forward declaration.
        provenance.insert(decl.path().to_string(), (file.to_string(), decl.range()));
        collect_decl_kinds(&decl, index);
        scope.decls[pos] = decl;
        return;
    }

    if canon::decl_text(&scope.decls[pos]) == canon::decl_text(&decl) {
        // Same shape repeated, e.g. a header included twice. Silent.
        return;
    }

    if matches!(decl, Declaration::Function(_))
        && matches!(scope.decls[pos], Declaration::Function(_))
    {
        // Different signatures under one name are overloads, not conflicts.
        scope.decls.push(decl);
        return;
    }

    let first = scope.decls[pos].range().start;
    diags.push_record(
        Diagnostic::new(
            DiagnosticKind::DuplicateDefinition,
            format!("duplicate definition of `{}`", decl.path()),
            file,
            decl.range().start,
        )
        .with_related(file, first),
    );
    // Keep the first definition.
}

/// `typedef struct Foo Foo;` — a typedef whose target names its own tag.
/// Such a typedef and the tag's definition complete each other rather than
/// conflicting.
fn is_tag_self_typedef(decl: &Declaration, name: &str) -> bool {
    matches!(decl, Declaration::Typedef(t)
        if matches!(&t.target, TypeDesc::Named { path } if path == name))
}

// ----- flat index -----

fn collect_kinds(scope: &Scope, index: &mut FxHashMap<String, SymbolKind>) {
    if !scope.path.is_empty() {
        index.insert(scope.path.clone(), SymbolKind::Scope);
    }
    for decl in &scope.decls {
        collect_decl_kinds(decl, index);
    }
    for child in &scope.children {
        collect_kinds(child, index);
    }
}

fn collect_decl_kinds(decl: &Declaration, index: &mut FxHashMap<String, SymbolKind>) {
    match decl {
        Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => {
            index.insert(a.path.clone(), SymbolKind::Aggregate);
            // Aliases are siblings of the tag in its declaring scope.
            let parent = a.path.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
            for alias in &a.aliases {
                if alias != &a.name {
                    index
                        .entry(join_path(parent, alias))
                        .or_insert(SymbolKind::Typedef);
                }
            }
            for member in &a.members {
                match member {
                    Member::Field(f) => {
                        if let TypeDesc::InlineAggregate { decl } = &f.ty {
                            collect_decl_kinds(decl, index);
                        } else {
                            index.insert(join_path(&a.path, &f.name), SymbolKind::Field);
                        }
                    }
                    Member::Method(m) => {
                        index.entry(m.path.clone()).or_insert(SymbolKind::Method);
                    }
                    Member::Nested(d) => collect_decl_kinds(d, index),
                }
            }
        }
        Declaration::Typedef(t) => {
            index.insert(t.path.clone(), SymbolKind::Typedef);
        }
        Declaration::Function(f) => {
            index.entry(f.path.clone()).or_insert(SymbolKind::Function);
        }
        Declaration::ForwardDecl(f) => {
            index.entry(f.path.clone()).or_insert(SymbolKind::Forward);
        }
        Declaration::Namespace(_) => {}
    }
}

// ----- resolution passes -----

/// Normalize a written base name (`ns::Base`, `Container<int>`) into the
/// dotted lookup key.
fn base_lookup_key(name: &str) -> String {
    let dotted = name.replace("::", ".");
    match dotted.find('<') {
        Some(i) => dotted[..i].to_string(),
        None => dotted,
    }
}

/// Resolve a name against the enclosing chain, innermost first. The chain
/// holds the paths of every enclosing scope and aggregate, outermost first;
/// the file root contributes the empty path.
fn resolve_outward(
    chain: &[String],
    key: &str,
    index: &FxHashMap<String, SymbolKind>,
) -> Option<String> {
    for ancestor in chain.iter().rev() {
        let candidate = if ancestor.is_empty() {
            key.to_string()
        } else {
            join_path(ancestor, key)
        };
        if matches!(
            index.get(&candidate),
            Some(SymbolKind::Aggregate | SymbolKind::Forward | SymbolKind::Typedef)
        ) {
            return Some(candidate);
        }
    }
    None
}

fn resolve_bases(
    scope: &mut Scope,
    chain: &mut Vec<String>,
    index: &FxHashMap<String, SymbolKind>,
    diags: &mut Diagnostics,
) {
    chain.push(scope.path.clone());
    for decl in &mut scope.decls {
        resolve_decl_bases(decl, chain, index, diags);
    }
    for child in &mut scope.children {
        resolve_bases(child, chain, index, diags);
    }
    chain.pop();
}

fn resolve_decl_bases(
    decl: &mut Declaration,
    chain: &mut Vec<String>,
    index: &FxHashMap<String, SymbolKind>,
    diags: &mut Diagnostics,
) {
    let Some(agg) = decl.as_aggregate_mut() else {
        return;
    };
    let range_start = agg.range.start;
    let agg_name = agg.name.clone();
    for base in &mut agg.bases {
        let key = base_lookup_key(&base.name);
        match resolve_outward(chain, &key, index) {
            Some(path) => {
                base.name = path;
                base.resolved = true;
            }
            None => {
                diags.push(
                    DiagnosticKind::UnresolvedReference,
                    format!(
                        "unresolved base class `{}` of `{}`",
                        base.name, agg_name
                    ),
                    range_start,
                );
            }
        }
    }
    // Nested types resolve against this aggregate's path as well.
    chain.push(agg.path.clone());
    for member in &mut agg.members {
        match member {
            Member::Nested(d) => resolve_decl_bases(d, chain, index, diags),
            Member::Field(f) => {
                if let TypeDesc::InlineAggregate { decl } = &mut f.ty {
                    resolve_decl_bases(decl, chain, index, diags);
                }
            }
            Member::Method(_) => {}
        }
    }
    chain.pop();
}

/// After a merge, try unresolved bases again; no new diagnostics either way,
/// the per-file reports already stand.
fn resolve_merged_bases(
    scope: &mut Scope,
    chain: &mut Vec<String>,
    index: &FxHashMap<String, SymbolKind>,
) {
    chain.push(scope.path.clone());
    for decl in &mut scope.decls {
        resolve_merged_decl(decl, chain, index);
    }
    for child in &mut scope.children {
        resolve_merged_bases(child, chain, index);
    }
    chain.pop();
}

fn resolve_merged_decl(
    decl: &mut Declaration,
    chain: &mut Vec<String>,
    index: &FxHashMap<String, SymbolKind>,
) {
    let Some(agg) = decl.as_aggregate_mut() else {
        return;
    };
    for base in &mut agg.bases {
        if base.resolved {
            continue;
        }
        let key = base_lookup_key(&base.name);
        if let Some(path) = resolve_outward(chain, &key, index) {
            base.name = path;
            base.resolved = true;
        }
    }
    chain.push(agg.path.clone());
    for member in &mut agg.members {
        match member {
            Member::Nested(d) => resolve_merged_decl(d, chain, index),
            Member::Field(f) => {
                if let TypeDesc::InlineAggregate { decl } = &mut f.ty {
                    resolve_merged_decl(decl, chain, index);
                }
            }
            Member::Method(_) => {}
        }
    }
    chain.pop();
}

/// A forward declaration that was never replaced by a definition is worth a
/// warning, unless a definition of that name is visible somewhere outward on
/// the scope chain.
fn report_dangling_forwards(
    scope: &Scope,
    chain: &mut Vec<String>,
    index: &FxHashMap<String, SymbolKind>,
    diags: &mut Diagnostics,
) {
    chain.push(scope.path.clone());
    for decl in &scope.decls {
        if let Declaration::ForwardDecl(fwd) = decl {
            let defined_outward = chain.iter().any(|ancestor| {
                let candidate = if ancestor.is_empty() {
                    fwd.name.clone()
                } else {
                    join_path(ancestor, &fwd.name)
                };
                index.get(&candidate) == Some(&SymbolKind::Aggregate)
            });
            if !defined_outward {
                diags.push(
                    DiagnosticKind::UnresolvedReference,
                    format!("forward declaration of `{}` is never defined", fwd.name),
                    fwd.range.start,
                );
            }
        }
    }
    for child in &scope.children {
        report_dangling_forwards(child, chain, index, diags);
    }
    chain.pop();
}

// ----- merge -----

fn merge_scope(
    target: &mut Scope,
    other: Scope,
    provenance: &mut FxHashMap<String, (String, SourceRange)>,
    other_provenance: &FxHashMap<String, (String, SourceRange)>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for decl in other.decls {
        merge_decl(target, decl, provenance, other_provenance, diagnostics);
    }
    target.vars.extend(other.vars);
    for child in other.children {
        match target
            .children
            .iter()
            .position(|c| c.name == child.name)
        {
            Some(idx) => {
                if target.children[idx].doc.is_none() {
                    target.children[idx].doc = child.doc.clone();
                }
                merge_scope(
                    &mut target.children[idx],
                    child,
                    provenance,
                    other_provenance,
                    diagnostics,
                );
            }
            None => target.children.push(child),
        }
    }
}

fn merge_decl(
    target: &mut Scope,
    decl: Declaration,
    provenance: &mut FxHashMap<String, (String, SourceRange)>,
    other_provenance: &FxHashMap<String, (String, SourceRange)>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let name = decl.name().to_string();
    let existing = if name.is_empty() {
        None
    } else {
        target.decls.iter().position(|d| d.name() == name)
    };

    let Some(pos) = existing else {
        if let Some(origin) = other_provenance.get(decl.path()) {
            provenance.insert(decl.path().to_string(), origin.clone());
        }
        target.decls.push(decl);
        return;
    };

    let incoming_forward = matches!(decl, Declaration::ForwardDecl(_));
    let existing_forward = matches!(target.decls[pos], Declaration::ForwardDecl(_));

    if incoming_forward {
        return;
    }
    if existing_forward {
        if let Some(origin) = other_provenance.get(decl.path()) {
            provenance.insert(decl.path().to_string(), origin.clone());
        }
        target.decls[pos] = decl;
        return;
    }

    if is_tag_self_typedef(&decl, &name) && target.decls[pos].as_aggregate().is_some() {
        return;
    }
    if is_tag_self_typedef(&target.decls[pos], &name) && decl.as_aggregate().is_some() {
        if let Some(origin) = other_provenance.get(decl.path()) {
            provenance.insert(decl.path().to_string(), origin.clone());
        }
        target.decls[pos] = decl;
        return;
    }

    if canon::decl_text(&target.decls[pos]) == canon::decl_text(&decl) {
        return;
    }

    if matches!(decl, Declaration::Function(_))
        && matches!(target.decls[pos], Declaration::Function(_))
    {
        target.decls.push(decl);
        return;
    }

    let path = decl.path().to_string();
    let incoming_origin = other_provenance
        .get(&path)
        .cloned()
        .unwrap_or_else(|| (String::new(), decl.range()));
    let existing_origin = provenance
        .get(&path)
        .cloned()
        .unwrap_or_else(|| (String::new(), target.decls[pos].range()));
    // Attribute the report to the later location so the fold produces the
    // same diagnostic whichever table came first.
    let sort_key =
        |origin: &(String, SourceRange)| (origin.0.clone(), origin.1.start.line, origin.1.start.column);
    let (report, related) = if sort_key(&incoming_origin) >= sort_key(&existing_origin) {
        (incoming_origin, existing_origin)
    } else {
        (existing_origin, incoming_origin)
    };
    diagnostics.push(
        Diagnostic::new(
            DiagnosticKind::DuplicateDefinition,
            format!("duplicate definition of `{}`", path),
            &report.0,
            report.1.start,
        )
        .with_related(&related.0, related.1.start),
    );
}
