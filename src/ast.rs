//! Declaration model produced by the parser.
//!
//! All intra-model references are by qualified name, never by embedded
//! ownership: a struct holding a pointer to its own kind is represented as
//! `Pointer(Named(path))`, so the tree is structurally acyclic. Every node
//! carries its source range and derives [`serde::Serialize`] so collaborating
//! renderers can map the model to JSON or text without this crate doing any
//! formatting itself.

use serde::Serialize;

/// Source location information for diagnostics and ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    /// Byte offset into the source buffer.
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Start of the buffer.
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }
}

/// Half-open source range covering a token or declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceRange {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    pub fn at(loc: SourceLocation) -> Self {
        Self {
            start: loc,
            end: loc,
        }
    }
}

/// A comment block associated with the declaration that follows it, or kept
/// as an orphan on the symbol table when nothing follows closely enough.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocComment {
    /// Raw comment text, markers included, contiguous blocks joined by `\n`.
    pub text: String,
    pub range: SourceRange,
}

/// Member visibility inside a class body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

/// Which aggregate keyword introduced a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Struct,
    Class,
    Union,
}

impl AggregateKind {
    pub fn keyword(self) -> &'static str {
        match self {
            AggregateKind::Struct => "struct",
            AggregateKind::Class => "class",
            AggregateKind::Union => "union",
        }
    }

    /// Default member visibility for this aggregate kind.
    pub fn default_visibility(self) -> Visibility {
        match self {
            AggregateKind::Class => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

/// A base-class reference: name plus access specifier, resolved lazily
/// against the scope chain. An unresolved base keeps its name so consumers
/// still see the relationship even when the base lives in an unparsed header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseClass {
    pub name: String,
    pub access: Visibility,
    pub resolved: bool,
}

/// Type descriptor attached to fields, parameters, and return positions.
///
/// `Named` holds the type's written path (`TreeNode`, `std::string`,
/// `std::vector<T>`); resolution from name to declaration happens only at
/// symbol-table lookup time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TypeDesc {
    Named { path: String },
    Pointer { inner: Box<TypeDesc> },
    Reference { inner: Box<TypeDesc> },
    Array {
        elem: Box<TypeDesc>,
        /// `None` entries are unspecified dimensions (`[]`).
        dims: Vec<Option<u64>>,
    },
    FunctionPointer {
        ret: Box<TypeDesc>,
        params: Vec<TypeDesc>,
    },
    /// An anonymous aggregate embedded directly as a field's type.
    InlineAggregate { decl: Box<Declaration> },
}

impl TypeDesc {
    pub fn named(path: impl Into<String>) -> Self {
        TypeDesc::Named { path: path.into() }
    }

    pub fn pointer(inner: TypeDesc) -> Self {
        TypeDesc::Pointer {
            inner: Box::new(inner),
        }
    }
}

/// A data member of a struct/class/union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    /// True when the name was synthesized for an anonymous member
    /// (`__anon0`, `__anon1`, ...).
    pub synthesized: bool,
    pub ty: TypeDesc,
    /// Trailing array dimensions, `None` for `[]`.
    pub array_dims: Vec<Option<u64>>,
    pub bit_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    pub range: SourceRange,
}

/// A function parameter; the name is optional, the type is not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ty: TypeDesc,
}

/// A free function, or a method when `enclosing` names an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    pub path: String,
    pub ret: TypeDesc,
    pub params: Vec<Param>,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    pub is_override: bool,
    /// Trailing `const` qualifier on the signature, not part of the return
    /// type.
    pub is_const: bool,
    pub is_static: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    pub range: SourceRange,
}

/// One entry in an aggregate's ordered member list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "member")]
pub enum Member {
    Field(Field),
    Method(Function),
    /// A named nested type declared inside the body without a declarator.
    Nested(Box<Declaration>),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Field(f) => &f.name,
            Member::Method(m) => &m.name,
            Member::Nested(d) => d.name(),
        }
    }

    pub fn range(&self) -> SourceRange {
        match self {
            Member::Field(f) => f.range,
            Member::Method(m) => m.range,
            Member::Nested(d) => d.range(),
        }
    }
}

/// Payload shared by the `Struct`, `Class`, and `Union` declaration
/// variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    /// Tag name; empty for anonymous aggregates.
    pub name: String,
    pub path: String,
    pub members: Vec<Member>,
    pub bases: Vec<BaseClass>,
    pub template_params: Vec<String>,
    /// False for a tag that was declared but whose body has not been seen.
    pub defined: bool,
    /// Typedef alias names (`typedef struct Tag {...} Alias;`). An anonymous
    /// aggregate adopts its first alias as its name.
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    pub range: SourceRange,
}

/// A typedef whose target is a plain type reference (by name, pointer,
/// or function pointer). Typedefs of aggregate definitions are folded into
/// the aggregate's `aliases` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Typedef {
    pub name: String,
    pub path: String,
    pub target: TypeDesc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    pub range: SourceRange,
}

/// A tag declaration with no body, expected to be completed later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardDecl {
    pub tag: AggregateKind,
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    pub range: SourceRange,
}

/// A namespace body; its declarations are re-parsed recursively and later
/// lifted into a child scope by the symbol-table builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Namespace {
    pub name: String,
    pub path: String,
    pub decls: Vec<Declaration>,
    pub vars: Vec<InstanceVar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    pub range: SourceRange,
}

/// An instance variable declared alongside an aggregate body
/// (`struct Tag {...} var;`) or at file scope. These are attributes of the
/// enclosing scope, not of the type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceVar {
    pub name: String,
    pub type_name: String,
    pub range: SourceRange,
}

/// A recognized top-level or nested declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decl")]
pub enum Declaration {
    Struct(Aggregate),
    Class(Aggregate),
    Union(Aggregate),
    Typedef(Typedef),
    Function(Function),
    Namespace(Namespace),
    ForwardDecl(ForwardDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => &a.name,
            Declaration::Typedef(t) => &t.name,
            Declaration::Function(f) => &f.name,
            Declaration::Namespace(n) => &n.name,
            Declaration::ForwardDecl(f) => &f.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => &a.path,
            Declaration::Typedef(t) => &t.path,
            Declaration::Function(f) => &f.path,
            Declaration::Namespace(n) => &n.path,
            Declaration::ForwardDecl(f) => &f.path,
        }
    }

    pub fn range(&self) -> SourceRange {
        match self {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => a.range,
            Declaration::Typedef(t) => t.range,
            Declaration::Function(f) => f.range,
            Declaration::Namespace(n) => n.range,
            Declaration::ForwardDecl(f) => f.range,
        }
    }

    /// The aggregate keyword for tagged variants, if any.
    pub fn aggregate_kind(&self) -> Option<AggregateKind> {
        match self {
            Declaration::Struct(_) => Some(AggregateKind::Struct),
            Declaration::Class(_) => Some(AggregateKind::Class),
            Declaration::Union(_) => Some(AggregateKind::Union),
            Declaration::ForwardDecl(f) => Some(f.tag),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&Aggregate> {
        match self {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_aggregate_mut(&mut self) -> Option<&mut Aggregate> {
        match self {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => Some(a),
            _ => None,
        }
    }

    /// True for a fully defined struct/class/union body.
    pub fn is_definition(&self) -> bool {
        self.as_aggregate().map(|a| a.defined).unwrap_or(false)
    }

    /// Rewrite this declaration's qualified path and, recursively, the paths
    /// of everything it owns. Used when an anonymous aggregate learns its
    /// name late (typedef alias, synthesized field name).
    pub fn repath(&mut self, full_path: String) {
        match self {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => {
                a.path = full_path.clone();
                for member in &mut a.members {
                    match member {
                        Member::Method(f) => {
                            f.path = join_path(&full_path, &f.name);
                            f.enclosing = Some(full_path.clone());
                        }
                        Member::Nested(d) => {
                            let child = join_path(&full_path, d.name());
                            d.repath(child);
                        }
                        Member::Field(f) => {
                            if let TypeDesc::InlineAggregate { decl } = &mut f.ty {
                                let child = join_path(&full_path, &f.name);
                                decl.repath(child);
                            }
                        }
                    }
                }
            }
            Declaration::Typedef(t) => t.path = full_path,
            Declaration::Function(f) => f.path = full_path,
            Declaration::ForwardDecl(f) => f.path = full_path,
            Declaration::Namespace(n) => {
                n.path = full_path.clone();
                for d in &mut n.decls {
                    let child = join_path(&full_path, d.name());
                    d.repath(child);
                }
            }
        }
    }

    /// Recompute the path as `parent.name` and propagate downward.
    pub fn set_parent_path(&mut self, parent: &str) {
        let full = join_path(parent, self.name());
        self.repath(full);
    }
}

impl Aggregate {
    /// Wrap the payload in the declaration variant matching `kind`.
    pub fn into_decl(self, kind: AggregateKind) -> Declaration {
        match kind {
            AggregateKind::Struct => Declaration::Struct(self),
            AggregateKind::Class => Declaration::Class(self),
            AggregateKind::Union => Declaration::Union(self),
        }
    }
}

/// Parser output for one source buffer: the ordered top-level declarations
/// plus any file-scope instance variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranslationUnit {
    pub decls: Vec<Declaration>,
    pub vars: Vec<InstanceVar>,
}

/// Join a parent scope path and a name into a dotted qualified path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        parent.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
