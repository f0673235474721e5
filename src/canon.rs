//! Canonical declaration rendering.
//!
//! Turns declaration nodes back into normalized C/C++ source text: one
//! canonical spelling per shape, two-space indentation, bodies elided. Two
//! declarations with equal canonical text have the same shape, which is how
//! duplicate definitions are told apart from divergent ones, and reparsing
//! the canonical text reproduces the same structure.

use std::fmt::Write as _;

use crate::ast::{
    Aggregate, AggregateKind, Declaration, Field, Function, Member, Param, TypeDesc, Visibility,
};

/// Render a type reference on one line. Anonymous inline aggregates get a
/// placeholder here; their full body is only rendered in field position.
pub fn type_text(ty: &TypeDesc) -> String {
    match ty {
        TypeDesc::Named { path } => path.clone(),
        TypeDesc::Pointer { inner } => format!("{}*", type_text(inner)),
        TypeDesc::Reference { inner } => format!("{}&", type_text(inner)),
        TypeDesc::Array { elem, dims } => {
            let mut out = type_text(elem);
            push_dims(&mut out, dims);
            out
        }
        TypeDesc::FunctionPointer { ret, params } => {
            format!("{} (*)({})", type_text(ret), type_list(params))
        }
        TypeDesc::InlineAggregate { decl } => {
            let kw = decl
                .aggregate_kind()
                .map(AggregateKind::keyword)
                .unwrap_or("struct");
            format!("<anonymous {}>", kw)
        }
    }
}

/// Render a whole declaration as canonical text.
pub fn decl_text(decl: &Declaration) -> String {
    let mut w = Writer::default();
    w.decl(decl);
    w.out
}

fn type_list(types: &[TypeDesc]) -> String {
    types
        .iter()
        .map(type_text)
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_dims(out: &mut String, dims: &[Option<u64>]) {
    for dim in dims {
        match dim {
            Some(n) => {
                let _ = write!(out, "[{}]", n);
            }
            None => out.push_str("[]"),
        }
    }
}

fn param_text(param: &Param) -> String {
    // Array parameters keep the dimensions after the name.
    if let TypeDesc::Array { elem, dims } = &param.ty {
        let mut out = type_text(elem);
        if let Some(name) = &param.name {
            out.push(' ');
            out.push_str(name);
        }
        push_dims(&mut out, dims);
        return out;
    }
    let mut out = type_text(&param.ty);
    if let Some(name) = &param.name {
        out.push(' ');
        out.push_str(name);
    }
    out
}

#[derive(Default)]
struct Writer {
    out: String,
    indent: usize,
}

impl Writer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn decl(&mut self, decl: &Declaration) {
        match decl {
            Declaration::Struct(a) => self.aggregate(a, AggregateKind::Struct),
            Declaration::Class(a) => self.aggregate(a, AggregateKind::Class),
            Declaration::Union(a) => self.aggregate(a, AggregateKind::Union),
            Declaration::Typedef(t) => match &t.target {
                TypeDesc::FunctionPointer { ret, params } => {
                    self.line(&format!(
                        "typedef {} (*{})({});",
                        type_text(ret),
                        t.name,
                        type_list(params)
                    ));
                }
                TypeDesc::Array { elem, dims } => {
                    let mut text = format!("typedef {} {}", type_text(elem), t.name);
                    push_dims(&mut text, dims);
                    text.push(';');
                    self.line(&text);
                }
                other => {
                    self.line(&format!("typedef {} {};", type_text(other), t.name));
                }
            },
            Declaration::Function(f) => {
                let sig = self.function_text(f);
                self.line(&format!("{};", sig));
            }
            Declaration::Namespace(ns) => {
                self.line(&format!("namespace {} {{", ns.name));
                self.indent += 1;
                for inner in &ns.decls {
                    self.decl(inner);
                }
                for var in &ns.vars {
                    self.line(&format!("{} {};", var.type_name, var.name));
                }
                self.indent -= 1;
                self.line("}");
            }
            Declaration::ForwardDecl(f) => {
                self.line(&format!("{} {};", f.tag.keyword(), f.name));
            }
        }
    }

    fn aggregate(&mut self, agg: &Aggregate, kind: AggregateKind) {
        if !agg.defined {
            self.line(&format!("{} {};", kind.keyword(), agg.name));
            return;
        }

        if !agg.template_params.is_empty() {
            self.line(&format!("template <{}>", agg.template_params.join(", ")));
        }

        // `typedef struct {...} Alias;` form when the definition carried
        // aliases; an anonymous tag that adopted its alias elides the tag.
        let typedef_form = !agg.aliases.is_empty();
        let tag_adopted = typedef_form && agg.aliases.first() == Some(&agg.name);

        let mut head = String::new();
        if typedef_form {
            head.push_str("typedef ");
        }
        head.push_str(kind.keyword());
        if !tag_adopted && !agg.name.is_empty() {
            head.push(' ');
            head.push_str(&agg.name);
        }
        if !agg.bases.is_empty() {
            head.push_str(" : ");
            let bases: Vec<String> = agg
                .bases
                .iter()
                .map(|b| format!("{} {}", b.access.keyword(), b.name))
                .collect();
            head.push_str(&bases.join(", "));
        }
        head.push_str(" {");
        self.line(&head);

        self.members(&agg.members, kind);

        if typedef_form {
            self.line(&format!("}} {};", agg.aliases.join(", ")));
        } else {
            self.line("};");
        }
    }

    fn members(&mut self, members: &[Member], kind: AggregateKind) {
        let mut section = kind.default_visibility();
        self.indent += 1;
        for member in members {
            if let Some(vis) = member_visibility(member) {
                if vis != section {
                    self.indent -= 1;
                    self.line(&format!("{}:", vis.keyword()));
                    self.indent += 1;
                    section = vis;
                }
            }
            match member {
                Member::Field(f) => self.field(f),
                Member::Method(m) => {
                    let sig = self.function_text(m);
                    self.line(&format!("{};", sig));
                }
                Member::Nested(d) => self.decl(d),
            }
        }
        self.indent -= 1;
    }

    fn field(&mut self, field: &Field) {
        // Peel pointer wrappers so an inline aggregate body can be emitted
        // with the stars on the declarator.
        let mut stars = 0;
        let mut ty = &field.ty;
        while let TypeDesc::Pointer { inner } = ty {
            stars += 1;
            ty = inner;
        }

        match ty {
            TypeDesc::InlineAggregate { decl } => {
                if let (Some(agg), Some(kind)) = (decl.as_aggregate(), decl.aggregate_kind()) {
                    self.line(&format!("{} {{", kind.keyword()));
                    self.members(&agg.members, kind);
                    let mut tail = String::from("}");
                    if stars > 0 || !field.synthesized {
                        tail.push(' ');
                    }
                    for _ in 0..stars {
                        tail.push('*');
                    }
                    if !field.synthesized {
                        tail.push_str(&field.name);
                    }
                    push_dims(&mut tail, &field.array_dims);
                    tail.push(';');
                    self.line(&tail);
                }
            }
            TypeDesc::FunctionPointer { ret, params } => {
                self.line(&format!(
                    "{} (*{})({});",
                    type_text(ret),
                    field.name,
                    type_list(params)
                ));
            }
            _ => {
                let mut text = type_text(&field.ty);
                text.push(' ');
                text.push_str(&field.name);
                push_dims(&mut text, &field.array_dims);
                if let Some(width) = field.bit_width {
                    let _ = write!(text, " : {}", width);
                }
                text.push(';');
                self.line(&text);
            }
        }
    }

    fn function_text(&self, func: &Function) -> String {
        let mut out = String::new();
        if func.is_static {
            out.push_str("static ");
        }
        if func.is_virtual {
            out.push_str("virtual ");
        }
        // Constructors and destructors carry no return type.
        if !matches!(&func.ret, TypeDesc::Named { path } if path.is_empty()) {
            out.push_str(&type_text(&func.ret));
            out.push(' ');
        }
        out.push_str(&func.name);
        out.push('(');
        let params: Vec<String> = func.params.iter().map(param_text).collect();
        out.push_str(&params.join(", "));
        out.push(')');
        if func.is_const {
            out.push_str(" const");
        }
        if func.is_override {
            out.push_str(" override");
        }
        if func.is_pure_virtual {
            out.push_str(" = 0");
        }
        out
    }
}

fn member_visibility(member: &Member) -> Option<Visibility> {
    match member {
        Member::Field(f) => f.visibility,
        Member::Method(m) => m.visibility,
        Member::Nested(d) => match &**d {
            Declaration::Struct(a) | Declaration::Class(a) | Declaration::Union(a) => a.visibility,
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SourceLocation, SourceRange, Typedef};

    fn field(name: &str, ty: TypeDesc) -> Field {
        Field {
            name: name.to_string(),
            synthesized: false,
            ty,
            array_dims: Vec::new(),
            bit_width: None,
            visibility: None,
            doc: None,
            range: SourceRange::at(SourceLocation::start()),
        }
    }

    #[test]
    fn test_type_text() {
        assert_eq!(type_text(&TypeDesc::named("int")), "int");
        assert_eq!(
            type_text(&TypeDesc::pointer(TypeDesc::pointer(TypeDesc::named(
                "char"
            )))),
            "char**"
        );
        assert_eq!(
            type_text(&TypeDesc::Array {
                elem: Box::new(TypeDesc::named("char")),
                dims: vec![Some(50), None],
            }),
            "char[50][]"
        );
        assert_eq!(
            type_text(&TypeDesc::FunctionPointer {
                ret: Box::new(TypeDesc::named("int")),
                params: vec![TypeDesc::named("int"), TypeDesc::named("int")],
            }),
            "int (*)(int, int)"
        );
    }

    #[test]
    fn test_struct_text() {
        let agg = Aggregate {
            name: "Point".to_string(),
            path: "Point".to_string(),
            members: vec![
                Member::Field(field("x", TypeDesc::named("int"))),
                Member::Field(field("y", TypeDesc::named("int"))),
            ],
            bases: Vec::new(),
            template_params: Vec::new(),
            defined: true,
            aliases: Vec::new(),
            visibility: None,
            doc: None,
            range: SourceRange::at(SourceLocation::start()),
        };
        let text = decl_text(&agg.into_decl(AggregateKind::Struct));
        assert_eq!(text, "struct Point {\n  int x;\n  int y;\n};\n");
    }

    #[test]
    fn test_typedef_alias_form() {
        let agg = Aggregate {
            name: "Rect".to_string(),
            path: "Rect".to_string(),
            members: vec![Member::Field(field("w", TypeDesc::named("int")))],
            bases: Vec::new(),
            template_params: Vec::new(),
            defined: true,
            aliases: vec!["Rect".to_string()],
            visibility: None,
            doc: None,
            range: SourceRange::at(SourceLocation::start()),
        };
        let text = decl_text(&agg.into_decl(AggregateKind::Struct));
        assert_eq!(text, "typedef struct {\n  int w;\n} Rect;\n");
    }

    #[test]
    fn test_nested_type_visibility_section() {
        let inner = Aggregate {
            name: "Inner".to_string(),
            path: "Outer.Inner".to_string(),
            members: vec![Member::Field(field("v", TypeDesc::named("int")))],
            bases: Vec::new(),
            template_params: Vec::new(),
            defined: true,
            aliases: Vec::new(),
            visibility: Some(Visibility::Public),
            doc: None,
            range: SourceRange::at(SourceLocation::start()),
        };
        let outer = Aggregate {
            name: "Outer".to_string(),
            path: "Outer".to_string(),
            members: vec![Member::Nested(Box::new(
                inner.into_decl(AggregateKind::Struct),
            ))],
            bases: Vec::new(),
            template_params: Vec::new(),
            defined: true,
            aliases: Vec::new(),
            visibility: None,
            doc: None,
            range: SourceRange::at(SourceLocation::start()),
        };
        let text = decl_text(&outer.into_decl(AggregateKind::Class));
        assert_eq!(
            text,
            "class Outer {\npublic:\n  struct Inner {\n    int v;\n  };\n};\n"
        );
    }

    #[test]
    fn test_function_pointer_typedef_text() {
        let td = Declaration::Typedef(Typedef {
            name: "BinaryOp".to_string(),
            path: "BinaryOp".to_string(),
            target: TypeDesc::FunctionPointer {
                ret: Box::new(TypeDesc::named("int")),
                params: vec![TypeDesc::named("int"), TypeDesc::named("int")],
            },
            doc: None,
            range: SourceRange::at(SourceLocation::start()),
        });
        assert_eq!(decl_text(&td), "typedef int (*BinaryOp)(int, int);\n");
    }
}
