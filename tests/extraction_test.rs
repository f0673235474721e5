// End-to-end extraction tests over realistic headers

use declex::ast::{Member, TypeDesc, Visibility};
use declex::symbols::{Scope, SymbolKind, SymbolTable};
use declex::{canon, extract, DiagnosticKind, Language, Severity};

/// Render a table back to normalized source: scope decls as canonical text,
/// child scopes as namespace blocks.
fn render(table: &SymbolTable) -> String {
    fn scope_text(scope: &Scope, out: &mut String) {
        for decl in &scope.decls {
            out.push_str(&canon::decl_text(decl));
        }
        for child in &scope.children {
            out.push_str("namespace ");
            out.push_str(&child.name);
            out.push_str(" {\n");
            scope_text(child, out);
            out.push_str("}\n");
        }
    }
    let mut out = String::new();
    scope_text(&table.root, &mut out);
    out
}

#[test]
fn test_struct_with_doc_comments() {
    let source = r#"
        // A 2D point.
        struct Point {
            // Horizontal position.
            int x;
            // Vertical position.
            int y;
        };
    "#;

    let table = extract(source, "point.h", Language::C);
    assert!(table.diagnostics.is_empty());

    let point = table.lookup("Point").unwrap().as_aggregate().unwrap();
    assert_eq!(point.doc.as_ref().unwrap().text, "// A 2D point.");
    assert_eq!(point.members.len(), 2);
    match &point.members[0] {
        Member::Field(f) => {
            assert_eq!(f.name, "x");
            assert_eq!(f.ty, TypeDesc::named("int"));
            assert_eq!(f.doc.as_ref().unwrap().text, "// Horizontal position.");
        }
        other => panic!("expected field, got {:?}", other),
    }
}

#[test]
fn test_typedef_struct_alias() {
    let source = r#"
        typedef struct Rectangle {
            int width;
            int height;
        } Rectangle;
    "#;

    let table = extract(source, "rect.h", Language::C);
    assert!(table.diagnostics.is_empty());

    let rect = table.lookup("Rectangle").unwrap().as_aggregate().unwrap();
    assert_eq!(rect.aliases, vec!["Rectangle".to_string()]);
    assert_eq!(table.kind_of("Rectangle"), Some(SymbolKind::Aggregate));
}

#[test]
fn test_class_with_unresolved_base() {
    let source = r#"
        class Dog : public Animal {
        public:
            std::string speak() const override;
        private:
            std::string breed_;
        };
    "#;

    let table = extract(source, "dog.hpp", Language::Cpp);

    // The base lives in an unparsed header: warn, keep the name, keep the
    // relationship.
    assert_eq!(table.diagnostics.len(), 1);
    assert_eq!(table.diagnostics[0].kind, DiagnosticKind::UnresolvedReference);
    assert_eq!(table.diagnostics[0].severity, Severity::Warning);

    let dog = table.lookup("Dog").unwrap().as_aggregate().unwrap();
    assert_eq!(dog.bases[0].name, "Animal");
    assert_eq!(dog.bases[0].access, Visibility::Public);
    assert!(!dog.bases[0].resolved);

    match &dog.members[0] {
        Member::Method(m) => {
            assert!(m.is_override);
            assert!(m.is_const);
            assert_eq!(m.visibility, Some(Visibility::Public));
        }
        other => panic!("expected method, got {:?}", other),
    }
    match &dog.members[1] {
        Member::Field(f) => assert_eq!(f.visibility, Some(Visibility::Private)),
        other => panic!("expected field, got {:?}", other),
    }
}

#[test]
fn test_function_pointer_table() {
    let source = r#"
        typedef struct {
            int (*add)(int, int);
            int (*subtract)(int, int);
            float (*divide)(float, float);
        } Calculator;
    "#;

    let table = extract(source, "calc.h", Language::C);
    assert!(table.diagnostics.is_empty());

    let calc = table.lookup("Calculator").unwrap().as_aggregate().unwrap();
    assert_eq!(calc.members.len(), 3);
    for member in &calc.members {
        match member {
            Member::Field(f) => {
                assert!(matches!(f.ty, TypeDesc::FunctionPointer { .. }));
            }
            other => panic!("expected field, got {:?}", other),
        }
    }
}

#[test]
fn test_self_referential_type_stays_by_name() {
    let source = r#"
        struct TreeNode {
            int value;
            struct TreeNode *left;
            struct TreeNode *right;
        };
    "#;

    let table = extract(source, "tree.h", Language::C);
    assert!(table.diagnostics.is_empty());

    // Children are pointers referencing the type by name; nothing embeds
    // the definition back into itself.
    let node = table.lookup("TreeNode").unwrap().as_aggregate().unwrap();
    for name in ["left", "right"] {
        let field = node
            .members
            .iter()
            .find(|m| m.name() == name)
            .expect("child pointer field");
        match field {
            Member::Field(f) => {
                assert_eq!(f.ty, TypeDesc::pointer(TypeDesc::named("TreeNode")));
            }
            other => panic!("expected field, got {:?}", other),
        }
    }
}

#[test]
fn test_malformed_member_recovery() {
    let source = r#"
        struct Bad {
            int x
            int y;
        };

        struct After {
            int ok;
        };
    "#;

    let table = extract(source, "bad.h", Language::C);

    // One recoverable report, and extraction continued past the bad line
    // and the bad struct.
    assert_eq!(table.diagnostics.len(), 1);
    assert_eq!(table.diagnostics[0].kind, DiagnosticKind::SyntaxError);
    assert_eq!(table.diagnostics[0].severity, Severity::Recoverable);

    let bad = table.lookup("Bad").unwrap().as_aggregate().unwrap();
    assert_eq!(bad.members.len(), 1);
    assert_eq!(bad.members[0].name(), "x");

    assert!(table.lookup("After").is_some());
}

#[test]
fn test_anonymous_aggregate_surfaced_once() {
    let source = r#"
        struct Variant {
            int type;
            union {
                int as_int;
                float as_float;
                char *as_string;
            };
        };
    "#;

    let table = extract(source, "variant.h", Language::C);
    assert!(table.diagnostics.is_empty());

    let variant = table.lookup("Variant").unwrap().as_aggregate().unwrap();
    assert_eq!(variant.members.len(), 2);
    match &variant.members[1] {
        Member::Field(f) => {
            assert_eq!(f.name, "__anon0");
            assert!(f.synthesized);
            match &f.ty {
                TypeDesc::InlineAggregate { decl } => {
                    assert_eq!(decl.path(), "Variant.__anon0");
                    assert_eq!(decl.as_aggregate().unwrap().members.len(), 3);
                }
                other => panic!("expected inline aggregate, got {:?}", other),
            }
        }
        other => panic!("expected field, got {:?}", other),
    }
    // Surfaced exactly once: as the field's type, not as a sibling
    // declaration.
    assert_eq!(table.root.decls.len(), 1);
}

#[test]
fn test_namespaces_and_qualified_paths() {
    let source = r#"
        namespace utils {
            class Logger {
            public:
                void log(const std::string &message);
            };

            struct Config {
                int port;
                bool verbose;
            };
        }
    "#;

    let table = extract(source, "utils.hpp", Language::Cpp);
    assert!(table.diagnostics.is_empty());

    assert_eq!(table.kind_of("utils"), Some(SymbolKind::Scope));
    assert_eq!(table.kind_of("utils.Logger"), Some(SymbolKind::Aggregate));
    assert_eq!(table.kind_of("utils.Logger.log"), Some(SymbolKind::Method));
    assert_eq!(table.kind_of("utils.Config.port"), Some(SymbolKind::Field));
    assert!(table.lookup("utils.Config").is_some());
}

#[test]
fn test_full_header_mix() {
    let source = r#"
        #include <stdint.h>

        #define MAX_NAME 50

        struct Person {
            char name[50];
            unsigned int age : 7;
            struct {
                char city[50];
                int zip;
            } address;
        };

        typedef int (*Comparator)(const void *, const void *);

        struct Person make_person(const char *name, int age);
    "#;

    let table = extract(source, "person.h", Language::C);
    assert!(table.diagnostics.is_empty());

    let person = table.lookup("Person").unwrap().as_aggregate().unwrap();
    assert_eq!(person.members.len(), 3);
    match &person.members[1] {
        Member::Field(f) => assert_eq!(f.bit_width, Some(7)),
        other => panic!("expected field, got {:?}", other),
    }
    assert_eq!(table.kind_of("Comparator"), Some(SymbolKind::Typedef));
    assert_eq!(table.kind_of("make_person"), Some(SymbolKind::Function));
    assert!(table.lookup("Person.address").is_some());
}

// === PROPERTIES ===

#[test]
fn test_extraction_is_idempotent() {
    let source = r#"
        struct Blob;
        struct Blob { int size; char data[16]; };

        typedef struct { int w; int h; } Extent;

        class Shape {
        public:
            virtual double area() const = 0;
            virtual ~Shape();
        };

        class Circle : public Shape {
        public:
            Circle(double radius);
            double area() const override;
        private:
            double radius_;
        };

        struct Packet {
            unsigned int flags : 3;
            union {
                int word;
                char bytes[4];
            };
            int (*on_receive)(int, int);
        };

        namespace geo {
            struct Vec2 { float x; float y; };
        }
    "#;

    let first = extract(source, "a.hpp", Language::Cpp);
    assert!(first.diagnostics.is_empty());

    let rendered = render(&first);
    let second = extract(&rendered, "a.hpp", Language::Cpp);
    assert!(second.diagnostics.is_empty(), "{:?}", second.diagnostics);

    assert_eq!(render(&second), rendered);
}

#[test]
fn test_field_count_fidelity() {
    // Every field declarator in the source appears exactly once.
    let source = r#"
        struct Wide {
            int a, b, c;
            char *p, q;
            float f;
        };
    "#;

    let table = extract(source, "wide.h", Language::C);
    assert!(table.diagnostics.is_empty());
    let wide = table.lookup("Wide").unwrap().as_aggregate().unwrap();
    let names: Vec<&str> = wide.members.iter().map(Member::name).collect();
    assert_eq!(names, vec!["a", "b", "c", "p", "q", "f"]);
}

#[test]
fn test_merge_completes_forward_declaration() {
    let header = extract("struct Node; struct List { struct Node *head; };", "list.h", Language::C);
    let body = extract("struct Node { int value; struct Node *next; };", "node.c", Language::C);

    let merged = header.merge(body);
    let node = merged.lookup("Node").unwrap();
    assert!(node.is_definition());
    assert_eq!(merged.kind_of("Node"), Some(SymbolKind::Aggregate));
}

#[test]
fn test_merge_fold_over_many_files() {
    let sources = [
        ("a.h", "struct A { int x; };"),
        ("b.h", "struct B { int y; };"),
        ("c.h", "struct A { int x; }; struct C { struct A a; };"),
    ];
    let merged = sources
        .iter()
        .map(|(file, src)| extract(src, file, Language::C))
        .reduce(SymbolTable::merge)
        .unwrap();

    // The repeated identical A deduplicated silently.
    assert!(merged.diagnostics.is_empty());
    assert_eq!(merged.root.decls.len(), 3);
    assert_eq!(merged.files.len(), 3);
}

#[test]
fn test_fatal_truncation_yields_empty_table() {
    let table = extract("struct P { char *s = \"unterminated", "trunc.h", Language::C);
    assert!(table.lookup("P").is_none());
    assert_eq!(table.diagnostics.len(), 1);
    assert_eq!(table.diagnostics[0].kind, DiagnosticKind::TruncatedInput);
    assert!(table.diagnostics[0].is_fatal());
}

#[test]
fn test_serialized_shape() {
    let source = r#"
        // Engine state.
        struct Engine {
            int rpm;
            float (*throttle)(float);
        };
    "#;

    let table = extract(source, "engine.h", Language::C);
    let json = serde_json::to_value(&table).unwrap();

    assert_eq!(json["files"][0], "engine.h");
    let engine = &json["root"]["decls"][0];
    assert_eq!(engine["decl"], "Struct");
    assert_eq!(engine["name"], "Engine");
    assert_eq!(engine["doc"]["text"], "// Engine state.");
    let members = engine["members"].as_array().unwrap();
    assert_eq!(members[0]["member"], "Field");
    assert_eq!(members[0]["ty"]["type"], "Named");
    assert_eq!(members[0]["ty"]["path"], "int");
    assert_eq!(members[1]["ty"]["type"], "FunctionPointer");
}

#[test]
fn test_orphan_comments_are_kept() {
    let source = r#"
        // Header prologue, attached to nothing.

        struct P { int x; };
    "#;

    let table = extract(source, "p.h", Language::C);
    assert_eq!(table.orphan_comments.len(), 1);
    assert!(table.orphan_comments[0]
        .text
        .contains("Header prologue"));
    // The struct still claimed nothing.
    let p = table.lookup("P").unwrap().as_aggregate().unwrap();
    assert!(p.doc.is_none());
}
