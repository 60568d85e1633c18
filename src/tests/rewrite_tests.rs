// Rewrite engine tests.
//
// Whole-file conversions go through `convert_source`, the same entry point
// the corpus driver uses, so every expectation here includes the re-parse
// oracle. Output ordering is asserted through substring positions rather
// than full-file equality wherever surrounding whitespace is incidental.

use crate::config::CasedNamePolicy;
use crate::language;
use crate::rewrite::templates::TemplateSet;
use crate::rewrite::{ClassTable, ConvertError, FileKind, convert_source};

fn convert(source: &str) -> Result<String, ConvertError> {
    convert_kind(source, FileKind::Source)
}

fn convert_kind(source: &str, kind: FileKind) -> Result<String, ConvertError> {
    let templates = TemplateSet::compile().expect("templates should compile");
    let policy = CasedNamePolicy::default();
    convert_source(source, &templates, &policy, kind)
}

/// Byte position of `needle` in `haystack`; fails the test when absent.
fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("expected `{needle}` in:\n{haystack}"))
}

#[cfg(test)]
mod class_table {
    use super::*;

    #[test]
    fn reasserting_the_same_superclass_is_a_noop() {
        let mut table = ClassTable::default();
        table.set_superclass("Mesh", "Object3D").unwrap();
        table.set_superclass("Mesh", "Object3D").unwrap();
        assert_eq!(table.superclass("Mesh"), Some("Object3D"));
    }

    #[test]
    fn conflicting_superclass_is_an_error() {
        let mut table = ClassTable::default();
        table.set_superclass("Mesh", "Object3D").unwrap();
        let err = table.set_superclass("Mesh", "Light").unwrap_err();
        assert!(matches!(err, ConvertError::SuperclassConflict { .. }));
    }

    #[test]
    fn self_inheritance_is_an_error() {
        let mut table = ClassTable::default();
        assert!(matches!(
            table.set_superclass("Mesh", "Mesh"),
            Err(ConvertError::SelfInheritance { .. })
        ));
        // A namespaced spelling of the same name counts too.
        assert!(matches!(
            table.set_superclass("Mesh", "THREE.Mesh"),
            Err(ConvertError::SelfInheritance { .. })
        ));
    }
}

#[cfg(test)]
mod constructor_synthesis {
    use super::*;

    #[test]
    fn empty_function_without_superclass_gets_no_constructor() {
        let output = convert("function Foo() {}").unwrap();
        assert_eq!(output, "class Foo {\n}");
    }

    #[test]
    fn nonempty_body_without_superclass_is_preserved() {
        let output = convert("function Foo(a) { this.a = a; }").unwrap();
        assert_eq!(output, "class Foo {\n\tconstructor (a) { this.a = a; }\n}");
    }

    #[test]
    fn super_call_midway_relocates_this_statements() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      function Foo() { this.x = 1; Bar.call(this); this.y = 2; }\n";
        let output = convert(source).unwrap();

        assert!(language::validate(&output));
        assert!(output.contains("class Foo extends Bar"));
        assert!(!output.contains("Bar.call"));
        assert!(!output.contains("Object.create"));

        // Body order: super() first, then the relocated statement, then the
        // statement that already followed the call.
        let super_at = position(&output, "super();");
        let x_at = position(&output, "this.x = 1;");
        let y_at = position(&output, "this.y = 2;");
        assert!(super_at < x_at);
        assert!(x_at < y_at);
    }

    #[test]
    fn super_call_arguments_survive_the_rewrite() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      function Foo(a, b) { Bar.call(this, a, b); }\n";
        let output = convert(source).unwrap();
        assert!(output.contains("super(a, b);"));
        assert!(!output.contains("this, a"));
        assert!(language::validate(&output));
    }

    #[test]
    fn statements_without_this_stay_ahead_of_the_super_call() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      function Foo(options) { options = options || {}; Bar.call(this, options); this.ready = true; }\n";
        let output = convert(source).unwrap();

        let options_at = position(&output, "options = options || {};");
        let super_at = position(&output, "super(options);");
        let ready_at = position(&output, "this.ready = true;");
        assert!(options_at < super_at);
        assert!(super_at < ready_at);
        assert!(language::validate(&output));
    }

    #[test]
    fn missing_super_call_is_synthesized_before_the_first_statement() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      function Foo() {\n\tthis.x = 1;\n}\n";
        let output = convert(source).unwrap();

        assert!(output.contains("class Foo extends Bar"));
        let super_at = position(&output, "super();");
        let x_at = position(&output, "this.x = 1;");
        assert!(super_at < x_at);
        assert!(language::validate(&output));
    }

    #[test]
    fn empty_body_with_superclass_still_gets_an_explicit_super() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\nfunction Foo() {}\n";
        let output = convert(source).unwrap();
        assert!(output.contains("class Foo extends Bar"));
        assert!(output.contains("constructor ()"));
        assert!(output.contains("super();"));
        assert!(language::validate(&output));
    }

    #[test]
    fn export_wrapper_is_preserved() {
        let output = convert("export function Foo() {}").unwrap();
        assert_eq!(output, "export class Foo {\n}");
    }

    #[test]
    fn namespaced_assignment_form_converts_with_namespace_stripped() {
        let output = convert("THREE.Foo = function (a) { this.a = a; };\n").unwrap();
        assert!(output.contains("class Foo {"));
        assert!(output.contains("constructor (a) { this.a = a; }"));
        assert!(!output.contains("THREE.Foo = function"));
        assert!(language::validate(&output));
    }

    #[test]
    fn namespaced_inheritance_matches_the_namespaced_super_call() {
        let source = "THREE.Foo.prototype = Object.create(THREE.Bar.prototype);\n\
                      THREE.Foo = function () { THREE.Bar.call(this); };\n";
        let output = convert(source).unwrap();
        assert!(output.contains("class Foo extends Bar"));
        assert!(output.contains("super();"));
        assert!(!output.contains("THREE.Bar.call"));
        assert!(language::validate(&output));
    }
}

#[cfg(test)]
mod member_extraction {
    use super::*;

    #[test]
    fn method_bag_becomes_a_class_body() {
        let source = "Object.assign(Foo.prototype, { bar: function (a) { return a; } });\n\
                      function Foo() {}\n";
        let output = convert(source).unwrap();

        assert!(output.contains("bar (a) { return a; }"));
        assert!(!output.contains("Object.assign"));
        assert!(!output.contains("constructor"));

        // Exactly one class with exactly one method definition.
        let tree = language::parse(&output).unwrap();
        let root = tree.root_node();
        let mut cursor = root.walk();
        let classes: Vec<_> = root
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "class_declaration")
            .collect();
        assert_eq!(classes.len(), 1);
        let body = classes[0].child_by_field_name("body").unwrap();
        let mut body_cursor = body.walk();
        let methods = body
            .named_children(&mut body_cursor)
            .filter(|n| n.kind() == "method_definition")
            .count();
        assert_eq!(methods, 1);
    }

    #[test]
    fn methods_keep_their_encounter_order() {
        let source = "Object.assign(Foo.prototype, {\n\
                      \tfirst: function () { return 1; },\n\
                      \tsecond: function () { return 2; }\n\
                      });\n\
                      function Foo() {}\n";
        let output = convert(source).unwrap();
        assert!(position(&output, "first ()") < position(&output, "second ()"));
        assert!(language::validate(&output));
    }

    #[test]
    fn non_function_member_is_reattached_after_the_class() {
        let source = "Object.assign(Foo.prototype, { key: 'value' });\nfunction Foo() {}\n";
        let output = convert(source).unwrap();

        assert!(output.contains("Foo.prototype.key = 'value';"));
        // Outside the class body, not inside it.
        let class_close = position(&output, "}");
        let attach_at = position(&output, "Foo.prototype.key");
        assert!(attach_at > class_close);
        assert!(language::validate(&output));
    }

    #[test]
    fn static_bag_members_become_static_methods_and_values() {
        let source = "Object.assign(Foo, { make: function () { return 1; }, LIMIT: 10 });\n\
                      function Foo() {}\n";
        let output = convert(source).unwrap();

        assert!(output.contains("static make () { return 1; }"));
        assert!(output.contains("Foo.LIMIT = 10;"));
        assert!(language::validate(&output));
    }

    #[test]
    fn bare_prototype_bag_is_lifted() {
        let source = "Foo.prototype = { bar: function () { return 3; } };\nfunction Foo() {}\n";
        let output = convert(source).unwrap();
        assert!(output.contains("bar () { return 3; }"));
        assert!(!output.contains("Foo.prototype = {"));
        assert!(language::validate(&output));
    }

    #[test]
    fn combined_subclass_idiom_converts_end_to_end() {
        let source = "function Foo() { Bar.call(this); }\n\
                      Foo.prototype = Object.assign(Object.create(Bar.prototype), {\n\
                      \tconstructor: Foo,\n\
                      \tgo: function () { return 1; }\n\
                      });\n";
        let output = convert(source).unwrap();

        assert!(output.contains("class Foo extends Bar"));
        assert!(output.contains("super();"));
        assert!(output.contains("go () { return 1; }"));
        assert!(!output.contains("Object.create"));
        assert!(!output.contains("constructor: Foo"));
        assert!(language::validate(&output));
    }

    #[test]
    fn misplaced_constructor_entry_fails_the_file() {
        let source = "function Foo() { Bar.call(this); }\n\
                      Foo.prototype = Object.assign(Object.create(Bar.prototype), {\n\
                      \tgo: function () { return 1; },\n\
                      \tconstructor: Foo\n\
                      });\n";
        assert!(matches!(
            convert(source),
            Err(ConvertError::MisplacedConstructor { .. })
        ));
    }

    #[test]
    fn unsupported_member_shapes_leave_the_declaration_alone() {
        let spread = "Object.assign(Foo.prototype, { ...base });\nfunction Foo() {}\n";
        let output = convert(spread).unwrap();
        assert!(output.contains("Object.assign(Foo.prototype, { ...base });"));

        let shorthand = "Object.assign(Foo.prototype, { bar() {} });\nfunction Foo() {}\n";
        let output = convert(shorthand).unwrap();
        assert!(output.contains("Object.assign(Foo.prototype, { bar() {} });"));

        let named = "Object.assign(Foo.prototype, { bar: function bar() {} });\nfunction Foo() {}\n";
        let output = convert(named).unwrap();
        assert!(output.contains("Object.assign(Foo.prototype, { bar: function bar() {} });"));
    }

    #[test]
    fn generator_members_are_reattached_as_properties() {
        // A generator is not a plain function expression; re-attaching it as
        // a prototype value keeps its semantics without inventing a class
        // method syntax for it.
        let source = "Object.assign(Foo.prototype, { gen: function* () {} });\nfunction Foo() {}\n";
        let output = convert(source).unwrap();
        assert!(output.contains("Foo.prototype.gen = function* () {};"));
        assert!(!output.contains("Object.assign"));
        assert!(language::validate(&output));
    }

    #[test]
    fn lowercase_targets_are_not_classes() {
        let source = "Object.assign(helpers, { twice: function (n) { return n * 2; } });\n";
        let output = convert(source).unwrap();
        assert_eq!(output, source);
    }
}

#[cfg(test)]
mod inheritance_discovery {
    use super::*;

    #[test]
    fn prototype_constructor_bookkeeping_is_removed() {
        let source = "function Foo() {}\nFoo.prototype.constructor = Foo;\n";
        let output = convert(source).unwrap();
        assert!(!output.contains("constructor = Foo"));
        assert!(output.contains("class Foo"));
        assert!(language::validate(&output));
    }

    #[test]
    fn reasserted_identical_superclass_converts_cleanly() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      Foo.prototype = Object.create(Bar.prototype);\n\
                      function Foo() {}\n";
        let output = convert(source).unwrap();
        assert!(output.contains("class Foo extends Bar"));
        assert!(language::validate(&output));
    }

    #[test]
    fn conflicting_superclass_fails_the_file() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      Foo.prototype = Object.create(Baz.prototype);\n\
                      function Foo() {}\n";
        assert!(matches!(
            convert(source),
            Err(ConvertError::SuperclassConflict { .. })
        ));
    }

    #[test]
    fn self_inheritance_fails_the_file() {
        let source = "Foo.prototype = Object.create(Foo.prototype);\nfunction Foo() {}\n";
        assert!(matches!(
            convert(source),
            Err(ConvertError::SelfInheritance { .. })
        ));
    }

    #[test]
    fn non_prototype_superclass_in_combined_idiom_fails_the_file() {
        let source = "function Foo() {}\n\
                      Foo.prototype = Object.assign(Object.create(Bar), {});\n";
        assert!(matches!(
            convert(source),
            Err(ConvertError::BadSuperclassShape { .. })
        ));
    }

    #[test]
    fn lowercase_prototype_wiring_is_left_alone() {
        let source = "widget.prototype = Object.create(base.prototype);\n";
        let output = convert(source).unwrap();
        assert_eq!(output, source);
    }
}

#[cfg(test)]
mod failure_modes {
    use super::*;

    #[test]
    fn unparseable_input_is_rejected_up_front() {
        assert!(matches!(
            convert("function ((( {"),
            Err(ConvertError::InvalidInput)
        ));
    }

    #[test]
    fn orphaned_members_fail_instead_of_losing_code() {
        // The wiring statement is removed, but no constructor function ever
        // consumes the record - silently dropping the edge would change
        // semantics, so the file fails.
        let source = "Foo.prototype = Object.create(Bar.prototype);\n";
        assert!(matches!(
            convert(source),
            Err(ConvertError::OrphanedClass { .. })
        ));
    }

    #[test]
    fn files_with_nothing_to_convert_pass_through_unchanged() {
        let source = "const answer = 42;\nfunction helper() { return answer; }\n";
        let output = convert(source).unwrap();
        assert_eq!(output, source);
    }
}

#[cfg(test)]
mod policies {
    use super::*;
    use crate::rewrite::ModuleRewriter;

    #[test]
    fn deny_listed_identifiers_are_not_classes() {
        let templates = TemplateSet::compile().unwrap();
        let policy = CasedNamePolicy::new(["Legacy".to_string()]);
        let source = "function Legacy() {}";
        let rewriter =
            ModuleRewriter::new(source, &templates, &policy, FileKind::Source).unwrap();
        assert_eq!(rewriter.convert().unwrap(), source);
    }

    #[test]
    fn example_files_keep_bags_without_inheritance() {
        let source = "Object.assign(Foo.prototype, { bar: function () {} });\nfunction Foo() {}\n";
        let output = convert_kind(source, FileKind::Example).unwrap();
        assert!(output.contains("Object.assign(Foo.prototype"));
        assert!(output.contains("class Foo"));
        assert!(language::validate(&output));
    }

    #[test]
    fn example_files_convert_bags_once_inheritance_forces_it() {
        let source = "Foo.prototype = Object.create(Bar.prototype);\n\
                      Object.assign(Foo.prototype, { bar: function () { return 1; } });\n\
                      function Foo() {}\n";
        let output = convert_kind(source, FileKind::Example).unwrap();
        assert!(!output.contains("Object.assign"));
        assert!(output.contains("bar () { return 1; }"));
        assert!(output.contains("class Foo extends Bar"));
        assert!(language::validate(&output));
    }
}
