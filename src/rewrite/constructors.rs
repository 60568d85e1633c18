//! Constructor reconstruction.
//!
//! The final pass turns class-named constructor functions into class
//! declarations. The delicate part is control flow: the legacy idiom invokes
//! the superclass with `Superclass.call(this, ...)` wherever the author put
//! it, while a native constructor must call `super(...)` before any use of
//! `this`. The pass rewrites the call in place and relocates the offending
//! earlier statements to just after it, keeping their relative order.

use tracing::debug;
use tree_sitter::Node;

use super::edits::EditBuffer;
use super::{ModuleRewriter, Result, resolve_target, strip_namespace, walk_back_over_whitespace};
use crate::language::node_text;

impl<'a> ModuleRewriter<'a> {
    /// Pass 3: emit class declarations for constructor functions and attach
    /// everything the earlier passes collected.
    pub(crate) fn rebuild_constructors(&mut self) -> Result<()> {
        let (tree, indexes) = self.top_level_statements();
        let root = tree.root_node();
        for index in indexes {
            let Some(statement) = root.named_child(index) else {
                continue;
            };
            self.rebuild_constructor_in(statement)?;
        }
        Ok(())
    }

    fn rebuild_constructor_in(&mut self, statement: Node) -> Result<()> {
        // One level of `export function Foo() {}` unwraps; the replacement
        // span stays inside the export statement so the keyword survives.
        let declaration = if statement.kind() == "export_statement" {
            match statement.child_by_field_name("declaration") {
                Some(inner) => inner,
                None => return Ok(()),
            }
        } else {
            statement
        };

        if declaration.kind() == "function_declaration" {
            let Some(name_node) = declaration.child_by_field_name("name") else {
                return Ok(());
            };
            let name = node_text(name_node, self.source).to_string();
            if !self.policy.is_class_name(&name) {
                return Ok(());
            }
            let (Some(params), Some(body)) = (
                declaration.child_by_field_name("parameters"),
                declaration.child_by_field_name("body"),
            ) else {
                return Ok(());
            };
            return self.emit_class(
                declaration.start_byte(),
                declaration.end_byte(),
                &name,
                params,
                body,
            );
        }

        // `THREE.Foo = function (...) {...};` assignment form.
        if let Some(bindings) = self.templates.function_assign.match_node(statement, self.source) {
            let &[target_node, function] = bindings.as_slice() else {
                return Ok(());
            };
            let Some(target) = resolve_target(node_text(target_node, self.source)) else {
                return Ok(());
            };
            if target.prototype || !self.policy.is_class_name(&target.name) {
                return Ok(());
            }
            let (Some(params), Some(body)) = (
                function.child_by_field_name("parameters"),
                function.child_by_field_name("body"),
            ) else {
                return Ok(());
            };
            return self.emit_class(
                statement.start_byte(),
                statement.end_byte(),
                &target.name,
                params,
                body,
            );
        }
        Ok(())
    }

    /// Assemble `class Name [extends Super] { constructor? methods statics }`
    /// plus trailing property re-attachments, and splice it over the
    /// original declaration.
    fn emit_class(
        &mut self,
        start: usize,
        end: usize,
        name: &str,
        params: Node,
        body: Node,
    ) -> Result<()> {
        let record = self.classes.take(name).unwrap_or_default();
        debug!(
            class = %name,
            superclass = record.superclass.as_deref().unwrap_or("-"),
            "rebuilding constructor"
        );

        let header = match &record.superclass {
            Some(superclass) => format!("class {} extends {}", name, strip_namespace(superclass)),
            None => format!("class {name}"),
        };

        let constructor = self.build_constructor(params, body, record.superclass.as_deref())?;

        let mut parts: Vec<String> = Vec::new();
        if let Some(fragment) = constructor {
            parts.push(indent_block(&fragment));
        }
        parts.extend(record.methods.iter().map(|m| indent_first_line(m)));
        parts.extend(record.static_methods.iter().map(|m| indent_first_line(m)));

        let class_body = if parts.is_empty() {
            "\n".to_string()
        } else {
            format!("\n{}\n", parts.join("\n\n"))
        };
        let mut replacement = format!("{header} {{{class_body}}}");

        for property in &record.properties {
            let attachment = if property.is_static {
                format!("{}.{} = {};", name, property.key, property.value_text)
            } else {
                format!("{}.prototype.{} = {};", name, property.key, property.value_text)
            };
            replacement.push_str("\n\n");
            replacement.push_str(&attachment);
        }

        self.code.replace(start, end, replacement)?;
        Ok(())
    }

    /// Decide whether an explicit constructor is needed and produce its
    /// text. With a superclass one is always needed - the class form must
    /// carry an explicit `super(...)`. Without one, an empty body means the
    /// implicit default constructor suffices.
    fn build_constructor(
        &self,
        params: Node,
        body: Node,
        superclass: Option<&str>,
    ) -> Result<Option<String>> {
        let mut cursor = body.walk();
        let statements: Vec<Node> = body
            .named_children(&mut cursor)
            .filter(|child| !child.is_extra())
            .collect();

        let Some(superclass) = superclass else {
            // Comment-only bodies still count as non-empty here, so the
            // comment survives inside the emitted constructor.
            if body.named_child_count() == 0 {
                return Ok(None);
            }
            let text = &self.source[params.start_byte()..body.end_byte()];
            return Ok(Some(format!("constructor {text}")));
        };

        if statements.is_empty() {
            let params_text = node_text(params, self.source);
            return Ok(Some(format!("constructor {params_text} {{\n\n\tsuper();\n\n}}")));
        }

        let base = params.start_byte();
        let mut buffer = EditBuffer::new(&self.source[base..body.end_byte()]);

        let super_call = statements
            .iter()
            .enumerate()
            .find_map(|(index, stmt)| self.super_call_in(*stmt, superclass).map(|call| (index, *stmt, call)));

        match super_call {
            Some((index, call_statement, call)) => {
                self.rewrite_super_call(&mut buffer, base, call)?;

                // Statements that mention `this` must follow the super call.
                // The check is a plain substring scan, the same approximation
                // the conversion has always used: it also fires when `this`
                // only occurs inside a string literal or a nested callback.
                let mut relocated = String::new();
                for earlier in &statements[..index] {
                    let text = node_text(*earlier, self.source);
                    if !text.contains("this") {
                        continue;
                    }
                    let lead = walk_back_over_whitespace(self.source, earlier.start_byte());
                    buffer.remove(lead - base, earlier.end_byte() - base)?;
                    relocated.push_str(&self.source[lead..earlier.end_byte()]);
                }
                if !relocated.is_empty() {
                    buffer.insert_after(call_statement.end_byte() - base, relocated)?;
                }
            }
            None => {
                // No manual superclass invocation anywhere in the body:
                // initialize the superclass first.
                let first = statements[0];
                let indent = line_indent(self.source, first.start_byte());
                buffer.insert_before(first.start_byte() - base, format!("super();\n{indent}"))?;
            }
        }

        Ok(Some(format!("constructor {}", buffer.render())))
    }

    /// `Superclass.call(this, a, b)` becomes `super(a, b)`: overwrite the
    /// callee, drop the leading `this` argument and its comma.
    fn rewrite_super_call(&self, buffer: &mut EditBuffer<'_>, base: usize, call: Node) -> Result<()> {
        let Some(callee) = call.child_by_field_name("function") else {
            return Ok(());
        };
        buffer.replace(callee.start_byte() - base, callee.end_byte() - base, "super")?;

        let Some(arguments) = call.child_by_field_name("arguments") else {
            return Ok(());
        };
        let mut cursor = arguments.walk();
        let args: Vec<Node> = arguments
            .named_children(&mut cursor)
            .filter(|child| !child.is_extra())
            .collect();
        if let Some(this_arg) = args.first() {
            let cut_end = match args.get(1) {
                Some(second) => second.start_byte(),
                None => this_arg.end_byte(),
            };
            buffer.remove(this_arg.start_byte() - base, cut_end - base)?;
        }
        Ok(())
    }

    /// Match a whole statement of the form `Superclass.call(this, ...)`.
    /// The callee object must be the superclass exactly as recorded.
    fn super_call_in<'t>(&self, statement: Node<'t>, superclass: &str) -> Option<Node<'t>> {
        if statement.kind() != "expression_statement" {
            return None;
        }
        let call = statement.named_child(0)?;
        if call.kind() != "call_expression" {
            return None;
        }
        let callee = call.child_by_field_name("function")?;
        if callee.kind() != "member_expression" {
            return None;
        }
        let object = callee.child_by_field_name("object")?;
        let property = callee.child_by_field_name("property")?;
        if node_text(property, self.source) != "call" {
            return None;
        }
        if node_text(object, self.source) != superclass {
            return None;
        }
        let arguments = call.child_by_field_name("arguments")?;
        if arguments.named_child(0)?.kind() != "this" {
            return None;
        }
        Some(call)
    }
}

/// Indent every line of a fragment one level. Constructor fragments come
/// from column zero; blank lines stay blank.
fn indent_block(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("\t{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Method fragments keep their original interior indentation; only the
/// first line moves one level in.
fn indent_first_line(text: &str) -> String {
    format!("\t{text}")
}

/// Whitespace run at the start of the line containing `offset`.
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let indent_end = source[line_start..offset]
        .find(|c: char| !c.is_whitespace())
        .map(|i| line_start + i)
        .unwrap_or(offset);
    &source[line_start..indent_end]
}
