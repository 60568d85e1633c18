//! Rewrite engine.
//!
//! Owns the per-file conversion state: the discovered superclass edges,
//! method and property ownership, and the edit buffer keyed to the original
//! text. Three passes run in a fixed order over the top-level statements -
//! inheritance discovery, member extraction, constructor reconstruction -
//! each consuming matcher queries and producing splices. State lives for one
//! file and is discarded after rendering, so nothing leaks across files.

pub mod constructors;
pub mod edits;
pub mod templates;

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::config::ClassNamePolicy;
use crate::language::{self, node_text};
use crate::matcher::MatchError;
use edits::{EditBuffer, EditError};
use templates::TemplateSet;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("input is not parseable JavaScript")]
    InvalidInput,
    #[error("class {class} cannot extend {requested}: superclass already recorded as {existing}")]
    SuperclassConflict {
        class: String,
        existing: String,
        requested: String,
    },
    #[error("class {class} lists itself as its own superclass")]
    SelfInheritance { class: String },
    #[error("superclass of {class} must be a prototype reference, found `{found}`")]
    BadSuperclassShape { class: String, found: String },
    #[error("`constructor` must be the first entry of the method bag for {class}")]
    MisplacedConstructor { class: String },
    #[error("class {class} was discovered but no constructor function consumed it")]
    OrphanedClass { class: String },
    #[error("converted output failed to re-parse")]
    InvalidOutput,
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Template(#[from] MatchError),
    #[error(transparent)]
    Parse(#[from] language::ParseError),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// How a file is classified for the conservative member-extraction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular source file: every recognized pattern is converted.
    Source,
    /// Example/demo file: method bags are only lifted when inheritance
    /// already forces the class form.
    Example,
}

/// A non-function member lifted out of a method bag. Re-attached as a plain
/// assignment after the class declaration, since a class body has no slot
/// for arbitrary prototype/static values.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub key: String,
    pub value_text: String,
    pub is_static: bool,
}

/// Per-class accumulator: superclass edge, method fragments in encounter
/// order, and properties awaiting re-attachment.
#[derive(Debug, Default)]
pub struct ClassRecord {
    pub superclass: Option<String>,
    pub methods: Vec<String>,
    pub static_methods: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Default)]
pub struct ClassTable {
    records: HashMap<String, ClassRecord>,
}

impl ClassTable {
    pub(crate) fn record_mut(&mut self, name: &str) -> &mut ClassRecord {
        self.records.entry(name.to_string()).or_default()
    }

    /// Superclass edges are write-once: re-asserting the same edge is a
    /// no-op, a conflicting edge fails the file.
    pub(crate) fn set_superclass(&mut self, class: &str, superclass: &str) -> Result<()> {
        if strip_namespace(superclass) == class {
            return Err(ConvertError::SelfInheritance {
                class: class.to_string(),
            });
        }
        let record = self.record_mut(class);
        match &record.superclass {
            Some(existing) if existing != superclass => Err(ConvertError::SuperclassConflict {
                class: class.to_string(),
                existing: existing.clone(),
                requested: superclass.to_string(),
            }),
            _ => {
                record.superclass = Some(superclass.to_string());
                Ok(())
            }
        }
    }

    pub(crate) fn superclass(&self, class: &str) -> Option<&str> {
        self.records.get(class).and_then(|r| r.superclass.as_deref())
    }

    pub(crate) fn take(&mut self, class: &str) -> Option<ClassRecord> {
        self.records.remove(class)
    }

    pub(crate) fn first_remaining(&self) -> Option<String> {
        self.records.keys().min().cloned()
    }
}

/// Per-file conversion driver: parse, run the three passes in order, render,
/// and re-validate. The only public entry point for converting text.
pub fn convert_source(
    source: &str,
    templates: &TemplateSet,
    policy: &dyn ClassNamePolicy,
    kind: FileKind,
) -> Result<String> {
    let rewriter = ModuleRewriter::new(source, templates, policy, kind)?;
    let output = rewriter.convert()?;
    if !language::validate(&output) {
        return Err(ConvertError::InvalidOutput);
    }
    Ok(output)
}

pub struct ModuleRewriter<'a> {
    pub(crate) source: &'a str,
    pub(crate) tree: Tree,
    pub(crate) code: EditBuffer<'a>,
    pub(crate) classes: ClassTable,
    pub(crate) templates: &'a TemplateSet,
    pub(crate) policy: &'a dyn ClassNamePolicy,
    pub(crate) kind: FileKind,
}

enum BagMember {
    Method { fragment: String },
    Property { key: String, value_text: String },
    DroppedConstructor,
}

impl<'a> ModuleRewriter<'a> {
    pub fn new(
        source: &'a str,
        templates: &'a TemplateSet,
        policy: &'a dyn ClassNamePolicy,
        kind: FileKind,
    ) -> Result<Self> {
        let tree = language::parse(source)?;
        if tree.root_node().has_error() {
            return Err(ConvertError::InvalidInput);
        }
        Ok(Self {
            source,
            tree,
            code: EditBuffer::new(source),
            classes: ClassTable::default(),
            templates,
            policy,
            kind,
        })
    }

    /// Run the passes in their required order and render the patched text.
    pub fn convert(mut self) -> Result<String> {
        self.discover_inheritance()?;
        self.extract_members()?;
        self.rebuild_constructors()?;
        if let Some(class) = self.classes.first_remaining() {
            return Err(ConvertError::OrphanedClass { class });
        }
        Ok(self.code.render())
    }

    fn top_level_statements(&self) -> (Tree, Vec<usize>) {
        // Nodes cannot outlive the tree they borrow from; passes clone the
        // tree (cheap, refcounted) and re-derive statements from it.
        let tree = self.tree.clone();
        let count = tree.root_node().named_child_count();
        (tree, (0..count).collect())
    }

    /// Pass 1: resolve inheritance edges and drop the manual wiring.
    fn discover_inheritance(&mut self) -> Result<()> {
        let (tree, indexes) = self.top_level_statements();
        let root = tree.root_node();
        for index in indexes {
            let Some(statement) = root.named_child(index) else {
                continue;
            };
            self.discover_inheritance_in(statement)?;
        }
        Ok(())
    }

    fn discover_inheritance_in(&mut self, statement: Node) -> Result<()> {
        // `Foo.prototype = Object.create(Bar.prototype)` - the wiring is
        // implicit in class syntax, so the edge is recorded and the
        // statement dropped.
        if let Some(bindings) = self.templates.proto_create.match_node(statement, self.source) {
            let &[target_node, super_node] = bindings.as_slice() else {
                return Ok(());
            };
            let Some(target) = resolve_target(node_text(target_node, self.source)) else {
                return Ok(());
            };
            if !self.policy.is_class_name(&target.name) {
                return Ok(());
            }
            let superclass = node_text(super_node, self.source);
            self.classes.set_superclass(&target.name, superclass)?;
            self.remove_statement(statement)?;
            return Ok(());
        }

        // `Foo.prototype.constructor = Foo` - obsolete bookkeeping.
        if let Some(bindings) = self
            .templates
            .proto_constructor
            .match_node(statement, self.source)
        {
            let &[target_node, _value] = bindings.as_slice() else {
                return Ok(());
            };
            let Some(target) = resolve_target(node_text(target_node, self.source)) else {
                return Ok(());
            };
            if !self.policy.is_class_name(&target.name) {
                return Ok(());
            }
            self.remove_statement(statement)?;
            return Ok(());
        }

        // The single-statement subclass-plus-methods idiom. Only the
        // inheritance edge is resolved here; pass 2 lifts the methods.
        if let Some(bindings) = self.templates.assign_create.match_node(statement, self.source) {
            let &[target_node, super_node, _bag] = bindings.as_slice() else {
                return Ok(());
            };
            let Some(target) = resolve_target(node_text(target_node, self.source)) else {
                return Ok(());
            };
            if !self.policy.is_class_name(&target.name) {
                return Ok(());
            }
            let super_text = node_text(super_node, self.source);
            let superclass = match resolve_target(super_text) {
                Some(resolved) if resolved.prototype => resolved.qualified,
                _ => {
                    // This idiom always spells the superclass as its
                    // prototype object; anything else is not ours to guess.
                    return Err(ConvertError::BadSuperclassShape {
                        class: target.name,
                        found: super_text.to_string(),
                    });
                }
            };
            self.classes.set_superclass(&target.name, &superclass)?;
        }
        Ok(())
    }

    /// Pass 2: lift method bags onto class records and drop the emptied
    /// declarations.
    fn extract_members(&mut self) -> Result<()> {
        let (tree, indexes) = self.top_level_statements();
        let root = tree.root_node();
        for index in indexes {
            let Some(statement) = root.named_child(index) else {
                continue;
            };
            self.extract_members_in(statement)?;
        }
        Ok(())
    }

    fn extract_members_in(&mut self, statement: Node) -> Result<()> {
        let matched = self.match_member_bag(statement);
        let Some((name, is_static, bag)) = matched else {
            return Ok(());
        };
        if !self.policy.is_class_name(&name) {
            return Ok(());
        }

        // Example files keep their bags unless inheritance already forces
        // the class form.
        if self.kind == FileKind::Example && self.classes.superclass(&name).is_none() {
            debug!(class = %name, "leaving method bag alone in example file");
            return Ok(());
        }

        let Some(members) = self.scan_bag(bag, &name)? else {
            debug!(class = %name, "unsupported member shape, leaving declaration alone");
            return Ok(());
        };

        for member in members {
            let record = self.classes.record_mut(&name);
            match member {
                BagMember::Method { fragment } => {
                    if is_static {
                        record.static_methods.push(format!("static {fragment}"));
                    } else {
                        record.methods.push(fragment);
                    }
                }
                BagMember::Property { key, value_text } => {
                    record.properties.push(PropertyDescriptor {
                        key,
                        value_text,
                        is_static,
                    });
                }
                BagMember::DroppedConstructor => {}
            }
        }
        self.remove_statement(statement)?;
        Ok(())
    }

    /// Try the member-bag templates in priority order. Returns the resolved
    /// class name, whether members attach statically, and the bag node.
    fn match_member_bag<'t>(&self, statement: Node<'t>) -> Option<(String, bool, Node<'t>)> {
        if let Some(bindings) = self.templates.assign_bag.match_node(statement, self.source) {
            let &[target_node, bag] = bindings.as_slice() else {
                return None;
            };
            let target = resolve_target(node_text(target_node, self.source))?;
            return Some((target.name, !target.prototype, bag));
        }
        if let Some(bindings) = self.templates.proto_bag.match_node(statement, self.source) {
            let &[target_node, bag] = bindings.as_slice() else {
                return None;
            };
            // The template spells out `.prototype`, so the binding is the
            // bare class expression and members are instance members.
            let target = resolve_target(node_text(target_node, self.source))?;
            if target.prototype {
                return None;
            }
            return Some((target.name, false, bag));
        }
        if let Some(bindings) = self.templates.assign_create.match_node(statement, self.source) {
            let &[target_node, _super, bag] = bindings.as_slice() else {
                return None;
            };
            let target = resolve_target(node_text(target_node, self.source))?;
            return Some((target.name, !target.prototype, bag));
        }
        None
    }

    /// Pre-scan a method bag. `None` means some member has a shape we do not
    /// convert and the whole declaration stays untouched - no partial lifts.
    fn scan_bag(&self, bag: Node, class: &str) -> Result<Option<Vec<BagMember>>> {
        let mut cursor = bag.walk();
        let entries: Vec<Node> = bag
            .named_children(&mut cursor)
            .filter(|child| !child.is_extra())
            .collect();

        let mut members = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.kind() != "pair" {
                return Ok(None);
            }
            let Some(key) = entry.child_by_field_name("key") else {
                return Ok(None);
            };
            let Some(value) = entry.child_by_field_name("value") else {
                return Ok(None);
            };
            if key.kind() != "property_identifier" {
                return Ok(None);
            }
            let key_text = node_text(key, self.source);

            if key_text == "constructor" {
                if index != 0 {
                    return Err(ConvertError::MisplacedConstructor {
                        class: class.to_string(),
                    });
                }
                members.push(BagMember::DroppedConstructor);
                continue;
            }

            if matches!(value.kind(), "function_expression" | "function") {
                match self.method_fragment(*entry, key, value)? {
                    Some(fragment) => members.push(BagMember::Method { fragment }),
                    None => return Ok(None),
                }
            } else {
                members.push(BagMember::Property {
                    key: key_text.to_string(),
                    value_text: node_text(value, self.source).to_string(),
                });
            }
        }
        Ok(Some(members))
    }

    /// Collapse `key: function (args) {...}` into `key (args) {...}`.
    /// Async and named function expressions do not survive that collapse
    /// and bail the whole bag out.
    fn method_fragment(&self, entry: Node, key: Node, value: Node) -> Result<Option<String>> {
        let Some(params) = value.child_by_field_name("parameters") else {
            return Ok(None);
        };
        let keyword = self.source[value.start_byte()..params.start_byte()].trim();
        if keyword != "function" {
            return Ok(None);
        }

        let base = entry.start_byte();
        let mut buffer = EditBuffer::new(&self.source[base..entry.end_byte()]);
        buffer.replace(key.end_byte() - base, params.start_byte() - base, " ")?;
        Ok(Some(buffer.render()))
    }

    /// Remove a whole top-level statement plus the whitespace run before it,
    /// so no blank hole is left behind.
    pub(crate) fn remove_statement(&mut self, statement: Node) -> Result<()> {
        let start = walk_back_over_whitespace(self.source, statement.start_byte());
        self.code.remove(start, statement.end_byte())?;
        Ok(())
    }
}

/// Resolved form of a dotted target expression: the expression minus any
/// trailing `.prototype`, its final identifier, and whether `.prototype`
/// was present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedTarget {
    pub qualified: String,
    pub name: String,
    pub prototype: bool,
}

pub(crate) fn resolve_target(text: &str) -> Option<ResolvedTarget> {
    let mut segments: Vec<&str> = text.split('.').collect();
    let prototype = segments.last() == Some(&"prototype");
    if prototype {
        segments.pop();
    }
    if segments.is_empty() || !segments.iter().all(|segment| is_identifier(segment)) {
        return None;
    }
    Some(ResolvedTarget {
        qualified: segments.join("."),
        name: (*segments.last()?).to_string(),
        prototype,
    })
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn strip_namespace(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub(crate) fn walk_back_over_whitespace(source: &str, mut offset: usize) -> usize {
    let bytes = source.as_bytes();
    while offset > 0 && bytes[offset - 1].is_ascii_whitespace() {
        offset -= 1;
    }
    offset
}
