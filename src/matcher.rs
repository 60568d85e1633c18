//! Structural template matcher.
//!
//! A [`Template`] is a small JavaScript pattern with two kinds of wildcard
//! markers: `_` matches any single subtree, and `_kind_` matches only a
//! subtree of that syntax kind (`_object_`, `_function_expression_`, ...).
//! Matching a candidate node either fails, or yields the subtrees the
//! wildcards bound, in traversal order. Matching is a pure query - a failed
//! attempt leaves nothing behind, so callers are free to try templates in
//! priority order until one fits.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tree_sitter::{Node, Tree};

use crate::language::{self, node_text};

static TYPED_WILDCARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_(\w+)_$").unwrap());

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("could not parse template `{0}`")]
    UnparseableTemplate(String),
    #[error(transparent)]
    Parse(#[from] language::ParseError),
}

/// A compiled pattern. Compile once per distinct pattern string, at process
/// start; matching shares the template immutably across files and threads.
pub struct Template {
    pattern: String,
    tree: Tree,
}

enum Wildcard<'a> {
    Any,
    Kind(&'a str),
}

impl Template {
    /// Compile a pattern string. The pattern must parse as a single
    /// statement; an enclosing expression statement is unwrapped so the same
    /// template serves both statement and expression positions.
    pub fn compile(pattern: &str) -> Result<Self, MatchError> {
        let tree = language::parse(pattern)?;
        let root = tree.root_node();
        if root.has_error() || root.named_child_count() != 1 {
            return Err(MatchError::UnparseableTemplate(pattern.to_string()));
        }
        Ok(Self {
            pattern: pattern.to_string(),
            tree,
        })
    }

    /// The pattern this template was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test `candidate` against the template. Returns one binding per
    /// wildcard on success, `None` on any mismatch.
    pub fn match_node<'t>(&self, candidate: Node<'t>, source: &str) -> Option<Vec<Node<'t>>> {
        let root = unwrap_statement(self.tree.root_node().named_child(0)?);
        let candidate = unwrap_statement(candidate);
        let mut bindings = Vec::new();
        if self.matches(root, candidate, source, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    fn matches<'t>(
        &self,
        template: Node,
        candidate: Node<'t>,
        source: &str,
        bindings: &mut Vec<Node<'t>>,
    ) -> bool {
        if let Some(wildcard) = self.wildcard(template) {
            return match wildcard {
                Wildcard::Any => {
                    bindings.push(candidate);
                    true
                }
                Wildcard::Kind(kind) if candidate.kind() == kind => {
                    bindings.push(candidate);
                    true
                }
                Wildcard::Kind(_) => false,
            };
        }

        if template.kind() != candidate.kind() {
            return false;
        }

        let template_children = significant_children(template);
        let candidate_children = significant_children(candidate);

        // Leaves (identifiers, literals, operator tokens) compare by text.
        if template_children.is_empty() && candidate_children.is_empty() {
            return node_text(template, &self.pattern) == node_text(candidate, source);
        }

        // Presence parity: an optional child present on one side only fails
        // the match, as does any arity difference.
        if template_children.len() != candidate_children.len() {
            return false;
        }

        if template.kind() == "object" {
            return self.matches_object(template_children, candidate_children, source, bindings);
        }

        for ((template_field, template_child), (candidate_field, candidate_child)) in
            template_children.iter().zip(&candidate_children)
        {
            if template_field != candidate_field {
                return false;
            }
            if !self.matches(*template_child, *candidate_child, source, bindings) {
                return false;
            }
        }
        true
    }

    /// Object-literal members may appear in any order relative to the
    /// template: each candidate member, in candidate order, consumes the
    /// first remaining template member it structurally matches. Bindings
    /// inside a bag therefore surface in candidate order.
    fn matches_object<'t>(
        &self,
        template_children: Vec<FieldChild<'_>>,
        candidate_children: Vec<FieldChild<'t>>,
        source: &str,
        bindings: &mut Vec<Node<'t>>,
    ) -> bool {
        let mut remaining = template_children;
        for (candidate_field, candidate_child) in candidate_children {
            let mut consumed = None;
            for (index, (template_field, template_child)) in remaining.iter().enumerate() {
                if *template_field != candidate_field {
                    continue;
                }
                let mut trial = Vec::new();
                if self.matches(*template_child, candidate_child, source, &mut trial) {
                    bindings.extend(trial);
                    consumed = Some(index);
                    break;
                }
            }
            match consumed {
                Some(index) => {
                    remaining.remove(index);
                }
                None => return false,
            }
        }
        remaining.is_empty()
    }

    fn wildcard(&self, template: Node) -> Option<Wildcard<'_>> {
        if template.named_child_count() != 0 {
            return None;
        }
        let text = node_text(template, &self.pattern);
        if text == "_" {
            return Some(Wildcard::Any);
        }
        let captures = TYPED_WILDCARD_RE.captures(text)?;
        Some(Wildcard::Kind(captures.get(1)?.as_str()))
    }
}

type FieldChild<'t> = (Option<&'static str>, Node<'t>);

/// Children that take part in structural comparison: named nodes plus any
/// token carrying a grammar field name (operators), skipping comments and
/// pure punctuation.
fn significant_children(node: Node<'_>) -> Vec<FieldChild<'_>> {
    let mut children = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            let field = cursor.field_name();
            if !child.is_extra() && (child.is_named() || field.is_some()) {
                children.push((field, child));
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    children
}

/// Templates compile to a lone expression statement; candidates often arrive
/// as one. Both sides shed that wrapper before comparison.
pub(crate) fn unwrap_statement(node: Node) -> Node {
    if node.kind() == "expression_statement" {
        node.named_child(0).unwrap_or(node)
    } else {
        node
    }
}
