//! JavaScript grammar plumbing: parser construction, node text access, and
//! the yes/no validation oracle used before and after every conversion.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load the JavaScript grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("the parser returned no tree")]
    NoTree,
}

/// The grammar used for all parsing and validation.
pub fn language() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}

/// Build a parser for JavaScript sources.
pub fn parser() -> Result<Parser, ParseError> {
    let mut parser = Parser::new();
    parser.set_language(&language())?;
    Ok(parser)
}

/// Parse `source`, returning the tree even when it contains ERROR nodes.
/// Callers that need a strict answer go through [`validate`].
pub fn parse(source: &str) -> Result<Tree, ParseError> {
    let mut parser = parser()?;
    parser.parse(source, None).ok_or(ParseError::NoTree)
}

/// Full-grammar yes/no check. Used to reject malformed inputs up front and
/// to re-validate every rendered output before it is treated as usable.
pub fn validate(source: &str) -> bool {
    parse(source)
        .map(|tree| !tree.root_node().has_error())
        .unwrap_or(false)
}

/// The source text a node spans.
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}
