// Reclass - prototype-to-class conversion for legacy JavaScript
//!
//! Reclass recognizes the conventional prototype-era class patterns
//! (constructor functions, `Object.assign` method bags, manual prototype
//! wiring) in JavaScript sources and rewrites them to ES class syntax by
//! splicing the original text, leaving everything it does not recognize
//! byte-for-byte intact. Every converted file is re-parsed before it is
//! reported as converted.

pub mod config;
pub mod language;
pub mod matcher;
pub mod rewrite;
pub mod runner;

#[cfg(test)]
pub mod tests;

// Re-export common types
pub use config::{CasedNamePolicy, ClassNamePolicy, ConvertConfig};
pub use matcher::{MatchError, Template};
pub use rewrite::templates::TemplateSet;
pub use rewrite::{ConvertError, FileKind, ModuleRewriter, convert_source};
pub use runner::{RunOptions, RunSummary, run};
