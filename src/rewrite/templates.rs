//! The fixed set of prototype-idiom templates.
//!
//! Compiled once per process and shared immutably across files; the passes
//! query them in the priority order the fields are declared in.

use crate::matcher::{MatchError, Template};

pub struct TemplateSet {
    /// `Foo.prototype = Object.create(Bar.prototype)` - bindings: target, superclass.
    pub proto_create: Template,
    /// `Foo.prototype.constructor = Foo` - bindings: target, value.
    pub proto_constructor: Template,
    /// `Foo.prototype = Object.assign(Object.create(Bar.prototype), {...})`
    /// - bindings: target, superclass expression, method bag.
    pub assign_create: Template,
    /// `Object.assign(Foo.prototype, {...})` / `Object.assign(Foo, {...})`
    /// - bindings: target, method bag.
    pub assign_bag: Template,
    /// `Foo.prototype = {...}` - bindings: target, method bag.
    pub proto_bag: Template,
    /// `THREE.Foo = function (...) {...}` - bindings: target, function.
    pub function_assign: Template,
}

impl TemplateSet {
    pub fn compile() -> Result<Self, MatchError> {
        Ok(Self {
            proto_create: Template::compile("_.prototype = Object.create(_.prototype)")?,
            proto_constructor: Template::compile("_.prototype.constructor = _")?,
            assign_create: Template::compile("_ = Object.assign(Object.create(_), _object_)")?,
            assign_bag: Template::compile("Object.assign(_, _object_)")?,
            proto_bag: Template::compile("_.prototype = _object_")?,
            function_assign: Template::compile("_ = _function_expression_")?,
        })
    }
}
