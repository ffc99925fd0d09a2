//! Syntax tree types: the owned tree the rewrite passes operate on
//!
//! Only the node kinds the normalizer inspects get their own variant.
//! Everything else is an [`Other`] node carrying the grammar's kind tag,
//! its source text when it is a leaf, and its children in source order.
//!
//! Each node exclusively owns its children; a tree is rooted at one
//! [`Module`] per file.

use std::fmt;

/// Kind tag of a class definition
pub const CLASS_DEFINITION: &str = "class_definition";
/// Kind tag of a function definition
pub const FUNCTION_DEFINITION: &str = "function_definition";
/// Kind tag of an `async def` function definition
pub const ASYNC_FUNCTION_DEFINITION: &str = "async_function_definition";
/// Kind tag of a name reference
pub const IDENTIFIER: &str = "identifier";

/// Position in source text for error reporting (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Root of one file's tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub body: Vec<Node>,
}

impl Module {
    pub fn new(body: Vec<Node>) -> Self {
        Module { body }
    }
}

/// A syntax tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    ClassDef(Definition),
    FunctionDef(Definition),
    AsyncFunctionDef(Definition),
    Name(Name),
    Other(Other),
}

/// A scope-introducing definition (`class`, `def`, `async def`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// `@decorator` lines, each a `decorator` node
    pub decorators: Vec<Node>,
    /// Declared name
    pub name: String,
    /// Everything between the name and the body: parameters, bases,
    /// return annotation and the trailing `:`
    pub header: Vec<Node>,
    /// Body statements
    pub body: Vec<Node>,
}

/// A name reference (variable load or store)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub id: String,
}

/// Any node kind the rewrite passes do not inspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Other {
    /// Grammar kind tag, e.g. `expression_statement` or `(`
    pub kind: String,
    /// Source text, present on leaves
    pub text: Option<String>,
    pub children: Vec<Node>,
}

impl Other {
    pub fn leaf(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Other {
            kind: kind.into(),
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    pub fn branch(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Other {
            kind: kind.into(),
            text: None,
            children,
        }
    }
}

impl Node {
    /// Canonical kind tag, used as the primary sort key by the orderer
    pub fn kind(&self) -> &str {
        match self {
            Node::ClassDef(_) => CLASS_DEFINITION,
            Node::FunctionDef(_) => FUNCTION_DEFINITION,
            Node::AsyncFunctionDef(_) => ASYNC_FUNCTION_DEFINITION,
            Node::Name(_) => IDENTIFIER,
            Node::Other(other) => &other.kind,
        }
    }

    /// Declared name, for kinds that carry one
    pub fn name(&self) -> Option<&str> {
        self.definition().map(|def| def.name.as_str())
    }

    pub fn definition(&self) -> Option<&Definition> {
        match self {
            Node::ClassDef(def) | Node::FunctionDef(def) | Node::AsyncFunctionDef(def) => Some(def),
            _ => None,
        }
    }

    /// `pass`, the no-op statement substituted into emptied bodies
    pub fn pass_statement() -> Node {
        Node::Other(Other::branch(
            "pass_statement",
            vec![Node::Other(Other::leaf("pass", "pass"))],
        ))
    }

    /// Rebuild this node with `f` applied to every direct child.
    ///
    /// Definitions map decorators, header and body in that order.
    pub fn map_children<F>(self, f: &mut F) -> Node
    where
        F: FnMut(Node) -> Node,
    {
        match self {
            Node::ClassDef(def) => Node::ClassDef(def.map_children(f)),
            Node::FunctionDef(def) => Node::FunctionDef(def.map_children(f)),
            Node::AsyncFunctionDef(def) => Node::AsyncFunctionDef(def.map_children(f)),
            Node::Name(name) => Node::Name(name),
            Node::Other(mut other) => {
                other.children = other.children.into_iter().map(&mut *f).collect();
                Node::Other(other)
            }
        }
    }
}

impl Definition {
    fn map_children<F>(mut self, f: &mut F) -> Definition
    where
        F: FnMut(Node) -> Node,
    {
        self.decorators = self.decorators.into_iter().map(&mut *f).collect();
        self.header = self.header.into_iter().map(&mut *f).collect();
        self.body = self.body.into_iter().map(&mut *f).collect();
        self
    }
}
