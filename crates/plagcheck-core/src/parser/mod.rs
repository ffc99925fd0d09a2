//! Python parser: tree-sitter grammar lowered into the owned syntax tree
//!
//! The concrete tree from `tree-sitter-python` is converted into [`ast::Module`]:
//! definitions, name references and string literals get dedicated handling,
//! every other node is carried through as [`ast::Other`] with its kind tag.
//! Comments and line continuations are dropped.

pub mod ast;

use tree_sitter::{Node as TsNode, Parser};

use crate::{Error, Result};
use ast::{Definition, Module, Name, Node, Other, Span};

/// Parse Python source into a syntax tree
///
/// # Errors
/// Returns `SyntaxError` with line:column of the first malformed
/// construct, or `ParserError` if the grammar cannot be loaded.
pub fn parse(source: &str) -> Result<Module> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| Error::ParserError(format!("failed to load Python grammar: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::ParserError("parser returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(root, source));
    }

    Ok(Lowering { source }.module(root))
}

// ── Syntax errors ─────────────────────────────────────────

fn syntax_error(root: TsNode<'_>, source: &str) -> Error {
    let Some(node) = first_error(root) else {
        return Error::SyntaxError {
            span: span_of(root),
            message: "invalid syntax".to_string(),
        };
    };

    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = source.get(node.byte_range()).unwrap_or_default();
        let snippet: String = text.lines().next().unwrap_or_default().chars().take(20).collect();
        if snippet.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("unexpected `{}`", snippet)
        }
    };

    Error::SyntaxError {
        span: span_of(node),
        message,
    }
}

fn first_error(node: TsNode<'_>) -> Option<TsNode<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn span_of(node: TsNode<'_>) -> Span {
    let point = node.start_position();
    Span {
        line: point.row + 1,
        column: point.column + 1,
    }
}

// ── Lowering ──────────────────────────────────────────────

struct Lowering<'s> {
    source: &'s str,
}

impl<'s> Lowering<'s> {
    fn module(&self, root: TsNode<'_>) -> Module {
        Module::new(self.statements(root))
    }

    /// Statements of a `module` or `block`; separators like `;` are anonymous
    fn statements(&self, node: TsNode<'_>) -> Vec<Node> {
        children(node)
            .into_iter()
            .filter(|(_, child)| child.is_named())
            .map(|(field, child)| self.lower(child, field))
            .collect()
    }

    fn lower(&self, node: TsNode<'_>, field: Option<&str>) -> Node {
        match node.kind() {
            "function_definition" => self.function(node, Vec::new()),
            "class_definition" => self.class(node, Vec::new()),
            "decorated_definition" => self.decorated(node),
            "identifier" => self.identifier(node, field),
            "string" => self.string(node),
            "block" => Node::Other(Other::branch("block", self.statements(node))),
            kind if node.child_count() == 0 => Node::Other(Other::leaf(kind, self.text(node))),
            kind => Node::Other(Other::branch(kind, self.lower_children(node))),
        }
    }

    fn lower_children(&self, node: TsNode<'_>) -> Vec<Node> {
        children(node)
            .into_iter()
            .map(|(field, child)| self.lower(child, field))
            .collect()
    }

    fn function(&self, node: TsNode<'_>, decorators: Vec<Node>) -> Node {
        let mut is_async = false;
        let def = self.definition(node, decorators, |child| {
            if !child.is_named() && child.kind() == "async" {
                is_async = true;
                true
            } else {
                !child.is_named() && child.kind() == "def"
            }
        });
        if is_async {
            Node::AsyncFunctionDef(def)
        } else {
            Node::FunctionDef(def)
        }
    }

    fn class(&self, node: TsNode<'_>, decorators: Vec<Node>) -> Node {
        let def = self.definition(node, decorators, |child| {
            !child.is_named() && child.kind() == "class"
        });
        Node::ClassDef(def)
    }

    /// Split a definition into name, header and body; `is_keyword` marks
    /// the leading keyword tokens, which the serializer re-emits from the kind.
    fn definition<F>(&self, node: TsNode<'_>, decorators: Vec<Node>, mut is_keyword: F) -> Definition
    where
        F: FnMut(TsNode<'_>) -> bool,
    {
        let mut def = Definition {
            decorators,
            name: String::new(),
            header: Vec::new(),
            body: Vec::new(),
        };
        for (field, child) in children(node) {
            match field {
                Some("name") => def.name = self.text(child),
                Some("body") => def.body = self.statements(child),
                _ if is_keyword(child) => {}
                _ => def.header.push(self.lower(child, field)),
            }
        }
        def
    }

    fn decorated(&self, node: TsNode<'_>) -> Node {
        let mut decorators = Vec::new();
        let mut definition = None;
        for (field, child) in children(node) {
            if field == Some("definition") {
                definition = Some(child);
            } else if child.kind() == "decorator" {
                decorators.push(self.lower(child, field));
            }
        }
        match definition {
            Some(def) if def.kind() == "function_definition" => self.function(def, decorators),
            Some(def) if def.kind() == "class_definition" => self.class(def, decorators),
            _ => Node::Other(Other::branch("decorated_definition", self.lower_children(node))),
        }
    }

    fn identifier(&self, node: TsNode<'_>, field: Option<&str>) -> Node {
        let text = self.text(node);
        let parent = node.parent();
        let parent_kind = parent.map(|p| p.kind()).unwrap_or_default();
        let grandparent_kind = parent
            .and_then(|p| p.parent())
            .map(|g| g.kind())
            .unwrap_or_default();

        if is_name_reference(parent_kind, field, grandparent_kind) && !is_exception_alias(node) {
            Node::Name(Name { id: text })
        } else {
            Node::Other(Other::leaf(ast::IDENTIFIER, text))
        }
    }

    /// Literal pieces keep their verbatim text; interpolations are lowered
    fn string(&self, node: TsNode<'_>) -> Node {
        if node.child_count() == 0 {
            return Node::Other(Other::leaf("string", self.text(node)));
        }
        let pieces = children(node)
            .into_iter()
            .map(|(field, child)| {
                if child.kind() == "interpolation" {
                    self.lower(child, field)
                } else {
                    Node::Other(Other::leaf(child.kind(), self.text(child)))
                }
            })
            .collect();
        Node::Other(Other::branch("string", pieces))
    }

    fn text(&self, node: TsNode<'_>) -> String {
        self.source
            .get(node.byte_range())
            .unwrap_or_default()
            .to_string()
    }
}

/// Direct children with their field names, grammar extras removed
fn children(node: TsNode<'_>) -> Vec<(Option<&'static str>, TsNode<'_>)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if !child.is_extra() && child.kind() != "comment" {
                out.push((cursor.field_name(), child));
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    out
}

/// The `err` in `except E as err`: a handler label, not a variable node
fn is_exception_alias(node: TsNode<'_>) -> bool {
    const HANDLERS: [&str; 2] = ["except_clause", "except_group_clause"];

    let Some(parent) = node.parent() else {
        return false;
    };
    if HANDLERS.contains(&parent.kind()) {
        return node
            .prev_sibling()
            .is_some_and(|prev| matches!(prev.kind(), "as" | ","));
    }
    if parent.kind() != "as_pattern_target" {
        return false;
    }
    parent
        .parent()
        .and_then(|pattern| pattern.parent())
        .is_some_and(|owner| HANDLERS.contains(&owner.kind()))
}

/// Whether an `identifier` denotes a variable (load or store) rather than
/// an attribute, parameter, keyword, import path or scope declaration.
fn is_name_reference(parent: &str, field: Option<&str>, grandparent: &str) -> bool {
    const PARAMETER_LISTS: [&str; 3] = ["parameters", "lambda_parameters", "typed_parameter"];

    match (parent, field) {
        ("attribute", Some("attribute")) => false,
        ("keyword_argument", Some("name")) => false,
        ("default_parameter" | "typed_default_parameter", Some("name")) => false,
        ("parameters" | "lambda_parameters" | "typed_parameter", _) => false,
        ("list_splat_pattern" | "dictionary_splat_pattern", _) => {
            !PARAMETER_LISTS.contains(&grandparent)
        }
        ("dotted_name" | "aliased_import" | "global_statement" | "nonlocal_statement", _) => false,
        _ => true,
    }
}
