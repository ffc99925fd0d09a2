//! Canonical normalizer: rewrites a Python tree into its canonical form
//!
//! Three passes strip superficial differences before the tree is serialized
//! back to text for scoring.
//!
//! # Pipeline
//!
//! `source → parse → strip_docstrings → compress_identifiers → order_structure → serialize_canonical`
//!
//! The pass order is fixed: ordering sorts on names, so it must see the
//! compressed names or adversarial renames would still move statements.
//!
//! # Guarantees
//!
//! - **Deterministic**: same input always produces same output
//! - **Idempotent**: `normalize_ast(normalize_ast(x)) == normalize_ast(x)`
//! - **Representable**: no body is ever left empty

use tracing::warn;

use crate::parser::ast::*;
use crate::{Error, Result};

// ── Public API ─────────────────────────────────────────────

/// Normalize Python source to canonical text
///
/// # Errors
/// Returns `SyntaxError` for invalid input; see [`canonicalize`] for the
/// variant that degrades to raw text instead.
pub fn normalize(source: &str) -> Result<String> {
    let ast = crate::parser::parse(source)?;
    let normalized = normalize_ast(ast);
    Ok(serialize_canonical(&normalized))
}

/// Canonical form used for scoring
///
/// Source that does not parse is returned unchanged, so the comparison
/// degrades to literal text instead of aborting the batch. Any other
/// failure propagates.
pub fn canonicalize(source: &str) -> Result<String> {
    canonical_form(source).map(|(text, _)| text)
}

/// [`canonicalize`], also reporting whether the raw-text fallback was taken
pub fn canonical_form(source: &str) -> Result<(String, bool)> {
    match normalize(source) {
        Ok(canonical) => Ok((canonical, false)),
        Err(err @ Error::SyntaxError { .. }) => {
            warn!(error = %err, "source does not parse, comparing raw text");
            Ok((source.to_string(), true))
        }
        Err(err) => Err(err),
    }
}

/// Run every rewrite pass in the fixed order
pub fn normalize_ast(ast: Module) -> Module {
    let ast = strip_docstrings(ast);
    let ast = compress_identifiers(ast);
    order_structure(ast)
}

// ── Docstring stripping ────────────────────────────────────

/// Remove the leading documentation string from every module, class and
/// function body, substituting `pass` for a body left empty.
pub fn strip_docstrings(mut ast: Module) -> Module {
    ast.body = strip_body(ast.body.into_iter().map(strip_node).collect());
    ast
}

fn strip_node(node: Node) -> Node {
    match node.map_children(&mut strip_node) {
        Node::ClassDef(def) => Node::ClassDef(strip_definition(def)),
        Node::FunctionDef(def) => Node::FunctionDef(strip_definition(def)),
        Node::AsyncFunctionDef(def) => Node::AsyncFunctionDef(strip_definition(def)),
        other => other,
    }
}

fn strip_definition(mut def: Definition) -> Definition {
    def.body = strip_body(def.body);
    def
}

fn strip_body(mut body: Vec<Node>) -> Vec<Node> {
    if body.first().is_some_and(is_docstring) {
        body.remove(0);
        if body.is_empty() {
            body.push(Node::pass_statement());
        }
    }
    body
}

/// An expression statement holding nothing but a plain string constant
fn is_docstring(stmt: &Node) -> bool {
    match stmt {
        Node::Other(other) if other.kind == "expression_statement" => {
            matches!(other.children.as_slice(), [only] if is_string_constant(only))
        }
        _ => false,
    }
}

fn is_string_constant(node: &Node) -> bool {
    let Node::Other(other) = node else {
        return false;
    };
    match other.kind.as_str() {
        "string" => {
            let interpolated = other.children.iter().any(|c| c.kind() == "interpolation");
            !interpolated && !has_prefix(other, &['f', 'F', 'b', 'B'])
        }
        "concatenated_string" => other.children.iter().all(is_string_constant),
        "parenthesized_expression" => {
            let mut inner = other.children.iter().filter(|c| !matches!(c.kind(), "(" | ")"));
            matches!((inner.next(), inner.next()), (Some(only), None) if is_string_constant(only))
        }
        _ => false,
    }
}

/// Whether the string's literal prefix (`rb`, `f`, ...) contains any of `flags`
fn has_prefix(string: &Other, flags: &[char]) -> bool {
    let opening = match (&string.text, string.children.first()) {
        (Some(text), _) => text.as_str(),
        (None, Some(Node::Other(start))) => start.text.as_deref().unwrap_or_default(),
        _ => "",
    };
    opening
        .chars()
        .take_while(|c| *c != '"' && *c != '\'')
        .any(|c| flags.contains(&c))
}

// ── Identifier compression ─────────────────────────────────

/// Replace every declared name and name reference with its first character.
///
/// No rename table is kept: distinct names sharing a first character
/// collide on purpose.
pub fn compress_identifiers(mut ast: Module) -> Module {
    ast.body = ast.body.into_iter().map(compress_node).collect();
    ast
}

fn compress_node(node: Node) -> Node {
    match node.map_children(&mut compress_node) {
        Node::ClassDef(def) => Node::ClassDef(compress_definition(def)),
        Node::FunctionDef(def) => Node::FunctionDef(compress_definition(def)),
        Node::AsyncFunctionDef(def) => Node::AsyncFunctionDef(compress_definition(def)),
        Node::Name(name) => Node::Name(Name {
            id: first_char(&name.id),
        }),
        other => other,
    }
}

fn compress_definition(mut def: Definition) -> Definition {
    def.name = first_char(&def.name);
    def
}

fn first_char(name: &str) -> String {
    name.chars().take(1).collect()
}

// ── Structural ordering ────────────────────────────────────

/// Reorder each module, class and function body by (kind, name).
///
/// Groups are ordered by kind tag; definitions within a group by name.
/// Statements without a name keep their relative order.
pub fn order_structure(mut ast: Module) -> Module {
    ast.body = order_body(ast.body.into_iter().map(order_node).collect());
    ast
}

fn order_node(node: Node) -> Node {
    match node.map_children(&mut order_node) {
        Node::ClassDef(def) => Node::ClassDef(order_definition(def)),
        Node::FunctionDef(def) => Node::FunctionDef(order_definition(def)),
        Node::AsyncFunctionDef(def) => Node::AsyncFunctionDef(order_definition(def)),
        other => other,
    }
}

fn order_definition(mut def: Definition) -> Definition {
    def.body = order_body(def.body);
    def
}

fn order_body(mut body: Vec<Node>) -> Vec<Node> {
    // sort_by is stable: unnamed statements of one kind keep source order
    body.sort_by(|a, b| (a.kind(), a.name()).cmp(&(b.kind(), b.name())));
    body
}

// ── Canonical serializer ───────────────────────────────────

/// Serialize a tree to canonical Python-like text
///
/// Produces deterministic output with:
/// - One statement per line
/// - 4-space indentation per nesting level
/// - Tokens separated by a single space
/// - String literals emitted verbatim
/// - No comments
pub fn serialize_canonical(ast: &Module) -> String {
    let mut writer = Writer::default();
    writer.statements(&ast.body);
    writer.end_line();
    writer.out
}

#[derive(Default)]
struct Writer {
    out: String,
    depth: usize,
    line_open: bool,
}

impl Writer {
    fn token(&mut self, text: &str) {
        if self.line_open {
            self.out.push(' ');
        } else {
            write_indent(&mut self.out, self.depth * 4);
            self.line_open = true;
        }
        self.out.push_str(text);
    }

    fn end_line(&mut self) {
        if self.line_open {
            self.out.push('\n');
            self.line_open = false;
        }
    }

    fn statements(&mut self, body: &[Node]) {
        for stmt in body {
            self.end_line();
            self.node(stmt);
            self.end_line();
        }
    }

    /// Indented body; whatever follows (`else:`, next statement) starts a new line
    fn suite(&mut self, body: &[Node]) {
        self.end_line();
        self.depth += 1;
        self.statements(body);
        self.end_line();
        self.depth -= 1;
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::ClassDef(def) => self.definition(&["class"], def),
            Node::FunctionDef(def) => self.definition(&["def"], def),
            Node::AsyncFunctionDef(def) => self.definition(&["async", "def"], def),
            Node::Name(name) => self.token(&name.id),
            Node::Other(other) => match (other.kind.as_str(), &other.text) {
                (_, Some(text)) => self.token(text),
                ("string", None) => self.token(&glue(&other.children)),
                ("block", None) => self.suite(&other.children),
                _ => other.children.iter().for_each(|child| self.node(child)),
            },
        }
    }

    fn definition(&mut self, keywords: &[&str], def: &Definition) {
        for decorator in &def.decorators {
            self.end_line();
            self.node(decorator);
            self.end_line();
        }
        for keyword in keywords {
            self.token(keyword);
        }
        self.token(&def.name);
        for part in &def.header {
            self.node(part);
        }
        self.suite(&def.body);
    }
}

/// String pieces joined without separators; interpolations rendered inline
fn glue(pieces: &[Node]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Node::Other(Other { text: Some(text), .. }) => out.push_str(text),
            other => {
                let mut inline = Writer::default();
                inline.node(other);
                out.push_str(&inline.out);
            }
        }
    }
    out
}

fn write_indent(out: &mut String, n: usize) {
    for _ in 0..n {
        out.push(' ');
    }
}
