// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Top-level function extraction from Python source, backed by tree-sitter.

use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::utils::errors::Error;

pub mod docstring;


/// Lines taken from the `def` line when a node's exact span can't be sliced.
pub const FALLBACK_WINDOW: usize = 10;

/// A read-only projection of one top-level `def` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    name: String,
    parameters: Vec<String>,
    documentation: String,
    source_text: String,
    line_number: usize,
}

impl FunctionRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Cleaned docstring, empty when the function has none.
    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// 1-based line of the `def` keyword.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// `name(p1, p2, ...)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameters.join(", "))
    }
}

fn parse_python(source: &str) -> Result<Tree, Error> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::Config(format!("failed to load the Python grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::Syntax("parser produced no tree".to_string()))?;

    if let Some(bad) = first_error(tree.root_node()) {
        return Err(Error::Syntax(describe_error(bad, source)));
    }
    if let Some((bad, reason)) = first_rejected(tree.root_node()) {
        let pos = bad.start_position();
        return Err(Error::Syntax(format!(
            "{reason} at line {}, column {}",
            pos.row + 1,
            pos.column + 1
        )));
    }
    Ok(tree)
}

// Constructs the grammar still accepts but Python 3 refuses to compile.
fn first_rejected<'t>(node: Node<'t>) -> Option<(Node<'t>, &'static str)> {
    match node.kind() {
        "print_statement" => return Some((node, "Python 2 print statement")),
        "exec_statement" => return Some((node, "Python 2 exec statement")),
        "parameters" | "lambda_parameters" => {
            if let Some(rejected) = check_parameters(node) {
                return Some(rejected);
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(first_rejected)
}

fn is_splat(param: Node) -> bool {
    match param.kind() {
        "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => true,
        // `*args: int` is a typed_parameter wrapping the splat
        "typed_parameter" => param
            .named_child(0)
            .is_some_and(|c| matches!(c.kind(), "list_splat_pattern" | "dictionary_splat_pattern")),
        _ => false,
    }
}

fn check_parameters(params: Node) -> Option<(Node, &'static str)> {
    let mut seen_default = false;
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if is_splat(param) {
            return None;
        }
        match param.kind() {
            "tuple_pattern" => return Some((param, "tuple parameter unpacking")),
            "default_parameter" | "typed_default_parameter" => seen_default = true,
            "identifier" | "typed_parameter" if seen_default => {
                return Some((param, "non-default argument follows default argument"))
            }
            _ => {}
        }
    }
    None
}

fn first_error<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn describe_error(node: Node, source: &str) -> String {
    let pos = node.start_position();
    if node.is_missing() {
        return format!(
            "missing `{}` at line {}, column {}",
            node.kind(),
            pos.row + 1,
            pos.column + 1
        );
    }
    let snippet: String = node
        .utf8_text(source.as_bytes())
        .unwrap_or_default()
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(40)
        .collect();
    format!(
        "invalid syntax at line {}, column {}: `{}`",
        pos.row + 1,
        pos.column + 1,
        snippet.trim()
    )
}

/// Whether `source` parses as Python.
pub fn validate_syntax(source: &str) -> bool {
    parse_python(source).is_ok()
}

/// Extracts every top-level `def` in source order.
///
/// Nested functions, methods, lambdas and `async def` statements are skipped.
/// Decorated functions are kept; their text and line start at the `def` keyword.
pub fn extract(source: &str) -> Result<Vec<FunctionRecord>, Error> {
    let tree = parse_python(source)?;
    let root = tree.root_node();

    let mut records = vec![];
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let def = match child.kind() {
            "function_definition" => Some(child),
            "decorated_definition" => child
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        };
        let Some(def) = def else { continue };
        if is_async(def) {
            debug!(line = def.start_position().row + 1, "skipping async def");
            continue;
        }
        records.push(build_record(def, source));
    }
    debug!(count = records.len(), "extracted top-level functions");
    Ok(records)
}

fn is_async(def: Node) -> bool {
    def.child(0).is_some_and(|c| c.kind() == "async")
}

fn build_record(def: Node, source: &str) -> FunctionRecord {
    let bytes = source.as_bytes();
    let name = def
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(bytes).ok())
        .unwrap_or_default()
        .to_string();

    let parameters = def
        .child_by_field_name("parameters")
        .map(|p| parameter_names(p, source))
        .unwrap_or_default();

    let documentation = def
        .child_by_field_name("body")
        .and_then(|body| docstring_of(body, source))
        .unwrap_or_default();

    let mut cursor = def.walk();
    let line_number = def
        .children(&mut cursor)
        .find(|c| c.kind() == "def")
        .unwrap_or(def)
        .start_position()
        .row
        + 1;

    let source_text = match source.get(def.start_byte()..def.end_byte()) {
        Some(text) => text.trim().to_string(),
        None => line_window(source, line_number),
    };

    FunctionRecord {
        name,
        parameters,
        documentation,
        source_text,
        line_number,
    }
}

// Positional-or-keyword names only: positional-only names before `/` are
// dropped and collection stops at the first `*`, `*args` or `**kwargs`.
fn parameter_names(params: Node, source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let text = |n: Node| n.utf8_text(bytes).unwrap_or_default().to_string();

    let mut names = vec![];
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "identifier" => names.push(text(param)),
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = param.child_by_field_name("name") {
                    names.push(text(name));
                }
            }
            "typed_parameter" => match param.named_child(0) {
                Some(inner) if inner.kind() == "identifier" => names.push(text(inner)),
                _ => break,
            },
            "positional_separator" => names.clear(),
            "keyword_separator" | "list_splat_pattern" | "dictionary_splat_pattern" => break,
            _ => {}
        }
    }
    names
}

fn docstring_of(body: Node, source: &str) -> Option<String> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let expr = first.named_child(0)?;
    let raw = match expr.kind() {
        "string" => docstring::decode_literal(expr.utf8_text(source.as_bytes()).ok()?)?,
        "concatenated_string" => {
            let mut cursor = expr.walk();
            let parts: Option<Vec<String>> = expr
                .named_children(&mut cursor)
                .filter(|p| p.kind() == "string")
                .map(|p| {
                    p.utf8_text(source.as_bytes())
                        .ok()
                        .and_then(docstring::decode_literal)
                })
                .collect();
            parts?.concat()
        }
        _ => return None,
    };
    Some(docstring::clean_docstring(&raw))
}

/// Best-effort reconstruction of a definition from its starting line: the
/// `FALLBACK_WINDOW` lines beginning at `line_number`, trimmed. Only an
/// approximation of the real span.
pub fn line_window(source: &str, line_number: usize) -> String {
    source
        .lines()
        .skip(line_number.saturating_sub(1))
        .take(FALLBACK_WINDOW)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
