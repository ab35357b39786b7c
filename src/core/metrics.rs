//! Structural metrics for extracted code
//!
//! Cyclomatic complexity is counted over the tree-sitter AST: the counter
//! starts at 1 and every conditional branch, loop, switch/match arm and
//! short-circuit logical operator adds one.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::parser::{is_unit_node, Language};

/// Line breakdown of a file or unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMetrics {
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
}

impl LineMetrics {
    pub fn from_source(source: &str) -> Self {
        let mut metrics = LineMetrics::default();

        for line in source.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                metrics.blank_lines += 1;
            } else if is_comment_line(trimmed) {
                metrics.comment_lines += 1;
            } else {
                metrics.code_lines += 1;
            }
        }

        metrics
    }

    pub fn total(&self) -> usize {
        self.code_lines + self.comment_lines + self.blank_lines
    }

    pub fn add(&mut self, other: &LineMetrics) {
        self.code_lines += other.code_lines;
        self.comment_lines += other.comment_lines;
        self.blank_lines += other.blank_lines;
    }
}

fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with("/*")
}

/// Cyclomatic complexity of the unit rooted at `node`.
///
/// Nested units (inner functions, methods of nested classes) are extracted on
/// their own and are not counted toward the enclosing unit.
pub fn cyclomatic_complexity(node: Node, language: Language) -> usize {
    let mut complexity = 1;
    count_decisions(node, language, &mut complexity, true);
    complexity
}

fn count_decisions(node: Node, language: Language, count: &mut usize, is_root: bool) {
    if !is_root && is_unit_node(node, language) {
        return;
    }

    if is_decision_point(node, language) {
        *count += 1;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count_decisions(child, language, count, false);
    }
}

fn is_decision_point(node: Node, language: Language) -> bool {
    let kind = node.kind();
    match language {
        Language::Rust => match kind {
            "if_expression" | "if_let_expression" | "while_expression"
            | "while_let_expression" | "loop_expression" | "for_expression" | "match_arm" => true,
            "binary_expression" => is_short_circuit(node, &["&&", "||"]),
            _ => false,
        },
        Language::Python => matches!(
            kind,
            "if_statement"
                | "elif_clause"
                | "conditional_expression"
                | "for_statement"
                | "while_statement"
                | "case_clause"
                | "boolean_operator"
        ),
        Language::Go => match kind {
            "if_statement" | "for_statement" | "expression_case" | "type_case"
            | "communication_case" => true,
            "binary_expression" => is_short_circuit(node, &["&&", "||"]),
            _ => false,
        },
        Language::JavaScript | Language::TypeScript | Language::Tsx => match kind {
            "if_statement" | "ternary_expression" | "for_statement" | "for_in_statement"
            | "while_statement" | "do_statement" | "switch_case" | "switch_default" => true,
            "binary_expression" => is_short_circuit(node, &["&&", "||", "??"]),
            _ => false,
        },
        _ => false,
    }
}

fn is_short_circuit(node: Node, operators: &[&str]) -> bool {
    node.child_by_field_name("operator")
        .map(|op| operators.contains(&op.kind()))
        .unwrap_or(false)
}

/// Number of declared parameters, excluding receivers (`self`, `cls`).
pub fn parameter_count(node: Node, source: &str, language: Language) -> usize {
    let params = match node.child_by_field_name("parameters") {
        Some(params) => params,
        // `x => x + 1`
        None => return usize::from(node.child_by_field_name("parameter").is_some()),
    };

    let mut cursor = params.walk();
    if language == Language::Go {
        let count: usize = params.named_children(&mut cursor).map(go_parameter_weight).sum();
        return count;
    }

    let count = params
        .named_children(&mut cursor)
        .filter(|param| counts_as_parameter(*param, source, language))
        .count();
    count
}

fn counts_as_parameter(param: Node, source: &str, language: Language) -> bool {
    let kind = param.kind();
    if kind == "comment" {
        return false;
    }
    match language {
        Language::Rust => !matches!(kind, "self_parameter" | "attribute_item"),
        Language::Python => {
            if matches!(kind, "keyword_separator" | "positional_separator") {
                return false;
            }
            if kind == "identifier" {
                let name = &source[param.byte_range()];
                return name != "self" && name != "cls";
            }
            true
        }
        _ => true,
    }
}

/// `a, b int` declares two parameters; `int` alone declares one.
fn go_parameter_weight(param: Node) -> usize {
    match param.kind() {
        "parameter_declaration" => {
            let mut cursor = param.walk();
            let names = param.children_by_field_name("name", &mut cursor).count();
            names.max(1)
        }
        "variadic_parameter_declaration" => 1,
        _ => 0,
    }
}
