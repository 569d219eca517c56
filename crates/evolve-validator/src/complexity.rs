//! Structural metrics and ceilings for generated code.
//!
//! # Examples
//!
//! ```
//! use evolve_core::ComplexityConfig;
//! use evolve_validator::ComplexityAnalyzer;
//!
//! let analyzer = ComplexityAnalyzer::new(&ComplexityConfig::default());
//! let report = analyzer.analyze("for i in range(3):\n    if i:\n        print(i)\n");
//!
//! assert!(report.passed());
//! assert_eq!(report.metrics.loops, 1);
//! assert_eq!(report.metrics.conditionals, 1);
//! assert_eq!(report.metrics.complexity_score, 2);
//! ```

use crate::syntax::{parse_python, text, walk};
use evolve_core::ComplexityConfig;
use serde::Serialize;
use tree_sitter::Node;

/// Warning attached to a loop that looks non-terminating.
pub const INFINITE_LOOP_WARNING: &str = "Potential infinite loop detected";

/// Counts gathered from one source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplexityMetrics {
    /// Non-blank lines
    pub lines: usize,
    /// Function definitions, including methods
    pub functions: usize,
    /// Class definitions
    pub classes: usize,
    /// `for` and `while` loops
    pub loops: usize,
    /// `if` and `elif` branches
    pub conditionals: usize,
    /// loops + conditionals + functions
    pub complexity_score: usize,
}

/// Outcome of a complexity analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexityReport {
    /// Ceilings exceeded; each one is a failure
    pub issues: Vec<String>,
    /// Heuristic findings that do not fail the analysis
    pub warnings: Vec<String>,
    /// Collected metrics; all zero when the code does not parse
    pub metrics: ComplexityMetrics,
}

impl ComplexityReport {
    /// Returns `true` if no ceiling was exceeded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Computes metrics and checks them against configured ceilings.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    config: ComplexityConfig,
}

impl ComplexityAnalyzer {
    /// Creates an analyzer with the given ceilings.
    #[must_use]
    pub const fn new(config: &ComplexityConfig) -> Self {
        Self { config: *config }
    }

    /// Analyzes `code`.
    ///
    /// Unparseable code yields a single issue and zeroed metrics.
    #[must_use]
    pub fn analyze(&self, code: &str) -> ComplexityReport {
        let tree = match parse_python(code) {
            Ok(tree) => tree,
            Err(err) => {
                return ComplexityReport {
                    issues: vec![format!("Syntax error in complexity analysis: {err}")],
                    ..ComplexityReport::default()
                };
            }
        };

        let mut metrics = ComplexityMetrics {
            lines: code.lines().filter(|l| !l.trim().is_empty()).count(),
            ..ComplexityMetrics::default()
        };
        let mut warnings = Vec::new();

        walk(tree.root_node(), |node| match node.kind() {
            "function_definition" => metrics.functions += 1,
            "class_definition" => metrics.classes += 1,
            "for_statement" => metrics.loops += 1,
            "while_statement" => {
                metrics.loops += 1;
                if is_always_true(node, code) && !has_exit(node) {
                    warnings.push(INFINITE_LOOP_WARNING.to_string());
                }
            }
            "if_statement" | "elif_clause" => metrics.conditionals += 1,
            _ => {}
        });
        metrics.complexity_score = metrics.loops + metrics.conditionals + metrics.functions;

        let config = &self.config;
        let mut issues = Vec::new();
        if metrics.lines > config.max_lines {
            issues.push(format!(
                "Code too long: {} lines (max {})",
                metrics.lines, config.max_lines
            ));
        }
        if metrics.functions > config.max_functions {
            issues.push(format!(
                "Too many functions: {} (max {})",
                metrics.functions, config.max_functions
            ));
        }
        if metrics.complexity_score > config.max_complexity {
            issues.push(format!(
                "Code too complex: score {} (max {})",
                metrics.complexity_score, config.max_complexity
            ));
        }

        ComplexityReport {
            issues,
            warnings,
            metrics,
        }
    }
}

/// `while True:` or `while <non-zero integer literal>:`
fn is_always_true(loop_node: Node<'_>, code: &str) -> bool {
    let Some(condition) = loop_node.child_by_field_name("condition") else {
        return false;
    };
    match condition.kind() {
        "true" => true,
        "integer" => !text(condition, code).trim_start_matches(['0', '_']).is_empty(),
        _ => false,
    }
}

/// Looks for a `break` that targets this loop, or a `return`/`raise` in it.
///
/// Nested loops own their own `break`s; nested function and class bodies
/// exit nothing.
fn has_exit(loop_node: Node<'_>) -> bool {
    let Some(body) = loop_node.child_by_field_name("body") else {
        return false;
    };
    exits(body, false)
}

fn exits(node: Node<'_>, in_nested_loop: bool) -> bool {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).any(|child| match child.kind() {
        "break_statement" => !in_nested_loop,
        "return_statement" | "raise_statement" => true,
        "function_definition" | "class_definition" | "lambda" => false,
        "while_statement" | "for_statement" => exits(child, true),
        _ => exits(child, in_nested_loop),
    })
}
