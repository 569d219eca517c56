//! Syntax-tree scan of Python code for disallowed constructs.
//!
//! The scanner walks the whole tree and reports every match, so one pass
//! shows the full violation set. Source that does not parse fails closed.
//!
//! # Examples
//!
//! ```
//! use evolve_core::ScannerConfig;
//! use evolve_validator::StaticScanner;
//!
//! let scanner = StaticScanner::new(&ScannerConfig::default());
//!
//! let report = scanner.scan("import os\nos.system('ls')\n");
//! assert_eq!(
//!     report.violations,
//!     [
//!         "Dangerous import: os",
//!         "Import not in allowed list: os",
//!         "Dangerous module usage: os.system",
//!     ]
//! );
//!
//! assert!(scanner.scan("import json\nprint(json.dumps({}))\n").is_clean());
//! ```

use crate::ScanReport;
use crate::syntax::{parse_python, text, walk};
use evolve_core::ScannerConfig;
use std::collections::HashSet;
use tree_sitter::Node;

/// Static scanner configured with danger lists and an import allow-list.
#[derive(Debug, Clone)]
pub struct StaticScanner {
    dangerous_functions: HashSet<String>,
    dangerous_modules: HashSet<String>,
    dangerous_attributes: HashSet<String>,
    allowed_imports: HashSet<String>,
}

impl StaticScanner {
    /// Builds a scanner from the configured lists.
    #[must_use]
    pub fn new(config: &ScannerConfig) -> Self {
        let set = |items: &[String]| items.iter().cloned().collect::<HashSet<_>>();
        Self {
            dangerous_functions: set(&config.dangerous_functions),
            dangerous_modules: set(&config.dangerous_modules),
            dangerous_attributes: set(&config.dangerous_attributes),
            allowed_imports: set(&config.allowed_imports),
        }
    }

    /// Scans `code`, returning every violation found.
    ///
    /// A parse failure yields a single `Syntax error: ...` violation.
    #[must_use]
    pub fn scan(&self, code: &str) -> ScanReport {
        let tree = match parse_python(code) {
            Ok(tree) => tree,
            Err(err) => {
                return ScanReport {
                    violations: vec![err.to_string()],
                };
            }
        };

        let mut violations = Vec::new();
        walk(tree.root_node(), |node| match node.kind() {
            "call" => self.check_call(node, code, &mut violations),
            "import_statement" => self.check_import(node, code, &mut violations),
            "import_from_statement" => self.check_from_import(node, code, &mut violations),
            "attribute" => self.check_attribute(node, code, &mut violations),
            _ => {}
        });

        ScanReport { violations }
    }

    fn check_call(&self, node: Node<'_>, code: &str, violations: &mut Vec<String>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };

        match function.kind() {
            "identifier" => {
                let name = text(function, code);
                if self.dangerous_functions.contains(name) {
                    violations.push(format!("Dangerous function call: {name}"));
                }
            }
            "attribute" => {
                if let (Some(object), Some(attr)) = (
                    function.child_by_field_name("object"),
                    function.child_by_field_name("attribute"),
                ) && object.kind() == "identifier"
                {
                    let module = text(object, code);
                    if self.dangerous_modules.contains(module) {
                        violations.push(format!(
                            "Dangerous module usage: {module}.{}",
                            text(attr, code)
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    fn check_import(&self, node: Node<'_>, code: &str, violations: &mut Vec<String>) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let dotted = if name.kind() == "aliased_import" {
                name.child_by_field_name("name").unwrap_or(name)
            } else {
                name
            };
            let module = text(dotted, code);

            if self.is_dangerous(module) {
                violations.push(format!("Dangerous import: {module}"));
            }
            if !self.is_allowed(module) {
                violations.push(format!("Import not in allowed list: {module}"));
            }
        }
    }

    fn check_from_import(&self, node: Node<'_>, code: &str, violations: &mut Vec<String>) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        // Relative imports name the package's own modules.
        let module = text(module_node, code).trim_start_matches('.');
        if module.is_empty() {
            return;
        }

        if self.is_dangerous(module) {
            violations.push(format!("Dangerous from import: {module}"));
        }
        if !self.is_allowed(module) {
            violations.push(format!("From import not in allowed list: {module}"));
        }
    }

    fn check_attribute(&self, node: Node<'_>, code: &str, violations: &mut Vec<String>) {
        if let Some(attr) = node.child_by_field_name("attribute") {
            let name = text(attr, code);
            if self.dangerous_attributes.contains(name) {
                violations.push(format!("Dangerous attribute access: {name}"));
            }
        }
    }

    fn is_dangerous(&self, module: &str) -> bool {
        self.dangerous_modules.contains(root_package(module))
    }

    fn is_allowed(&self, module: &str) -> bool {
        self.allowed_imports.contains(module) || self.allowed_imports.contains(root_package(module))
    }
}

fn root_package(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(code: &str) -> Vec<String> {
        StaticScanner::new(&ScannerConfig::default()).scan(code).violations
    }

    #[test]
    fn test_clean_code() {
        assert!(scan("print('hi')").is_empty());
        assert!(scan("import math\nfrom collections import Counter\nprint(math.pi)\n").is_empty());
    }

    #[test]
    fn test_dangerous_builtins() {
        assert_eq!(scan("eval('1 + 1')"), ["Dangerous function call: eval"]);
        assert_eq!(
            scan("exec('x = 1')\ndata = open('/etc/passwd').read()\n"),
            ["Dangerous function call: exec", "Dangerous function call: open"]
        );
        assert_eq!(scan("m = __import__('os')"), ["Dangerous function call: __import__"]);
    }

    #[test]
    fn test_import_not_allowed() {
        assert_eq!(scan("import numpy"), ["Import not in allowed list: numpy"]);
        assert_eq!(
            scan("import os"),
            ["Dangerous import: os", "Import not in allowed list: os"]
        );
    }

    #[test]
    fn test_dotted_and_aliased_imports() {
        assert_eq!(
            scan("import os.path as p"),
            ["Dangerous import: os.path", "Import not in allowed list: os.path"]
        );
        assert!(scan("import collections.abc").is_empty());
    }

    #[test]
    fn test_from_imports() {
        assert_eq!(
            scan("from subprocess import run"),
            [
                "Dangerous from import: subprocess",
                "From import not in allowed list: subprocess"
            ]
        );
        assert_eq!(scan("from pandas import DataFrame"), ["From import not in allowed list: pandas"]);
        assert!(scan("from . import helpers").is_empty());
    }

    #[test]
    fn test_dangerous_attributes() {
        assert_eq!(
            scan("f = (lambda: 0).__globals__"),
            ["Dangerous attribute access: __globals__"]
        );
        assert_eq!(
            scan("classes = ().__class__.__bases__[0].__subclasses__()"),
            [
                "Dangerous attribute access: __subclasses__",
                "Dangerous attribute access: __bases__"
            ]
        );
    }

    #[test]
    fn test_all_matches_reported() {
        let violations = scan("import socket\neval(input())\n");
        assert_eq!(
            violations,
            [
                "Dangerous import: socket",
                "Import not in allowed list: socket",
                "Dangerous function call: eval",
                "Dangerous function call: input"
            ]
        );
    }

    #[test]
    fn test_parse_failure_fails_closed() {
        let violations = scan("def broken(:\n    pass");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("Syntax error:"), "{violations:?}");
    }
}
