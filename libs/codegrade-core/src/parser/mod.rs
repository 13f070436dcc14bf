//! Python syntax parsing for the analyzers.
//!
//! `parse` runs tree-sitter over the submission and lowers the result into
//! the owned tree in [`ast`]. Any error or missing node in the concrete tree
//! is reported as a [`ParseError`], as are Python 2 `print`/`exec`
//! statements, so the analyzers never see a partially recovered tree.

pub mod ast;
mod lower;

use thiserror::Error;
use tree_sitter::{Node, Parser};

pub use ast::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn at(node: Node<'_>, message: impl Into<String>) -> Self {
        let position = node.start_position();
        Self {
            message: message.into(),
            line: position.row + 1,
            column: position.column + 1,
        }
    }
}

/// Parse submission text into an owned syntax tree
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseError {
            message: format!("failed to load Python grammar: {}", e),
            line: 0,
            column: 0,
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| ParseError {
        message: "parser produced no tree".to_string(),
        line: 0,
        column: 0,
    })?;
    let root = tree.root_node();

    if let Some(node) = first_error(root) {
        let message = if node.is_missing() {
            format!("invalid syntax: expected '{}'", node.kind())
        } else {
            "invalid syntax".to_string()
        };
        return Err(ParseError::at(node, message));
    }

    if let Some(node) = find_python2_statement(root, source.as_bytes()) {
        let keyword = if node.kind() == "exec_statement" { "exec" } else { "print" };
        return Err(ParseError::at(
            node,
            format!("Missing parentheses in call to '{}'", keyword),
        ));
    }

    Ok(lower::Lowerer::new(source.as_bytes()).module(root))
}

/// First ERROR or MISSING node in document order
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn find_python2_statement<'t>(node: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
    match node.kind() {
        "exec_statement" => return Some(node),
        "print_statement" => {
            // `print (x)` can come out of the grammar as a statement; only the
            // unparenthesized form is Python 2
            let text = node.utf8_text(source).unwrap_or_default();
            let rest = text.trim_start_matches("print").trim_start();
            if !rest.starts_with('(') {
                return Some(node);
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| find_python2_statement(child, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        match parse(source) {
            Ok(module) => module,
            Err(e) => panic!("expected {:?} to parse, got {}", source, e),
        }
    }

    fn only_function(module: &Module) -> &FunctionDef {
        match &module.body[0].kind {
            StmtKind::FunctionDef(def) => def,
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_source_parses() {
        assert!(parse_ok("").body.is_empty());
    }

    #[test]
    fn test_function_definition() {
        let module = parse_ok(
            "def two_sum(nums, target=0, *args, **kwargs):\n    \"\"\"Doc.\"\"\"\n    return nums\n",
        );
        assert_eq!(module.body.len(), 1);

        let def = only_function(&module);
        assert_eq!(def.name, "two_sum");
        let names: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["nums", "target", "args", "kwargs"]);
        assert!(def.params[1].default.is_some());
        assert_eq!(def.body.len(), 2);
        assert!(matches!(
            &def.body[0].kind,
            StmtKind::Expr(Expr { kind: ExprKind::Constant(Constant::Str(s)), .. }) if s == "Doc."
        ));

        let span = module.body[0].span;
        assert_eq!(span.start_line, 1);
        assert_eq!(span.end_line, 3);
    }

    #[test]
    fn test_if_elif_else_branches() {
        let module = parse_ok("if a:\n    x = 1\nelif b:\n    x = 2\nelif c:\n    x = 3\nelse:\n    x = 4\n");
        match &module.body[0].kind {
            StmtKind::If { branches, orelse } => {
                assert_eq!(branches.len(), 3);
                assert_eq!(orelse.len(), 1);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_assignment_keeps_all_targets() {
        let module = parse_ok("a = b = 5\n");
        match &module.body[0].kind {
            StmtKind::Assign { targets, value } => {
                let names: Vec<String> = targets.iter().filter_map(|t| t.dotted_name()).collect();
                assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
                assert!(matches!(value.kind, ExprKind::Constant(Constant::Number { value, .. }) if value == 5.0));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_imports() {
        let module = parse_ok("import os.path, sys as system\nfrom collections import deque, Counter as C\n");
        match &module.body[0].kind {
            StmtKind::Import { names } => {
                assert_eq!(names[0].name, "os.path");
                assert_eq!(names[1].asname.as_deref(), Some("system"));
            }
            other => panic!("expected import, got {:?}", other),
        }
        match &module.body[1].kind {
            StmtKind::ImportFrom { module, names } => {
                assert_eq!(module.as_deref(), Some("collections"));
                assert_eq!(names.len(), 2);
                assert_eq!(names[1].name, "Counter");
                assert_eq!(names[1].asname.as_deref(), Some("C"));
            }
            other => panic!("expected from-import, got {:?}", other),
        }
    }

    #[test]
    fn test_try_handlers() {
        let module = parse_ok(
            "try:\n    f()\nexcept ValueError as e:\n    pass\nexcept:\n    g()\nfinally:\n    h()\n",
        );
        match &module.body[0].kind {
            StmtKind::Try {
                handlers,
                finalbody,
                ..
            } => {
                assert_eq!(handlers.len(), 2);
                assert_eq!(
                    handlers[0].type_.as_ref().and_then(|t| t.dotted_name()).as_deref(),
                    Some("ValueError")
                );
                assert_eq!(handlers[0].name.as_deref(), Some("e"));
                assert!(handlers[1].type_.is_none());
                assert_eq!(finalbody.len(), 1);
            }
            other => panic!("expected try, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_chain_is_flattened() {
        let module = parse_ok("x = a and b and c\n");
        let value = match &module.body[0].kind {
            StmtKind::Assign { value, .. } => value,
            other => panic!("expected assignment, got {:?}", other),
        };
        match &value.kind {
            ExprKind::BoolOp { op, values } => {
                assert_eq!(*op, BoolOperator::And);
                assert_eq!(values.len(), 3);
            }
            other => panic!("expected bool op, got {:?}", other),
        }
    }

    #[test]
    fn test_fstring_is_joined_str() {
        let module = parse_ok("q = f\"SELECT {name}\"\n");
        match &module.body[0].kind {
            StmtKind::Assign { value, .. } => {
                assert!(matches!(value.kind, ExprKind::JoinedStr(_)));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_comprehension_filters() {
        let module = parse_ok("evens = [x for x in xs if x % 2 if x > 0]\n");
        let value = match &module.body[0].kind {
            StmtKind::Assign { value, .. } => value,
            other => panic!("expected assignment, got {:?}", other),
        };
        match &value.kind {
            ExprKind::Comprehension { generators, .. } => {
                assert_eq!(generators.len(), 1);
                assert_eq!(generators[0].ifs.len(), 2);
            }
            other => panic!("expected comprehension, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = parse("def broken(:\n    return 1\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("invalid syntax"));
    }

    #[test]
    fn test_python2_print_is_rejected() {
        let err = parse("x = 1\nprint \"hello\"\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_python3_print_call_parses() {
        let module = parse_ok("print(\"hello\")\n");
        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn test_walk_finds_nested_functions() {
        let module = parse_ok(
            "class Solution:\n    def solve(self):\n        def helper():\n            return 1\n        return helper()\n",
        );
        let names: Vec<&str> = module
            .walk()
            .filter_map(|node| match node {
                NodeRef::Stmt(Stmt {
                    kind: StmtKind::FunctionDef(def),
                    ..
                }) => Some(def.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["solve", "helper"]);
    }
}
