//! Style dimension: naming, docstrings, magic numbers, line length,
//! exception anti-patterns, mutable defaults and unused imports.

use crate::parser::{
    self, Constant, Expr, ExprKind, Module, NodeRef, ParseError, Stmt, StmtKind,
};
use codegrade_common::types::{StyleCategory, StyleReport, SCORE_WEIGHTS};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

pub const MAX_LINE_LENGTH: usize = 100;

/// Numeric literals that never count as magic
const ALLOWED_NUMBERS: [f64; 6] = [0.0, 1.0, -1.0, 2.0, 10.0, 100.0];

lazy_static! {
    static ref SNAKE_CASE: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
}

/// Points deducted per violation
pub fn deduction(category: StyleCategory) -> u32 {
    match category {
        StyleCategory::NamingConvention => 3,
        StyleCategory::MagicNumber => 2,
        StyleCategory::MissingDocstring => 4,
        StyleCategory::LineTooLong => 1,
        StyleCategory::EmptyExcept => 8,
        StyleCategory::BareExcept => 6,
        StyleCategory::MutableDefault => 7,
        StyleCategory::UnusedImport => 3,
    }
}

/// Python's `str.isupper`: at least one cased character and no lowercase ones
fn is_upper(name: &str) -> bool {
    name.chars().any(char::is_uppercase) && !name.chars().any(char::is_lowercase)
}

fn follows_naming(name: &str) -> bool {
    name.starts_with('_') || SNAKE_CASE.is_match(name) || is_upper(name)
}

/// Names bound by an assignment target, unpacking tuples, lists and starred items
fn bound_names<'a>(target: &'a Expr, out: &mut Vec<&'a Expr>) {
    match &target.kind {
        ExprKind::Name(_) => out.push(target),
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            for item in items {
                bound_names(item, out);
            }
        }
        ExprKind::Starred(inner) => bound_names(inner, out),
        _ => {}
    }
}

fn store_targets<'a>(node: NodeRef<'a>) -> Vec<&'a Expr> {
    let mut names = Vec::new();
    match node {
        NodeRef::Stmt(stmt) => match &stmt.kind {
            StmtKind::Assign { targets, .. } => {
                for target in targets {
                    bound_names(target, &mut names);
                }
            }
            StmtKind::AugAssign { target, .. }
            | StmtKind::AnnAssign { target, .. }
            | StmtKind::For { target, .. } => bound_names(target, &mut names),
            StmtKind::With { items, .. } => {
                for target in items.iter().filter_map(|item| item.target.as_ref()) {
                    bound_names(target, &mut names);
                }
            }
            _ => {}
        },
        NodeRef::Expr(expr) => match &expr.kind {
            ExprKind::Comprehension { generators, .. } => {
                for generator in generators {
                    bound_names(&generator.target, &mut names);
                }
            }
            ExprKind::NamedExpr { target, .. } => bound_names(target, &mut names),
            _ => {}
        },
        NodeRef::Handler(_) => {}
    }
    names
}

fn check_naming(module: &Module) -> Vec<String> {
    let mut violations = Vec::new();
    let mut flag = |kind: &str, name: &str, line: usize| {
        if !follows_naming(name) {
            violations.push(format!(
                "{} '{}' at line {} should use snake_case (PEP 8).",
                kind, name, line
            ));
        }
    };

    for node in module.walk() {
        if let NodeRef::Stmt(Stmt {
            kind: StmtKind::FunctionDef(def),
            span,
        }) = node
        {
            flag("Function", &def.name, span.start_line);
        }
        for target in store_targets(node) {
            if let ExprKind::Name(name) = &target.kind {
                flag("Variable", name, target.span.start_line);
            }
        }
    }
    violations
}

fn has_docstring(body: &[Stmt]) -> bool {
    matches!(
        body.first().map(|stmt| &stmt.kind),
        Some(StmtKind::Expr(Expr {
            kind: ExprKind::Constant(Constant::Str(_)),
            ..
        }))
    )
}

fn check_docstrings(module: &Module) -> Vec<String> {
    module
        .walk()
        .filter_map(|node| {
            let NodeRef::Stmt(stmt) = node else { return None };
            let (name, body) = match &stmt.kind {
                StmtKind::FunctionDef(def) => (&def.name, &def.body),
                StmtKind::ClassDef { name, body, .. } => (name, body),
                _ => return None,
            };
            (!has_docstring(body)).then(|| {
                format!(
                    "'{}' at line {} is missing a docstring.",
                    name, stmt.span.start_line
                )
            })
        })
        .collect()
}

fn check_magic_numbers(module: &Module) -> Vec<String> {
    module
        .walk()
        .filter_map(|node| match node {
            NodeRef::Expr(Expr {
                kind: ExprKind::Constant(Constant::Number { value, display }),
                span,
            }) if !ALLOWED_NUMBERS.contains(value) => Some(format!(
                "Magic number '{}' at line {}. Consider extracting to a named constant.",
                display, span.start_line
            )),
            _ => None,
        })
        .collect()
}

fn check_line_lengths(source: &str) -> Vec<String> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let length = line.trim_end().chars().count();
            (length > MAX_LINE_LENGTH).then(|| {
                format!(
                    "Line {} is {} characters (limit: {}).",
                    i + 1,
                    length,
                    MAX_LINE_LENGTH
                )
            })
        })
        .collect()
}

/// Bare handlers first, then typed handlers that only `pass`
fn check_handlers(module: &Module) -> (Vec<String>, Vec<String>) {
    let mut bare = Vec::new();
    let mut empty = Vec::new();
    for node in module.walk() {
        let NodeRef::Handler(handler) = node else { continue };
        let line = handler.span.start_line;
        if handler.type_.is_none() {
            bare.push(format!(
                "Bare `except:` at line {} catches ALL exceptions including SystemExit and KeyboardInterrupt. Be specific.",
                line
            ));
        } else if matches!(handler.body.as_slice(), [Stmt { kind: StmtKind::Pass, .. }]) {
            empty.push(format!(
                "`except` at line {} has an empty body (`pass`). Silently swallowing exceptions hides bugs.",
                line
            ));
        }
    }
    (bare, empty)
}

fn check_mutable_defaults(module: &Module) -> Vec<String> {
    let mut violations = Vec::new();
    for node in module.walk() {
        let NodeRef::Stmt(Stmt {
            kind: StmtKind::FunctionDef(def),
            span,
        }) = node
        else {
            continue;
        };
        for default in def.params.iter().filter_map(|p| p.default.as_ref()) {
            let literal = match default.kind {
                ExprKind::List(_) => "list",
                ExprKind::Dict { .. } => "dict",
                ExprKind::Set(_) => "set",
                _ => continue,
            };
            violations.push(format!(
                "'{}' at line {} uses a mutable default argument ({} literal). Use `None` and initialise inside.",
                def.name, span.start_line, literal
            ));
        }
    }
    violations
}

/// Plain substring count: `re` counts as used by any `return`
fn occurrences(source: &str, name: &str) -> usize {
    source.matches(name).count()
}

fn check_unused_imports(module: &Module, source: &str) -> Vec<String> {
    let mut violations = Vec::new();
    for node in module.walk() {
        let NodeRef::Stmt(stmt) = node else { continue };
        let line = stmt.span.start_line;
        match &stmt.kind {
            StmtKind::Import { names } => {
                for alias in names {
                    let bound = alias
                        .asname
                        .as_deref()
                        .unwrap_or_else(|| alias.name.split('.').next().unwrap_or(&alias.name));
                    if occurrences(source, bound) <= 1 {
                        violations.push(format!(
                            "Import '{}' at line {} appears unused.",
                            alias.name, line
                        ));
                    }
                }
            }
            StmtKind::ImportFrom { module: from, names } => {
                for alias in names {
                    let bound = alias.asname.as_deref().unwrap_or(&alias.name);
                    if bound != "*" && occurrences(source, bound) <= 1 {
                        violations.push(format!(
                            "Import '{}' from '{}' at line {} appears unused.",
                            alias.name,
                            from.as_deref().unwrap_or("."),
                            line
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    violations
}

/// Style report for an already parsed submission
pub fn analyze(module: &Module, source: &str) -> StyleReport {
    let (bare, empty) = check_handlers(module);
    let checks = [
        (StyleCategory::NamingConvention, check_naming(module)),
        (StyleCategory::MissingDocstring, check_docstrings(module)),
        (StyleCategory::MagicNumber, check_magic_numbers(module)),
        (StyleCategory::LineTooLong, check_line_lengths(source)),
        (StyleCategory::EmptyExcept, empty),
        (StyleCategory::BareExcept, bare),
        (StyleCategory::MutableDefault, check_mutable_defaults(module)),
        (StyleCategory::UnusedImport, check_unused_imports(module, source)),
    ];

    let violations: BTreeMap<StyleCategory, Vec<String>> = checks
        .into_iter()
        .filter(|(_, found)| !found.is_empty())
        .collect();

    let total_violations: usize = violations.values().map(Vec::len).sum();
    let total_deduction: u32 = violations
        .iter()
        .map(|(category, found)| deduction(*category) * found.len() as u32)
        .sum();

    let summary = if total_violations > 0 {
        format!(
            "Found {} style violation(s) across {} category/categories.",
            total_violations,
            violations.len()
        )
    } else {
        "No style violations detected. Clean code!".to_string()
    };

    StyleReport {
        score: 100u32.saturating_sub(total_deduction),
        weight: SCORE_WEIGHTS.style,
        summary,
        total_violations,
        violations,
    }
}

pub fn parse_failure(error: &ParseError) -> StyleReport {
    StyleReport {
        score: 0,
        weight: SCORE_WEIGHTS.style,
        summary: format!("Syntax error, style checks skipped: {}", error),
        total_violations: 0,
        violations: BTreeMap::new(),
    }
}

pub fn evaluate_style(source: &str) -> StyleReport {
    match parser::parse(source) {
        Ok(module) => analyze(&module, source),
        Err(e) => parse_failure(&e),
    }
}
