//! Complexity dimension: per-function cyclomatic complexity, nesting depth,
//! direct recursion and hints from well-known container operations.

use crate::parser::{self, walk_from, ExprKind, FunctionDef, Module, NodeRef, ParseError, StmtKind};
use codegrade_common::types::{ComplexityReport, FunctionMetrics, SCORE_WEIGHTS};

/// Score for a submission without any function definitions
pub const NEUTRAL_SCORE: u32 = 50;

/// Call name → hint, in reporting priority
const HINTS: &[(&str, &str)] = &[
    ("sorted", "Uses sorted() - O(n log n) time."),
    ("sort", "Uses list.sort() - O(n log n) in-place."),
    ("set", "Uses set() - O(n) construction, O(1) average lookup."),
    ("dict", "Uses dict() - O(n) construction, O(1) average lookup."),
    ("reversed", "Uses reversed() - O(n) traversal."),
];

fn cyclomatic(function: NodeRef<'_>) -> u32 {
    let mut count = 1;
    for node in walk_from(function) {
        count += match node {
            NodeRef::Stmt(stmt) => match &stmt.kind {
                StmtKind::If { branches, .. } => branches.len() as u32,
                StmtKind::For { .. }
                | StmtKind::While { .. }
                | StmtKind::With { .. }
                | StmtKind::Assert { .. } => 1,
                _ => 0,
            },
            NodeRef::Handler(_) => 1,
            NodeRef::Expr(expr) => match &expr.kind {
                ExprKind::BoolOp { values, .. } => values.len().saturating_sub(1) as u32,
                ExprKind::Comprehension { generators, .. } => {
                    generators.iter().map(|g| g.ifs.len() as u32).sum()
                }
                _ => 0,
            },
        };
    }
    count
}

/// Deepest nesting of loops and conditionals below `node`.
/// Each `elif` opens one more level than the branch before it, and the
/// trailing `else` shares the level of the last branch.
fn nesting_depth(node: NodeRef<'_>, depth: u32) -> u32 {
    if let NodeRef::Stmt(stmt) = node {
        if let StmtKind::If { branches, orelse } = &stmt.kind {
            let mut deepest = depth;
            for (k, (test, body)) in branches.iter().enumerate() {
                let level = depth + 1 + k as u32;
                deepest = deepest.max(nesting_depth(NodeRef::Expr(test), level));
                for child in body {
                    deepest = deepest.max(nesting_depth(NodeRef::Stmt(child), level));
                }
            }
            let else_level = depth + branches.len() as u32;
            for child in orelse {
                deepest = deepest.max(nesting_depth(NodeRef::Stmt(child), else_level));
            }
            return deepest;
        }
    }

    let inner = match node {
        NodeRef::Stmt(stmt) if matches!(stmt.kind, StmtKind::For { .. } | StmtKind::While { .. }) => {
            depth + 1
        }
        _ => depth,
    };
    node.children()
        .into_iter()
        .map(|child| nesting_depth(child, inner))
        .fold(inner, u32::max)
}

fn is_recursive(function: NodeRef<'_>, name: &str) -> bool {
    walk_from(function).any(|node| match node {
        NodeRef::Expr(expr) => match &expr.kind {
            ExprKind::Call { func, .. } => {
                matches!(&func.kind, ExprKind::Name(callee) if callee == name)
            }
            _ => false,
        },
        _ => false,
    })
}

fn function_metrics(node: NodeRef<'_>, def: &FunctionDef) -> FunctionMetrics {
    FunctionMetrics {
        name: def.name.clone(),
        cyclomatic: cyclomatic(node),
        max_nesting_depth: nesting_depth(node, 0),
        is_recursive: is_recursive(node, &def.name),
        line_count: node.span().line_count(),
    }
}

fn builtin_hints(module: &Module) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for node in module.walk() {
        let NodeRef::Expr(expr) = node else { continue };
        let ExprKind::Call { func, .. } = &expr.kind else { continue };
        let callee = match &func.kind {
            ExprKind::Name(name) => name.as_str(),
            ExprKind::Attribute { attr, .. } => attr.as_str(),
            _ => continue,
        };
        if let Some((_, hint)) = HINTS.iter().find(|(name, _)| *name == callee) {
            if !found.iter().any(|h| h == hint) {
                found.push(hint.to_string());
            }
        }
    }
    found
}

/// Score of one function: starts at 100, penalized for branching and nesting
pub fn function_score(metrics: &FunctionMetrics) -> u32 {
    let c = metrics.cyclomatic as i64;
    let mut score: i64 = 100;

    if c > 10 {
        score -= ((c - 10) * 5).min(30);
        score -= ((c - 5) * 3).min(20);
    } else if c > 5 {
        score -= ((c - 5) * 4).min(20);
    }

    let depth = metrics.max_nesting_depth as i64;
    if depth > 2 {
        score -= ((depth - 2) * 10).min(30);
    }

    score.max(0) as u32
}

fn overall_score(functions: &[FunctionMetrics]) -> u32 {
    if functions.is_empty() {
        return NEUTRAL_SCORE;
    }
    let total: u32 = functions.iter().map(function_score).sum();
    total / functions.len() as u32
}

fn warnings(functions: &[FunctionMetrics]) -> Vec<String> {
    let mut warnings = Vec::new();
    for m in functions {
        if m.cyclomatic > 10 {
            warnings.push(format!(
                "'{}' has high cyclomatic complexity ({}). Consider breaking it into smaller functions.",
                m.name, m.cyclomatic
            ));
        }
        if m.max_nesting_depth > 3 {
            warnings.push(format!(
                "'{}' has deep nesting (depth={}). This often indicates O(n^k) time complexity.",
                m.name, m.max_nesting_depth
            ));
        }
        if m.is_recursive {
            warnings.push(format!(
                "'{}' is recursive. Ensure base cases are correct and consider memoisation for overlapping subproblems.",
                m.name
            ));
        }
    }
    warnings
}

/// Complexity report for an already parsed submission
pub fn analyze(module: &Module) -> ComplexityReport {
    // Breadth-first, so top-level functions come before methods and closures
    let functions: Vec<FunctionMetrics> = module
        .walk()
        .filter_map(|node| match node {
            NodeRef::Stmt(stmt) => match &stmt.kind {
                StmtKind::FunctionDef(def) => Some(function_metrics(node, def)),
                _ => None,
            },
            _ => None,
        })
        .collect();

    let score = overall_score(&functions);
    let summary = if functions.is_empty() {
        "No top-level functions detected.".to_string()
    } else {
        let average = functions.iter().map(|m| m.cyclomatic as f64).sum::<f64>()
            / functions.len() as f64;
        let verdict = if score >= 80 {
            "No major complexity issues detected."
        } else {
            "Complexity issues found, see warnings."
        };
        format!(
            "Analysed {} function(s). Average cyclomatic complexity: {:.1}. {}",
            functions.len(),
            average,
            verdict
        )
    };

    ComplexityReport {
        score,
        weight: SCORE_WEIGHTS.complexity,
        summary,
        warnings: warnings(&functions),
        builtin_hints: builtin_hints(module),
        functions,
    }
}

/// Degraded report for a submission that does not parse
pub fn parse_failure(error: &ParseError) -> ComplexityReport {
    ComplexityReport {
        score: 0,
        weight: SCORE_WEIGHTS.complexity,
        summary: format!("Syntax error, could not parse: {}", error),
        functions: Vec::new(),
        builtin_hints: Vec::new(),
        warnings: vec![error.to_string()],
    }
}

pub fn evaluate_complexity(source: &str) -> ComplexityReport {
    match parser::parse(source) {
        Ok(module) => analyze(&module),
        Err(e) => parse_failure(&e),
    }
}
