//! Security dimension.
//!
//! Tree checks look for dangerous calls and security-gating assertions; text
//! checks scan the raw source for hardcoded credentials and interpolated
//! query strings. Text checks still run when the submission does not parse.

use crate::parser::{self, Constant, Expr, ExprKind, Module, NodeRef, ParseError, StmtKind};
use codegrade_common::types::{Finding, SecurityReport, Severity, SCORE_WEIGHTS};
use lazy_static::lazy_static;
use regex::Regex;

/// Builtins that are dangerous whenever they are called
const DANGEROUS_BUILTINS: &[(&str, Severity, &str)] = &[
    (
        "eval",
        Severity::Critical,
        "eval() executes arbitrary code. Never use on untrusted input.",
    ),
    (
        "exec",
        Severity::Critical,
        "exec() executes arbitrary code. Never use on untrusted input.",
    ),
    (
        "__import__",
        Severity::High,
        "__import__() bypasses normal import controls.",
    ),
];

/// (module, function) pairs that are unsafe on untrusted input
const DANGEROUS_APIS: &[(&str, &str, Severity, &str)] = &[
    (
        "os",
        "system",
        Severity::High,
        "os.system() is vulnerable to shell injection. Use subprocess with a list.",
    ),
    (
        "os",
        "popen",
        Severity::High,
        "os.popen() is vulnerable to shell injection.",
    ),
    (
        "subprocess",
        "call",
        Severity::Medium,
        "subprocess.call() with shell=True is vulnerable to injection.",
    ),
    (
        "subprocess",
        "Popen",
        Severity::Medium,
        "subprocess.Popen: ensure shell=False and avoid string commands.",
    ),
    (
        "pickle",
        "loads",
        Severity::High,
        "pickle.loads() on untrusted data enables arbitrary code execution.",
    ),
    (
        "pickle",
        "load",
        Severity::High,
        "pickle.load() on untrusted data enables arbitrary code execution.",
    ),
    (
        "marshal",
        "loads",
        Severity::High,
        "marshal.loads() deserialises bytecode, never use on untrusted data.",
    ),
    (
        "yaml",
        "load",
        Severity::Medium,
        "yaml.load() without Loader= is unsafe. Use yaml.safe_load().",
    ),
];

const SECURITY_KEYWORDS: [&str; 7] = [
    "auth",
    "admin",
    "permission",
    "valid",
    "token",
    "role",
    "access",
];

lazy_static! {
    static ref SECRET_PATTERNS: Vec<(Regex, &'static str)> = vec![
        (
            Regex::new(r#"(?i)(password|passwd|pwd)\s*=\s*['"].{3,}['"]"#).unwrap(),
            "Hardcoded password",
        ),
        (
            Regex::new(r#"(?i)(api_key|apikey|secret_key)\s*=\s*['"].{8,}['"]"#).unwrap(),
            "Hardcoded API key",
        ),
        (
            Regex::new(r#"(?i)(token)\s*=\s*['"][a-zA-Z0-9+/=]{16,}['"]"#).unwrap(),
            "Hardcoded token",
        ),
        (
            Regex::new(r#"(?i)aws_secret_access_key\s*=\s*['"].+['"]"#).unwrap(),
            "Hardcoded AWS secret",
        ),
    ];
    static ref QUERY_INTERPOLATION: Regex = Regex::new(
        r#"(?i)(execute|executemany|raw|cursor\.execute)\s*\(\s*[f"'].*(%s|\{|\}|format|%\s*\(|\+)"#
    )
    .unwrap();
}

pub fn deduction(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 30,
        Severity::High => 15,
        Severity::Medium => 8,
        Severity::Low => 3,
    }
}

fn finding(severity: Severity, category: &str, description: impl Into<String>, line: usize) -> Finding {
    Finding {
        severity,
        category: category.to_string(),
        description: description.into(),
        line,
    }
}

fn is_truthy_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Constant(constant) => match constant {
            Constant::None => false,
            Constant::Bool(value) => *value,
            Constant::Number { value, .. } => *value != 0.0,
            Constant::Str(s) | Constant::Bytes(s) => !s.is_empty(),
            Constant::Complex(_) | Constant::Ellipsis => true,
        },
        _ => false,
    }
}

fn check_dangerous_calls(module: &Module) -> Vec<Finding> {
    let mut findings = Vec::new();
    for node in module.walk() {
        let NodeRef::Expr(call) = node else { continue };
        let ExprKind::Call { func, keywords, .. } = &call.kind else { continue };
        let line = call.span.start_line;

        match &func.kind {
            ExprKind::Name(name) => {
                if let Some((_, severity, description)) =
                    DANGEROUS_BUILTINS.iter().find(|(builtin, ..)| builtin == name)
                {
                    findings.push(finding(*severity, "DangerousBuiltin", *description, line));
                }
            }
            ExprKind::Attribute { value, attr } => {
                let ExprKind::Name(module_name) = &value.kind else { continue };
                let Some((_, _, severity, description)) = DANGEROUS_APIS
                    .iter()
                    .find(|(m, f, ..)| m == module_name && f == attr)
                else {
                    continue;
                };
                findings.push(finding(*severity, "DangerousAPI", *description, line));

                let shell = keywords
                    .iter()
                    .any(|k| k.arg.as_deref() == Some("shell") && is_truthy_literal(&k.value));
                if module_name == "subprocess" && shell {
                    findings.push(finding(
                        Severity::High,
                        "ShellInjection",
                        "subprocess called with shell=True, vulnerable to shell injection if input is user-controlled.",
                        line,
                    ));
                }
            }
            _ => {}
        }
    }
    findings
}

fn check_security_asserts(module: &Module, source: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for node in module.walk() {
        let NodeRef::Stmt(stmt) = node else { continue };
        let StmtKind::Assert { test, .. } = &stmt.kind else { continue };
        let Some(condition) = source.get(test.span.start_byte..test.span.end_byte) else {
            continue;
        };
        let condition = condition.to_lowercase();
        if SECURITY_KEYWORDS.iter().any(|kw| condition.contains(kw)) {
            let line = stmt.span.start_line;
            findings.push(finding(
                Severity::High,
                "AssertForSecurity",
                format!(
                    "assert used for security check at line {}. Assertions are stripped with `python -O`. Use explicit if/raise.",
                    line
                ),
                line,
            ));
        }
    }
    findings
}

fn line_of(source: &str, byte_offset: usize) -> usize {
    source.as_bytes()[..byte_offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}

fn check_hardcoded_secrets(source: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (pattern, label) in SECRET_PATTERNS.iter() {
        for m in pattern.find_iter(source) {
            let line = line_of(source, m.start());
            findings.push(finding(
                Severity::Critical,
                "HardcodedSecret",
                format!(
                    "{} detected at line {}. Store secrets in environment variables or a secrets manager.",
                    label, line
                ),
                line,
            ));
        }
    }
    findings
}

fn check_query_interpolation(source: &str) -> Vec<Finding> {
    QUERY_INTERPOLATION
        .find_iter(source)
        .map(|m| {
            let line = line_of(source, m.start());
            finding(
                Severity::High,
                "SQLInjection",
                format!(
                    "Possible SQL injection at line {}. Use parameterised queries instead of string formatting.",
                    line
                ),
                line,
            )
        })
        .collect()
}

fn summarize(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No security issues detected.".to_string();
    }
    let parts: Vec<String> = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        .iter()
        .filter_map(|severity| {
            let count = findings.iter().filter(|f| f.severity == *severity).count();
            (count > 0).then(|| format!("{} {}", count, severity))
        })
        .collect();
    format!(
        "Found {} security finding(s): {}.",
        findings.len(),
        parts.join(", ")
    )
}

fn build_report(findings: Vec<Finding>, summary: String) -> SecurityReport {
    let total_deduction: u32 = findings.iter().map(|f| deduction(f.severity)).sum();
    SecurityReport {
        score: 100u32.saturating_sub(total_deduction),
        weight: SCORE_WEIGHTS.security,
        summary,
        findings,
    }
}

/// Full report: tree checks followed by text checks
pub fn analyze(module: &Module, source: &str) -> SecurityReport {
    let mut findings = check_dangerous_calls(module);
    findings.extend(check_security_asserts(module, source));
    findings.extend(check_hardcoded_secrets(source));
    findings.extend(check_query_interpolation(source));

    let summary = summarize(&findings);
    build_report(findings, summary)
}

/// Text checks only, for a submission that does not parse
pub fn parse_failure(error: &ParseError, source: &str) -> SecurityReport {
    let mut findings = check_hardcoded_secrets(source);
    findings.extend(check_query_interpolation(source));

    let summary = format!(
        "{} Syntax error, tree-based checks skipped: {}",
        summarize(&findings),
        error
    );
    build_report(findings, summary)
}

pub fn evaluate_security(source: &str) -> SecurityReport {
    match parser::parse(source) {
        Ok(module) => analyze(&module, source),
        Err(e) => parse_failure(&e, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(report: &SecurityReport) -> Vec<&str> {
        report.findings.iter().map(|f| f.category.as_str()).collect()
    }

    #[test]
    fn test_clean_submission() {
        let report = evaluate_security("def add(a, b):\n    return a + b\n");
        assert_eq!(report.score, 100);
        assert!(report.findings.is_empty());
        assert_eq!(report.summary, "No security issues detected.");
    }

    #[test]
    fn test_eval_is_critical() {
        let report = evaluate_security("def run(user_input):\n    return eval(user_input)\n");
        assert_eq!(report.findings.len(), 1);
        let f = &report.findings[0];
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.category, "DangerousBuiltin");
        assert_eq!(f.line, 2);
        assert_eq!(report.score, 70);
        assert_eq!(report.summary, "Found 1 security finding(s): 1 critical.");
    }

    #[test]
    fn test_dangerous_apis_and_shell_injection() {
        let code = r#"
import os, subprocess, pickle
os.system("ls")
subprocess.call(cmd, shell=True)
subprocess.Popen(["ls"], shell=False)
data = pickle.loads(blob)
helper.system("ls")
"#;
        let report = evaluate_security(code);
        assert_eq!(
            categories(&report),
            vec!["DangerousAPI", "DangerousAPI", "ShellInjection", "DangerousAPI", "DangerousAPI"]
        );
        let shell = &report.findings[2];
        assert_eq!(shell.severity, Severity::High);
        assert_eq!(shell.line, 4);
        // high + medium + high + medium + high
        assert_eq!(report.score, 100 - 15 - 8 - 8 - 15 - 15);
        assert_eq!(report.summary, "Found 5 security finding(s): 3 high, 2 medium.");
    }

    #[test]
    fn test_assert_for_security() {
        let code = "def delete(user):\n    assert user.is_admin()\n    assert len(user.name) > 0\n    return True\n";
        let report = evaluate_security(code);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].category, "AssertForSecurity");
        assert_eq!(report.findings[0].line, 2);
        assert!(report.findings[0].description.contains("python -O"));
    }

    #[test]
    fn test_hardcoded_secrets() {
        let code = "API_KEY = 'sk-1234567890abcdef'\npassword = \"hunter22\"\nname = 'x'\n";
        let report = evaluate_security(code);
        let lines: Vec<usize> = report.findings.iter().map(|f| f.line).collect();
        assert_eq!(categories(&report), vec!["HardcodedSecret", "HardcodedSecret"]);
        // password pattern is checked before the api key pattern
        assert_eq!(lines, vec![2, 1]);
        assert!(report.findings[0].description.starts_with("Hardcoded password detected at line 2."));
        assert_eq!(report.score, 40);
    }

    #[test]
    fn test_query_interpolation() {
        let code = r#"
def find(cursor, name):
    cursor.execute(f"SELECT * FROM users WHERE name = '{name}'")
    cursor.execute("SELECT * FROM users WHERE id = " + name)
    cursor.execute("SELECT * FROM users WHERE id = ?", (name,))
"#;
        let report = evaluate_security(code);
        let lines: Vec<usize> = report.findings.iter().map(|f| f.line).collect();
        assert_eq!(categories(&report), vec!["SQLInjection", "SQLInjection"]);
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_findings_ordered_by_source() {
        let code = "token = 'abcdefghijklmnop1234'\nassert token_valid\nexec(code)\n";
        let report = evaluate_security(code);
        assert_eq!(
            categories(&report),
            vec!["DangerousBuiltin", "AssertForSecurity", "HardcodedSecret"]
        );
    }

    #[test]
    fn test_parse_failure_runs_text_checks() {
        let code = "password = 'letmein'\ndef broken(:\n    eval(x)\n";
        let report = evaluate_security(code);
        assert_eq!(categories(&report), vec!["HardcodedSecret"]);
        assert_eq!(report.score, 70);
        assert!(report.summary.starts_with("Found 1 security finding(s): 1 critical."));
        assert!(report.summary.contains("Syntax error, tree-based checks skipped"));
    }

    #[test]
    fn test_score_floors_at_zero() {
        let code: String = (0..5).map(|i| format!("eval('{}')\n", i)).collect();
        let report = evaluate_security(&code);
        assert_eq!(report.findings.len(), 5);
        assert_eq!(report.score, 0);
    }
}
