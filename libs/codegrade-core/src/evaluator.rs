/// Test Evaluator - Scoring Logic for Returned Values
///
/// **Core Responsibility:**
/// Compare values returned by the submission against expected values and
/// assign a weighted score.
///
/// **Critical Properties:**
/// - Knows nothing about processes or containers
/// - Knows nothing about Redis
/// - Pure function: (run outcomes, test cases) → scores
///
/// **Comparison Rules:**
/// - Expected null requires actual null
/// - If either side is a float, compare numerically with tolerance 1e-6
/// - Order-insensitive cases compare lists as multisets
/// - Otherwise structural equality with Python semantics (1 == 1.0 == true)
///
/// **Scoring Rules:**
/// - score = round(100 × earned weight / total weight), half-up
/// - 100 only when every case passed, 0 only when nothing was earned

use crate::harness::RunOutcome;
use codegrade_common::types::{
    CorrectnessReport, TestCase, TestOutcome, TestStatus, SCORE_WEIGHTS,
};
use serde_json::{Number, Value};
use std::cmp::Ordering;

pub const FLOAT_TOLERANCE: f64 = 1e-6;

/// Python `float(x)` over a JSON value
fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_float(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_f64())
}

enum Numeric {
    Int(i128),
    Float(f64),
}

fn numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Bool(b) => Some(Numeric::Int(i128::from(*b))),
        Value::Number(n) => Some(number_to_numeric(n)),
        _ => None,
    }
}

fn number_to_numeric(n: &Number) -> Numeric {
    if let Some(i) = n.as_i64() {
        Numeric::Int(i128::from(i))
    } else if let Some(u) = n.as_u64() {
        Numeric::Int(i128::from(u))
    } else {
        Numeric::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Python `==` over JSON-decoded values
pub fn py_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return match (x, y) {
            (Numeric::Int(x), Numeric::Int(y)) => x == y,
            (Numeric::Int(i), Numeric::Float(f)) | (Numeric::Float(f), Numeric::Int(i)) => {
                i as f64 == f
            }
            (Numeric::Float(x), Numeric::Float(y)) => x == y,
        };
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| py_eq(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, p)| y.get(key).map(|q| py_eq(p, q)).unwrap_or(false))
        }
        _ => false,
    }
}

/// f64 with a total order, `-0.0` folded into `0.0`
#[derive(Debug, Clone, Copy)]
struct TotalF64(f64);

impl PartialEq for TotalF64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF64 {}

impl PartialOrd for TotalF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0 + 0.0).total_cmp(&(other.0 + 0.0))
    }
}

/// Sort key for values Python can order with `<`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Number(TotalF64),
    Text(String),
    List(Vec<SortKey>),
}

fn sort_key(value: &Value) -> Option<SortKey> {
    match value {
        Value::Bool(b) => Some(SortKey::Number(TotalF64(if *b { 1.0 } else { 0.0 }))),
        Value::Number(n) => n.as_f64().map(|f| SortKey::Number(TotalF64(f))),
        Value::String(s) => Some(SortKey::Text(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(sort_key)
            .collect::<Option<Vec<_>>>()
            .map(SortKey::List),
        _ => None,
    }
}

/// Whether `a < b` is defined: lists compare at their first differing element
fn comparable(a: &SortKey, b: &SortKey) -> bool {
    match (a, b) {
        (SortKey::Number(_), SortKey::Number(_)) | (SortKey::Text(_), SortKey::Text(_)) => true,
        (SortKey::List(x), SortKey::List(y)) => x
            .iter()
            .zip(y)
            .find(|(p, q)| p != q)
            .map(|(p, q)| comparable(p, q))
            .unwrap_or(true),
        _ => false,
    }
}

/// Python `sorted(items)`, or `None` where Python would raise `TypeError`
fn py_sorted(items: &[Value]) -> Option<Vec<&Value>> {
    if items.len() < 2 {
        return Some(items.iter().collect());
    }
    let keys: Vec<SortKey> = items.iter().map(sort_key).collect::<Option<_>>()?;
    for (i, a) in keys.iter().enumerate() {
        if keys[i + 1..].iter().any(|b| !comparable(a, b)) {
            return None;
        }
    }
    let mut keyed: Vec<(SortKey, &Value)> = keys.into_iter().zip(items).collect();
    keyed.sort_by(|x, y| x.0.cmp(&y.0));
    Some(keyed.into_iter().map(|(_, v)| v).collect())
}

fn py_float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        // Rust renders 1e20 / 1e-5; Python writes 1e+20 / 1e-05
        let rendered = format!("{:e}", f);
        if let Some((mantissa, exponent)) = rendered.split_once('e') {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            return format!("{}e{}{:0>2}", mantissa, sign, digits);
        }
        return rendered;
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn py_str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `repr()` of a JSON-decoded value
pub fn py_repr(value: &Value) -> String {
    match value {
        Value::String(s) => py_str_repr(s),
        other => py_str(other),
    }
}

/// Python `str()` of a JSON-decoded value
pub fn py_str(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match number_to_numeric(n) {
            Numeric::Int(i) => i.to_string(),
            Numeric::Float(f) => py_float_repr(f),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(py_repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", py_str_repr(k), py_repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn multiset_eq(actual: &[Value], expected: &[Value]) -> bool {
    if let (Some(a), Some(e)) = (py_sorted(actual), py_sorted(expected)) {
        return a.len() == e.len() && a.iter().zip(&e).all(|(x, y)| py_eq(x, y));
    }
    let mut a: Vec<String> = actual.iter().map(py_str).collect();
    let mut e: Vec<String> = expected.iter().map(py_str).collect();
    a.sort();
    e.sort();
    a == e
}

/// Dimension-aware equality between a returned value and the expected one
pub fn values_match(actual: &Value, expected: &Value, ordered: bool) -> bool {
    if expected.is_null() {
        return actual.is_null();
    }

    if is_float(expected) || is_float(actual) {
        return match (coerce_float(actual), coerce_float(expected)) {
            (Some(a), Some(e)) => (a - e).abs() < FLOAT_TOLERANCE,
            _ => false,
        };
    }

    if let (Value::Array(a), Value::Array(e)) = (actual, expected) {
        if !ordered {
            return multiset_eq(a, e);
        }
    }

    py_eq(actual, expected)
}

/// Turn one run outcome into the recorded result for its test case
pub fn evaluate_test(test_case: &TestCase, outcome: RunOutcome) -> TestOutcome {
    let (status, actual, error) = match outcome {
        RunOutcome::Returned(actual) => {
            let status = if values_match(&actual, &test_case.expected, test_case.ordered) {
                TestStatus::Pass
            } else {
                TestStatus::Fail
            };
            (status, Some(actual), None)
        }
        RunOutcome::Error(message) => (TestStatus::Error, None, Some(message)),
        RunOutcome::Timeout(message) => (TestStatus::Timeout, None, Some(message)),
    };

    TestOutcome {
        label: test_case.label.clone(),
        status,
        expected: test_case.expected.clone(),
        actual,
        error,
        hidden: test_case.hidden,
        weight: test_case.weight,
    }
}

/// Weighted percentage, half-up, never reporting 100 or 0 falsely
pub fn weighted_score(earned: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let mut score = (200 * earned + total) / (2 * total);
    if earned < total {
        score = score.min(99);
    }
    if earned > 0 {
        score = score.max(1);
    }
    score as u32
}

/// Aggregate per-case outcomes into the correctness dimension
pub fn aggregate_results(test_results: Vec<TestOutcome>) -> CorrectnessReport {
    let total_weight: u64 = test_results.iter().map(|r| u64::from(r.weight)).sum();
    let earned_weight: u64 = test_results
        .iter()
        .filter(|r| r.status == TestStatus::Pass)
        .map(|r| u64::from(r.weight))
        .sum();
    let passed = test_results
        .iter()
        .filter(|r| r.status == TestStatus::Pass)
        .count();

    CorrectnessReport {
        score: weighted_score(earned_weight, total_weight),
        weight: SCORE_WEIGHTS.correctness,
        passed,
        total: test_results.len(),
        test_results,
        parse_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_test_case(expected: Value, ordered: bool, weight: u32) -> TestCase {
        TestCase {
            label: "case".to_string(),
            call: "solve()".to_string(),
            expected,
            ordered,
            weight,
            hidden: false,
        }
    }

    #[test]
    fn test_null_expected_requires_null() {
        assert!(values_match(&Value::Null, &Value::Null, true));
        assert!(values_match(&Value::Null, &Value::Null, false));
        assert!(!values_match(&json!(0), &Value::Null, true));
        assert!(!values_match(&json!([]), &Value::Null, false));
    }

    #[test]
    fn test_float_tolerance() {
        assert!(values_match(&json!(0.30000000000000004), &json!(0.3), true));
        assert!(values_match(&json!(2), &json!(2.0000001), true));
        assert!(values_match(&json!("2.5"), &json!(2.5), true));
        assert!(!values_match(&json!(2.1), &json!(2.0), true));
        assert!(!values_match(&json!([2.0]), &json!(2.0), true));
    }

    #[test]
    fn test_python_equality_semantics() {
        assert!(values_match(&json!(1), &json!(true), true));
        assert!(values_match(&json!([1, [2, 3]]), &json!([1, [2, 3]]), true));
        assert!(values_match(&json!({"a": 1, "b": [true]}), &json!({"b": [1], "a": 1}), true));
        assert!(!values_match(&json!("1"), &json!(1), true));
    }

    #[test]
    fn test_ordered_lists_respect_order() {
        assert!(!values_match(&json!([1, 0]), &json!([0, 1]), true));
        assert!(values_match(&json!([1, 0]), &json!([0, 1]), false));
    }

    #[test]
    fn test_unordered_multisets() {
        assert!(values_match(&json!([3, 1, 2, 1]), &json!([1, 1, 2, 3]), false));
        assert!(!values_match(&json!([3, 1, 2]), &json!([1, 1, 2, 3]), false));
        assert!(values_match(
            &json!([["b", "a"], ["a", "c"]]),
            &json!([["a", "c"], ["b", "a"]]),
            false
        ));
        // mixed types are not orderable; compared by their str() forms
        assert!(values_match(&json!([1, "a", null]), &json!([null, 1, "a"]), false));
        assert!(values_match(&json!([1, "a"]), &json!(["1", "a"]), false));
        assert!(!values_match(&json!([1, 2]), &json!(["1", "2"]), false));
    }

    #[test]
    fn test_py_str_rendering() {
        assert_eq!(py_str(&json!([1, "a", null, true])), "[1, 'a', None, True]");
        assert_eq!(py_str(&json!(1.0)), "1.0");
        assert_eq!(py_str(&json!(1e20)), "1e+20");
        assert_eq!(py_str(&json!({"k": "it's"})), "{'k': \"it's\"}");
    }

    #[test]
    fn test_evaluate_test_statuses() {
        let case = make_test_case(json!([0, 1]), true, 2);

        let pass = evaluate_test(&case, RunOutcome::Returned(json!([0, 1])));
        assert_eq!(pass.status, TestStatus::Pass);
        assert_eq!(pass.actual, Some(json!([0, 1])));
        assert_eq!(pass.weight, 2);

        let fail = evaluate_test(&case, RunOutcome::Returned(json!([1, 0])));
        assert_eq!(fail.status, TestStatus::Fail);
        assert!(fail.error.is_none());

        let error = evaluate_test(&case, RunOutcome::Error("boom".to_string()));
        assert_eq!(error.status, TestStatus::Error);
        assert!(error.actual.is_none());
        assert_eq!(error.error.as_deref(), Some("boom"));

        let timeout = evaluate_test(&case, RunOutcome::Timeout("Exceeded 5s time limit.".to_string()));
        assert_eq!(timeout.status, TestStatus::Timeout);
    }

    #[test]
    fn test_weighted_score_rounding_and_clamps() {
        assert_eq!(weighted_score(0, 0), 0);
        assert_eq!(weighted_score(0, 5), 0);
        assert_eq!(weighted_score(5, 5), 100);
        assert_eq!(weighted_score(1, 2), 50);
        assert_eq!(weighted_score(1, 3), 33);
        assert_eq!(weighted_score(2, 3), 67);
        assert_eq!(weighted_score(199, 200), 99);
        assert_eq!(weighted_score(1, 1000), 1);
    }

    #[test]
    fn test_aggregate_results() {
        let outcomes = vec![
            evaluate_test(&make_test_case(json!(1), true, 1), RunOutcome::Returned(json!(1))),
            evaluate_test(&make_test_case(json!(2), true, 3), RunOutcome::Returned(json!(5))),
            evaluate_test(&make_test_case(json!(3), true, 1), RunOutcome::Error("x".to_string())),
        ];

        let report = aggregate_results(outcomes);
        assert_eq!(report.passed, 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.score, 20);
        assert_eq!(report.weight, 50);
        assert!(report.parse_error.is_none());
    }

    #[test]
    fn test_score_is_monotonic_in_passing_weight() {
        let total = 7;
        let scores: Vec<u32> = (0..=total).map(|earned| weighted_score(earned, total)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }
}
