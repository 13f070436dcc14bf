use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Problem definition (supplied by the problem provider, read-only here)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub difficulty: String,
    /// Source injected ahead of the submission, e.g. a shared `TreeNode` class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
    #[serde(default, alias = "testCases")]
    pub test_cases: Vec<TestCase>,
    #[serde(default, alias = "hiddenTestCases")]
    pub hidden_test_cases: Vec<TestCase>,
}

impl Problem {
    /// Visible cases followed by hidden ones, with `hidden` set from the list
    /// each case came from.
    pub fn all_test_cases(&self) -> Vec<TestCase> {
        let visible = self.test_cases.iter().map(|tc| TestCase {
            hidden: false,
            ..tc.clone()
        });
        let hidden = self.hidden_test_cases.iter().map(|tc| TestCase {
            hidden: true,
            ..tc.clone()
        });
        visible.chain(hidden).collect()
    }

    /// The problem as a client may see it: hidden test cases removed
    pub fn public_view(&self) -> Problem {
        Problem {
            hidden_test_cases: Vec::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default = "default_label")]
    pub label: String,
    /// Expression invoking the submission, e.g. `twoSum([2, 7, 11, 15], 9)`
    #[serde(rename = "args", alias = "call")]
    pub call: String,
    #[serde(default)]
    pub expected: Value,
    /// When false, list results are compared as multisets
    #[serde(default = "default_ordered")]
    pub ordered: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub hidden: bool,
}

fn default_label() -> String {
    "Unnamed test".to_string()
}

fn default_ordered() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Correctness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
    Timeout,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Error => "error",
            TestStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub label: String,
    pub status: TestStatus,
    pub expected: Value,
    /// Absent on error and timeout
    pub actual: Option<Value>,
    pub error: Option<String>,
    pub hidden: bool,
    pub weight: u32,
}

impl TestOutcome {
    /// Copy safe for a visible-only view: hidden cases lose their values.
    pub fn redacted(&self) -> TestOutcome {
        if !self.hidden {
            return self.clone();
        }
        TestOutcome {
            expected: Value::Null,
            actual: None,
            error: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectnessReport {
    pub score: u32,
    pub weight: u32,
    pub passed: usize,
    pub total: usize,
    pub test_results: Vec<TestOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Complexity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetrics {
    pub name: String,
    pub cyclomatic: u32,
    pub max_nesting_depth: u32,
    pub is_recursive: bool,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub score: u32,
    pub weight: u32,
    pub summary: String,
    pub functions: Vec<FunctionMetrics>,
    pub builtin_hints: Vec<String>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// Declaration order is the order categories appear in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleCategory {
    NamingConvention,
    MissingDocstring,
    MagicNumber,
    LineTooLong,
    EmptyExcept,
    BareExcept,
    MutableDefault,
    UnusedImport,
}

impl StyleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleCategory::NamingConvention => "naming_convention",
            StyleCategory::MissingDocstring => "missing_docstring",
            StyleCategory::MagicNumber => "magic_number",
            StyleCategory::LineTooLong => "line_too_long",
            StyleCategory::EmptyExcept => "empty_except",
            StyleCategory::BareExcept => "bare_except",
            StyleCategory::MutableDefault => "mutable_default",
            StyleCategory::UnusedImport => "unused_import",
        }
    }
}

impl fmt::Display for StyleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleReport {
    pub score: u32,
    pub weight: u32,
    pub summary: String,
    pub total_violations: usize,
    pub violations: BTreeMap<StyleCategory, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Security
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub score: u32,
    pub weight: u32,
    pub summary: String,
    pub findings: Vec<Finding>,
}

// ---------------------------------------------------------------------------
// Final report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Per-dimension weights in percent; they sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub correctness: u32,
    pub complexity: u32,
    pub style: u32,
    pub security: u32,
}

pub const SCORE_WEIGHTS: ScoreWeights = ScoreWeights {
    correctness: 50,
    complexity: 20,
    style: 15,
    security: 15,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub correctness: CorrectnessReport,
    pub complexity: ComplexityReport,
    pub style: StyleReport,
    pub security: SecurityReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub evaluated_at: DateTime<Utc>,
    pub problem_id: String,
    pub problem_title: String,
    pub difficulty: String,
    /// Number of lines in the submission
    pub code_length: usize,
    pub overall_score: u32,
    pub grade: Grade,
    pub grade_label: String,
    pub score_weights: ScoreWeights,
    pub dimensions: Dimensions,
    pub recommendations: Vec<String>,
}

impl EvaluationReport {
    /// The report with every hidden test outcome redacted
    pub fn public_view(&self) -> EvaluationReport {
        let mut report = self.clone();
        report.dimensions.correctness.test_results = self
            .dimensions
            .correctness
            .test_results
            .iter()
            .map(TestOutcome::redacted)
            .collect();
        report
    }
}

// ---------------------------------------------------------------------------
// Queue payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub id: Uuid,
    pub problem: Problem,
    pub source_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub report: Option<EvaluationReport>,
    pub error: Option<String>,
}
