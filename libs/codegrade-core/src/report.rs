//! Report assembly: overall score, grade and recommendations.

use chrono::{DateTime, Utc};
use codegrade_common::types::{
    Dimensions, EvaluationReport, Grade, Problem, Severity, StyleCategory, TestStatus,
    SCORE_WEIGHTS,
};

pub const MAX_RECOMMENDATIONS: usize = 8;
const MAX_SECURITY_RECOMMENDATIONS: usize = 3;
const MAX_COMPLEXITY_RECOMMENDATIONS: usize = 2;

/// Style categories worth a recommendation, most harmful first
const STYLE_PRIORITY: [StyleCategory; 4] = [
    StyleCategory::EmptyExcept,
    StyleCategory::MutableDefault,
    StyleCategory::BareExcept,
    StyleCategory::MissingDocstring,
];

const GRADE_THRESHOLDS: [(u32, Grade, &str); 5] = [
    (90, Grade::A, "Excellent, production-ready quality."),
    (80, Grade::B, "Good, minor improvements suggested."),
    (70, Grade::C, "Acceptable, several areas need attention."),
    (60, Grade::D, "Below average, significant issues present."),
    (0, Grade::F, "Failing, fundamental problems detected."),
];

/// Weighted mean of the four dimension scores, rounded half-up
pub fn overall_score(correctness: u32, complexity: u32, style: u32, security: u32) -> u32 {
    let w = SCORE_WEIGHTS;
    let weighted = correctness * w.correctness
        + complexity * w.complexity
        + style * w.style
        + security * w.security;
    (weighted + 50) / 100
}

pub fn grade_for(score: u32) -> (Grade, &'static str) {
    GRADE_THRESHOLDS
        .iter()
        .find(|(threshold, ..)| score >= *threshold)
        .map(|(_, grade, label)| (*grade, *label))
        .unwrap_or((Grade::F, GRADE_THRESHOLDS[4].2))
}

pub fn recommendations(dimensions: &Dimensions) -> Vec<String> {
    let mut out = Vec::new();

    let failing = dimensions
        .correctness
        .test_results
        .iter()
        .filter(|t| t.status != TestStatus::Pass)
        .count();
    if failing > 0 {
        out.push(format!(
            "Fix {} failing test case(s). Start with visible failures before tackling hidden edge cases.",
            failing
        ));
    }

    out.extend(
        dimensions
            .security
            .findings
            .iter()
            .filter(|f| matches!(f.severity, Severity::Critical | Severity::High))
            .take(MAX_SECURITY_RECOMMENDATIONS)
            .map(|f| format!("[Security] {}", f.description)),
    );

    out.extend(
        dimensions
            .complexity
            .warnings
            .iter()
            .take(MAX_COMPLEXITY_RECOMMENDATIONS)
            .map(|w| format!("[Complexity] {}", w)),
    );

    for category in STYLE_PRIORITY {
        if let Some(first) = dimensions
            .style
            .violations
            .get(&category)
            .and_then(|v| v.first())
        {
            out.push(format!("[Style] {}", first));
        }
    }

    out.truncate(MAX_RECOMMENDATIONS);
    out
}

/// Combine the dimension reports for one submission.
/// Pure: the timestamp is supplied by the caller.
pub fn build_report(
    problem: &Problem,
    source: &str,
    dimensions: Dimensions,
    evaluated_at: DateTime<Utc>,
) -> EvaluationReport {
    let overall = overall_score(
        dimensions.correctness.score,
        dimensions.complexity.score,
        dimensions.style.score,
        dimensions.security.score,
    );
    let (grade, label) = grade_for(overall);

    EvaluationReport {
        evaluated_at,
        problem_id: problem.id.clone(),
        problem_title: problem.title.clone(),
        difficulty: problem.difficulty.clone(),
        code_length: source.lines().count(),
        overall_score: overall,
        grade,
        grade_label: label.to_string(),
        score_weights: SCORE_WEIGHTS,
        recommendations: recommendations(&dimensions),
        dimensions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegrade_common::types::{
        ComplexityReport, CorrectnessReport, Finding, SecurityReport, StyleReport, TestOutcome,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn make_outcome(status: TestStatus) -> TestOutcome {
        TestOutcome {
            label: "case".to_string(),
            status,
            expected: json!(1),
            actual: Some(json!(1)),
            error: None,
            hidden: false,
            weight: 1,
        }
    }

    fn make_finding(severity: Severity, description: &str) -> Finding {
        Finding {
            severity,
            category: "DangerousBuiltin".to_string(),
            description: description.to_string(),
            line: 1,
        }
    }

    fn make_dimensions(scores: (u32, u32, u32, u32)) -> Dimensions {
        Dimensions {
            correctness: CorrectnessReport {
                score: scores.0,
                weight: 50,
                passed: 0,
                total: 0,
                test_results: Vec::new(),
                parse_error: None,
            },
            complexity: ComplexityReport {
                score: scores.1,
                weight: 20,
                summary: String::new(),
                functions: Vec::new(),
                builtin_hints: Vec::new(),
                warnings: Vec::new(),
            },
            style: StyleReport {
                score: scores.2,
                weight: 15,
                summary: String::new(),
                total_violations: 0,
                violations: BTreeMap::new(),
            },
            security: SecurityReport {
                score: scores.3,
                weight: 15,
                summary: String::new(),
                findings: Vec::new(),
            },
        }
    }

    fn make_problem() -> Problem {
        Problem {
            id: "two-sum".to_string(),
            title: "Two Sum".to_string(),
            difficulty: "easy".to_string(),
            preamble: None,
            test_cases: Vec::new(),
            hidden_test_cases: Vec::new(),
        }
    }

    #[test]
    fn test_overall_score_weights() {
        assert_eq!(overall_score(100, 100, 100, 100), 100);
        assert_eq!(overall_score(0, 0, 0, 0), 0);
        assert_eq!(overall_score(100, 0, 0, 0), 50);
        // 40 + 14 + 13.5 + 10.5 = 78
        assert_eq!(overall_score(80, 70, 90, 70), 78);
        // 0.5 + 0 + 0 + 0 rounds up
        assert_eq!(overall_score(1, 0, 0, 0), 1);
        // 7.5 + 15 = 22.5 rounds up
        assert_eq!(overall_score(0, 0, 50, 100), 23);
    }

    #[test]
    fn test_grade_thresholds_inclusive() {
        assert_eq!(grade_for(100).0, Grade::A);
        assert_eq!(grade_for(90).0, Grade::A);
        assert_eq!(grade_for(89).0, Grade::B);
        assert_eq!(grade_for(80).0, Grade::B);
        assert_eq!(grade_for(70).0, Grade::C);
        assert_eq!(grade_for(60).0, Grade::D);
        assert_eq!(grade_for(59).0, Grade::F);
        assert_eq!(grade_for(0).1, "Failing, fundamental problems detected.");
    }

    #[test]
    fn test_recommendations_priority_and_caps() {
        let mut dims = make_dimensions((50, 50, 50, 50));
        dims.correctness.test_results = vec![
            make_outcome(TestStatus::Pass),
            make_outcome(TestStatus::Fail),
            make_outcome(TestStatus::Timeout),
            make_outcome(TestStatus::Error),
        ];
        dims.security.findings = vec![
            make_finding(Severity::Medium, "medium one"),
            make_finding(Severity::Critical, "crit one"),
            make_finding(Severity::High, "high one"),
            make_finding(Severity::High, "high two"),
            make_finding(Severity::High, "high three"),
        ];
        dims.complexity.warnings = vec!["w1".into(), "w2".into(), "w3".into()];
        dims.style.violations.insert(
            StyleCategory::MissingDocstring,
            vec!["doc one".into(), "doc two".into()],
        );
        dims.style
            .violations
            .insert(StyleCategory::EmptyExcept, vec!["empty one".into()]);
        dims.style
            .violations
            .insert(StyleCategory::NamingConvention, vec!["naming".into()]);

        let recs = recommendations(&dims);
        assert_eq!(
            recs,
            vec![
                "Fix 3 failing test case(s). Start with visible failures before tackling hidden edge cases.".to_string(),
                "[Security] crit one".to_string(),
                "[Security] high one".to_string(),
                "[Security] high two".to_string(),
                "[Complexity] w1".to_string(),
                "[Complexity] w2".to_string(),
                "[Style] empty one".to_string(),
                "[Style] doc one".to_string(),
            ]
        );
    }

    #[test]
    fn test_recommendations_truncated_to_eight() {
        let mut dims = make_dimensions((0, 0, 0, 0));
        dims.correctness.test_results = vec![make_outcome(TestStatus::Fail)];
        dims.security.findings = (0..3)
            .map(|i| make_finding(Severity::Critical, &format!("c{}", i)))
            .collect();
        dims.complexity.warnings = vec!["w1".into(), "w2".into()];
        for category in STYLE_PRIORITY {
            dims.style.violations.insert(category, vec![category.to_string()]);
        }

        let recs = recommendations(&dims);
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        assert_eq!(recs[6], "[Style] empty_except");
        assert_eq!(recs[7], "[Style] mutable_default");
    }

    #[test]
    fn test_clean_run_has_no_recommendations() {
        let dims = make_dimensions((100, 100, 100, 100));
        assert!(recommendations(&dims).is_empty());
    }

    #[test]
    fn test_build_report_metadata() {
        let at = Utc::now();
        let report = build_report(
            &make_problem(),
            "def f():\n    return 1\n",
            make_dimensions((100, 80, 90, 100)),
            at,
        );

        assert_eq!(report.evaluated_at, at);
        assert_eq!(report.problem_id, "two-sum");
        assert_eq!(report.problem_title, "Two Sum");
        assert_eq!(report.code_length, 2);
        // 50 + 16 + 13.5 + 15 = 94.5
        assert_eq!(report.overall_score, 95);
        assert_eq!(report.grade, Grade::A);
        assert_eq!(report.grade_label, "Excellent, production-ready quality.");
        assert_eq!(report.score_weights, SCORE_WEIGHTS);
    }
}
