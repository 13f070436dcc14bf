/// Correctness Executor - Orchestration of One Correctness Run
///
/// **Responsibility:**
/// Coordinate harness, engine and evaluator to produce the correctness
/// dimension for a submission.
///
/// **Architecture:**
/// 1. Parse the dedented submission; a parse failure short-circuits
/// 2. Build one runner unit per test case (harness.rs)
/// 3. Run units through the configured engine (engine.rs), bounded concurrency
/// 4. Score outcomes (evaluator.rs)
///
/// A crash, timeout or engine failure is recorded against its own test case
/// only; the remaining cases still run.

use crate::engine::ExecutionEngine;
use crate::evaluator;
use crate::harness::{self, RunOutcome};
use crate::parser;
use codegrade_common::types::{
    CorrectnessReport, Problem, TestCase, TestOutcome, TestStatus, SCORE_WEIGHTS,
};
use futures_util::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Knobs for one correctness run
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub max_parallel_tests: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_parallel_tests: 4,
        }
    }
}

/// Every case reported as `error` because the submission does not parse
fn parse_failure_report(test_cases: &[TestCase], message: &str) -> CorrectnessReport {
    let error = format!("Submission does not parse: {}", message);
    let test_results: Vec<TestOutcome> = test_cases
        .iter()
        .map(|tc| TestOutcome {
            label: tc.label.clone(),
            status: TestStatus::Error,
            expected: tc.expected.clone(),
            actual: None,
            error: Some(error.clone()),
            hidden: tc.hidden,
            weight: tc.weight,
        })
        .collect();

    CorrectnessReport {
        score: 0,
        weight: SCORE_WEIGHTS.correctness,
        passed: 0,
        total: test_results.len(),
        test_results,
        parse_error: Some(message.to_string()),
    }
}

async fn run_case(
    engine: &dyn ExecutionEngine,
    problem: &Problem,
    submission: &str,
    test_case: &TestCase,
) -> TestOutcome {
    let unit = harness::build_runner_unit(problem.preamble.as_deref(), submission, &test_case.call);
    let start = Instant::now();

    let outcome = match engine.execute(&unit).await {
        Ok(output) => {
            if output.timed_out {
                warn!(
                    test_label = %test_case.label,
                    execution_ms = output.execution_time_ms,
                    "Execution timed out; test cannot pass"
                );
            } else if output.runtime_error {
                warn!(
                    test_label = %test_case.label,
                    exit_code = ?output.exit_code,
                    execution_ms = output.execution_time_ms,
                    "Execution failed with runtime error"
                );
            }
            harness::classify_output(&output, engine.timeout())
        }
        Err(e) => {
            warn!(
                test_label = %test_case.label,
                engine = engine.name(),
                error = %e,
                "Execution engine error"
            );
            RunOutcome::Error(format!("Execution engine error: {}", e))
        }
    };

    let result = evaluator::evaluate_test(test_case, outcome);
    debug!(
        test_label = %result.label,
        status = %result.status,
        hidden = result.hidden,
        execution_ms = start.elapsed().as_millis() as u64,
        "Test result"
    );
    result
}

/// Run every visible and hidden test case of `problem` against `submission`
pub async fn evaluate_correctness(
    submission: &str,
    problem: &Problem,
    engine: &dyn ExecutionEngine,
    settings: RunSettings,
) -> CorrectnessReport {
    let test_cases = problem.all_test_cases();
    let submission = harness::dedent(submission);

    if let Err(e) = parser::parse(&submission) {
        warn!(problem_id = %problem.id, error = %e, "Submission does not parse; skipping execution");
        return parse_failure_report(&test_cases, &e.to_string());
    }

    info!(
        problem_id = %problem.id,
        engine = engine.name(),
        test_cases = test_cases.len(),
        max_parallel_tests = settings.max_parallel_tests,
        "Running test cases"
    );

    // `buffered` keeps results in case order regardless of completion order
    let test_results: Vec<TestOutcome> = stream::iter(test_cases.iter())
        .map(|tc| run_case(engine, problem, &submission, tc))
        .buffered(settings.max_parallel_tests.max(1))
        .collect()
        .await;

    let report = evaluator::aggregate_results(test_results);
    info!(
        problem_id = %problem.id,
        score = report.score,
        passed = report.passed,
        total = report.total,
        "Correctness evaluated"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionOutput;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers by matching the driver line of the unit against scripted calls
    struct ScriptedEngine {
        replies: Vec<(&'static str, Result<ExecutionOutput, &'static str>)>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: Mutex<usize>,
        delay: Duration,
    }

    impl ScriptedEngine {
        fn new(replies: Vec<(&'static str, Result<ExecutionOutput, &'static str>)>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: Mutex::new(0),
                delay: Duration::from_millis(0),
            }
        }
    }

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        async fn execute(&self, unit: &str) -> Result<ExecutionOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut max = self.max_in_flight.lock().unwrap();
                *max = (*max).max(now);
            }
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            for (call, reply) in &self.replies {
                if unit.contains(&format!("result = {}\n", call)) {
                    return match reply {
                        Ok(output) => Ok(output.clone()),
                        Err(message) => bail!("{}", message),
                    };
                }
            }
            bail!("no scripted reply for unit")
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn make_output(result: Value) -> ExecutionOutput {
        ExecutionOutput {
            stdout: format!("{}\n", json!({ "status": "ok", "result": result })),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    fn make_test_case(call: &str, expected: Value, weight: u32) -> TestCase {
        TestCase {
            label: call.to_string(),
            call: call.to_string(),
            expected,
            ordered: true,
            weight,
            hidden: false,
        }
    }

    fn make_problem(visible: Vec<TestCase>, hidden: Vec<TestCase>) -> Problem {
        Problem {
            id: "001".to_string(),
            title: "Two Sum".to_string(),
            difficulty: "easy".to_string(),
            preamble: None,
            test_cases: visible,
            hidden_test_cases: hidden,
        }
    }

    const SUBMISSION: &str = "def two_sum(nums, target):\n    return [0, 1]\n";

    #[tokio::test]
    async fn test_mixed_outcomes_keep_case_order() {
        let engine = ScriptedEngine::new(vec![
            ("a()", Ok(make_output(json!([0, 1])))),
            ("b()", Ok(make_output(json!([1, 0])))),
            (
                "c()",
                Ok(ExecutionOutput {
                    timed_out: true,
                    ..Default::default()
                }),
            ),
            ("d()", Err("daemon unavailable")),
        ]);
        let problem = make_problem(
            vec![
                make_test_case("a()", json!([0, 1]), 1),
                make_test_case("b()", json!([0, 1]), 1),
            ],
            vec![
                make_test_case("c()", json!(1), 1),
                make_test_case("d()", json!(1), 1),
            ],
        );

        let report = evaluate_correctness(SUBMISSION, &problem, &engine, RunSettings::default()).await;

        let statuses: Vec<TestStatus> = report.test_results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TestStatus::Pass, TestStatus::Fail, TestStatus::Timeout, TestStatus::Error]
        );
        assert_eq!(report.passed, 1);
        assert_eq!(report.total, 4);
        assert_eq!(report.score, 25);
        assert!(report.test_results[2].hidden);
        assert_eq!(
            report.test_results[2].error.as_deref(),
            Some("Exceeded 5s time limit.")
        );
        assert!(report.test_results[3]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Execution engine error: daemon unavailable"));
    }

    #[tokio::test]
    async fn test_swapped_indices_score_zero() {
        let engine = ScriptedEngine::new(vec![
            ("two_sum([2, 7, 11, 15], 9)", Ok(make_output(json!([1, 0])))),
            ("two_sum([3, 2, 4], 6)", Ok(make_output(json!([2, 1])))),
        ]);
        let problem = make_problem(
            vec![
                make_test_case("two_sum([2, 7, 11, 15], 9)", json!([0, 1]), 1),
                make_test_case("two_sum([3, 2, 4], 6)", json!([1, 2]), 1),
            ],
            Vec::new(),
        );

        let report = evaluate_correctness(SUBMISSION, &problem, &engine, RunSettings::default()).await;
        assert_eq!(report.score, 0);
        assert!(report
            .test_results
            .iter()
            .all(|r| r.status == TestStatus::Fail));
    }

    #[tokio::test]
    async fn test_null_result_matches_null_expected() {
        let engine = ScriptedEngine::new(vec![("find()", Ok(make_output(Value::Null)))]);
        let mut case = make_test_case("find()", Value::Null, 1);
        case.ordered = false;
        let problem = make_problem(vec![case], Vec::new());

        let report = evaluate_correctness(SUBMISSION, &problem, &engine, RunSettings::default()).await;
        assert_eq!(report.test_results[0].status, TestStatus::Pass);
        assert_eq!(report.score, 100);
    }

    #[tokio::test]
    async fn test_parse_failure_spawns_nothing() {
        let engine = ScriptedEngine::new(Vec::new());
        let problem = make_problem(
            vec![make_test_case("f()", json!(1), 1)],
            vec![make_test_case("g()", json!(2), 1)],
        );

        let report =
            evaluate_correctness("def f(:\n    return 1\n", &problem, &engine, RunSettings::default())
                .await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.score, 0);
        assert_eq!(report.total, 2);
        assert!(report.parse_error.is_some());
        assert!(report.test_results.iter().all(|r| r.status == TestStatus::Error));
        assert!(report.test_results[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Submission does not parse"));
    }

    #[tokio::test]
    async fn test_indented_submission_is_dedented() {
        let engine = ScriptedEngine::new(vec![("f()", Ok(make_output(json!(1))))]);
        let problem = make_problem(vec![make_test_case("f()", json!(1), 1)], Vec::new());

        let report = evaluate_correctness(
            "    def f():\n        return 1\n",
            &problem,
            &engine,
            RunSettings::default(),
        )
        .await;
        assert!(report.parse_error.is_none());
        assert_eq!(report.score, 100);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut engine = ScriptedEngine::new(vec![("f()", Ok(make_output(json!(1))))]);
        engine.delay = Duration::from_millis(20);
        let cases: Vec<TestCase> = (0..8).map(|_| make_test_case("f()", json!(1), 1)).collect();
        let problem = make_problem(cases, Vec::new());

        let report = evaluate_correctness(
            SUBMISSION,
            &problem,
            &engine,
            RunSettings {
                max_parallel_tests: 2,
            },
        )
        .await;

        assert_eq!(report.passed, 8);
        assert!(*engine.max_in_flight.lock().unwrap() <= 2);

        engine.calls.store(0, Ordering::SeqCst);
        *engine.max_in_flight.lock().unwrap() = 0;
        evaluate_correctness(
            SUBMISSION,
            &problem,
            &engine,
            RunSettings {
                max_parallel_tests: 1,
            },
        )
        .await;
        assert_eq!(*engine.max_in_flight.lock().unwrap(), 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 8);
    }
}
