/// Evaluation Pipeline - One Submission In, One Report Out
///
/// **Core Responsibility:**
/// Validate the problem, run the four dimensions and assemble the report.
///
/// **Flow:**
/// 1. Reject malformed problems (the only fatal path)
/// 2. Correctness runs on the async runtime while complexity, style and
///    security run together on a blocking task; they share no data
/// 3. The report builder combines the four results with a fresh timestamp
///
/// Parse failures, crashes and timeouts never escape: each dimension folds
/// them into its own degraded result.

use crate::complexity;
use crate::config::RuntimeConfig;
use crate::engine::{engine_from_config, ExecutionEngine};
use crate::error::EvalError;
use crate::executor::{self, RunSettings};
use crate::harness;
use crate::parser;
use crate::report;
use crate::security;
use crate::style;
use anyhow::Result;
use chrono::Utc;
use codegrade_common::types::{
    ComplexityReport, Dimensions, EvaluationReport, Problem, SecurityReport, StyleReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The three dimensions that need no execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticAnalysis {
    pub complexity: ComplexityReport,
    pub style: StyleReport,
    pub security: SecurityReport,
}

/// Run complexity, style and security over one parse of the submission
pub fn analyze_static(source: &str) -> StaticAnalysis {
    let source = harness::dedent(source);
    match parser::parse(&source) {
        Ok(module) => StaticAnalysis {
            complexity: complexity::analyze(&module),
            style: style::analyze(&module, &source),
            security: security::analyze(&module, &source),
        },
        Err(e) => {
            debug!(error = %e, "Submission does not parse; static analysis degraded");
            StaticAnalysis {
                complexity: complexity::parse_failure(&e),
                style: style::parse_failure(&e),
                security: security::parse_failure(&e, &source),
            }
        }
    }
}

fn validate_problem(problem: &Problem) -> Result<(), EvalError> {
    let invalid = |reason: String| EvalError::InvalidProblem {
        problem_id: problem.id.clone(),
        reason,
    };

    if problem.id.trim().is_empty() {
        return Err(invalid("problem id is empty".to_string()));
    }

    // No test cases is valid: correctness scores 0 over zero total weight
    for tc in &problem.all_test_cases() {
        if tc.weight == 0 {
            return Err(invalid(format!("test case '{}' has weight 0", tc.label)));
        }
        if tc.call.trim().is_empty() {
            return Err(invalid(format!("test case '{}' has an empty call", tc.label)));
        }
    }
    Ok(())
}

pub struct Pipeline {
    engine: Arc<dyn ExecutionEngine>,
    settings: RunSettings,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn ExecutionEngine>, settings: RunSettings) -> Self {
        Self { engine, settings }
    }

    /// Pipeline backed by the engine selected in `config`
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let engine = engine_from_config(config)?;
        let settings = RunSettings {
            max_parallel_tests: config.max_parallel_tests,
        };
        info!(
            engine = engine.name(),
            timeout_ms = config.timeout_ms,
            max_parallel_tests = settings.max_parallel_tests,
            "Evaluation pipeline ready"
        );
        Ok(Self::new(engine, settings))
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub async fn evaluate(
        &self,
        problem: &Problem,
        source: &str,
    ) -> Result<EvaluationReport, EvalError> {
        validate_problem(problem)?;
        let start = Instant::now();

        let owned_source = source.to_string();
        let static_task = tokio::task::spawn_blocking(move || analyze_static(&owned_source));
        let correctness_run =
            executor::evaluate_correctness(source, problem, self.engine.as_ref(), self.settings);

        let (correctness, analysis) = tokio::join!(correctness_run, static_task);
        let analysis = analysis.map_err(|e| EvalError::AnalysisTask(e.to_string()))?;

        let dimensions = Dimensions {
            correctness,
            complexity: analysis.complexity,
            style: analysis.style,
            security: analysis.security,
        };
        let report = report::build_report(problem, source, dimensions, Utc::now());

        info!(
            problem_id = %problem.id,
            score = report.overall_score,
            grade = %report.grade,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation complete"
        );
        Ok(report)
    }
}
