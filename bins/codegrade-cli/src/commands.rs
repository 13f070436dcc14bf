// CLI commands for evaluating submissions
use anyhow::{bail, Context, Result};
use codegrade_common::config::QueueConfig;
use codegrade_common::redis;
use codegrade_common::types::{EvaluationJob, EvaluationReport, JobStatus, Problem};
use codegrade_core::{analyze_static, Pipeline, RuntimeConfig};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Load a problem definition
fn load_problem(path: &Path) -> Result<Problem> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse problem file {}", path.display()))
}

fn load_code(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read submission {}", path.display()))
}

async fn connect(config: &QueueConfig) -> Result<::redis::aio::ConnectionManager> {
    let client = ::redis::Client::open(config.redis_url.as_str())
        .with_context(|| format!("Invalid Redis URL {}", config.redis_url))?;
    ::redis::aio::ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))
}

/// Human-readable digest of a report
fn format_summary(report: &EvaluationReport) -> String {
    let dims = &report.dimensions;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "📊 {} ({}): {}/100, grade {}",
        report.problem_title, report.problem_id, report.overall_score, report.grade
    );
    let _ = writeln!(out, "   {}", report.grade_label);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  ✅ Correctness  {:>3}  ({}/{} passed)",
        dims.correctness.score, dims.correctness.passed, dims.correctness.total
    );
    let _ = writeln!(out, "  🧮 Complexity   {:>3}  {}", dims.complexity.score, dims.complexity.summary);
    let _ = writeln!(out, "  🎨 Style        {:>3}  {}", dims.style.score, dims.style.summary);
    let _ = writeln!(out, "  🔒 Security     {:>3}  {}", dims.security.score, dims.security.summary);

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "\n📋 Recommendations:");
        for (i, rec) in report.recommendations.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, rec);
        }
    }
    out
}

/// Evaluate a submission in-process
pub async fn evaluate(
    problem_path: &Path,
    code_path: &Path,
    config_path: Option<&Path>,
    public: bool,
    output: Option<&Path>,
) -> Result<()> {
    let problem = load_problem(problem_path)?;
    let code = load_code(code_path)?;
    let config = RuntimeConfig::load_or_default(config_path)?;
    let pipeline = Pipeline::from_config(&config)?;

    eprintln!(
        "🚀 Evaluating {} against '{}' ({} engine)...",
        code_path.display(),
        problem.id,
        pipeline.engine_name()
    );

    let report = pipeline.evaluate(&problem, &code).await?;
    let report = if public { report.public_view() } else { report };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;

    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            print!("{}", format_summary(&report));
            println!("\n📂 Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Static analysis only, no code is executed
pub fn analyze(code_path: &Path) -> Result<()> {
    let code = load_code(code_path)?;
    let analysis = analyze_static(&code);
    let json = serde_json::to_string_pretty(&analysis).context("Failed to serialize analysis")?;
    println!("{}", json);
    Ok(())
}

/// Queue a submission for the worker
pub async fn submit(problem_path: &Path, code_path: &Path) -> Result<()> {
    let problem = load_problem(problem_path)?;
    let source_code = load_code(code_path)?;
    let config = QueueConfig::from_env();
    let mut conn = connect(&config).await?;

    let job = EvaluationJob {
        id: Uuid::new_v4(),
        problem,
        source_code,
    };
    redis::push_job(&mut conn, &job)
        .await
        .context("Failed to push job")?;

    eprintln!("✅ Queued on {}", redis::queue_name());
    println!("{}", job.id);
    Ok(())
}

/// Print the stored result of a queued submission
pub async fn fetch_result(job_id: &str) -> Result<()> {
    let job_id = Uuid::parse_str(job_id).with_context(|| format!("Invalid job id '{}'", job_id))?;
    let config = QueueConfig::from_env();
    let mut conn = connect(&config).await?;

    let Some(result) = redis::get_result(&mut conn, &job_id)
        .await
        .context("Failed to fetch result")?
    else {
        eprintln!("⏳ No result yet for {}", job_id);
        return Ok(());
    };

    match (result.status, &result.report) {
        (JobStatus::Completed, Some(report)) => {
            eprint!("{}", format_summary(report));
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        (JobStatus::Failed, _) => {
            bail!(
                "Evaluation failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        (status, _) => {
            eprintln!("⏳ Job {} is {:?}", job_id, status);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegrade_common::types::{CorrectnessReport, Dimensions};
    use codegrade_core::report::build_report;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("codegrade-cli-{}-{}", Uuid::new_v4(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_problem_accepts_camel_case_fields() {
        let path = write_temp(
            "problem.json",
            r#"{
                "id": "001",
                "title": "Two Sum",
                "difficulty": "easy",
                "testCases": [{"label": "basic", "args": "two_sum([2, 7], 9)", "expected": [0, 1]}],
                "hiddenTestCases": [{"args": "two_sum([3, 3], 6)", "expected": [0, 1], "weight": 2}]
            }"#,
        );
        let problem = load_problem(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(problem.id, "001");
        assert_eq!(problem.test_cases[0].call, "two_sum([2, 7], 9)");
        assert_eq!(problem.hidden_test_cases[0].weight, 2);
        assert_eq!(problem.hidden_test_cases[0].label, "Unnamed test");
    }

    #[test]
    fn test_load_problem_reports_path_on_error() {
        let path = write_temp("broken.json", "{ not json");
        let err = load_problem(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(err.to_string().contains("Failed to parse problem file"));

        let missing = std::env::temp_dir().join("codegrade-cli-does-not-exist.json");
        assert!(load_problem(&missing).is_err());
    }

    #[test]
    fn test_summary_lists_recommendations() {
        let analysis = analyze_static("def run(x):\n    return eval(x)\n");
        let problem: Problem = serde_json::from_str(
            r#"{"id": "p1", "title": "Runner", "testCases": [{"args": "run('1')", "expected": 1}]}"#,
        )
        .unwrap();
        let correctness = CorrectnessReport {
            score: 100,
            weight: 50,
            passed: 1,
            total: 1,
            test_results: Vec::new(),
            parse_error: None,
        };
        let report = build_report(
            &problem,
            "def run(x):\n    return eval(x)\n",
            Dimensions {
                correctness,
                complexity: analysis.complexity,
                style: analysis.style,
                security: analysis.security,
            },
            chrono::Utc::now(),
        );

        let summary = format_summary(&report);
        assert!(summary.contains("Runner (p1)"));
        assert!(summary.contains("(1/1 passed)"));
        assert!(summary.contains("📋 Recommendations:"));
        assert!(summary.contains("[Security] eval()"));
    }
}
