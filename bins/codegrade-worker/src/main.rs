use codegrade_common::config::QueueConfig;
use codegrade_common::redis;
use codegrade_common::types::{EvaluationJob, EvaluationResult, JobStatus};
use codegrade_core::{Pipeline, RuntimeConfig};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Codegrade worker booting...");

    let config_path = std::env::var("CODEGRADE_CONFIG").ok().map(PathBuf::from);
    let runtime_config = RuntimeConfig::load_or_default(config_path.as_deref()).map_err(|e| {
        error!("Failed to load runtime configuration: {}", e);
        e
    })?;
    let pipeline = Pipeline::from_config(&runtime_config)?;

    let queue_config = QueueConfig::from_env();
    info!(
        engine = pipeline.engine_name(),
        interpreter = %runtime_config.interpreter,
        queue = %redis::queue_name(),
        result_ttl_seconds = queue_config.result_ttl_seconds,
        "Worker configured"
    );

    let client = ::redis::Client::open(queue_config.redis_url.as_str())?;
    let mut redis_conn = ::redis::aio::ConnectionManager::new(client).await?;
    info!("Connected to Redis: {}", queue_config.redis_url);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received shutdown signal, stopping after current job...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    worker_loop(&mut redis_conn, &pipeline, &queue_config, shutdown_rx).await;

    info!("Worker shutdown complete");
    Ok(())
}

/// Evaluate one job; an invalid problem becomes a failed result
async fn process_job(pipeline: &Pipeline, job: &EvaluationJob) -> EvaluationResult {
    match pipeline.evaluate(&job.problem, &job.source_code).await {
        Ok(report) => {
            info!(
                job_id = %job.id,
                problem_id = %job.problem.id,
                score = report.overall_score,
                grade = %report.grade,
                "Evaluation completed"
            );
            EvaluationResult {
                job_id: job.id,
                status: JobStatus::Completed,
                report: Some(report),
                error: None,
            }
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Evaluation failed");
            EvaluationResult {
                job_id: job.id,
                status: JobStatus::Failed,
                report: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Pop and evaluate jobs until shutdown is requested. A popped job is
/// always evaluated and persisted; shutdown is only checked between jobs.
#[instrument(skip_all)]
async fn worker_loop(
    redis_conn: &mut ::redis::aio::ConnectionManager,
    pipeline: &Pipeline,
    queue_config: &QueueConfig,
    shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            info!("Shutdown requested, no job in flight");
            break;
        }

        // Short BLPOP timeout so shutdown is observed between jobs
        match redis::pop_job(redis_conn, queue_config.pop_timeout_seconds).await {
            Ok(Some(job)) => {
                info!(
                    job_id = %job.id,
                    problem_id = %job.problem.id,
                    test_cases = job.problem.test_cases.len() + job.problem.hidden_test_cases.len(),
                    source_size = job.source_code.len(),
                    "Received job"
                );

                let result = process_job(pipeline, &job).await;

                match redis::store_result(redis_conn, &result, queue_config).await {
                    Ok(_) => {
                        info!(job_id = %job.id, "Result persisted to Redis");
                    }
                    Err(e) => {
                        // Non-fatal - worker continues
                        error!(job_id = %job.id, error = %e, "Failed to persist result");
                    }
                }
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}
