use crate::config::QueueConfig;
use crate::types::{EvaluationJob, EvaluationResult};
use redis::{AsyncCommands, RedisResult};

/// Redis key layout shared by the worker and the CLI.
/// Both sides go through these helpers so the keys never drift.

pub const QUEUE_PREFIX: &str = "codegrade:queue";
pub const RESULT_PREFIX: &str = "codegrade:result";
pub const STATUS_PREFIX: &str = "codegrade:status";

/// Queue holding pending evaluation jobs
pub fn queue_name() -> String {
    format!("{}:evaluations", QUEUE_PREFIX)
}

/// Generate result key for a job
pub fn result_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, job_id)
}

/// Generate status key for a job
pub fn status_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, job_id)
}

fn serde_error(context: &'static str, e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, context, e.to_string()))
}

/// Push a job to the evaluation queue
/// Uses RPUSH for FIFO semantics
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &EvaluationJob,
) -> RedisResult<()> {
    let payload = serde_json::to_string(job).map_err(|e| serde_error("serialization error", e))?;
    conn.rpush(queue_name(), payload).await
}

/// Pop a job from the evaluation queue
/// Uses BLPOP with timeout so the caller can observe shutdown
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<EvaluationJob>> {
    let result: Option<(String, String)> = conn.blpop(queue_name(), timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: EvaluationJob = serde_json::from_str(&payload)
                .map_err(|e| serde_error("deserialization error", e))?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Store an evaluation result, plus its status under a separate key for cheap lookups
pub async fn store_result(
    conn: &mut redis::aio::ConnectionManager,
    result: &EvaluationResult,
    config: &QueueConfig,
) -> RedisResult<()> {
    let payload = serde_json::to_string(result).map_err(|e| serde_error("serialization error", e))?;
    let _: () = conn
        .set_ex(result_key(&result.job_id), payload, config.result_ttl_seconds)
        .await?;

    let status = serde_json::to_string(&result.status).map_err(|e| serde_error("serialization error", e))?;
    let _: () = conn
        .set_ex(status_key(&result.job_id), status, config.result_ttl_seconds)
        .await?;

    Ok(())
}

/// Retrieve an evaluation result
pub async fn get_result(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
) -> RedisResult<Option<EvaluationResult>> {
    let payload: Option<String> = conn.get(result_key(job_id)).await?;

    match payload {
        Some(data) => {
            let result: EvaluationResult = serde_json::from_str(&data)
                .map_err(|e| serde_error("deserialization error", e))?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}
