use thiserror::Error;

/// Fatal pipeline errors. Everything local to one test case or one analyzer
/// is folded into the report instead.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid problem '{problem_id}': {reason}")]
    InvalidProblem { problem_id: String, reason: String },

    #[error("static analysis task failed: {0}")]
    AnalysisTask(String),
}
