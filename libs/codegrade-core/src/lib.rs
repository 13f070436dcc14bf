//! Evaluation core: parses a submission once per analyzer, runs it against
//! the problem's test cases and scores four independent dimensions.

pub mod complexity;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod security;
pub mod style;

pub use config::RuntimeConfig;
pub use engine::{ExecutionEngine, ExecutionOutput};
pub use error::EvalError;
pub use pipeline::{analyze_static, Pipeline, StaticAnalysis};
