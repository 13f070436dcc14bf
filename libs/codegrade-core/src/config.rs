// Runtime configuration for the evaluation core
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/runtime.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Process,
    Docker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    pub image: String,
    pub memory_limit_mb: u32,
    pub cpu_limit: f32,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            image: "python:3.12-slim".to_string(),
            memory_limit_mb: 256,
            cpu_limit: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpreter executable for the process backend
    pub interpreter: String,
    /// Arguments placed before `-c <unit>`
    pub args: Vec<String>,
    pub timeout_ms: u64,
    /// Capture limit per stream
    pub max_output_bytes: usize,
    pub max_parallel_tests: usize,
    pub backend: Backend,
    pub docker: DockerSettings,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: vec!["-I".to_string()],
            timeout_ms: 5000,
            max_output_bytes: 1024 * 1024,
            max_parallel_tests: 4,
            backend: Backend::Process,
            docker: DockerSettings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime settings from a JSON file; missing keys take defaults
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Runtime config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let mut config: RuntimeConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load with default path (config/runtime.json)
    pub fn load_default() -> Result<Self> {
        Self::load(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load from `path` when given, else the default file when it exists,
    /// else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load_default(),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                Ok(config)
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(interpreter) = lookup("CODEGRADE_PYTHON") {
            self.interpreter = interpreter;
        }
        if let Some(backend) = lookup("CODEGRADE_BACKEND") {
            self.backend = match backend.to_lowercase().as_str() {
                "process" => Backend::Process,
                "docker" => Backend::Docker,
                other => bail!("Invalid CODEGRADE_BACKEND '{}': expected process or docker", other),
            };
        }
        if let Some(timeout) = lookup("CODEGRADE_TIMEOUT_MS") {
            self.timeout_ms = timeout
                .parse()
                .with_context(|| format!("Invalid CODEGRADE_TIMEOUT_MS '{}'", timeout))?;
        }
        if self.max_parallel_tests == 0 {
            self.max_parallel_tests = 1;
        }
        Ok(())
    }
}
