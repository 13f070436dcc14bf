/// Execution Engine - Abstraction for Running Runner Units
///
/// **Core Responsibility:**
/// Run one self-contained source unit in a fresh, isolated process and
/// capture its raw output.
///
/// **Boundary:**
/// - Engine knows HOW to execute (local interpreter, Docker)
/// - Engine does NOT parse the runner protocol
/// - Engine does NOT evaluate correctness
///
/// Every execution has a hard wall-clock deadline. On expiry the process is
/// killed and reaped before the output record is returned.

use crate::config::{Backend, RuntimeConfig};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Units above this size are rejected before anything is spawned
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024;

/// How long to keep draining pipes after the process is gone. Grandchildren
/// that inherited the pipes must not hold the evaluation hostage.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK_BYTES: usize = 8192;

/// Raw result of one execution, consumed by the harness
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub timed_out: bool,
    /// `None` when the process was killed or no status was reported
    pub exit_code: Option<i64>,
    pub runtime_error: bool,
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Run `unit` once. `Err` is reserved for infrastructure failures
    /// (spawn errors, daemon errors, oversized units).
    async fn execute(&self, unit: &str) -> Result<ExecutionOutput>;

    /// Wall-clock limit applied to each execution
    fn timeout(&self) -> Duration;

    fn name(&self) -> &'static str;
}

/// Build the engine selected by the runtime configuration
pub fn engine_from_config(config: &RuntimeConfig) -> Result<Arc<dyn ExecutionEngine>> {
    match config.backend {
        Backend::Process => Ok(Arc::new(ProcessEngine::from_config(config))),
        Backend::Docker => Ok(Arc::new(DockerEngine::from_config(config)?)),
    }
}

fn check_unit_size(unit: &str) -> Result<()> {
    if unit.len() > MAX_SOURCE_CODE_BYTES {
        bail!(
            "Runner unit exceeds maximum size of {} bytes",
            MAX_SOURCE_CODE_BYTES
        );
    }
    Ok(())
}

/// Append to a buffer that keeps the last `limit` bytes. Trimming is
/// amortized; call `finish_tail` for the exact bound.
fn push_tail(kept: &mut Vec<u8>, bytes: &[u8], limit: usize) {
    kept.extend_from_slice(bytes);
    if kept.len() > limit.saturating_mul(2) {
        let excess = kept.len() - limit;
        kept.drain(..excess);
    }
}

fn finish_tail(mut kept: Vec<u8>, limit: usize) -> String {
    if kept.len() > limit {
        let excess = kept.len() - limit;
        kept.drain(..excess);
    }
    String::from_utf8_lossy(&kept).into_owned()
}

/// Append to a buffer that keeps the first `limit` bytes
fn push_head(kept: &mut Vec<u8>, bytes: &[u8], limit: usize) {
    let room = limit.saturating_sub(kept.len());
    kept.extend_from_slice(&bytes[..bytes.len().min(room)]);
}

/// Keep the last `limit` bytes of a stream, reading it to the end
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => push_tail(&mut kept, &chunk[..n], limit),
        }
    }
    finish_tail(kept, limit)
}

/// Keep the first `limit` bytes of a stream and discard the rest
async fn read_head<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => push_head(&mut kept, &chunk[..n], limit),
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

async fn collect_stream(mut handle: JoinHandle<String>, stream: &'static str) -> String {
    match timeout(OUTPUT_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(stream, error = %e, "Output reader task failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            warn!(stream, "Output pipe still open after process exit; dropping output");
            String::new()
        }
    }
}

/// SIGKILL the group led by `child`. Must run before the child is reaped.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id() else { return };
    let Ok(pgid) = libc::pid_t::try_from(pid) else { return };
    // Negative pid addresses the whole process group
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        warn!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "Failed to kill process group"
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Local interpreter backend: `<interpreter> <args…> -c <unit>`
///
/// Gives process isolation and a hard timeout, nothing more. It is not a
/// sandbox.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    interpreter: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessEngine {
    pub fn new(
        interpreter: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            args,
            timeout,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            config.interpreter.clone(),
            config.args.clone(),
            config.timeout(),
            config.max_output_bytes,
        )
    }
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    async fn execute(&self, unit: &str) -> Result<ExecutionOutput> {
        check_unit_size(unit)?;

        let start_time = Instant::now();
        let mut command = Command::new(&self.interpreter);
        command
            .args(&self.args)
            .arg("-c")
            .arg(unit)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can reclaim everything the unit spawned
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn interpreter '{}'", self.interpreter))?;

        let stdout = child.stdout.take().context("Interpreter stdout was not captured")?;
        let stderr = child.stderr.take().context("Interpreter stderr was not captured")?;

        // The result line is printed last, so stdout keeps its tail
        let stdout_task = tokio::spawn(read_tail(stdout, self.max_output_bytes));
        let stderr_task = tokio::spawn(read_head(stderr, self.max_output_bytes));

        let outcome = timeout(self.timeout, child.wait()).await;

        let (exit_code, timed_out) = match outcome {
            Ok(status) => {
                let status = status.context("Failed to wait for interpreter")?;
                (status.code().map(i64::from), false)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Execution timed out; killing process group"
                );
                kill_process_group(&child);
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed-out process");
                }
                (None, true)
            }
        };

        let stdout = collect_stream(stdout_task, "stdout").await;
        let stderr = collect_stream(stderr_task, "stderr").await;
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        debug!(
            execution_ms = execution_time_ms,
            exit_code = ?exit_code,
            timed_out,
            "Process finished"
        );

        Ok(ExecutionOutput {
            stdout,
            stderr,
            execution_time_ms,
            timed_out,
            exit_code,
            runtime_error: !timed_out && exit_code != Some(0),
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// Container cleanup guard - guarantees container removal on drop,
/// including when the execution future is cancelled
struct ContainerGuard<'a> {
    docker: &'a Docker,
    container_id: String,
}

impl<'a> ContainerGuard<'a> {
    fn new(docker: &'a Docker, container_id: String) -> Self {
        Self {
            docker,
            container_id,
        }
    }
}

impl<'a> Drop for ContainerGuard<'a> {
    fn drop(&mut self) {
        // Drop cannot be async; removal runs on the runtime
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };

            if let Err(e) = docker
                .remove_container(&container_id, Some(remove_options))
                .await
            {
                warn!(container_id = %container_id, error = %e, "Failed to remove container");
            }
        });
    }
}

/// Decodes the unit from the environment and runs it as `__main__`
const CONTAINER_BOOTSTRAP: &str = "import base64, os\n\
src = base64.b64decode(os.environ.pop('SOURCE_CODE')).decode('utf-8')\n\
exec(compile(src, '<unit>', 'exec'), {'__name__': '__main__'})\n";

/// Docker backend: one throwaway container per unit
///
/// - Network disabled
/// - Memory and CPU limits from the runtime configuration
/// - Unit passed base64-encoded through the environment
/// - Hard timeout with forced kill; removal guaranteed by `ContainerGuard`
pub struct DockerEngine {
    docker: Docker,
    image: String,
    memory_limit_bytes: i64,
    nano_cpus: i64,
    timeout: Duration,
    max_output_bytes: usize,
}

impl DockerEngine {
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("Failed to connect to Docker daemon")?;

        Ok(Self {
            docker,
            image: config.docker.image.clone(),
            memory_limit_bytes: i64::from(config.docker.memory_limit_mb) * 1024 * 1024,
            nano_cpus: (f64::from(config.docker.cpu_limit) * 1_000_000_000.0) as i64,
            timeout: config.timeout(),
            max_output_bytes: config.max_output_bytes,
        })
    }

    /// Pull the image when it is not cached locally
    async fn ensure_image(&self) -> Result<()> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            debug!(image = %self.image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %self.image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: self.image.as_str(),
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.context("Failed to pull Docker image")?;
        }

        info!(image = %self.image, "Image pulled");
        Ok(())
    }
}

#[async_trait]
impl ExecutionEngine for DockerEngine {
    async fn execute(&self, unit: &str) -> Result<ExecutionOutput> {
        check_unit_size(unit)?;

        self.ensure_image()
            .await
            .with_context(|| format!("Failed to ensure Docker image '{}' is available", self.image))?;

        let container_name = format!("codegrade-{}", uuid::Uuid::new_v4());
        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(vec![
                "python3".to_string(),
                "-I".to_string(),
                "-c".to_string(),
                CONTAINER_BOOTSTRAP.to_string(),
            ]),
            env: Some(vec![format!(
                "SOURCE_CODE={}",
                general_purpose::STANDARD.encode(unit)
            )]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some(self.memory_limit_bytes),
                nano_cpus: Some(self.nano_cpus),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .context("Failed to create Docker container")?;

        let container_id = container.id.clone();
        let _guard = ContainerGuard::new(&self.docker, container_id.clone());

        let start_time = Instant::now();

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start Docker container")?;

        let limit = self.max_output_bytes;
        let execution = async {
            let mut stdout: Vec<u8> = Vec::new();
            let mut stderr: Vec<u8> = Vec::new();

            let logs_options = Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            });

            let mut logs = self.docker.logs(&container_id, logs_options);
            while let Some(output) = logs.next().await {
                match output {
                    Ok(LogOutput::StdOut { message }) => push_tail(&mut stdout, &message, limit),
                    Ok(LogOutput::StdErr { message }) => push_head(&mut stderr, &message, limit),
                    Err(e) => {
                        warn!(error = %e, "Error reading container logs");
                        break;
                    }
                    _ => {}
                }
            }

            let wait_options = Some(WaitContainerOptions {
                condition: "not-running",
            });
            let mut wait = self.docker.wait_container(&container_id, wait_options);
            let exit_code = match wait.next().await {
                Some(Ok(response)) => Some(response.status_code),
                // bollard reports non-zero exits as an error carrying the code
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                    Some(code)
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to get container exit code");
                    None
                }
                None => None,
            };

            (finish_tail(stdout, limit), String::from_utf8_lossy(&stderr).into_owned(), exit_code)
        };

        let (stdout, mut stderr, exit_code, timed_out) =
            match timeout(self.timeout, execution).await {
                Ok((stdout, stderr, exit_code)) => (stdout, stderr, exit_code, false),
                Err(_) => {
                    warn!(
                        container_id = %container_id,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Execution timed out; killing container"
                    );
                    if let Err(e) = self
                        .docker
                        .kill_container(&container_id, None::<KillContainerOptions<String>>)
                        .await
                    {
                        warn!(error = %e, "Failed to kill timed-out container");
                    }
                    (String::new(), String::new(), None, true)
                }
            };

        match exit_code {
            Some(137) => stderr.push_str("\n[Container killed: likely exceeded memory limit]"),
            Some(139) => stderr.push_str("\n[Container killed: segmentation fault]"),
            _ => {}
        }

        Ok(ExecutionOutput {
            stdout,
            stderr,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
            timed_out,
            exit_code,
            runtime_error: !timed_out && exit_code != Some(0),
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}
