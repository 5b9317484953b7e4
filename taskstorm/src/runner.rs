use std::{future::Future, io, path::PathBuf, process::Stdio, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    time::Instant,
};
use typed_builder::TypedBuilder;

use crate::{
    error::{Error, Result},
    metric::{InvocationOutcome, Payload},
    workload::InvocationSpec,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STRUCTURED_FLAG: &str = "--json";

/// Performs one call against the subject.
///
/// Implementations hold no per-call mutable state: the executor calls `invoke`
/// from many workers at once through a shared reference.
pub trait Invoker: Send + Sync {
    /// Checked once before any batch starts. An error here aborts the run.
    fn preflight(&self) -> Result<()> {
        Ok(())
    }

    /// Runs `spec` to completion (or timeout) and describes what happened.
    /// Never retries.
    fn invoke(&self, spec: InvocationSpec) -> impl Future<Output = InvocationOutcome> + Send;
}

/// Runs the subject as a child process:
/// `<program> <prefix_args..> <spec args..> <structured_flag>`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ProcessRunner {
    /// Path to the executable, or a bare name looked up on `PATH`.
    #[builder(setter(into))]
    pub program: PathBuf,
    /// Arguments placed before the subcommand, e.g. `--db stress.db`.
    #[builder(default)]
    pub prefix_args: Vec<String>,
    #[builder(default = DEFAULT_STRUCTURED_FLAG.to_string(), setter(into))]
    pub structured_flag: String,
    /// Hard per-call cutoff; the child is killed when it elapses.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

impl ProcessRunner {
    fn command(&self, spec: &InvocationSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(spec.args())
            .arg(&self.structured_flag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Invoker for ProcessRunner {
    fn preflight(&self) -> Result<()> {
        if self.program.is_file() || which::which(&self.program).is_ok() {
            Ok(())
        } else {
            Err(Error::SubjectMissing {
                program: self.program.clone(),
            })
        }
    }

    async fn invoke(&self, spec: InvocationSpec) -> InvocationOutcome {
        let start = Instant::now();
        let mut child = match self.command(&spec).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(args = %spec, "spawn failed: {e}");
                return InvocationOutcome::failed(
                    format!("failed to start {}: {e}", self.program.display()),
                    start.elapsed(),
                );
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let completion = async {
            let (status, out, err) =
                tokio::try_join!(child.wait(), read_all(stdout), read_all(stderr))?;
            Ok::<_, io::Error>((status, out, err))
        };
        let finished = tokio::time::timeout(self.timeout, completion).await;
        let elapsed = start.elapsed();

        match finished {
            Ok(Ok((status, out, _))) if status.success() => {
                InvocationOutcome::succeeded(Payload::from_stdout(&out), elapsed)
            }
            Ok(Ok((status, _, err))) => {
                let stderr = String::from_utf8_lossy(&err).trim().to_string();
                tracing::debug!(args = %spec, ?elapsed, %status, "invocation failed");
                if stderr.is_empty() {
                    InvocationOutcome::failed(format!("exited with {status}"), elapsed)
                } else {
                    InvocationOutcome::failed(stderr, elapsed)
                }
            }
            Ok(Err(e)) => {
                // Lost the pipes or the wait; make sure the child does not linger.
                reap(&mut child).await;
                InvocationOutcome::failed(format!("i/o error while waiting for subject: {e}"), elapsed)
            }
            Err(_) => {
                tracing::debug!(args = %spec, ?elapsed, "invocation timed out");
                reap(&mut child).await;
                InvocationOutcome::timed_out(elapsed)
            }
        }
    }
}

async fn reap(child: &mut tokio::process::Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("kill failed (child already exited?): {e}");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!("failed to reap subject process: {e}");
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
