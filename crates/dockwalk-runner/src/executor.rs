use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::process::ProcessError;

/// One external command: program, argument vector, working directory and timeout.
///
/// Arguments are passed to the OS as is; nothing goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Decides which lines of build output are hidden from the operator.
///
/// Filtering only affects what is printed; the exit status alone decides
/// success.
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
    ignore: Vec<String>,
}

impl OutputFilter {
    pub fn new<I, S>(ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore: ignore
                .into_iter()
                .map(Into::into)
                .filter(|pattern: &String| !pattern.is_empty())
                .collect(),
        }
    }

    pub fn suppresses(&self, line: &str) -> bool {
        self.ignore.iter().any(|pattern| line.contains(pattern.as_str()))
    }
}

/// Abstraction over external command execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Run a command and capture stdout.
    async fn exec(&self, invocation: &Invocation) -> Result<String, ProcessError>;

    /// Run a command, echoing stdout line by line except suppressed lines.
    async fn exec_filtered(
        &self,
        invocation: &Invocation,
        filter: &OutputFilter,
    ) -> Result<(), ProcessError>;

    /// Run a command with data piped to stdin.
    async fn exec_with_stdin(
        &self,
        invocation: &Invocation,
        stdin_data: &[u8],
    ) -> Result<String, ProcessError>;

    /// Run `producer | consumer > destination`.
    ///
    /// The producer's timeout bounds the whole pipeline.
    async fn exec_pipeline(
        &self,
        producer: &Invocation,
        consumer: &Invocation,
        destination: &Path,
    ) -> Result<(), ProcessError>;
}

/// Executor backed by real OS processes.
///
/// Children are killed when their future is dropped, so timeouts and
/// cancellation never leave processes behind.
pub struct RealExecutor;

impl CommandExecutor for RealExecutor {
    async fn exec(&self, invocation: &Invocation) -> Result<String, ProcessError> {
        tracing::debug!("running: {invocation}");
        bounded(invocation, async {
            let output = invocation
                .command()
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| spawn_error(invocation, e))?;

            if output.status.success() {
                String::from_utf8(output.stdout).map_err(|e| ProcessError::InvalidUtf8 {
                    invocation: invocation.to_string(),
                    source: e,
                })
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                Err(failed(invocation, output.status, stderr))
            }
        })
        .await
    }

    async fn exec_filtered(
        &self,
        invocation: &Invocation,
        filter: &OutputFilter,
    ) -> Result<(), ProcessError> {
        tracing::debug!("running: {invocation}");
        bounded(invocation, async {
            let mut child = invocation
                .command()
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| spawn_error(invocation, e))?;

            let stdout = child.stdout.take().ok_or_else(|| {
                io_error(invocation, "capture stdout", std::io::Error::other("stdout not piped"))
            })?;

            // Drain stdout as it arrives so the child never blocks on a full pipe.
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let read = reader
                    .read_until(b'\n', &mut buf)
                    .await
                    .map_err(|e| io_error(invocation, "read stdout", e))?;
                if read == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if !filter.suppresses(line) {
                    println!("{line}");
                }
            }

            let status = child
                .wait()
                .await
                .map_err(|e| io_error(invocation, "wait for exit", e))?;

            if status.success() {
                Ok(())
            } else {
                Err(failed(invocation, status, String::new()))
            }
        })
        .await
    }

    async fn exec_with_stdin(
        &self,
        invocation: &Invocation,
        stdin_data: &[u8],
    ) -> Result<String, ProcessError> {
        tracing::debug!("running: {invocation}");
        bounded(invocation, async {
            let mut child = invocation
                .command()
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| spawn_error(invocation, e))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(stdin_data)
                    .await
                    .map_err(|e| stdin_error(invocation, e))?;
                stdin
                    .shutdown()
                    .await
                    .map_err(|e| stdin_error(invocation, e))?;
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| io_error(invocation, "wait for exit", e))?;

            if output.status.success() {
                String::from_utf8(output.stdout).map_err(|e| ProcessError::InvalidUtf8 {
                    invocation: invocation.to_string(),
                    source: e,
                })
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                Err(failed(invocation, output.status, stderr))
            }
        })
        .await
    }

    async fn exec_pipeline(
        &self,
        producer: &Invocation,
        consumer: &Invocation,
        destination: &Path,
    ) -> Result<(), ProcessError> {
        tracing::debug!(
            "running: {producer} | {consumer} > {}",
            destination.display()
        );
        bounded(producer, async {
            let file = std::fs::File::create(destination)
                .map_err(|e| io_error(consumer, "create output file", e))?;

            let mut upstream = producer
                .command()
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| spawn_error(producer, e))?;

            let pipe: Stdio = upstream
                .stdout
                .take()
                .ok_or_else(|| {
                    io_error(producer, "capture stdout", std::io::Error::other("stdout not piped"))
                })?
                .try_into()
                .map_err(|e| io_error(producer, "connect pipe", e))?;

            let mut downstream = consumer
                .command()
                .stdin(pipe)
                .stdout(Stdio::from(file))
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| spawn_error(consumer, e))?;

            let (up, down) = tokio::join!(upstream.wait(), downstream.wait());
            let up = up.map_err(|e| io_error(producer, "wait for exit", e))?;
            let down = down.map_err(|e| io_error(consumer, "wait for exit", e))?;

            if !up.success() {
                return Err(failed(producer, up, String::new()));
            }
            if !down.success() {
                return Err(failed(consumer, down, String::new()));
            }
            Ok(())
        })
        .await
    }
}

async fn bounded<T, F>(invocation: &Invocation, fut: F) -> Result<T, ProcessError>
where
    F: Future<Output = Result<T, ProcessError>>,
{
    match invocation.timeout {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| ProcessError::TimedOut {
                invocation: invocation.to_string(),
                after,
            })?,
        None => fut.await,
    }
}

fn spawn_error(invocation: &Invocation, source: std::io::Error) -> ProcessError {
    ProcessError::Spawn {
        program: invocation.program.clone(),
        source,
    }
}

fn stdin_error(invocation: &Invocation, source: std::io::Error) -> ProcessError {
    ProcessError::StdinWrite {
        program: invocation.program.clone(),
        source,
    }
}

fn io_error(invocation: &Invocation, context: &'static str, source: std::io::Error) -> ProcessError {
    ProcessError::Io {
        invocation: invocation.to_string(),
        context,
        source,
    }
}

fn failed(invocation: &Invocation, status: ExitStatus, stderr: String) -> ProcessError {
    ProcessError::Failed {
        invocation: invocation.to_string(),
        status: status.to_string(),
        stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_substrings() {
        let filter = OutputFilter::new(["Preparing to unpack", "update-alternatives"]);

        assert!(filter.suppresses("Preparing to unpack .../libc6_2.24.deb ..."));
        assert!(filter.suppresses("update-alternatives: using /usr/bin/vim"));
        assert!(!filter.suppresses("Step 3/9 : RUN apt-get update"));
    }

    #[test]
    fn empty_filter_suppresses_nothing() {
        let filter = OutputFilter::new(Vec::<String>::new());
        assert!(!filter.suppresses("anything"));
    }

    #[test]
    fn empty_pattern_is_ignored() {
        let filter = OutputFilter::new([""]);
        assert!(!filter.suppresses("anything"));
    }

    #[test]
    fn invocation_displays_as_command_line() {
        let inv = Invocation::new("docker").args(["push", "img:v1"]);
        assert_eq!(inv.to_string(), "docker push img:v1");
    }

    #[tokio::test]
    async fn exec_captures_stdout() {
        let inv = Invocation::new("sh").args(["-c", "echo hello"]);
        let out = RealExecutor.exec(&inv).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn exec_reports_non_zero_exit() {
        let inv = Invocation::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let err = RealExecutor.exec(&inv).await.unwrap_err();
        match err {
            ProcessError::Failed { stderr, .. } => assert_eq!(stderr.trim(), "oops"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exec_reports_missing_program() {
        let inv = Invocation::new("dockwalk-no-such-program");
        let err = RealExecutor.exec(&inv).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn exec_respects_working_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("marker"), "").unwrap();
        let inv = Invocation::new("ls").current_dir(tmp.path());
        let out = RealExecutor.exec(&inv).await.unwrap();
        assert_eq!(out.trim(), "marker");
    }

    #[tokio::test]
    async fn exec_times_out() {
        let inv = Invocation::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)));
        let err = RealExecutor.exec(&inv).await.unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn exec_filtered_fails_on_non_zero_exit_even_when_output_suppressed() {
        let inv = Invocation::new("sh").args(["-c", "echo noisy; exit 1"]);
        let filter = OutputFilter::new(["noisy"]);
        let err = RealExecutor.exec_filtered(&inv, &filter).await.unwrap_err();
        assert!(matches!(err, ProcessError::Failed { .. }));
    }

    #[tokio::test]
    async fn exec_filtered_succeeds() {
        let inv = Invocation::new("sh").args(["-c", "echo one; echo two"]);
        RealExecutor
            .exec_filtered(&inv, &OutputFilter::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exec_with_stdin_feeds_data() {
        let inv = Invocation::new("cat");
        let out = RealExecutor.exec_with_stdin(&inv, b"secret").await.unwrap();
        assert_eq!(out, "secret");
    }

    #[tokio::test]
    async fn pipeline_writes_consumer_output_to_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("out.txt");
        let producer = Invocation::new("sh").args(["-c", "printf 'a\\nb\\n'"]);
        let consumer = Invocation::new("tr").args(["a-z", "A-Z"]);

        RealExecutor
            .exec_pipeline(&producer, &consumer, &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dest).unwrap(), "A\nB\n");
    }

    #[tokio::test]
    async fn pipeline_reports_producer_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("out.txt");
        let producer = Invocation::new("sh").args(["-c", "exit 2"]);
        let consumer = Invocation::new("cat");

        let err = RealExecutor
            .exec_pipeline(&producer, &consumer, &dest)
            .await
            .unwrap_err();

        match err {
            ProcessError::Failed { invocation, .. } => assert!(invocation.starts_with("sh")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
