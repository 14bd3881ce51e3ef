//! Streaming test execution
//!
//! Runs the test command as a child process and turns its JSON output into
//! [`TestEvent`]s. Supervision of the child (draining its pipes, waiting for
//! exit, enforcing the deadline) runs on its own task; decoding and observer
//! dispatch run on the caller's task, fed line by line through a channel so
//! a slow observer never blocks the child on a full pipe.

use std::io::Write;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::EventObserver;
use crate::error::{ChunkError, Result};
use crate::models::TestEvent;

/// How long a process may keep running once its output is no longer read
pub const DEFAULT_ABORT_GRACE: Duration = Duration::from_secs(5);

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Events decoded and dispatched
    pub events: usize,

    pub exit_code: Option<i32>,

    pub elapsed: Duration,
}

/// How the supervised process ended
enum Exit {
    Exited {
        status: ExitStatus,
        stream: Option<std::io::Error>,
    },
    WaitFailed(std::io::Error),
    TimedOut(Duration),
    /// Still running after dispatch stopped and the grace period ran out
    Abandoned(Duration),
}

/// What the supervisor reports back to `run`
#[derive(Default)]
struct Supervised {
    exit_code: Option<i32>,
    /// The process failed, timed out or could not be waited on
    failure: Option<ChunkError>,
    /// Stdout could not be read to the end
    stream: Option<ChunkError>,
}

/// Supervises one test process and fans its events out to observers
pub struct EventStreamRunner<'a> {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    observers: Vec<&'a mut dyn EventObserver>,
    raw_output: Option<Box<dyn Write + Send + 'a>>,
    deadline: Option<Duration>,
    abort_grace: Duration,
}

impl<'a> EventStreamRunner<'a> {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            dir: None,
            observers: Vec::new(),
            raw_output: None,
            deadline: None,
            abort_grace: DEFAULT_ABORT_GRACE,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Register an observer; observers see each event in registration order
    pub fn observer(mut self, observer: &'a mut dyn EventObserver) -> Self {
        self.observers.push(observer);
        self
    }

    /// Copy every raw output line to `sink`
    pub fn raw_output(mut self, sink: impl Write + Send + 'a) -> Self {
        self.raw_output = Some(Box::new(sink));
        self
    }

    /// Kill the process if it has not exited within `deadline`
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Kill the process if it is still running `grace` after dispatch stopped
    pub fn abort_grace(mut self, grace: Duration) -> Self {
        self.abort_grace = grace;
        self
    }

    /// Command line for logs and errors
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the process to completion
    ///
    /// Succeeds only if the process exits successfully and every output line
    /// was decoded and accepted by every observer. A process that fails or
    /// times out is reported as [`ChunkError::Subprocess`] with its stderr,
    /// whatever happened to its output; decode and observer errors are
    /// reported only when the process itself did not fail. Both the
    /// supervision task and the dispatch loop finish before this returns.
    pub async fn run(mut self) -> Result<RunReport> {
        let command = self.command_line();
        info!("Running {}", command);
        let start = Instant::now();

        let mut child = self.spawn(&command)?;
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                return Err(ChunkError::Subprocess {
                    command,
                    status: "has no output pipes".to_string(),
                    stderr: String::new(),
                })
            }
        };

        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(
            child,
            stdout,
            stderr,
            lines_tx,
            self.deadline,
            self.abort_grace,
            command.clone(),
        ));

        let (dispatched, supervised) = tokio::join!(self.dispatch(lines_rx), supervisor);
        let supervised = supervised.unwrap_or_else(|e| Supervised {
            failure: Some(ChunkError::Subprocess {
                command: command.clone(),
                status: format!("supervision failed: {e}"),
                stderr: String::new(),
            }),
            ..Supervised::default()
        });

        let elapsed = start.elapsed();
        if let Some(failure) = supervised.failure {
            if let Err(ref err) = dispatched {
                debug!("Output of {} was not fully processed: {}", command, err);
            }
            debug!("Run of {} failed after {}ms", command, elapsed.as_millis());
            return Err(failure);
        }
        let events = dispatched?;
        if let Some(err) = supervised.stream {
            return Err(err);
        }

        debug!(
            "Dispatched {} events in {}ms (exit code {:?})",
            events,
            elapsed.as_millis(),
            supervised.exit_code
        );
        Ok(RunReport {
            events,
            exit_code: supervised.exit_code,
            elapsed,
        })
    }

    fn spawn(&self, command: &str) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.dir {
            cmd.current_dir(dir);
        }

        cmd.spawn().map_err(|e| ChunkError::Subprocess {
            command: command.to_string(),
            status: "could not be started".to_string(),
            stderr: e.to_string(),
        })
    }

    /// Decode lines in arrival order and hand each event to every observer
    ///
    /// Stops at the first failure. Dropping the receiver tells the
    /// supervisor that nobody reads the output any more.
    async fn dispatch(&mut self, mut lines: UnboundedReceiver<String>) -> Result<usize> {
        let mut dispatched = 0;
        let mut line_number = 0;

        while let Some(line) = lines.recv().await {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let event: TestEvent =
                serde_json::from_str(&line).map_err(|source| ChunkError::Decode {
                    line: line_number,
                    text: line.clone(),
                    source,
                })?;
            self.notify(&event, &line)?;
            dispatched += 1;
        }

        Ok(dispatched)
    }

    fn notify(&mut self, event: &TestEvent, line: &str) -> Result<()> {
        for observer in self.observers.iter_mut() {
            observer
                .handle(event)
                .map_err(|e| ChunkError::Observer {
                    observer: observer.name().to_string(),
                    source: e.into(),
                })?;
        }

        if let Some(sink) = self.raw_output.as_mut() {
            writeln!(sink, "{line}").map_err(|e| ChunkError::Observer {
                observer: "raw output".to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

/// Drain the child's pipes, wait for it to exit and classify the result
async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    lines: UnboundedSender<String>,
    deadline: Option<Duration>,
    grace: Duration,
    command: String,
) -> Supervised {
    let stderr_task = tokio::spawn(capture(stderr));

    let watched = watch(&mut child, stdout, &lines, grace);
    let exit = match deadline {
        Some(limit) => tokio::time::timeout(limit, watched)
            .await
            .unwrap_or(Exit::TimedOut(limit)),
        None => watched.await,
    };

    let (status, stream) = match exit {
        Exit::Exited { status, stream } => (status, stream),
        Exit::TimedOut(limit) => {
            error!("{} exceeded its deadline of {:?}, killing it", command, limit);
            stop(&mut child, &command).await;
            stderr_task.abort();
            return Supervised {
                failure: Some(ChunkError::Subprocess {
                    command,
                    status: format!("timed out after {limit:?}"),
                    stderr: String::new(),
                }),
                ..Supervised::default()
            };
        }
        Exit::Abandoned(grace) => {
            warn!(
                "{} still running {:?} after its output was abandoned, killing it",
                command, grace
            );
            stop(&mut child, &command).await;
            stderr_task.abort();
            return Supervised::default();
        }
        Exit::WaitFailed(e) => {
            return Supervised {
                failure: Some(ChunkError::Subprocess {
                    command,
                    status: format!("could not be waited on: {e}"),
                    stderr: collect(stderr_task).await,
                }),
                ..Supervised::default()
            };
        }
    };

    let stderr = collect(stderr_task).await;
    let stream = stream.map(ChunkError::Stream);
    if status.success() {
        debug!("{} exited successfully", command);
        return Supervised {
            exit_code: status.code(),
            failure: None,
            stream,
        };
    }

    error!(
        "Test command failed (exit code {:?}):\n{}",
        status.code(),
        stderr
    );
    Supervised {
        exit_code: status.code(),
        failure: Some(ChunkError::Subprocess {
            command,
            status: format!("failed with {status}"),
            stderr,
        }),
        stream,
    }
}

/// Wait for the process, giving up `grace` after dispatch stops reading
async fn watch(
    child: &mut Child,
    stdout: ChildStdout,
    lines: &UnboundedSender<String>,
    grace: Duration,
) -> Exit {
    let drained = drain_and_wait(child, stdout, lines);
    tokio::pin!(drained);

    tokio::select! {
        exit = &mut drained => return exit,
        _ = lines.closed() => {}
    }

    debug!("Dispatch stopped, waiting up to {:?} for the process to exit", grace);
    tokio::time::timeout(grace, drained)
        .await
        .unwrap_or(Exit::Abandoned(grace))
}

/// Forward stdout line by line, then wait for exit
async fn drain_and_wait(
    child: &mut Child,
    stdout: ChildStdout,
    lines: &UnboundedSender<String>,
) -> Exit {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut stream = None;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                // once dispatch stops the line is dropped, the pipe still drains
                let _ = lines.send(line);
            }
            Err(e) => {
                stream = Some(e);
                break;
            }
        }
    }
    drop(reader);

    match child.wait().await {
        Ok(status) => Exit::Exited { status, stream },
        Err(e) => Exit::WaitFailed(e),
    }
}

async fn stop(child: &mut Child, command: &str) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill {}: {}", command, e);
    }
}

async fn capture(mut stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut buf).await {
        warn!("Error reading stderr: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(task: tokio::task::JoinHandle<String>) -> String {
    task.await.unwrap_or_else(|e| {
        warn!("Lost stderr: {}", e);
        String::new()
    })
}
