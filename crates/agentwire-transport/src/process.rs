//! Agent CLI process supervision
//!
//! Spawns the CLI with piped stdio and runs the three supervision tasks:
//! stdout reader (codec -> JSON values -> bounded channel), stderr reader
//! (observer + error latch), and a mutex-serialized writer. Termination is
//! staged: close stdin, wait a grace period, kill, reap.

use crate::codec::{LineReader, LineWriter, DEFAULT_MAX_LINE_LEN};
use crate::error::{Result, TransportError};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Stderr line observer invoked from the stderr reader task
///
/// May block briefly but must not stall; it runs inline on the reader.
pub type StderrObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Stderr pattern that latches a session-not-found error
const SESSION_NOT_FOUND_PATTERN: &str = "No conversation found with session ID: ";

/// Number of trailing stderr lines retained for process-exit errors
const STDERR_TAIL_LINES: usize = 20;

/// Configuration for spawning the Agent CLI
#[derive(Clone)]
pub struct ProcessConfig {
    /// Resolved path to the CLI executable.
    pub cli_path: PathBuf,

    /// Arguments to pass to the CLI.
    pub args: Vec<String>,

    /// Environment overlaid on the inherited environment.
    pub env: HashMap<String, String>,

    /// Working directory for the CLI, when set.
    pub cwd: Option<PathBuf>,

    /// Cap on a single buffered stdout line.
    pub max_line_len: usize,

    /// Capacity of the stdout value channel.
    pub channel_capacity: usize,

    /// How long `close` waits after closing stdin before killing.
    pub close_grace: Duration,

    /// How long `close` waits after killing before giving up on the reap.
    pub kill_grace: Duration,

    /// Optional stderr line observer.
    pub stderr_observer: Option<StderrObserver>,
}

impl std::fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("cli_path", &self.cli_path)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("max_line_len", &self.max_line_len)
            .field("channel_capacity", &self.channel_capacity)
            .field("has_stderr_observer", &self.stderr_observer.is_some())
            .finish()
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from(crate::discovery::CLI_BINARY),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            channel_capacity: 10,
            close_grace: Duration::from_secs(5),
            kill_grace: Duration::from_secs(2),
            stderr_observer: None,
        }
    }
}

impl ProcessConfig {
    /// Create a configuration for a resolved CLI path
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            ..Default::default()
        }
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overlay an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the line cap
    pub fn with_max_line_len(mut self, cap: usize) -> Self {
        self.max_line_len = cap;
        self
    }

    /// Set the stdout channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the stderr observer
    pub fn with_stderr_observer(mut self, observer: StderrObserver) -> Self {
        self.stderr_observer = Some(observer);
        self
    }
}

/// A spawned Agent CLI with its supervision tasks
#[derive(Debug)]
pub struct SubprocessTransport {
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<Option<LineWriter<ChildStdin>>>>,
    message_rx: Option<mpsc::Receiver<std::result::Result<serde_json::Value, TransportError>>>,
    latched: Arc<Mutex<Option<TransportError>>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    reader_handle: JoinHandle<()>,
    stderr_handle: JoinHandle<()>,
    config: ProcessConfig,
}

/// Rebuild a fatal error for the latch; context is preserved for the kinds
/// that carry structured fields, everything else degrades to Connection.
fn fatal_snapshot(err: &TransportError) -> TransportError {
    match err {
        TransportError::Overflow { limit } => TransportError::Overflow { limit: *limit },
        TransportError::SessionNotFound { session_id } => TransportError::SessionNotFound {
            session_id: session_id.clone(),
        },
        TransportError::Process {
            exit_code,
            stderr_tail,
        } => TransportError::Process {
            exit_code: *exit_code,
            stderr_tail: stderr_tail.clone(),
        },
        TransportError::Closed => TransportError::Closed,
        other => TransportError::Connection(other.to_string()),
    }
}

impl SubprocessTransport {
    /// Spawn the Agent CLI and start supervision
    pub fn spawn(config: ProcessConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.cli_path);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransportError::CliNotFound(config.cli_path.display().to_string())
            } else {
                TransportError::Connection(format!(
                    "failed to spawn {}: {e}",
                    config.cli_path.display()
                ))
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Connection("child stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Connection("child stdout not piped".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Connection("child stderr not piped".into()))?;

        let latched: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));
        let stderr_tail: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

        let reader_handle = {
            let latched = Arc::clone(&latched);
            let max_line_len = config.max_line_len;
            tokio::spawn(async move {
                let mut reader = LineReader::with_max_line_len(stdout, max_line_len);
                loop {
                    match reader.read_line().await {
                        Ok(Some(line)) => {
                            let item = match serde_json::from_slice::<serde_json::Value>(&line) {
                                Ok(value) => Ok(value),
                                Err(e) => Err(TransportError::decode(&line, e)),
                            };
                            // Bounded send: backpressure suspends this task
                            // instead of dropping messages.
                            if tx.send(item).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("agent stdout reached EOF");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "agent stdout stream failed");
                            {
                                let mut latch = latched.lock().await;
                                if latch.is_none() {
                                    *latch = Some(fatal_snapshot(&e));
                                }
                            }
                            let _ = tx.send(Err(e)).await;
                            break;
                        }
                    }
                }
            })
        };

        let stderr_handle = {
            let latched = Arc::clone(&latched);
            let tail = Arc::clone(&stderr_tail);
            let observer = config.stderr_observer.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(observer) = &observer {
                        observer(&line);
                    }
                    if let Some(rest) = line.split(SESSION_NOT_FOUND_PATTERN).nth(1) {
                        let session_id = rest.trim().to_string();
                        warn!(%session_id, "agent reported unknown session");
                        let mut latch = latched.lock().await;
                        if latch.is_none() {
                            *latch = Some(TransportError::SessionNotFound { session_id });
                        }
                    }
                    let mut tail = tail.lock().await;
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        };

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(Some(LineWriter::new(stdin)))),
            message_rx: Some(rx),
            latched,
            stderr_tail,
            reader_handle,
            stderr_handle,
            config,
        })
    }

    /// Take the stdout value stream
    ///
    /// Single consumer: the stream can be taken exactly once.
    pub fn messages(
        &mut self,
    ) -> Option<mpsc::Receiver<std::result::Result<serde_json::Value, TransportError>>> {
        self.message_rx.take()
    }

    /// Write one line to the CLI's stdin
    ///
    /// Writes are serialized on the writer lock and flushed before return.
    pub async fn write_line(&self, line: &[u8]) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        match guard.as_mut() {
            Some(writer) => writer.write_line(line).await,
            None => Err(TransportError::Closed),
        }
    }

    /// The latched fatal error, if any
    pub async fn latched_error(&self) -> Option<TransportError> {
        self.latched.lock().await.as_ref().map(fatal_snapshot)
    }

    /// Whether the process is still running
    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    /// Trailing stderr lines observed so far
    pub async fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail.lock().await.iter().cloned().collect()
    }

    /// Terminate the CLI: close stdin, wait, kill if needed, reap
    ///
    /// A non-zero exit latches a [`TransportError::Process`]; `close` itself
    /// only fails when the reap goes wrong at the OS level.
    pub async fn close(&self) -> Result<()> {
        // 1. Close stdin so a well-behaved CLI drains and exits.
        {
            let mut guard = self.stdin.lock().await;
            if let Some(mut writer) = guard.take() {
                let _ = writer.shutdown().await;
            }
        }

        // 2. Grace wait, then kill, then a second grace for the reap.
        let status = {
            let mut child = self.child.lock().await;
            match timeout(self.config.close_grace, child.wait()).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!("agent did not exit within grace, killing");
                    child.start_kill()?;
                    match timeout(self.config.kill_grace, child.wait()).await {
                        Ok(result) => result?,
                        Err(_) => child.wait().await?,
                    }
                }
            }
        };

        // 3. Reader tasks end on EOF; abort as a backstop.
        self.reader_handle.abort();
        self.stderr_handle.abort();

        if !status.success() {
            let tail = self.stderr_tail().await;
            let mut latch = self.latched.lock().await;
            if latch.is_none() {
                *latch = Some(TransportError::Process {
                    exit_code: status.code(),
                    stderr_tail: tail,
                });
            }
        }

        debug!(code = ?status.code(), "agent process reaped");
        Ok(())
    }
}
