//! Child process transport
//!
//! The game runs as a plain child process with piped stdin/stdout. A
//! background reader thread pumps its output into a channel in arrival order;
//! the engine is the only consumer of that channel.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::GameConfig;

/// Size of a single read from the child's stdout
const READ_CHUNK: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write to child process: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to read from child process: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to remove stale save file {path}: {source}")]
    StaleSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Child process is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// Byte pipe to and from a running child.
pub trait Transport: Send {
    /// Write keystrokes to the child's input
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Next output chunk, waiting at most `timeout`. `None` on timeout or
    /// once the output stream has closed.
    fn read_timeout(&mut self, timeout: Duration) -> Option<Vec<u8>>;

    /// Whether the output stream is still open
    fn is_running(&self) -> bool;

    /// Stop the child, giving it `grace` to exit on its own first
    fn terminate(&mut self, _grace: Duration) {}
}

/// Starts a fresh child for each episode.
pub trait Launcher {
    type Transport: Transport;

    fn launch(&mut self, cols: u16, rows: u16) -> Result<Self::Transport>;
}

/// A spawned child with a reader thread on its stdout
pub struct ChildProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    /// Cleared by the reader thread when stdout closes
    running: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    output_rx: Receiver<Vec<u8>>,
}

impl ChildProcess {
    /// Spawn `command` with piped stdin/stdout and start the reader thread
    pub fn spawn(command: &mut Command) -> Result<Self> {
        let program = command.get_program().to_string_lossy().into_owned();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::NotRunning);
        };

        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        let flag = running.clone();
        let reader = thread::Builder::new()
            .name("child-output".to_string())
            .spawn(move || {
                let mut buffer = vec![0u8; READ_CHUNK];
                loop {
                    match stdout.read(&mut buffer) {
                        // EOF - child closed its output
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buffer[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tracing::debug!("{}", ProcessError::Read(e));
                            break;
                        }
                    }
                }
                flag.store(false, Ordering::SeqCst);
                tracing::debug!("Output reader exiting");
            });

        let reader_thread = match reader {
            Ok(handle) => handle,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Spawn { program, source });
            }
        };

        tracing::info!("Spawned {} (pid {})", program, child.id());

        Ok(Self {
            child,
            stdin,
            running,
            reader_thread: Some(reader_thread),
            output_rx: rx,
        })
    }

    fn reap(&mut self, grace: Duration) {
        // Closing stdin lets a well-behaved child notice and exit
        self.stdin = None;

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("Child exited: {}", status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(10));
                }
                Ok(None) | Err(_) => {
                    tracing::info!("Killing child process");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }

        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Transport for ChildProcess {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(ProcessError::NotRunning)?;
        stdin.write_all(data).map_err(ProcessError::Write)?;
        stdin.flush().map_err(ProcessError::Write)
    }

    fn read_timeout(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        match self.output_rx.recv_timeout(timeout) {
            Ok(data) => Some(data),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // Keep callers' poll loops paced even with nothing left to read
                thread::sleep(timeout);
                None
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn terminate(&mut self, grace: Duration) {
        if self.reader_thread.is_some() {
            self.reap(grace);
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.terminate(Duration::ZERO);
    }
}

/// Launches the game binary described by [`GameConfig`]
pub struct CrawlLauncher {
    config: GameConfig,
}

impl CrawlLauncher {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    /// Save file left behind by a previous run of the same character
    pub fn save_path(&self) -> PathBuf {
        self.config
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saves")
            .join(format!("{}.cs", self.config.character_name))
    }

    /// Build the command line; the game then starts a new character directly
    pub fn command(&self, cols: u16, rows: u16) -> Command {
        let config = &self.config;
        let mut command = Command::new(&config.binary);
        command
            .args(["-dir", "."])
            .arg("-rc")
            .arg(&config.rc_file)
            .args(["-name", config.character_name.as_str()])
            .args(["-species", config.species.as_str()])
            .args(["-background", config.background.as_str()])
            .args(&config.extra_args)
            .env("TERM", &config.term)
            .env("LINES", rows.to_string())
            .env("COLUMNS", cols.to_string());
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }
        command
    }

    fn remove_stale_save(&self) -> Result<()> {
        let path = self.save_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|source| ProcessError::StaleSave {
                path: path.clone(),
                source,
            })?;
            tracing::info!("Removed stale save {}", path.display());
        }
        Ok(())
    }
}

impl Launcher for CrawlLauncher {
    type Transport = ChildProcess;

    fn launch(&mut self, cols: u16, rows: u16) -> Result<ChildProcess> {
        self.remove_stale_save()?;
        let mut command = self.command(cols, rows);
        tracing::info!("Starting: {:?}", command);
        ChildProcess::spawn(&mut command)
    }
}
