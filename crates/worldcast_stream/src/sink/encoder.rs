//! # Encoder Subprocess
//!
//! Shared plumbing for the container and live sinks: spawn the encoder with
//! stdin piped, hand stdin to a [`SinkWriter`], and on close wait for the
//! process with a deadline.
//!
//! stdout/stderr are diagnostic only. They go to `/dev/null` unless
//! `encoder.log_output` is set, in which case reader threads forward each
//! line to `debug!` so a full pipe can never stall the encoder.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use worldcast_core::{EncoderConfig, SinkKind};

use super::writer::SinkWriter;
use super::{DrainResult, Sink, SinkState, WriteOutcome};
use crate::encode::WireFormat;
use crate::error::{SinkError, SinkResult};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running encoder process.
pub struct EncoderProcess {
    child: Child,
    program: String,
    log_threads: Vec<JoinHandle<()>>,
}

impl EncoderProcess {
    /// Spawns `program args...` with stdin piped.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Spawn`] if the process cannot be started.
    pub fn spawn(program: &str, args: &[String], log_output: bool) -> SinkResult<(Self, ChildStdin)> {
        let output = || if log_output { Stdio::piped() } else { Stdio::null() };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(output())
            .stderr(output())
            .spawn()
            .map_err(|e| SinkError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| SinkError::Spawn {
            program: program.to_string(),
            reason: "stdin was not captured".into(),
        })?;

        let mut log_threads = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            log_threads.extend(forward_lines("encoder-stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            log_threads.extend(forward_lines("encoder-stderr", stderr));
        }

        info!("Spawned encoder {} (pid {})", program, child.id());
        Ok((
            Self {
                child,
                program: program.to_string(),
                log_threads,
            },
            stdin,
        ))
    }

    /// Waits for the process to exit, killing it once `timeout` expires.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::SubprocessExit`] for an unsuccessful exit and
    /// [`SinkError::ShutdownTimeout`] if it had to be killed.
    #[allow(clippy::cast_possible_truncation)]
    pub fn wait_with_timeout(&mut self, timeout: Duration) -> SinkResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.join_log_threads();
                debug!("Encoder {} exited with {}", self.program, status);
                return if status.success() {
                    Ok(())
                } else {
                    Err(SinkError::SubprocessExit {
                        code: status.code(),
                    })
                };
            }
            if Instant::now() >= deadline {
                warn!("Encoder {} did not exit in time, killing it", self.program);
                self.kill();
                return Err(SinkError::ShutdownTimeout {
                    after_ms: timeout.as_millis() as u64,
                });
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Kills the process and reaps it.
    pub fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Kill of encoder {} failed: {}", self.program, e);
        }
        let _ = self.child.wait();
        self.join_log_threads();
    }

    fn join_log_threads(&mut self) {
        for handle in self.log_threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(name: &str, stream: R) -> Option<JoinHandle<()>> {
    let target = name.to_string();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) => debug!("[{}] {}", target, line),
                    Err(_) => break,
                }
            }
        })
        .map_err(|e| warn!("Could not start {} reader: {}", name, e))
        .ok()
}

/// Encoder process plus the drain thread feeding its stdin.
pub(crate) struct EncoderSink {
    kind: SinkKind,
    writer: SinkWriter,
    process: EncoderProcess,
    closed: Option<SinkResult<()>>,
}

impl EncoderSink {
    pub(crate) fn spawn(kind: SinkKind, encoder: &EncoderConfig, args: &[String]) -> SinkResult<Self> {
        let (mut process, stdin) = EncoderProcess::spawn(&encoder.program, args, encoder.log_output)?;
        let writer = match SinkWriter::spawn("worldcast-encoder-stdin", move || Ok(stdin)) {
            Ok(writer) => writer,
            Err(e) => {
                process.kill();
                return Err(e);
            }
        };
        Ok(Self {
            kind,
            writer,
            process,
            closed: None,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn shutdown(&mut self, timeout: Duration) -> SinkResult<()> {
        let deadline = Instant::now() + timeout;
        // Dropping stdin is the encoder's end-of-input signal.
        self.writer.finish();
        if !self.writer.join(timeout) {
            self.process.kill();
            self.writer.join(Duration::from_secs(1));
            return Err(SinkError::ShutdownTimeout {
                after_ms: timeout.as_millis() as u64,
            });
        }
        self.process
            .wait_with_timeout(deadline.saturating_duration_since(Instant::now()))
    }
}

impl Sink for EncoderSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::ImageSequence
    }

    fn state(&self) -> SinkState {
        if self.closed.is_some() {
            SinkState::Closed
        } else {
            self.writer.state()
        }
    }

    fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        self.writer.write(bytes)
    }

    fn drained(&self) -> crossbeam_channel::Receiver<DrainResult> {
        self.writer.drained()
    }

    fn close(&mut self, timeout: Duration) -> SinkResult<()> {
        if let Some(result) = &self.closed {
            return result.clone();
        }
        let result = self.shutdown(timeout);
        match &result {
            Ok(()) => info!("{} encoder finished cleanly", self.kind),
            Err(e) => warn!("{} encoder close: {}", self.kind, e),
        }
        self.closed = Some(result.clone());
        result
    }
}
