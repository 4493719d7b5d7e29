//! External inspection engine invocation.
//!
//! # Responsibilities
//! - Drain the upload into a pooled buffer
//! - Run the engine as a child process, feeding the content on stdin
//! - Enforce a hard deadline, killing (and reaping) the child on expiry
//! - Classify exit status and output into a [`ScanVerdict`]
//!
//! # Design Decisions
//! - The engine reads stdin to EOF, so the whole file is buffered first;
//!   admission control is what keeps that memory bounded
//! - One process per call, never retried: a silent re-scan could turn an
//!   engine crash into a false "clean"
//! - Unparseable infected output degrades to an empty threat name

use std::process::Stdio;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};

use crate::config::EngineConfig;
use crate::scan::error::{BoxError, ScanError};
use crate::scan::pool::BufferPool;
use crate::scan::verdict::ScanVerdict;

/// Token the engine prints after a threat name.
const FOUND_MARKER: &str = "FOUND";
/// Separator between the scanned path and the threat name.
const FIELD_SEPARATOR: char = ':';

/// Handle to the configured engine executable.
#[derive(Debug, Clone)]
pub struct InspectionEngine {
    program: String,
    args: Vec<String>,
    label: String,
    infected_exit_code: i32,
    config_error_exit_code: i32,
}

impl InspectionEngine {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.command_args(),
            label: config.label.clone(),
            infected_exit_code: config.infected_exit_code,
            config_error_exit_code: config.config_error_exit_code,
        }
    }

    /// Label reported alongside verdicts.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Drain `stream` into a buffer from `pool` and scan it.
    ///
    /// `deadline` covers both receiving the upload and the engine run.
    pub async fn inspect<S, E>(
        &self,
        stream: S,
        deadline: Duration,
        pool: &BufferPool,
    ) -> Result<ScanVerdict, ScanError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let started = Instant::now();
        let mut content = pool.checkout();
        tokio::time::timeout(deadline, drain_into(stream, &mut content))
            .await
            .map_err(|_| ScanError::read_timeout(deadline))??;

        self.run(&content, deadline.saturating_sub(started.elapsed())).await
    }

    /// Run the engine over `input`.
    pub async fn run(&self, input: &[u8], deadline: Duration) -> Result<ScanVerdict, ScanError> {
        let started = Instant::now();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScanError::EngineProcessStart {
                program: self.program.clone(),
                source,
            })?;

        tracing::debug!(
            program = %self.program,
            pid = ?child.id(),
            bytes = input.len(),
            "Engine process started"
        );

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::time::timeout(deadline, async {
            let (fed, out, err, status) = tokio::join!(
                feed_stdin(stdin, input),
                read_pipe(stdout),
                read_pipe(stderr),
                child.wait(),
            );
            fed?;
            let mut output = out?;
            output.extend_from_slice(&err?);
            Ok::<_, std::io::Error>((status?, output))
        })
        .await;

        let (status, output) = match finished {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                // The child may still be alive if a pipe failed first.
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!(error = %kill_err, "Failed to kill engine after I/O error");
                }
                return Err(ScanError::EngineIo(e));
            }
            Err(_) => {
                tracing::warn!(
                    program = %self.program,
                    deadline_secs = deadline.as_secs_f64(),
                    "Engine deadline exceeded, killing process"
                );
                // `kill` also waits, so no zombie is left behind.
                if let Err(kill_err) = child.kill().await {
                    tracing::error!(error = %kill_err, "Failed to kill timed out engine");
                }
                return Err(ScanError::EngineTimeout(deadline));
            }
        };

        let output = String::from_utf8_lossy(&output).trim().to_string();
        let code = status.code();

        tracing::debug!(
            exit_code = ?code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Engine process finished"
        );

        self.classify(code, output)
    }

    /// Map an exit status and combined output to a verdict.
    pub fn classify(&self, code: Option<i32>, output: String) -> Result<ScanVerdict, ScanError> {
        match code {
            Some(0) => Ok(ScanVerdict::clean()),
            Some(c) if c == self.infected_exit_code => {
                Ok(ScanVerdict::infected(parse_threat_name(&output)))
            }
            Some(c) if c == self.config_error_exit_code => Err(ScanError::EngineConfig { output }),
            code => Err(ScanError::EngineExit { code, output }),
        }
    }
}

/// Extract the threat name from engine output.
///
/// Takes the text between the last `:` before the first `FOUND` and that
/// marker. Returns an empty string when either piece is missing.
pub fn parse_threat_name(output: &str) -> String {
    let Some(marker) = output.find(FOUND_MARKER) else {
        return String::new();
    };
    let head = &output[..marker];
    match head.rfind(FIELD_SEPARATOR) {
        Some(sep) => head[sep + FIELD_SEPARATOR.len_utf8()..].trim().to_string(),
        None => String::new(),
    }
}

/// Append every chunk of `stream` to `buf`.
pub async fn drain_into<S, E>(stream: S, buf: &mut Vec<u8>) -> Result<(), ScanError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut stream = std::pin::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ScanError::from_read(e.into()))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(())
}

async fn feed_stdin(stdin: Option<ChildStdin>, input: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(input).await {
        // The engine may stop reading early, e.g. on a config error.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e),
        // Dropping stdin closes the pipe and signals EOF.
        Ok(()) => Ok(()),
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut out).await?;
    }
    Ok(out)
}
