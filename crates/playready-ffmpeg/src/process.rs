//! Subprocess plumbing shared by every conversion.
//!
//! # Design
//! - Children are spawned with `kill_on_drop`, so dropping the future (or
//!   cancelling the token) terminates the process.
//! - Only the tail of stderr is kept for diagnostics.
//! - A followed source is pumped into stdin concurrently with draining stdout.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use playready_library::GrowingFileReader;
use playready_media_core::{MediaError, MediaResult};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const STDERR_TAIL_BYTES: usize = 4 * 1024;

/// Where a child's stdout goes.
pub enum Output<'a> {
    /// Ignore stdout.
    Discard,
    /// Hand each stdout line to the callback.
    Lines(&'a mut (dyn FnMut(&str) + Send)),
    /// Copy stdout verbatim into the writer.
    Forward(&'a mut (dyn AsyncWrite + Send + Unpin)),
}

/// Run `program` to completion.
///
/// # Errors
///
/// Returns [`MediaError::Backend`] when the process cannot be spawned, exits
/// unsuccessfully, or is cancelled, and [`MediaError::Io`] when forwarding
/// stdout fails.
pub async fn run(
    operation: &'static str,
    program: &Path,
    args: &[String],
    stdin: Option<GrowingFileReader>,
    output: Output<'_>,
    cancel: &CancellationToken,
) -> MediaResult<()> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(match output {
            Output::Discard => Stdio::null(),
            Output::Lines(_) | Output::Forward(_) => Stdio::piped(),
        })
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program_name = program.display().to_string();
    let mut child = command.spawn().map_err(|err| {
        MediaError::backend(operation, format!("failed to start {program_name}: {err}"))
    })?;
    debug!(program = %program_name, operation, "subprocess started");

    let stderr_tail = child.stderr.take().map(|stderr| tokio::spawn(read_tail(stderr)));
    let stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take();

    let feed = async move {
        if let (Some(reader), Some(mut pipe)) = (stdin, stdin_pipe)
            && let Err(err) = reader.pump_into(&mut pipe).await
        {
            debug!(error = %err, "stopped feeding subprocess input");
        }
    };
    let drain = drain_stdout(stdout_pipe, output);

    let process = async {
        let waited = async {
            tokio::pin!(feed);
            let early = tokio::select! {
                status = child.wait() => Some(status),
                () = &mut feed => None,
            };
            match early {
                Some(status) => status,
                None => child.wait().await,
            }
        };
        tokio::join!(waited, drain)
    };

    let (status, drained) = tokio::select! {
        () = cancel.cancelled() => {
            return Err(MediaError::backend(operation, format!("{program_name} cancelled")));
        }
        result = process => result,
    };

    let tail = match stderr_tail {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };
    let status = status.map_err(|err| {
        MediaError::backend(operation, format!("failed to wait for {program_name}: {err}"))
    })?;
    check_status(operation, &program_name, status, &tail)?;
    drained.map_err(|source| MediaError::io(operation, program, source))
}

/// Run `program` and return its trimmed stdout when it exits successfully.
///
/// # Errors
///
/// Returns [`MediaError::Backend`] when the process cannot be spawned or fails.
pub async fn capture(
    operation: &'static str,
    program: &Path,
    args: &[String],
) -> MediaResult<String> {
    let program_name = program.display().to_string();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| {
            MediaError::backend(operation, format!("failed to start {program_name}: {err}"))
        })?;
    let tail = String::from_utf8_lossy(&output.stderr).trim().to_string();
    check_status(operation, &program_name, output.status, &tail)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn check_status(
    operation: &'static str,
    program: &str,
    status: ExitStatus,
    stderr: &str,
) -> MediaResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(MediaError::backend(
        operation,
        format!("{program} failed: {status}: {}", stderr.trim()),
    ))
}

async fn drain_stdout<R>(stdout: Option<R>, output: Output<'_>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut stdout) = stdout else {
        return Ok(());
    };
    match output {
        Output::Discard => Ok(()),
        Output::Lines(on_line) => {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                on_line(&line);
            }
            Ok(())
        }
        Output::Forward(out) => {
            tokio::io::copy(&mut stdout, out).await?;
            Ok(())
        }
    }
}

async fn read_tail<R>(mut stderr: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail: Vec<u8> = Vec::with_capacity(STDERR_TAIL_BYTES);
    let mut chunk = [0_u8; 1024];
    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                tail.extend_from_slice(&chunk[..read]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use anyhow::Result;
    use playready_library::FollowOptions;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn failures_carry_exit_status_and_stderr() {
        let result = run(
            "test",
            Path::new("sh"),
            &sh("echo broken input >&2; exit 3"),
            None,
            Output::Discard,
            &CancellationToken::new(),
        )
        .await;
        match result {
            Err(MediaError::Backend { operation, detail }) => {
                assert_eq!(operation, "test");
                assert!(detail.contains("broken input"));
                assert!(detail.contains('3'));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_backend_error() {
        let result = capture("probe", Path::new("/nonexistent/ffprobe"), &[]).await;
        assert!(matches!(result, Err(MediaError::Backend { .. })));
    }

    #[tokio::test]
    async fn lines_are_delivered_in_order() -> Result<()> {
        let mut seen = Vec::new();
        let mut on_line = |line: &str| seen.push(line.to_string());
        run(
            "test",
            Path::new("sh"),
            &sh("printf 'a=1\\nb=2\\n'"),
            None,
            Output::Lines(&mut on_line),
            &CancellationToken::new(),
        )
        .await?;
        assert_eq!(seen, vec!["a=1", "b=2"]);
        Ok(())
    }

    #[tokio::test]
    async fn followed_input_is_piped_through() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("source.mkv");
        std::fs::write(&path, b"growing bytes")?;
        let reader = GrowingFileReader::open(
            &path,
            FollowOptions::with_idle_timeout(Duration::from_millis(100))
                .poll_every(Duration::from_millis(20)),
            CancellationToken::new(),
        )
        .await?;

        let mut out: Vec<u8> = Vec::new();
        run(
            "test",
            Path::new("cat"),
            &[],
            Some(reader),
            Output::Forward(&mut out),
            &CancellationToken::new(),
        )
        .await?;
        assert_eq!(out, b"growing bytes");
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let result = run(
            "test",
            Path::new("sleep"),
            &["5".to_string()],
            None,
            Output::Discard,
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(MediaError::Backend { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
