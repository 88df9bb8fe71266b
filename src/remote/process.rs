//! Child process execution with captured output and a hard timeout.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::CommandOutput;
use crate::error::ExecError;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read `pipe` to the end on its own thread and send the text back.
fn spawn_reader<R: Read + Send + 'static>(
    mut pipe: R,
    stream: Stream,
    tx: mpsc::Sender<(Stream, String)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).to_string()));
    });
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// The child is killed once `timeout` elapses and `ExecError::Timeout` is
/// returned for `host`. The same deadline covers draining the output pipes:
/// a background process that inherited them cannot hold the step open past
/// its timeout. Readers still blocked at the deadline are detached.
///
/// On unix the child gets its own process group, so a Ctrl-C at the
/// terminal reaches only convoy and an in-flight command runs to completion.
pub fn run_process(
    program: &str,
    args: &[String],
    envs: &[(String, String)],
    timeout: Option<Duration>,
    host: &str,
) -> Result<CommandOutput, ExecError> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        cmd.env(key, value);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| ExecError::Spawn {
        program: program.to_string(),
        message: e.to_string(),
    })?;

    let (tx, rx) = mpsc::channel();
    let mut readers = 0;
    if let Some(pipe) = child.stdout.take() {
        spawn_reader(pipe, Stream::Stdout, tx.clone());
        readers += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        spawn_reader(pipe, Stream::Stderr, tx.clone());
        readers += 1;
    }
    drop(tx);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                return Err(ExecError::Spawn {
                    program: program.to_string(),
                    message: e.to_string(),
                });
            }
        }

        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                debug!("Killing '{}' on {} after {:?}", program, host, limit);
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Timeout {
                    host: host.to_string(),
                    after: limit,
                });
            }
        }

        thread::sleep(POLL_INTERVAL);
    };

    let deadline = timeout.map(|limit| (start + limit, limit));
    let (stdout, stderr) = drain(&rx, readers, deadline, program, host)?;

    Ok(CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
        duration: start.elapsed(),
    })
}

/// Collect output from the reader threads, giving up at `deadline`.
fn drain(
    rx: &Receiver<(Stream, String)>,
    readers: usize,
    deadline: Option<(Instant, Duration)>,
    program: &str,
    host: &str,
) -> Result<(String, String), ExecError> {
    let (mut stdout, mut stderr) = (String::new(), String::new());
    for _ in 0..readers {
        let received = match deadline {
            Some((at, limit)) => {
                match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => {
                        debug!(
                            "Output of '{}' on {} still open after {:?}",
                            program, host, limit
                        );
                        return Err(ExecError::Timeout {
                            host: host.to_string(),
                            after: limit,
                        });
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };
        match received {
            (Stream::Stdout, text) => stdout = text,
            (Stream::Stderr, text) => stderr = text,
        }
    }
    Ok((stdout, stderr))
}
