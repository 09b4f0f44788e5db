//! Process execution for host and git commands

use reconcile::{CommandOutput, CommandRunner, Error, command_line};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// [`CommandRunner`] backed by real processes
///
/// Output is captured, stdin is closed so a prompting command cannot hang
/// the run, and a command past its timeout is killed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> reconcile::Result<CommandOutput> {
        // Arguments may carry credentials; callers log the masked rendering
        log::trace!("exec: {program} ({} args)", args.len());

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let success = match timeout {
            Some(limit) => wait_with_deadline(&mut child, limit).map_err(|e| match e {
                WaitError::TimedOut => Error::Timeout {
                    command: command_line(program, args),
                    timeout: limit,
                },
                WaitError::Io(e) => Error::Io(e),
            })?,
            None => child.wait()?.success(),
        };

        Ok(CommandOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            success,
        })
    }
}

enum WaitError {
    TimedOut,
    Io(std::io::Error),
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<bool, WaitError> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
            return Ok(status.success());
        }
        if Instant::now() >= deadline {
            log::warn!("killing process {} after {}s", child.id(), limit.as_secs());
            // The process may exit between the check and the kill
            let _ = child.kill();
            let _ = child.wait();
            return Err(WaitError::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to the end on a background thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Check if a command exists on PATH
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
