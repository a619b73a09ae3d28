//! Subprocess invocation with captured output and a deadline.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};

/// Default deadline for a single invocation of the wrapped tool.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Everything a finished subprocess produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout followed by stderr, as one text for pattern matching.
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Runs `program` with `args`, feeding `stdin` and capturing stdout and stderr.
///
/// With a `timeout`, the child is killed once the deadline passes. Without
/// one, the call blocks until the child exits (used for interactive helpers
/// such as password dialogs).
///
/// A non-zero exit is not an error at this level; callers classify it.
///
/// # Errors
///
/// Returns an error if the program cannot be launched, if waiting on it fails,
/// or if the deadline passes.
pub fn run_command(
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    debug!("Running `{} {}`", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| Error::launch_error(program, e))?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    if let Some(input) = stdin {
        write_stdin(&mut child, input)?;
    }

    let status = wait_with_deadline(&mut child, program, timeout)?;

    let output = CommandOutput {
        status,
        stdout: join_reader(stdout_reader),
        stderr: join_reader(stderr_reader),
    };

    debug!("`{}` finished with {}", program, output.status);
    Ok(output)
}

fn write_stdin(child: &mut Child, input: &str) -> Result<()> {
    // Dropping the pipe at the end of this scope closes the child's stdin.
    let Some(mut pipe) = child.stdin.take() else {
        return Ok(());
    };

    match pipe.write_all(input.as_bytes()) {
        Ok(()) => Ok(()),
        // The child exited without reading its input; its status tells the story.
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("Child closed stdin before reading it");
            Ok(())
        }
        Err(e) => Err(Error::Stdio(e)),
    }
}

fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    timeout: Option<Duration>,
) -> Result<ExitStatus> {
    let started = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                warn!("`{program}` exceeded {timeout:?}, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Timeout {
                    program: program.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buffer) {
                warn!("Failed to read subprocess output: {e}");
            }
            String::from_utf8_lossy(&buffer).into_owned()
        })
    })
}

fn join_reader(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::classifier::{ErrorClassifier, ErrorKind};

    #[test]
    fn test_captures_stdout_and_stderr() {
        let output = run_command(
            "sh",
            &["-c", "echo out; echo err >&2"],
            None,
            Some(DEFAULT_TIMEOUT),
        )
        .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[test]
    fn test_feeds_stdin() {
        let output = run_command("sh", &["-c", "read line; echo got:$line"], Some("secret\n"), None)
            .unwrap();

        assert_eq!(output.stdout, "got:secret\n");
    }

    #[test]
    fn test_non_zero_exit_is_returned_not_raised() {
        let output = run_command(
            "sh",
            &["-c", "echo 'You are not authenticated'; exit 9"],
            None,
            Some(DEFAULT_TIMEOUT),
        )
        .unwrap();

        assert!(!output.success());
        assert_eq!(output.status.code(), Some(9));

        let error = ErrorClassifier::default().check(&output).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn test_successful_output_is_not_classified() {
        let output = run_command("sh", &["-c", "echo access denied"], None, None).unwrap();

        assert!(ErrorClassifier::default().check(&output).is_ok());
    }

    #[test]
    fn test_deadline_kills_child() {
        let started = Instant::now();
        let result = run_command(
            "sh",
            &["-c", "sleep 5"],
            None,
            Some(Duration::from_millis(200)),
        );

        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program_is_a_launch_error() {
        let result = run_command("definitely-not-a-real-binary-xyz", &[], None, None);

        assert!(matches!(result, Err(Error::Launch { .. })));
    }
}
