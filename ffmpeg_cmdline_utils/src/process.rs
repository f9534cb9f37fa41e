use std::{
    ffi::OsStr,
    io::Read,
    process::{Child, Command, Stdio},
    thread::{self, JoinHandle},
    time::Duration,
};

use wait_timeout::ChildExt;

use crate::FfmpegError;

// ffmpeg can be very chatty on failure
const MAX_STDERR_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub(crate) fn program(self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
        }
    }

    /// Start the tool with stdout piped. stderr is piped too unless `quiet`.
    pub(crate) fn spawn<I, S>(self, args: I, quiet: bool) -> Result<Child, FfmpegError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(self.program())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if quiet { Stdio::null() } else { Stdio::piped() })
            .spawn()
            .map_err(|e| self.spawn_error(&e))
    }

    fn spawn_error(self, e: &std::io::Error) -> FfmpegError {
        match e.kind() {
            std::io::ErrorKind::NotFound => FfmpegError::NotFound(self.program().to_string()),
            _ => self.io_error(e),
        }
    }

    /// Run the tool to completion and return its stdout. The tool is killed if it has
    /// not exited after `timeout`.
    pub(crate) fn run<I, S>(self, args: I, timeout: Duration) -> Result<Vec<u8>, FfmpegError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = self.spawn(args, false)?;

        //both pipes are drained concurrently so a full stderr pipe cannot stall the child
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                reap(&mut child);
                return Err(FfmpegError::Timeout {
                    tool: self.program().to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Err(e) => {
                reap(&mut child);
                return Err(self.io_error(&e));
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            Err(FfmpegError::Failed {
                tool: self.program().to_string(),
                stderr: String::from_utf8_lossy(&stderr)
                    .trim()
                    .chars()
                    .take(MAX_STDERR_CHARS)
                    .collect(),
            })
        }
    }

    fn io_error(self, e: &std::io::Error) -> FfmpegError {
        FfmpegError::Io {
            tool: self.program().to_string(),
            reason: e.to_string(),
        }
    }
}

/// Kill the child if it is still running and collect its exit status, so no zombie is left.
pub(crate) fn reap(child: &mut Child) {
    let _kill_error = child.kill();
    let _wait_error = child.wait();
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut acc = vec![];
        if let Some(mut pipe) = pipe {
            let _read_error = pipe.read_to_end(&mut acc);
        }
        acc
    })
}

/// True if both `ffmpeg -version` and `ffprobe -version` run successfully.
pub fn ffmpeg_and_ffprobe_are_callable() -> bool {
    let timeout = Duration::from_secs(30);
    [Tool::Ffprobe, Tool::Ffmpeg]
        .into_iter()
        .all(|tool| tool.run(["-version"], timeout).is_ok())
}

#[cfg(test)]
mod test {
    use std::io::{Error, ErrorKind};

    use super::*;

    #[test]
    fn test_missing_binary_is_not_found() {
        let err = Tool::Ffprobe.spawn_error(&Error::from(ErrorKind::NotFound));
        assert!(matches!(&err, FfmpegError::NotFound(tool) if tool == "ffprobe"), "actual {err:?}");

        let err = Tool::Ffmpeg.spawn_error(&Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(&err, FfmpegError::Io { tool, .. } if tool == "ffmpeg"), "actual {err:?}");
    }
}
