use std::{
    ffi::OsString,
    fs,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Duration,
};

use log::{debug, info};
use wait_timeout::ChildExt;

use crate::definitions::DOWNLOAD_FILE_STEM;
use crate::FetchError;

/// Downloads a remote video to a local file.
pub trait RemoteFetcher {
    /// Download the video at `url` into `dest_dir` and return the path of the local file.
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// Downloads videos by running the `yt-dlp` command line tool.
///
/// Every download gets its own fresh `vid_slide_dl_*` directory inside the destination
/// directory, and the video is saved there as `downloaded_video.<ext>`, where yt-dlp
/// chooses the extension. Files left behind by earlier downloads are never returned.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: OsString,
    timeout: Option<Duration>,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self {
            program: OsString::from("yt-dlp"),
            timeout: None,
        }
    }
}

impl YtDlpFetcher {
    /// Run a different executable, for example an absolute path to yt-dlp.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill the download if it has not finished after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl RemoteFetcher for YtDlpFetcher {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        fs::create_dir_all(dest_dir).map_err(|e| FetchError::Destination {
            path: dest_dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let run_dir = tempfile::Builder::new()
            .prefix("vid_slide_dl_")
            .tempdir_in(dest_dir)
            .map_err(|e| FetchError::Destination {
                path: dest_dir.to_path_buf(),
                reason: e.to_string(),
            })?
            .keep();
        let output_template = run_dir.join(format!("{DOWNLOAD_FILE_STEM}.%(ext)s"));

        let mut command = Command::new(&self.program);
        command
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-simulate")
            .arg("--force-overwrites")
            .args(["--print", "after_move:filepath"])
            .arg("-o")
            .arg(&output_template)
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!("Downloading {url} to {}", run_dir.display());
        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::ToolNotFound(self.program_name()),
            _ => FetchError::Io(format!("{:?}", e.kind())),
        })?;

        //drain both pipes on their own threads, otherwise a full stderr pipe can stall the child.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || read_to_string_lossy(stdout));
        let stderr_reader = std::thread::spawn(move || read_to_string_lossy(stderr));

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout) {
                Ok(Some(status)) => Ok(status),
                Ok(None) => {
                    let _kill_error = child.kill();
                    let _wait_error = child.wait();
                    return Err(FetchError::Timeout(timeout.as_secs()));
                }
                Err(e) => Err(e),
            },
            None => child.wait(),
        }
        .map_err(|e| FetchError::Io(format!("{:?}", e.kind())))?;

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(FetchError::Failed(stderr.trim().chars().take(500).collect()));
        }

        let printed_path = stdout.lines().map(str::trim).filter(|line| !line.is_empty()).last();
        let downloaded = match printed_path {
            Some(path) => PathBuf::from(path),
            None => find_download(&run_dir).ok_or_else(|| FetchError::NoOutput(run_dir.clone()))?,
        };

        if !downloaded.is_file() {
            return Err(FetchError::NoOutput(run_dir));
        }

        debug!("Downloaded {url} to {}", downloaded.display());
        Ok(downloaded)
    }
}

fn read_to_string_lossy(pipe: Option<impl Read>) -> String {
    let mut acc = vec![];
    if let Some(mut pipe) = pipe {
        let _read_error = pipe.read_to_end(&mut acc);
    }
    String::from_utf8_lossy(&acc).into_owned()
}

// yt-dlp older than 2021.10 cannot print the final path, so look for the file instead
fn find_download(dest_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dest_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .find(|path| {
            path.file_stem()
                .is_some_and(|stem| stem == DOWNLOAD_FILE_STEM)
        })
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_tool_is_reported() {
        let dir = TempDir::new().unwrap();
        let fetcher = YtDlpFetcher::default().with_program("definitely-not-a-real-yt-dlp-binary");

        let result = fetcher.fetch("https://example.com/video", dir.path());
        assert!(
            matches!(&result, Err(FetchError::ToolNotFound(name)) if name == "definitely-not-a-real-yt-dlp-binary"),
            "expected ToolNotFound, actual {result:?}"
        );
    }

    #[test]
    fn test_find_download_matches_stem() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("other.mp4"), b"").unwrap();
        assert!(find_download(dir.path()).is_none());

        fs::write(dir.path().join("downloaded_video.webm"), b"").unwrap();
        assert_eq!(find_download(dir.path()), Some(dir.path().join("downloaded_video.webm")));
    }

    // stands in for yt-dlp: creates the file named by `-o` and prints its path, or when
    // `creates_file` is false, exits successfully having done nothing
    #[cfg(unix)]
    fn fake_downloader(dir: &Path, creates_file: bool) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let body = if creates_file {
            "path=$(printf '%s' \"$out\" | sed 's/%(ext)s/mp4/')\n: > \"$path\"\nprintf '%s\\n' \"$path\"\n"
        } else {
            ""
        };
        let script = format!(
            "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi\n  shift\ndone\n{body}"
        );

        let path = dir.join("fake-yt-dlp");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // a freshly written script can briefly fail to exec while another test thread forks
    #[cfg(unix)]
    fn fetch_retrying(fetcher: &YtDlpFetcher, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let mut result = fetcher.fetch("https://example.com/video", dest_dir);
        for _ in 0..5 {
            if !matches!(result, Err(FetchError::Io(_))) {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
            result = fetcher.fetch("https://example.com/video", dest_dir);
        }
        result
    }

    #[cfg(unix)]
    #[test]
    fn test_each_download_gets_a_fresh_directory() {
        let tools = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let stale = dest.path().join("downloaded_video.mp4");
        fs::write(&stale, b"an older video").unwrap();

        let fetcher = YtDlpFetcher::default().with_program(fake_downloader(tools.path(), true));
        let first = fetch_retrying(&fetcher, dest.path()).unwrap();
        let second = fetch_retrying(&fetcher, dest.path()).unwrap();

        assert_ne!(first, stale);
        assert_ne!(second, stale);
        assert_ne!(first.parent(), second.parent());
        for path in [&first, &second] {
            assert!(path.is_file(), "{} was not downloaded", path.display());
            assert_eq!(path.parent().and_then(Path::parent), Some(dest.path()));
        }
        assert_eq!(fs::read(&stale).unwrap(), b"an older video");
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_download_is_not_returned() {
        let tools = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(dest.path().join("downloaded_video.mp4"), b"an older video").unwrap();

        //exits successfully without downloading anything
        let fetcher = YtDlpFetcher::default().with_program(fake_downloader(tools.path(), false));
        let result = fetch_retrying(&fetcher, dest.path());

        assert!(
            matches!(&result, Err(FetchError::NoOutput(dir)) if dir.parent() == Some(dest.path())),
            "expected NoOutput, actual {result:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failed() {
        let dir = TempDir::new().unwrap();
        // `false` ignores its arguments and exits with status 1
        let fetcher = YtDlpFetcher::default().with_program("false");

        let result = fetcher.fetch("https://example.com/video", dir.path());
        assert!(matches!(result, Err(FetchError::Failed(_))), "actual {result:?}");
    }
}
