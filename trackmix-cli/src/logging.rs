//! Process logger for the CLI.
//!
//! Records go into a bounded [`LogBuffer`] that the preview screen renders
//! in its log pane, and are optionally echoed to stderr. While the preview
//! screen is up, stderr itself can be rerouted into the same buffer so
//! audio backend chatter cannot scribble over the terminal.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

const LOG_CAPACITY: usize = 500;
const ECHO_ENV: &str = "TRACKMIX_LOG_STDERR";

/// Most recent log lines, oldest first. Clones share the same lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().cloned().collect()
    }
}

/// Level and echo choice resolved from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogConfig {
    level: LevelFilter,
    echo_stderr: bool,
}

impl LogConfig {
    /// `RUST_LOG` takes a single level name (`off` included) and falls back
    /// to `info`. An echo variable of `0` disables echoing, any other value
    /// enables it.
    fn resolve(rust_log: Option<&str>, echo: Option<&str>, echo_default: bool) -> Self {
        let level = rust_log
            .and_then(|value| value.trim().parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        let echo_stderr = echo.map_or(echo_default, |value| value.trim() != "0");
        Self { level, echo_stderr }
    }

    fn from_env(echo_default: bool) -> Self {
        let rust_log = std::env::var("RUST_LOG").ok();
        let echo = std::env::var(ECHO_ENV).ok();
        Self::resolve(rust_log.as_deref(), echo.as_deref(), echo_default)
    }
}

struct BufferLogger {
    config: LogConfig,
    buffer: LogBuffer,
}

impl Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.config.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}", record.level(), record.args());
        if self.config.echo_stderr {
            eprintln!("{}", line);
        }
        self.buffer.push(line);
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<BufferLogger> = OnceLock::new();

/// Install the process logger and return its buffer.
///
/// `echo_default` applies when `TRACKMIX_LOG_STDERR` is unset; the CLI
/// echoes for one-shot commands and stays quiet under the preview screen.
/// Later calls return the buffer of the first installation.
pub fn init(echo_default: bool) -> LogBuffer {
    let logger = LOGGER.get_or_init(|| BufferLogger {
        config: LogConfig::from_env(echo_default),
        buffer: LogBuffer::with_capacity(LOG_CAPACITY),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.config.level);
    }
    logger.buffer.clone()
}

/// Puts stderr back when dropped and waits for the reader to drain.
pub struct StderrCaptureGuard {
    saved_fd: RawFd,
    stderr_fd: RawFd,
    reader: Option<JoinHandle<()>>,
}

impl Drop for StderrCaptureGuard {
    fn drop(&mut self) {
        // Restoring fd 2 closes the pipe's last write end, ending the reader.
        unsafe {
            libc::dup2(self.saved_fd, self.stderr_fd);
            libc::close(self.saved_fd);
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

fn close_fds(fds: &[RawFd]) {
    for &fd in fds {
        unsafe {
            libc::close(fd);
        }
    }
}

/// Point stderr at a pipe whose lines land in `buffer` as `[STDERR] ...`.
///
/// Returns `None`, leaving stderr untouched, when the pipe or the fd
/// duplication fails.
pub fn capture_stderr(buffer: LogBuffer) -> Option<StderrCaptureGuard> {
    let stderr_fd = std::io::stderr().as_raw_fd();
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return None;
    }
    let [read_fd, write_fd] = fds;

    let saved_fd = unsafe { libc::dup(stderr_fd) };
    if saved_fd < 0 {
        close_fds(&[read_fd, write_fd]);
        return None;
    }
    if unsafe { libc::dup2(write_fd, stderr_fd) } < 0 {
        close_fds(&[read_fd, write_fd, saved_fd]);
        return None;
    }
    close_fds(&[write_fd]);

    let reader = std::thread::Builder::new()
        .name("trackmix-stderr".to_string())
        .spawn(move || {
            let pipe = unsafe { std::fs::File::from_raw_fd(read_fd) };
            for line in BufReader::new(pipe).lines() {
                let Ok(line) = line else { break };
                let line = line.trim_end();
                if !line.is_empty() {
                    buffer.push(format!("[STDERR] {}", line));
                }
            }
        });

    match reader {
        Ok(reader) => Some(StderrCaptureGuard {
            saved_fd,
            stderr_fd,
            reader: Some(reader),
        }),
        Err(_) => {
            unsafe {
                libc::dup2(saved_fd, stderr_fd);
            }
            close_fds(&[saved_fd, read_fd]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_the_newest_lines() {
        let buffer = LogBuffer::with_capacity(3);
        let shared = buffer.clone();
        for i in 0..5 {
            shared.push(format!("line {}", i));
        }
        assert_eq!(buffer.lines(), ["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn level_names_parse_case_insensitively() {
        let config = LogConfig::resolve(Some("DEBUG"), None, false);
        assert_eq!(config.level, LevelFilter::Debug);
        assert_eq!(
            LogConfig::resolve(Some("off"), None, false).level,
            LevelFilter::Off
        );
        assert_eq!(
            LogConfig::resolve(Some("chatty"), None, false).level,
            LevelFilter::Info
        );
        assert_eq!(LogConfig::resolve(None, None, false).level, LevelFilter::Info);
    }

    #[test]
    fn echo_variable_overrides_the_default() {
        assert!(LogConfig::resolve(None, None, true).echo_stderr);
        assert!(!LogConfig::resolve(None, None, false).echo_stderr);
        assert!(!LogConfig::resolve(None, Some("0"), true).echo_stderr);
        assert!(LogConfig::resolve(None, Some("1"), false).echo_stderr);
    }
}
