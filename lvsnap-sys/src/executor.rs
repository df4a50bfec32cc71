// SPDX-License-Identifier: GPL-3.0-only

//! Process boundary for the LVM command-line tools
//!
//! Every external process the stack starts goes through [`CommandExecutor`].
//! Arguments are always passed as a discrete vector, never through a shell.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::error::{Result, SysError};

/// Default bound on a single tool invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time granted for output to drain when a tool exits near the deadline.
const READ_GRACE: Duration = Duration::from_millis(100);

/// Fallback locations when the tools are not on `PATH` (common for non-root users).
const SBIN_DIRS: [&str; 2] = ["/usr/sbin", "/sbin"];

const PERMISSION_MARKERS: [&str; 4] = [
    "permission denied",
    "operation not permitted",
    "must be root",
    "running as a non-root user",
];

/// The allow-listed LVM binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LvmTool {
    Lvs,
    Vgs,
    Lvcreate,
    Lvremove,
    /// Only used for `lvm version`.
    Lvm,
}

impl LvmTool {
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Lvs => "lvs",
            Self::Vgs => "vgs",
            Self::Lvcreate => "lvcreate",
            Self::Lvremove => "lvremove",
            Self::Lvm => "lvm",
        }
    }

    /// Whether the tool changes LVM metadata.
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::Lvcreate | Self::Lvremove)
    }
}

impl fmt::Display for LvmTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Captured result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }
}

/// Runs one allow-listed tool and waits for it.
///
/// Implementations must not leave a process running when `run` returns.
/// A non-zero exit is reported as [`SysError::ToolFailure`] (or
/// [`SysError::PermissionDenied`]), never as an `Ok` output.
pub trait CommandExecutor {
    fn run(&self, tool: LvmTool, args: &[String]) -> Result<CommandOutput>;
}

/// Executor that spawns the real binaries.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
    bin_dir: Option<PathBuf>,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl SystemExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            bin_dir: None,
        }
    }

    /// Resolve binaries from `dir` only instead of searching `PATH`.
    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Locate the binary for `tool`.
    pub fn resolve(&self, tool: LvmTool) -> Result<PathBuf> {
        let name = tool.binary_name();

        if let Some(dir) = &self.bin_dir {
            let candidate = dir.join(name);
            return if candidate.exists() {
                Ok(candidate)
            } else {
                Err(SysError::Unavailable { tool })
            };
        }

        if let Ok(path) = which::which(name) {
            return Ok(path);
        }

        SBIN_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(name))
            .find(|candidate| candidate.exists())
            .ok_or(SysError::Unavailable { tool })
    }
}

impl CommandExecutor for SystemExecutor {
    fn run(&self, tool: LvmTool, args: &[String]) -> Result<CommandOutput> {
        let binary = self.resolve(tool)?;
        if tool.is_mutating() {
            info!(%tool, ?args, binary = %binary.display(), "running LVM tool");
        } else {
            debug!(%tool, ?args, binary = %binary.display(), "running LVM tool");
        }

        let started = Instant::now();
        let mut child = Command::new(&binary)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own group, so descendants can be killed with the tool.
            .process_group(0)
            .spawn()
            .map_err(|e| spawn_error(tool, e))?;
        let pgid = child.id() as libc::pid_t;

        let (sender, output) = mpsc::channel();
        drain(Stream::Stdout, child.stdout.take(), sender.clone());
        drain(Stream::Stderr, child.stderr.take(), sender);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate(pgid, &mut child);
                warn!(%tool, timeout = ?self.timeout, "LVM tool timed out, killed");
                return Err(SysError::Timeout {
                    tool,
                    timeout: self.timeout,
                });
            }
            Err(e) => {
                terminate(pgid, &mut child);
                return Err(SysError::Io(e));
            }
        };

        // A descendant that inherited the pipes keeps them open after the tool exits.
        let deadline = started + self.timeout;
        let Some((stdout, stderr)) = collect(&output, deadline) else {
            kill_group(pgid);
            warn!(%tool, timeout = ?self.timeout, "LVM tool output still open at deadline, killed");
            return Err(SysError::Timeout {
                tool,
                timeout: self.timeout,
            });
        };

        if !status.success() {
            let stderr = stderr.trim_end().to_string();
            if is_permission_denial(&stderr) {
                return Err(SysError::PermissionDenied {
                    tool,
                    detail: stderr,
                });
            }
            return Err(SysError::ToolFailure {
                tool,
                exit_code: status.code(),
                stderr,
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or_default(),
        })
    }
}

fn spawn_error(tool: LvmTool, error: std::io::Error) -> SysError {
    match error.kind() {
        std::io::ErrorKind::NotFound => SysError::Unavailable { tool },
        std::io::ErrorKind::PermissionDenied => SysError::PermissionDenied {
            tool,
            detail: error.to_string(),
        },
        _ => SysError::Io(error),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(
    stream: Stream,
    pipe: Option<R>,
    sender: Sender<(Stream, Vec<u8>)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        // The receiver is gone once the call gave up on the output.
        let _ = sender.send((stream, buf));
    });
}

/// Wait for both pipes to close, at least [`READ_GRACE`] and otherwise until `deadline`.
fn collect(output: &Receiver<(Stream, Vec<u8>)>, deadline: Instant) -> Option<(String, String)> {
    let mut stdout = None;
    let mut stderr = None;

    while stdout.is_none() || stderr.is_none() {
        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(READ_GRACE);
        let (stream, bytes) = output.recv_timeout(budget).ok()?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        match stream {
            Stream::Stdout => stdout = Some(text),
            Stream::Stderr => stderr = Some(text),
        }
    }

    Some((stdout.unwrap_or_default(), stderr.unwrap_or_default()))
}

/// Kill the tool's whole process group, then reap the tool itself.
fn terminate(pgid: libc::pid_t, child: &mut Child) {
    kill_group(pgid);
    let _ = child.kill();
    let _ = child.wait();
}

fn kill_group(pgid: libc::pid_t) {
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, %err, "SIGKILL to process group failed");
        }
    }
}

/// Whether a failed tool's stderr points at missing privileges.
pub fn is_permission_denial(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    PERMISSION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Whether the current process runs with an effective UID of root.
pub fn is_privileged() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    /// Link `/bin/sh` under the tool's name so the executor runs a shell script
    /// passed through `-c`.
    fn shell_as(tool: LvmTool, timeout: Duration) -> (tempfile::TempDir, SystemExecutor) {
        let dir = tempfile::tempdir().expect("tempdir");
        symlink("/bin/sh", dir.path().join(tool.binary_name())).expect("symlink");
        let executor = SystemExecutor::new(timeout).with_bin_dir(dir.path());
        (dir, executor)
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[test]
    fn captures_stdout() {
        let (_dir, executor) = shell_as(LvmTool::Lvs, DEFAULT_TIMEOUT);
        let output = executor
            .run(LvmTool::Lvs, &script("printf 'vg0\\troot\\n'"))
            .expect("run");
        assert_eq!(output.stdout, "vg0\troot\n");
        assert_eq!(output.exit_code, 0);
    }

    #[test]
    fn arguments_are_not_shell_interpolated() {
        let (_dir, executor) = shell_as(LvmTool::Lvs, DEFAULT_TIMEOUT);
        let output = executor
            .run(
                LvmTool::Lvs,
                &[
                    "-c".to_string(),
                    "printf '%s' \"$1\"".to_string(),
                    "sh".to_string(),
                    "$(echo injected); true".to_string(),
                ],
            )
            .expect("run");
        assert_eq!(output.stdout, "$(echo injected); true");
    }

    #[test]
    fn non_zero_exit_is_tool_failure() {
        let (_dir, executor) = shell_as(LvmTool::Lvcreate, DEFAULT_TIMEOUT);
        let err = executor
            .run(
                LvmTool::Lvcreate,
                &script("echo '  Volume group \"vg0\" has insufficient free space' >&2; exit 5"),
            )
            .unwrap_err();
        match err {
            SysError::ToolFailure {
                tool,
                exit_code,
                stderr,
            } => {
                assert_eq!(tool, LvmTool::Lvcreate);
                assert_eq!(exit_code, Some(5));
                assert_eq!(stderr, "  Volume group \"vg0\" has insufficient free space");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn permission_failure_is_distinct() {
        let (_dir, executor) = shell_as(LvmTool::Lvremove, DEFAULT_TIMEOUT);
        let err = executor
            .run(
                LvmTool::Lvremove,
                &script("echo '  /dev/mapper/control: open failed: Permission denied' >&2; exit 5"),
            )
            .unwrap_err();
        assert!(matches!(err, SysError::PermissionDenied { tool: LvmTool::Lvremove, .. }));
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let executor = SystemExecutor::default().with_bin_dir(dir.path());
        let err = executor.run(LvmTool::Vgs, &[]).unwrap_err();
        assert!(matches!(err, SysError::Unavailable { tool: LvmTool::Vgs }));
    }

    #[test]
    fn timeout_kills_the_process() {
        let (dir, executor) = shell_as(LvmTool::Lvs, Duration::from_millis(500));
        let pid_file = dir.path().join("pid");
        let body = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());

        let started = Instant::now();
        let err = executor.run(LvmTool::Lvs, &script(&body)).unwrap_err();
        assert!(matches!(err, SysError::Timeout { tool: LvmTool::Lvs, .. }));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).expect("pid written");
        let proc_entry = Path::new("/proc").join(pid.trim());
        assert!(
            !proc_entry.exists(),
            "process {} is still running",
            pid.trim()
        );
    }

    /// Whether `pid` is still a live (non-zombie) process.
    fn is_running(pid: &str) -> bool {
        let Ok(stat) = std::fs::read_to_string(Path::new("/proc").join(pid).join("stat")) else {
            return false;
        };
        let state = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next());
        !matches!(state, Some('Z' | 'X') | None)
    }

    fn wait_until_gone(pid: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if !is_running(pid) {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn timeout_kills_descendants() {
        let (dir, executor) = shell_as(LvmTool::Lvs, Duration::from_millis(500));
        let pid_file = dir.path().join("pid");
        let body = format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > '{}'; wait",
            pid_file.display()
        );

        let err = executor.run(LvmTool::Lvs, &script(&body)).unwrap_err();
        assert!(matches!(err, SysError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).expect("pid written");
        assert!(
            wait_until_gone(pid.trim()),
            "background process {} is still running",
            pid.trim()
        );
    }

    #[test]
    fn inherited_output_does_not_extend_the_wait() {
        let (dir, executor) = shell_as(LvmTool::Vgs, Duration::from_millis(500));
        let pid_file = dir.path().join("pid");
        let body = format!("sleep 4 & echo $! > '{}'; echo done", pid_file.display());

        let started = Instant::now();
        let err = executor.run(LvmTool::Vgs, &script(&body)).unwrap_err();
        assert!(matches!(err, SysError::Timeout { tool: LvmTool::Vgs, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));

        let pid = std::fs::read_to_string(&pid_file).expect("pid written");
        assert!(wait_until_gone(pid.trim()));
    }

    #[test]
    fn detects_permission_markers() {
        assert!(is_permission_denial(
            "  WARNING: Running as a non-root user. Functionality may be unavailable."
        ));
        assert!(!is_permission_denial("  Logical volume \"x\" already exists"));
    }
}
