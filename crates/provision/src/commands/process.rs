// Process command runner adapter implementation

use std::{
    collections::{HashSet, VecDeque},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, ChildStdout, Command},
};
use tracing::{debug, warn};

use super::runner::{
    CommandError, CommandRunner, CommandSpec, OutputLine, OutputObserver, RunResult, RunState,
};

/// Number of trailing stderr lines kept for the diagnostic of a failed command.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Runs commands as direct child processes, without a shell
///
/// Each child gets its own process group so a timeout, an interrupt or a
/// cancelled run can take down anything it spawned as well. Clones share the
/// set of running groups.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner {
    /// Timeout applied to commands that don't carry their own
    default_timeout: Option<Duration>,
    running: RunningGroups,
}

type RunningGroups = Arc<Mutex<HashSet<u32>>>;

impl ProcessCommandRunner {
    #[must_use]
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self {
            default_timeout,
            running: RunningGroups::default(),
        }
    }

    fn build(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arguments())
            .envs(spec.envs())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = spec.working_directory() {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn is_command_available(&self, program: &str) -> bool {
        if program.contains(std::path::MAIN_SEPARATOR) {
            return is_executable(Path::new(program));
        }

        std::env::var_os("PATH").is_some_and(|paths| {
            std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
        })
    }

    async fn run(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunResult, CommandError> {
        let start_time = Instant::now();
        let rendered = command.to_string();
        let working_directory = resolve_working_directory(command);

        debug!(command = %rendered, state = %RunState::NotStarted, "spawning command");

        let mut child = Self::build(command)
            .spawn()
            .map_err(|e| CommandError::CannotStart {
                command: rendered.clone(),
                working_directory: working_directory.clone(),
                source: Arc::new(e),
            })?;

        debug!(command = %rendered, pid = ?child.id(), state = %RunState::Running);
        let group = GroupGuard::register(child.id(), &self.running);

        let io_error = |e: std::io::Error| CommandError::Io {
            command: rendered.clone(),
            working_directory: working_directory.clone(),
            source: Arc::new(e),
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child).await;
            group.release();
            return Err(io_error(std::io::Error::other("child output was not captured")));
        };

        let timeout = command.timeout().or(self.default_timeout);
        let relay = relay_output(&mut child, stdout, stderr, observer);
        let relayed = match timeout {
            Some(limit) => tokio::time::timeout(limit, relay).await.ok(),
            None => Some(relay.await),
        };

        let Some(relayed) = relayed else {
            terminate(&mut child).await;
            group.release();
            debug!(command = %rendered, state = %RunState::TimedOut);
            return Err(CommandError::Timeout {
                command: rendered,
                timeout: timeout.unwrap_or_default(),
                working_directory,
            });
        };

        let (status, diagnostic) = relayed.map_err(io_error)?;
        group.release();
        let duration = start_time.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        if status.success() {
            debug!(command = %rendered, state = %RunState::Succeeded, ?duration);
            Ok(RunResult::new(exit_code, duration))
        } else {
            debug!(command = %rendered, state = %RunState::FailedExitCode, exit_code);
            Err(CommandError::NonZeroExit {
                command: rendered,
                exit_code,
                diagnostic,
                working_directory,
                duration,
            })
        }
    }

    fn kill_running(&self) {
        let groups: Vec<u32> = lock(&self.running).iter().copied().collect();
        for pgid in groups {
            warn!(pgid, "killing running command");
            kill_group(pgid);
        }
    }
}

/// A child's process group, registered while the child runs
///
/// Dropping the guard before [`GroupGuard::release`] kills the group. That is
/// what happens when the `run` future is cancelled mid-command, where
/// `kill_on_drop` alone would only reach the group leader.
struct GroupGuard {
    pgid: Option<u32>,
    running: RunningGroups,
}

impl GroupGuard {
    fn register(pgid: Option<u32>, running: &RunningGroups) -> Self {
        if let Some(pgid) = pgid {
            lock(running).insert(pgid);
        }
        Self {
            pgid,
            running: Arc::clone(running),
        }
    }

    /// Forget the group once the child has been reaped; anything it left
    /// running in the background is not killed
    fn release(mut self) {
        if let Some(pgid) = self.pgid.take() {
            lock(&self.running).remove(&pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            lock(&self.running).remove(&pgid);
            debug!(pgid, "run cancelled, killing its process group");
            kill_group(pgid);
        }
    }
}

fn lock(running: &RunningGroups) -> MutexGuard<'_, HashSet<u32>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forward both pipes line by line until they close, then reap the child.
///
/// Both readers are polled together so neither pipe can fill up and stall the
/// child. `read_until` keeps partial data in the buffer when the other branch
/// wins, so nothing is lost between iterations.
async fn relay_output(
    child: &mut Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    observer: &mut dyn OutputObserver,
) -> std::io::Result<(ExitStatus, String)> {
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

    while stdout_open || stderr_open {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut stdout_buf), if stdout_open => {
                if read? == 0 {
                    stdout_open = false;
                } else {
                    observer.on_line(OutputLine::Stdout(take_line(&mut stdout_buf)));
                }
            }
            read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => {
                if read? == 0 {
                    stderr_open = false;
                } else {
                    let line = take_line(&mut stderr_buf);
                    if tail.len() == DIAGNOSTIC_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                    observer.on_line(OutputLine::Stderr(line));
                }
            }
        }
    }

    let status = child.wait().await?;
    let diagnostic = tail.into_iter().collect::<Vec<_>>().join("\n");

    Ok((status, diagnostic))
}

fn take_line(buf: &mut Vec<u8>) -> String {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    line
}

/// Kill the child's whole process group, then the child itself, and reap it.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }

    let _ = child.kill().await;
}

/// SIGKILL every process in the group led by `pgid`
#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::{
        sys::signal::{Signal, killpg},
        unistd::Pid,
    };

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pgid, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

fn resolve_working_directory(spec: &CommandSpec) -> PathBuf {
    spec.working_directory().map_or_else(
        || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        Path::to_path_buf,
    )
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::NullObserver;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    async fn run_collecting(
        runner: &ProcessCommandRunner,
        spec: &CommandSpec,
    ) -> (Result<RunResult, CommandError>, Vec<OutputLine>) {
        let mut seen = Vec::new();
        let result = runner
            .run(spec, &mut |line: OutputLine| seen.push(line))
            .await;
        (result, seen)
    }

    #[tokio::test]
    async fn test_success_relays_every_stdout_line_in_order() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("for i in $(seq 1 500); do echo \"line $i\"; done");

        let (result, seen) = run_collecting(&runner, &spec).await;

        let result = result.unwrap();
        assert!(result.is_success());
        assert_eq!(result.exit_code(), 0);

        let expected: Vec<_> = (1..=500)
            .map(|i| OutputLine::Stdout(format!("line {i}")))
            .collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_stderr_lines_are_relayed_and_tagged() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("echo warn 1>&2");

        let (result, seen) = run_collecting(&runner, &spec).await;

        assert!(result.is_ok());
        assert_eq!(seen, vec![OutputLine::Stderr("warn".to_string())]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_code_and_diagnostic() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("echo progress; echo 'E: Unable to locate package' 1>&2; exit 100");

        let (result, seen) = run_collecting(&runner, &spec).await;

        let error = result.unwrap_err();
        assert_eq!(error.exit_code(), Some(100));
        assert_eq!(error.state(), RunState::FailedExitCode);
        assert!(!error.is_missing_tool());
        assert_eq!(error.diagnostic(), Some("E: Unable to locate package"));
        assert!(error.to_string().contains("exit code 100"));
        assert!(seen.contains(&OutputLine::Stdout("progress".to_string())));
    }

    #[tokio::test]
    async fn test_missing_executable_is_cannot_start() {
        let runner = ProcessCommandRunner::default();
        let spec = CommandSpec::new("provision-no-such-tool-4f1c").arg("install");

        let (result, seen) = run_collecting(&runner, &spec).await;

        let error = result.unwrap_err();
        assert!(matches!(error, CommandError::CannotStart { .. }));
        assert!(error.is_missing_tool());
        assert_eq!(error.exit_code(), None);
        assert_eq!(error.state(), RunState::FailedToStart);
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let runner = ProcessCommandRunner::default();
        let spec = CommandSpec::new("echo").arg("$HOME; echo injected");

        let (result, seen) = run_collecting(&runner, &spec).await;

        assert!(result.is_ok());
        assert_eq!(
            seen,
            vec![OutputLine::Stdout("$HOME; echo injected".to_string())]
        );
    }

    #[tokio::test]
    async fn test_env_override_is_visible_to_child() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("echo \"$CFLAGS\"").env("CFLAGS", "-O2 -std=gnu17");

        let (result, seen) = run_collecting(&runner, &spec).await;

        assert!(result.is_ok());
        assert_eq!(seen, vec![OutputLine::Stdout("-O2 -std=gnu17".to_string())]);
    }

    #[tokio::test]
    async fn test_inherited_environment_is_kept() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("test -n \"$PATH\"");

        let (result, _) = run_collecting(&runner, &spec).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_working_directory_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessCommandRunner::default();
        let spec = CommandSpec::new("pwd").current_dir(dir.path());

        let (result, seen) = run_collecting(&runner, &spec).await;

        assert!(result.is_ok());
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(PathBuf::from(seen[0].text()).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_timeout_kills_the_child() {
        let runner = ProcessCommandRunner::default();
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .with_timeout(Some(Duration::from_millis(100)));

        let started = Instant::now();
        let (result, _) = run_collecting(&runner, &spec).await;

        let error = result.unwrap_err();
        assert!(matches!(error, CommandError::Timeout { .. }));
        assert_eq!(error.state(), RunState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_default_timeout_applies_when_spec_has_none() {
        let runner = ProcessCommandRunner::new(Some(Duration::from_millis(100)));
        let spec = CommandSpec::new("sleep").arg("5");

        let (result, _) = run_collecting(&runner, &spec).await;

        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_not_dropped() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("printf '\\377abc\\n'");

        let (result, seen) = run_collecting(&runner, &spec).await;

        assert!(result.is_ok());
        assert_eq!(seen.len(), 1);
        assert!(seen[0].text().ends_with("abc"));
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_delivered() {
        let runner = ProcessCommandRunner::default();
        let spec = sh("printf 'no newline'");

        let (_, seen) = run_collecting(&runner, &spec).await;

        assert_eq!(seen, vec![OutputLine::Stdout("no newline".to_string())]);
    }

    #[tokio::test]
    async fn test_probe() {
        let runner = ProcessCommandRunner::default();

        assert!(runner.probe(&CommandSpec::new("true")).await);
        assert!(!runner.probe(&CommandSpec::new("false")).await);
        assert!(!runner.probe(&CommandSpec::new("provision-no-such-tool-4f1c")).await);
    }

    #[tokio::test]
    async fn test_kill_running_stops_the_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let runner = ProcessCommandRunner::default();
        let spec = sh(&format!("(sleep 0.5; touch '{}') & wait", marker.display()));

        let running = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run(&spec, &mut NullObserver).await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        runner.kill_running();

        let result = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("run should end once killed")
            .unwrap();
        assert!(matches!(result, Err(CommandError::NonZeroExit { exit_code: -1, .. })));

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let runner = ProcessCommandRunner::default();
        let spec = sh(&format!("(sleep 0.5; touch '{}') & wait", marker.display()));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(150), runner.run(&spec, &mut NullObserver))
                .await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!marker.exists());
        assert!(lock(&runner.running).is_empty());
    }

    #[tokio::test]
    async fn test_finished_run_leaves_background_children_alone() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("daemon");
        let runner = ProcessCommandRunner::default();
        let spec = sh(&format!(
            "(sleep 0.3; touch '{}') >/dev/null 2>&1 &",
            marker.display()
        ));

        let (result, _) = run_collecting(&runner, &spec).await;
        assert!(result.is_ok());
        assert!(lock(&runner.running).is_empty());

        runner.kill_running();
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_command_availability() {
        let runner = ProcessCommandRunner::default();

        assert!(runner.is_command_available("sh").await);
        assert!(!runner.is_command_available("provision-no-such-tool-4f1c").await);
    }

    #[test]
    fn test_take_line_strips_crlf() {
        let mut buf = b"hello\r\n".to_vec();
        assert_eq!(take_line(&mut buf), "hello");
        assert!(buf.is_empty());
    }
}
