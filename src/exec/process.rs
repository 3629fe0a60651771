/// Child process supervision with a wall-clock deadline
///
/// The child is placed in its own process group so that a timeout can kill
/// the whole group, including anything it forked.
use crate::config::types::{Result, SandboxError};
use crate::utils::output::{CapturedStream, OutputCollector};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a supervised process ended
#[derive(Debug)]
pub enum ProcessOutcome {
    Exited {
        stdout: CapturedStream,
        stderr: CapturedStream,
        exit_code: Option<i32>,
        wall_time: Duration,
    },
    /// Deadline reached; anything captured so far is discarded
    TimedOut { wall_time: Duration },
}

/// Run `command` to completion or until `timeout` elapses.
///
/// On expiry `on_timeout` runs first (used to stop work the child started
/// outside its own process tree), then the child's process group is sent
/// SIGKILL and the child is reaped.
///
/// The leader is only reaped after its group has been killed, so the group
/// id cannot have been reused by the time the signal goes out.
pub fn run_with_deadline<F>(
    mut command: Command,
    timeout: Duration,
    capture_limit: usize,
    on_timeout: F,
) -> Result<ProcessOutcome>
where
    F: FnOnce(),
{
    let program = command.get_program().to_string_lossy().into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| {
        SandboxError::RuntimeUnavailable(format!("failed to spawn {}: {}", program, e))
    })?;

    let pgid = Pid::from_raw(child.id() as i32);
    let collector = OutputCollector::start(child.stdout.take(), child.stderr.take(), capture_limit);

    loop {
        match has_exited(pgid) {
            Ok(true) => break,
            Ok(false) => {
                if started.elapsed() >= timeout {
                    log::warn!(
                        "{} (pgid {}) exceeded {:?}, terminating",
                        program,
                        pgid,
                        timeout
                    );
                    on_timeout();
                    kill_group(pgid);
                    if let Err(e) = child.wait() {
                        log::warn!("Failed to reap {} after kill: {}", program, e);
                    }
                    // reader threads finish on their own once the pipes close
                    drop(collector);
                    return Ok(ProcessOutcome::TimedOut {
                        wall_time: started.elapsed(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_group(pgid);
                let _ = child.wait();
                return Err(SandboxError::RuntimeFailure(format!(
                    "wait on {} failed: {}",
                    program, e
                )));
            }
        }
    }

    let wall_time = started.elapsed();

    // leftover group members would hold the pipes open
    kill_group(pgid);
    let status = child.wait().map_err(|e| {
        SandboxError::RuntimeFailure(format!("reaping {} failed: {}", program, e))
    })?;
    let (stdout, stderr) = collector.finish();

    Ok(ProcessOutcome::Exited {
        stdout,
        stderr,
        exit_code: exit_code(status),
        wall_time,
    })
}

/// Whether `pid` has exited, leaving it unreaped.
pub fn has_exited(pid: Pid) -> std::result::Result<bool, Errno> {
    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
    loop {
        match waitid(Id::Pid(pid), flags) {
            Ok(WaitStatus::StillAlive) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Exit code, or 128 + signal number for signal deaths.
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|s| 128 + s))
}

/// SIGKILL the whole group. A group that is already gone is fine.
pub fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("killpg({}, SIGKILL) failed: {}", pgid, e),
    }
}
