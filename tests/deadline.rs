//! Deadline enforcement against real processes
//!
//! Uses plain `sh` children so no container runtime is needed.

use snipbox::exec::process::{run_with_deadline, ProcessOutcome};
use std::fs;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

/// Gone, or a zombie waiting for its new parent to reap it.
fn process_is_dead(pid: i32) -> bool {
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map(|rest| rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
    }
}

fn wait_dead(pid: i32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if process_is_dead(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    process_is_dead(pid)
}

fn read_pid(path: &std::path::Path) -> i32 {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Ok(text) = fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        assert!(Instant::now() < deadline, "child never wrote its pid");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_spinning_child_times_out_within_window() {
    let started = Instant::now();
    let outcome = run_with_deadline(
        sh("while :; do :; done"),
        Duration::from_millis(300),
        1024,
        || {},
    )
    .unwrap();

    assert!(matches!(outcome, ProcessOutcome::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_timeout_kills_whole_process_group() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("grandchild.pid");
    let script = format!("sleep 60 & echo $! > {}; wait", pidfile.display());

    let outcome = run_with_deadline(sh(&script), Duration::from_millis(300), 1024, || {}).unwrap();
    assert!(matches!(outcome, ProcessOutcome::TimedOut { .. }));

    let pid = read_pid(&pidfile);
    assert!(wait_dead(pid), "grandchild {} survived the timeout", pid);
}

#[test]
fn test_stray_children_do_not_hold_output_open() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("stray.pid");
    // the background sleep inherits stdout and would keep the pipe open
    let script = format!("sleep 60 & echo $! > {}; echo done", pidfile.display());

    let started = Instant::now();
    let outcome = run_with_deadline(sh(&script), Duration::from_secs(10), 1024, || {}).unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    match outcome {
        ProcessOutcome::Exited {
            stdout, exit_code, ..
        } => {
            assert_eq!(stdout.bytes, b"done\n");
            assert_eq!(exit_code, Some(0));
        }
        other => panic!("expected exit, got {:?}", other),
    }

    let pid = read_pid(&pidfile);
    assert!(wait_dead(pid), "stray child {} survived", pid);
}

#[test]
fn test_chatty_child_is_bounded_and_not_blocked() {
    let outcome = run_with_deadline(
        sh("head -c 5000000 /dev/zero | tr '\\0' 'a'; echo tail >&2"),
        Duration::from_secs(10),
        1000,
        || {},
    )
    .unwrap();

    match outcome {
        ProcessOutcome::Exited { stdout, stderr, .. } => {
            assert_eq!(stdout.bytes.len(), 1000);
            assert!(stdout.overflowed);
            assert_eq!(stderr.bytes, b"tail\n");
        }
        other => panic!("expected exit, got {:?}", other),
    }
}
