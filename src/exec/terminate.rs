// src/exec/terminate.rs

//! Process-tree termination.
//!
//! On Unix every task process is started as the leader of its own process
//! group, so one `killpg` reaches the interpreter and everything it spawned.
//! On Windows `taskkill /T /F` walks the tree.

use std::io;

use tokio::process::{Child, Command};
use tracing::debug;

/// Result of a termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process was alive and has been killed.
    Killed,
    /// The process had already exited; any remaining descendants were still
    /// signalled.
    AlreadyExited,
}

/// Put the process into its own group so the whole tree can be signalled.
pub fn prepare(cmd: &mut Command) {
    #[cfg(unix)]
    {
        // SAFETY: setpgid is async-signal-safe and is the only call made
        // between fork and exec.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setpgid(0, 0) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Kill `child` and all of its descendants, then reap `child`.
///
/// `pid` must be the id captured right after spawning; `Child::id` returns
/// `None` once the child has been reaped.
pub async fn terminate_tree(child: &mut Child, pid: Option<u32>) -> io::Result<Termination> {
    let already_exited = child.try_wait()?.is_some();

    let signalled = match pid {
        Some(pid) => signal_tree(pid).await?,
        None => false,
    };
    debug!(?pid, already_exited, signalled, "process tree termination attempted");

    if already_exited {
        return Ok(Termination::AlreadyExited);
    }

    if !signalled {
        if let Err(err) = child.start_kill() {
            if child.try_wait()?.is_some() {
                return Ok(Termination::AlreadyExited);
            }
            return Err(err);
        }
    }

    child.wait().await?;
    Ok(Termination::Killed)
}

/// Returns `false` when nothing was left to signal.
#[cfg(unix)]
async fn signal_tree(pid: u32) -> io::Result<bool> {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return Ok(false);
    };

    // SAFETY: killpg takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
async fn signal_tree(pid: u32) -> io::Result<bool> {
    use std::process::Stdio;

    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    Ok(status.success())
}

#[cfg(not(any(unix, windows)))]
async fn signal_tree(_pid: u32) -> io::Result<bool> {
    Ok(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    #[tokio::test]
    async fn kills_running_process() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30"]).stdout(Stdio::null());
        prepare(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id();

        let outcome = terminate_tree(&mut child, pid).await.unwrap();
        assert_eq!(outcome, Termination::Killed);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn tolerates_already_exited_process() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 0"]);
        prepare(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id();
        child.wait().await.unwrap();

        let outcome = terminate_tree(&mut child, pid).await.unwrap();
        assert_eq!(outcome, Termination::AlreadyExited);
    }
}
