//! Process identity and liveness
//!
//! The pid/euid/egid of the current process are read once on first use and
//! treated as immutable for the rest of the process lifetime. The liveness
//! probe is the single primitive the lock file protocol builds on.

use std::sync::OnceLock;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Identity of the current process, captured once.
#[derive(Debug, Clone, Copy)]
pub struct ProcessIdentity {
    /// Process id
    pub pid: i32,
    /// Effective user id at capture time
    pub euid: u32,
    /// Effective group id at capture time
    pub egid: u32,
}

static IDENTITY: OnceLock<ProcessIdentity> = OnceLock::new();

impl ProcessIdentity {
    /// Get the process identity, capturing it on first call.
    pub fn get() -> &'static ProcessIdentity {
        IDENTITY.get_or_init(|| ProcessIdentity {
            pid: std::process::id() as i32,
            euid: unsafe { libc::geteuid() },
            egid: unsafe { libc::getegid() },
        })
    }
}

/// Probe whether a process id is currently alive.
///
/// Sends signal 0 to `pid`. Only "no such process" counts as dead; any
/// other outcome, including permission denied, means some process with
/// that id exists.
pub fn is_pid_alive(pid: i32) -> bool {
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matches_os() {
        let id = ProcessIdentity::get();
        assert_eq!(id.pid, std::process::id() as i32);
        assert_eq!(id.euid, unsafe { libc::geteuid() });
        assert_eq!(id.egid, unsafe { libc::getegid() });
    }

    #[test]
    fn test_identity_is_stable() {
        let a = ProcessIdentity::get() as *const _;
        let b = ProcessIdentity::get() as *const _;
        assert_eq!(a, b);
    }

    #[test]
    fn test_own_pid_is_alive() {
        assert!(is_pid_alive(ProcessIdentity::get().pid));
    }

    #[test]
    fn test_init_is_alive() {
        // pid 1 always exists; we may not be allowed to signal it, which
        // still counts as alive.
        assert!(is_pid_alive(1));
    }

    #[test]
    fn test_nonexistent_pid_is_dead() {
        // Far above any real pid_max.
        assert!(!is_pid_alive(i32::MAX - 1));
    }
}
