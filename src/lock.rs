//! PID-based advisory lock files
//!
//! A lock file is a plain text file holding one line: the decimal pid of
//! the process that owns the lock, with trailing newline. The first process
//! to write its pid owns the lock; a lock is stale once that pid no longer
//! exists, and the next acquirer reclaims it. There is an unavoidable race
//! window when reclaiming a stale lock, see [`PidLock::acquire`].

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::LockError;
use crate::process::{is_pid_alive, ProcessIdentity};

/// Serializes acquisition attempts within this process. The check-then-write
/// sequence is not atomic across processes, so at least two threads of the
/// same process must never interleave it on the same path. One mutex for all
/// paths is the conservative choice.
static ACQUIRE: Mutex<()> = Mutex::new(());

/// An advisory lock held via a pid file on a well-known path.
///
/// Construction attempts acquisition; an `Ok` value holds the lock until
/// [`release`](PidLock::release) or drop. Dropping a held lock deletes the
/// file as a best-effort safety net, but a process that dies abruptly leaves
/// the file behind for the next acquirer to reclaim.
#[derive(Debug)]
pub struct PidLock {
    /// Some while held; taken on release.
    path: Option<PathBuf>,
}

impl PidLock {
    /// Attempt to acquire the lock at `path`.
    ///
    /// If the file exists, its recorded pid decides the outcome: any alive
    /// pid, our own included, fails with [`LockError::Held`], while a dead
    /// pid or unparsable content counts as abandoned and the file is
    /// rewritten (truncated, never appended) with our pid. Treating our own
    /// pid as a holder here is what keeps a second thread of this process
    /// from reacquiring a lock the first thread holds. After writing, the
    /// file is read back and must still name us; if a concurrent acquirer
    /// from another process won the race in between, acquisition fails with
    /// `Held` naming the winner.
    ///
    /// The re-check narrows the window between the staleness check and the
    /// write but cannot close it: without an atomic create-exclusive step,
    /// two processes interleaving this sequence may both briefly believe
    /// they hold the lock.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let me = ProcessIdentity::get().pid;
        let _serial = ACQUIRE.lock().unwrap();

        let existed = path.exists();
        if existed {
            // No self exemption before the write: a live holder with our
            // own pid is another thread of this process.
            check_holder(&path, 0)?;
        }

        // A stale or abandoned file must be rewritten from the start; only
        // a fresh file is opened in create/append mode.
        let open = if existed {
            OpenOptions::new().write(true).truncate(true).open(&path)
        } else {
            OpenOptions::new().create(true).append(true).open(&path)
        };

        let write = open.and_then(|mut file| writeln!(file, "{me}"));
        if let Err(e) = write {
            // Never leave behind a file this attempt created itself.
            if !existed {
                let _ = fs::remove_file(&path);
            }
            return Err(LockError::io(&path, e));
        }

        // Best-effort guard against a racer that wrote its own pid between
        // the staleness check and our write.
        if let Err(e) = check_holder(&path, me) {
            if !existed && matches!(e, LockError::Io { .. }) {
                let _ = fs::remove_file(&path);
            }
            return Err(e);
        }

        debug!(path = %path.display(), pid = me, "lock file acquired");
        Ok(Self { path: Some(path) })
    }

    /// True until the lock has been released.
    pub fn is_held(&self) -> bool {
        self.path.is_some()
    }

    /// The lock file path, while held.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Delete the lock file and release the lock. Releasing an already
    /// released lock is a no-op.
    pub fn release(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), "could not delete lock file: {e}");
            } else {
                debug!(path = %path.display(), "lock file released");
            }
        }
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            warn!(path = %path.display(), "lock file dropped without explicit release");
            self.release();
        }
    }
}

/// Fail with `Held` when the file names a pid that is alive and is not
/// `me`. Unparsable content counts as abandoned. An unreadable file is an
/// `Io` failure: distinguishing "owned by someone" from "cannot operate
/// here" is the caller's basis for retry decisions.
fn check_holder(path: &Path, me: i32) -> Result<(), LockError> {
    let content = fs::read_to_string(path).map_err(|e| LockError::io(path, e))?;
    let line = content.lines().next().unwrap_or("");
    if let Ok(pid) = line.trim().parse::<i32>() {
        if pid != me && is_pid_alive(pid) {
            return Err(LockError::Held {
                path: path.to_path_buf(),
                pid,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn own_pid_line() -> String {
        format!("{}\n", ProcessIdentity::get().pid)
    }

    #[test]
    fn test_fresh_acquire_writes_own_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.lock");

        let lock = PidLock::acquire(&path).unwrap();
        assert!(lock.is_held());
        assert_eq!(lock.path(), Some(path.as_path()));
        assert_eq!(fs::read_to_string(&path).unwrap(), own_pid_line());
    }

    #[test]
    fn test_alive_foreign_holder_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("held.lock");
        // pid 1 always exists and is never us.
        fs::write(&path, "1\n").unwrap();

        match PidLock::acquire(&path) {
            Err(LockError::Held { pid, path: p }) => {
                assert_eq!(pid, 1);
                assert_eq!(p, path);
            }
            other => panic!("expected Held, got {other:?}"),
        }
        // The holder's file is untouched.
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn test_garbage_content_is_reclaimed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.lock");
        fs::write(&path, "garbage\n").unwrap();

        let lock = PidLock::acquire(&path).unwrap();
        assert!(lock.is_held());
        assert_eq!(fs::read_to_string(&path).unwrap(), own_pid_line());
    }

    #[test]
    fn test_empty_file_is_reclaimed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.lock");
        fs::write(&path, "").unwrap();

        let lock = PidLock::acquire(&path).unwrap();
        assert!(lock.is_held());
    }

    #[test]
    fn test_dead_holder_is_overwritten_not_appended() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stale.lock");
        // Far above any real pid_max, so certainly dead; extra bytes verify
        // the rewrite truncates.
        fs::write(&path, format!("{}\ntrailing junk\n", i32::MAX - 1)).unwrap();

        let lock = PidLock::acquire(&path).unwrap();
        assert!(lock.is_held());
        assert_eq!(fs::read_to_string(&path).unwrap(), own_pid_line());
    }

    #[test]
    fn test_own_pid_counts_as_held() {
        // A file naming our own pid means another thread of this process
        // holds the lock; acquisition must refuse it.
        let dir = tempdir().unwrap();
        let path = dir.path().join("mine.lock");
        fs::write(&path, own_pid_line()).unwrap();

        let me = ProcessIdentity::get().pid;
        match PidLock::acquire(&path) {
            Err(LockError::Held { pid, .. }) => assert_eq!(pid, me),
            other => panic!("expected Held, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), own_pid_line());
    }

    #[test]
    fn test_second_acquisition_in_process_fails_while_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.lock");

        let first = PidLock::acquire(&path).unwrap();
        assert!(matches!(
            PidLock::acquire(&path),
            Err(LockError::Held { .. })
        ));
        assert!(first.is_held());
    }

    #[test]
    fn test_release_deletes_file_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("release.lock");

        let mut lock = PidLock::acquire(&path).unwrap();
        lock.release();
        assert!(!lock.is_held());
        assert!(lock.path().is_none());
        assert!(!path.exists());

        // Second release is a no-op.
        lock.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_deletes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.lock");
        {
            let _lock = PidLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_directory_is_io_not_held() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("x.lock");

        match PidLock::acquire(&missing) {
            Err(LockError::Io { .. }) => {}
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
