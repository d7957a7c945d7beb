//! Error types for Warden operations

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// A failed control operation on a kernel IPC object.
///
/// Carries the operation name, the IPC identifier it was applied to and the
/// OS error code reported by the kernel. Nothing is retried internally;
/// retry policy belongs to the caller.
#[derive(Debug, Clone, Error)]
#[error("{op} failed for ipc id {id}: {errno}")]
pub struct IpcError {
    /// Name of the control operation that failed (e.g. "msgctl(IPC_STAT)")
    pub op: &'static str,
    /// IPC identifier the operation was applied to (-1 if unbound)
    pub id: i32,
    /// Underlying OS error code
    pub errno: Errno,
}

impl IpcError {
    pub(crate) fn last(op: &'static str, id: i32) -> Self {
        Self {
            op,
            id,
            errno: Errno::last(),
        }
    }

    /// True if the kernel object no longer exists (removed by us or by
    /// another process).
    pub fn is_gone(&self) -> bool {
        matches!(self.errno, Errno::EINVAL | Errno::EIDRM)
    }
}

/// A failed lock file acquisition.
///
/// `Held` means another live process owns the path; `Io` means the file
/// could not be created, read or written at all. Callers that want to wait
/// and retry should do so only on `Held`.
#[derive(Debug, Error)]
pub enum LockError {
    /// A live process other than this one holds the lock file.
    #[error("valid lock file exists: pid {pid} - {}", path.display())]
    Held { path: PathBuf, pid: i32 },

    /// The lock file could not be created, read or written.
    #[error("lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipc_error_display() {
        let err = IpcError {
            op: "msgctl(IPC_STAT)",
            id: 42,
            errno: Errno::EIDRM,
        };
        let msg = err.to_string();
        assert!(msg.contains("msgctl(IPC_STAT)"));
        assert!(msg.contains("42"));
        assert!(err.is_gone());
    }

    #[test]
    fn test_lock_error_variants_distinguishable() {
        let held = LockError::Held {
            path: PathBuf::from("/tmp/test.lock"),
            pid: 1234,
        };
        assert!(matches!(held, LockError::Held { pid: 1234, .. }));
        assert!(held.to_string().contains("1234"));

        let io = LockError::io(
            std::path::Path::new("/tmp/test.lock"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(io, LockError::Io { .. }));
    }
}
