//! Warden - POSIX IPC ownership and PID lock file primitives
//!
//! Provides:
//! - Ownership-tracked handles for SysV IPC objects (message queues,
//!   semaphore sets, shared memory segments) with permission get/set and
//!   dispose-only-if-owner semantics
//! - Advisory lock files keyed on process liveness, with stale-lock
//!   reclamation
//! - POSIX file status metadata beyond what std exposes
//!
//! Kernel IPC objects and lock files both outlive the process that made
//! them; this crate's job is tracking who may clean them up, and doing so
//! at most once.

mod error;
mod ipc;
mod lock;
mod perm;
mod process;
mod stat;

pub use error::{IpcError, LockError};
pub use ipc::{ftok, IpcResource, MessageQueue, SemaphoreSet, SharedMemory};
pub use lock::PidLock;
pub use perm::Perm;
pub use process::{is_pid_alive, ProcessIdentity};
pub use stat::{chmod, chown, set_times, umask, umask_current, FileStatus};
