//! SysV IPC resource ownership
//!
//! A handle to a kernel IPC object (message queue, semaphore set or shared
//! memory segment) tracks whether this process created the object. Kernel
//! IPC objects outlive the process unless explicitly removed, so ownership
//! decides who tears the object down: `dispose()` removes it only from the
//! creating handle, while `remove()` destroys it unconditionally from any
//! handle.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::IpcError;
use crate::perm::Perm;

/// Capability contract shared by all SysV IPC kinds.
pub trait IpcResource {
    /// Kernel-assigned identifier, -1 if unbound.
    fn id(&self) -> i32;

    /// True iff this handle created the underlying kernel object.
    fn is_owner(&self) -> bool;

    /// Read the full permission/ownership snapshot.
    fn permissions(&self) -> Result<Perm, IpcError>;

    /// Write back a snapshot obtained from [`permissions`](Self::permissions).
    /// Only uid, gid and mode take effect; the kernel ignores the rest.
    fn set_permissions(&self, perm: &Perm) -> Result<(), IpcError>;

    /// Change just uid, gid and mode, preserving everything else.
    fn set_owner_mode(&self, uid: u32, gid: u32, mode: u32) -> Result<(), IpcError> {
        let mut perm = self.permissions()?;
        perm.uid = uid;
        perm.gid = gid;
        perm.mode = mode;
        self.set_permissions(&perm)
    }

    /// Destroy the kernel object unconditionally, owner or not. Every other
    /// process attached to the same id will see its next operation fail.
    /// Removing an object that is already gone succeeds.
    fn remove(&mut self) -> Result<(), IpcError>;

    /// Destroy the kernel object iff this handle is the owner; a no-op
    /// otherwise. Idempotent: a second call observes the object already gone
    /// and succeeds. Also runs from `Drop` as a best-effort safety net, but
    /// callers should dispose explicitly since drop timing carries no
    /// guarantee across panics or process death.
    fn dispose(&mut self);
}

/// IPC object kind, selecting which control syscall family applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    MessageQueue,
    SemaphoreSet,
    SharedMemory,
}

impl Kind {
    fn stat(self, id: i32) -> Result<Perm, IpcError> {
        match self {
            Kind::MessageQueue => {
                let mut ds: libc::msqid_ds = unsafe { std::mem::zeroed() };
                let rc = unsafe { libc::msgctl(id, libc::IPC_STAT, &mut ds) };
                if rc != 0 {
                    return Err(IpcError::last("msgctl(IPC_STAT)", id));
                }
                Ok(Perm::from_raw(id, &ds.msg_perm))
            }
            Kind::SemaphoreSet => {
                let mut ds: libc::semid_ds = unsafe { std::mem::zeroed() };
                let rc =
                    unsafe { libc::semctl(id, 0, libc::IPC_STAT, &mut ds as *mut libc::semid_ds) };
                if rc != 0 {
                    return Err(IpcError::last("semctl(IPC_STAT)", id));
                }
                Ok(Perm::from_raw(id, &ds.sem_perm))
            }
            Kind::SharedMemory => {
                let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
                let rc = unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) };
                if rc != 0 {
                    return Err(IpcError::last("shmctl(IPC_STAT)", id));
                }
                Ok(Perm::from_raw(id, &ds.shm_perm))
            }
        }
    }

    /// IPC_SET takes the full ds structure, so read it fresh and overlay the
    /// writable fields before writing back.
    fn set(self, id: i32, perm: &Perm) -> Result<(), IpcError> {
        match self {
            Kind::MessageQueue => {
                let mut ds: libc::msqid_ds = unsafe { std::mem::zeroed() };
                if unsafe { libc::msgctl(id, libc::IPC_STAT, &mut ds) } != 0 {
                    return Err(IpcError::last("msgctl(IPC_STAT)", id));
                }
                perm.apply_to_raw(&mut ds.msg_perm);
                if unsafe { libc::msgctl(id, libc::IPC_SET, &mut ds) } != 0 {
                    return Err(IpcError::last("msgctl(IPC_SET)", id));
                }
                Ok(())
            }
            Kind::SemaphoreSet => {
                let mut ds: libc::semid_ds = unsafe { std::mem::zeroed() };
                if unsafe { libc::semctl(id, 0, libc::IPC_STAT, &mut ds as *mut libc::semid_ds) }
                    != 0
                {
                    return Err(IpcError::last("semctl(IPC_STAT)", id));
                }
                perm.apply_to_raw(&mut ds.sem_perm);
                if unsafe { libc::semctl(id, 0, libc::IPC_SET, &mut ds as *mut libc::semid_ds) }
                    != 0
                {
                    return Err(IpcError::last("semctl(IPC_SET)", id));
                }
                Ok(())
            }
            Kind::SharedMemory => {
                let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
                if unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) } != 0 {
                    return Err(IpcError::last("shmctl(IPC_STAT)", id));
                }
                perm.apply_to_raw(&mut ds.shm_perm);
                if unsafe { libc::shmctl(id, libc::IPC_SET, &mut ds) } != 0 {
                    return Err(IpcError::last("shmctl(IPC_SET)", id));
                }
                Ok(())
            }
        }
    }

    fn remove(self, id: i32) -> Result<(), IpcError> {
        let rc = match self {
            Kind::MessageQueue => unsafe {
                libc::msgctl(id, libc::IPC_RMID, std::ptr::null_mut())
            },
            Kind::SemaphoreSet => unsafe { libc::semctl(id, 0, libc::IPC_RMID) },
            Kind::SharedMemory => unsafe {
                libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut())
            },
        };
        if rc != 0 {
            let op = match self {
                Kind::MessageQueue => "msgctl(IPC_RMID)",
                Kind::SemaphoreSet => "semctl(IPC_RMID)",
                Kind::SharedMemory => "shmctl(IPC_RMID)",
            };
            return Err(IpcError::last(op, id));
        }
        Ok(())
    }
}

/// Shared identity/ownership state behind every concrete IPC kind.
#[derive(Debug)]
struct IpcHandle {
    kind: Kind,
    id: i32,
    owner: bool,
}

impl IpcHandle {
    fn new(kind: Kind, id: i32, owner: bool) -> Self {
        Self { kind, id, owner }
    }

    fn permissions(&self) -> Result<Perm, IpcError> {
        self.kind.stat(self.id)
    }

    fn set_permissions(&self, perm: &Perm) -> Result<(), IpcError> {
        self.kind.set(self.id, perm)
    }

    fn remove(&mut self) -> Result<(), IpcError> {
        let result = self.kind.remove(self.id);
        // Whatever the outcome, this handle no longer owns a live object.
        self.owner = false;
        match result {
            Err(e) if e.is_gone() => Ok(()),
            other => other,
        }
    }

    fn dispose(&mut self) {
        if !self.owner || self.id < 0 {
            return;
        }
        self.owner = false;
        match self.kind.remove(self.id) {
            Ok(()) => debug!(id = self.id, kind = ?self.kind, "removed ipc object"),
            Err(e) if e.is_gone() => {}
            Err(e) => warn!(id = self.id, "dispose could not remove ipc object: {e}"),
        }
    }
}

macro_rules! impl_ipc_resource {
    ($ty:ty) => {
        impl IpcResource for $ty {
            fn id(&self) -> i32 {
                self.handle.id
            }

            fn is_owner(&self) -> bool {
                self.handle.owner
            }

            fn permissions(&self) -> Result<Perm, IpcError> {
                self.handle.permissions()
            }

            fn set_permissions(&self, perm: &Perm) -> Result<(), IpcError> {
                self.handle.set_permissions(perm)
            }

            fn remove(&mut self) -> Result<(), IpcError> {
                self.handle.remove()
            }

            fn dispose(&mut self) {
                self.handle.dispose()
            }
        }

        impl Drop for $ty {
            fn drop(&mut self) {
                self.handle.dispose();
            }
        }
    };
}

/// Handle to a SysV message queue.
#[derive(Debug)]
pub struct MessageQueue {
    handle: IpcHandle,
}

impl MessageQueue {
    /// Create a new queue for `key`. Fails if the key is already in use.
    /// The returned handle owns the queue.
    pub fn create(key: i32, mode: u32) -> Result<Self, IpcError> {
        let id = unsafe { libc::msgget(key, mode as i32 | libc::IPC_CREAT | libc::IPC_EXCL) };
        if id < 0 {
            return Err(IpcError::last("msgget", -1));
        }
        Ok(Self {
            handle: IpcHandle::new(Kind::MessageQueue, id, true),
        })
    }

    /// Create a queue that no key refers to.
    pub fn private(mode: u32) -> Result<Self, IpcError> {
        Self::create(libc::IPC_PRIVATE, mode)
    }

    /// Attach to an existing queue. The returned handle does not own it and
    /// will never remove it on dispose.
    pub fn attach(key: i32) -> Result<Self, IpcError> {
        let id = unsafe { libc::msgget(key, 0) };
        if id < 0 {
            return Err(IpcError::last("msgget", -1));
        }
        Ok(Self {
            handle: IpcHandle::new(Kind::MessageQueue, id, false),
        })
    }
}

impl_ipc_resource!(MessageQueue);

/// Handle to a SysV semaphore set.
#[derive(Debug)]
pub struct SemaphoreSet {
    handle: IpcHandle,
}

impl SemaphoreSet {
    /// Create a new set of `nsems` semaphores for `key`. Fails if the key
    /// is already in use. The returned handle owns the set.
    pub fn create(key: i32, nsems: i32, mode: u32) -> Result<Self, IpcError> {
        let id =
            unsafe { libc::semget(key, nsems, mode as i32 | libc::IPC_CREAT | libc::IPC_EXCL) };
        if id < 0 {
            return Err(IpcError::last("semget", -1));
        }
        Ok(Self {
            handle: IpcHandle::new(Kind::SemaphoreSet, id, true),
        })
    }

    /// Create a set that no key refers to.
    pub fn private(nsems: i32, mode: u32) -> Result<Self, IpcError> {
        Self::create(libc::IPC_PRIVATE, nsems, mode)
    }

    /// Attach to an existing set without owning it.
    pub fn attach(key: i32) -> Result<Self, IpcError> {
        let id = unsafe { libc::semget(key, 0, 0) };
        if id < 0 {
            return Err(IpcError::last("semget", -1));
        }
        Ok(Self {
            handle: IpcHandle::new(Kind::SemaphoreSet, id, false),
        })
    }
}

impl_ipc_resource!(SemaphoreSet);

/// Handle to a SysV shared memory segment.
#[derive(Debug)]
pub struct SharedMemory {
    handle: IpcHandle,
}

impl SharedMemory {
    /// Create a new segment of `len` bytes for `key`. Fails if the key is
    /// already in use. The returned handle owns the segment.
    pub fn create(key: i32, len: usize, mode: u32) -> Result<Self, IpcError> {
        let id = unsafe { libc::shmget(key, len, mode as i32 | libc::IPC_CREAT | libc::IPC_EXCL) };
        if id < 0 {
            return Err(IpcError::last("shmget", -1));
        }
        Ok(Self {
            handle: IpcHandle::new(Kind::SharedMemory, id, true),
        })
    }

    /// Create a segment that no key refers to.
    pub fn private(len: usize, mode: u32) -> Result<Self, IpcError> {
        Self::create(libc::IPC_PRIVATE, len, mode)
    }

    /// Attach to an existing segment without owning it.
    pub fn attach(key: i32) -> Result<Self, IpcError> {
        let id = unsafe { libc::shmget(key, 0, 0) };
        if id < 0 {
            return Err(IpcError::last("shmget", -1));
        }
        Ok(Self {
            handle: IpcHandle::new(Kind::SharedMemory, id, false),
        })
    }
}

impl_ipc_resource!(SharedMemory);

/// Derive an IPC key from an existing path and a project id, as `ftok(3)`
/// does. The same pair always yields the same key on one system.
pub fn ftok(path: &Path, proj: i32) -> std::io::Result<i32> {
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let key = unsafe { libc::ftok(cpath.as_ptr(), proj) };
    if key == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(key)
}
