//! File status metadata
//!
//! The cross-platform std metadata API does not surface everything POSIX
//! reports. This module exposes the full `stat(2)` record plus the
//! mutation calls that go with it (utimes/chmod/chown/umask).

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Snapshot of one file's `stat(2)` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    /// Device containing the file
    pub dev: u64,
    /// Inode number
    pub ino: u64,
    /// File type and permission bits
    pub mode: u32,
    /// Number of hard links
    pub nlink: u64,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Device id if this is a device special file
    pub rdev: u64,
    /// Size in bytes
    pub size: i64,
    /// Last access time, seconds since the epoch
    pub atime: i64,
    /// Last data modification time, seconds since the epoch
    pub mtime: i64,
    /// Last status change time, seconds since the epoch
    pub ctime: i64,
    /// Preferred I/O block size
    pub blksize: i64,
    /// Number of 512-byte blocks allocated
    pub blocks: i64,
}

impl FileStatus {
    /// Stat `path`, following symlinks.
    pub fn of(path: &Path) -> io::Result<Self> {
        let cpath = cpath(path)?;
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::stat(cpath.as_ptr(), &mut st) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self::from_raw(&st))
    }

    /// Stat `path` itself; a symlink is described, not followed.
    pub fn of_link(path: &Path) -> io::Result<Self> {
        let cpath = cpath(path)?;
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::lstat(cpath.as_ptr(), &mut st) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self::from_raw(&st))
    }

    fn from_raw(st: &libc::stat) -> Self {
        Self {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            nlink: st.st_nlink as u64,
            uid: st.st_uid as u32,
            gid: st.st_gid as u32,
            rdev: st.st_rdev as u64,
            size: st.st_size as i64,
            atime: st.st_atime as i64,
            mtime: st.st_mtime as i64,
            ctime: st.st_ctime as i64,
            blksize: st.st_blksize as i64,
            blocks: st.st_blocks as i64,
        }
    }

    fn is_type(&self, mask: u32) -> bool {
        self.mode & libc::S_IFMT as u32 == mask
    }

    /// Regular file
    pub fn is_regular(&self) -> bool {
        self.is_type(libc::S_IFREG as u32)
    }

    /// Directory
    pub fn is_directory(&self) -> bool {
        self.is_type(libc::S_IFDIR as u32)
    }

    /// Symbolic link (only meaningful from [`of_link`](Self::of_link))
    pub fn is_symlink(&self) -> bool {
        self.is_type(libc::S_IFLNK as u32)
    }

    /// Character device
    pub fn is_char_device(&self) -> bool {
        self.is_type(libc::S_IFCHR as u32)
    }

    /// Block device
    pub fn is_block_device(&self) -> bool {
        self.is_type(libc::S_IFBLK as u32)
    }

    /// Named pipe
    pub fn is_fifo(&self) -> bool {
        self.is_type(libc::S_IFIFO as u32)
    }

    /// Unix domain socket
    pub fn is_socket(&self) -> bool {
        self.is_type(libc::S_IFSOCK as u32)
    }

    /// Permission bits without the file type.
    pub fn permission_bits(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Last access time as a `SystemTime`.
    pub fn accessed(&self) -> SystemTime {
        epoch_secs(self.atime)
    }

    /// Last modification time as a `SystemTime`.
    pub fn modified(&self) -> SystemTime {
        epoch_secs(self.mtime)
    }

    /// Last status change time as a `SystemTime`.
    pub fn changed(&self) -> SystemTime {
        epoch_secs(self.ctime)
    }
}

fn epoch_secs(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

fn cpath(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))
}

fn timeval(time: SystemTime) -> libc::timeval {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => libc::timeval {
            tv_sec: d.as_secs() as libc::time_t,
            tv_usec: d.subsec_micros() as libc::suseconds_t,
        },
        Err(e) => {
            let before = e.duration();
            let mut sec = -(before.as_secs() as i64);
            let mut usec = -(before.subsec_micros() as i64);
            if usec < 0 {
                sec -= 1;
                usec += 1_000_000;
            }
            libc::timeval {
                tv_sec: sec as libc::time_t,
                tv_usec: usec as libc::suseconds_t,
            }
        }
    }
}

/// Set the access and modification times of a file, microsecond precision.
pub fn set_times(path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
    let cpath = cpath(path)?;
    let times = [timeval(atime), timeval(mtime)];
    if unsafe { libc::utimes(cpath.as_ptr(), times.as_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set the permission bits of a file.
pub fn chmod(path: &Path, mode: u32) -> io::Result<()> {
    let cpath = cpath(path)?;
    if unsafe { libc::chmod(cpath.as_ptr(), mode as libc::mode_t) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set the owner and group of a file. Requires privilege for most changes.
pub fn chown(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    let cpath = cpath(path)?;
    if unsafe { libc::chown(cpath.as_ptr(), uid as libc::uid_t, gid as libc::gid_t) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set the process file creation mask, returning the previous value.
/// The mask is process-wide, so callers creating files with a specific
/// mask should serialize around the set/create/restore sequence.
pub fn umask(mask: u32) -> u32 {
    unsafe { libc::umask(mask as libc::mode_t) as u32 }
}

/// Read the current file creation mask without changing it. There is no
/// read-only query, so this sets and immediately restores.
pub fn umask_current() -> u32 {
    let old = umask(0);
    umask(old);
    old
}
