//! Permission/ownership snapshot for SysV IPC objects

/// Permission structure for a SysV IPC object.
///
/// Obtained from [`crate::IpcResource::permissions`]; a caller may modify
/// `uid`, `gid` and `mode` and write the snapshot back with
/// [`crate::IpcResource::set_permissions`]. The remaining fields mirror what
/// the kernel reported and are ignored on write, matching kernel behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Perm {
    /// IPC identifier this snapshot was obtained from
    pub id: i32,
    /// Owner user id (writable)
    pub uid: u32,
    /// Owner group id (writable)
    pub gid: u32,
    /// Creator user id (read-only)
    pub cuid: u32,
    /// Creator group id (read-only)
    pub cgid: u32,
    /// Access mode bits (writable)
    pub mode: u32,
    /// Slot usage sequence number (read-only)
    pub seq: u32,
    /// Key the object was created with (read-only)
    pub key: i32,
}

impl Perm {
    /// Build a snapshot from the kernel's `ipc_perm` structure.
    pub(crate) fn from_raw(id: i32, raw: &libc::ipc_perm) -> Self {
        Self {
            id,
            uid: raw.uid as u32,
            gid: raw.gid as u32,
            cuid: raw.cuid as u32,
            cgid: raw.cgid as u32,
            mode: raw.mode as u32,
            seq: raw.__seq as u32,
            key: raw.__key as i32,
        }
    }

    /// Copy the writable fields into a kernel `ipc_perm` about to be passed
    /// to `IPC_SET`. The kernel only honors uid/gid/mode; the other fields
    /// are left as the preceding `IPC_STAT` reported them.
    pub(crate) fn apply_to_raw(&self, raw: &mut libc::ipc_perm) {
        raw.uid = self.uid as _;
        raw.gid = self.gid as _;
        raw.mode = self.mode as _;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip_preserves_read_only_fields() {
        let mut raw: libc::ipc_perm = unsafe { std::mem::zeroed() };
        raw.uid = 1000 as _;
        raw.gid = 1000 as _;
        raw.cuid = 500 as _;
        raw.cgid = 501 as _;
        raw.mode = 0o640 as _;
        raw.__seq = 7 as _;
        raw.__key = 0x5a5a as _;

        let mut perm = Perm::from_raw(3, &raw);
        assert_eq!(perm.id, 3);
        assert_eq!(perm.cuid, 500);
        assert_eq!(perm.seq, 7);
        assert_eq!(perm.key, 0x5a5a);

        perm.uid = 1001;
        perm.mode = 0o600;
        perm.apply_to_raw(&mut raw);
        assert_eq!(raw.uid as u32, 1001);
        assert_eq!(raw.mode as u32, 0o600);
        // Read-only fields untouched by the write-back.
        assert_eq!(raw.cuid as u32, 500);
        assert_eq!(raw.__seq as u32, 7);
    }
}
