//! Permission checks against an inode's owner/group/other mode bits.
//!
//! Grounded on `original_source/perms.c`'s `can_read_p`/`can_write_p`/
//! `can_exec_p`: each does `if (uid == 0) return 1;` and otherwise tests
//! `perms & (S_IxUSR|S_IxGRP|S_IxOTH)` — true the moment the relevant bit is
//! set in *any* of the owner/group/other triads, with no check that the
//! caller's uid/gid actually matches the inode's owner or group. UID 0
//! bypasses the triads entirely. This is the source's real behavior, not a
//! simplification of it.

use crate::error::{GnordoError, Result};
use crate::inode::Inode;
use bitflags::bitflags;

bitflags! {
    /// Mirrors the POSIX `access(2)` mask bits.
    pub struct AccessMask: u32 {
        const X_OK = 0b001;
        const W_OK = 0b010;
        const R_OK = 0b100;
    }
}

/// Checks every bit set in `mask` against `inode`'s permissions. `uid == 0`
/// always passes; otherwise each requested bit must be set in at least one
/// of the owner/group/other triads.
pub fn access_check(inode: &Inode, uid: u32, _gid: u32, mask: AccessMask) -> Result<()> {
    if uid == 0 {
        return Ok(());
    }
    let perms = inode.raw.perms;
    if mask.contains(AccessMask::R_OK) && (perms & 0o444) == 0 {
        return Err(GnordoError::PermissionDenied);
    }
    if mask.contains(AccessMask::W_OK) && (perms & 0o222) == 0 {
        return Err(GnordoError::PermissionDenied);
    }
    if mask.contains(AccessMask::X_OK) && (perms & 0o111) == 0 {
        return Err(GnordoError::PermissionDenied);
    }
    Ok(())
}

pub fn can_read_p(inode: &Inode, uid: u32, gid: u32) -> bool {
    access_check(inode, uid, gid, AccessMask::R_OK).is_ok()
}

pub fn can_write_p(inode: &Inode, uid: u32, gid: u32) -> bool {
    access_check(inode, uid, gid, AccessMask::W_OK).is_ok()
}

pub fn can_exec_p(inode: &Inode, uid: u32, gid: u32) -> bool {
    access_check(inode, uid, gid, AccessMask::X_OK).is_ok()
}
