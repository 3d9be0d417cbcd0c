//! Inode allocation and the in-memory inode representation.
//!
//! Grounded on the teacher's `ffs/inode.rs::Inode` (the in-memory/on-disk
//! split, `from_disk_layout`/`into_disk_format`), restructured around the
//! distilled specification's refill-by-scan free-inode window instead of the
//! teacher's bitmap.

use crate::error::{GnordoError, Result};
use crate::image::{pread_exact, pwrite_exact};
use crate::layout::{
    BlockNumber, FileKind, InodeNumber, RawInode, RawRepr, BLK_UNASSIGNED, FREE_INODE_LIST_SIZE,
    N_DIRECT_BLOCKS,
};
use crate::superblock::Superblock;
use std::fs::File;

/// An in-memory inode: the on-disk record plus the inode number it lives at.
#[derive(Clone, Debug)]
pub struct Inode {
    pub number: InodeNumber,
    pub raw: RawInode,
}

impl Inode {
    pub fn kind(&self) -> Result<FileKind> {
        FileKind::try_from(self.raw.kind)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind(), Ok(FileKind::Dir))
    }
}

/// Reads the inode record at `n`.
pub fn iget(file: &File, sb: &Superblock, n: InodeNumber) -> Result<Inode> {
    if n >= sb.raw.inode_count {
        return Err(GnordoError::Corrupt("inode number out of range"));
    }
    let mut buf = vec![0u8; std::mem::size_of::<RawInode>()];
    pread_exact(file, sb.inode_offset(n), &mut buf)?;
    Ok(Inode {
        number: n,
        raw: RawInode::from_bytes(&buf),
    })
}

/// Writes an inode record back. The core never batches this: every mutation
/// of a persistent field is followed immediately by a write-back.
pub fn iput(file: &File, sb: &Superblock, inode: &Inode) -> Result<()> {
    pwrite_exact(file, sb.inode_offset(inode.number), inode.raw.as_bytes())
}

/// Scans the inode table starting at the last free-list refill point,
/// wrapping at `inode_count`, collecting up to [`FREE_INODE_LIST_SIZE`] free
/// inodes. Found inodes are stored in reverse scan order so that
/// `free_inode_list[0]` holds the highest-numbered candidate, matching the
/// convention `mkfs` seeds at format time.
fn refill(file: &File, sb: &mut Superblock) -> Result<()> {
    let inode_count = sb.raw.inode_count;
    if inode_count == 0 {
        return Err(GnordoError::OutOfInodes);
    }
    let start = sb.raw.free_inode_list[0] % inode_count;
    let mut found = Vec::with_capacity(FREE_INODE_LIST_SIZE);
    let mut idx = start;
    for _ in 0..inode_count {
        let candidate = iget(file, sb, idx)?;
        if candidate.raw.kind == FileKind::Free as u32 {
            found.push(idx);
            if found.len() == FREE_INODE_LIST_SIZE {
                break;
            }
        }
        idx = (idx + 1) % inode_count;
    }

    let mut window = [0u32; FREE_INODE_LIST_SIZE];
    let count = found.len();
    for (i, v) in found.iter().enumerate() {
        window[count - 1 - i] = *v;
    }
    sb.raw.free_inode_list = window;
    sb.raw.free_inode_index = count as u16;
    Ok(())
}

/// Allocates a free inode number, marking it in-use in the superblock but
/// leaving its on-disk record untouched (the caller fills it in and calls
/// [`iput`]).
pub fn ialloc(file: &File, sb: &mut Superblock) -> Result<InodeNumber> {
    if sb.raw.free_inodes == 0 {
        return Err(GnordoError::OutOfInodes);
    }
    if sb.raw.free_inode_index == 0 {
        refill(file, sb)?;
        if sb.raw.free_inode_index == 0 {
            return Err(GnordoError::OutOfInodes);
        }
    }
    sb.raw.free_inode_index -= 1;
    let n = sb.raw.free_inode_list[sb.raw.free_inode_index as usize];
    sb.raw.free_inodes -= 1;
    sb.write(file)?;
    Ok(n)
}

/// Frees inode `n`: resets its on-disk record to the free state, and caches
/// it in the free-inode window when there's room.
pub fn ifree(file: &File, sb: &mut Superblock, n: InodeNumber) -> Result<()> {
    let freed = Inode {
        number: n,
        raw: RawInode::default(),
    };
    iput(file, sb, &freed)?;

    if (sb.raw.free_inode_index as usize) < FREE_INODE_LIST_SIZE {
        sb.raw.free_inode_list[sb.raw.free_inode_index as usize] = n;
        sb.raw.free_inode_index += 1;
    }
    sb.raw.free_inodes += 1;
    sb.write(file)
}

/// Builds a fresh, in-use inode record with the given kind/permissions,
/// owned by `uid`/`gid`, with every block pointer unassigned.
pub fn new_inode_record(kind: FileKind, perms: u32, uid: u32, gid: u32, now: i64) -> RawInode {
    RawInode {
        kind: kind as u32,
        size: 0,
        link_counter: 0,
        atime: now,
        ctime: now,
        mtime: now,
        owner: uid,
        group: gid,
        perms,
        direct_blocks: [BLK_UNASSIGNED; N_DIRECT_BLOCKS],
        single_indirect_blocks: BLK_UNASSIGNED,
    }
}

pub const _UNASSIGNED: BlockNumber = BLK_UNASSIGNED;
