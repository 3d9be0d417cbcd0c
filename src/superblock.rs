//! The superblock: in-memory view of the volume's geometry and free-lists.
//!
//! Grounded on the teacher's `disk_layout::SuperBlock` (persistent fields) and
//! `access_control::SuperBlock::from_disk` (load-on-mount), generalized from
//! a bitmap-backed volume to the Unix V7 chained free-list the distilled
//! specification calls for.

use crate::error::{GnordoError, Result};
use crate::image::{pread_exact, pwrite_exact};
use crate::layout::{
    FileKind, InodeNumber, RawInode, RawRepr, RawSuperblock, FREE_BLOCK_LIST_SIZE,
    FREE_INODE_LIST_SIZE, MAGIC,
};
use std::fs::File;
use std::mem::size_of;

/// Returns the number of inodes a filesystem of the given byte size should
/// carry. A named function rather than a bare constant so a future sizing
/// policy can replace it without touching callers.
pub fn calculate_inode_count(_size: u64) -> u32 {
    1000
}

/// In-memory superblock: the persistent fields plus bookkeeping that never
/// touches disk.
pub struct Superblock {
    pub raw: RawSuperblock,
    /// Set once any persistent field has changed since the last write-back.
    /// Reserved for future batching; every core routine writes back
    /// immediately today, so this only documents intent.
    pub modified: bool,
}

impl Superblock {
    /// Computes the geometry for a fresh image of `size` bytes and returns
    /// the initial in-memory superblock, with both free-list windows seeded
    /// exactly as `mkfs` requires (see [`crate::format`] for the on-disk
    /// free-list chain this window implies).
    pub fn init(size: u64, inode_count: u32) -> Result<Self> {
        let sb_size = size_of::<RawSuperblock>() as u64;
        let inode_zone_base = sb_size;
        let inode_table_bytes = inode_count as u64 * size_of::<RawInode>() as u64;
        let block_zone_base = inode_zone_base + inode_table_bytes;

        let remaining = size
            .checked_sub(sb_size)
            .and_then(|r| r.checked_sub(inode_table_bytes))
            .ok_or(GnordoError::InvalidArgument)?;
        let mut block_count = remaining / crate::layout::BLOCK_SIZE as u64;
        block_count -= block_count % FREE_BLOCK_LIST_SIZE as u64;
        if block_count < FREE_BLOCK_LIST_SIZE as u64 {
            return Err(GnordoError::InvalidArgument);
        }

        let mut free_block_list = [0i64; FREE_BLOCK_LIST_SIZE];
        for i in 1..=FREE_BLOCK_LIST_SIZE {
            free_block_list[FREE_BLOCK_LIST_SIZE - i] = (i - 1) as i64;
        }
        let mut free_inode_list = [0u32; FREE_INODE_LIST_SIZE];
        for i in 1..=FREE_INODE_LIST_SIZE {
            free_inode_list[FREE_INODE_LIST_SIZE - i] = (i - 1) as u32;
        }

        let raw = RawSuperblock {
            magic1: MAGIC,
            block_count,
            free_blocks: block_count,
            free_block_list,
            free_block_index: (FREE_BLOCK_LIST_SIZE - 1) as u16,
            inode_count,
            free_inodes: inode_count,
            free_inode_list,
            free_inode_index: FREE_INODE_LIST_SIZE as u16,
            first_inode: 0,
            inode_zone_base,
            block_zone_base,
            magic2: MAGIC,
        };

        Ok(Self {
            raw,
            modified: false,
        })
    }

    /// Reads the superblock from offset 0 of the image, failing if either
    /// magic bracket doesn't match.
    pub fn read(file: &File) -> Result<Self> {
        let mut buf = vec![0u8; size_of::<RawSuperblock>()];
        pread_exact(file, 0, &mut buf)?;
        let raw = RawSuperblock::from_bytes(&buf);
        if raw.magic1 != MAGIC || raw.magic2 != MAGIC {
            return Err(GnordoError::Corrupt("superblock magic mismatch"));
        }
        Ok(Self {
            raw,
            modified: false,
        })
    }

    /// Writes the persistent fields back to offset 0 of the image.
    pub fn write(&mut self, file: &File) -> Result<()> {
        pwrite_exact(file, 0, self.raw.as_bytes())?;
        self.modified = false;
        Ok(())
    }

    pub fn inode_offset(&self, n: InodeNumber) -> u64 {
        self.raw.inode_zone_base + n as u64 * size_of::<RawInode>() as u64
    }

    pub fn block_offset(&self, n: crate::layout::BlockNumber) -> u64 {
        self.raw.block_zone_base + n as u64 * crate::layout::BLOCK_SIZE as u64
    }
}

/// Root directory's well-known file kind, set by `mkfs`.
pub const ROOT_KIND: FileKind = FileKind::Dir;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_computes_expected_geometry() {
        let sb = Superblock::init(10 * 1024 * 1024, 1000).unwrap();
        let (
            magic1,
            magic2,
            inode_count,
            block_count,
            free_blocks,
            free_inodes,
            inode_zone_base,
            block_zone_base,
        ) = (
            sb.raw.magic1,
            sb.raw.magic2,
            sb.raw.inode_count,
            sb.raw.block_count,
            sb.raw.free_blocks,
            sb.raw.free_inodes,
            sb.raw.inode_zone_base,
            sb.raw.block_zone_base,
        );
        assert_eq!(magic1, MAGIC);
        assert_eq!(magic2, MAGIC);
        assert_eq!(inode_count, 1000);
        assert_eq!(block_count % FREE_BLOCK_LIST_SIZE as u64, 0);
        assert_eq!(free_blocks, block_count);
        assert_eq!(free_inodes, 1000);
        assert_eq!(inode_zone_base, size_of::<RawSuperblock>() as u64);
        let expected_block_zone = inode_zone_base + 1000 * size_of::<RawInode>() as u64;
        assert_eq!(block_zone_base, expected_block_zone);
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        file.set_len(10 * 1024 * 1024).unwrap();
        let mut sb = Superblock::init(10 * 1024 * 1024, 1000).unwrap();
        sb.write(&file).unwrap();
        let sb2 = Superblock::read(&file).unwrap();
        let (block_count2, block_count) = (sb2.raw.block_count, sb.raw.block_count);
        assert_eq!(block_count2, block_count);
        let (inode_count2, inode_count) = (sb2.raw.inode_count, sb.raw.inode_count);
        assert_eq!(inode_count2, inode_count);
        assert_eq!({ sb2.raw.magic1 }, MAGIC);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        file.set_len(4096).unwrap();
        assert!(matches!(
            Superblock::read(&file),
            Err(GnordoError::Corrupt(_))
        ));
    }
}
