//! Byte-range read and write over a file's block map.
//!
//! Grounded on the teacher's `ffs/fs_objects.rs::RegularFile::read`/`write`:
//! walk logical blocks, clip the first and last partial block, and reuse a
//! single block-sized buffer across the call instead of re-reading a block
//! already pulled in on a previous iteration.

use crate::blockmap::{inode_allocblk, inode_getblk};
use crate::error::Result;
use crate::inode::Inode;
use crate::layout::{BLK_UNASSIGNED, BLOCK_SIZE};
use crate::superblock::Superblock;
use std::fs::File;

/// Reads up to `buf.len()` bytes starting at `offset`, clipped to the
/// inode's current size. Returns the number of bytes actually read, which is
/// `0` at or past end-of-file. A logical block that maps to a hole stops the
/// read short right there — holes are never zero-filled.
pub fn do_read(file: &File, sb: &Superblock, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize> {
    let size = inode.raw.size;
    if offset >= size {
        return Ok(0);
    }
    let want = buf.len().min((size - offset) as usize);
    let mut done = 0usize;
    let mut cached_block: Option<(usize, Vec<u8>)> = None;

    while done < want {
        let pos = offset + done as u64;
        let logical = (pos / BLOCK_SIZE as u64) as usize;
        let within = (pos % BLOCK_SIZE as u64) as usize;
        let chunk = (BLOCK_SIZE - within).min(want - done);

        let phys = inode_getblk(file, sb, inode, logical)?;
        if phys == BLK_UNASSIGNED {
            break;
        }
        let data = match &cached_block {
            Some((l, d)) if *l == logical => d,
            _ => {
                let d = crate::block::getblk(file, sb, phys)?;
                cached_block = Some((logical, d));
                &cached_block.as_ref().unwrap().1
            }
        };
        buf[done..done + chunk].copy_from_slice(&data[within..within + chunk]);
        done += chunk;
    }
    Ok(done)
}

/// Writes `buf` at `offset`, allocating blocks for holes and growing
/// `inode.raw.size` when the write extends past the current end of file.
/// Does not persist the inode; the caller writes it back once.
pub fn do_write(
    file: &File,
    sb: &mut Superblock,
    inode: &mut Inode,
    offset: u64,
    buf: &[u8],
) -> Result<usize> {
    let mut done = 0usize;

    while done < buf.len() {
        let pos = offset + done as u64;
        let logical = (pos / BLOCK_SIZE as u64) as usize;
        let within = (pos % BLOCK_SIZE as u64) as usize;
        let chunk = (BLOCK_SIZE - within).min(buf.len() - done);

        let phys = inode_allocblk(file, sb, inode, logical)?;

        // A full-block write never needs the old contents; a partial one
        // (first or last block of the range) does, for the bytes it isn't
        // overwriting.
        let mut data = if within == 0 && chunk == BLOCK_SIZE {
            vec![0u8; BLOCK_SIZE]
        } else {
            crate::block::getblk(file, sb, phys)?
        };

        data[within..within + chunk].copy_from_slice(&buf[done..done + chunk]);
        crate::block::writeblk(file, sb, phys, &data)?;
        done += chunk;

        let new_end = pos + chunk as u64;
        if new_end > inode.raw.size {
            inode.raw.size = new_end;
        }
    }
    Ok(done)
}

/// Validates and clamps a logical seek target. GnordoFS allows seeking past
/// end-of-file (a later write there creates a hole); seeking to a negative
/// offset is rejected at the FUSE boundary before reaching this layer.
pub fn do_lseek(current_size: u64, offset: i64, whence: Whence) -> Result<u64> {
    let base = match whence {
        Whence::Start => 0i64,
        Whence::Current(cur) => cur as i64,
        Whence::End => current_size as i64,
    };
    let target = base
        .checked_add(offset)
        .ok_or(crate::error::GnordoError::InvalidArgument)?;
    if target < 0 {
        return Err(crate::error::GnordoError::InvalidArgument);
    }
    Ok(target as u64)
}

/// Seek origin, mirroring POSIX `lseek`'s `whence` argument.
pub enum Whence {
    Start,
    Current(u64),
    End,
}
