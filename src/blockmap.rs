//! Direct and single-indirect block pointer resolution.
//!
//! Grounded on the teacher's `ffs/inode.rs::Inode::get`/`grow`/`zeroify`
//! tiered-indexing shape, with the double-indirect tier dropped: the
//! specification caps an inode at [`N_DIRECT_BLOCKS`] direct pointers plus
//! one single-indirect block of pointers.

use crate::block::{allocblk, freeblk, getblk, writeblk};
use crate::error::{GnordoError, Result};
use crate::inode::Inode;
use crate::layout::{BlockNumber, BLK_UNASSIGNED, BLOCKS_PER_INODE, BLOCK_SIZE, N_DIRECT_BLOCKS};
use crate::superblock::Superblock;
use std::fs::File;
use std::mem::size_of;

/// Reads the single-indirect block's pointer table, or an all-unassigned
/// table if the inode has no single-indirect block yet.
fn read_indirect(file: &File, sb: &Superblock, inode: &Inode) -> Result<Vec<BlockNumber>> {
    if inode.raw.single_indirect_blocks == BLK_UNASSIGNED {
        return Ok(vec![BLK_UNASSIGNED; BLOCK_SIZE / size_of::<BlockNumber>()]);
    }
    let raw = getblk(file, sb, inode.raw.single_indirect_blocks)?;
    let mut table = Vec::with_capacity(raw.len() / size_of::<BlockNumber>());
    for chunk in raw.chunks_exact(size_of::<BlockNumber>()) {
        table.push(BlockNumber::from_ne_bytes(chunk.try_into().unwrap()));
    }
    Ok(table)
}

fn write_indirect(file: &File, sb: &Superblock, block: BlockNumber, table: &[BlockNumber]) -> Result<()> {
    let mut buf = Vec::with_capacity(BLOCK_SIZE);
    for v in table {
        buf.extend_from_slice(&v.to_ne_bytes());
    }
    buf.resize(BLOCK_SIZE, 0);
    writeblk(file, sb, block, &buf)
}

/// Resolves logical block `index` of `inode` to a physical block number.
/// Returns [`BLK_UNASSIGNED`] for a hole (no allocation performed).
pub fn inode_getblk(file: &File, sb: &Superblock, inode: &Inode, index: usize) -> Result<BlockNumber> {
    if index >= BLOCKS_PER_INODE {
        return Err(GnordoError::InvalidArgument);
    }
    if index < N_DIRECT_BLOCKS {
        return Ok(inode.raw.direct_blocks[index]);
    }
    let table = read_indirect(file, sb, inode)?;
    Ok(table[index - N_DIRECT_BLOCKS])
}

/// Resolves logical block `index` of `inode`, allocating a physical block
/// (and the single-indirect block itself, if needed) when the slot is a
/// hole. Persists the inode's updated pointers via `iput` in [`crate::inode`];
/// the caller is responsible for that write-back.
pub fn inode_allocblk(
    file: &File,
    sb: &mut Superblock,
    inode: &mut Inode,
    index: usize,
) -> Result<BlockNumber> {
    if index >= BLOCKS_PER_INODE {
        return Err(GnordoError::InvalidArgument);
    }

    if index < N_DIRECT_BLOCKS {
        if inode.raw.direct_blocks[index] == BLK_UNASSIGNED {
            let b = allocblk(file, sb)?;
            inode.raw.direct_blocks[index] = b;
        }
        return Ok(inode.raw.direct_blocks[index]);
    }

    if inode.raw.single_indirect_blocks == BLK_UNASSIGNED {
        let b = allocblk(file, sb)?;
        inode.raw.single_indirect_blocks = b;
        let empty = vec![BLK_UNASSIGNED; BLOCK_SIZE / size_of::<BlockNumber>()];
        write_indirect(file, sb, b, &empty)?;
    }

    let mut table = read_indirect(file, sb, inode)?;
    let slot = index - N_DIRECT_BLOCKS;
    if table[slot] == BLK_UNASSIGNED {
        let b = allocblk(file, sb)?;
        table[slot] = b;
        write_indirect(file, sb, inode.raw.single_indirect_blocks, &table)?;
    }
    Ok(table[slot])
}

/// Frees every block beyond `new_block_count` logical blocks, including the
/// single-indirect block itself once it holds no live pointers.
pub fn inode_truncate(
    file: &File,
    sb: &mut Superblock,
    inode: &mut Inode,
    new_block_count: usize,
) -> Result<()> {
    for i in (new_block_count..N_DIRECT_BLOCKS).rev() {
        let b = inode.raw.direct_blocks[i];
        if b != BLK_UNASSIGNED {
            freeblk(file, sb, b)?;
            inode.raw.direct_blocks[i] = BLK_UNASSIGNED;
        }
    }

    if inode.raw.single_indirect_blocks == BLK_UNASSIGNED {
        return Ok(());
    }

    let mut table = read_indirect(file, sb, inode)?;
    let indirect_start = new_block_count.max(N_DIRECT_BLOCKS) - N_DIRECT_BLOCKS;
    let mut any_left = false;
    for i in 0..table.len() {
        if i >= indirect_start {
            if table[i] != BLK_UNASSIGNED {
                freeblk(file, sb, table[i])?;
                table[i] = BLK_UNASSIGNED;
            }
        } else if table[i] != BLK_UNASSIGNED {
            any_left = true;
        }
    }

    if any_left {
        write_indirect(file, sb, inode.raw.single_indirect_blocks, &table)?;
    } else {
        freeblk(file, sb, inode.raw.single_indirect_blocks)?;
        inode.raw.single_indirect_blocks = BLK_UNASSIGNED;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;
    use crate::inode::{ialloc, iput, new_inode_record};
    use crate::layout::FileKind;

    fn scratch(size: u64) -> (tempfile::NamedTempFile, File, Superblock) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        file.set_len(size).unwrap();
        format_image(&file, size, 1000).unwrap();
        let sb = Superblock::read(&file).unwrap();
        (tmp, file, sb)
    }

    #[test]
    fn direct_and_indirect_blocks_round_trip() {
        let (_tmp, file, mut sb) = scratch(8 * 1024 * 1024);
        let n = ialloc(&file, &mut sb).unwrap();
        let mut inode = Inode {
            number: n,
            raw: new_inode_record(FileKind::File, 0o644, 0, 0, 1000),
        };
        let direct = inode_allocblk(&file, &mut sb, &mut inode, 0).unwrap();
        assert_ne!(direct, BLK_UNASSIGNED);
        let indirect = inode_allocblk(&file, &mut sb, &mut inode, N_DIRECT_BLOCKS).unwrap();
        assert_ne!(indirect, BLK_UNASSIGNED);
        let single_indirect_blocks = inode.raw.single_indirect_blocks;
        assert_ne!(single_indirect_blocks, BLK_UNASSIGNED);
        iput(&file, &sb, &inode).unwrap();

        let again = inode_getblk(&file, &sb, &inode, N_DIRECT_BLOCKS).unwrap();
        assert_eq!(again, indirect);
    }

    #[test]
    fn truncate_frees_direct_and_indirect() {
        let (_tmp, file, mut sb) = scratch(8 * 1024 * 1024);
        let n = ialloc(&file, &mut sb).unwrap();
        let mut inode = Inode {
            number: n,
            raw: new_inode_record(FileKind::File, 0o644, 0, 0, 1000),
        };
        inode_allocblk(&file, &mut sb, &mut inode, 0).unwrap();
        inode_allocblk(&file, &mut sb, &mut inode, N_DIRECT_BLOCKS).unwrap();
        let before_free = sb.raw.free_blocks;
        inode_truncate(&file, &mut sb, &mut inode, 0).unwrap();
        let direct_block0 = inode.raw.direct_blocks[0];
        assert_eq!(direct_block0, BLK_UNASSIGNED);
        let single_indirect_blocks = inode.raw.single_indirect_blocks;
        assert_eq!(single_indirect_blocks, BLK_UNASSIGNED);
        let free_blocks = sb.raw.free_blocks;
        assert_eq!(free_blocks, before_free + 2);
    }
}
