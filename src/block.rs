//! The chained free-block list allocator.
//!
//! Grounded on `original_source/block.c`'s `allocblk`/`freeblk`, restructured
//! in the teacher's allocator-as-inner-struct style (`FastFileSystemInner::allocate_block`
//! in `ffs/mod.rs`), but implementing the Unix V7 chained free-list the
//! specification calls for instead of the teacher's bitmap.
//!
//! The superblock caches a window of up to [`FREE_BLOCK_LIST_SIZE`] free
//! block numbers. Slot 0 of a full window doubles as the block number where
//! the *next* window lives on disk: when the window empties out, refilling
//! means reading that block's raw content back as the new window. Freeing a
//! block when the window is already full spills the current window onto the
//! freed block and starts a new one-entry window there. See
//! `DESIGN.md`'s Open Question 1 for why freeing must spill the *current*
//! window rather than a stale one.

use crate::error::{GnordoError, Result};
use crate::image::{pread_exact, pwrite_exact};
use crate::layout::{BlockNumber, BLOCK_SIZE, FREE_BLOCK_LIST_SIZE};
use crate::superblock::Superblock;
use std::fs::File;
use std::mem::size_of;

/// Reads one whole block's raw bytes.
pub fn getblk(file: &File, sb: &Superblock, n: BlockNumber) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    pread_exact(file, sb.block_offset(n), &mut buf)?;
    Ok(buf)
}

/// Writes one whole block's raw bytes.
pub fn writeblk(file: &File, sb: &Superblock, n: BlockNumber, data: &[u8]) -> Result<()> {
    assert_eq!(data.len(), BLOCK_SIZE, "writeblk requires a full block");
    pwrite_exact(file, sb.block_offset(n), data)
}

/// Reads the free-list window chained at block `n` (the first
/// `FREE_BLOCK_LIST_SIZE` `i64`s of its data).
fn read_window(file: &File, sb: &Superblock, n: BlockNumber) -> Result<[BlockNumber; FREE_BLOCK_LIST_SIZE]> {
    let mut buf = vec![0u8; FREE_BLOCK_LIST_SIZE * size_of::<BlockNumber>()];
    pread_exact(file, sb.block_offset(n), &mut buf)?;
    let mut window = [0i64; FREE_BLOCK_LIST_SIZE];
    for (i, chunk) in buf.chunks_exact(size_of::<BlockNumber>()).enumerate() {
        window[i] = BlockNumber::from_ne_bytes(chunk.try_into().unwrap());
    }
    Ok(window)
}

/// Writes a free-list window to block `n`'s data area.
fn write_window(
    file: &File,
    sb: &Superblock,
    n: BlockNumber,
    window: &[BlockNumber; FREE_BLOCK_LIST_SIZE],
) -> Result<()> {
    let mut buf = Vec::with_capacity(FREE_BLOCK_LIST_SIZE * size_of::<BlockNumber>());
    for v in window {
        buf.extend_from_slice(&v.to_ne_bytes());
    }
    pwrite_exact(file, sb.block_offset(n), &buf)
}

/// Allocates and returns a free block number, updating and persisting the
/// superblock's free-list bookkeeping.
pub fn allocblk(file: &File, sb: &mut Superblock) -> Result<BlockNumber> {
    if sb.raw.free_blocks == 0 {
        return Err(GnordoError::OutOfSpace);
    }

    if sb.raw.free_block_index == 0 {
        // Slot 0 is both the block we hand back and the block whose own
        // contents become the next window.
        let b = sb.raw.free_block_list[0];
        sb.raw.free_block_list = read_window(file, sb, b)?;
        sb.raw.free_block_index = (FREE_BLOCK_LIST_SIZE - 1) as u16;
        sb.raw.free_blocks -= 1;
        sb.write(file)?;
        return Ok(b);
    }

    let idx = sb.raw.free_block_index as usize;
    let b = sb.raw.free_block_list[idx];
    sb.raw.free_block_index -= 1;
    sb.raw.free_blocks -= 1;
    sb.write(file)?;
    Ok(b)
}

/// Returns block `b` to the free list, persisting the updated superblock.
pub fn freeblk(file: &File, sb: &mut Superblock, b: BlockNumber) -> Result<()> {
    if sb.raw.free_block_index as usize == FREE_BLOCK_LIST_SIZE - 1 {
        let free_block_list = sb.raw.free_block_list;
        write_window(file, sb, b, &free_block_list)?;
        sb.raw.free_block_list = [BlockNumber::default(); FREE_BLOCK_LIST_SIZE];
        sb.raw.free_block_list[0] = b;
        sb.raw.free_block_index = 0;
    } else {
        sb.raw.free_block_index += 1;
        sb.raw.free_block_list[sb.raw.free_block_index as usize] = b;
    }
    sb.raw.free_blocks += 1;
    sb.write(file)
}
