//! `mkfs`: bootstrapping a fresh image.
//!
//! Grounded on `original_source/mkfs.gnordofs.c`: zero the inode table,
//! chain the block zone into the free-block list's on-disk windows, write
//! the superblock, then `ialloc` the root directory and give it `.`/`..`
//! entries pointing at itself.
//!
//! Known limitation carried over from the original tool: the free-block
//! chain's very last window has no further block to link to, so an `ialloc`-
//! style refill is never issued against it in practice — a volume would need
//! to allocate essentially every block before that edge is reached.

use crate::dir::add_entry;
use crate::error::Result;
use crate::image::pwrite_exact;
use crate::inode::{iput, new_inode_record, Inode};
use crate::layout::{FileKind, RawInode, RawRepr, FREE_BLOCK_LIST_SIZE, PERMS_DIR_BIT};
use crate::superblock::{calculate_inode_count, Superblock};
use std::fs::File;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Writes the on-disk free-block chain: starting at the block named by the
/// superblock's initial window (`free_block_list[0]`), write a full window
/// of the next `FREE_BLOCK_LIST_SIZE` block numbers into that block's data,
/// then repeat from the new window's own slot 0, until the block zone is
/// exhausted.
fn seed_free_block_chain(file: &File, sb: &Superblock) -> Result<()> {
    let block_count = sb.raw.block_count as i64;
    let mut link = sb.raw.free_block_list[0];
    while link + FREE_BLOCK_LIST_SIZE as i64 <= block_count {
        let mut window = [0i64; FREE_BLOCK_LIST_SIZE];
        let mut acc = link;
        for i in 1..=FREE_BLOCK_LIST_SIZE {
            acc += 1;
            window[FREE_BLOCK_LIST_SIZE - i] = acc;
        }
        let mut buf = Vec::with_capacity(FREE_BLOCK_LIST_SIZE * std::mem::size_of::<i64>());
        for v in &window {
            buf.extend_from_slice(&v.to_ne_bytes());
        }
        pwrite_exact(file, sb.block_offset(link), &buf)?;
        link = window[0];
    }
    Ok(())
}

/// Formats `file` (already sized to `size` bytes) as a fresh GnordoFS image
/// with `inode_count` inodes, and creates its root directory.
pub fn format_image(file: &File, size: u64, inode_count: u32) -> Result<()> {
    let mut sb = Superblock::init(size, inode_count)?;

    let empty_inode = RawInode::default();
    for n in 0..inode_count {
        pwrite_exact(file, sb.inode_offset(n), empty_inode.as_bytes())?;
    }

    seed_free_block_chain(file, &sb)?;
    sb.write(file)?;

    let root_n = crate::inode::ialloc(file, &mut sb)?;
    let now = now_unix();
    let mut root = Inode {
        number: root_n,
        raw: new_inode_record(FileKind::Dir, 0o755 | PERMS_DIR_BIT, 0, 0, now),
    };
    add_entry(file, &mut sb, &mut root, ".", root_n)?;
    add_entry(file, &mut sb, &mut root, "..", root_n)?;
    root.raw.link_counter = 2;
    iput(file, &sb, &root)?;

    sb.raw.first_inode = root_n;
    sb.write(file)
}

/// Formats a brand-new image at `path`, sized to `size` bytes, with a
/// default inode count sized for that many bytes.
pub fn format_new_image(path: &std::path::Path, size: u64) -> Result<()> {
    let file = File::create(path)?;
    file.set_len(size)?;
    let inode_count = calculate_inode_count(size);
    format_image(&file, size, inode_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namei::root;

    #[test]
    fn formats_root_directory_with_dot_entries() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        file.set_len(4 * 1024 * 1024).unwrap();
        format_image(&file, 4 * 1024 * 1024, 1000).unwrap();

        let sb = Superblock::read(&file).unwrap();
        let root_inode = root(&file, &sb).unwrap();
        assert!(root_inode.is_dir());
        let first_inode = sb.raw.first_inode;
        assert_eq!(root_inode.number, first_inode);

        let entries = crate::dir::list_entries(&file, &sb, &root_inode).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"."));
        assert!(names.contains(&".."));
    }
}
