//! Fixed-size directory entries: add, remove, and look up by name or index.
//!
//! Grounded on the teacher's `disk_layout::DirectoryBlockEntry`/`DirectoryBlock`
//! and `ffs/fs_objects.rs::Directory`, adapted to the specification's flat,
//! unindexed entry stream (no directory block header, entries packed back to
//! back across as many data blocks as the directory's size requires) and its
//! tombstone-delete convention.

use crate::error::{GnordoError, Result};
use crate::inode::Inode;
use crate::io::{do_read, do_write};
use crate::layout::{InodeNumber, RawDirEntry, RawRepr, DIR_ENTRY_FREE, DIR_ENTRY_NAME_SIZE, DIR_ENTRY_SIZE};
use crate::superblock::Superblock;
use std::fs::File;

/// A directory entry as read back from disk, with its byte offset within the
/// directory's data so callers can delete it in place.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub offset: u64,
    pub inode: InodeNumber,
    pub name: String,
}

fn encode_name(name: &str) -> Result<[u8; DIR_ENTRY_NAME_SIZE]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= DIR_ENTRY_NAME_SIZE {
        return Err(GnordoError::NameTooLong);
    }
    let mut out = [0u8; DIR_ENTRY_NAME_SIZE];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

fn decode_name(raw: &[u8; DIR_ENTRY_NAME_SIZE]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Iterates every entry slot within a directory's current size, live or
/// tombstoned.
fn for_each_slot<F>(file: &File, sb: &Superblock, dir: &Inode, mut f: F) -> Result<()>
where
    F: FnMut(u64, RawDirEntry) -> Result<bool>,
{
    let mut offset = 0u64;
    let mut buf = [0u8; DIR_ENTRY_SIZE];
    while offset < dir.raw.size {
        let n = do_read(file, sb, dir, offset, &mut buf)?;
        if n < DIR_ENTRY_SIZE {
            break;
        }
        let entry = RawDirEntry::from_bytes(&buf);
        if !f(offset, entry)? {
            break;
        }
        offset += DIR_ENTRY_SIZE as u64;
    }
    Ok(())
}

/// Looks up `name` among `dir`'s live entries.
pub fn find_entry(file: &File, sb: &Superblock, dir: &Inode, name: &str) -> Result<Option<DirEntry>> {
    let mut found = None;
    for_each_slot(file, sb, dir, |offset, entry| {
        if entry.inode != DIR_ENTRY_FREE && decode_name(&entry.name) == name {
            found = Some(DirEntry {
                offset,
                inode: entry.inode as InodeNumber,
                name: name.to_string(),
            });
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

/// Lists every live entry in `dir`, in on-disk order.
pub fn list_entries(file: &File, sb: &Superblock, dir: &Inode) -> Result<Vec<DirEntry>> {
    let mut out = Vec::new();
    for_each_slot(file, sb, dir, |offset, entry| {
        if entry.inode != DIR_ENTRY_FREE {
            out.push(DirEntry {
                offset,
                inode: entry.inode as InodeNumber,
                name: decode_name(&entry.name),
            });
        }
        Ok(true)
    })?;
    Ok(out)
}

/// Adds `name -> child` to `dir`. Reuses a tombstoned slot when one exists
/// within the directory's current size; otherwise appends past the end.
/// `dir.raw.size` only grows when the write lands past its prior logical
/// end — reusing a tombstone never changes it.
pub fn add_entry(
    file: &File,
    sb: &mut Superblock,
    dir: &mut Inode,
    name: &str,
    child: InodeNumber,
) -> Result<()> {
    if find_entry(file, sb, dir, name)?.is_some() {
        return Err(GnordoError::AlreadyExists);
    }

    let encoded = RawDirEntry {
        inode: child as i32,
        name: encode_name(name)?,
    };

    let mut reuse_offset = None;
    for_each_slot(file, sb, dir, |offset, entry| {
        if entry.inode == DIR_ENTRY_FREE {
            reuse_offset = Some(offset);
            return Ok(false);
        }
        Ok(true)
    })?;

    let offset = reuse_offset.unwrap_or(dir.raw.size);
    do_write(file, sb, dir, offset, encoded.as_bytes())?;
    Ok(())
}

/// Removes `name` from `dir` by writing a tombstone over its slot. The
/// directory's logical size is never shrunk.
pub fn remove_entry(file: &File, sb: &mut Superblock, dir: &mut Inode, name: &str) -> Result<InodeNumber> {
    let entry = find_entry(file, sb, dir, name)?.ok_or(GnordoError::NotFound)?;
    let tombstone = RawDirEntry::default();
    do_write(file, sb, dir, entry.offset, tombstone.as_bytes())?;
    Ok(entry.inode)
}

/// True once a directory holds nothing but `.` and `..`.
pub fn is_empty(file: &File, sb: &Superblock, dir: &Inode) -> Result<bool> {
    let entries = list_entries(file, sb, dir)?;
    Ok(entries.iter().all(|e| e.name == "." || e.name == ".."))
}
