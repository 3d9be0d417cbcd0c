//! The filesystem facade: the surface the FUSE front end in `src/bin/gnordofs.rs`
//! drives.
//!
//! Grounded on the teacher's `FastFileSystemInner`/`FastFileSystem` split
//! (`ffs/mod.rs`) — a single struct owning the open image and cached
//! superblock, with one method per filesystem operation — but collapsed to a
//! single owner with no `Arc`/lock, matching the specification's
//! single-mounter, single-threaded concurrency model.

use crate::blockmap::inode_truncate;
use crate::dir::{add_entry, find_entry, list_entries, remove_entry};
use crate::error::{GnordoError, Result};
use crate::inode::{ialloc, ifree, iget, iput, new_inode_record, Inode};
use crate::io::{do_read, do_write};
use crate::layout::{FileKind, InodeNumber, BLOCK_SIZE, PERMS_DIR_BIT};
use crate::namei;
use crate::perms::{access_check, AccessMask};
use crate::superblock::Superblock;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stable snapshot of an inode's metadata, independent of `RawInode`'s
/// packed, possibly-unaligned layout.
#[derive(Clone, Debug)]
pub struct Attr {
    pub number: InodeNumber,
    pub kind: FileKind,
    pub size: u64,
    pub perms: u32,
    pub owner: u32,
    pub group: u32,
    pub link_counter: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

fn attr_of(inode: &Inode) -> Result<Attr> {
    Ok(Attr {
        number: inode.number,
        kind: inode.kind()?,
        size: inode.raw.size,
        perms: inode.raw.perms,
        owner: inode.raw.owner,
        group: inode.raw.group,
        link_counter: inode.raw.link_counter,
        atime: inode.raw.atime,
        mtime: inode.raw.mtime,
        ctime: inode.raw.ctime,
    })
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn block_count_for(size: u64) -> usize {
    ((size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as usize
}

/// An open GnordoFS image. Not `Sync`: the specification allows exactly one
/// mounter at a time and the engine keeps no internal locking.
pub struct Filesystem {
    file: File,
    sb: Superblock,
}

impl Filesystem {
    /// Opens an already-formatted image for mounting.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let sb = Superblock::read(&file)?;
        let (inode_count, block_count, free_blocks) =
            (sb.raw.inode_count, sb.raw.block_count, sb.raw.free_blocks);
        info!(
            "mounted image with {} inodes, {} blocks ({} free)",
            inode_count, block_count, free_blocks
        );
        Ok(Self { file, sb })
    }

    pub fn root_inode_number(&self) -> InodeNumber {
        self.sb.raw.first_inode
    }

    fn load(&self, n: InodeNumber) -> Result<Inode> {
        iget(&self.file, &self.sb, n)
    }

    fn save(&self, inode: &Inode) -> Result<()> {
        iput(&self.file, &self.sb, inode)
    }

    pub fn getattr(&self, n: InodeNumber) -> Result<Attr> {
        attr_of(&self.load(n)?)
    }

    pub fn lookup(&self, parent: InodeNumber, name: &str) -> Result<Attr> {
        let dir = self.load(parent)?;
        if !dir.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        let entry = find_entry(&self.file, &self.sb, &dir, name)?.ok_or(GnordoError::NotFound)?;
        attr_of(&self.load(entry.inode)?)
    }

    pub fn readdir(&self, n: InodeNumber) -> Result<Vec<(String, InodeNumber, FileKind)>> {
        let dir = self.load(n)?;
        if !dir.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        let entries = list_entries(&self.file, &self.sb, &dir)?;
        entries
            .into_iter()
            .map(|e| {
                let kind = self.load(e.inode)?.kind()?;
                Ok((e.name, e.inode, kind))
            })
            .collect()
    }

    pub fn resolve(&self, path: &str) -> Result<Attr> {
        attr_of(&namei::resolve(&self.file, &self.sb, path)?)
    }

    pub fn access(&self, n: InodeNumber, uid: u32, gid: u32, mask: AccessMask) -> Result<()> {
        access_check(&self.load(n)?, uid, gid, mask)
    }

    pub fn read(&self, n: InodeNumber, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let inode = self.load(n)?;
        if inode.is_dir() {
            return Err(GnordoError::IsADirectory);
        }
        do_read(&self.file, &self.sb, &inode, offset, buf)
    }

    pub fn write(&mut self, n: InodeNumber, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut inode = self.load(n)?;
        if inode.is_dir() {
            return Err(GnordoError::IsADirectory);
        }
        let written = do_write(&self.file, &mut self.sb, &mut inode, offset, buf)?;
        inode.raw.mtime = now_unix();
        self.save(&inode)?;
        Ok(written)
    }

    pub fn truncate(&mut self, n: InodeNumber, new_size: u64) -> Result<()> {
        let mut inode = self.load(n)?;
        if inode.is_dir() {
            return Err(GnordoError::IsADirectory);
        }
        inode_truncate(&self.file, &mut self.sb, &mut inode, block_count_for(new_size))?;
        inode.raw.size = new_size;
        inode.raw.mtime = now_unix();
        self.save(&inode)
    }

    pub fn mknod(&mut self, parent: InodeNumber, name: &str, perms: u32, uid: u32, gid: u32) -> Result<Attr> {
        let mut parent_inode = self.load(parent)?;
        if !parent_inode.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        access_check(&parent_inode, uid, gid, AccessMask::W_OK | AccessMask::X_OK)?;
        if find_entry(&self.file, &self.sb, &parent_inode, name)?.is_some() {
            return Err(GnordoError::AlreadyExists);
        }

        let n = ialloc(&self.file, &mut self.sb)?;
        let inode = Inode {
            number: n,
            raw: new_inode_record(FileKind::File, perms, uid, gid, now_unix()),
        };
        self.save(&inode)?;

        if let Err(e) = add_entry(&self.file, &mut self.sb, &mut parent_inode, name, n) {
            ifree(&self.file, &mut self.sb, n).ok();
            return Err(e);
        }
        parent_inode.raw.mtime = now_unix();
        self.save(&parent_inode)?;
        debug!("mknod {name} -> inode {n}");
        attr_of(&inode)
    }

    pub fn mkdir(&mut self, parent: InodeNumber, name: &str, perms: u32, uid: u32, gid: u32) -> Result<Attr> {
        let mut parent_inode = self.load(parent)?;
        if !parent_inode.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        access_check(&parent_inode, uid, gid, AccessMask::W_OK | AccessMask::X_OK)?;
        if find_entry(&self.file, &self.sb, &parent_inode, name)?.is_some() {
            return Err(GnordoError::AlreadyExists);
        }

        let n = ialloc(&self.file, &mut self.sb)?;
        let mut new_dir = Inode {
            number: n,
            raw: new_inode_record(FileKind::Dir, perms | PERMS_DIR_BIT, uid, gid, now_unix()),
        };
        if let Err(e) = (|| -> Result<()> {
            add_entry(&self.file, &mut self.sb, &mut new_dir, ".", n)?;
            add_entry(&self.file, &mut self.sb, &mut new_dir, "..", parent)?;
            Ok(())
        })() {
            ifree(&self.file, &mut self.sb, n).ok();
            return Err(e);
        }
        new_dir.raw.link_counter = 2;
        self.save(&new_dir)?;

        add_entry(&self.file, &mut self.sb, &mut parent_inode, name, n)?;
        parent_inode.raw.link_counter += 1;
        parent_inode.raw.mtime = now_unix();
        self.save(&parent_inode)?;
        attr_of(&new_dir)
    }

    pub fn unlink(&mut self, parent: InodeNumber, name: &str, uid: u32, gid: u32) -> Result<()> {
        let mut parent_inode = self.load(parent)?;
        if !parent_inode.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        access_check(&parent_inode, uid, gid, AccessMask::W_OK | AccessMask::X_OK)?;

        let entry = find_entry(&self.file, &self.sb, &parent_inode, name)?.ok_or(GnordoError::NotFound)?;
        let mut target = self.load(entry.inode)?;
        if target.is_dir() {
            return Err(GnordoError::IsADirectory);
        }

        remove_entry(&self.file, &mut self.sb, &mut parent_inode, name)?;
        parent_inode.raw.mtime = now_unix();
        self.save(&parent_inode)?;

        target.raw.link_counter = target.raw.link_counter.saturating_sub(1);
        if target.raw.link_counter == 0 {
            inode_truncate(&self.file, &mut self.sb, &mut target, 0)?;
            ifree(&self.file, &mut self.sb, target.number)?;
        } else {
            self.save(&target)?;
        }
        Ok(())
    }

    pub fn rmdir(&mut self, parent: InodeNumber, name: &str, uid: u32, gid: u32) -> Result<()> {
        let mut parent_inode = self.load(parent)?;
        if !parent_inode.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        access_check(&parent_inode, uid, gid, AccessMask::W_OK | AccessMask::X_OK)?;

        let entry = find_entry(&self.file, &self.sb, &parent_inode, name)?.ok_or(GnordoError::NotFound)?;
        let target = self.load(entry.inode)?;
        if !target.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        if !crate::dir::is_empty(&self.file, &self.sb, &target)? {
            return Err(GnordoError::NotEmpty);
        }

        remove_entry(&self.file, &mut self.sb, &mut parent_inode, name)?;
        parent_inode.raw.link_counter = parent_inode.raw.link_counter.saturating_sub(1);
        parent_inode.raw.mtime = now_unix();
        self.save(&parent_inode)?;

        let mut target = target;
        inode_truncate(&self.file, &mut self.sb, &mut target, 0)?;
        ifree(&self.file, &mut self.sb, target.number)?;
        Ok(())
    }

    pub fn chmod(&mut self, n: InodeNumber, perms: u32, uid: u32, gid: u32) -> Result<Attr> {
        let mut inode = self.load(n)?;
        access_check(&inode, uid, gid, AccessMask::W_OK)?;
        // Only the low mode bits change; any file-type bits already set in
        // perms (see PERMS_DIR_BIT) survive a chmod untouched.
        inode.raw.perms = (inode.raw.perms & !0o7777) | (perms & 0o7777);
        inode.raw.ctime = now_unix();
        self.save(&inode)?;
        attr_of(&inode)
    }

    pub fn chown(&mut self, n: InodeNumber, uid: Option<u32>, gid: Option<u32>) -> Result<Attr> {
        let mut inode = self.load(n)?;
        if let Some(uid) = uid {
            inode.raw.owner = uid;
        }
        if let Some(gid) = gid {
            inode.raw.group = gid;
        }
        inode.raw.ctime = now_unix();
        self.save(&inode)?;
        attr_of(&inode)
    }

    pub fn utimens(&mut self, n: InodeNumber, atime: Option<i64>, mtime: Option<i64>) -> Result<Attr> {
        let mut inode = self.load(n)?;
        if let Some(a) = atime {
            inode.raw.atime = a;
        }
        if let Some(m) = mtime {
            inode.raw.mtime = m;
        }
        self.save(&inode)?;
        attr_of(&inode)
    }

    /// Diagnostics mirroring `original_source/superblock.c`'s dump routines.
    pub fn statfs(&self) -> (u64, u64, u32, u32) {
        (
            self.sb.raw.block_count,
            self.sb.raw.free_blocks,
            self.sb.raw.inode_count,
            self.sb.raw.free_inodes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;

    fn mounted(size: u64) -> (tempfile::NamedTempFile, Filesystem) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let file = tmp.reopen().unwrap();
            file.set_len(size).unwrap();
            format_image(&file, size, 1000).unwrap();
        }
        let fs = Filesystem::open(tmp.path()).unwrap();
        (tmp, fs)
    }

    #[test]
    fn mkdir_then_lookup_then_rmdir() {
        let (_tmp, mut fs) = mounted(4 * 1024 * 1024);
        let root = fs.root_inode_number();
        let attr = fs.mkdir(root, "sub", 0o755, 0, 0).unwrap();
        assert!(matches!(attr.kind, FileKind::Dir));

        let looked_up = fs.lookup(root, "sub").unwrap();
        assert_eq!(looked_up.number, attr.number);

        fs.rmdir(root, "sub", 0, 0).unwrap();
        assert!(fs.lookup(root, "sub").is_err());
    }

    #[test]
    fn rmdir_refuses_non_empty_directory() {
        let (_tmp, mut fs) = mounted(4 * 1024 * 1024);
        let root = fs.root_inode_number();
        fs.mkdir(root, "sub", 0o755, 0, 0).unwrap();
        let sub = fs.lookup(root, "sub").unwrap().number;
        fs.mknod(sub, "f", 0o644, 0, 0).unwrap();
        assert!(matches!(
            fs.rmdir(root, "sub", 0, 0),
            Err(GnordoError::NotEmpty)
        ));
    }

    #[test]
    fn write_read_truncate_unlink_cycle() {
        let (_tmp, mut fs) = mounted(4 * 1024 * 1024);
        let root = fs.root_inode_number();
        let attr = fs.mknod(root, "f.txt", 0o644, 0, 0).unwrap();
        fs.write(attr.number, 0, b"hello world").unwrap();

        let mut buf = [0u8; 11];
        fs.read(attr.number, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello world");

        fs.truncate(attr.number, 5).unwrap();
        let got = fs.getattr(attr.number).unwrap();
        assert_eq!(got.size, 5);

        fs.unlink(root, "f.txt", 0, 0).unwrap();
        assert!(fs.lookup(root, "f.txt").is_err());
    }

    #[test]
    fn unlink_on_directory_is_rejected() {
        let (_tmp, mut fs) = mounted(4 * 1024 * 1024);
        let root = fs.root_inode_number();
        fs.mkdir(root, "sub", 0o755, 0, 0).unwrap();
        assert!(matches!(
            fs.unlink(root, "sub", 0, 0),
            Err(GnordoError::IsADirectory)
        ));
    }
}
