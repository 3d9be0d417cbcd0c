//! The FUSE front end: adapts [`gnordofs::fs::Filesystem`] to `fuser::Filesystem`.
//!
//! Grounded on the `fuser` + `clap` + `env_logger` + `anyhow` shape found in
//! the `other_examples/manifests/{KINGFIOX-hitsz-ext2-fuse,realchonk-fuse-ufs}`
//! reference repos — the teacher has no userspace FUSE code of its own.
//! Engine inode numbers are offset by one from FUSE inode numbers, since FUSE
//! reserves inode `1` for the mount root while the engine's root inode is
//! number `0`.

use clap::Parser;
use fuser::{
    FileAttr, FileType, Filesystem as FuseFilesystem, MountOption, ReplyAttr, ReplyCreate,
    ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use gnordofs::fs::{Attr, Filesystem};
use gnordofs::layout::{FileKind, InodeNumber};
use gnordofs::perms::AccessMask;
use log::{error, warn};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TTL: Duration = Duration::from_secs(1);

/// Mount a GnordoFS image as a FUSE filesystem.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to a GnordoFS image created with mkfs-gnordofs.
    image: PathBuf,
    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,
    /// Mount read-only.
    #[arg(long)]
    readonly: bool,
}

fn fuse_to_engine(ino: u64) -> InodeNumber {
    (ino - 1) as InodeNumber
}

fn engine_to_fuse(n: InodeNumber) -> u64 {
    n as u64 + 1
}

fn file_kind_to_fuse(kind: FileKind) -> FileType {
    match kind {
        FileKind::Dir => FileType::Directory,
        FileKind::File | FileKind::Free => FileType::RegularFile,
    }
}

fn attr_to_fuse(attr: &Attr) -> FileAttr {
    let secs_to_time = |s: i64| UNIX_EPOCH + Duration::from_secs(s.max(0) as u64);
    FileAttr {
        ino: engine_to_fuse(attr.number),
        size: attr.size,
        blocks: (attr.size + 4095) / 4096,
        atime: secs_to_time(attr.atime),
        mtime: secs_to_time(attr.mtime),
        ctime: secs_to_time(attr.ctime),
        crtime: secs_to_time(attr.ctime),
        kind: file_kind_to_fuse(attr.kind),
        perm: attr.perms as u16,
        nlink: attr.link_counter,
        uid: attr.owner,
        gid: attr.group,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

struct GnordoFuse {
    fs: Filesystem,
}

fn time_or_now(value: Option<TimeOrNow>) -> Option<i64> {
    value.map(|t| match t {
        TimeOrNow::SpecificTime(t) => t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        TimeOrNow::Now => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    })
}

impl FuseFilesystem for GnordoFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        match self.fs.lookup(fuse_to_engine(parent), name) {
            Ok(attr) => reply.entry(&TTL, &attr_to_fuse(&attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        match self.fs.getattr(fuse_to_engine(ino)) {
            Ok(attr) => reply.attr(&TTL, &attr_to_fuse(&attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn setattr(
        &mut self,
        req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let n = fuse_to_engine(ino);
        let result = (|| -> gnordofs::Result<Attr> {
            if let Some(perms) = mode {
                self.fs.chmod(n, perms, req.uid(), req.gid())?;
            }
            if uid.is_some() || gid.is_some() {
                self.fs.chown(n, uid, gid)?;
            }
            if let Some(size) = size {
                self.fs.truncate(n, size)?;
            }
            let a = time_or_now(atime);
            let m = time_or_now(mtime);
            if a.is_some() || m.is_some() {
                self.fs.utimens(n, a, m)?;
            }
            self.fs.getattr(n)
        })();
        match result {
            Ok(attr) => reply.attr(&TTL, &attr_to_fuse(&attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let entries = match self.fs.readdir(fuse_to_engine(ino)) {
            Ok(e) => e,
            Err(e) => return reply.error(e.to_errno()),
        };
        for (i, (name, number, kind)) in entries.into_iter().enumerate().skip(offset as usize) {
            let full = reply.add(
                engine_to_fuse(number),
                (i + 1) as i64,
                file_kind_to_fuse(kind),
                name,
            );
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut buf = vec![0u8; size as usize];
        match self.fs.read(fuse_to_engine(ino), offset as u64, &mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.fs.write(fuse_to_engine(ino), offset as u64, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        match self
            .fs
            .mkdir(fuse_to_engine(parent), name, mode & 0o7777, req.uid(), req.gid())
        {
            Ok(attr) => reply.entry(&TTL, &attr_to_fuse(&attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        match self
            .fs
            .mknod(fuse_to_engine(parent), name, mode & 0o7777, req.uid(), req.gid())
        {
            Ok(attr) => reply.entry(&TTL, &attr_to_fuse(&attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        match self
            .fs
            .mknod(fuse_to_engine(parent), name, mode & 0o7777, req.uid(), req.gid())
        {
            Ok(attr) => reply.created(&TTL, &attr_to_fuse(&attr), 0, 0, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        match self
            .fs
            .unlink(fuse_to_engine(parent), name, req.uid(), req.gid())
        {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match name.to_str() {
            Some(n) => n,
            None => return reply.error(libc::EINVAL),
        };
        match self
            .fs
            .rmdir(fuse_to_engine(parent), name, req.uid(), req.gid())
        {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn access(&mut self, req: &Request, ino: u64, mask: i32, reply: ReplyEmpty) {
        let mut wanted = AccessMask::empty();
        if mask & libc::R_OK != 0 {
            wanted |= AccessMask::R_OK;
        }
        if mask & libc::W_OK != 0 {
            wanted |= AccessMask::W_OK;
        }
        if mask & libc::X_OK != 0 {
            wanted |= AccessMask::X_OK;
        }
        match self
            .fs
            .access(fuse_to_engine(ino), req.uid(), req.gid(), wanted)
        {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let fs = Filesystem::open(&cli.image)
        .map_err(|e| anyhow::anyhow!("failed to open image {}: {e}", cli.image.display()))?;

    let mut options = vec![MountOption::FSName("gnordofs".to_string())];
    if cli.readonly {
        options.push(MountOption::RO);
    }

    if !cli.mountpoint.is_dir() {
        error!("mountpoint {} is not a directory", cli.mountpoint.display());
        anyhow::bail!("mountpoint {} is not a directory", cli.mountpoint.display());
    }

    fuser::mount2(GnordoFuse { fs }, &cli.mountpoint, &options)?;
    warn!("unmounted {}", cli.mountpoint.display());
    Ok(())
}
