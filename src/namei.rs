//! Absolute path resolution.
//!
//! Grounded on the teacher's `Directory::find`/`open_entry` walk pattern in
//! `ffs/fs_objects.rs`, generalized from a single path component to a full
//! `/a/b/c` walk starting at the superblock's root inode.

use crate::dir::find_entry;
use crate::error::{GnordoError, Result};
use crate::inode::{iget, Inode};
use crate::superblock::Superblock;
use std::fs::File;

/// Splits an absolute path into its non-empty components. `/`, `//a`, and
/// `/a/` all behave the way a shell would expect.
fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Resolves the inode at the root of the filesystem.
pub fn root(file: &File, sb: &Superblock) -> Result<Inode> {
    iget(file, sb, sb.raw.first_inode)
}

/// Resolves an absolute path to its inode.
pub fn resolve(file: &File, sb: &Superblock, path: &str) -> Result<Inode> {
    let mut current = root(file, sb)?;
    for name in components(path) {
        if !current.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        let entry = find_entry(file, sb, &current, name)?.ok_or(GnordoError::NotFound)?;
        current = iget(file, sb, entry.inode)?;
    }
    Ok(current)
}

/// Resolves the parent directory of `path` and returns it along with the
/// final path component. Fails if the parent doesn't exist or isn't a
/// directory; does not require the final component itself to exist.
pub fn resolve_parent<'a>(file: &File, sb: &Superblock, path: &'a str) -> Result<(Inode, &'a str)> {
    let parts = components(path);
    let (last, parent_parts) = parts.split_last().ok_or(GnordoError::InvalidArgument)?;
    let mut current = root(file, sb)?;
    for name in parent_parts {
        if !current.is_dir() {
            return Err(GnordoError::NotADirectory);
        }
        let entry = find_entry(file, sb, &current, name)?.ok_or(GnordoError::NotFound)?;
        current = iget(file, sb, entry.inode)?;
    }
    if !current.is_dir() {
        return Err(GnordoError::NotADirectory);
    }
    Ok((current, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::add_entry;
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
    fn resolves_nested_path() {
        let (_tmp, file, mut sb) = scratch(4 * 1024 * 1024);
        let mut root_inode = root(&file, &sb).unwrap();

        let sub_n = ialloc(&file, &mut sb).unwrap();
        let mut sub = Inode {
            number: sub_n,
            raw: new_inode_record(FileKind::Dir, 0o755, 0, 0, 1000),
        };
        add_entry(&file, &mut sb, &mut sub, ".", sub_n).unwrap();
        add_entry(&file, &mut sb, &mut sub, "..", root_inode.number).unwrap();
        iput(&file, &sb, &sub).unwrap();

        add_entry(&file, &mut sb, &mut root_inode, "sub", sub_n).unwrap();
        iput(&file, &sb, &root_inode).unwrap();

        let resolved = resolve(&file, &sb, "/sub").unwrap();
        assert_eq!(resolved.number, sub_n);

        let (parent, name) = resolve_parent(&file, &sb, "/sub/file.txt").unwrap();
        assert_eq!(parent.number, sub_n);
        assert_eq!(name, "file.txt");
    }

    #[test]
    fn missing_component_is_not_found() {
        let (_tmp, file, sb) = scratch(4 * 1024 * 1024);
        assert!(matches!(
            resolve(&file, &sb, "/nope"),
            Err(GnordoError::NotFound)
        ));
    }
}
