//! File tree helpers used by the toolchain install, frozen-module harvesting
//! and artifact publishing
//!
//! Copies follow the `cp -a` contract the build relies on: directories are
//! recreated, regular files keep their permission bits and modification time,
//! and symbolic links are recreated as links rather than followed.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Copy the regular file `src` to `dest`, carrying over its permission bits
/// and modification time. Returns the number of bytes copied.
pub fn copy_file_preserving(src: &Path, dest: &Path) -> io::Result<u64> {
    let bytes = fs::copy(src, dest)?;
    // Setting explicit times needs ownership, not write access
    let mtime = fs::metadata(src)?.modified()?;
    fs::File::open(dest)?.set_modified(mtime)?;
    Ok(bytes)
}

/// Recursively copy the directory `src` to `dest` (created if missing).
///
/// Returns the number of files and links copied.
pub fn copy_dir_all(src: &Path, dest: &Path) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    copy_entries(src, dest)
}

/// Copy everything below `src` into the existing directory `dest`,
/// overwriting files of the same name.
///
/// Returns the number of files and links copied.
pub fn copy_entries(src: &Path, dest: &Path) -> io::Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            copy_file_preserving(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Replace `dest` with a copy of `src`, discarding whatever partial tree was there.
pub fn replace_dir_tree(src: &Path, dest: &Path) -> io::Result<usize> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest)?,
        Ok(_) => fs::remove_file(dest)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    copy_dir_all(src, dest)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let link = fs::read_link(src)?;
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest)?;
    }
    std::os::unix::fs::symlink(link, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    copy_file_preserving(src, dest).map(|_| ())
}
