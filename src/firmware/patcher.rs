//! Compatibility edits applied to a freshly cloned distribution tree.
//!
//! Each edit is a pure `&str -> String` transformation; [`patch_file`] wraps
//! one with whole-file read and an atomic whole-file write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::DistributionLayout;
use crate::error::PatchError;
use crate::firmware::sources::DistributionVariant;

/// Retired package-index host still hard-coded in old installer scripts
pub const LEGACY_PACKAGE_INDEX_HOST: &str = "pypi.python.org";

/// Current package-index host
pub const PACKAGE_INDEX_HOST: &str = "pypi.org";

// Standalone -Werror token: preceded by line start, '=' or blanks, followed by
// a blank or line end. -Werror=<diag> is left alone.
static WERROR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(^|=|[ \t]+)-Werror([ \t]|$)").expect("Invalid -Werror regex")
});

/// Point the package installer at the current package index
pub fn rewrite_package_index(content: &str) -> String {
    content.replace(LEGACY_PACKAGE_INDEX_HOST, PACKAGE_INDEX_HOST)
}

/// Remove every standalone `-Werror` flag from build configuration text
pub fn strip_warnings_as_errors(content: &str) -> String {
    let mut current = content.to_string();
    loop {
        let next = WERROR_REGEX
            .replace_all(&current, |caps: &Captures| {
                let before = &caps[1];
                if before.is_empty() || before == "=" {
                    before.to_string()
                } else {
                    caps[2].to_string()
                }
            })
            .into_owned();

        if next == current {
            return next;
        }
        current = next;
    }
}

/// Apply `transform` to the file at `path`.
///
/// The file is replaced through a temporary sibling so readers never observe a
/// half-written file. Returns `false` without writing when nothing changed.
pub fn patch_file<F>(path: &Path, transform: F) -> Result<bool, PatchError>
where
    F: Fn(&str) -> String,
{
    if !path.is_file() {
        return Err(PatchError::FileNotFound(path.to_path_buf()));
    }

    let original = fs::read_to_string(path).map_err(|source| PatchError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let patched = transform(&original);
    if patched == original {
        return Ok(false);
    }

    write_atomic(path, &patched)?;
    Ok(true)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), PatchError> {
    let write_err = |source: std::io::Error| PatchError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path).map_err(write_err)?.permissions();

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.flush().map_err(write_err)?;
    fs::set_permissions(temp.path(), permissions).map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

/// Applies the per-variant edits to a cloned distribution tree
#[derive(Debug, Clone)]
pub struct DistributionPatcher<'a> {
    layout: &'a DistributionLayout,
}

impl<'a> DistributionPatcher<'a> {
    pub fn new(layout: &'a DistributionLayout) -> Self {
        DistributionPatcher { layout }
    }

    /// Patch the tree rooted at `source_root`, returning the files that changed
    pub fn apply(
        &self,
        source_root: &Path,
        variant: DistributionVariant,
    ) -> Result<Vec<PathBuf>, PatchError> {
        let mut changed = Vec::new();

        let installer = source_root.join(&self.layout.package_installer_script);
        if patch_file(&installer, rewrite_package_index)? {
            log::info!(
                "[Patcher] Rewrote package index host in {}",
                installer.display()
            );
            changed.push(installer);
        } else {
            log::debug!("[Patcher] {} already uses {}", installer.display(), PACKAGE_INDEX_HOST);
        }

        if variant.requires_relaxed_warnings() {
            let makefile = source_root.join(&self.layout.port_makefile);
            if patch_file(&makefile, strip_warnings_as_errors)? {
                log::info!("[Patcher] Removed -Werror from {}", makefile.display());
                changed.push(makefile);
            } else {
                log::warn!("[Patcher] No -Werror flag found in {}", makefile.display());
            }
        }

        Ok(changed)
    }
}
