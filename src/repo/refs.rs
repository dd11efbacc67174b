//! Branch references: `refs/heads/<branch>`, `packed-refs` and `HEAD`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::object::Id;
use crate::path;

/// The branch used when `HEAD` does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// Path of the reference file for `branch`.
pub fn ref_path(git_dir: &Path, branch: &str) -> PathBuf {
    git_dir.join("refs/heads").join(branch)
}

/// Path of the lock file guarding `branch`.
pub fn lock_path(git_dir: &Path, branch: &str) -> PathBuf {
    let mut name = ref_path(git_dir, branch).into_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Reject branch names that would escape `refs/heads`.
pub fn check_branch(branch: &str) -> Result<()> {
    path::parse(branch)?;
    if branch.ends_with(".lock") {
        return Err(Error::InvalidPath {
            path: branch.to_string(),
            reason: "branch name ends with .lock",
        });
    }
    Ok(())
}

/// Read the commit id `branch` points at.
///
/// Loose reference files take precedence over `packed-refs`. Returns `None`
/// if the branch does not exist yet.
pub fn read_ref(git_dir: &Path, branch: &str) -> Result<Option<Id>> {
    let path = ref_path(git_dir, branch);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let hex = content.trim();
            if hex.is_empty() {
                return Ok(None);
            }
            Id::from_hex(hex)
                .map(Some)
                .map_err(|_| Error::InvalidReference { path, content })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => read_packed_ref(git_dir, branch),
        Err(err) => Err(err.into()),
    }
}

fn read_packed_ref(git_dir: &Path, branch: &str) -> Result<Option<Id>> {
    let path = git_dir.join("packed-refs");
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let wanted = format!("refs/heads/{}", branch);
    for line in content.lines() {
        if line.starts_with('#') || line.starts_with('^') {
            continue;
        }

        if let Some((hex, name)) = line.split_once(' ') {
            if name == wanted {
                return Id::from_hex(hex)
                    .map(Some)
                    .map_err(|_| Error::InvalidReference {
                        path: path.clone(),
                        content: line.to_string(),
                    });
            }
        }
    }

    Ok(None)
}

/// Point `branch` at `id`, replacing the reference file atomically.
pub fn write_ref(git_dir: &Path, branch: &str, id: &Id) -> Result<()> {
    let path = ref_path(git_dir, branch);
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidRepository(git_dir.to_path_buf()))?;
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    writeln!(temp, "{}", id)?;
    temp.as_file().sync_all()?;
    temp.persist(&path).map_err(|err| err.error)?;

    debug!(%branch, %id, "updated reference");
    Ok(())
}

/// The branch `HEAD` refers to, or `None` if `HEAD` is missing or detached.
pub fn current_branch(git_dir: &Path) -> Result<Option<String>> {
    let content = match fs::read_to_string(git_dir.join("HEAD")) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    Ok(content
        .trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::to_string))
}
