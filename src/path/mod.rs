//! Slash-delimited store paths, git file modes, and git's canonical
//! ordering of tree entries.

mod file_mode;
pub use file_mode::FileMode;

mod path_mode;
pub use path_mode::PathMode;

use crate::error::{Error, Result};

/// Represents a slash-delimited path into a store's tree that has been
/// checked for segments git would refuse to store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GitPath<'a> {
    path: &'a str,
}

/// Reasons why a given string can not be accepted as a store path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GitPathError {
    EmptyPath,
    AbsolutePath,
    TrailingSlash,
    DuplicateSlash,
    ContainsNull,
    DotSegment,
    DotGit,
}

impl GitPathError {
    /// Short human-readable description of the problem.
    pub fn reason(self) -> &'static str {
        match self {
            GitPathError::EmptyPath => "path is empty",
            GitPathError::AbsolutePath => "path must be relative",
            GitPathError::TrailingSlash => "path ends with a slash",
            GitPathError::DuplicateSlash => "path contains an empty segment",
            GitPathError::ContainsNull => "path contains a NUL byte",
            GitPathError::DotSegment => "path contains a `.` or `..` segment",
            GitPathError::DotGit => "path contains a `.git` segment",
        }
    }
}

impl<'a> GitPath<'a> {
    /// Convert the provided string to a `GitPath` if it is acceptable
    /// as a store path.
    pub fn new(path: &'a str) -> std::result::Result<GitPath<'a>, GitPathError> {
        check_path(path.as_bytes())?;
        Ok(GitPath { path })
    }

    /// Return the path.
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Iterate over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &'a str> {
        self.path.split('/')
    }

    /// Split the path into its parent segments and final name.
    pub fn split_last(&self) -> (Vec<&'a str>, &'a str) {
        let mut segments: Vec<&'a str> = self.segments().collect();
        let name = segments.pop().unwrap_or_default();
        (segments, name)
    }
}

/// Validate a store path, converting failures into [`Error::InvalidPath`].
pub fn parse(path: &str) -> Result<GitPath<'_>> {
    GitPath::new(path).map_err(|err| Error::InvalidPath {
        path: path.to_string(),
        reason: err.reason(),
    })
}

/// Check a single tree entry name (no slashes allowed).
pub fn check_name(name: &str) -> Result<()> {
    let result = if name.contains('/') {
        Err(GitPathError::DuplicateSlash)
    } else {
        check_segment(name.as_bytes())
    };

    result.map_err(|err| Error::InvalidPath {
        path: name.to_string(),
        reason: err.reason(),
    })
}

/// Join a parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn check_path(path: &[u8]) -> std::result::Result<(), GitPathError> {
    if path.is_empty() {
        Err(GitPathError::EmptyPath)
    } else if path.starts_with(b"/") {
        Err(GitPathError::AbsolutePath)
    } else if path.ends_with(b"/") {
        Err(GitPathError::TrailingSlash)
    } else {
        for segment in path.split(|c| *c == b'/') {
            match check_segment(segment) {
                Err(GitPathError::EmptyPath) => Err(GitPathError::DuplicateSlash),
                x => x,
            }?;
        }
        Ok(())
    }
}

fn check_segment(segment: &[u8]) -> std::result::Result<(), GitPathError> {
    if segment.is_empty() {
        Err(GitPathError::EmptyPath)
    } else if segment.contains(&0) {
        Err(GitPathError::ContainsNull)
    } else if segment == b"." || segment == b".." {
        Err(GitPathError::DotSegment)
    } else {
        check_git_name(segment)
    }
}

fn check_git_name(segment: &[u8]) -> std::result::Result<(), GitPathError> {
    // `git~1` is the Windows short name for `.git`.
    if segment.eq_ignore_ascii_case(b".git") || segment.eq_ignore_ascii_case(b"git~1") {
        Err(GitPathError::DotGit)
    } else {
        Ok(())
    }
}
