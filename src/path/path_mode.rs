use std::cmp::{self, Ordering};

use super::FileMode;

/// Represents the tuple of entry name (an uninterpreted sequence of bytes,
/// not necessarily UTF-8) and git file mode. Used to put tree entries into
/// the order git hashes them in.
#[derive(Eq, PartialEq)]
pub struct PathMode<'a> {
    pub path: &'a [u8],
    pub mode: FileMode,
}

impl<'a> PathMode<'a> {
    pub fn new(path: &'a str, mode: FileMode) -> PathMode<'a> {
        PathMode {
            path: path.as_bytes(),
            mode,
        }
    }
}

impl<'a> Ord for PathMode<'a> {
    /// Trees are sorted as though the last character is `/`, even if
    /// no such character exists.
    fn cmp(&self, other: &PathMode) -> Ordering {
        match core_compare(self, other) {
            Ordering::Equal => mode_compare(self.mode, other.mode),
            x => x,
        }
    }
}

impl<'a> PartialOrd for PathMode<'a> {
    fn partial_cmp(&self, other: &PathMode) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn core_compare(left: &PathMode, right: &PathMode) -> Ordering {
    if left.path == right.path {
        Ordering::Equal
    } else {
        let l = cmp::min(left.path.len(), right.path.len());

        match left.path[..l].cmp(&right.path[..l]) {
            Ordering::Equal => (),
            non_eq => return non_eq,
        }

        let lsuffix = suffix_or_slash(&left.path[l..], left.mode);
        let rsuffix = suffix_or_slash(&right.path[l..], right.mode);

        lsuffix.cmp(rsuffix)
    }
}

const EMPTY: [u8; 0] = [];
const SLASH: [u8; 1] = [b'/'];

fn suffix_or_slash(suffix: &[u8], mode: FileMode) -> &[u8] {
    if !suffix.is_empty() || mode != FileMode::Tree {
        suffix
    } else {
        &SLASH
    }
}

fn mode_compare(m1: FileMode, m2: FileMode) -> Ordering {
    if m1 == FileMode::Submodule || m2 == FileMode::Submodule {
        Ordering::Equal
    } else {
        suffix_or_slash(&EMPTY, m1).cmp(suffix_or_slash(&EMPTY, m2))
    }
}
