/// Describes the file type of a tree entry.
///
/// Git uses a variation on the Unix file permissions flags to denote a file's
/// intended type on disk. The following values are recognized:
///
/// * `0o100644` - normal file
/// * `0o100755` - executable file
/// * `0o120000` - symbolic link
/// * `0o040000` - tree (subdirectory)
/// * `0o160000` - submodule (aka gitlink)
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FileMode {
    Normal,
    Executable,
    SymbolicLink,
    Tree,
    Submodule,
}

impl FileMode {
    /// Convert from git file-mode integer to `FileMode` enum.
    ///
    /// Returns `None` if the value is not one of the recognized constants.
    pub fn from_value(value: u32) -> Option<FileMode> {
        match value {
            0o100644 => Some(FileMode::Normal),
            0o100755 => Some(FileMode::Executable),
            0o120000 => Some(FileMode::SymbolicLink),
            0o040000 => Some(FileMode::Tree),
            0o160000 => Some(FileMode::Submodule),
            _ => None,
        }
    }

    /// Convert from `FileMode` enum to git file-mode integer.
    pub fn to_value(self) -> u32 {
        match self {
            FileMode::Normal => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::SymbolicLink => 0o120000,
            FileMode::Tree => 0o040000,
            FileMode::Submodule => 0o160000,
        }
    }

    /// Parse the octal mode as written in a tree entry.
    ///
    /// Both `40000` (what git writes) and `040000` are accepted for trees.
    pub fn parse(octal: &[u8]) -> Option<FileMode> {
        if octal.is_empty() || octal.len() > 6 {
            return None;
        }

        let mut value = 0u32;
        for digit in octal {
            match digit {
                b'0'..=b'7' => value = value * 8 + u32::from(digit - b'0'),
                _ => return None,
            }
        }

        FileMode::from_value(value)
    }

    /// The octal mode as written in a tree entry.
    ///
    /// Trees are written as `40000`, not the zero-padded `040000`. Git
    /// itself writes the short form, and the tree id depends on it.
    pub fn as_octal(self) -> &'static str {
        match self {
            FileMode::Normal => "100644",
            FileMode::Executable => "100755",
            FileMode::SymbolicLink => "120000",
            FileMode::Tree => "40000",
            FileMode::Submodule => "160000",
        }
    }

    /// True for entries whose content is stored as a blob.
    pub fn is_blob(self) -> bool {
        matches!(
            self,
            FileMode::Normal | FileMode::Executable | FileMode::SymbolicLink
        )
    }
}

impl Default for FileMode {
    fn default() -> FileMode {
        FileMode::Normal
    }
}
