use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;

/// Creates a new, empty git repository with a working directory.
///
/// The object database is created in `work_dir/.git`, which is returned.
/// Analogous to [`git init`](https://git-scm.com/docs/git-init).
pub fn init(work_dir: &Path) -> Result<PathBuf> {
    let git_dir = work_dir.join(".git");
    create(&git_dir, false)?;
    Ok(git_dir)
}

/// Creates a new, empty bare git repository at `git_dir`.
///
/// Analogous to `git init --bare`.
pub fn init_bare(git_dir: &Path) -> Result<()> {
    create(git_dir, true)
}

fn create(git_dir: &Path, bare: bool) -> Result<()> {
    if git_dir.join("objects").exists() || git_dir.join("HEAD").exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already holds a repository", git_dir.display()),
        )
        .into());
    }

    fs::create_dir_all(git_dir)?;

    create_config(git_dir, bare)?;
    create_description(git_dir)?;
    create_head(git_dir)?;
    create_info_dir(git_dir)?;
    create_objects_dir(git_dir)?;
    create_refs_dir(git_dir)?;

    info!(path = %git_dir.display(), bare, "initialized repository");
    Ok(())
}

fn create_config(git_dir: &Path, bare: bool) -> io::Result<()> {
    let config_path = git_dir.join("config");
    let config_txt = if bare {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = true\n".to_string()
    } else {
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = false\n\tlogallrefupdates = true\n".to_string()
    };

    fs::write(config_path, config_txt)
}

fn create_description(git_dir: &Path) -> io::Result<()> {
    let desc_path = git_dir.join("description");
    let desc_txt = "Unnamed repository; edit this file 'description' to name the repository.\n";

    fs::write(desc_path, desc_txt)
}

fn create_head(git_dir: &Path) -> io::Result<()> {
    let head_path = git_dir.join("HEAD");
    let head_txt = "ref: refs/heads/master\n";

    fs::write(head_path, head_txt)
}

fn create_info_dir(git_dir: &Path) -> io::Result<()> {
    let info_dir = git_dir.join("info");
    fs::create_dir_all(&info_dir)?;

    let exclude_path = info_dir.join("exclude");
    let exclude_txt = "# git ls-files --others --exclude-from=.git/info/exclude\n# Lines that start with '#' are comments.\n";

    fs::write(exclude_path, exclude_txt)
}

fn create_objects_dir(git_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(git_dir.join("objects/info"))?;
    fs::create_dir_all(git_dir.join("objects/pack"))
}

fn create_refs_dir(git_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(git_dir.join("refs/heads"))?;
    fs::create_dir_all(git_dir.join("refs/tags"))
}
