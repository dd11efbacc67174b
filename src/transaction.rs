//! Serialized updates of a branch.
//!
//! A [`Lock`] is an exclusive advisory lock on `refs/heads/<branch>.lock`.
//! While it is held no other store, in this process or another, can start a
//! transaction on the same branch. A [`Transaction`] holds the lock for the
//! span between [`Store::start`] and its commit or rollback.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::process;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::object::{Attribution, Id};
use crate::repo::refs;
use crate::store::Store;

/// An exclusive lock on a lock file. Dropping it removes the file and
/// releases the lock.
#[derive(Debug)]
pub struct Lock {
    path: PathBuf,
    file: File,
}

impl Lock {
    /// Block until the lock at `path` is held by this process.
    ///
    /// The file is created if missing. A holder removes the file before
    /// unlocking it, so a waiter that wakes up holding a file that is no
    /// longer at `path` starts over.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Lock> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?;
            FileExt::lock_exclusive(&file)?;

            let current = match fs::metadata(path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            if same_file(&file.metadata()?, &current) {
                let mut lock = Lock {
                    path: path.to_path_buf(),
                    file,
                };
                lock.claim()?;
                debug!(path = %lock.path.display(), "acquired lock");
                return Ok(lock);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record our pid in the lock file. Leftover content means the previous
    /// holder exited without releasing.
    fn claim(&mut self) -> io::Result<()> {
        let mut stale = String::new();
        self.file.read_to_string(&mut stale)?;
        if !stale.trim().is_empty() {
            warn!(
                path = %self.path.display(),
                pid = %stale.trim(),
                "reusing stale lock file"
            );
        }

        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        writeln!(self.file, "{}", process::id())?;
        self.file.flush()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %err, "unable to remove lock file");
        }
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), %err, "unable to release lock");
        }
        debug!(path = %self.path.display(), "released lock");
    }
}

#[cfg(unix)]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    true
}

/// Exclusive access to a store's branch.
///
/// Dereferences to the [`Store`], so reads and writes go through the
/// transaction. Finish it with [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback). A transaction that is dropped
/// unfinished rolls back.
#[derive(Debug)]
pub struct Transaction<'s> {
    store: &'s mut Store,
    lock: Option<Lock>,
}

impl<'s> Transaction<'s> {
    /// Lock the store's branch and catch up with any commit made since the
    /// store last read it.
    pub(crate) fn begin(store: &'s mut Store) -> Result<Transaction<'s>> {
        let lock = Lock::acquire(refs::lock_path(store.git_dir(), store.branch()))?;
        let mut tx = Transaction {
            store,
            lock: Some(lock),
        };
        tx.store.refresh()?;
        Ok(tx)
    }

    /// Commit as the configured identity and release the lock.
    pub fn commit(mut self, message: &str) -> Result<Id> {
        let id = self.store.commit(message)?;
        self.finish();
        Ok(id)
    }

    pub fn commit_as(
        mut self,
        message: &str,
        author: Attribution,
        committer: Attribution,
    ) -> Result<Id> {
        let id = self.store.commit_as(message, author, committer)?;
        self.finish();
        Ok(id)
    }

    /// Discard every change since the last commit and release the lock.
    pub fn rollback(mut self) -> Result<()> {
        let result = self.store.load();
        self.finish();
        result
    }

    fn finish(&mut self) {
        self.lock.take();
    }
}

impl Deref for Transaction<'_> {
    type Target = Store;

    fn deref(&self) -> &Store {
        self.store
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Store {
        self.store
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            if let Err(err) = self.store.load() {
                warn!(%err, "rollback of abandoned transaction failed");
            }
            drop(lock);
        }
    }
}
