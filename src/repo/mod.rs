//! The on-disk object database: loose objects under `objects/xx/`, packs
//! under `objects/pack/`, and the reference files that name commits.
//!
//! The layout is the same `.git` directory format command-line git uses,
//! so a store can be inspected with ordinary git tools.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use tempfile::NamedTempFile;
use tracing::{debug, info, trace};

mod init;
pub use init::{init, init_bare};

pub mod refs;

use crate::error::{Error, Result};
use crate::object::{id_for, loose, Id, Kind, Object};
use crate::pack::Pack;

/// Unified access to the loose and packed objects of one repository.
#[derive(Debug)]
pub struct ObjectStore {
    git_dir: PathBuf,
    objects_dir: PathBuf,
    packs: RwLock<Packs>,
}

#[derive(Debug, Default)]
struct Packs {
    packs: Vec<Pack>,
    index: HashMap<Id, (usize, u64)>,
}

impl ObjectStore {
    /// Open the object database in `git_dir`.
    ///
    /// Fails with [`Error::InvalidRepository`] if `git_dir/objects` does not
    /// exist. Every pack in `objects/pack` is loaded.
    pub fn open<P: AsRef<Path>>(git_dir: P) -> Result<ObjectStore> {
        let git_dir = git_dir.as_ref().to_path_buf();
        let objects_dir = git_dir.join("objects");
        if !objects_dir.is_dir() {
            return Err(Error::InvalidRepository(git_dir));
        }

        let store = ObjectStore {
            git_dir,
            objects_dir,
            packs: RwLock::new(Packs::default()),
        };
        store.reload_packs()?;
        Ok(store)
    }

    /// Return the path to the git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The loose object path for `id`: `objects/<2 hex>/<38 hex>`.
    pub fn object_path(&self, id: &Id) -> PathBuf {
        let hex = id.to_hex();
        self.objects_dir.join(&hex[0..2]).join(&hex[2..])
    }

    /// True if `id` is stored as a loose object.
    pub fn exists(&self, id: &Id) -> bool {
        self.object_path(id).is_file()
    }

    /// True if `id` is stored loose or in any pack.
    pub fn contains(&self, id: &Id) -> bool {
        self.exists(id) || self.packs().index.contains_key(id)
    }

    /// Read an object, trying the loose object first and then the packs.
    pub fn get(&self, id: &Id) -> Result<Object> {
        match fs::read(self.object_path(id)) {
            Ok(data) => return loose::decode(&data),
            Err(err) if err.kind() == io::ErrorKind::NotFound => (),
            Err(err) => return Err(err.into()),
        }

        let packs = self.packs();
        match packs.index.get(id) {
            Some((pack, offset)) => {
                trace!(%id, pack = %packs.packs[*pack].path().display(), "read packed object");
                packs.packs[*pack].parse_object(*offset)
            }
            None => Err(Error::ObjectNotFound(*id)),
        }
    }

    /// Store an object as a loose object and return its id.
    ///
    /// Nothing is written if the loose object already exists. The object is
    /// written to a temporary file in its fan-out directory and then moved
    /// into place, so readers never see a partial object.
    pub fn put(&self, kind: Kind, content: &[u8]) -> Result<Id> {
        let id = id_for(kind, content);
        let path = self.object_path(&id);
        if path.is_file() {
            return Ok(id);
        }

        let dir = self.objects_dir.join(&id.to_hex()[0..2]);
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        io::Write::write_all(&mut temp, &loose::encode(kind, content)?)?;

        match temp.persist_noclobber(&path) {
            Ok(_) => debug!(%id, %kind, len = content.len(), "wrote object"),
            // Another writer stored the same object first.
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => (),
            Err(err) => return Err(err.error.into()),
        }

        Ok(id)
    }

    /// Rescan `objects/pack` and rebuild the merged pack index.
    pub fn reload_packs(&self) -> Result<()> {
        let pack_dir = self.objects_dir.join("pack");
        let mut loaded = Packs::default();

        if pack_dir.is_dir() {
            let mut paths: Vec<PathBuf> = fs::read_dir(&pack_dir)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<_>>()?;
            paths.retain(|p| p.extension().map_or(false, |ext| ext == "pack"));
            paths.sort();

            for path in paths {
                let pack = Pack::open(&path)?;
                let n = loaded.packs.len();
                for (id, offset) in pack.each_entry() {
                    loaded.index.entry(id).or_insert((n, offset));
                }
                loaded.packs.push(pack);
            }
        }

        if !loaded.packs.is_empty() {
            info!(
                packs = loaded.packs.len(),
                objects = loaded.index.len(),
                "indexed packs"
            );
        }

        match self.packs.write() {
            Ok(mut packs) => *packs = loaded,
            Err(poisoned) => *poisoned.into_inner() = loaded,
        }
        Ok(())
    }

    /// Number of objects available from packs.
    pub fn packed_len(&self) -> usize {
        self.packs().index.len()
    }

    fn packs(&self) -> RwLockReadGuard<'_, Packs> {
        self.packs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
