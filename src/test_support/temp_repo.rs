use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::codec::Registry;
use crate::object::Context;
use crate::repo::{self, ObjectStore};

/// A bare repository in a temporary directory that is removed on drop.
pub(crate) struct TempRepo {
    _dir: TempDir,
    git_dir: PathBuf,
    objects: Arc<ObjectStore>,
}

impl TempRepo {
    pub(crate) fn new() -> TempRepo {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join("repo.git");
        repo::init_bare(&git_dir).unwrap();

        let objects = Arc::new(ObjectStore::open(&git_dir).unwrap());
        TempRepo {
            _dir: dir,
            git_dir,
            objects,
        }
    }

    #[allow(dead_code)]
    pub(crate) fn path(&self) -> &Path {
        &self.git_dir
    }

    pub(crate) fn context(&self) -> Context {
        Context::new(self.objects.clone(), Arc::new(Registry::standard()))
    }
}
