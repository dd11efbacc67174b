use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::Value;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::object::{
    Attribution, Blob, Commit, Context, Entry, Id, Kind, Node, Object, Tag, Tree,
};
use crate::repo::{self, refs, ObjectStore};
use crate::transaction::Transaction;

/// A key/value tree kept as git objects on a single branch.
///
/// Values are addressed by slash-delimited paths. Changes stay in memory
/// until [`commit`](Store::commit), which writes every modified tree and
/// blob, a commit whose parent is the previous head, and finally the branch
/// reference.
///
/// ```no_run
/// # fn main() -> git_store::Result<()> {
/// let mut store = git_store::Store::open("/srv/data")?;
/// store.transaction("set greeting", |store| store.set("config/greeting", "hello"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Store {
    git_dir: PathBuf,
    branch: String,
    config: Config,
    ctx: Context,
    head: Option<Commit>,
    root: Tree,
}

/// An object read by id, typed by its kind.
#[derive(Debug)]
pub enum Loaded {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Store {
    /// Open the repository at `path` with the default [`Config`].
    ///
    /// `path` may be a working directory holding `.git` or a bare
    /// repository.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        Store::open_with(path, Config::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: Config) -> Result<Store> {
        let path = path.as_ref();
        let dot_git = path.join(".git");
        let git_dir = if dot_git.join("objects").is_dir() {
            dot_git
        } else {
            path.to_path_buf()
        };

        let objects = Arc::new(ObjectStore::open(&git_dir)?);

        let branch = match &config.branch {
            Some(branch) => branch.clone(),
            None => refs::current_branch(&git_dir)?
                .unwrap_or_else(|| refs::DEFAULT_BRANCH.to_string()),
        };
        refs::check_branch(&branch)?;

        let ctx = Context::new(objects, Arc::new(config.codecs.clone()));
        let root = Tree::new(ctx.clone(), String::new());

        let mut store = Store {
            git_dir,
            branch,
            config,
            ctx,
            head: None,
            root,
        };
        store.load()?;
        Ok(store)
    }

    /// Create a repository with a working directory at `path` and open it.
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Store> {
        Store::init_with(path, Config::default())
    }

    pub fn init_with<P: AsRef<Path>>(path: P, config: Config) -> Result<Store> {
        let git_dir = repo::init(path.as_ref())?;
        Store::open_with(git_dir, config)
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn objects(&self) -> &ObjectStore {
        self.ctx.objects()
    }

    /// The value or tree at `path`, or `None` if nothing is there.
    pub fn get(&mut self, path: &str) -> Result<Option<Entry<'_>>> {
        self.root.lookup(path)
    }

    /// Store `value` at `path`, creating intermediate trees.
    pub fn set<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<()> {
        self.root.set(path, value)
    }

    /// Place `tree` at `path`, creating intermediate trees.
    pub fn set_tree(&mut self, path: &str, tree: Tree) -> Result<()> {
        self.root.set_tree(path, tree)
    }

    /// Remove whatever is at `path` and return it.
    pub fn delete(&mut self, path: &str) -> Result<Option<Node>> {
        self.root.delete(path)
    }

    /// An empty tree that can be filled and then placed with
    /// [`set_tree`](Store::set_tree).
    pub fn new_tree(&self) -> Tree {
        Tree::new(self.ctx.clone(), String::new())
    }

    pub fn root(&self) -> &Tree {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Tree {
        &mut self.root
    }

    /// True if there are changes that have not been committed.
    pub fn is_modified(&self) -> bool {
        self.root.is_modified()
    }

    /// The commit the branch pointed at when the store last read it.
    pub fn head(&self) -> Option<&Commit> {
        self.head.as_ref()
    }

    /// The commit id the branch reference currently holds on disk.
    pub fn read_head_id(&self) -> Result<Option<Id>> {
        refs::read_ref(&self.git_dir, &self.branch)
    }

    /// True if the branch has moved since the store last read it.
    pub fn is_changed(&self) -> Result<bool> {
        Ok(self.read_head_id()? != self.head.as_ref().and_then(Commit::id))
    }

    /// Discard the in-memory tree and reload it from the branch head.
    pub fn load(&mut self) -> Result<()> {
        match self.read_head_id()? {
            Some(id) => {
                let commit = Commit::load(&self.ctx.objects, &id)?;
                self.root = Tree::unloaded(self.ctx.clone(), String::new(), commit.tree());
                self.head = Some(commit);
                debug!(branch = %self.branch, head = %id, "loaded head");
            }
            None => {
                self.root = Tree::new(self.ctx.clone(), String::new());
                self.head = None;
                debug!(branch = %self.branch, "branch has no commits");
            }
        }
        Ok(())
    }

    /// Reload if the branch has moved. Returns true if it had.
    ///
    /// Uncommitted changes are discarded when a reload happens.
    pub fn refresh(&mut self) -> Result<bool> {
        if self.is_changed()? {
            if self.is_modified() {
                warn!(branch = %self.branch, "discarding uncommitted changes on refresh");
            }
            self.load()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Commit the current tree as the configured author.
    ///
    /// No lock is taken. Use [`transaction`](Store::transaction) or
    /// [`start`](Store::start) when other writers may share the branch.
    pub fn commit(&mut self, message: &str) -> Result<Id> {
        let author = Attribution::now(&self.config.author_name, &self.config.author_email);
        self.commit_as(message, author.clone(), author)
    }

    pub fn commit_as(
        &mut self,
        message: &str,
        author: Attribution,
        committer: Attribution,
    ) -> Result<Id> {
        let tree = self.root.write()?;
        let parents = self.head.as_ref().and_then(Commit::id).into_iter().collect();

        let mut commit = Commit::new(tree, parents, author, committer, message);
        let id = commit.write(&self.ctx.objects)?;
        refs::write_ref(&self.git_dir, &self.branch, &id)?;

        info!(branch = %self.branch, commit = %id, %tree, "committed");
        self.head = Some(commit);
        Ok(id)
    }

    /// Lock the branch for a transaction. The store is brought up to date
    /// with the branch once the lock is held.
    pub fn start(&mut self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Run `body` inside a transaction.
    ///
    /// If `body` succeeds its changes are committed with `message`. If it
    /// fails they are rolled back and its error is returned. The lock is
    /// released either way.
    pub fn transaction<T, E, F>(&mut self, message: &str, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Store) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut tx = self.start()?;
        match body(&mut *tx) {
            Ok(value) => {
                tx.commit(message)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(err = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub fn get_object(&self, id: &Id) -> Result<Object> {
        self.ctx.objects.get(id)
    }

    pub fn put_object(&self, kind: Kind, content: &[u8]) -> Result<Id> {
        self.ctx.objects.put(kind, content)
    }

    /// Read the object `id` as a typed node. Trees are loaded lazily.
    pub fn read(&self, id: &Id) -> Result<Loaded> {
        let object = self.get_object(id)?;
        Ok(match object.kind() {
            Kind::Blob => Loaded::Blob(Blob::loaded(
                self.ctx.clone(),
                String::new(),
                *id,
                object.into_content(),
            )),
            Kind::Tree => Loaded::Tree(Tree::unloaded(self.ctx.clone(), String::new(), *id)),
            Kind::Commit => Loaded::Commit(Commit::from_object(id, &object)?),
            Kind::Tag => Loaded::Tag(Tag::parse(object.content())?),
        })
    }

    /// Commits reachable from the head by first parents, newest first.
    pub fn log(&self, limit: Option<usize>) -> Result<Vec<Commit>> {
        let mut commits = Vec::new();
        let mut next = self.head.as_ref().and_then(Commit::id);

        while let Some(id) = next {
            if limit.map_or(false, |limit| commits.len() >= limit) {
                break;
            }
            let commit = Commit::load(&self.ctx.objects, &id)?;
            next = commit.parents().first().copied();
            commits.push(commit);
        }

        Ok(commits)
    }

    pub fn object_path(&self, id: &Id) -> PathBuf {
        self.ctx.objects.object_path(id)
    }
}
