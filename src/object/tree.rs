use std::collections::BTreeMap;
use std::str;

use tracing::trace;

use super::{Blob, Context, Id, Kind, ID_LEN};
use crate::codec::Value;
use crate::error::{Error, Result};
use crate::path::{self, FileMode, PathMode};

/// A child of a [`Tree`].
#[derive(Clone, Debug)]
pub enum Node {
    Blob(Blob),
    Tree(Tree),

    /// A gitlink (mode `160000`). Carried through unchanged, never loaded.
    Submodule(Id),
}

impl Node {
    pub fn mode(&self) -> FileMode {
        match self {
            Node::Blob(blob) => blob.mode(),
            Node::Tree(_) => FileMode::Tree,
            Node::Submodule(_) => FileMode::Submodule,
        }
    }

    pub fn id(&self) -> Option<Id> {
        match self {
            Node::Blob(blob) => blob.id(),
            Node::Tree(tree) => tree.id(),
            Node::Submodule(id) => Some(*id),
        }
    }

    pub fn is_modified(&self) -> bool {
        match self {
            Node::Blob(blob) => blob.is_modified(),
            Node::Tree(tree) => tree.is_modified(),
            Node::Submodule(_) => false,
        }
    }

    fn write(&mut self) -> Result<Id> {
        match self {
            Node::Blob(blob) => blob.write(),
            Node::Tree(tree) => tree.write(),
            Node::Submodule(id) => Ok(*id),
        }
    }

    fn set_path(&mut self, path: String) {
        match self {
            Node::Blob(blob) => blob.set_path(path),
            Node::Tree(tree) => tree.set_path(path),
            Node::Submodule(_) => (),
        }
    }
}

/// What a lookup in a [`Tree`] finds.
#[derive(Debug)]
pub enum Entry<'a> {
    /// A blob's decoded value.
    Value(&'a Value),

    /// A subtree, which may be modified in place.
    Tree(&'a mut Tree),

    Submodule(Id),
}

impl<'a> Entry<'a> {
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Entry::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn tree(self) -> Option<&'a mut Tree> {
        match self {
            Entry::Tree(tree) => Some(tree),
            _ => None,
        }
    }
}

impl<'a> PartialEq<&str> for Entry<'a> {
    fn eq(&self, other: &&str) -> bool {
        match self {
            Entry::Value(value) => *value == other,
            _ => false,
        }
    }
}

impl<'a> PartialEq<Value> for Entry<'a> {
    fn eq(&self, other: &Value) -> bool {
        match self {
            Entry::Value(value) => *value == other,
            _ => false,
        }
    }
}

/// An internal node of the object graph: a map from names to blobs and
/// subtrees, addressed by slash-delimited paths.
///
/// Entries are read from the object store on first access. Writing through
/// a path creates any missing intermediate trees.
#[derive(Clone, Debug)]
pub struct Tree {
    ctx: Context,
    id: Option<Id>,
    path: String,
    entries: Option<BTreeMap<String, Node>>,
    modified: bool,
}

impl Tree {
    /// An empty tree that has not been written. It counts as unmodified
    /// until something is put into it, but is still written on demand.
    pub(crate) fn new(ctx: Context, path: String) -> Tree {
        Tree {
            ctx,
            id: None,
            path,
            entries: Some(BTreeMap::new()),
            modified: false,
        }
    }

    /// A tree that is known by id only.
    pub(crate) fn unloaded(ctx: Context, path: String, id: Id) -> Tree {
        Tree {
            ctx,
            id: Some(id),
            path,
            entries: None,
            modified: false,
        }
    }

    /// Returns the id assigned by the last load or write, if any.
    pub fn id(&self) -> Option<Id> {
        self.id
    }

    /// The tree's path relative to the root (empty for the root itself).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True if this tree, or any loaded descendant, differs from what was
    /// last written.
    pub fn is_modified(&self) -> bool {
        self.modified
            || self
                .entries
                .as_ref()
                .map(|entries| entries.values().any(Node::is_modified))
                .unwrap_or(false)
    }

    /// Returns the decoded value of a blob child or the subtree named `name`.
    pub fn get(&mut self, name: &str) -> Result<Option<Entry<'_>>> {
        match self.load()?.get_mut(name) {
            Some(Node::Blob(blob)) => Ok(Some(Entry::Value(blob.value()?))),
            Some(Node::Tree(tree)) => Ok(Some(Entry::Tree(tree))),
            Some(Node::Submodule(id)) => Ok(Some(Entry::Submodule(*id))),
            None => Ok(None),
        }
    }

    /// Returns the child node named `name`.
    pub fn node(&mut self, name: &str) -> Result<Option<&mut Node>> {
        Ok(self.load()?.get_mut(name))
    }

    /// Store `value` as the blob named `name`, replacing whatever was there.
    pub fn put<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<()> {
        path::check_name(name)?;
        let value = value.into();
        let child_path = path::join(&self.path, name);
        let ctx = self.ctx.clone();

        let entries = self.load()?;
        match entries.get_mut(name) {
            Some(Node::Blob(blob)) => blob.set_value(&value)?,
            _ => {
                let blob = Blob::with_value(ctx, child_path, &value)?;
                entries.insert(name.to_string(), Node::Blob(blob));
            }
        }

        self.modified = true;
        Ok(())
    }

    /// Attach `tree` as the subtree named `name`. The tree and everything
    /// below it take on paths under this tree.
    pub fn put_tree(&mut self, name: &str, mut tree: Tree) -> Result<()> {
        path::check_name(name)?;
        tree.set_path(path::join(&self.path, name));
        self.load()?.insert(name.to_string(), Node::Tree(tree));
        self.modified = true;
        Ok(())
    }

    /// Remove the child named `name`, returning it.
    pub fn remove(&mut self, name: &str) -> Result<Option<Node>> {
        let removed = self.load()?.remove(name);
        if removed.is_some() {
            self.modified = true;
        }
        Ok(removed)
    }

    pub fn contains(&mut self, name: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(name))
    }

    /// The names of all children in byte order.
    pub fn names(&mut self) -> Result<Vec<String>> {
        Ok(self.load()?.keys().cloned().collect())
    }

    pub fn len(&mut self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }

    /// Resolve a slash-delimited path below this tree.
    ///
    /// Returns `None` if any segment is missing or names a blob before the
    /// last segment.
    pub fn lookup(&mut self, path: &str) -> Result<Option<Entry<'_>>> {
        let path = path::parse(path)?;
        let (parents, name) = path.split_last();
        match self.subtree(&parents)? {
            Some(tree) => tree.get(name),
            None => Ok(None),
        }
    }

    /// Store `value` at a slash-delimited path, creating intermediate trees.
    pub fn set<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<()> {
        let path = path::parse(path)?;
        let (parents, name) = path.split_last();
        self.subtree_mut(&parents)?.put(name, value)
    }

    /// Attach `tree` at a slash-delimited path, creating intermediate trees.
    pub fn set_tree(&mut self, path: &str, tree: Tree) -> Result<()> {
        let path = path::parse(path)?;
        let (parents, name) = path.split_last();
        self.subtree_mut(&parents)?.put_tree(name, tree)
    }

    /// Remove the entry at a slash-delimited path. Siblings are untouched.
    pub fn delete(&mut self, path: &str) -> Result<Option<Node>> {
        let path = path::parse(path)?;
        let (parents, name) = path.split_last();
        match self.subtree(&parents)? {
            Some(tree) => tree.remove(name),
            None => Ok(None),
        }
    }

    /// Every blob below this tree, keyed by its path relative to this tree.
    pub fn to_map(&mut self) -> Result<BTreeMap<String, Value>> {
        let mut map = BTreeMap::new();
        self.collect_values("", &mut map)?;
        Ok(map)
    }

    /// Persist every modified descendant and then this tree, returning the
    /// tree's id. Unmodified trees are not rewritten.
    pub fn write(&mut self) -> Result<Id> {
        if let (false, Some(id)) = (self.is_modified(), self.id) {
            return Ok(id);
        }

        let data = {
            let entries = self.load()?;
            let mut rows: Vec<(&str, FileMode, Id)> = Vec::with_capacity(entries.len());
            for (name, node) in entries.iter_mut() {
                let id = node.write()?;
                rows.push((name.as_str(), node.mode(), id));
            }
            serialize(rows)
        };

        let id = self.ctx.objects.put(Kind::Tree, &data)?;
        trace!(path = %self.path, %id, "wrote tree");

        self.id = Some(id);
        self.modified = false;
        Ok(id)
    }

    pub(crate) fn set_path(&mut self, path: String) {
        if path == self.path {
            return;
        }

        if let Some(entries) = self.entries.as_mut() {
            for (name, node) in entries.iter_mut() {
                node.set_path(path::join(&path, name));
            }
        }
        self.path = path;
    }

    fn load(&mut self) -> Result<&mut BTreeMap<String, Node>> {
        let entries = match self.entries.take() {
            Some(entries) => entries,
            None => match self.id {
                Some(id) => {
                    let data = self.ctx.read(&id, Kind::Tree)?;
                    parse(&self.ctx, &self.path, &data)?
                }
                None => BTreeMap::new(),
            },
        };
        Ok(self.entries.insert(entries))
    }

    fn subtree(&mut self, segments: &[&str]) -> Result<Option<&mut Tree>> {
        match segments.split_first() {
            None => Ok(Some(self)),
            Some((first, rest)) => match self.load()?.get_mut(*first) {
                Some(Node::Tree(tree)) => tree.subtree(rest),
                _ => Ok(None),
            },
        }
    }

    fn subtree_mut(&mut self, segments: &[&str]) -> Result<&mut Tree> {
        let (first, rest) = match segments.split_first() {
            None => return Ok(self),
            Some(split) => split,
        };

        let child_path = path::join(&self.path, first);
        let ctx = self.ctx.clone();

        let entries = self.load()?;
        let vivified = match entries.get(*first) {
            Some(Node::Tree(_)) => false,
            Some(_) => return Err(Error::NotATree(child_path)),
            None => {
                let tree = Tree::new(ctx, child_path.clone());
                entries.insert((*first).to_string(), Node::Tree(tree));
                true
            }
        };

        if vivified {
            self.modified = true;
        }

        match self.load()?.get_mut(*first) {
            Some(Node::Tree(tree)) => tree.subtree_mut(rest),
            _ => Err(Error::NotATree(child_path)),
        }
    }

    fn collect_values(&mut self, prefix: &str, map: &mut BTreeMap<String, Value>) -> Result<()> {
        for (name, node) in self.load()?.iter_mut() {
            let key = path::join(prefix, name);
            match node {
                Node::Blob(blob) => {
                    map.insert(key, blob.value()?.clone());
                }
                Node::Tree(tree) => tree.collect_values(&key, map)?,
                Node::Submodule(_) => (),
            }
        }
        Ok(())
    }
}

/// Render tree rows as `"{mode} {name}\0{20 raw id bytes}"` in git's
/// canonical order.
fn serialize(mut rows: Vec<(&str, FileMode, Id)>) -> Vec<u8> {
    rows.sort_by(|a, b| PathMode::new(a.0, a.1).cmp(&PathMode::new(b.0, b.1)));

    let mut data = Vec::new();
    for (name, mode, id) in rows {
        data.extend_from_slice(mode.as_octal().as_bytes());
        data.push(b' ');
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        data.extend_from_slice(id.as_bytes());
    }
    data
}

/// Parse stored tree content into unloaded children.
fn parse(ctx: &Context, path: &str, mut data: &[u8]) -> Result<BTreeMap<String, Node>> {
    let mut entries = BTreeMap::new();

    while !data.is_empty() {
        let space = data
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| corrupt(path, "entry has no mode"))?;
        let mode = FileMode::parse(&data[..space])
            .ok_or_else(|| corrupt(path, "entry has an invalid mode"))?;
        data = &data[space + 1..];

        let nul = data
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt(path, "entry name is not terminated"))?;
        let name = str::from_utf8(&data[..nul])
            .map_err(|_| corrupt(path, "entry name is not UTF-8"))?
            .to_string();
        data = &data[nul + 1..];

        if data.len() < ID_LEN {
            return Err(corrupt(path, "entry id is truncated"));
        }
        let id = Id::new(&data[..ID_LEN])?;
        data = &data[ID_LEN..];

        let child_path = path::join(path, &name);
        let node = match mode {
            FileMode::Tree => Node::Tree(Tree::unloaded(ctx.clone(), child_path, id)),
            FileMode::Submodule => Node::Submodule(id),
            _ => Node::Blob(Blob::unloaded(ctx.clone(), child_path, mode, id)),
        };

        if entries.insert(name, node).is_some() {
            return Err(corrupt(path, "duplicate entry"));
        }
    }

    Ok(entries)
}

fn corrupt(path: &str, reason: &str) -> Error {
    let path = if path.is_empty() { "/" } else { path };
    Error::CorruptObject(format!("tree `{}`: {}", path, reason))
}
