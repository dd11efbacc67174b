//! Represents the git concept of an "object" which is a tuple of
//! object type and binary data identified by the hash of the binary data,
//! and the typed object graph (blobs, trees, commits, tags) built on top of it.

use std::fmt;
use std::sync::Arc;

use sha1::{Digest, Sha1};

use crate::codec::Registry;
use crate::repo::ObjectStore;

mod attribution;
pub use attribution::Attribution;

mod blob;
pub use blob::Blob;

mod commit;
pub use commit::Commit;

mod id;
pub use id::{Id, ParseIdError, ID_LEN};

mod kind;
pub use kind::Kind;

pub mod loose;

pub(crate) mod parse_utils;

mod tag;
pub use tag::Tag;

mod tree;
pub use tree::{Entry, Node, Tree};

/// Shared handles every node of an object graph needs: where to read and
/// write objects, and how to turn blob bytes into values.
#[derive(Clone)]
pub struct Context {
    pub(crate) objects: Arc<ObjectStore>,
    pub(crate) codecs: Arc<Registry>,
}

impl Context {
    pub fn new(objects: Arc<ObjectStore>, codecs: Arc<Registry>) -> Context {
        Context { objects, codecs }
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn codecs(&self) -> &Registry {
        &self.codecs
    }

    /// Read an object and check that it has the expected kind.
    pub(crate) fn read(&self, id: &Id, kind: Kind) -> crate::error::Result<Vec<u8>> {
        let object = self.objects.get(id)?;
        if object.kind() != kind {
            return Err(crate::error::Error::CorruptObject(format!(
                "expected {} {} but found a {}",
                kind,
                id,
                object.kind()
            )));
        }
        Ok(object.into_content())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("git_dir", &self.objects.git_dir())
            .finish()
    }
}

/// Describes a single raw object: its kind and its uncompressed content.
///
/// This is the form in which objects move in and out of the object store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Object {
    kind: Kind,
    content: Vec<u8>,
}

impl Object {
    /// Create a new Object.
    pub fn new<C: Into<Vec<u8>>>(kind: Kind, content: C) -> Object {
        Object {
            kind,
            content: content.into(),
        }
    }

    /// Return the kind of the object.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Return the object's content, without header.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Consume the object, returning its content.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Return the size (in bytes) of the object.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the object is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Computes the object's ID from its content, size, and type.
    pub fn id(&self) -> Id {
        id_for(self.kind, &self.content)
    }
}

/// Computes the ID for an object of the given kind and content.
///
/// This is functionally equivalent to the
/// [`git hash-object`](https://git-scm.com/docs/git-hash-object) command
/// without the `-w` option that would write the object to the repo.
pub fn id_for(kind: Kind, content: &[u8]) -> Id {
    let mut hasher = Sha1::new();

    hasher.update(header(kind, content.len()));
    hasher.update(content);

    let mut digest = [0u8; ID_LEN];
    digest.copy_from_slice(hasher.finalize().as_slice());
    Id::from_digest(digest)
}

/// The `"{type} {length}\0"` prefix that is hashed and stored ahead of content.
pub(crate) fn header(kind: Kind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind, len).into_bytes()
}
