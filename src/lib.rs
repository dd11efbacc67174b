//! This crate implements a transactional key/value tree stored in the git
//! object model.
//!
//! Every value is a blob, every directory of values a tree, and every
//! committed state a commit on a single branch, all kept in an ordinary
//! `.git` directory. See [`Store`] for the entry point.

pub mod codec;
pub mod config;
mod error;
pub mod object;
pub mod pack;
pub mod path;
pub mod repo;
mod store;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_support;

pub use codec::{Codec, Registry, Value};
pub use config::Config;
pub use error::{Error, Result};
pub use object::{Attribution, Entry, Id, Kind, Node, Object, Tree};
pub use store::{Loaded, Store};
pub use transaction::Transaction;
