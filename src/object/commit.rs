use std::str;

use tracing::debug;

use super::parse_utils::{header_lines, split_message, split_once};
use super::{Attribution, Id, Kind, Object};
use crate::error::{Error, Result};
use crate::repo::ObjectStore;

/// A commit: a snapshot of the root tree plus its history and authorship.
///
/// Headers other than `tree`, `parent`, `author` and `committer` (for
/// example `encoding` or `gpgsig`) are kept verbatim so that parsing and
/// dumping a commit reproduces its bytes exactly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Commit {
    id: Option<Id>,
    tree: Id,
    parents: Vec<Id>,
    author: Attribution,
    committer: Attribution,
    extra_headers: Vec<(String, Vec<u8>)>,
    // For each extra header, how many interpreted header lines preceded it.
    extra_at: Vec<usize>,
    message: Option<Vec<u8>>,
}

impl Commit {
    pub fn new<M: Into<Vec<u8>>>(
        tree: Id,
        parents: Vec<Id>,
        author: Attribution,
        committer: Attribution,
        message: M,
    ) -> Commit {
        Commit {
            id: None,
            tree,
            parents,
            author,
            committer,
            extra_headers: Vec::new(),
            extra_at: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// Read and parse the commit `id`.
    pub fn load(objects: &ObjectStore, id: &Id) -> Result<Commit> {
        Commit::from_object(id, &objects.get(id)?)
    }

    /// Parse an object already read from the store.
    pub(crate) fn from_object(id: &Id, object: &Object) -> Result<Commit> {
        if object.kind() != Kind::Commit {
            return Err(Error::CorruptObject(format!(
                "{} is a {}, not a commit",
                id,
                object.kind()
            )));
        }

        let mut commit = Commit::parse(object.content())?;
        commit.id = Some(*id);
        Ok(commit)
    }

    /// Parse commit content.
    pub fn parse(data: &[u8]) -> Result<Commit> {
        let (headers, message) = split_message(data);
        let headers = match message {
            None => headers.strip_suffix(b"\n").unwrap_or(headers),
            Some(_) => headers,
        };

        let mut tree: Option<Id> = None;
        let mut parents: Vec<Id> = Vec::new();
        let mut author: Option<Attribution> = None;
        let mut committer: Option<Attribution> = None;
        let mut extra_headers: Vec<(String, Vec<u8>)> = Vec::new();
        let mut extra_at: Vec<usize> = Vec::new();

        for (n, line) in header_lines(headers).into_iter().enumerate() {
            let (name, value) = split_once(&line, &b' ');
            match name {
                b"tree" if tree.is_none() => tree = Some(Id::from_hex(value)?),
                b"parent" => parents.push(Id::from_hex(value)?),
                b"author" if author.is_none() => author = Some(attribution(value)?),
                b"committer" if committer.is_none() => committer = Some(attribution(value)?),
                _ => {
                    let name = str::from_utf8(name).map_err(|_| {
                        Error::CorruptObject("commit header name is not UTF-8".to_string())
                    })?;
                    extra_at.push(n - extra_headers.len());
                    extra_headers.push((name.to_string(), value.to_vec()));
                }
            }
        }

        Ok(Commit {
            id: None,
            tree: tree.ok_or_else(|| missing("tree"))?,
            parents,
            author: author.ok_or_else(|| missing("author"))?,
            committer: committer.ok_or_else(|| missing("committer"))?,
            extra_headers,
            extra_at,
            message: message.map(|m| m.to_vec()),
        })
    }

    /// Render the commit in the form it is hashed and stored in.
    pub fn dump(&self) -> Vec<u8> {
        let mut known: Vec<Vec<u8>> = Vec::with_capacity(3 + self.parents.len());
        known.push(format!("tree {}", self.tree).into_bytes());
        for parent in &self.parents {
            known.push(format!("parent {}", parent).into_bytes());
        }
        known.push(format!("author {}", self.author).into_bytes());
        known.push(format!("committer {}", self.committer).into_bytes());

        // Extra headers go back where they were parsed; pushed ones go last.
        let mut lines: Vec<Vec<u8>> = Vec::with_capacity(known.len() + self.extra_headers.len());
        let mut known = known.into_iter();
        let mut emitted = 0;
        for (i, (name, value)) in self.extra_headers.iter().enumerate() {
            let at = self.extra_at.get(i).copied().unwrap_or(usize::MAX);
            while emitted < at {
                match known.next() {
                    Some(line) => lines.push(line),
                    None => break,
                }
                emitted += 1;
            }
            let mut line = format!("{} ", name).into_bytes();
            line.extend_from_slice(value);
            lines.push(line);
        }
        lines.extend(known);

        let mut data = lines.join(&b'\n');
        match &self.message {
            Some(message) => {
                data.extend_from_slice(b"\n\n");
                data.extend_from_slice(message);
            }
            None => data.push(b'\n'),
        }
        data
    }

    /// Persist the commit, returning its id.
    pub fn write(&mut self, objects: &ObjectStore) -> Result<Id> {
        if let Some(id) = self.id {
            return Ok(id);
        }

        let id = objects.put(Kind::Commit, &self.dump())?;
        debug!(%id, tree = %self.tree, "wrote commit");
        self.id = Some(id);
        Ok(id)
    }

    pub fn id(&self) -> Option<Id> {
        self.id
    }

    /// The id of the root tree.
    pub fn tree(&self) -> Id {
        self.tree
    }

    pub fn parents(&self) -> &[Id] {
        &self.parents
    }

    pub fn author(&self) -> &Attribution {
        &self.author
    }

    pub fn committer(&self) -> &Attribution {
        &self.committer
    }

    /// The raw message, without the blank line separating it from the headers.
    pub fn message(&self) -> &[u8] {
        self.message.as_deref().unwrap_or_default()
    }

    /// Headers this type does not interpret, in their original order.
    pub fn extra_headers(&self) -> &[(String, Vec<u8>)] {
        &self.extra_headers
    }

    /// Append an uninterpreted header. Clears the id.
    pub fn push_header(&mut self, name: &str, value: &[u8]) {
        self.extra_headers.push((name.to_string(), value.to_vec()));
        self.extra_at.push(usize::MAX);
        self.id = None;
    }
}

fn attribution(value: &[u8]) -> Result<Attribution> {
    Attribution::parse(value).ok_or_else(|| {
        Error::CorruptObject(format!(
            "malformed identity `{}`",
            String::from_utf8_lossy(value)
        ))
    })
}

fn missing(header: &str) -> Error {
    Error::CorruptObject(format!("commit has no `{}` header", header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempRepo;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const PARENT: &str = "d670460b4b4aece5915caf5c68d12f560a9fe3e4";
    const INFO: &str = "hans <hans@email.de> 1240178400 +0200";

    fn info() -> Attribution {
        Attribution::parse(INFO.as_bytes()).unwrap()
    }

    #[test]
    fn dump_format() {
        let commit = Commit::new(Id::from_hex(TREE).unwrap(), vec![], info(), info(), "hello");
        assert_eq!(
            String::from_utf8(commit.dump()).unwrap(),
            format!("tree {}\nauthor {}\ncommitter {}\n\nhello", TREE, INFO, INFO)
        );
    }

    #[test]
    fn parse_with_parents() {
        let data = format!(
            "tree {}\nparent {}\nparent {}\nauthor {}\ncommitter {}\n\nmerge\n",
            TREE, PARENT, TREE, INFO, INFO
        );

        let commit = Commit::parse(data.as_bytes()).unwrap();
        assert_eq!(commit.tree().to_string(), TREE);
        assert_eq!(commit.parents().len(), 2);
        assert_eq!(commit.parents()[0].to_string(), PARENT);
        assert_eq!(commit.author().name(), "hans");
        assert_eq!(commit.committer().timestamp(), 1240178400);
        assert_eq!(commit.message(), b"merge\n");
        assert_eq!(commit.dump(), data.as_bytes());
    }

    #[test]
    fn extra_headers_round_trip() {
        let data = format!(
            "tree {}\nauthor {}\ncommitter {}\nencoding ISO-8859-1\ngpgsig -----BEGIN PGP SIGNATURE-----\n \n abcd\n -----END PGP SIGNATURE-----\n\nsigned\n",
            TREE, INFO, INFO
        );

        let commit = Commit::parse(data.as_bytes()).unwrap();
        assert_eq!(commit.extra_headers().len(), 2);
        assert_eq!(commit.extra_headers()[0].0, "encoding");
        assert_eq!(commit.extra_headers()[0].1, b"ISO-8859-1");
        assert_eq!(commit.extra_headers()[1].0, "gpgsig");
        assert_eq!(commit.dump(), data.as_bytes());
    }

    #[test]
    fn extra_headers_keep_their_place() {
        let data = format!(
            "tree {}\nmergetag object {}\nparent {}\ntree {}\nauthor {}\nx-early yes\ncommitter {}\n\nodd\n",
            TREE, PARENT, PARENT, PARENT, INFO, INFO
        );

        let commit = Commit::parse(data.as_bytes()).unwrap();
        assert_eq!(commit.tree().to_string(), TREE);
        assert_eq!(commit.parents().len(), 1);
        assert_eq!(commit.extra_headers().len(), 3);
        assert_eq!(commit.extra_headers()[1].0, "tree");
        assert_eq!(String::from_utf8(commit.dump()).unwrap(), data);
    }

    #[test]
    fn pushed_header_goes_last() {
        let data = format!("tree {}\nx-first 1\nauthor {}\ncommitter {}\n\nm", TREE, INFO, INFO);
        let mut commit = Commit::parse(data.as_bytes()).unwrap();
        commit.push_header("x-last", b"2");
        assert_eq!(
            String::from_utf8(commit.dump()).unwrap(),
            format!(
                "tree {}\nx-first 1\nauthor {}\ncommitter {}\nx-last 2\n\nm",
                TREE, INFO, INFO
            )
        );
    }

    #[test]
    fn negative_zero_zone_round_trips() {
        let data = format!(
            "tree {}\nauthor A <a@x> 1234567890 -0000\ncommitter {}\n\nzone\n",
            TREE, INFO
        );
        let commit = Commit::parse(data.as_bytes()).unwrap();
        assert_eq!(commit.author().tz_offset(), 0);
        assert_eq!(commit.dump(), data.as_bytes());
    }

    #[test]
    fn parse_without_message() {
        let data = format!("tree {}\nauthor {}\ncommitter {}\n", TREE, INFO, INFO);
        let commit = Commit::parse(data.as_bytes()).unwrap();
        assert_eq!(commit.message(), b"");
        assert_eq!(commit.dump(), data.as_bytes());
    }

    #[test]
    fn parse_missing_headers() {
        let data = format!("author {}\ncommitter {}\n\nx", INFO, INFO);
        match Commit::parse(data.as_bytes()).unwrap_err() {
            Error::CorruptObject(msg) => assert_eq!(msg, "commit has no `tree` header"),
            err => panic!("Unexpected error {:?}", err),
        }

        let data = format!("tree {}\ncommitter {}\n\nx", TREE, INFO);
        assert!(Commit::parse(data.as_bytes()).is_err());
    }

    #[test]
    fn parse_bad_tree_id() {
        let data = format!("tree 1234\nauthor {}\ncommitter {}\n\nx", INFO, INFO);
        match Commit::parse(data.as_bytes()).unwrap_err() {
            Error::ParseId(_) => (),
            err => panic!("Unexpected error {:?}", err),
        }
    }

    #[test]
    fn write_and_load() {
        let repo = TempRepo::new();
        let ctx = repo.context();

        let mut commit = Commit::new(
            Id::from_hex(TREE).unwrap(),
            vec![Id::from_hex(PARENT).unwrap()],
            info(),
            info(),
            "second\n",
        );
        let id = commit.write(ctx.objects()).unwrap();
        assert_eq!(commit.id(), Some(id));

        let loaded = Commit::load(ctx.objects(), &id).unwrap();
        assert_eq!(loaded, commit);
    }

    #[test]
    fn load_wrong_kind() {
        let repo = TempRepo::new();
        let ctx = repo.context();
        let id = ctx.objects().put(Kind::Blob, b"not a commit").unwrap();
        assert!(Commit::load(ctx.objects(), &id).is_err());
    }
}
