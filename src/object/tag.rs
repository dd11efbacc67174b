use std::str;

use super::parse_utils::{header_lines, split_message, split_once};
use super::{Attribution, Id, Kind};
use crate::error::{Error, Result};

/// An annotated tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tag {
    object: Id,
    kind: Kind,
    name: String,
    tagger: Option<Attribution>,
    extra_headers: Vec<(String, Vec<u8>)>,
    message: Option<Vec<u8>>,
}

impl Tag {
    pub fn new<M: Into<Vec<u8>>>(
        object: Id,
        kind: Kind,
        name: &str,
        tagger: Option<Attribution>,
        message: M,
    ) -> Tag {
        Tag {
            object,
            kind,
            name: name.to_string(),
            tagger,
            extra_headers: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Tag> {
        let (headers, message) = split_message(data);
        let headers = match message {
            None => headers.strip_suffix(b"\n").unwrap_or(headers),
            Some(_) => headers,
        };

        let mut object: Option<Id> = None;
        let mut kind: Option<Kind> = None;
        let mut name: Option<String> = None;
        let mut tagger: Option<Attribution> = None;
        let mut extra_headers = Vec::new();

        for line in header_lines(headers) {
            let (key, value) = split_once(&line, &b' ');
            match key {
                b"object" if object.is_none() => object = Some(Id::from_hex(value)?),
                b"type" if kind.is_none() => {
                    kind = Some(Kind::from_name(value).ok_or_else(|| {
                        corrupt(format!(
                            "unknown target type `{}`",
                            String::from_utf8_lossy(value)
                        ))
                    })?)
                }
                b"tag" if name.is_none() => {
                    name = Some(
                        str::from_utf8(value)
                            .map_err(|_| corrupt("tag name is not UTF-8".to_string()))?
                            .to_string(),
                    )
                }
                b"tagger" if tagger.is_none() => {
                    tagger = Some(Attribution::parse(value).ok_or_else(|| {
                        corrupt(format!(
                            "malformed tagger `{}`",
                            String::from_utf8_lossy(value)
                        ))
                    })?)
                }
                _ => {
                    let key = str::from_utf8(key)
                        .map_err(|_| corrupt("tag header name is not UTF-8".to_string()))?;
                    extra_headers.push((key.to_string(), value.to_vec()));
                }
            }
        }

        Ok(Tag {
            object: object.ok_or_else(|| missing("object"))?,
            kind: kind.ok_or_else(|| missing("type"))?,
            name: name.ok_or_else(|| missing("tag"))?,
            tagger,
            extra_headers,
            message: message.map(|m| m.to_vec()),
        })
    }

    /// Render the tag in the form it is hashed and stored in.
    pub fn dump(&self) -> Vec<u8> {
        let mut data = format!(
            "object {}\ntype {}\ntag {}",
            self.object, self.kind, self.name
        )
        .into_bytes();

        if let Some(tagger) = &self.tagger {
            data.extend_from_slice(format!("\ntagger {}", tagger).as_bytes());
        }

        for (key, value) in &self.extra_headers {
            data.push(b'\n');
            data.extend_from_slice(key.as_bytes());
            data.push(b' ');
            data.extend_from_slice(value);
        }

        match &self.message {
            Some(message) => {
                data.extend_from_slice(b"\n\n");
                data.extend_from_slice(message);
            }
            None => data.push(b'\n'),
        }
        data
    }

    /// The id of the tagged object.
    pub fn object(&self) -> Id {
        self.object
    }

    /// The kind of the tagged object.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Attribution> {
        self.tagger.as_ref()
    }

    pub fn message(&self) -> &[u8] {
        self.message.as_deref().unwrap_or_default()
    }
}

fn corrupt(reason: String) -> Error {
    Error::CorruptObject(reason)
}

fn missing(header: &str) -> Error {
    corrupt(format!("tag has no `{}` header", header))
}
