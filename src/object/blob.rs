use tracing::trace;

use super::{Context, Id, Kind};
use crate::codec::Value;
use crate::error::Result;
use crate::path::FileMode;

/// A leaf of the object graph.
///
/// The raw bytes are read from the object store on first access and decoded
/// into a [`Value`] by the codec registered for the blob's path. Both are
/// cached until the blob is given new content.
#[derive(Clone, Debug)]
pub struct Blob {
    ctx: Context,
    id: Option<Id>,
    path: String,
    mode: FileMode,
    data: Option<Vec<u8>>,
    value: Option<Value>,
    modified: bool,
}

impl Blob {
    /// A blob that is known by id only. Nothing is read until its content
    /// is requested.
    pub(crate) fn unloaded(ctx: Context, path: String, mode: FileMode, id: Id) -> Blob {
        Blob {
            ctx,
            id: Some(id),
            path,
            mode,
            data: None,
            value: None,
            modified: false,
        }
    }

    /// A blob whose stored bytes have already been read.
    pub(crate) fn loaded(ctx: Context, path: String, id: Id, data: Vec<u8>) -> Blob {
        Blob {
            data: Some(data),
            ..Blob::unloaded(ctx, path, FileMode::Normal, id)
        }
    }

    /// A new blob holding `value`, encoded for `path`.
    pub(crate) fn with_value(ctx: Context, path: String, value: &Value) -> Result<Blob> {
        let data = ctx.codecs.encode(&path, value)?;
        Ok(Blob {
            ctx,
            id: None,
            path,
            mode: FileMode::Normal,
            data: Some(data),
            value: None,
            modified: true,
        })
    }

    /// Returns the id assigned by the last load or write, if any.
    pub fn id(&self) -> Option<Id> {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Change the file mode. Only blob modes are meaningful here.
    pub fn set_mode(&mut self, mode: FileMode) {
        if mode != self.mode {
            self.mode = mode;
            self.modified = true;
        }
    }

    /// True if this blob has never been written or has changed since.
    pub fn is_modified(&self) -> bool {
        self.id.is_none() || self.modified
    }

    /// The stored bytes.
    pub fn data(&mut self) -> Result<&[u8]> {
        if self.data.is_none() {
            self.load()?;
        }
        Ok(self.data.as_deref().unwrap_or_default())
    }

    /// The decoded value, decoded on first access.
    pub fn value(&mut self) -> Result<&Value> {
        let value = match self.value.take() {
            Some(value) => value,
            None => {
                if self.data.is_none() {
                    self.load()?;
                }
                let data = self.data.as_deref().unwrap_or_default();
                self.ctx.codecs.decode(&self.path, data)?
            }
        };
        Ok(self.value.insert(value))
    }

    /// Replace the content with `value`, encoded by the codec for this path.
    pub fn set_value(&mut self, value: &Value) -> Result<()> {
        let data = self.ctx.codecs.encode(&self.path, value)?;
        self.set_data(data);
        Ok(())
    }

    /// Replace the raw content.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
        self.value = None;
        self.id = None;
        self.modified = true;
    }

    /// Persist the blob if it is modified and return its id.
    pub fn write(&mut self) -> Result<Id> {
        if let (false, Some(id)) = (self.is_modified(), self.id) {
            return Ok(id);
        }

        let id = {
            let data = self.data.as_deref().unwrap_or_default();
            self.ctx.objects.put(Kind::Blob, data)?
        };

        trace!(path = %self.path, %id, "wrote blob");
        self.id = Some(id);
        self.modified = false;
        Ok(id)
    }

    /// Move the blob to a new path. The cached value is dropped because a
    /// different codec may apply.
    pub(crate) fn set_path(&mut self, path: String) {
        if path != self.path {
            self.path = path;
            self.value = None;
        }
    }

    fn load(&mut self) -> Result<()> {
        if let Some(id) = self.id {
            self.data = Some(self.ctx.read(&id, Kind::Blob)?);
        }
        Ok(())
    }
}
