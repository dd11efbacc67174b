//! Value codecs chosen by path suffix.
//!
//! A blob's raw bytes are turned into a [`Value`] by the codec registered for
//! the extension of the blob's path. Paths without a registered extension use
//! the identity codec, which hands back the bytes untouched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Map;

use crate::error::{Error, Result};

/// The decoded payload of a blob.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Raw bytes, as produced by the identity codec.
    Bytes(Vec<u8>),

    /// Structured data, as produced by the JSON and YAML codecs.
    Data(serde_json::Value),
}

impl Value {
    /// Returns the raw bytes, if this is a `Bytes` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::Data(_) => None,
        }
    }

    /// Returns the bytes as a string slice if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the structured data, if this is a `Data` value.
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Bytes(_) => None,
            Value::Data(data) => Some(data),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Bytes(s.into_bytes())
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Value {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Value {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Value {
        Value::Data(data)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == Some(other.as_bytes())
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == Some(other.as_bytes())
    }
}

/// Converts between a blob's stored bytes and its [`Value`].
pub trait Codec: Send + Sync {
    fn decode(&self, path: &str, data: &[u8]) -> Result<Value>;

    fn encode(&self, path: &str, value: &Value) -> Result<Vec<u8>>;
}

/// Passes bytes through unchanged. Structured values are written as
/// canonical JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Codec for Identity {
    fn decode(&self, _path: &str, data: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(data.to_vec()))
    }

    fn encode(&self, path: &str, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::Data(_) => Json.encode(path, value),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Json;

impl Codec for Json {
    fn decode(&self, path: &str, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data)
            .map(Value::Data)
            .map_err(|err| codec_error(path, err))
    }

    fn encode(&self, path: &str, value: &Value) -> Result<Vec<u8>> {
        let data = structured(path, value)?;
        let mut out =
            serde_json::to_vec_pretty(&canonical(&data)).map_err(|err| codec_error(path, err))?;
        out.push(b'\n');
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Yaml;

impl Codec for Yaml {
    fn decode(&self, path: &str, data: &[u8]) -> Result<Value> {
        serde_yaml::from_slice::<serde_json::Value>(data)
            .map(Value::Data)
            .map_err(|err| codec_error(path, err))
    }

    fn encode(&self, path: &str, value: &Value) -> Result<Vec<u8>> {
        let data = structured(path, value)?;
        serde_yaml::to_string(&canonical(&data))
            .map(String::into_bytes)
            .map_err(|err| codec_error(path, err))
    }
}

/// Byte values stored under a structured extension are parsed first so that
/// the stored form is always canonical.
fn structured(path: &str, value: &Value) -> Result<serde_json::Value> {
    match value {
        Value::Data(data) => Ok(data.clone()),
        Value::Bytes(bytes) => serde_yaml::from_slice::<serde_json::Value>(bytes)
            .map_err(|err| codec_error(path, err)),
    }
}

fn codec_error<E>(path: &str, err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Codec {
        path: path.to_string(),
        source: Box::new(err),
    }
}

/// Returns a copy of `value` with every object's keys in sorted order, so
/// that equal data always serializes to identical bytes.
pub fn canonical(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonical).collect())
        }
        other => other.clone(),
    }
}

/// Maps path extensions to codecs.
#[derive(Clone)]
pub struct Registry {
    codecs: HashMap<String, Arc<dyn Codec>>,
    default: Arc<dyn Codec>,
}

impl Registry {
    /// A registry that only knows the identity codec.
    pub fn new() -> Registry {
        Registry {
            codecs: HashMap::new(),
            default: Arc::new(Identity),
        }
    }

    /// A registry with JSON (`.json`) and YAML (`.yml`, `.yaml`) codecs.
    pub fn standard() -> Registry {
        let mut registry = Registry::new();
        registry.register("json", Json);
        registry.register("yml", Yaml);
        registry.register("yaml", Yaml);
        registry
    }

    /// Register `codec` for paths ending in `.{extension}`.
    pub fn register<C: Codec + 'static>(&mut self, extension: &str, codec: C) {
        self.codecs
            .insert(extension.trim_start_matches('.').to_string(), Arc::new(codec));
    }

    /// Find the codec for `path`, falling back to the identity codec.
    pub fn lookup(&self, path: &str) -> &dyn Codec {
        let name = path.rsplit('/').next().unwrap_or(path);
        name.rsplit_once('.')
            .and_then(|(_, ext)| self.codecs.get(ext))
            .unwrap_or(&self.default)
            .as_ref()
    }

    pub fn decode(&self, path: &str, data: &[u8]) -> Result<Value> {
        self.lookup(path).decode(path, data)
    }

    pub fn encode(&self, path: &str, value: &Value) -> Result<Vec<u8>> {
        self.lookup(path).encode(path, value)
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::standard()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<&String> = self.codecs.keys().collect();
        extensions.sort();
        f.debug_struct("Registry")
            .field("extensions", &extensions)
            .finish()
    }
}
