use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    persist::{KvBackend, PersistResult},
    types::TimestampMs,
};

/// Canonical on-disk shape for every cached list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope<T> {
    pub items: Vec<T>,
    pub updated_at: TimestampMs,
}

impl<T> CacheEnvelope<T> {
    pub fn new(items: Vec<T>, updated_at: TimestampMs) -> Self {
        Self { items, updated_at }
    }
}

/// Decodes a cached list from any shape ever written.
///
/// Accepts the canonical `{items, updatedAt}` envelope, a bare array, and the
/// `{list: [...]}` wrapper; the last two report `updated_at == 0`.
pub fn decode_cached_list<T: DeserializeOwned>(raw: &[u8]) -> PersistResult<CacheEnvelope<T>> {
    let value: Value = serde_json::from_slice(raw)?;
    let (items, updated_at) = match value {
        Value::Array(items) => (Value::Array(items), 0),
        Value::Object(mut obj) => {
            if let Some(items) = obj.remove("items") {
                let updated_at = obj.get("updatedAt").and_then(Value::as_u64).unwrap_or(0);
                (items, updated_at)
            } else if let Some(list) = obj.remove("list") {
                (list, 0)
            } else {
                (Value::Array(Vec::new()), 0)
            }
        }
        Value::Null => (Value::Array(Vec::new()), 0),
        other => {
            return Err(crate::persist::PersistError::Message(format!(
                "unexpected cached list shape: {other}"
            )));
        }
    };
    let items: Vec<T> = serde_json::from_value(items)?;
    Ok(CacheEnvelope { items, updated_at })
}

/// Reads a cached list without needing mutable access to the backend.
pub fn read_list<T: DeserializeOwned, B: KvBackend + ?Sized>(
    backend: &B,
    key: &str,
) -> PersistResult<Option<CacheEnvelope<T>>> {
    match backend.get_raw(key)? {
        Some(raw) => Ok(Some(decode_cached_list(&raw)?)),
        None => Ok(None),
    }
}

/// Typed view over a [`KvBackend`].
pub struct KvStore<'a, B: KvBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: KvBackend + ?Sized> KvStore<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> PersistResult<Option<T>> {
        match self.backend.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> PersistResult<()> {
        let raw = serde_json::to_vec(value)?;
        self.backend.set_raw(key, &raw)
    }

    pub fn remove(&mut self, key: &str) -> PersistResult<bool> {
        self.backend.remove(key)
    }

    /// A missing key is "no data yet", not an error.
    pub fn load_list<T: DeserializeOwned>(&self, key: &str) -> PersistResult<Option<CacheEnvelope<T>>> {
        read_list(&*self.backend, key)
    }

    pub fn store_list<T: Serialize>(
        &mut self,
        key: &str,
        items: &[T],
        updated_at: TimestampMs,
    ) -> PersistResult<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Borrowed<'b, T> {
            items: &'b [T],
            updated_at: TimestampMs,
        }
        self.set(key, &Borrowed { items, updated_at })
    }
}
