//! Cached domain records, drafts, and sparse patches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::{RecordId, TENANT_COLUMN};

/// One row of a cached list: a stable id plus open domain fields.
///
/// Serialized flat, so `{"id": "...", "brinco": "12"}` round-trips as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Server UUID, or a client UUID when created offline.
    pub id: RecordId,
    /// Domain fields, never containing `id`.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Builds a record, dropping any stray `id` entry from `fields`.
    pub fn new(id: RecordId, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self { id, fields }
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field as a string slice.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Sets one field, ignoring attempts to overwrite `id`.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        if field != "id" {
            self.fields.insert(field, value.into());
        }
    }

    /// Farm this record belongs to, if tagged.
    pub fn farm_id(&self) -> Option<&str> {
        self.get_str(TENANT_COLUMN)
    }

    /// Shallow-merges `other`'s fields over this record's.
    ///
    /// Fields missing from `other` are preserved.
    pub fn merge_from(&mut self, other: &Record) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }
}

/// Insert payload; the id is assigned when the draft is materialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDraft {
    /// Domain fields for the new record.
    pub fields: Map<String, Value>,
}

impl RecordDraft {
    /// Wraps a JSON object; non-object values yield an empty draft.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Materializes the draft with a freshly synthesized client UUID.
    pub fn into_record(self) -> Record {
        self.into_record_with_id(Uuid::new_v4())
    }

    /// Materializes the draft with a caller-chosen id.
    pub fn into_record_with_id(self, id: RecordId) -> Record {
        Record::new(id, self.fields)
    }
}

/// Sparse patch where every present field overwrites the record value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordPatch {
    /// Replacement fields.
    pub fields: Map<String, Value>,
}

impl RecordPatch {
    /// Wraps a JSON object; non-object values yield an empty patch.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => {
                fields.remove("id");
                Self { fields }
            }
            _ => Self::default(),
        }
    }

    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut Record) {
        for (k, v) in &self.fields {
            if k != "id" {
                rec.fields.insert(k.clone(), v.clone());
            }
        }
    }

    /// The patch expressed as a partial record with `id`, for list upserts.
    pub fn as_partial(&self, id: RecordId) -> Record {
        Record::new(id, self.fields.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_serializes_flat() {
        let id = Uuid::nil();
        let rec = Record::new(id, json!({"brinco": "12", "id": "ignored"}).as_object().cloned().unwrap_or_default());
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value, json!({"id": id.to_string(), "brinco": "12"}));

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn patch_never_touches_id() {
        let id = Uuid::new_v4();
        let mut rec = RecordDraft::from_value(json!({"nome": "Mimosa"})).into_record_with_id(id);
        RecordPatch::from_value(json!({"id": Uuid::nil().to_string(), "nome": "Estrela"})).apply_to(&mut rec);
        assert_eq!(rec.id, id);
        assert_eq!(rec.get_str("nome"), Some("Estrela"));
    }
}
