//! Reproductive event records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

/// Kind of reproductive event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// Artificial insemination.
    #[serde(alias = "ia")]
    Ia,
    /// Calving.
    #[serde(alias = "parto")]
    Parto,
    /// Dry-off.
    #[serde(alias = "secagem")]
    Secagem,
    /// Pregnancy diagnosis.
    #[serde(alias = "dg")]
    Dg,
    /// Abortion.
    #[serde(alias = "aborto")]
    Aborto,
}

/// One dated event for one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReproEvent {
    #[serde(alias = "animal_id")]
    pub animal_id: String,
    #[serde(rename = "type", alias = "tipo")]
    pub event_type: EventType,
    #[serde(
        alias = "data_evento",
        alias = "event_date",
        deserialize_with = "super::date::deserialize_date"
    )]
    pub event_date: NaiveDate,
    #[serde(default)]
    pub meta: Value,
}

impl ReproEvent {
    pub fn new(animal_id: impl Into<String>, event_type: EventType, event_date: NaiveDate) -> Self {
        Self {
            animal_id: animal_id.into(),
            event_type,
            event_date,
            meta: Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    /// Reads an event out of a cached `eventos` row.
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record.fields.clone()))
    }

    /// Diagnosis outcome for `DG` events: `Some(true)` when pregnant.
    pub fn diagnosis_positive(&self) -> Option<bool> {
        if self.event_type != EventType::Dg {
            return None;
        }
        for key in ["prenhe", "pregnant"] {
            if let Some(flag) = self.meta.get(key).and_then(Value::as_bool) {
                return Some(flag);
            }
        }
        for key in ["resultado", "result"] {
            if let Some(text) = self.meta.get(key).and_then(Value::as_str) {
                let text = text.trim().to_ascii_lowercase();
                if text.starts_with("pos") || text == "prenhe" {
                    return Some(true);
                }
                if text.starts_with("neg") || text == "vazia" {
                    return Some(false);
                }
            }
        }
        None
    }
}
