//! Response normalization.
//!
//! The backend answers collection requests in several shapes. Each shape is
//! tried in a fixed priority order and the winning variant is reported as a
//! [`ResponseShape`], so a drifting API contract shows up in logs and metrics.

use metrics::counter;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::item::NormalizedCollection;

const METRIC_NORMALIZE_TOTAL: &str = "vitrine_normalize_total";

/// Field that carries the server-reported total.
const TOTAL_FIELD: &str = "total";

/// Which rule produced a normalized collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// The payload was a bare array.
    Sequence,
    /// The payload held one of the recognised collection fields.
    Named { field: String },
    /// No recognised field; the first array-valued field was used instead.
    Fallback { field: String },
    /// No array anywhere, or a null payload.
    Empty,
}

impl ResponseShape {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Named { .. } => "named",
            Self::Fallback { .. } => "fallback",
            Self::Empty => "empty",
        }
    }
}

/// Result of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub collection: NormalizedCollection<T>,
    pub shape: ResponseShape,
}

/// Converts raw JSON payloads into [`NormalizedCollection`]s.
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    collection_fields: Vec<String>,
}

impl ResponseNormalizer {
    /// `collection_fields` are checked in order; the first present array wins.
    pub fn new<I, S>(collection_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collection_fields: collection_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn collection_fields(&self) -> &[String] {
        &self.collection_fields
    }

    /// Normalize `raw` into JSON items. Never fails.
    pub fn normalize(&self, raw: &Value) -> Normalized<Value> {
        let normalized = self.classify(raw);
        self.observe(raw, &normalized.shape);
        normalized
    }

    /// Normalize and decode items into `T`.
    ///
    /// Items that do not decode are skipped with a warning; `total` still
    /// reflects what the server reported (or the raw array length).
    pub fn normalize_as<T: DeserializeOwned>(&self, raw: &Value) -> Normalized<T> {
        let Normalized { collection, shape } = self.normalize(raw);
        let mut items = Vec::with_capacity(collection.items.len());
        for (index, item) in collection.items.into_iter().enumerate() {
            match serde_json::from_value::<T>(item) {
                Ok(decoded) => items.push(decoded),
                Err(err) => warn!(
                    index,
                    error = %err,
                    shape = shape.as_label(),
                    "Skipping collection item that failed to decode"
                ),
            }
        }
        Normalized {
            collection: NormalizedCollection::new(items, collection.total),
            shape,
        }
    }

    fn classify(&self, raw: &Value) -> Normalized<Value> {
        match raw {
            Value::Array(items) => Normalized {
                collection: from_array(items.clone()),
                shape: ResponseShape::Sequence,
            },
            Value::Object(object) => self
                .named(object)
                .or_else(|| first_array(object))
                .unwrap_or_else(empty),
            _ => empty(),
        }
    }

    fn named(&self, object: &Map<String, Value>) -> Option<Normalized<Value>> {
        self.collection_fields.iter().find_map(|field| {
            let items = object.get(field)?.as_array()?.clone();
            let total = object
                .get(TOTAL_FIELD)
                .and_then(numeric_total)
                .unwrap_or(items.len() as u64);
            Some(Normalized {
                collection: NormalizedCollection::new(items, total),
                shape: ResponseShape::Named {
                    field: field.clone(),
                },
            })
        })
    }

    fn observe(&self, raw: &Value, shape: &ResponseShape) {
        counter!(METRIC_NORMALIZE_TOTAL, "shape" => shape.as_label()).increment(1);

        match shape {
            ResponseShape::Fallback { field } => warn!(
                field = %field,
                expected = ?self.collection_fields,
                "Response had no recognised collection field; used first array field"
            ),
            ResponseShape::Empty if !raw.is_null() => warn!(
                expected = ?self.collection_fields,
                payload_kind = json_kind(raw),
                "Response contained no collection; treating as empty"
            ),
            ResponseShape::Empty => debug!("Null response normalized to empty collection"),
            ResponseShape::Sequence | ResponseShape::Named { .. } => {}
        }
    }
}

fn from_array(items: Vec<Value>) -> NormalizedCollection<Value> {
    let total = items.len() as u64;
    NormalizedCollection::new(items, total)
}

fn first_array(object: &Map<String, Value>) -> Option<Normalized<Value>> {
    object.iter().find_map(|(field, value)| {
        let items = value.as_array()?.clone();
        Some(Normalized {
            collection: from_array(items),
            shape: ResponseShape::Fallback {
                field: field.clone(),
            },
        })
    })
}

fn empty() -> Normalized<Value> {
    Normalized {
        collection: NormalizedCollection::empty(),
        shape: ResponseShape::Empty,
    }
}

/// Non-negative numeric totals only; fractional values are truncated.
fn numeric_total(value: &Value) -> Option<u64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(total) = number.as_u64() {
        return Some(total);
    }
    number
        .as_f64()
        .filter(|total| total.is_finite() && *total >= 0.0)
        .map(|total| total as u64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
