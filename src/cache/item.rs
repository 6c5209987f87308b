//! Collection item identity and the normalized collection shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a collection item, compared by value.
///
/// Numeric and textual ids are distinct: `1` and `"1"` never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl ItemId {
    /// Read an id out of a JSON value (integer or string).
    ///
    /// Integral floats such as `1.0` read as `Int`. Fractional numbers and
    /// integers outside the `i64` range are not usable ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().and_then(integral_f64))
                .map(Self::Int),
            Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }
}

fn integral_f64(value: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; the exclusive bound is 2^63.
    const UPPER: f64 = 9_223_372_036_854_775_808.0;
    (value.fract() == 0.0 && value >= i64::MIN as f64 && value < UPPER).then_some(value as i64)
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// An entity that can live in a [`NormalizedCollection`].
pub trait CollectionItem: Clone + Send + Sync + 'static {
    /// Items without an id never match an upsert or removal.
    fn item_id(&self) -> Option<ItemId>;
}

impl CollectionItem for Value {
    fn item_id(&self) -> Option<ItemId> {
        self.get("id").and_then(ItemId::from_json)
    }
}

/// Uniform `{items, total}` shape produced from any backend response.
///
/// `total` may exceed `items.len()` when the server reports items outside the
/// materialized page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedCollection<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> NormalizedCollection<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// Documented empty state: no items, zero total.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for NormalizedCollection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: CollectionItem> NormalizedCollection<T> {
    pub(crate) fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.item_id().as_ref() == Some(id))
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.position_of(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_ids_are_read_by_value() {
        assert_eq!(json!({"id": 7}).item_id(), Some(ItemId::Int(7)));
        assert_eq!(json!({"id": "abc"}).item_id(), Some(ItemId::from("abc")));
        assert_eq!(json!({"id": null}).item_id(), None);
        assert_eq!(json!({"name": "no id"}).item_id(), None);
        assert_ne!(ItemId::Int(1), ItemId::from("1"));
    }

    #[test]
    fn integral_float_ids_match_integer_ids() {
        assert_eq!(json!({"id": 1.0}).item_id(), Some(ItemId::Int(1)));
        assert_eq!(json!({"id": -3.0}).item_id(), Some(ItemId::Int(-3)));
        assert_eq!(json!({"id": 1.5}).item_id(), None);
        assert_eq!(json!({"id": u64::MAX}).item_id(), None);

        let collection = NormalizedCollection::new(vec![json!({"id": 4.0})], 1);
        assert!(collection.contains(&ItemId::Int(4)));
    }

    #[test]
    fn item_id_deserializes_untagged() {
        let ids: Vec<ItemId> = serde_json::from_str(r#"[1, "two"]"#).expect("ids");
        assert_eq!(ids, vec![ItemId::Int(1), ItemId::from("two")]);
    }
}
