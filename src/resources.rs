//! Museum content resources served by the collection API.
//!
//! Each resource names its endpoint, the collection fields its responses use,
//! and where optimistic inserts land.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{CollectionItem, InsertPosition, ItemId, ResponseNormalizer};

/// Generic collection field accepted by every resource.
const GENERIC_FIELD: &str = "items";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Museums,
    Stories,
    Gallery,
}

/// Static description of how a resource is fetched and mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub endpoint: String,
    /// Checked in order by the normalizer.
    pub collection_fields: Vec<String>,
    pub insert_position: InsertPosition,
}

impl ResourceDescriptor {
    pub fn new<I, S>(endpoint: impl Into<String>, fields: I, insert_position: InsertPosition) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoint: endpoint.into(),
            collection_fields: fields.into_iter().map(Into::into).collect(),
            insert_position,
        }
    }

    pub fn normalizer(&self) -> ResponseNormalizer {
        ResponseNormalizer::new(self.collection_fields.iter().cloned())
    }
}

impl ResourceKind {
    pub fn descriptor(self) -> ResourceDescriptor {
        match self {
            Self::Museums => ResourceDescriptor::new(
                "/api/museums",
                ["museums", GENERIC_FIELD],
                InsertPosition::Back,
            ),
            Self::Stories => ResourceDescriptor::new(
                "/api/stories",
                ["stories", GENERIC_FIELD],
                InsertPosition::Front,
            ),
            Self::Gallery => ResourceDescriptor::new(
                "/api/media",
                ["mediaItems", GENERIC_FIELD],
                InsertPosition::Front,
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Museums => "museums",
            Self::Stories => "stories",
            Self::Gallery => "gallery",
        }
    }
}

/// A typed collection item bound to its resource.
pub trait Resource: CollectionItem + DeserializeOwned + Serialize {
    const KIND: ResourceKind;

    fn descriptor() -> ResourceDescriptor {
        Self::KIND.descriptor()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Museum {
    pub id: ItemId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionItem for Museum {
    fn item_id(&self) -> Option<ItemId> {
        Some(self.id.clone())
    }
}

impl Resource for Museum {
    const KIND: ResourceKind = ResourceKind::Museums;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: ItemId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub museum_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionItem for Story {
    fn item_id(&self) -> Option<ItemId> {
        Some(self.id.clone())
    }
}

impl Resource for Story {
    const KIND: ResourceKind = ResourceKind::Stories;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: ItemId,
    pub url: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub museum_id: Option<ItemId>,
    #[serde(default)]
    pub approved: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionItem for MediaItem {
    fn item_id(&self) -> Option<ItemId> {
        Some(self.id.clone())
    }
}

impl Resource for MediaItem {
    const KIND: ResourceKind = ResourceKind::Gallery;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn insert_positions_follow_resource_semantics() {
        assert_eq!(
            ResourceKind::Museums.descriptor().insert_position,
            InsertPosition::Back
        );
        assert_eq!(
            ResourceKind::Stories.descriptor().insert_position,
            InsertPosition::Front
        );
        assert_eq!(
            ResourceKind::Gallery.descriptor().insert_position,
            InsertPosition::Front
        );
    }

    #[test]
    fn gallery_normalizer_recognises_media_items() {
        let normalizer = MediaItem::descriptor().normalizer();
        let raw = json!({"mediaItems": [{"id": 1, "url": "/a.jpg"}], "total": 5});
        let normalized = normalizer.normalize_as::<MediaItem>(&raw);
        assert_eq!(normalized.collection.items.len(), 1);
        assert_eq!(normalized.collection.total, 5);
        assert_eq!(normalized.collection.items[0].url, "/a.jpg");
    }

    #[test]
    fn story_decodes_camel_case_and_keeps_unknown_fields() {
        let story: Story = serde_json::from_value(json!({
            "id": "s-1",
            "title": "Bronze Age",
            "museumId": 4,
            "tags": ["history"],
            "approved": true,
            "coverImage": "/c.png"
        }))
        .expect("story");

        assert_eq!(story.item_id(), Some(ItemId::from("s-1")));
        assert_eq!(story.museum_id, Some(ItemId::Int(4)));
        assert!(story.approved);
        assert!(!story.featured);
        assert_eq!(story.extra.get("coverImage"), Some(&json!("/c.png")));
    }

    #[test]
    fn museum_type_field_maps_to_kind() {
        let museum: Museum =
            serde_json::from_value(json!({"id": 2, "name": "Louvre", "type": "art"}))
                .expect("museum");
        assert_eq!(museum.kind.as_deref(), Some("art"));
        let back = serde_json::to_value(&museum).expect("serialize");
        assert_eq!(back["type"], "art");
    }
}
