//! Content records served by the API.
//!
//! Each record type is a flat set of optional fields stored as one JSON
//! document. [`Model`] ties a record type to its collection name and a
//! static field schema; the schema is what lets the equality filter cast
//! query-string values (`?isFeatured=true`) to the stored JSON type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// JSON type of a schema field, used to cast filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    Number,
    List,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

/// A record type stored in its own collection.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name, also used as the route segment.
    const COLLECTION: &'static str;

    /// Declared fields, by their JSON names.
    const FIELDS: &'static [Field];

    fn field(name: &str) -> Option<&'static Field> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
}

/// A stored record together with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<M> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub data: M,
}

// Featured projects carry an image; the rest are listed without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub tech: Vec<String>,
}

impl Model for Project {
    const COLLECTION: &'static str = "projects";
    const FIELDS: &'static [Field] = &[
        field("title", FieldKind::String),
        field("description", FieldKind::String),
        field("url", FieldKind::String),
        field("imageUrl", FieldKind::String),
        field("imageId", FieldKind::String),
        field("isFeatured", FieldKind::Bool),
        field("tech", FieldKind::List),
    ];
}

/// A blog-style post. `introduction` and `intro` are both kept until it is
/// settled whether they mean different things.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    /// Free-text date as written by the author, not parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

impl Model for Thought {
    const COLLECTION: &'static str = "thoughts";
    const FIELDS: &'static [Field] = &[
        field("date", FieldKind::String),
        field("imageUrl", FieldKind::String),
        field("title", FieldKind::String),
        field("introduction", FieldKind::String),
        field("url", FieldKind::String),
        field("intro", FieldKind::String),
        field("isFeatured", FieldKind::Bool),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Items are not constrained to any shape.
    #[serde(default)]
    pub skill_items: Vec<serde_json::Value>,
}

impl Model for Skill {
    const COLLECTION: &'static str = "skills";
    const FIELDS: &'static [Field] = &[
        field("title", FieldKind::String),
        field("skillItems", FieldKind::List),
    ];
}

/// Contact form submission. No route reads or writes it yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Model for Contact {
    const COLLECTION: &'static str = "contacts";
    const FIELDS: &'static [Field] = &[
        field("name", FieldKind::String),
        field("email", FieldKind::String),
        field("telephone", FieldKind::Number),
        field("message", FieldKind::String),
    ];
}
