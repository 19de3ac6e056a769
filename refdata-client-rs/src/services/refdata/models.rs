//! Reference-data models
//!
//! Raw payloads as returned by the upstream service, and the shaped results
//! handed to consumers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One catalog entry, enough to resolve an entity by name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub id: String,

    pub name: String,

    /// Abbreviated form, such as a symbol or code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    pub alternate_names: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CatalogEntry {
    /// Primary name, short form and alternate names, in that order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.short_name.as_deref())
            .chain(self.alternate_names.iter().map(String::as_str))
    }
}

/// Full entity record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    pub alternate_names: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Free-form properties
    pub attributes: HashMap<String, serde_json::Value>,
}

/// One weighted match of an entity inside a group of the structured index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexMatch {
    pub entity_id: String,

    pub entity_name: String,

    /// Matched group of the index
    pub group: String,

    pub weight: f64,

    /// Term that matched, when the upstream reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
}

/// One narrative-text hit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSection {
    pub document_id: String,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,

    pub excerpt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// `/api/catalog` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogResponse {
    pub entries: Vec<CatalogEntry>,
}

/// `/api/index/search` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSearchResponse {
    pub total: Option<u64>,
    pub matches: Vec<IndexMatch>,
}

/// `/api/text/search` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSearchResponse {
    pub total: Option<u64>,
    pub sections: Vec<TextSection>,
}

/// Aggregate of every match of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub entity_id: String,
    pub entity_name: String,
    pub match_count: usize,
    pub total_weight: f64,
}

/// Shaped structured-index search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSearchResult {
    pub query: String,
    pub index: String,

    /// Matches reported upstream, before limiting
    pub total_matches: u64,

    pub matches: Vec<IndexMatch>,

    /// Sorted by cumulative weight, heaviest first
    pub entity_stats: Vec<EntityStats>,
}

/// Shaped narrative-text search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSearchResult {
    pub query: String,
    pub text: String,
    pub total_sections: u64,
    pub sections: Vec<TextSection>,
}
