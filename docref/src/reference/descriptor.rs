use crate::common::DOC_ID;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

fn default_remote_key() -> String {
    DOC_ID.to_string()
}

/// Which remote fields to embed, and where.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSpec {
    /// Local path the projection is written to, e.g. `cache.category`.
    pub under: String,
    /// Remote fields copied into the projection, in order.
    pub properties: Vec<String>,
}

impl CacheSpec {
    pub fn new(under: &str, properties: &[&str]) -> Self {
        CacheSpec {
            under: under.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
        }
        .normalized()
    }

    /// Drops repeated properties, keeping the first occurrence.
    pub fn normalized(self) -> Self {
        CacheSpec {
            under: self.under,
            properties: self.properties.into_iter().unique().collect(),
        }
    }
}

/// Declares that the field `ref_id` of an owning document holds the id, or
/// an array of ids, of documents of `ref_entity`.
///
/// With a [CacheSpec], the listed properties of the referenced documents are
/// also embedded into the owning document at write time.
///
/// Descriptors load from configuration JSON:
///
/// ```ignore
/// let descriptor: ReferenceDescriptor = serde_json::from_str(r#"{
///     "refId": "categoryId",
///     "refEntity": "Category",
///     "cache": { "under": "cache.category", "properties": ["name"] }
/// }"#)?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDescriptor {
    pub ref_id: String,
    pub ref_entity: String,
    /// Field of the referenced documents the stored ids point at.
    #[serde(default = "default_remote_key")]
    pub remote_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSpec>,
}

impl ReferenceDescriptor {
    pub fn new(ref_id: &str, ref_entity: &str) -> Self {
        ReferenceDescriptor {
            ref_id: ref_id.to_string(),
            ref_entity: ref_entity.to_string(),
            remote_key: default_remote_key(),
            cache: None,
        }
    }

    pub fn cache(mut self, under: &str, properties: &[&str]) -> Self {
        self.cache = Some(CacheSpec::new(under, properties));
        self
    }

    pub fn remote_key(mut self, remote_key: &str) -> Self {
        self.remote_key = remote_key.to_string();
        self
    }

    /// Whether this descriptor embeds anything. A cache without
    /// properties counts as none.
    pub fn has_cache(&self) -> bool {
        self.cache
            .as_ref()
            .map(|cache| !cache.properties.is_empty())
            .unwrap_or(false)
    }

    pub fn cache_under(&self) -> Option<&str> {
        self.cache.as_ref().map(|cache| cache.under.as_str())
    }

    pub fn cache_properties(&self) -> &[String] {
        self.cache
            .as_ref()
            .map(|cache| cache.properties.as_slice())
            .unwrap_or(&[])
    }
}

/// A per-query request to attach the document(s) referenced by `ref_id`
/// under `alias`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandRequest {
    pub ref_id: String,
    #[serde(rename = "as")]
    pub alias: String,
}

impl ExpandRequest {
    pub fn new(ref_id: &str, alias: &str) -> Self {
        ExpandRequest {
            ref_id: ref_id.to_string(),
            alias: alias.to_string(),
        }
    }
}
