use crate::collection::Document;
use crate::common::{SortOrder, Value, DOC_ID};
use crate::errors::DocrefResult;
use crate::filter::Filter;
use std::cmp::Ordering;
use std::fmt::Display;

/// A stage of an aggregation pipeline, applied in order.
#[derive(Clone, Debug)]
pub enum AggregateStage {
    /// Keep documents matching the filter.
    Match(Filter),
    /// Order by the given keys; earlier keys take precedence.
    Sort(Vec<(String, SortOrder)>),
    Skip(u64),
    Limit(u64),
    /// Keep only the listed fields (plus `_id`).
    Project(Vec<String>),
    /// Replace the stream with a single document `{ <field>: <count> }`.
    Count(String),
}

impl Display for AggregateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateStage::Match(filter) => write!(f, "$match {}", filter),
            AggregateStage::Sort(keys) => write!(f, "$sort {:?}", keys),
            AggregateStage::Skip(n) => write!(f, "$skip {}", n),
            AggregateStage::Limit(n) => write!(f, "$limit {}", n),
            AggregateStage::Project(fields) => write!(f, "$project {:?}", fields),
            AggregateStage::Count(field) => write!(f, "$count {}", field),
        }
    }
}

/// Runs `pipeline` over `docs`.
pub fn run_pipeline(docs: Vec<Document>, pipeline: &[AggregateStage]) -> DocrefResult<Vec<Document>> {
    let mut docs = docs;
    for stage in pipeline {
        docs = match stage {
            AggregateStage::Match(filter) => {
                let mut matched = Vec::with_capacity(docs.len());
                for doc in docs {
                    if filter.apply(&doc)? {
                        matched.push(doc);
                    }
                }
                matched
            }
            AggregateStage::Sort(keys) => sort_documents(docs, keys),
            AggregateStage::Skip(n) => docs.into_iter().skip(*n as usize).collect(),
            AggregateStage::Limit(n) => docs.into_iter().take(*n as usize).collect(),
            AggregateStage::Project(fields) => docs
                .iter()
                .map(|doc| project_document(doc, fields))
                .collect::<DocrefResult<Vec<_>>>()?,
            AggregateStage::Count(field) => {
                let mut counted = Document::new();
                counted.put(field.as_str(), docs.len())?;
                vec![counted]
            }
        };
    }
    Ok(docs)
}

/// Stable sort by `keys`. Missing fields sort as null.
pub(crate) fn sort_documents(mut docs: Vec<Document>, keys: &[(String, SortOrder)]) -> Vec<Document> {
    if keys.is_empty() {
        return docs;
    }

    docs.sort_by(|a, b| {
        for (field, order) in keys {
            let left = a.get(field).unwrap_or(Value::Null);
            let right = b.get(field).unwrap_or(Value::Null);
            let ordering = match order {
                SortOrder::Ascending => left.cmp(&right),
                SortOrder::Descending => right.cmp(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    docs
}

pub(crate) fn project_document(doc: &Document, fields: &[String]) -> DocrefResult<Document> {
    let mut projected = Document::new();
    if let Some(id) = doc.id() {
        projected.put(DOC_ID, id.clone())?;
    }
    for field in fields {
        let value = doc.get(field)?;
        if !value.is_null() {
            projected.put(field.as_str(), value)?;
        }
    }
    Ok(projected)
}
