use crate::collection::{Document, Update};
use crate::common::{join_all, Value};
use crate::dispatch::Dispatcher;
use crate::errors::DocrefResult;
use crate::reference::fetch::{fetch_many, fetch_one, RefValue};
use crate::reference::ReferenceDescriptor;
use indexmap::IndexMap;

/// Embed path to projected value, one entry per generated reference cache.
///
/// A scalar reference projects to one document, an id array to an array of
/// documents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheProjection {
    entries: IndexMap<String, Value>,
}

impl CacheProjection {
    pub fn new() -> Self {
        CacheProjection::default()
    }

    pub fn insert(&mut self, path: &str, value: Value) {
        self.entries.insert(path.to_string(), value);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Writes every entry into `document`, replacing whatever each path
    /// held before.
    pub fn merge_into(&self, document: &mut Document) -> DocrefResult<()> {
        for (path, value) in &self.entries {
            document.put(path.as_str(), value.clone())?;
        }
        Ok(())
    }

    /// An update setting every entry.
    pub fn to_update(&self) -> Update {
        self.entries
            .iter()
            .fold(Update::new(), |update, (path, value)| {
                update.set(path, value.clone())
            })
    }
}

/// Copies `properties` of `source` into a new document. Missing properties
/// are left out.
pub fn project(source: &Document, properties: &[String]) -> DocrefResult<Document> {
    let mut projected = Document::new();
    for property in properties {
        let value = source.get(property)?;
        if !value.is_null() {
            projected.put(property.as_str(), value)?;
        }
    }
    Ok(projected)
}

/// Computes the reference caches of `document`.
///
/// Only caching descriptors whose reference is set on the document take
/// part. Their fetches run concurrently; if any fails, no projection is
/// returned at all. A scalar reference whose target does not exist projects
/// to `null`.
pub fn generate(
    dispatcher: &Dispatcher,
    descriptors: &[ReferenceDescriptor],
    document: &Document,
) -> DocrefResult<CacheProjection> {
    let mut targets = Vec::new();
    for descriptor in descriptors.iter().filter(|d| d.has_cache()) {
        let value = RefValue::of(document, &descriptor.ref_id)?;
        if !value.is_absent() {
            targets.push((descriptor, value));
        }
    }

    if targets.is_empty() {
        return Ok(CacheProjection::new());
    }

    let tasks: Vec<_> = targets
        .iter()
        .map(|(descriptor, value)| move || project_reference(dispatcher, descriptor, value))
        .collect();
    let values = join_all(tasks)?;

    let mut projection = CacheProjection::new();
    for ((descriptor, _), value) in targets.iter().zip(values) {
        if let Some(under) = descriptor.cache_under() {
            projection.insert(under, value);
        }
    }
    log::debug!(
        "Generated {} reference cache(s) for document {:?}",
        projection.len(),
        document.id()
    );
    Ok(projection)
}

fn project_reference(
    dispatcher: &Dispatcher,
    descriptor: &ReferenceDescriptor,
    value: &RefValue,
) -> DocrefResult<Value> {
    let properties = descriptor.cache_properties();
    match value {
        RefValue::Absent => Ok(Value::Null),
        RefValue::One(id) => match fetch_one(dispatcher, descriptor, id)? {
            Some(referenced) => Ok(Value::Document(project(&referenced, properties)?)),
            None => {
                log::warn!(
                    "{} {} referenced by {} does not exist, caching null",
                    descriptor.ref_entity,
                    id,
                    descriptor.ref_id
                );
                Ok(Value::Null)
            }
        },
        RefValue::Many(ids) => {
            let projected = fetch_many(dispatcher, descriptor, ids)?
                .iter()
                .map(|referenced| project(referenced, properties).map(Value::Document))
                .collect::<DocrefResult<Vec<_>>>()?;
            Ok(Value::Array(projected))
        }
    }
}
