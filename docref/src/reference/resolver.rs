use crate::collection::Document;
use crate::common::{join_all, Value};
use crate::dispatch::Dispatcher;
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::reference::fetch::{fetch_many, fetch_one, index_by_key, RefValue};
use crate::reference::{ExpandRequest, ReferenceDescriptor};
use indexmap::{IndexMap, IndexSet};

/// The result of a find, as handed to [resolve].
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    One(Option<Document>),
    Many(Vec<Document>),
}

/// Expands the requested references of `result`.
///
/// Every requested `ref_id` must have a descriptor, otherwise the call fails
/// with a configuration error before anything is fetched. An empty request
/// list returns `result` as is without dispatching.
///
/// A single document gets one fetch per request: `findMany` for an id array,
/// `findById` for a single id. A list of documents gets one `findMany` per
/// distinct `ref_id` over the union of all ids, and the fetched documents
/// are then handed back to the items that point at them. All fetches of
/// one call run concurrently and any failure fails the whole call.
///
/// Aliases receive a document, an array of documents or `null` when the
/// reference is missing or dangling.
pub fn resolve(
    dispatcher: &Dispatcher,
    result: QueryResult,
    requests: &[ExpandRequest],
    descriptors: &[ReferenceDescriptor],
) -> DocrefResult<QueryResult> {
    if requests.is_empty() {
        return Ok(result);
    }

    let targets = requests
        .iter()
        .map(|request| find_descriptor(descriptors, request).map(|d| (request, d)))
        .collect::<DocrefResult<Vec<_>>>()?;

    match result {
        QueryResult::One(None) => Ok(QueryResult::One(None)),
        QueryResult::One(Some(document)) => {
            resolve_one(dispatcher, document, &targets).map(|d| QueryResult::One(Some(d)))
        }
        QueryResult::Many(documents) => {
            resolve_many(dispatcher, documents, &targets).map(QueryResult::Many)
        }
    }
}

fn find_descriptor<'a>(
    descriptors: &'a [ReferenceDescriptor],
    request: &ExpandRequest,
) -> DocrefResult<&'a ReferenceDescriptor> {
    match descriptors.iter().find(|d| d.ref_id == request.ref_id) {
        Some(descriptor) => Ok(descriptor),
        None => {
            log::error!(
                "Cannot expand {}: no reference is declared for it",
                request.ref_id
            );
            Err(DocrefError::new(
                &format!("Cannot expand {}: no reference is declared for it", request.ref_id),
                ErrorKind::ConfigurationError,
            ))
        }
    }
}

fn resolve_one(
    dispatcher: &Dispatcher,
    document: Document,
    targets: &[(&ExpandRequest, &ReferenceDescriptor)],
) -> DocrefResult<Document> {
    let values = targets
        .iter()
        .map(|(_, descriptor)| RefValue::of(&document, &descriptor.ref_id))
        .collect::<DocrefResult<Vec<_>>>()?;

    let tasks: Vec<_> = targets
        .iter()
        .zip(values.iter())
        .map(|((_, descriptor), value)| {
            move || -> DocrefResult<Value> {
                match value {
                    RefValue::Absent => Ok(Value::Null),
                    RefValue::One(id) => Ok(Value::from(fetch_one(dispatcher, descriptor, id)?)),
                    RefValue::Many(ids) => Ok(Value::from(fetch_many(dispatcher, descriptor, ids)?)),
                }
            }
        })
        .collect();
    let resolved = join_all(tasks)?;

    let mut expanded = document;
    for ((request, _), value) in targets.iter().zip(resolved) {
        expanded.put(request.alias.as_str(), value)?;
    }
    Ok(expanded)
}

fn resolve_many(
    dispatcher: &Dispatcher,
    documents: Vec<Document>,
    targets: &[(&ExpandRequest, &ReferenceDescriptor)],
) -> DocrefResult<Vec<Document>> {
    // one batch per distinct reference field, even if expanded under several aliases
    let mut batches: IndexMap<&str, &ReferenceDescriptor> = IndexMap::new();
    for (_, descriptor) in targets {
        batches.entry(descriptor.ref_id.as_str()).or_insert(*descriptor);
    }

    let mut values: Vec<IndexMap<&str, RefValue>> = Vec::with_capacity(documents.len());
    let mut unions: IndexMap<&str, IndexMap<String, Value>> = IndexMap::new();
    for document in &documents {
        let mut per_document = IndexMap::new();
        for (ref_id, _) in &batches {
            let value = RefValue::of(document, ref_id)?;
            let union = unions.entry(*ref_id).or_default();
            for id in value.ids() {
                if let Some(key) = id.id_key() {
                    union.entry(key).or_insert_with(|| id.clone());
                }
            }
            per_document.insert(*ref_id, value);
        }
        values.push(per_document);
    }

    let tasks: Vec<_> = batches
        .iter()
        .map(|(ref_id, descriptor)| {
            let ids: Vec<Value> = unions
                .get(ref_id)
                .map(|union| union.values().cloned().collect())
                .unwrap_or_default();
            move || -> DocrefResult<IndexMap<String, Document>> {
                let fetched = fetch_many(dispatcher, descriptor, &ids)?;
                Ok(index_by_key(fetched, &descriptor.remote_key))
            }
        })
        .collect();
    let fetched: Vec<IndexMap<String, Document>> = join_all(tasks)?;
    let fetched: IndexMap<&str, IndexMap<String, Document>> =
        batches.keys().copied().zip(fetched).collect();

    let mut expanded = Vec::with_capacity(documents.len());
    for (mut document, per_document) in documents.into_iter().zip(values) {
        for (request, descriptor) in targets {
            let ref_id = descriptor.ref_id.as_str();
            let value = match (per_document.get(ref_id), fetched.get(ref_id)) {
                (Some(value), Some(index)) => redistribute(value, index),
                _ => Value::Null,
            };
            document.put(request.alias.as_str(), value)?;
        }
        expanded.push(document);
    }
    Ok(expanded)
}

fn redistribute(value: &RefValue, index: &IndexMap<String, Document>) -> Value {
    match value {
        RefValue::Absent => Value::Null,
        RefValue::One(id) => id
            .id_key()
            .and_then(|key| index.get(&key))
            .map(|doc| Value::Document(doc.clone()))
            .unwrap_or(Value::Null),
        RefValue::Many(ids) => {
            let wanted: IndexSet<String> = ids.iter().filter_map(Value::id_key).collect();
            Value::Array(
                index
                    .iter()
                    .filter(|(key, _)| wanted.contains(*key))
                    .map(|(_, doc)| Value::Document(doc.clone()))
                    .collect(),
            )
        }
    }
}
