use crate::collection::{Document, Update, UpdateOptions};
use crate::common::{Value, DOC_ID};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::filter::{is_and_filter, is_equals_filter, Filter};
use crate::store::{BulkOperation, BulkWriteItemError, BulkWriteResult, DeleteResult, UpdateResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Documents of one collection in insertion order, keyed by stringified `_id`.
#[derive(Clone)]
pub(crate) struct InMemoryCollection {
    inner: Arc<InMemoryCollectionInner>,
}

impl InMemoryCollection {
    pub(crate) fn new(name: &str) -> Self {
        InMemoryCollection {
            inner: Arc::new(InMemoryCollectionInner {
                name: name.to_string(),
                documents: RwLock::new(IndexMap::new()),
            }),
        }
    }

    pub(crate) fn find(&self, filter: &Filter) -> DocrefResult<Vec<Document>> {
        self.inner.find(filter)
    }

    pub(crate) fn find_first(&self, filter: &Filter) -> DocrefResult<Option<Document>> {
        self.inner.find_first(filter)
    }

    pub(crate) fn all(&self) -> Vec<Document> {
        self.inner.documents.read().values().cloned().collect()
    }

    pub(crate) fn insert(&self, documents: Vec<Document>) -> DocrefResult<Vec<Document>> {
        self.inner.insert(documents)
    }

    pub(crate) fn replace_one(&self, filter: &Filter, document: Document) -> DocrefResult<Option<Document>> {
        self.inner.replace_one(filter, document)
    }

    pub(crate) fn update(
        &self,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> DocrefResult<UpdateResult> {
        self.inner.update(filter, update, options)
    }

    pub(crate) fn remove(&self, filter: &Filter, just_once: bool) -> DocrefResult<DeleteResult> {
        self.inner.remove(filter, just_once)
    }

    pub(crate) fn bulk_write(&self, operations: Vec<BulkOperation>) -> BulkWriteResult {
        self.inner.bulk_write(operations)
    }
}

struct InMemoryCollectionInner {
    name: String,
    documents: RwLock<IndexMap<String, Document>>,
}

impl InMemoryCollectionInner {
    fn find(&self, filter: &Filter) -> DocrefResult<Vec<Document>> {
        let documents = self.documents.read();
        let mut result = Vec::new();
        for doc in documents.values() {
            if filter.apply(doc)? {
                result.push(doc.clone());
            }
        }
        Ok(result)
    }

    fn find_first(&self, filter: &Filter) -> DocrefResult<Option<Document>> {
        let documents = self.documents.read();
        for doc in documents.values() {
            if filter.apply(doc)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    fn insert(&self, documents: Vec<Document>) -> DocrefResult<Vec<Document>> {
        let mut prepared = Vec::with_capacity(documents.len());
        let mut batch_keys = HashSet::with_capacity(documents.len());
        let mut store = self.documents.write();

        for mut doc in documents {
            let id = doc.ensure_id();
            let key = id_key_of(&id)?;
            if store.contains_key(&key) || !batch_keys.insert(key.clone()) {
                log::error!("Document already exists with id {} in {}", key, self.name);
                return Err(DocrefError::new(
                    &format!("Document already exists with id {} in {}", key, self.name),
                    ErrorKind::UniqueConstraintViolation,
                ));
            }
            prepared.push((key, doc));
        }

        let mut inserted = Vec::with_capacity(prepared.len());
        for (key, doc) in prepared {
            store.insert(key, doc.clone());
            inserted.push(doc);
        }
        log::debug!("Inserted {} document(s) into {}", inserted.len(), self.name);
        Ok(inserted)
    }

    fn replace_one(&self, filter: &Filter, mut document: Document) -> DocrefResult<Option<Document>> {
        let mut store = self.documents.write();
        let Some(key) = first_match(&store, filter)? else {
            return Ok(None);
        };

        match document.id() {
            Some(id) if id_key_of(id)? != key => {
                log::error!("Replacement document id {} does not match {}", id, key);
                return Err(DocrefError::new(
                    &format!("Replacement document id {} does not match existing id {}", id, key),
                    ErrorKind::InvalidOperation,
                ));
            }
            Some(_) => {}
            None => {
                let existing_id = store
                    .get(&key)
                    .and_then(|doc| doc.id().cloned())
                    .unwrap_or(Value::String(key.clone()));
                document.put(DOC_ID, existing_id)?;
            }
        }

        store.insert(key, document.clone());
        Ok(Some(document))
    }

    fn update(
        &self,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> DocrefResult<UpdateResult> {
        let mut store = self.documents.write();
        let mut keys = Vec::new();
        for (key, doc) in store.iter() {
            if filter.apply(doc)? {
                keys.push(key.clone());
                if options.is_just_once() {
                    break;
                }
            }
        }

        if keys.is_empty() {
            if !options.is_insert_if_absent() {
                return Ok(UpdateResult::default());
            }

            let mut doc = seed_from_filter(filter)?;
            update.apply(&mut doc)?;
            let id = doc.ensure_id();
            let key = id_key_of(&id)?;
            if store.contains_key(&key) {
                log::error!("Document already exists with id {} in {}", key, self.name);
                return Err(DocrefError::new(
                    &format!("Document already exists with id {} in {}", key, self.name),
                    ErrorKind::UniqueConstraintViolation,
                ));
            }
            store.insert(key, doc);
            return Ok(UpdateResult {
                matched: 0,
                modified: 0,
                upserted_id: Some(id),
            });
        }

        // apply on copies first so a failing update leaves the collection untouched
        let mut changed = Vec::new();
        for key in &keys {
            if let Some(doc) = store.get(key) {
                let mut copy = doc.clone();
                if update.apply(&mut copy)? {
                    changed.push((key.clone(), copy));
                }
            }
        }

        let modified = changed.len() as u64;
        for (key, doc) in changed {
            store.insert(key, doc);
        }

        Ok(UpdateResult {
            matched: keys.len() as u64,
            modified,
            upserted_id: None,
        })
    }

    fn remove(&self, filter: &Filter, just_once: bool) -> DocrefResult<DeleteResult> {
        let mut store = self.documents.write();
        let mut keys = Vec::new();
        for (key, doc) in store.iter() {
            if filter.apply(doc)? {
                keys.push(key.clone());
                if just_once {
                    break;
                }
            }
        }

        for key in &keys {
            store.shift_remove(key);
        }
        Ok(DeleteResult {
            deleted: keys.len() as u64,
        })
    }

    fn bulk_write(&self, operations: Vec<BulkOperation>) -> BulkWriteResult {
        let mut store = self.documents.write();
        let mut result = BulkWriteResult::default();

        for (index, operation) in operations.into_iter().enumerate() {
            let outcome = first_match(&store, &operation.filter).and_then(|key| match key {
                None => Ok(None),
                Some(key) => {
                    let mut copy = store.get(&key).cloned().unwrap_or_default();
                    let changed = operation.update.apply(&mut copy)?;
                    Ok(Some((key, copy, changed)))
                }
            });

            match outcome {
                Ok(None) => {}
                Ok(Some((key, doc, changed))) => {
                    result.matched += 1;
                    if changed {
                        result.modified += 1;
                        store.insert(key, doc);
                    }
                }
                Err(err) => {
                    log::warn!("Bulk write item {} failed on {}: {}", index, self.name, err);
                    result.write_errors.push(BulkWriteItemError {
                        index,
                        message: err.message().to_string(),
                        kind: err.kind().clone(),
                    });
                }
            }
        }
        result
    }
}

fn first_match(store: &IndexMap<String, Document>, filter: &Filter) -> DocrefResult<Option<String>> {
    for (key, doc) in store.iter() {
        if filter.apply(doc)? {
            return Ok(Some(key.clone()));
        }
    }
    Ok(None)
}

fn id_key_of(id: &Value) -> DocrefResult<String> {
    id.id_key().ok_or_else(|| {
        log::error!("Invalid document id {}", id);
        DocrefError::new(&format!("Invalid document id {}", id), ErrorKind::InvalidId)
    })
}

/// Starting document for an upsert: the equality terms of the filter.
fn seed_from_filter(filter: &Filter) -> DocrefResult<Document> {
    let mut doc = Document::new();
    collect_equalities(filter, &mut doc)?;
    Ok(doc)
}

fn collect_equalities(filter: &Filter, doc: &mut Document) -> DocrefResult<()> {
    if is_equals_filter(filter) {
        if let (Some(name), Some(value)) = (filter.field_name(), filter.field_value()) {
            doc.put(name, value.clone())?;
        }
    } else if is_and_filter(filter) {
        for child in filter.logical_filters().unwrap_or(&[]) {
            collect_equalities(child, doc)?;
        }
    }
    Ok(())
}
