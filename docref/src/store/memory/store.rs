use super::InMemoryCollection;
use crate::collection::{Document, FindOptions, Update, UpdateOptions};
use crate::errors::DocrefResult;
use crate::filter::{is_all_filter, Filter};
use crate::store::{
    project_document, run_pipeline, sort_documents, AggregateStage, BulkOperation,
    BulkWriteResult, DeleteResult, DocumentStore, DocumentStoreProvider, UpdateResult,
};
use dashmap::DashMap;
use std::sync::Arc;

/// A [DocumentStoreProvider] keeping every collection in memory.
///
/// Each collection is guarded by its own lock, so writes to different
/// collections never contend.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    /// Wraps a fresh in-memory store in a [DocumentStore] handle.
    pub fn document_store() -> DocumentStore {
        DocumentStore::new(InMemoryStore::new())
    }
}

impl DocumentStoreProvider for InMemoryStore {
    fn collection_names(&self) -> DocrefResult<Vec<String>> {
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> DocrefResult<Option<Document>> {
        match self.inner.get(collection) {
            Some(c) => c.find_first(filter),
            None => Ok(None),
        }
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> DocrefResult<Vec<Document>> {
        let Some(c) = self.inner.get(collection) else {
            return Ok(Vec::new());
        };

        let docs = if is_all_filter(filter) {
            c.all()
        } else {
            c.find(filter)?
        };
        apply_find_options(docs, options)
    }

    fn count(&self, collection: &str, filter: &Filter) -> DocrefResult<u64> {
        match self.inner.get(collection) {
            Some(c) => Ok(c.find(filter)?.len() as u64),
            None => Ok(0),
        }
    }

    fn insert_one(&self, collection: &str, document: Document) -> DocrefResult<Document> {
        let mut inserted = self.inner.get_or_create(collection).insert(vec![document])?;
        Ok(inserted.remove(0))
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocrefResult<Vec<Document>> {
        self.inner.get_or_create(collection).insert(documents)
    }

    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> DocrefResult<Option<Document>> {
        match self.inner.get(collection) {
            Some(c) => c.replace_one(filter, document),
            None => Ok(None),
        }
    }

    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> DocrefResult<UpdateResult> {
        if options.is_insert_if_absent() {
            return self.inner.get_or_create(collection).update(filter, update, options);
        }
        match self.inner.get(collection) {
            Some(c) => c.update(filter, update, options),
            None => Ok(UpdateResult::default()),
        }
    }

    fn remove(&self, collection: &str, filter: &Filter, just_once: bool) -> DocrefResult<DeleteResult> {
        match self.inner.get(collection) {
            Some(c) => c.remove(filter, just_once),
            None => Ok(DeleteResult::default()),
        }
    }

    fn aggregate(&self, collection: &str, pipeline: &[AggregateStage]) -> DocrefResult<Vec<Document>> {
        let docs = match self.inner.get(collection) {
            Some(c) => c.all(),
            None => Vec::new(),
        };
        run_pipeline(docs, pipeline)
    }

    fn bulk_write(
        &self,
        collection: &str,
        operations: Vec<BulkOperation>,
    ) -> DocrefResult<BulkWriteResult> {
        log::debug!("Bulk write of {} operation(s) on {}", operations.len(), collection);
        match self.inner.get(collection) {
            Some(c) => Ok(c.bulk_write(operations)),
            None => Ok(BulkWriteResult::default()),
        }
    }
}

#[derive(Default)]
struct InMemoryStoreInner {
    collections: DashMap<String, InMemoryCollection>,
}

impl InMemoryStoreInner {
    fn get(&self, name: &str) -> Option<InMemoryCollection> {
        self.collections.get(name).map(|c| c.value().clone())
    }

    fn get_or_create(&self, name: &str) -> InMemoryCollection {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Creating in-memory collection {}", name);
                InMemoryCollection::new(name)
            })
            .value()
            .clone()
    }
}

pub(crate) fn apply_find_options(docs: Vec<Document>, options: &FindOptions) -> DocrefResult<Vec<Document>> {
    let docs = sort_documents(docs, options.sort_fields());
    let skip = options.skip_count().unwrap_or(0) as usize;
    let limit = options.limit_count().map(|l| l as usize).unwrap_or(usize::MAX);
    let page = docs.into_iter().skip(skip).take(limit);

    match options.projection() {
        Some(fields) => page.map(|doc| project_document(&doc, fields)).collect(),
        None => Ok(page.collect()),
    }
}
