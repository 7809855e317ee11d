use crate::collection::{Document, FindOptions, Update, UpdateOptions};
use crate::errors::DocrefResult;
use crate::filter::Filter;
use crate::store::{AggregateStage, BulkOperation, BulkWriteResult, DeleteResult, UpdateResult};
use std::ops::Deref;
use std::sync::Arc;

/// Persistence seam for document collections.
///
/// Collections are created on first write. Every document stored through a
/// provider carries an `_id`; providers generate a
/// [crate::collection::DocumentId] for documents inserted without one and
/// reject duplicate ids.
pub trait DocumentStoreProvider: Send + Sync {
    fn collection_names(&self) -> DocrefResult<Vec<String>>;

    fn find_one(&self, collection: &str, filter: &Filter) -> DocrefResult<Option<Document>>;

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> DocrefResult<Vec<Document>>;

    fn count(&self, collection: &str, filter: &Filter) -> DocrefResult<u64>;

    /// Inserts `document` and returns it as stored.
    fn insert_one(&self, collection: &str, document: Document) -> DocrefResult<Document>;

    /// Inserts every document or none of them.
    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocrefResult<Vec<Document>>;

    /// Replaces the first document matching `filter`, keeping its `_id`.
    /// Returns the stored replacement, or `None` when nothing matched.
    fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> DocrefResult<Option<Document>>;

    /// Applies `update` to the matching documents, or only the first one
    /// when the options say so.
    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> DocrefResult<UpdateResult>;

    fn remove(&self, collection: &str, filter: &Filter, just_once: bool) -> DocrefResult<DeleteResult>;

    fn aggregate(&self, collection: &str, pipeline: &[AggregateStage]) -> DocrefResult<Vec<Document>>;

    /// Unordered bulk update. A failing item is reported in
    /// [BulkWriteResult::write_errors] and does not stop the others; an `Err`
    /// means the write could not be issued at all.
    fn bulk_write(
        &self,
        collection: &str,
        operations: Vec<BulkOperation>,
    ) -> DocrefResult<BulkWriteResult>;
}

/// A shareable handle to a [DocumentStoreProvider].
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<dyn DocumentStoreProvider>,
}

impl DocumentStore {
    pub fn new<T: DocumentStoreProvider + 'static>(inner: T) -> Self {
        DocumentStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for DocumentStore {
    type Target = Arc<dyn DocumentStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
