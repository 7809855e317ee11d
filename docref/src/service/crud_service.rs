use crate::collection::{Document, FindOptions, Update, UpdateOperation, UpdateOptions};
use crate::common::{join_all, SubscriberRef, Value, DOC_ID};
use crate::dispatch::{entity_namespace, Dispatcher, Handler, Operation, Payload};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::filter::{field, Filter};
use crate::reference::{
    generate, refresh, resolve, should_generate_with, QueryResult, ReferenceDescriptor,
    ReplacePropagation,
};
use crate::service::ServiceConfig;
use crate::store::{DocumentStore, UpdateResult};
use itertools::Itertools;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaveMode {
    /// Always insert.
    Insert,
    /// Replace the stored document with the same id, insert otherwise.
    Upsert,
    /// Replace the stored document with the same id, fail otherwise.
    Replace,
}

/// The CRUD service of one entity.
///
/// A service owns one collection of the [DocumentStore] and answers the
/// `entity.<Name>.*` events of a [Dispatcher]. Writes go through the
/// configured validator and middleware, and keep the reference caches
/// declared in its [ServiceConfig] populated.
///
/// ```ignore
/// let products = CrudService::new(
///     ServiceConfig::builder("Product")
///         .reference(ReferenceDescriptor::new("categoryId", "Category").cache("cache.category", &["name"]))
///         .build()?,
///     store.clone(),
/// );
/// products.register(&dispatcher)?;
///
/// let saved = dispatcher
///     .dispatch("entity.Product.createOne", Payload::from(doc! { name: "MacBook", categoryId: "c1" }))?
///     .into_document()?;
/// ```
#[derive(Clone)]
pub struct CrudService {
    inner: Arc<CrudServiceInner>,
}

struct CrudServiceInner {
    config: ServiceConfig,
    store: DocumentStore,
}

impl CrudService {
    pub fn new(config: ServiceConfig, store: DocumentStore) -> Self {
        CrudService {
            inner: Arc::new(CrudServiceInner { config, store }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn entity(&self) -> &str {
        self.inner.config.entity()
    }

    /// Subscribes a handler for every [Operation] of this entity and one
    /// [ReplacePropagation] per cached reference.
    ///
    /// Returns the after-listener subscriptions of the propagations.
    pub fn register(&self, dispatcher: &Dispatcher) -> DocrefResult<Vec<SubscriberRef>> {
        let handlers = Operation::all().iter().map(|operation| {
            let service = self.clone();
            let operation = *operation;
            let handler: Handler = Arc::new(move |dispatcher: &Dispatcher, payload: Payload| {
                service.handle(operation, dispatcher, payload)
            });
            (operation.as_str().to_string(), handler)
        });
        dispatcher.subscribe_map(&entity_namespace(self.entity()), handlers);

        let mut subscribers = Vec::new();
        for descriptor in self.config().cached_references() {
            let propagation = ReplacePropagation::new(self.entity(), descriptor.clone())?;
            subscribers.push(propagation.register(dispatcher)?);
        }

        log::debug!(
            "Registered {} service on collection {} with {} propagation(s)",
            self.entity(),
            self.config().collection_name(),
            subscribers.len()
        );
        Ok(subscribers)
    }

    /// Runs `operation` against this service's collection.
    pub fn handle(
        &self,
        operation: Operation,
        dispatcher: &Dispatcher,
        payload: Payload,
    ) -> DocrefResult<Payload> {
        match operation {
            Operation::FindById => {
                let id = payload.into_id()?;
                let found = self.store().find_one(self.collection(), &self.id_filter(id))?;
                Ok(Payload::from(found))
            }
            Operation::FindOne => {
                let query = payload.into_query()?;
                let found = self
                    .store()
                    .find_many(self.collection(), &query.filter, &query.options.limit(1))?
                    .into_iter()
                    .next();
                let result = resolve(
                    dispatcher,
                    QueryResult::One(found),
                    &query.expand,
                    self.references(),
                )?;
                Ok(into_payload(result))
            }
            Operation::FindMany => {
                let query = payload.into_query()?;
                let found = self
                    .store()
                    .find_many(self.collection(), &query.filter, &query.options)?;
                let result = resolve(
                    dispatcher,
                    QueryResult::Many(found),
                    &query.expand,
                    self.references(),
                )?;
                Ok(into_payload(result))
            }
            Operation::CreateOne => {
                let document = payload.into_document()?;
                self.save_document(dispatcher, document, SaveMode::Insert)
                    .map(Payload::Document)
            }
            Operation::CreateMany => {
                let documents = payload.into_documents()?;
                self.create_many(dispatcher, documents).map(Payload::Documents)
            }
            Operation::Save => {
                let document = payload.into_document()?;
                self.save_document(dispatcher, document, SaveMode::Upsert)
                    .map(Payload::Document)
            }
            Operation::ReplaceOne => {
                let document = payload.into_document()?;
                self.save_document(dispatcher, document, SaveMode::Replace)
                    .map(Payload::Document)
            }
            Operation::UpdateOne | Operation::UpdateMany => {
                let params = payload.into_update()?;
                let options = UpdateOptions::new(
                    params.options.is_insert_if_absent(),
                    operation == Operation::UpdateOne,
                );
                self.update(dispatcher, &params.filter, params.update, &options)
                    .map(Payload::UpdateResult)
            }
            Operation::DeleteOne => {
                let filter = match payload {
                    Payload::Id(id) => self.id_filter(id),
                    Payload::Query(query) => query.filter,
                    other => {
                        log::error!("deleteOne expects an id or a query, got {}", other.kind_name());
                        return Err(DocrefError::new(
                            &format!("deleteOne expects an id or a query, got {}", other.kind_name()),
                            ErrorKind::InvalidDataType,
                        ));
                    }
                };
                let result = self.store().remove(self.collection(), &filter, true)?;
                Ok(Payload::DeleteResult(result))
            }
            Operation::DeleteMany => {
                let query = payload.into_query()?;
                let result = self.store().remove(self.collection(), &query.filter, false)?;
                Ok(Payload::DeleteResult(result))
            }
            Operation::Count => {
                let query = payload.into_query()?;
                let count = self.store().count(self.collection(), &query.filter)?;
                Ok(Payload::Count(count))
            }
            Operation::Aggregate => {
                let pipeline = payload.into_pipeline()?;
                let documents = self.store().aggregate(self.collection(), &pipeline)?;
                Ok(Payload::Documents(documents))
            }
            Operation::Validate => {
                let document = payload.into_document()?;
                self.config().validator().validate(document).map(Payload::Document)
            }
            Operation::RefreshRefCache => {
                let params = payload.into_refresh()?;
                let result = refresh(
                    dispatcher,
                    self.store(),
                    self.collection(),
                    &params.filter,
                    params.entities.as_deref(),
                    self.references(),
                )?;
                Ok(Payload::BulkWrite(result))
            }
        }
    }

    fn create_many(
        &self,
        dispatcher: &Dispatcher,
        documents: Vec<Document>,
    ) -> DocrefResult<Vec<Document>> {
        if documents.is_empty() {
            log::error!("createMany of {} needs at least one document", self.entity());
            return Err(DocrefError::new(
                &format!("createMany of {} needs at least one document", self.entity()),
                ErrorKind::ValidationError,
            ));
        }

        let tasks: Vec<_> = documents
            .into_iter()
            .map(|document| move || self.save_document(dispatcher, document, SaveMode::Insert))
            .collect();
        join_all(tasks)
    }

    fn save_document(
        &self,
        dispatcher: &Dispatcher,
        document: Document,
        mode: SaveMode,
    ) -> DocrefResult<Document> {
        let config = self.config();
        let id_key = config.id_key();
        let mut document = config.validator().validate(document)?;

        let existing = match mode {
            SaveMode::Insert => None,
            SaveMode::Upsert | SaveMode::Replace if document.is_populated(id_key) => {
                let id = document.get(id_key)?;
                self.store().find_one(self.collection(), &self.id_filter(id))?
            }
            SaveMode::Upsert | SaveMode::Replace => None,
        };

        if mode == SaveMode::Replace && existing.is_none() {
            return Err(self.replace_target_error(&document));
        }

        let pipeline = config.pipeline();
        if let Some(existing) = &existing {
            pipeline.before_replace(&mut document, existing)?;
        }
        pipeline.before_save(&mut document)?;

        let changed = match &existing {
            Some(existing) if config.track_reference_changes() => {
                changed_references(&document, existing, self.references())?
            }
            _ => Vec::new(),
        };
        clear_dropped_caches(&mut document, self.references(), &changed)?;

        if should_generate_with(&document, self.references(), &changed) {
            let projection = generate(dispatcher, self.references(), &document)?;
            projection.merge_into(&mut document)?;
        }

        match existing {
            Some(_) => {
                let filter = self.id_filter(document.get(id_key)?);
                match self.store().replace_one(self.collection(), &filter, document.clone())? {
                    Some(stored) => Ok(stored),
                    // removed between lookup and replace
                    None => Err(self.replace_target_error(&document)),
                }
            }
            None => {
                pipeline.before_insert(&mut document)?;
                self.store().insert_one(self.collection(), document)
            }
        }
    }

    fn update(
        &self,
        dispatcher: &Dispatcher,
        filter: &Filter,
        update: Update,
        options: &UpdateOptions,
    ) -> DocrefResult<UpdateResult> {
        let update = self.config().pipeline().before_update(update)?;
        let update = clear_unset_caches(update, self.references());

        let touched: Vec<String> = self
            .config()
            .cached_references()
            .filter(|descriptor| update.touches(&descriptor.ref_id))
            .map(|descriptor| descriptor.ref_entity.clone())
            .unique()
            .collect();

        // documents an upsert creates are picked up from the result
        let mut affected = Vec::new();
        if !touched.is_empty() {
            let find_options = if options.is_just_once() {
                FindOptions::new().limit(1)
            } else {
                FindOptions::new()
            };
            affected = self
                .store()
                .find_many(self.collection(), filter, &find_options)?
                .iter()
                .filter_map(|document| document.id().cloned())
                .collect();
        }

        let result = self
            .store()
            .update(self.collection(), filter, &update, options)?;

        if !touched.is_empty() {
            affected.extend(result.upserted_id.iter().cloned());
            if !affected.is_empty() {
                log::debug!(
                    "Update of {} changed references to {}, refreshing {} cache(s)",
                    self.entity(),
                    touched.join(", "),
                    affected.len()
                );
                refresh(
                    dispatcher,
                    self.store(),
                    self.collection(),
                    &field(DOC_ID).in_array(affected),
                    Some(touched.as_slice()),
                    self.references(),
                )?;
            }
        }
        Ok(result)
    }

    fn replace_target_error(&self, document: &Document) -> DocrefError {
        let id_key = self.config().id_key();
        if document.is_populated(id_key) {
            let id = document.get(id_key).unwrap_or_default();
            log::error!("{} {} does not exist", self.entity(), id);
            DocrefError::new(
                &format!("{} {} does not exist", self.entity(), id),
                ErrorKind::NotFound,
            )
        } else {
            log::error!("Replacing a {} requires its {}", self.entity(), id_key);
            DocrefError::new(
                &format!("Replacing a {} requires its {}", self.entity(), id_key),
                ErrorKind::ValidationError,
            )
        }
    }

    fn id_filter(&self, id: Value) -> Filter {
        field(self.config().id_key()).eq(id)
    }

    fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    fn collection(&self) -> &str {
        self.config().collection_name()
    }

    fn references(&self) -> &[ReferenceDescriptor] {
        self.config().references()
    }
}

fn into_payload(result: QueryResult) -> Payload {
    match result {
        QueryResult::One(document) => Payload::from(document),
        QueryResult::Many(documents) => Payload::Documents(documents),
    }
}

/// The `ref_id`s of cached references whose ids differ between `document`
/// and the stored `existing` version.
fn changed_references(
    document: &Document,
    existing: &Document,
    descriptors: &[ReferenceDescriptor],
) -> DocrefResult<Vec<String>> {
    let mut changed = Vec::new();
    for descriptor in descriptors.iter().filter(|d| d.has_cache()) {
        let now = reference_keys(&document.get(&descriptor.ref_id)?);
        let before = reference_keys(&existing.get(&descriptor.ref_id)?);
        if now != before {
            log::debug!(
                "Reference {} changed from {:?} to {:?}",
                descriptor.ref_id,
                before,
                now
            );
            changed.push(descriptor.ref_id.clone());
        }
    }
    Ok(changed)
}

fn reference_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.iter().filter_map(Value::id_key).collect(),
        value if value.is_truthy() => value.id_key().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Drops the cache of every changed reference that is no longer set.
fn clear_dropped_caches(
    document: &mut Document,
    descriptors: &[ReferenceDescriptor],
    changed: &[String],
) -> DocrefResult<()> {
    for descriptor in descriptors {
        if !changed.contains(&descriptor.ref_id) || document.is_populated(&descriptor.ref_id) {
            continue;
        }
        if let Some(under) = descriptor.cache_under() {
            if document.contains_field(under) {
                document.remove(under)?;
            }
        }
    }
    Ok(())
}

/// Extends `update` so that unsetting a reference, or setting it to a falsy
/// value, also unsets its cache.
fn clear_unset_caches(update: Update, descriptors: &[ReferenceDescriptor]) -> Update {
    let unset_paths: Vec<String> = descriptors
        .iter()
        .filter(|descriptor| {
            update.operations().iter().any(|op| match op {
                UpdateOperation::Unset(path) => path == &descriptor.ref_id,
                UpdateOperation::Set(path, value) => {
                    path == &descriptor.ref_id && !value.is_truthy()
                }
            })
        })
        .filter_map(|descriptor| descriptor.cache_under().map(str::to_string))
        .collect();

    unset_paths
        .iter()
        .fold(update, |update, path| update.unset(path))
}
