use crate::collection::{Document, FindOptions, Update};
use crate::common::{map_chunked, REFRESH_CHUNK_SIZE};
use crate::dispatch::Dispatcher;
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::filter::{by_id, Filter};
use crate::reference::generator::{generate, CacheProjection};
use crate::reference::ReferenceDescriptor;
use crate::store::{BulkOperation, BulkWriteResult, DocumentStore};

/// Recomputes the reference caches of every document of `collection`
/// matching `filter` and writes them back in one unordered bulk write.
///
/// `entities` restricts the refresh to references pointing at those
/// entities. Projections are computed in parallel; the bulk write holds one
/// operation per matched document, keyed by its `_id`. Item failures come
/// back in [BulkWriteResult::write_errors]; only a bulk write that could not
/// be issued at all is an error.
pub fn refresh(
    dispatcher: &Dispatcher,
    store: &DocumentStore,
    collection: &str,
    filter: &Filter,
    entities: Option<&[String]>,
    descriptors: &[ReferenceDescriptor],
) -> DocrefResult<BulkWriteResult> {
    let selected: Vec<ReferenceDescriptor> = descriptors
        .iter()
        .filter(|d| d.has_cache())
        .filter(|d| entities.map_or(true, |entities| entities.contains(&d.ref_entity)))
        .cloned()
        .collect();
    if selected.is_empty() {
        log::debug!("No reference cache of {} to refresh", collection);
        return Ok(BulkWriteResult::default());
    }

    let documents = store.find_many(collection, filter, &FindOptions::default())?;
    if documents.is_empty() {
        log::debug!("No document of {} matched {}, nothing to refresh", collection, filter);
        return Ok(BulkWriteResult::default());
    }

    let operations = map_chunked(&documents, REFRESH_CHUNK_SIZE, |document| {
        let id = match document.id() {
            Some(id) => id.clone(),
            None => {
                log::error!("Cannot refresh a document of {} without _id", collection);
                return Err(DocrefError::new(
                    &format!("Cannot refresh a document of {} without _id", collection),
                    ErrorKind::InvalidId,
                ));
            }
        };
        let projection = generate(dispatcher, &selected, document)?;
        Ok(BulkOperation::new(by_id(id), refresh_update(document, &selected, &projection)))
    })?;

    log::debug!(
        "Refreshing reference caches of {} document(s) in {}",
        operations.len(),
        collection
    );
    let result = store.bulk_write(collection, operations).map_err(|e| {
        log::error!("Bulk refresh of {} could not be written: {}", collection, e);
        DocrefError::new_with_cause(
            &format!("Bulk refresh of {} could not be written", collection),
            ErrorKind::BulkWriteError,
            e,
        )
    })?;

    if !result.is_ok() {
        log::warn!(
            "Bulk refresh of {} finished with {} failed item(s)",
            collection,
            result.write_errors.len()
        );
    }
    Ok(result)
}

/// Sets every generated cache and unsets the leftover cache of each
/// reference the document no longer holds.
fn refresh_update(
    document: &Document,
    selected: &[ReferenceDescriptor],
    projection: &CacheProjection,
) -> Update {
    selected
        .iter()
        .filter_map(|descriptor| descriptor.cache_under())
        .filter(|under| projection.get(under).is_none() && document.contains_field(under))
        .fold(projection.to_update(), |update, under| update.unset(under))
}
