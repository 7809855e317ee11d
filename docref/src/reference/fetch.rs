use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::dispatch::{event_name, Dispatcher, Operation, Payload, QueryParams};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::filter::field;
use crate::reference::ReferenceDescriptor;
use indexmap::IndexMap;

/// The shape of a reference field on one owning document.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RefValue {
    /// Missing, null or otherwise falsy.
    Absent,
    One(Value),
    Many(Vec<Value>),
}

#[derive(PartialEq)]
enum IdClass {
    Text,
    Integer,
    Generated,
}

fn id_class(value: &Value) -> Option<IdClass> {
    match value {
        Value::String(_) => Some(IdClass::Text),
        Value::I64(_) | Value::U64(_) => Some(IdClass::Integer),
        Value::Id(_) => Some(IdClass::Generated),
        _ => None,
    }
}

impl RefValue {
    /// Reads and classifies the reference field `ref_id` of `document`.
    pub(crate) fn of(document: &Document, ref_id: &str) -> DocrefResult<RefValue> {
        let value = document.get(ref_id)?;
        RefValue::classify(ref_id, value)
    }

    /// Accepts nothing, a single id or an array of ids of one kind.
    pub(crate) fn classify(ref_id: &str, value: Value) -> DocrefResult<RefValue> {
        match value {
            Value::Array(ids) => {
                let first = match ids.first() {
                    Some(first) => id_class(first),
                    None => return Ok(RefValue::Many(ids)),
                };
                let homogeneous =
                    first.is_some() && ids.iter().all(|id| id_class(id) == first);
                if !homogeneous {
                    log::error!(
                        "Reference field {} must hold ids of a single kind, found {}",
                        ref_id,
                        Value::Array(ids.clone())
                    );
                    return Err(DocrefError::new(
                        &format!("Reference field {} must hold ids of a single kind", ref_id),
                        ErrorKind::InvalidDataType,
                    ));
                }
                Ok(RefValue::Many(ids))
            }
            value if !value.is_truthy() => Ok(RefValue::Absent),
            value if value.is_id_like() => Ok(RefValue::One(value)),
            value => {
                log::error!(
                    "Reference field {} must hold an id or an array of ids, found {}",
                    ref_id,
                    value
                );
                Err(DocrefError::new(
                    &format!(
                        "Reference field {} must hold an id or an array of ids",
                        ref_id
                    ),
                    ErrorKind::InvalidDataType,
                ))
            }
        }
    }

    pub(crate) fn is_absent(&self) -> bool {
        matches!(self, RefValue::Absent)
    }

    /// The ids this value points at.
    pub(crate) fn ids(&self) -> &[Value] {
        match self {
            RefValue::Absent => &[],
            RefValue::One(id) => std::slice::from_ref(id),
            RefValue::Many(ids) => ids,
        }
    }
}

/// Fetches the referenced document whose remote key is `id`.
///
/// References by `_id` go through `findById`; any other remote key is looked
/// up with a `findOne` on that key, the same key [fetch_many] filters on.
pub(crate) fn fetch_one(
    dispatcher: &Dispatcher,
    descriptor: &ReferenceDescriptor,
    id: &Value,
) -> DocrefResult<Option<Document>> {
    let (event, payload) = if descriptor.remote_key == DOC_ID {
        (
            event_name(&descriptor.ref_entity, Operation::FindById),
            Payload::Id(id.clone()),
        )
    } else {
        (
            event_name(&descriptor.ref_entity, Operation::FindOne),
            Payload::Query(QueryParams::new(field(&descriptor.remote_key).eq(id.clone()))),
        )
    };
    dispatcher
        .dispatch(&event, payload)
        .and_then(Payload::into_optional_document)
        .map_err(|e| upstream_error(descriptor, e))
}

/// Fetches every referenced document whose remote key is in `ids` with a
/// single `findMany`. No dispatch happens for an empty id list.
pub(crate) fn fetch_many(
    dispatcher: &Dispatcher,
    descriptor: &ReferenceDescriptor,
    ids: &[Value],
) -> DocrefResult<Vec<Document>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    log::debug!(
        "Fetching {} {} document(s) referenced by {}",
        ids.len(),
        descriptor.ref_entity,
        descriptor.ref_id
    );
    let event = event_name(&descriptor.ref_entity, Operation::FindMany);
    let query = QueryParams::new(field(&descriptor.remote_key).in_array(ids.to_vec()));
    dispatcher
        .dispatch(&event, Payload::Query(query))
        .and_then(Payload::into_documents)
        .map_err(|e| upstream_error(descriptor, e))
}

/// Indexes fetched documents by the id key of their remote key, keeping
/// fetch order. Documents without a usable key are skipped.
pub(crate) fn index_by_key(
    documents: Vec<Document>,
    remote_key: &str,
) -> IndexMap<String, Document> {
    let mut index = IndexMap::with_capacity(documents.len());
    for document in documents {
        match document.get(remote_key).ok().and_then(|v| v.id_key()) {
            Some(key) => {
                index.insert(key, document);
            }
            None => log::warn!(
                "Fetched document without a usable {}, ignoring it",
                remote_key
            ),
        }
    }
    index
}

fn upstream_error(descriptor: &ReferenceDescriptor, cause: DocrefError) -> DocrefError {
    log::error!(
        "Failed to fetch {} referenced by {}: {}",
        descriptor.ref_entity,
        descriptor.ref_id,
        cause
    );
    DocrefError::new_with_cause(
        &format!(
            "Failed to fetch {} referenced by {}",
            descriptor.ref_entity, descriptor.ref_id
        ),
        ErrorKind::UpstreamFetchFailed,
        cause,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::DocumentId;
    use crate::doc;

    #[test]
    fn test_classify_absent() {
        assert!(RefValue::classify("a", Value::Null).unwrap().is_absent());
        assert!(RefValue::classify("a", Value::from("")).unwrap().is_absent());
        assert!(RefValue::classify("a", Value::from(0)).unwrap().is_absent());
    }

    #[test]
    fn test_classify_scalar() {
        assert_eq!(
            RefValue::classify("a", Value::from("c1")).unwrap(),
            RefValue::One(Value::from("c1"))
        );
        let id = DocumentId::new();
        assert_eq!(
            RefValue::classify("a", Value::from(id)).unwrap(),
            RefValue::One(Value::Id(id))
        );
    }

    #[test]
    fn test_classify_array() {
        let value = RefValue::classify("a", Value::from(vec!["c1", "c2"])).unwrap();
        assert_eq!(value.ids().len(), 2);
        let empty = RefValue::classify("a", Value::Array(vec![])).unwrap();
        assert_eq!(empty, RefValue::Many(vec![]));
    }

    #[test]
    fn test_classify_rejects_mixed_array() {
        let mixed = Value::Array(vec![Value::from("c1"), Value::from(2)]);
        let err = RefValue::classify("a", mixed).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_classify_rejects_non_id() {
        let err = RefValue::classify("a", Value::Document(doc! { x: 1 })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
        let err = RefValue::classify("a", Value::Array(vec![Value::from(true)])).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
    }

    #[test]
    fn test_of_reads_nested_field() {
        let doc = doc! { refs: { owner: "u1" } };
        assert_eq!(
            RefValue::of(&doc, "refs.owner").unwrap(),
            RefValue::One(Value::from("u1"))
        );
        assert!(RefValue::of(&doc, "missing").unwrap().is_absent());
    }

    #[test]
    fn test_index_by_key_keeps_order() {
        let docs = vec![doc! { _id: "b" }, doc! { _id: "a" }, doc! { name: "no id" }];
        let index = index_by_key(docs, "_id");
        let keys: Vec<&String> = index.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_fetch_many_empty_skips_dispatch() {
        let dispatcher = Dispatcher::new();
        let descriptor = ReferenceDescriptor::new("tagIds", "Tag");
        // no handler installed, so any dispatch would fail
        assert!(fetch_many(&dispatcher, &descriptor, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_failure_is_upstream_error() {
        let dispatcher = Dispatcher::new();
        let descriptor = ReferenceDescriptor::new("categoryId", "Category");
        let err = fetch_one(&dispatcher, &descriptor, &Value::from("c1")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UpstreamFetchFailed);
        assert_eq!(err.root_cause().kind(), &ErrorKind::HandlerNotFound);
    }

    #[test]
    fn test_fetch_one_by_id_uses_find_by_id() {
        let dispatcher = Dispatcher::new();
        dispatcher.subscribe("entity.Category.findById", |_, payload| {
            let id = payload.into_id()?;
            Ok(Payload::from(doc! { _id: (id), name: "Laptops" }))
        });
        let descriptor = ReferenceDescriptor::new("categoryId", "Category");
        let found = fetch_one(&dispatcher, &descriptor, &Value::from("c1")).unwrap();
        assert_eq!(found.unwrap().get("name").unwrap(), Value::from("Laptops"));
    }

    #[test]
    fn test_fetch_one_by_remote_key_uses_find_one() {
        let dispatcher = Dispatcher::new();
        let products = vec![
            doc! { _id: "p1", name: "iPhone", price: 999 },
            doc! { _id: "p2", name: "Cable", price: 19 },
        ];
        dispatcher.subscribe("entity.Product.findOne", move |_, payload| {
            let query = payload.into_query()?;
            let mut found = None;
            for product in &products {
                if query.filter.apply(product)? {
                    found = Some(product.clone());
                    break;
                }
            }
            Ok(Payload::from(found))
        });
        let descriptor = ReferenceDescriptor::new("productName", "Product").remote_key("name");

        let found = fetch_one(&dispatcher, &descriptor, &Value::from("Cable")).unwrap();
        assert_eq!(found.unwrap().get("_id").unwrap(), Value::from("p2"));
        let missing = fetch_one(&dispatcher, &descriptor, &Value::from("iPad")).unwrap();
        assert!(missing.is_none());
    }
}
