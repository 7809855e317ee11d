use crate::collection::Update;
use crate::common::Value;
use crate::errors::ErrorKind;
use crate::filter::Filter;

/// Outcome of an update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    /// The `_id` of the inserted document when an upsert found no match.
    pub upserted_id: Option<Value>,
}

/// Outcome of a delete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: u64,
}

/// One item of an unordered bulk write: update the first document matching
/// `filter`.
#[derive(Clone, Debug)]
pub struct BulkOperation {
    pub filter: Filter,
    pub update: Update,
}

impl BulkOperation {
    pub fn new(filter: Filter, update: Update) -> Self {
        BulkOperation { filter, update }
    }
}

/// A failure of a single bulk write item. The other items are unaffected.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkWriteItemError {
    pub index: usize,
    pub message: String,
    pub kind: ErrorKind,
}

/// Outcome of an unordered bulk write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BulkWriteResult {
    pub matched: u64,
    pub modified: u64,
    pub write_errors: Vec<BulkWriteItemError>,
}

impl BulkWriteResult {
    pub fn is_ok(&self) -> bool {
        self.write_errors.is_empty()
    }
}
