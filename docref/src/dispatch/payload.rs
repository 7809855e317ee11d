use crate::collection::{Document, FindOptions, Update, UpdateOptions};
use crate::common::Value;
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::filter::{all, Filter};
use crate::reference::ExpandRequest;
use crate::store::{AggregateStage, BulkWriteResult, DeleteResult, UpdateResult};

/// Parameters of a find: which documents, how to page them and which
/// references to expand into the result.
#[derive(Clone, Debug)]
pub struct QueryParams {
    pub filter: Filter,
    pub options: FindOptions,
    pub expand: Vec<ExpandRequest>,
}

impl Default for QueryParams {
    fn default() -> Self {
        QueryParams::new(all())
    }
}

impl QueryParams {
    pub fn new(filter: Filter) -> Self {
        QueryParams {
            filter,
            options: FindOptions::default(),
            expand: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: FindOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches the document(s) referenced by `ref_id` under `alias`.
    pub fn expand(mut self, ref_id: &str, alias: &str) -> Self {
        self.expand.push(ExpandRequest::new(ref_id, alias));
        self
    }
}

/// Parameters of an update.
#[derive(Clone, Debug)]
pub struct UpdateParams {
    pub filter: Filter,
    pub update: Update,
    pub options: UpdateOptions,
}

impl UpdateParams {
    pub fn new(filter: Filter, update: Update) -> Self {
        UpdateParams {
            filter,
            update,
            options: UpdateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UpdateOptions) -> Self {
        self.options = options;
        self
    }
}

/// Parameters of a reference cache refresh. `entities` restricts the refresh
/// to references pointing at those entities; `None` refreshes all of them.
#[derive(Clone, Debug)]
pub struct RefreshParams {
    pub filter: Filter,
    pub entities: Option<Vec<String>>,
}

impl Default for RefreshParams {
    fn default() -> Self {
        RefreshParams::new(all())
    }
}

impl RefreshParams {
    pub fn new(filter: Filter) -> Self {
        RefreshParams {
            filter,
            entities: None,
        }
    }

    pub fn for_entities(mut self, entities: &[&str]) -> Self {
        self.entities = Some(entities.iter().map(|e| e.to_string()).collect());
        self
    }
}

/// What travels through the dispatcher, in both directions.
///
/// `None` doubles as the not-found result of single document reads.
#[derive(Clone, Debug, Default)]
pub enum Payload {
    #[default]
    None,
    Id(Value),
    Document(Document),
    Documents(Vec<Document>),
    Query(QueryParams),
    Update(UpdateParams),
    Pipeline(Vec<AggregateStage>),
    Refresh(RefreshParams),
    Count(u64),
    UpdateResult(UpdateResult),
    DeleteResult(DeleteResult),
    BulkWrite(BulkWriteResult),
}

impl Payload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::None => "none",
            Payload::Id(_) => "id",
            Payload::Document(_) => "document",
            Payload::Documents(_) => "documents",
            Payload::Query(_) => "query",
            Payload::Update(_) => "update",
            Payload::Pipeline(_) => "pipeline",
            Payload::Refresh(_) => "refresh",
            Payload::Count(_) => "count",
            Payload::UpdateResult(_) => "update result",
            Payload::DeleteResult(_) => "delete result",
            Payload::BulkWrite(_) => "bulk write result",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }

    pub fn into_id(self) -> DocrefResult<Value> {
        match self {
            Payload::Id(id) => Ok(id),
            other => Err(mismatch("id", &other)),
        }
    }

    pub fn into_document(self) -> DocrefResult<Document> {
        match self {
            Payload::Document(doc) => Ok(doc),
            other => Err(mismatch("document", &other)),
        }
    }

    /// A document, or `None` for the not-found result.
    pub fn into_optional_document(self) -> DocrefResult<Option<Document>> {
        match self {
            Payload::Document(doc) => Ok(Some(doc)),
            Payload::None => Ok(None),
            other => Err(mismatch("document", &other)),
        }
    }

    pub fn into_documents(self) -> DocrefResult<Vec<Document>> {
        match self {
            Payload::Documents(docs) => Ok(docs),
            other => Err(mismatch("documents", &other)),
        }
    }

    pub fn into_query(self) -> DocrefResult<QueryParams> {
        match self {
            Payload::Query(params) => Ok(params),
            Payload::None => Ok(QueryParams::default()),
            other => Err(mismatch("query", &other)),
        }
    }

    pub fn into_update(self) -> DocrefResult<UpdateParams> {
        match self {
            Payload::Update(params) => Ok(params),
            other => Err(mismatch("update", &other)),
        }
    }

    pub fn into_pipeline(self) -> DocrefResult<Vec<AggregateStage>> {
        match self {
            Payload::Pipeline(stages) => Ok(stages),
            other => Err(mismatch("pipeline", &other)),
        }
    }

    pub fn into_refresh(self) -> DocrefResult<RefreshParams> {
        match self {
            Payload::Refresh(params) => Ok(params),
            Payload::None => Ok(RefreshParams::default()),
            other => Err(mismatch("refresh", &other)),
        }
    }

    pub fn into_count(self) -> DocrefResult<u64> {
        match self {
            Payload::Count(count) => Ok(count),
            other => Err(mismatch("count", &other)),
        }
    }

    pub fn into_update_result(self) -> DocrefResult<UpdateResult> {
        match self {
            Payload::UpdateResult(result) => Ok(result),
            other => Err(mismatch("update result", &other)),
        }
    }

    pub fn into_delete_result(self) -> DocrefResult<DeleteResult> {
        match self {
            Payload::DeleteResult(result) => Ok(result),
            other => Err(mismatch("delete result", &other)),
        }
    }

    pub fn into_bulk_write(self) -> DocrefResult<BulkWriteResult> {
        match self {
            Payload::BulkWrite(result) => Ok(result),
            other => Err(mismatch("bulk write result", &other)),
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Payload::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

impl From<Document> for Payload {
    fn from(doc: Document) -> Self {
        Payload::Document(doc)
    }
}

impl From<Option<Document>> for Payload {
    fn from(doc: Option<Document>) -> Self {
        match doc {
            Some(doc) => Payload::Document(doc),
            None => Payload::None,
        }
    }
}

impl From<Vec<Document>> for Payload {
    fn from(docs: Vec<Document>) -> Self {
        Payload::Documents(docs)
    }
}

impl From<QueryParams> for Payload {
    fn from(params: QueryParams) -> Self {
        Payload::Query(params)
    }
}

impl From<UpdateParams> for Payload {
    fn from(params: UpdateParams) -> Self {
        Payload::Update(params)
    }
}

impl From<RefreshParams> for Payload {
    fn from(params: RefreshParams) -> Self {
        Payload::Refresh(params)
    }
}

fn mismatch(expected: &str, actual: &Payload) -> DocrefError {
    log::error!(
        "Expected a {} payload, found {}",
        expected,
        actual.kind_name()
    );
    DocrefError::new(
        &format!(
            "Expected a {} payload, found {}",
            expected,
            actual.kind_name()
        ),
        ErrorKind::InvalidDataType,
    )
}
