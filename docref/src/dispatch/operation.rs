use crate::common::{ENTITY_PREFIX, EVENT_SEPARATOR};
use std::fmt::Display;

/// The operations a CRUD service answers, one event per operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    FindById,
    FindOne,
    FindMany,
    CreateOne,
    CreateMany,
    Save,
    ReplaceOne,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    Count,
    Aggregate,
    Validate,
    /// Recomputes the reference caches of the matching documents.
    RefreshRefCache,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FindById => "findById",
            Operation::FindOne => "findOne",
            Operation::FindMany => "findMany",
            Operation::CreateOne => "createOne",
            Operation::CreateMany => "createMany",
            Operation::Save => "save",
            Operation::ReplaceOne => "replaceOne",
            Operation::UpdateOne => "updateOne",
            Operation::UpdateMany => "updateMany",
            Operation::DeleteOne => "deleteOne",
            Operation::DeleteMany => "deleteMany",
            Operation::Count => "count",
            Operation::Aggregate => "aggregate",
            Operation::Validate => "validate",
            Operation::RefreshRefCache => "refreshRefCache",
        }
    }

    pub fn all() -> &'static [Operation] {
        &[
            Operation::FindById,
            Operation::FindOne,
            Operation::FindMany,
            Operation::CreateOne,
            Operation::CreateMany,
            Operation::Save,
            Operation::ReplaceOne,
            Operation::UpdateOne,
            Operation::UpdateMany,
            Operation::DeleteOne,
            Operation::DeleteMany,
            Operation::Count,
            Operation::Aggregate,
            Operation::Validate,
            Operation::RefreshRefCache,
        ]
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The namespace every handler of `entity` lives under, `entity.<Name>`.
pub fn entity_namespace(entity: &str) -> String {
    format!("{}{}{}", ENTITY_PREFIX, EVENT_SEPARATOR, entity)
}

/// The event name of `operation` on `entity`, `entity.<Name>.<operation>`.
pub fn event_name(entity: &str, operation: Operation) -> String {
    format!(
        "{}{}{}",
        entity_namespace(entity),
        EVENT_SEPARATOR,
        operation.as_str()
    )
}
