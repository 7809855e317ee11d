use crate::collection::Document;
use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use std::fmt::Display;

/// A single field modification.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOperation {
    /// Replace the value at the path.
    Set(String, Value),
    /// Remove the value at the path.
    Unset(String),
}

impl UpdateOperation {
    pub fn path(&self) -> &str {
        match self {
            UpdateOperation::Set(path, _) => path,
            UpdateOperation::Unset(path) => path,
        }
    }
}

/// An ordered list of field modifications applied to matching documents.
///
/// ```ignore
/// let update = set("status", "archived").unset("draft");
/// update.apply(&mut doc)?;
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    operations: Vec<UpdateOperation>,
}

pub fn set<T: Into<Value>>(path: &str, value: T) -> Update {
    Update::new().set(path, value)
}

pub fn unset(path: &str) -> Update {
    Update::new().unset(path)
}

impl Update {
    pub fn new() -> Self {
        Update::default()
    }

    /// Builds an update that sets every top level field of `doc` except `_id`.
    pub fn from_document(doc: &Document) -> Self {
        let operations = doc
            .iter()
            .filter(|(key, _)| key.as_str() != DOC_ID)
            .map(|(key, value)| UpdateOperation::Set(key.clone(), value.clone()))
            .collect();
        Update { operations }
    }

    pub fn set<T: Into<Value>>(mut self, path: &str, value: T) -> Self {
        self.operations
            .push(UpdateOperation::Set(path.to_string(), value.into()));
        self
    }

    pub fn unset(mut self, path: &str) -> Self {
        self.operations.push(UpdateOperation::Unset(path.to_string()));
        self
    }

    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Checks whether any operation writes at `field`, inside it, or at one
    /// of its parents.
    pub fn touches(&self, field: &str) -> bool {
        self.operations.iter().any(|op| {
            let path = op.path();
            path == field
                || path.starts_with(&format!("{}{}", field, FIELD_SEPARATOR))
                || field.starts_with(&format!("{}{}", path, FIELD_SEPARATOR))
        })
    }

    /// Applies every operation in order. Returns whether the document changed.
    ///
    /// Updates that would modify `_id` are rejected.
    pub fn apply(&self, doc: &mut Document) -> DocrefResult<bool> {
        let before = doc.clone();
        for op in &self.operations {
            if op.path() == DOC_ID {
                log::error!("Document id cannot be modified by an update");
                return Err(DocrefError::new(
                    "Document id cannot be modified by an update",
                    ErrorKind::InvalidOperation,
                ));
            }

            match op {
                UpdateOperation::Set(path, value) => doc.put(path.as_str(), value.clone())?,
                UpdateOperation::Unset(path) => doc.remove(path)?,
            }
        }
        Ok(*doc != before)
    }
}

impl Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .operations
            .iter()
            .map(|op| match op {
                UpdateOperation::Set(path, value) => format!("$set {} = {}", path, value),
                UpdateOperation::Unset(path) => format!("$unset {}", path),
            })
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
