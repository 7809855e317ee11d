use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::ID_GENERATOR;
use std::fmt::{Debug, Display};

const MIN_VALUE: u64 = 1_000_000_000_000_000_000;
const MAX_VALUE: u64 = 10_000_000_000_000_000_000;

/// A generated document identifier.
///
/// Stores assign a `DocumentId` to every inserted document that does not carry
/// its own `_id`. Ids come from a Snowflake-style generator and fall in the
/// range [10^18, 10^19), so they are roughly time ordered and always render as
/// 19 decimal digits.
///
/// ```rust,ignore
/// let id = DocumentId::new();
/// let same = DocumentId::create_id(id.id_value())?;
/// assert_eq!(id, same);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct DocumentId {
    id_value: u64,
}

impl DocumentId {
    pub fn new() -> Self {
        DocumentId {
            id_value: ID_GENERATOR.get_id(),
        }
    }

    /// Wraps an existing id value after checking its range.
    pub fn create_id(id_value: u64) -> DocrefResult<DocumentId> {
        DocumentId::valid_id(id_value)?;
        Ok(DocumentId { id_value })
    }

    /// Parses the decimal rendering of an id.
    pub fn parse(value: &str) -> DocrefResult<DocumentId> {
        match value.parse::<u64>() {
            Ok(id_value) => DocumentId::create_id(id_value),
            Err(_) => {
                log::error!("'{}' is not a valid document id", value);
                Err(DocrefError::new(
                    &format!("'{}' is not a valid document id", value),
                    ErrorKind::InvalidId,
                ))
            }
        }
    }

    pub fn id_value(&self) -> u64 {
        self.id_value
    }

    pub(crate) fn valid_id(id_value: u64) -> DocrefResult<()> {
        if id_value >= MAX_VALUE {
            log::error!("Id value {} is too large", id_value);
            return Err(DocrefError::new(
                &format!("Id validation error: id value must be less than 10^19 ({})", MAX_VALUE),
                ErrorKind::InvalidId,
            ));
        } else if id_value < MIN_VALUE {
            log::error!("Id value {} is too small", id_value);
            return Err(DocrefError::new(
                &format!(
                    "Id validation error: id value must be greater than or equal to 10^18 ({})",
                    MIN_VALUE
                ),
                ErrorKind::InvalidId,
            ));
        }
        Ok(())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        DocumentId::new()
    }
}

impl Debug for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentId({})", self.id_value)
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_value)
    }
}
