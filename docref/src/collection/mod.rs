//! Documents and the values they hold.
//!
//! A [Document] is a persistent ordered map from field names to [crate::common::Value]s
//! with dotted-path access into embedded documents and arrays.
//!
//! ```rust,ignore
//! use docref::collection::Document;
//!
//! let mut doc = Document::new();
//! doc.put("name", "MacBook")?;
//! doc.put("category.name", "Laptops")?;
//! ```
//!
//! Every stored document carries an `_id`. Stores generate a [DocumentId] for
//! documents inserted without one; services may also supply their own string
//! or integer ids.

mod document;
mod document_id;
mod find_options;
pub(crate) mod snowflake;
mod update;
mod update_options;

pub use document::*;
pub use document_id::DocumentId;
pub use find_options::*;
pub use update::*;
pub use update_options::*;
