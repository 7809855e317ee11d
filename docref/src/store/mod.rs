//! Document persistence.
//!
//! [DocumentStoreProvider] is the storage seam: services read and write
//! documents only through it. [InMemoryStore] is the bundled implementation.

mod aggregate;
mod document_store;
mod memory;
mod write_result;

pub use aggregate::*;
pub use document_store::*;
pub use memory::*;
pub use write_result::*;
