//! Reference expansion and the denormalized reference cache.
//!
//! A [ReferenceDescriptor] declares that a field of an owning document holds
//! the id(s) of documents of another entity. On top of that declaration:
//!
//! * [resolve] joins referenced documents into a query result on demand
//!   ("expand"), without touching storage;
//! * [should_generate] and [generate] embed selected fields of referenced
//!   documents into the owning document when it is saved;
//! * [ReplacePropagation] pushes a replaced referenced document into the
//!   caches of its owners;
//! * [refresh] recomputes caches for many owners in one bulk write, the
//!   repair path for anything propagation does not cover.
//!
//! Referenced documents are always fetched through the dispatcher
//! (`entity.<RefEntity>.findById` / `.findMany`), never from the store
//! directly. Ids are compared by their stringified form, see
//! [crate::common::Value::id_key].

mod descriptor;
mod fetch;
mod freshness;
mod generator;
mod propagation;
mod refresh;
mod resolver;

pub use descriptor::*;
pub use freshness::*;
pub use generator::*;
pub use propagation::*;
pub use refresh::*;
pub use resolver::*;
