//! # docref
//!
//! Document CRUD services that understand references between entities.
//!
//! A field holding the id (or ids) of documents of another entity is declared
//! with a [reference::ReferenceDescriptor]. On top of that declaration docref
//! offers two ways to read related data:
//!
//! - **Expand**: a find may ask for references to be joined into its result
//!   at read time. Referenced documents are fetched in batches, one
//!   `findMany` per reference for a list of documents.
//! - **Reference cache**: selected fields of referenced documents are
//!   embedded into the owning document when it is saved. Replacing a
//!   referenced document pushes the change into every owner, and a bulk
//!   refresh can recompute caches for a whole collection.
//!
//! Services never call each other directly. Every operation is an event
//! routed by a [dispatch::Dispatcher], so a service fetching categories only
//! knows the event `entity.Category.findMany`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docref::dispatch::{Dispatcher, Payload, QueryParams};
//! use docref::filter::all;
//! use docref::reference::ReferenceDescriptor;
//! use docref::service::{CrudService, ServiceConfig};
//! use docref::store::InMemoryStore;
//! use docref::doc;
//!
//! let dispatcher = Dispatcher::new();
//! let store = InMemoryStore::document_store();
//!
//! CrudService::new(ServiceConfig::builder("Category").build()?, store.clone())
//!     .register(&dispatcher)?;
//! CrudService::new(
//!     ServiceConfig::builder("Product")
//!         .reference(
//!             ReferenceDescriptor::new("categoryId", "Category")
//!                 .cache("cache.category", &["name"]),
//!         )
//!         .build()?,
//!     store.clone(),
//! )
//! .register(&dispatcher)?;
//!
//! dispatcher.dispatch(
//!     "entity.Category.createOne",
//!     Payload::from(doc! { _id: "c1", name: "Laptops" }),
//! )?;
//! let product = dispatcher
//!     .dispatch(
//!         "entity.Product.createOne",
//!         Payload::from(doc! { name: "MacBook Pro", categoryId: "c1" }),
//!     )?
//!     .into_document()?;
//! // product.cache.category.name == "Laptops"
//!
//! let expanded = dispatcher
//!     .dispatch(
//!         "entity.Product.findMany",
//!         Payload::from(QueryParams::new(all()).expand("categoryId", "category")),
//!     )?
//!     .into_documents()?;
//! ```
//!
//! ## Modules
//!
//! - [`collection`] - Documents, ids, updates and find options
//! - [`common`] - Values, constants and task utilities
//! - [`dispatch`] - Event routing between services
//! - [`errors`] - Error types
//! - [`filter`] - Document predicates
//! - [`reference`] - Reference expansion and the reference cache
//! - [`service`] - CRUD services, their configuration and middleware
//! - [`store`] - Document persistence

use crate::collection::snowflake::SnowflakeIdGenerator;
use std::sync::LazyLock;

pub mod collection;
pub mod common;
pub mod dispatch;
pub mod errors;
pub mod filter;
pub mod reference;
pub mod service;
pub mod store;

pub(crate) static ID_GENERATOR: LazyLock<SnowflakeIdGenerator> =
    LazyLock::new(SnowflakeIdGenerator::new);
