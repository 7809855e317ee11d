//! Per-entity CRUD services.
//!
//! A [CrudService] is built from a [ServiceConfig] and registered on a
//! [crate::dispatch::Dispatcher], where it answers every
//! `entity.<Name>.<operation>` event. Documents are validated by the
//! configured [Validator] and pass through a [MiddlewarePipeline]
//! (timestamps, custom ids, anything user supplied) before they reach the
//! store. Reference caches are generated on save and kept current by the
//! propagation listeners the service registers.

mod config;
mod crud_service;
mod middleware;
mod validator;

pub use config::*;
pub use crud_service::*;
pub use middleware::*;
pub use validator::*;
