//! Document predicates.
//!
//! Filters are built with the fluent [field] API and combined with [and],
//! [or] and [not]:
//!
//! ```rust,ignore
//! use docref::filter::{field, and};
//!
//! let filter = and(vec![
//!     field("categoryId").eq("c1"),
//!     field("price").gte(1000),
//! ]);
//! ```
//!
//! Identifier-like values (generated ids, strings, integers) compare by their
//! stringified form, so `by_id("1234567890123456789")` finds a document whose
//! generated id renders the same way.

mod basic_filters;
mod filter;
mod fluent;
mod logical_filters;

pub(crate) use basic_filters::*;
pub use filter::*;
pub use fluent::*;
pub(crate) use logical_filters::*;
