use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::DocrefResult;
use std::any::Any;
use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::sync::Arc;

use super::{AllFilter, AndFilter, EqualsFilter, NotFilter, OrFilter};

/// A predicate over documents.
///
/// Stores evaluate filters one document at a time through [FilterProvider::apply].
/// Field filters expose their field name and value so callers can inspect a
/// filter without evaluating it.
pub trait FilterProvider: Any + Send + Sync + Display {
    fn apply(&self, entry: &Document) -> DocrefResult<bool>;

    /// The field this filter tests, if it tests a single field.
    fn field_name(&self) -> Option<&str> {
        None
    }

    /// The value this filter compares against, if any.
    fn field_value(&self) -> Option<&Value> {
        None
    }

    /// The child filters of a logical filter.
    fn logical_filters(&self) -> Option<&[Filter]> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A shareable, type-erased [FilterProvider].
///
/// ```ignore
/// let filter = field("categoryId").eq("c1").and(field("active").eq(true));
/// ```
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter {
            inner: Arc::new(inner),
        }
    }

    pub fn and(&self, filter: Filter) -> Self {
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    pub fn not(&self) -> Self {
        Filter::new(NotFilter::new(self.clone()))
    }
}

impl Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter{}", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Compares two values, treating identifiers by their stringified form so a
/// generated id matches its decimal string rendering.
#[inline]
pub(crate) fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual.id_key(), expected.id_key()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

pub fn all() -> Filter {
    Filter::new(AllFilter {})
}

/// Matches the document whose `_id` equals `id`.
pub fn by_id<T: Into<Value>>(id: T) -> Filter {
    Filter::new(EqualsFilter::new(DOC_ID.to_string(), id.into()))
}

pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::new(AndFilter::new(filters))
}

pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::new(OrFilter::new(filters))
}

pub fn not(filter: Filter) -> Filter {
    Filter::new(NotFilter::new(filter))
}

pub(crate) fn is_all_filter(filter: &Filter) -> bool {
    filter.as_any().is::<AllFilter>()
}

pub(crate) fn is_and_filter(filter: &Filter) -> bool {
    filter.as_any().is::<AndFilter>()
}

pub(crate) fn is_equals_filter(filter: &Filter) -> bool {
    filter.as_any().is::<EqualsFilter>()
}
