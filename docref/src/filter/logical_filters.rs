use std::{any::Any, fmt::Display};

use crate::{collection::Document, errors::DocrefResult};

use super::{Filter, FilterProvider};

fn join_filters(filters: &[Filter], separator: &str) -> String {
    filters
        .iter()
        .map(|filter| filter.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub(crate) struct AndFilter {
    filters: Vec<Filter>,
}

impl AndFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        AndFilter { filters }
    }
}

impl Display for AndFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join_filters(&self.filters, " && "))
    }
}

impl FilterProvider for AndFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        for filter in &self.filters {
            if !filter.apply(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn logical_filters(&self) -> Option<&[Filter]> {
        Some(&self.filters)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct OrFilter {
    filters: Vec<Filter>,
}

impl OrFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        OrFilter { filters }
    }
}

impl Display for OrFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join_filters(&self.filters, " || "))
    }
}

impl FilterProvider for OrFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        for filter in &self.filters {
            if filter.apply(entry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn logical_filters(&self) -> Option<&[Filter]> {
        Some(&self.filters)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct NotFilter {
    filter: [Filter; 1],
}

impl NotFilter {
    pub(crate) fn new(filter: Filter) -> Self {
        NotFilter { filter: [filter] }
    }
}

impl Display for NotFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(not {})", self.filter[0])
    }
}

impl FilterProvider for NotFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        Ok(!self.filter[0].apply(entry)?)
    }

    fn logical_filters(&self) -> Option<&[Filter]> {
        Some(&self.filter)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
