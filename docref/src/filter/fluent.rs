use crate::common::Value;

use super::{
    ComparisonFilter, ComparisonMode, ContainsFilter, EqualsFilter, ExistsFilter, Filter,
    InFilter, NotEqualsFilter,
};

/// Starts a fluent filter on `field_name`.
///
/// ```ignore
/// let filter = field("category._id").eq("c1");
/// ```
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(EqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(NotEqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn gt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::Greater,
        ))
    }

    #[inline]
    pub fn gte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::GreaterEqual,
        ))
    }

    #[inline]
    pub fn lt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::Lesser,
        ))
    }

    #[inline]
    pub fn lte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::LesserEqual,
        ))
    }

    #[inline]
    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        Filter::new(InFilter::new(
            self.field_name,
            values.into_iter().map(Into::into).collect(),
        ))
    }

    #[inline]
    pub fn contains<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ContainsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn exists(self) -> Filter {
        Filter::new(ExistsFilter::new(self.field_name, true))
    }

    #[inline]
    pub fn not_exists(self) -> Filter {
        Filter::new(ExistsFilter::new(self.field_name, false))
    }
}
