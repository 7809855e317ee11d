use std::{any::Any, cmp::Ordering, fmt::Display};

use crate::{collection::Document, common::Value, errors::DocrefResult};

use super::{values_match, FilterProvider};

pub(crate) struct AllFilter;

impl FilterProvider for AllFilter {
    fn apply(&self, _entry: &Document) -> DocrefResult<bool> {
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllFilter")
    }
}

/// Exact equality on a field. An array field only matches an array value;
/// use [ContainsFilter] to test membership.
pub(crate) struct EqualsFilter {
    field_name: String,
    field_value: Value,
}

impl EqualsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        EqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for EqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for EqualsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        let value = entry.get(&self.field_name)?;
        Ok(values_match(&value, &self.field_value))
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct NotEqualsFilter {
    field_name: String,
    field_value: Value,
}

impl NotEqualsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        NotEqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for NotEqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} != {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for NotEqualsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        let value = entry.get(&self.field_name)?;
        Ok(!values_match(&value, &self.field_value))
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches when the field holds one of the given values. An array field
/// matches when any of its elements does.
pub(crate) struct InFilter {
    field_name: String,
    field_value: Value,
}

impl InFilter {
    #[inline]
    pub(crate) fn new(field_name: String, values: Vec<Value>) -> Self {
        InFilter {
            field_name,
            field_value: Value::Array(values),
        }
    }

    fn values(&self) -> &[Value] {
        match &self.field_value {
            Value::Array(values) => values,
            _ => &[],
        }
    }

    fn contains(&self, candidate: &Value) -> bool {
        self.values().iter().any(|v| values_match(candidate, v))
    }
}

impl Display for InFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        write!(f, "({} in [{}])", self.field_name, values.join(", "))
    }
}

impl FilterProvider for InFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        match entry.get(&self.field_name)? {
            Value::Array(items) => Ok(items.iter().any(|item| self.contains(item))),
            value => Ok(self.contains(&value)),
        }
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches when an array field has an element equal to the value.
pub(crate) struct ContainsFilter {
    field_name: String,
    field_value: Value,
}

impl ContainsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        ContainsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for ContainsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} contains {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for ContainsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        match entry.get(&self.field_name)? {
            Value::Array(items) => Ok(items
                .iter()
                .any(|item| values_match(item, &self.field_value))),
            _ => Ok(false),
        }
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches on presence (non-null) or absence of a field.
pub(crate) struct ExistsFilter {
    field_name: String,
    exists: bool,
}

impl ExistsFilter {
    #[inline]
    pub(crate) fn new(field_name: String, exists: bool) -> Self {
        ExistsFilter { field_name, exists }
    }
}

impl Display for ExistsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} exists {})", self.field_name, self.exists)
    }
}

impl FilterProvider for ExistsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        let present = !entry.get(&self.field_name)?.is_null();
        Ok(present == self.exists)
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ComparisonMode {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
}

/// Ordered comparison on a field. Nulls never match.
pub(crate) struct ComparisonFilter {
    field_name: String,
    field_value: Value,
    mode: ComparisonMode,
}

impl ComparisonFilter {
    #[inline]
    pub(crate) fn new(field_name: String, field_value: Value, mode: ComparisonMode) -> Self {
        ComparisonFilter {
            field_name,
            field_value,
            mode,
        }
    }
}

impl Display for ComparisonFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.mode {
            ComparisonMode::Greater => ">",
            ComparisonMode::GreaterEqual => ">=",
            ComparisonMode::Lesser => "<",
            ComparisonMode::LesserEqual => "<=",
        };
        write!(f, "({} {} {})", self.field_name, op, self.field_value)
    }
}

impl FilterProvider for ComparisonFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocrefResult<bool> {
        let value = entry.get(&self.field_name)?;
        if value.is_null() {
            return Ok(false);
        }

        let ordering = value.cmp(&self.field_value);
        Ok(match self.mode {
            ComparisonMode::Greater => ordering == Ordering::Greater,
            ComparisonMode::GreaterEqual => ordering != Ordering::Less,
            ComparisonMode::Lesser => ordering == Ordering::Less,
            ComparisonMode::LesserEqual => ordering != Ordering::Greater,
        })
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
