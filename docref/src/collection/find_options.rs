use crate::common::SortOrder;

/// Paging, ordering and projection for a find.
///
/// ```ignore
/// let options = order_by("name", SortOrder::Ascending).skip(10).limit(5);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub(crate) sort_by: Vec<(String, SortOrder)>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) projection: Option<Vec<String>>,
}

pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort_by(field_name, sort_order)
}

pub fn skip_by(skip: u64) -> FindOptions {
    FindOptions::new().skip(skip)
}

pub fn limit_to(limit: u64) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Adds a sort key; earlier keys take precedence.
    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.sort_by.push((field_name.to_string(), sort_order));
        self
    }

    /// Restricts returned documents to the given fields (plus `_id`).
    pub fn project(mut self, fields: &[&str]) -> FindOptions {
        self.projection = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn sort_fields(&self) -> &[(String, SortOrder)] {
        &self.sort_by
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    pub fn projection(&self) -> Option<&[String]> {
        self.projection.as_deref()
    }
}
