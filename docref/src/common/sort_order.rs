/// Direction used when sorting query results.
///
/// ```text
/// let options = FindOptions::new().sort_by("name", SortOrder::Ascending);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}
