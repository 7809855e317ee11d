use crate::collection::DocumentId;
use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use im::OrdMap;
use itertools::Itertools;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

/// A schemaless record of named fields.
///
/// Keys are [String]s and values are [Value]s. Nested documents are addressed
/// with dotted paths, so `doc.get("category.name")` reads the `name` field of
/// the embedded `category` document. A path segment that parses as an integer
/// indexes into an array; any other segment applied to an array collects the
/// field from every element.
///
/// The `_id` field holds the document identity. It is either a generated
/// [DocumentId] or a caller-supplied string or integer.
///
/// Backed by `im::OrdMap`, so cloning a document is O(1) and every mutation
/// produces an independent copy through structural sharing.
#[derive(Clone, Eq, PartialEq, Default, Ord, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Associates `value` with `key`, replacing whatever was there.
    ///
    /// A dotted key writes into (and creates when missing) the embedded
    /// documents along the path; the value at the final segment is replaced
    /// in full, never merged.
    ///
    /// # Errors
    ///
    /// * the key or one of its segments is empty
    /// * the key is `_id` and the value cannot be an identifier
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.put("category.name", "Laptops")?;
    /// assert_eq!(doc.get("category.name")?, Value::from("Laptops"));
    /// ```
    pub fn put<'a, T: Into<Value>>(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        value: T,
    ) -> DocrefResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocrefError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        let value = value.into();
        if key == DOC_ID && !value.is_id_like() {
            log::error!("Document id must be a generated id, a string or an integer, found {:?}", value);
            return Err(DocrefError::new(
                &format!(
                    "Document id must be a generated id, a string or an integer, found {}",
                    value
                ),
                ErrorKind::InvalidId,
            ));
        }

        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data = self.data.update(key.to_string(), value);
            Ok(())
        }
    }

    /// Returns the value at `key`, or [Value::Null] when there is none.
    ///
    /// ```ignore
    /// let doc = doc!{ items: [{ name: "a" }, { name: "b" }] };
    /// assert_eq!(doc.get("items.1.name")?, Value::from("b"));
    /// assert_eq!(doc.get("items.name")?, Value::from(vec!["a", "b"]));
    /// ```
    pub fn get(&self, key: &str) -> DocrefResult<Value> {
        match self.data.get(key) {
            Some(value) => Ok(value.clone()),
            None if key.contains(FIELD_SEPARATOR) => self.get_by_embedded_key(key),
            None => Ok(Value::Null),
        }
    }

    /// Returns the `_id` value if one is set.
    pub fn id(&self) -> Option<&Value> {
        match self.data.get(DOC_ID) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    /// Returns the `_id` value, generating and storing a new [DocumentId]
    /// first when the document has none.
    pub fn ensure_id(&mut self) -> Value {
        if let Some(id) = self.id() {
            return id.clone();
        }
        let id = Value::Id(DocumentId::new());
        self.data = self.data.update(DOC_ID.to_string(), id.clone());
        id
    }

    /// Lists every leaf field path, descending into embedded documents.
    pub fn fields(&self) -> Vec<String> {
        self.get_fields_internal("")
    }

    /// Removes `key`. Removing the last field of an embedded document removes
    /// the embedded document as well.
    pub fn remove(&mut self, key: &str) -> DocrefResult<()> {
        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_remove(&splits)
        } else {
            self.data = self.data.without(key);
            Ok(())
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Merges `other` into this document. Embedded documents merge
    /// recursively; every other value overwrites.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (value, self.data.get(key)) {
                (Value::Document(theirs), Some(Value::Document(ours))) => {
                    let mut nested = ours.clone();
                    nested.merge(theirs);
                    self.data = self.data.update(key.clone(), Value::Document(nested));
                }
                _ => {
                    self.data = self.data.update(key.clone(), value.clone());
                }
            }
        }
    }

    /// Checks whether a top level key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Checks whether a top level or embedded field exists.
    pub fn contains_field(&self, field: &str) -> bool {
        if self.contains_key(field) {
            true
        } else {
            self.fields()
                .iter()
                .any(|f| f == field || f.starts_with(&format!("{}{}", field, FIELD_SEPARATOR)))
        }
    }

    /// Checks whether `path` holds a truthy value.
    ///
    /// Missing fields, `null`, `false`, zero and the empty string all count as
    /// not populated.
    pub fn is_populated(&self, path: &str) -> bool {
        match self.get(path) {
            Ok(value) => value.is_truthy(),
            Err(_) => false,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub(crate) fn to_pretty_json(&self, indent: usize) -> String {
        if self.data.is_empty() {
            return "{}".to_string();
        }

        let mut json_string = String::with_capacity(self.data.len() * 30 + indent * 2);
        json_string.push_str("{\n");
        let indent_str = " ".repeat(indent + 2);
        for (key, value) in self.data.iter() {
            json_string.push_str(&format!(
                "{}\"{}\": {},\n",
                indent_str,
                key,
                value.to_pretty_json(indent + 2)
            ));
        }

        json_string.pop();
        json_string.pop();
        json_string.push_str(&format!("\n{}}}", " ".repeat(indent)));
        json_string
    }

    pub(crate) fn to_debug_string(&self, indent: usize) -> String {
        if self.data.is_empty() {
            return "{}".to_string();
        }

        let mut debug_string = String::from("{\n");
        let indent_str = " ".repeat(indent + 2);
        for (key, value) in self.data.iter() {
            debug_string.push_str(&format!(
                "{}\"{}\": {},\n",
                indent_str,
                key,
                value.to_debug_string(indent + 2)
            ));
        }

        debug_string.pop();
        debug_string.pop();
        debug_string.push_str(&format!("\n{}}}", " ".repeat(indent)));
        debug_string
    }

    fn get_fields_internal(&self, prefix: &str) -> Vec<String> {
        let mut fields = Vec::new();
        for (key, value) in self.data.iter() {
            if key.is_empty() {
                continue;
            }

            let field = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", prefix, FIELD_SEPARATOR, key)
            };

            match value {
                Value::Document(doc) if !doc.is_empty() => {
                    fields.append(&mut doc.get_fields_internal(&field))
                }
                _ => fields.push(field),
            }
        }
        fields
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> DocrefResult<()> {
        let Some((&key, rest)) = splits.split_first() else {
            log::error!("Empty embedded key");
            return Err(DocrefError::new("Empty embedded key", ErrorKind::InvalidFieldName));
        };

        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocrefError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        if rest.is_empty() {
            self.data = self.data.update(key.to_string(), value);
            return Ok(());
        }

        // a non-document value along the path is replaced by a fresh document
        let mut nested = match self.data.get(key) {
            Some(Value::Document(obj)) => obj.clone(),
            _ => Document::new(),
        };
        nested.deep_put(rest, value)?;
        self.data = self.data.update(key.to_string(), Value::Document(nested));
        Ok(())
    }

    fn deep_remove(&mut self, splits: &[&str]) -> DocrefResult<()> {
        let Some((&key, rest)) = splits.split_first() else {
            log::error!("Empty embedded key");
            return Err(DocrefError::new("Empty embedded key", ErrorKind::InvalidFieldName));
        };

        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocrefError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        if rest.is_empty() {
            self.data = self.data.without(key);
            return Ok(());
        }

        if let Some(Value::Document(obj)) = self.data.get(key) {
            let mut nested = obj.clone();
            nested.deep_remove(rest)?;
            if nested.is_empty() {
                self.data = self.data.without(key);
            } else {
                self.data = self.data.update(key.to_string(), Value::Document(nested));
            }
        }
        Ok(())
    }

    fn get_by_embedded_key(&self, key: &str) -> DocrefResult<Value> {
        let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
        let first = splits[0];
        if first.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocrefError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        Self::recursive_get(self.data.get(first), &splits[1..])
    }

    fn recursive_get(value: Option<&Value>, splits: &[&str]) -> DocrefResult<Value> {
        let Some(value) = value else {
            return Ok(Value::Null);
        };

        let Some((&key, rest)) = splits.split_first() else {
            return Ok(value.clone());
        };

        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocrefError::new(
                "Document does not support empty key",
                ErrorKind::InvalidFieldName,
            ));
        }

        match value {
            Value::Document(obj) => Self::recursive_get(obj.data.get(key), rest),
            Value::Array(arr) => match key.parse::<usize>() {
                Ok(index) => Self::recursive_get(arr.get(index), rest),
                Err(_) => Self::decompose(arr, splits),
            },
            _ => Ok(Value::Null),
        }
    }

    fn decompose(arr: &[Value], splits: &[&str]) -> DocrefResult<Value> {
        let mut items: Vec<Value> = Vec::with_capacity(arr.len());
        for item in arr {
            match Self::recursive_get(Some(item), splits)? {
                Value::Array(values) => items.extend(values),
                Value::Null => {}
                value => items.push(value),
            }
        }
        Ok(Value::Array(items.into_iter().unique_by(|v| v.to_string()).collect()))
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string(0))
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pretty_json(0))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// ```rust
/// use docref::doc;
///
/// let category = doc! {
///     _id: "c1",
///     name: "Laptops",
///     tags: ["portable", "electronics"],
///     meta: { rank: 1 }
/// };
/// assert_eq!(category.size(), 4);
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put(&$crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Converts a single `doc!` value: nested documents, arrays or any
/// expression convertible into a [Value].
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
