use crate::collection::{Document, DocumentId};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

/// Compare two floats with NaN sorted after every other value.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// A value stored in a [Document] field.
///
/// Values are either scalars ([Value::Bool], [Value::I64], [Value::String], ...),
/// document ids ([Value::Id]) or containers ([Value::Document], [Value::Array]).
/// Integers of different widths compare equal when numerically equal, so a
/// field written as `5u64` matches a filter on `5i64`.
///
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let doc = doc! { age: 42, name: "Alice" };
/// ```
#[derive(Clone, Default, serde::Deserialize, serde::Serialize)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    /// A generated document identifier.
    Id(DocumentId),
    /// A nested document.
    Document(Document),
    /// An ordered list of values.
    Array(Vec<Value>),
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string(0))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pretty_json(0))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return a == b;
        }

        if self.is_number() && other.is_number() {
            if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
                return num_cmp_float(a, b) == Ordering::Equal;
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Id(a), Value::Id(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return a.cmp(&b);
        }

        if self.is_number() && other.is_number() {
            if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
                return num_cmp_float(a, b);
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            // nulls sort first
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Id(a), Value::Id(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl Value {
    pub fn from<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    pub fn from_option<T: Into<Value>>(value: Option<T>) -> Value {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }

    pub fn from_vec<T: Into<Value>>(values: Vec<T>) -> Value {
        Value::Array(values.into_iter().map(Into::into).collect())
    }

    pub fn as_bool(&self) -> Option<&bool> {
        match self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&i64> {
        match self {
            Value::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<&u64> {
        match self {
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&f64> {
        match self {
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a wide integer if it is any integer variant.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I64(v) => Some(*v as i128),
            Value::U64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Returns the value as a float if it is any numeric variant.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&DocumentId> {
        match self {
            Value::Id(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::I64(_) | Value::U64(_) | Value::F64(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_id(&self) -> bool {
        matches!(self, Value::Id(_))
    }

    /// Checks whether the value can stand for a document identifier:
    /// a generated id, a string or an integer.
    pub fn is_id_like(&self) -> bool {
        matches!(
            self,
            Value::Id(_) | Value::String(_) | Value::I64(_) | Value::U64(_)
        )
    }

    /// Stringified identity used whenever ids from different documents are compared.
    ///
    /// Returns `None` for values that cannot be ids. A string id and a generated
    /// id with the same rendering produce the same key.
    pub fn id_key(&self) -> Option<String> {
        match self {
            Value::Id(id) => Some(id.id_value().to_string()),
            Value::String(s) => Some(s.clone()),
            Value::I64(v) => Some(v.to_string()),
            Value::U64(v) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Truthiness in the loose sense used for reference presence checks.
    ///
    /// `Null`, `false`, numeric zero and the empty string are falsy; ids,
    /// documents and arrays (even empty ones) are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::I64(v) => *v != 0,
            Value::U64(v) => *v != 0,
            Value::F64(v) => *v != 0.0 && !v.is_nan(),
            Value::String(v) => !v.is_empty(),
            Value::Id(_) | Value::Document(_) | Value::Array(_) => true,
        }
    }

    /// Moves the value out, leaving [Value::Null] behind.
    pub fn take(&mut self) -> Value {
        std::mem::replace(self, Value::Null)
    }

    pub(crate) fn to_pretty_json(&self, indent: usize) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::String(v) => format!("\"{}\"", v),
            Value::Id(v) => format!("\"{}\"", v),
            Value::Document(v) => v.to_pretty_json(indent),
            Value::Array(v) => {
                if v.is_empty() {
                    return "[]".to_string();
                }

                let mut json_str = String::new();
                json_str.push_str("[\n");
                let indent_str = " ".repeat(indent + 2);
                for value in v {
                    json_str.push_str(&format!(
                        "{}{},\n",
                        indent_str,
                        value.to_pretty_json(indent + 2)
                    ));
                }
                json_str.pop(); // remove last newline
                json_str.pop(); // remove last comma
                json_str.push_str(&format!("\n{}]", " ".repeat(indent)));
                json_str
            }
        }
    }

    pub(crate) fn to_debug_string(&self, indent: usize) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => format!("bool({})", v),
            Value::I64(v) => format!("i64({})", v),
            Value::U64(v) => format!("u64({})", v),
            Value::F64(v) => format!("f64({})", v),
            Value::String(v) => format!("string(\"{}\")", v),
            Value::Id(v) => format!("id(\"{}\")", v),
            Value::Document(v) => format!("object({})", v.to_debug_string(indent)),
            Value::Array(v) => {
                if v.is_empty() {
                    return "array([])".to_string();
                }

                let mut debug_str = String::new();
                debug_str.push_str("array([\n");
                let indent_str = " ".repeat(indent + 2);
                for value in v {
                    debug_str.push_str(&format!(
                        "{}{},\n",
                        indent_str,
                        value.to_debug_string(indent + 2)
                    ));
                }
                debug_str.pop();
                debug_str.pop();
                debug_str.push_str(&format!("\n{}])", " ".repeat(indent)));
                debug_str
            }
        }
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(value: i32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u32> for Value {
    #[inline]
    fn from(value: u32) -> Self {
        Value::U64(value as u64)
    }
}

impl From<u64> for Value {
    #[inline]
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<usize> for Value {
    #[inline]
    fn from(value: usize) -> Self {
        Value::U64(value as u64)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    #[inline]
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<DocumentId> for Value {
    #[inline]
    fn from(value: DocumentId) -> Self {
        Value::Id(value)
    }
}

impl From<Document> for Value {
    #[inline]
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    #[inline]
    fn from(value: Vec<T>) -> Self {
        Value::from_vec(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        Value::from_option(value)
    }
}
