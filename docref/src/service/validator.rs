use crate::collection::Document;
use crate::errors::{DocrefError, DocrefResult, ErrorKind};

/// The schema layer of a service.
///
/// A validator sees every document before it is saved and returns the
/// document to persist, which may be a normalized version of its input.
pub trait Validator: Send + Sync {
    fn validate(&self, document: Document) -> DocrefResult<Document>;
}

/// Accepts every document unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl Validator for PassThrough {
    fn validate(&self, document: Document) -> DocrefResult<Document> {
        Ok(document)
    }
}

/// Adapts a closure into a [Validator].
pub struct FnValidator<F> {
    validate: F,
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(Document) -> DocrefResult<Document> + Send + Sync,
{
    fn validate(&self, document: Document) -> DocrefResult<Document> {
        (self.validate)(document)
    }
}

pub fn validator_fn<F>(validate: F) -> FnValidator<F>
where
    F: Fn(Document) -> DocrefResult<Document> + Send + Sync,
{
    FnValidator { validate }
}

/// Rejects documents missing any of the listed fields.
#[derive(Clone, Debug)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new(fields: &[&str]) -> Self {
        RequiredFields {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Validator for RequiredFields {
    fn validate(&self, document: Document) -> DocrefResult<Document> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| document.get(f).map(|v| v.is_null()).unwrap_or(true))
            .map(|f| f.as_str())
            .collect();

        if missing.is_empty() {
            Ok(document)
        } else {
            log::error!("Document is missing required field(s) {}", missing.join(", "));
            Err(DocrefError::new(
                &format!("Document is missing required field(s) {}", missing.join(", ")),
                ErrorKind::ValidationError,
            ))
        }
    }
}
