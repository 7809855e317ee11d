use crate::collection::{Document, Update};
use crate::common::now_rfc3339;
use crate::errors::DocrefResult;
use crate::service::{IdGenerator, TimestampOptions};
use std::sync::Arc;

/// One concern layered onto the write path of a service.
///
/// Every hook defaults to doing nothing, so a middleware only implements the
/// stages it cares about. Hooks of a [MiddlewarePipeline] run in the order
/// the middleware were added.
pub trait WriteMiddleware: Send + Sync {
    fn name(&self) -> &str;

    /// Runs on every save, after validation and before reference caches are
    /// generated.
    fn before_save(&self, _document: &mut Document) -> DocrefResult<()> {
        Ok(())
    }

    /// Runs when a save replaces `existing`, before [WriteMiddleware::before_save].
    fn before_replace(&self, _document: &mut Document, _existing: &Document) -> DocrefResult<()> {
        Ok(())
    }

    /// Runs right before a new document is inserted.
    fn before_insert(&self, _document: &mut Document) -> DocrefResult<()> {
        Ok(())
    }

    fn before_update(&self, update: Update) -> DocrefResult<Update> {
        Ok(update)
    }
}

/// Maintains creation and modification timestamps (RFC 3339, UTC).
#[derive(Clone, Debug)]
pub struct Timestamps {
    options: TimestampOptions,
}

impl Timestamps {
    pub fn new(options: TimestampOptions) -> Self {
        Timestamps { options }
    }
}

impl WriteMiddleware for Timestamps {
    fn name(&self) -> &str {
        "timestamps"
    }

    fn before_save(&self, document: &mut Document) -> DocrefResult<()> {
        let now = now_rfc3339();
        if !document.is_populated(&self.options.create_key) {
            document.put(self.options.create_key.as_str(), now.as_str())?;
        }
        document.put(self.options.update_key.as_str(), now)
    }

    fn before_replace(&self, document: &mut Document, existing: &Document) -> DocrefResult<()> {
        // a replacement keeps the original creation time
        if !document.is_populated(&self.options.create_key) {
            let created = existing.get(&self.options.create_key)?;
            if !created.is_null() {
                document.put(self.options.create_key.as_str(), created)?;
            }
        }
        Ok(())
    }

    fn before_update(&self, update: Update) -> DocrefResult<Update> {
        Ok(update.set(&self.options.update_key, now_rfc3339()))
    }
}

/// Fills the id key of new documents from a generator.
#[derive(Clone)]
pub struct CustomId {
    key: String,
    generator: IdGenerator,
}

impl CustomId {
    pub fn new(key: &str, generator: IdGenerator) -> Self {
        CustomId {
            key: key.to_string(),
            generator,
        }
    }
}

impl WriteMiddleware for CustomId {
    fn name(&self) -> &str {
        "custom-id"
    }

    fn before_insert(&self, document: &mut Document) -> DocrefResult<()> {
        if !document.is_populated(&self.key) {
            document.put(self.key.as_str(), (self.generator)())?;
        }
        Ok(())
    }
}

/// An ordered list of [WriteMiddleware].
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    stages: Vec<Arc<dyn WriteMiddleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        MiddlewarePipeline::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn WriteMiddleware>) {
        self.stages.push(middleware);
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn before_save(&self, document: &mut Document) -> DocrefResult<()> {
        self.stages.iter().try_for_each(|m| m.before_save(document))
    }

    pub fn before_replace(&self, document: &mut Document, existing: &Document) -> DocrefResult<()> {
        self.stages
            .iter()
            .try_for_each(|m| m.before_replace(document, existing))
    }

    pub fn before_insert(&self, document: &mut Document) -> DocrefResult<()> {
        self.stages.iter().try_for_each(|m| m.before_insert(document))
    }

    pub fn before_update(&self, update: Update) -> DocrefResult<Update> {
        self.stages
            .iter()
            .try_fold(update, |update, m| m.before_update(update))
    }
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
