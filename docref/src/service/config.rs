use crate::common::{Value, DEFAULT_CREATE_KEY, DEFAULT_UPDATE_KEY, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use crate::reference::ReferenceDescriptor;
use crate::service::{
    CustomId, MiddlewarePipeline, PassThrough, Timestamps, Validator, WriteMiddleware,
};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

/// Produces ids for new documents.
pub type IdGenerator = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampOptions {
    pub generate: bool,
    pub create_key: String,
    pub update_key: String,
}

impl Default for TimestampOptions {
    fn default() -> Self {
        TimestampOptions {
            generate: true,
            create_key: DEFAULT_CREATE_KEY.to_string(),
            update_key: DEFAULT_UPDATE_KEY.to_string(),
        }
    }
}

impl TimestampOptions {
    pub fn disabled() -> Self {
        TimestampOptions {
            generate: false,
            ..TimestampOptions::default()
        }
    }

    pub fn with_keys(create_key: &str, update_key: &str) -> Self {
        TimestampOptions {
            generate: true,
            create_key: create_key.to_string(),
            update_key: update_key.to_string(),
        }
    }
}

/// Which field identifies documents of a service, and how new ids are made.
///
/// Without a generator, documents inserted without the key get a generated
/// `_id` from the store.
#[derive(Clone)]
pub struct IdOptions {
    pub key: String,
    pub generator: Option<IdGenerator>,
}

impl Default for IdOptions {
    fn default() -> Self {
        IdOptions {
            key: DOC_ID.to_string(),
            generator: None,
        }
    }
}

impl Debug for IdOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdOptions")
            .field("key", &self.key)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

/// The validated configuration of one CRUD service.
#[derive(Clone)]
pub struct ServiceConfig {
    entity: String,
    collection_name: String,
    timestamps: TimestampOptions,
    id: IdOptions,
    references: Vec<ReferenceDescriptor>,
    validator: Arc<dyn Validator>,
    pipeline: MiddlewarePipeline,
    track_reference_changes: bool,
}

impl ServiceConfig {
    pub fn builder(entity: &str) -> ServiceBuilder {
        ServiceBuilder::new(entity)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn timestamps(&self) -> &TimestampOptions {
        &self.timestamps
    }

    pub fn id_key(&self) -> &str {
        &self.id.key
    }

    pub fn references(&self) -> &[ReferenceDescriptor] {
        &self.references
    }

    /// References that embed a cache.
    pub fn cached_references(&self) -> impl Iterator<Item = &ReferenceDescriptor> {
        self.references.iter().filter(|d| d.has_cache())
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }

    pub fn track_reference_changes(&self) -> bool {
        self.track_reference_changes
    }
}

impl Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("entity", &self.entity)
            .field("collection_name", &self.collection_name)
            .field("timestamps", &self.timestamps)
            .field("id", &self.id)
            .field("references", &self.references)
            .field("pipeline", &self.pipeline)
            .field("track_reference_changes", &self.track_reference_changes)
            .finish()
    }
}

/// Builds a [ServiceConfig].
///
/// ```ignore
/// let config = ServiceConfig::builder("Product")
///     .namespace("shop.products")
///     .reference(
///         ReferenceDescriptor::new("categoryId", "Category").cache("cache.category", &["name"]),
///     )
///     .build()?;
/// assert_eq!(config.collection_name(), "products");
/// ```
pub struct ServiceBuilder {
    entity: String,
    namespace: Option<String>,
    collection_name: Option<String>,
    timestamps: TimestampOptions,
    id: IdOptions,
    references: Vec<ReferenceDescriptor>,
    validator: Option<Arc<dyn Validator>>,
    middleware: Vec<Arc<dyn WriteMiddleware>>,
    track_reference_changes: bool,
}

impl ServiceBuilder {
    pub fn new(entity: &str) -> Self {
        ServiceBuilder {
            entity: entity.to_string(),
            namespace: None,
            collection_name: None,
            timestamps: TimestampOptions::default(),
            id: IdOptions::default(),
            references: Vec::new(),
            validator: None,
            middleware: Vec::new(),
            track_reference_changes: true,
        }
    }

    /// Dotted namespace of the service. Its last segment is the default
    /// collection name.
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn collection_name(mut self, collection_name: &str) -> Self {
        self.collection_name = Some(collection_name.to_string());
        self
    }

    pub fn timestamps(mut self, timestamps: TimestampOptions) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn without_timestamps(self) -> Self {
        self.timestamps(TimestampOptions::disabled())
    }

    pub fn id_key(mut self, key: &str) -> Self {
        self.id.key = key.to_string();
        self
    }

    pub fn id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.id.generator = Some(Arc::new(generator));
        self
    }

    pub fn reference(mut self, descriptor: ReferenceDescriptor) -> Self {
        self.references.push(descriptor);
        self
    }

    pub fn references(mut self, descriptors: Vec<ReferenceDescriptor>) -> Self {
        self.references.extend(descriptors);
        self
    }

    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Adds a middleware after the built-in id and timestamp stages.
    pub fn middleware<M: WriteMiddleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Whether a replace compares reference fields against the stored
    /// document, so a changed reference regenerates its cache even when the
    /// replacement still carries the old one.
    pub fn track_reference_changes(mut self, track: bool) -> Self {
        self.track_reference_changes = track;
        self
    }

    pub fn build(self) -> DocrefResult<ServiceConfig> {
        if self.entity.is_empty() || self.entity.contains(FIELD_SEPARATOR) {
            return Err(config_error(&format!(
                "Entity name '{}' must be non-empty and must not contain '{}'",
                self.entity, FIELD_SEPARATOR
            )));
        }

        let collection_name = match (&self.collection_name, &self.namespace) {
            (Some(name), _) => name.clone(),
            (None, Some(namespace)) => namespace
                .rsplit(FIELD_SEPARATOR)
                .next()
                .unwrap_or_default()
                .to_string(),
            (None, None) => self.entity.clone(),
        };
        if collection_name.is_empty() {
            return Err(config_error(&format!(
                "Collection name of {} must not be empty",
                self.entity
            )));
        }

        if self.id.key.is_empty() {
            return Err(config_error(&format!("Id key of {} must not be empty", self.entity)));
        }

        if self.timestamps.generate
            && (self.timestamps.create_key.is_empty() || self.timestamps.update_key.is_empty())
        {
            return Err(config_error(&format!(
                "Timestamp keys of {} must not be empty",
                self.entity
            )));
        }

        let references = validate_references(&self.entity, self.references)?;

        let mut pipeline = MiddlewarePipeline::new();
        if let Some(generator) = &self.id.generator {
            pipeline.push(Arc::new(CustomId::new(&self.id.key, generator.clone())));
        }
        if self.timestamps.generate {
            pipeline.push(Arc::new(Timestamps::new(self.timestamps.clone())));
        }
        for middleware in self.middleware {
            pipeline.push(middleware);
        }

        Ok(ServiceConfig {
            entity: self.entity,
            collection_name,
            timestamps: self.timestamps,
            id: self.id,
            references,
            validator: self.validator.unwrap_or_else(|| Arc::new(PassThrough)),
            pipeline,
            track_reference_changes: self.track_reference_changes,
        })
    }
}

fn validate_references(
    entity: &str,
    references: Vec<ReferenceDescriptor>,
) -> DocrefResult<Vec<ReferenceDescriptor>> {
    let mut cache_paths = HashSet::new();
    let mut validated = Vec::with_capacity(references.len());

    for mut descriptor in references {
        if descriptor.ref_id.is_empty() || descriptor.ref_entity.is_empty() {
            return Err(config_error(&format!(
                "Reference of {} needs both a ref id and a ref entity",
                entity
            )));
        }
        if descriptor.remote_key.is_empty() {
            return Err(config_error(&format!(
                "Reference {} of {} has an empty remote key",
                descriptor.ref_id, entity
            )));
        }

        if let Some(cache) = descriptor.cache.take() {
            let cache = cache.normalized();
            if cache.under.is_empty() || cache.properties.is_empty() {
                return Err(config_error(&format!(
                    "Cache of reference {} of {} needs a path and at least one property",
                    descriptor.ref_id, entity
                )));
            }
            if overlaps(&cache.under, &descriptor.ref_id) {
                return Err(config_error(&format!(
                    "Cache path {} of {} overlaps its reference field",
                    cache.under, entity
                )));
            }
            if !cache_paths.insert(cache.under.clone()) {
                return Err(config_error(&format!(
                    "Cache path {} is declared twice in {}",
                    cache.under, entity
                )));
            }
            descriptor.cache = Some(cache);
        }
        validated.push(descriptor);
    }
    Ok(validated)
}

fn overlaps(a: &str, b: &str) -> bool {
    a == b
        || a.starts_with(&format!("{}{}", b, FIELD_SEPARATOR))
        || b.starts_with(&format!("{}{}", a, FIELD_SEPARATOR))
}

fn config_error(message: &str) -> DocrefError {
    log::error!("{}", message);
    DocrefError::new(message, ErrorKind::ConfigurationError)
}
