use docref::collection::Document;
use docref::common::Value;
use docref::dispatch::{event_name, DispatchFailure, Dispatcher, Operation, Payload, QueryParams};
use docref::doc;
use docref::errors::DocrefResult;
use docref::filter::Filter;
use docref::reference::ReferenceDescriptor;
use docref::service::{CrudService, RequiredFields, ServiceConfig};
use docref::store::{DocumentStore, DocumentStoreProvider, InMemoryStore};
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread to avoid thread exhaustion when running many tests in parallel.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocrefResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DocrefResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DocrefResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx.clone()) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx.clone());
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());

                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Panic: {}", err_msg);
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A dispatcher with the Category, Product and Bundle services registered
/// on one in-memory store.
///
/// * `Category` requires a `name`.
/// * `Product.categoryId` references a Category and caches its `name` under
///   `cache.category`.
/// * `Bundle.productIds` references Products and caches `name` and `price`
///   under `cache.products`; `Bundle.categoryId` references a Category
///   without a cache.
#[derive(Clone)]
pub struct TestContext {
    dispatcher: Dispatcher,
    store: InMemoryStore,
    failures: Arc<Mutex<Vec<DispatchFailure>>>,
}

impl TestContext {
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn store(&self) -> InMemoryStore {
        self.store.clone()
    }

    pub fn document_store(&self) -> DocumentStore {
        DocumentStore::new(self.store.clone())
    }

    /// Failures reported by after listeners so far.
    pub fn failures(&self) -> Vec<DispatchFailure> {
        self.failures.lock().clone()
    }

    pub fn call(&self, entity: &str, operation: Operation, payload: Payload) -> DocrefResult<Payload> {
        self.dispatcher.dispatch(&event_name(entity, operation), payload)
    }

    pub fn create(&self, entity: &str, document: Document) -> DocrefResult<Document> {
        self.call(entity, Operation::CreateOne, Payload::from(document))?
            .into_document()
    }

    pub fn replace(&self, entity: &str, document: Document) -> DocrefResult<Document> {
        self.call(entity, Operation::ReplaceOne, Payload::from(document))?
            .into_document()
    }

    pub fn find_many(&self, entity: &str, query: QueryParams) -> DocrefResult<Vec<Document>> {
        self.call(entity, Operation::FindMany, Payload::from(query))?
            .into_documents()
    }

    /// Reads a document straight from the store, bypassing the dispatcher.
    pub fn stored(&self, collection: &str, filter: &Filter) -> DocrefResult<Option<Document>> {
        self.store.find_one(collection, filter)
    }

    /// Counts dispatches of `event` from now on.
    pub fn count_dispatches(&self, event: &str) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        self.dispatcher.on_before(event, move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        counter
    }
}

pub fn category_config() -> DocrefResult<ServiceConfig> {
    ServiceConfig::builder("Category")
        .namespace("shop.categories")
        .validator(RequiredFields::new(&["name"]))
        .build()
}

pub fn product_config() -> DocrefResult<ServiceConfig> {
    ServiceConfig::builder("Product")
        .namespace("shop.products")
        .reference(
            ReferenceDescriptor::new("categoryId", "Category").cache("cache.category", &["name"]),
        )
        .build()
}

pub fn bundle_config() -> DocrefResult<ServiceConfig> {
    ServiceConfig::builder("Bundle")
        .namespace("shop.bundles")
        .reference(
            ReferenceDescriptor::new("productIds", "Product")
                .cache("cache.products", &["name", "price"]),
        )
        .reference(ReferenceDescriptor::new("categoryId", "Category"))
        .build()
}

pub fn create_test_context() -> DocrefResult<TestContext> {
    let dispatcher = Dispatcher::new();
    let store = InMemoryStore::new();

    for config in [category_config()?, product_config()?, bundle_config()?] {
        CrudService::new(config, DocumentStore::new(store.clone())).register(&dispatcher)?;
    }

    let failures = Arc::new(Mutex::new(Vec::new()));
    let recorded = failures.clone();
    dispatcher.on_failure(move |failure| recorded.lock().push(failure.clone()));

    Ok(TestContext {
        dispatcher,
        store,
        failures,
    })
}

pub fn cleanup(ctx: TestContext) -> DocrefResult<()> {
    ctx.dispatcher().close()
}

/// Two categories, four products and one bundle.
///
/// | id | entity   | reference            |
/// |----|----------|----------------------|
/// | c1 | Laptops  |                      |
/// | c2 | Phones   |                      |
/// | p1 | MacBook  | c1                   |
/// | p2 | ThinkPad | c1                   |
/// | p3 | iPhone   | c2                   |
/// | p4 | Cable    | none                 |
/// | b1 | Starter  | p1, p3; category c1  |
pub fn seed_catalog(ctx: &TestContext) -> DocrefResult<()> {
    ctx.create("Category", doc! { _id: "c1", name: "Laptops" })?;
    ctx.create("Category", doc! { _id: "c2", name: "Phones" })?;

    ctx.create("Product", doc! { _id: "p1", name: "MacBook", price: 1999, categoryId: "c1" })?;
    ctx.create("Product", doc! { _id: "p2", name: "ThinkPad", price: 1499, categoryId: "c1" })?;
    ctx.create("Product", doc! { _id: "p3", name: "iPhone", price: 999, categoryId: "c2" })?;
    ctx.create("Product", doc! { _id: "p4", name: "Cable", price: 19 })?;

    ctx.create(
        "Bundle",
        doc! { _id: "b1", name: "Starter", productIds: ["p1", "p3"], categoryId: "c1" },
    )?;
    Ok(())
}

/// The value at `path` of the stored document of `collection` with `id`,
/// or `Null` when either is missing.
pub fn stored_value(ctx: &TestContext, collection: &str, id: &str, path: &str) -> Value {
    ctx.stored(collection, &docref::filter::by_id(id))
        .ok()
        .flatten()
        .and_then(|doc| doc.get(path).ok())
        .unwrap_or_default()
}
