use docref::collection::{set, Document, Update};
use docref::common::Value;
use docref::dispatch::{Operation, Payload, UpdateParams};
use docref::doc;
use docref::errors::{DocrefError, DocrefResult, ErrorKind};
use docref::filter::field;
use docref::service::{CrudService, ServiceConfig, TimestampOptions, WriteMiddleware};
use docref_int_test::test_util::{cleanup, create_test_context, run_test, stored_value};
use std::thread;
use std::time::Duration;

fn timestamp(document: &Document, key: &str) -> chrono::DateTime<chrono::FixedOffset> {
    let value = document.get(key).expect("readable timestamp");
    let text = value.as_string().expect("timestamp is a string");
    chrono::DateTime::parse_from_rfc3339(text).expect("RFC 3339 timestamp")
}

#[test]
fn test_timestamps_follow_the_document_lifecycle() {
    run_test(
        || create_test_context(),
        |ctx| {
            let created = ctx.create("Category", doc! { _id: "c1", name: "Laptops" })?;
            let created_at = timestamp(&created, "createdAt");
            assert_eq!(created_at, timestamp(&created, "updatedAt"));

            thread::sleep(Duration::from_millis(20));
            let replaced = ctx.replace("Category", doc! { _id: "c1", name: "Notebooks" })?;
            assert_eq!(timestamp(&replaced, "createdAt"), created_at);
            assert!(timestamp(&replaced, "updatedAt") > created_at);

            thread::sleep(Duration::from_millis(20));
            ctx.call(
                "Category",
                Operation::UpdateOne,
                Payload::from(UpdateParams::new(field("_id").eq("c1"), set("rank", 1))),
            )?;
            let stored = ctx
                .stored("categories", &docref::filter::by_id("c1"))?
                .expect("c1 exists");
            assert_eq!(timestamp(&stored, "createdAt"), created_at);
            assert!(timestamp(&stored, "updatedAt") > timestamp(&replaced, "updatedAt"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_custom_timestamp_keys() {
    run_test(
        || create_test_context(),
        |ctx| {
            let config = ServiceConfig::builder("Note")
                .timestamps(TimestampOptions::with_keys("meta.created", "meta.modified"))
                .build()?;
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let note = ctx.create("Note", doc! { text: "hello" })?;
            assert!(note.get("meta.created")?.is_string());
            assert!(note.get("meta.modified")?.is_string());
            assert!(!note.contains_key("createdAt"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_custom_id_generator() {
    run_test(
        || create_test_context(),
        |ctx| {
            let config = ServiceConfig::builder("Coupon")
                .namespace("shop.coupons")
                .id_key("code")
                .id_generator(|| Value::from(uuid::Uuid::new_v4().to_string()))
                .build()?;
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let first = ctx.create("Coupon", doc! { discount: 10 })?;
            let second = ctx.create("Coupon", doc! { discount: 20 })?;
            let given = ctx.create("Coupon", doc! { code: "WELCOME", discount: 5 })?;

            let first_code = first.get("code")?;
            assert!(first_code.is_string());
            assert_ne!(first_code, second.get("code")?);
            assert_eq!(given.get("code")?, Value::from("WELCOME"));

            let found = ctx
                .call("Coupon", Operation::FindById, Payload::Id(first_code.clone()))?
                .into_optional_document()?
                .expect("coupon is stored");
            assert_eq!(found.get("discount")?, Value::from(10));

            // save with an existing code replaces instead of inserting
            ctx.call(
                "Coupon",
                Operation::Save,
                Payload::from(doc! { code: "WELCOME", discount: 15 }),
            )?;
            let count = ctx
                .call("Coupon", Operation::Count, Payload::None)?
                .into_count()?;
            assert_eq!(count, 3);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

struct Slug;

impl WriteMiddleware for Slug {
    fn name(&self) -> &str {
        "slug"
    }

    fn before_save(&self, document: &mut Document) -> DocrefResult<()> {
        let name = document.get("name")?;
        match name.as_string() {
            Some(name) => document.put("slug", name.to_lowercase().replace(' ', "-")),
            None => Err(DocrefError::new("A slug needs a name", ErrorKind::ValidationError)),
        }
    }

    fn before_update(&self, update: Update) -> DocrefResult<Update> {
        if update.touches("slug") {
            return Err(DocrefError::new("Slugs are derived", ErrorKind::InvalidOperation));
        }
        Ok(update)
    }
}

#[test]
fn test_user_middleware_runs_after_built_ins() {
    run_test(
        || create_test_context(),
        |ctx| {
            let config = ServiceConfig::builder("Page")
                .namespace("site.pages")
                .middleware(Slug)
                .build()?;
            assert_eq!(config.pipeline().names(), vec!["timestamps", "slug"]);
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let page = ctx.create("Page", doc! { _id: "home", name: "Home Page" })?;
            assert_eq!(page.get("slug")?, Value::from("home-page"));

            let err = ctx.create("Page", doc! { title: "untitled" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);

            let err = ctx
                .call(
                    "Page",
                    Operation::UpdateMany,
                    Payload::from(UpdateParams::new(field("_id").eq("home"), set("slug", "x"))),
                )
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            assert_eq!(stored_value(&ctx, "pages", "home", "slug"), Value::from("home-page"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
