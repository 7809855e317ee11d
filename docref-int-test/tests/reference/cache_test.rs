use docref::common::Value;
use docref::dispatch::{Operation, Payload};
use docref::doc;
use docref::errors::ErrorKind;
use docref::filter::{all, by_id};
use docref::reference::ReferenceDescriptor;
use docref::service::{CrudService, ServiceConfig};
use docref::store::DocumentStoreProvider;
use docref_int_test::test_util::{
    cleanup, create_test_context, run_test, seed_catalog, stored_value,
};
use std::sync::atomic::Ordering;

#[test]
fn test_save_embeds_referenced_fields() {
    run_test(
        || create_test_context(),
        |ctx| {
            ctx.create("Category", doc! { _id: "c1", name: "Laptops", rank: 3 })?;
            let product = ctx.create(
                "Product",
                doc! { name: "MacBook Pro", price: 2499, categoryId: "c1" },
            )?;

            assert!(product.has_id());
            assert_eq!(product.get("cache.category.name")?, Value::from("Laptops"));
            // only the listed properties are embedded
            assert!(!product.contains_field("cache.category.rank"));
            assert!(!product.contains_field("cache.category._id"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_resave_with_populated_cache_does_not_fetch() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let find_by_id = ctx.count_dispatches("entity.Category.findById");

            let product = ctx
                .stored("products", &by_id("p1"))?
                .expect("p1 is seeded");
            let mut renamed = product.clone();
            renamed.put("name", "MacBook Air")?;
            let saved = ctx.replace("Product", renamed)?;

            assert_eq!(saved.get("name")?, Value::from("MacBook Air"));
            assert_eq!(saved.get("cache.category.name")?, Value::from("Laptops"));
            assert_eq!(find_by_id.load(Ordering::SeqCst), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_changed_reference_regenerates_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let product = ctx
                .stored("products", &by_id("p1"))?
                .expect("p1 is seeded");
            let mut moved = product.clone();
            moved.put("categoryId", "c2")?;

            let saved = ctx.replace("Product", moved)?;
            assert_eq!(saved.get("cache.category.name")?, Value::from("Phones"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_array_reference_embeds_every_document() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let cache = stored_value(&ctx, "bundles", "b1", "cache.products");
            let cache = cache.as_array().expect("cache.products is an array");
            assert_eq!(cache.len(), 2);

            for entry in cache {
                let entry = entry.as_document().expect("cached product");
                assert_eq!(entry.size(), 2);
                assert!(entry.get("name")?.is_string());
                assert!(entry.get("price")?.is_number());
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_dangling_scalar_reference_caches_null() {
    run_test(
        || create_test_context(),
        |ctx| {
            let product = ctx.create("Product", doc! { _id: "p1", name: "Orphan", categoryId: "c9" })?;
            assert!(product.contains_field("cache"));
            assert!(product.get("cache.category")?.is_null());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_document_without_reference_gets_no_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            let find_by_id = ctx.count_dispatches("entity.Category.findById");
            let product = ctx.create("Product", doc! { name: "Cable", categoryId: "" })?;
            assert!(!product.contains_key("cache"));
            assert_eq!(find_by_id.load(Ordering::SeqCst), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_failed_fetch_fails_the_save() {
    run_test(
        || create_test_context(),
        |ctx| {
            // no Supplier service is registered
            let config = ServiceConfig::builder("Part")
                .reference(
                    ReferenceDescriptor::new("supplierId", "Supplier").cache("cache.supplier", &["name"]),
                )
                .build()?;
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let err = ctx
                .create("Part", doc! { _id: "x1", supplierId: "s1" })
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UpstreamFetchFailed);
            assert_eq!(err.root_cause().kind(), &ErrorKind::HandlerNotFound);

            let count = ctx
                .call("Part", Operation::Count, Payload::None)?
                .into_count()?;
            assert_eq!(count, 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_mixed_id_array_is_rejected() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let err = ctx
                .create("Bundle", doc! { name: "Broken", productIds: ["p1", 2] })
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
            assert_eq!(ctx.store().count("bundles", &all())?, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
