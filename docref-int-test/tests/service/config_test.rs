use docref::common::Value;
use docref::dispatch::{Operation, Payload, QueryParams};
use docref::doc;
use docref::errors::ErrorKind;
use docref::filter::all;
use docref::reference::ReferenceDescriptor;
use docref::service::{CrudService, ServiceConfig};
use docref_int_test::test_util::{cleanup, create_test_context, run_test, seed_catalog};

#[test]
fn test_service_from_json_descriptors() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let descriptors: Vec<ReferenceDescriptor> = serde_json::from_str(
                r#"[
                    {
                        "refId": "productId",
                        "refEntity": "Product",
                        "cache": { "under": "cache.product", "properties": ["name", "name", "price"] }
                    },
                    { "refId": "bundleId", "refEntity": "Bundle" }
                ]"#,
            )
            .expect("valid descriptor json");
            assert_eq!(descriptors[1].remote_key, "_id");

            let config = ServiceConfig::builder("Review")
                .namespace("shop.reviews")
                .references(descriptors)
                .build()?;
            assert_eq!(config.collection_name(), "reviews");
            assert_eq!(config.references()[0].cache_properties(), ["name", "price"]);
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let review = ctx.create(
                "Review",
                doc! { stars: 5, productId: "p1", bundleId: "b1" },
            )?;
            assert_eq!(review.get("cache.product.name")?, Value::from("MacBook"));
            assert_eq!(review.get("cache.product.price")?, Value::from(1999));

            let reviews = ctx.find_many(
                "Review",
                QueryParams::new(all()).expand("bundleId", "bundle"),
            )?;
            assert_eq!(reviews[0].get("bundle.name")?, Value::from("Starter"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_remote_key_other_than_id() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let config = ServiceConfig::builder("Listing")
                .reference(
                    ReferenceDescriptor::new("productNames", "Product").remote_key("name"),
                )
                .build()?;
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;
            ctx.create("Listing", doc! { productNames: ["iPhone", "Cable"] })?;

            let listings = ctx.find_many(
                "Listing",
                QueryParams::new(all()).expand("productNames", "products"),
            )?;
            let products = listings[0].get("products")?;
            assert_eq!(products.as_array().map(|p| p.len()), Some(2));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_single_id_by_remote_key() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let config = ServiceConfig::builder("Listing")
                .reference(
                    ReferenceDescriptor::new("productName", "Product")
                        .remote_key("name")
                        .cache("cache.product", &["price"]),
                )
                .build()?;
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let listing = ctx.create("Listing", doc! { _id: "l1", productName: "iPhone" })?;
            assert_eq!(listing.get("cache.product.price")?, Value::from(999));

            let found = ctx
                .call(
                    "Listing",
                    Operation::FindOne,
                    Payload::from(QueryParams::new(all()).expand("productName", "product")),
                )?
                .into_optional_document()?
                .expect("listing is stored");
            assert_eq!(found.get("product._id")?, Value::from("p3"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_invalid_configurations_are_rejected() {
    let duplicate_cache = ServiceConfig::builder("Review")
        .reference(ReferenceDescriptor::new("productId", "Product").cache("cache.ref", &["name"]))
        .reference(ReferenceDescriptor::new("bundleId", "Bundle").cache("cache.ref", &["name"]))
        .build();
    assert_eq!(
        duplicate_cache.err().map(|e| e.kind().clone()),
        Some(ErrorKind::ConfigurationError)
    );

    let empty_properties = ServiceConfig::builder("Review")
        .reference(ReferenceDescriptor::new("productId", "Product").cache("cache.product", &[]))
        .build();
    assert_eq!(
        empty_properties.err().map(|e| e.kind().clone()),
        Some(ErrorKind::ConfigurationError)
    );

    let dotted_entity = ServiceConfig::builder("shop.Review").build();
    assert_eq!(
        dotted_entity.err().map(|e| e.kind().clone()),
        Some(ErrorKind::ConfigurationError)
    );
}

#[test]
fn test_reregistering_replaces_handlers() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let config = ServiceConfig::builder("Category")
                .namespace("archive.categories_v2")
                .build()?;
            CrudService::new(config, ctx.document_store()).register(&ctx.dispatcher())?;

            let count = ctx
                .call("Category", Operation::Count, Payload::None)?
                .into_count()?;
            assert_eq!(count, 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
