use docref::common::Value;
use docref::dispatch::{Operation, Payload, QueryParams};
use docref::doc;
use docref::errors::ErrorKind;
use docref::filter::{all, field};
use docref_int_test::test_util::{cleanup, create_test_context, run_test, seed_catalog};
use std::sync::atomic::Ordering;

#[test]
fn test_expand_many_fetches_once_per_reference() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let find_many = ctx.count_dispatches("entity.Category.findMany");
            let find_by_id = ctx.count_dispatches("entity.Category.findById");

            let products = ctx.find_many(
                "Product",
                QueryParams::new(all()).expand("categoryId", "category"),
            )?;

            assert_eq!(products.len(), 4);
            assert_eq!(find_many.load(Ordering::SeqCst), 1);
            assert_eq!(find_by_id.load(Ordering::SeqCst), 0);

            for product in &products {
                let expected = match product.get("categoryId")?.as_string().map(|s| s.as_str()) {
                    Some("c1") => Value::from("Laptops"),
                    Some("c2") => Value::from("Phones"),
                    _ => Value::Null,
                };
                assert_eq!(product.get("category.name")?, expected);
            }

            let cable = products
                .iter()
                .find(|p| p.get("_id").ok() == Some(Value::from("p4")))
                .expect("p4 is seeded");
            assert!(cable.contains_key("category"));
            assert!(cable.get("category")?.is_null());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_expand_array_reference() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let bundles = ctx.find_many(
                "Bundle",
                QueryParams::new(all())
                    .expand("productIds", "products")
                    .expand("categoryId", "category"),
            )?;

            assert_eq!(bundles.len(), 1);
            let bundle = &bundles[0];
            let products = bundle.get("products")?;
            let products = products.as_array().expect("products is an array");
            let mut names: Vec<String> = products
                .iter()
                .filter_map(|p| p.as_document())
                .filter_map(|p| p.get("name").ok())
                .filter_map(|n| n.as_string().cloned())
                .collect();
            names.sort();
            assert_eq!(names, vec!["MacBook".to_string(), "iPhone".to_string()]);
            assert_eq!(bundle.get("category.name")?, Value::from("Laptops"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_expand_find_one() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let find_by_id = ctx.count_dispatches("entity.Category.findById");

            let product = ctx
                .call(
                    "Product",
                    Operation::FindOne,
                    Payload::from(
                        QueryParams::new(field("name").eq("iPhone")).expand("categoryId", "category"),
                    ),
                )?
                .into_optional_document()?
                .expect("iPhone is seeded");

            assert_eq!(product.get("category.name")?, Value::from("Phones"));
            assert_eq!(find_by_id.load(Ordering::SeqCst), 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_expand_dangling_reference_is_null() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            // stored directly, so no cache is generated for the missing category
            ctx.document_store()
                .insert_one("products", doc! { _id: "p9", name: "Orphan", categoryId: "c9" })?;

            let products = ctx.find_many(
                "Product",
                QueryParams::new(field("_id").eq("p9")).expand("categoryId", "category"),
            )?;
            assert_eq!(products.len(), 1);
            assert!(products[0].get("category")?.is_null());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_expand_undeclared_reference_fails_before_fetching() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let find_many = ctx.count_dispatches("entity.Category.findMany");

            let err = ctx
                .find_many(
                    "Product",
                    QueryParams::new(all())
                        .expand("categoryId", "category")
                        .expand("brandId", "brand"),
                )
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
            assert_eq!(find_many.load(Ordering::SeqCst), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_query_without_expand_dispatches_nothing() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let find_many = ctx.count_dispatches("entity.Category.findMany");
            let products = ctx.find_many("Product", QueryParams::new(all()))?;
            assert_eq!(products.len(), 4);
            assert!(!products[0].contains_key("category"));
            assert_eq!(find_many.load(Ordering::SeqCst), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
