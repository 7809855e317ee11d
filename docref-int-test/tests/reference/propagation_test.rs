use docref::common::Value;
use docref::dispatch::{Operation, Payload, RefreshParams};
use docref::doc;
use docref::errors::{DocrefError, ErrorKind};
use docref::filter::all;
use docref_int_test::test_util::{
    cleanup, create_test_context, run_test, seed_catalog, stored_value,
};
use std::thread;
use std::time::Duration;

#[test]
fn test_replace_propagates_into_owner_caches() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            ctx.replace("Category", doc! { _id: "c1", name: "Apple Products" })?;

            awaitility::at_most(Duration::from_secs(5)).until(|| {
                stored_value(&ctx, "products", "p1", "cache.category.name")
                    == Value::from("Apple Products")
                    && stored_value(&ctx, "products", "p2", "cache.category.name")
                        == Value::from("Apple Products")
            });

            // other categories are untouched
            assert_eq!(
                stored_value(&ctx, "products", "p3", "cache.category.name"),
                Value::from("Phones")
            );
            assert!(ctx.failures().is_empty());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_replace_propagates_into_array_caches() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let product = ctx
                .stored("products", &docref::filter::by_id("p3"))?
                .expect("p3 is seeded");
            let mut discounted = product.clone();
            discounted.put("price", 899)?;
            ctx.replace("Product", discounted)?;

            awaitility::at_most(Duration::from_secs(5)).until(|| {
                let cache = stored_value(&ctx, "bundles", "b1", "cache.products");
                cache.as_array().is_some_and(|entries| {
                    entries.iter().any(|entry| {
                        entry.as_document().is_some_and(|entry| {
                            entry.get("name").ok() == Some(Value::from("iPhone"))
                                && entry.get("price").ok() == Some(Value::from(899))
                        })
                    })
                })
            });

            let cache = stored_value(&ctx, "bundles", "b1", "cache.products");
            assert_eq!(cache.as_array().map(|entries| entries.len()), Some(2));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_save_does_not_propagate_but_refresh_repairs() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            ctx.call(
                "Category",
                Operation::Save,
                Payload::from(doc! { _id: "c1", name: "Notebooks" }),
            )?;

            thread::sleep(Duration::from_millis(200));
            assert_eq!(
                stored_value(&ctx, "products", "p1", "cache.category.name"),
                Value::from("Laptops")
            );

            let result = ctx
                .call(
                    "Product",
                    Operation::RefreshRefCache,
                    Payload::from(RefreshParams::new(all())),
                )?
                .into_bulk_write()?;
            assert!(result.is_ok());
            assert_eq!(result.matched, 4);
            assert_eq!(
                stored_value(&ctx, "products", "p1", "cache.category.name"),
                Value::from("Notebooks")
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_propagation_failure_is_reported_not_raised() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            ctx.dispatcher().on_before("entity.Product.updateMany", |_, _| {
                Err(DocrefError::new("maintenance window", ErrorKind::InvalidOperation))
            });

            let replaced = ctx.replace("Category", doc! { _id: "c1", name: "Apple Products" })?;
            assert_eq!(replaced.get("name")?, Value::from("Apple Products"));

            awaitility::at_most(Duration::from_secs(5)).until(|| !ctx.failures().is_empty());

            let failures = ctx.failures();
            assert_eq!(failures[0].event, "entity.Category.replaceOne");
            assert_eq!(failures[0].kind, ErrorKind::PropagationError);
            assert_eq!(
                stored_value(&ctx, "products", "p1", "cache.category.name"),
                Value::from("Laptops")
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
