use docref::common::Value;
use docref::dispatch::{Operation, Payload, RefreshParams};
use docref::doc;
use docref::filter::{all, field};
use docref::store::{BulkWriteResult, DocumentStoreProvider};
use docref_int_test::test_util::{
    cleanup, create_test_context, run_test, seed_catalog, stored_value, TestContext,
};
use std::sync::atomic::Ordering;

fn rename_silently(ctx: &TestContext, id: &str, name: &str) -> docref::errors::DocrefResult<()> {
    // straight to the store, so nothing propagates
    ctx.store()
        .update("categories", &field("_id").eq(id), &docref::collection::set("name", name), &Default::default())?;
    Ok(())
}

fn refresh(ctx: &TestContext, params: RefreshParams) -> docref::errors::DocrefResult<BulkWriteResult> {
    ctx.call("Product", Operation::RefreshRefCache, Payload::from(params))?
        .into_bulk_write()
}

#[test]
fn test_refresh_recomputes_stale_caches() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            rename_silently(&ctx, "c1", "Notebooks")?;
            rename_silently(&ctx, "c2", "Smartphones")?;

            let result = refresh(&ctx, RefreshParams::new(all()))?;
            assert!(result.is_ok());
            assert_eq!(result.matched, 4);
            assert_eq!(result.modified, 3);

            assert_eq!(
                stored_value(&ctx, "products", "p2", "cache.category.name"),
                Value::from("Notebooks")
            );
            assert_eq!(
                stored_value(&ctx, "products", "p3", "cache.category.name"),
                Value::from("Smartphones")
            );
            assert!(stored_value(&ctx, "products", "p4", "cache").is_null());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_refresh_covers_large_collections() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            for i in 0..150 {
                let category = if i % 2 == 0 { "c1" } else { "c2" };
                ctx.document_store().insert_one(
                    "products",
                    doc! { _id: (format!("bulk-{}", i)), categoryId: category },
                )?;
            }
            let find_by_id = ctx.count_dispatches("entity.Category.findById");

            let result = refresh(&ctx, RefreshParams::new(field("_id").ne("p4")))?;
            assert!(result.is_ok());
            assert_eq!(result.matched, 153);
            assert_eq!(find_by_id.load(Ordering::SeqCst), 153);
            assert_eq!(
                stored_value(&ctx, "products", "bulk-149", "cache.category.name"),
                Value::from("Phones")
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_refresh_respects_filter_and_entities() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            rename_silently(&ctx, "c1", "Notebooks")?;

            let result = refresh(&ctx, RefreshParams::new(field("_id").eq("p1")))?;
            assert_eq!(result.matched, 1);
            assert_eq!(
                stored_value(&ctx, "products", "p2", "cache.category.name"),
                Value::from("Laptops")
            );

            let result = refresh(&ctx, RefreshParams::new(all()).for_entities(&["Brand"]))?;
            assert_eq!(result, BulkWriteResult::default());
            assert_eq!(
                stored_value(&ctx, "products", "p2", "cache.category.name"),
                Value::from("Laptops")
            );

            let result = refresh(&ctx, RefreshParams::new(all()).for_entities(&["Category"]))?;
            assert_eq!(result.matched, 4);
            assert_eq!(
                stored_value(&ctx, "products", "p2", "cache.category.name"),
                Value::from("Notebooks")
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_refresh_without_matches_writes_nothing() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let result = refresh(&ctx, RefreshParams::new(field("categoryId").eq("c9")))?;
            assert_eq!(result, BulkWriteResult::default());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
