use docref::collection::{insert_if_absent, set, unset, Document};
use docref::common::{SortOrder, Value};
use docref::dispatch::{Operation, Payload, QueryParams, UpdateParams};
use docref::doc;
use docref::errors::ErrorKind;
use docref::filter::{all, field};
use docref::store::AggregateStage;
use docref_int_test::test_util::{
    cleanup, create_test_context, run_test, seed_catalog, stored_value,
};

#[test]
fn test_create_many_generates_every_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            ctx.create("Category", doc! { _id: "c1", name: "Laptops" })?;
            let products: Vec<Document> = (0..20)
                .map(|i| doc! { _id: (format!("p{}", i)), name: (format!("Laptop {}", i)), categoryId: "c1" })
                .collect();

            let created = ctx
                .call("Product", Operation::CreateMany, Payload::from(products))?
                .into_documents()?;
            assert_eq!(created.len(), 20);
            assert_eq!(created[7].get("_id")?, Value::from("p7"));
            for product in &created {
                assert_eq!(product.get("cache.category.name")?, Value::from("Laptops"));
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_create_many_rejects_empty_input() {
    run_test(
        || create_test_context(),
        |ctx| {
            let err = ctx
                .call("Product", Operation::CreateMany, Payload::from(Vec::<Document>::new()))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_update_moving_reference_refreshes_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let result = ctx
                .call(
                    "Product",
                    Operation::UpdateMany,
                    Payload::from(UpdateParams::new(
                        field("categoryId").eq("c1"),
                        set("categoryId", "c2"),
                    )),
                )?
                .into_update_result()?;
            assert_eq!(result.matched, 2);

            for id in ["p1", "p2", "p3"] {
                assert_eq!(
                    stored_value(&ctx, "products", id, "cache.category.name"),
                    Value::from("Phones")
                );
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_update_one_touches_a_single_document() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let result = ctx
                .call(
                    "Product",
                    Operation::UpdateOne,
                    Payload::from(UpdateParams::new(
                        field("categoryId").eq("c1"),
                        set("categoryId", "c2"),
                    )),
                )?
                .into_update_result()?;
            assert_eq!(result.matched, 1);

            let phones = ctx
                .call(
                    "Product",
                    Operation::Count,
                    Payload::from(QueryParams::new(field("cache.category.name").eq("Phones"))),
                )?
                .into_count()?;
            assert_eq!(phones, 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_upsert_with_reference() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let result = ctx
                .call(
                    "Product",
                    Operation::UpdateOne,
                    Payload::from(
                        UpdateParams::new(
                            field("_id").eq("p9"),
                            set("name", "iPad").set("categoryId", "c2"),
                        )
                        .with_options(insert_if_absent()),
                    ),
                )?
                .into_update_result()?;
            assert_eq!(result.upserted_id, Some(Value::from("p9")));
            assert_eq!(
                stored_value(&ctx, "products", "p9", "cache.category.name"),
                Value::from("Phones")
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unset_reference_drops_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            ctx.call(
                "Product",
                Operation::UpdateOne,
                Payload::from(UpdateParams::new(field("_id").eq("p1"), unset("categoryId"))),
            )?;
            assert!(stored_value(&ctx, "products", "p1", "cache.category").is_null());
            assert!(stored_value(&ctx, "products", "p1", "categoryId").is_null());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_clearing_reference_drops_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            ctx.call(
                "Product",
                Operation::UpdateOne,
                Payload::from(UpdateParams::new(
                    field("_id").eq("p1"),
                    set("categoryId", Value::Null),
                )),
            )?;
            assert!(stored_value(&ctx, "products", "p1", "categoryId").is_null());
            assert!(stored_value(&ctx, "products", "p1", "cache.category").is_null());
            assert_eq!(
                stored_value(&ctx, "products", "p2", "cache.category.name"),
                Value::from("Laptops")
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_delete_and_count() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let deleted = ctx
                .call("Product", Operation::DeleteOne, Payload::Id(Value::from("p4")))?
                .into_delete_result()?;
            assert_eq!(deleted.deleted, 1);

            let deleted = ctx
                .call(
                    "Product",
                    Operation::DeleteMany,
                    Payload::from(QueryParams::new(field("categoryId").eq("c1"))),
                )?
                .into_delete_result()?;
            assert_eq!(deleted.deleted, 2);

            let remaining = ctx
                .call("Product", Operation::Count, Payload::None)?
                .into_count()?;
            assert_eq!(remaining, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_aggregate() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let documents = ctx
                .call(
                    "Product",
                    Operation::Aggregate,
                    Payload::Pipeline(vec![
                        AggregateStage::Match(field("price").gte(500)),
                        AggregateStage::Sort(vec![("price".to_string(), SortOrder::Descending)]),
                        AggregateStage::Limit(2),
                        AggregateStage::Project(vec!["name".to_string()]),
                    ]),
                )?
                .into_documents()?;
            let names: Vec<Value> = documents
                .iter()
                .map(|d| d.get("name").unwrap_or_default())
                .collect();
            assert_eq!(names, vec![Value::from("MacBook"), Value::from("ThinkPad")]);
            assert!(!documents[0].contains_key("price"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_find_many_with_options() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let products = ctx.find_many(
                "Product",
                QueryParams::new(all()).with_options(
                    docref::collection::order_by("price", SortOrder::Ascending).skip(1).limit(2),
                ),
            )?;
            let names: Vec<Value> = products
                .iter()
                .map(|d| d.get("name").unwrap_or_default())
                .collect();
            assert_eq!(names, vec![Value::from("iPhone"), Value::from("ThinkPad")]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_validate_and_validation_failures() {
    run_test(
        || create_test_context(),
        |ctx| {
            let valid = ctx
                .call("Category", Operation::Validate, Payload::from(doc! { name: "Laptops" }))?
                .into_document()?;
            assert_eq!(valid.get("name")?, Value::from("Laptops"));

            let err = ctx.create("Category", doc! { rank: 1 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_replace_one_errors() {
    run_test(
        || create_test_context(),
        |ctx| {
            seed_catalog(&ctx)?;
            let err = ctx
                .replace("Category", doc! { name: "No id" })
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);

            let err = ctx
                .replace("Category", doc! { _id: "c9", name: "Ghost" })
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);

            let err = ctx
                .call("Category", Operation::FindById, Payload::from(doc! { _id: "c1" }))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidDataType);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unknown_event_has_no_handler() {
    run_test(
        || create_test_context(),
        |ctx| {
            let err = ctx
                .call("Supplier", Operation::Count, Payload::None)
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::HandlerNotFound);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
