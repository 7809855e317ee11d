use docref::collection::Document;
use docref::dispatch::{Operation, Payload, RefreshParams};
use docref::doc;
use docref::errors::DocrefResult;
use docref::filter::all;
use docref_int_test::test_util::{cleanup, create_test_context};

fn main() -> DocrefResult<()> {
    println!("Starting reference cache stress test...");
    let ctx = create_test_context()?;

    let categories = 100;
    let products = 100_000;

    let start = std::time::Instant::now();
    for i in 0..categories {
        ctx.create("Category", doc! { _id: (format!("c{}", i)), name: (format!("Category {}", i)) })?;
    }
    let batch: Vec<Document> = (0..products)
        .map(|i| {
            doc! {
                _id: (format!("p{}", i)),
                name: (uuid::Uuid::new_v4().to_string()),
                categoryId: (format!("c{}", i % categories))
            }
        })
        .collect();
    ctx.call("Product", Operation::CreateMany, Payload::from(batch))?;
    println!("Created {} products in {:?}", products, start.elapsed());

    let start = std::time::Instant::now();
    for i in 0..categories {
        ctx.call(
            "Category",
            Operation::Save,
            Payload::from(doc! { _id: (format!("c{}", i)), name: (format!("Renamed {}", i)) }),
        )?;
    }
    println!("Renamed {} categories in {:?}", categories, start.elapsed());

    let start = std::time::Instant::now();
    let result = ctx
        .call(
            "Product",
            Operation::RefreshRefCache,
            Payload::from(RefreshParams::new(all())),
        )?
        .into_bulk_write()?;
    println!(
        "Refreshed {} of {} product caches in {:?}",
        result.modified,
        result.matched,
        start.elapsed()
    );

    cleanup(ctx)
}
