use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use document_store::InMemoryDocumentStore;
use domain::{
    Address, Currency, Money, Order, OrderNumber, OrderNumberPrefix, OrderRepository, ProductId,
    UnitOfWork, UserId,
};

fn address() -> Address {
    Address::new("Road 1", "Manama", "", "", "Bahrain").unwrap()
}

fn new_order() -> Order {
    Order::create(
        OrderNumber::first(OrderNumberPrefix::Order, 2026).unwrap(),
        UserId::new(),
        Currency::new("BHD").unwrap(),
        address(),
        address(),
    )
}

fn order_with_lines(lines: u32) -> Order {
    let mut order = new_order();
    for n in 1..=lines {
        order
            .add_item(
                ProductId::new(),
                format!("Product {n}"),
                n,
                Money::parse(&format!("{n}.250"), "BHD").unwrap(),
            )
            .unwrap();
    }
    order
}

fn bench_add_item(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain/add_item");
    for lines in [1u32, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, &lines| {
            b.iter_batched(
                || order_with_lines(lines),
                |mut order| {
                    order
                        .add_item(ProductId::new(), "Extra", 2, Money::parse("3", "BHD").unwrap())
                        .unwrap();
                    order
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_update_quantity(c: &mut Criterion) {
    c.bench_function("domain/update_quantity_50_lines", |b| {
        b.iter_batched(
            || {
                let order = order_with_lines(50);
                let product_id = order.items()[25].product_id;
                (order, product_id)
            },
            |(mut order, product_id)| {
                order.update_item_quantity(product_id, 99).unwrap();
                order
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_commit_and_load(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryDocumentStore::new());
    let repo = OrderRepository::new(store.clone());

    let order_id = rt.block_on(async {
        let mut order = order_with_lines(20);
        let mut uow = UnitOfWork::new(store.clone());
        uow.add(&mut order).unwrap();
        uow.commit().await.unwrap();
        domain::Aggregate::id(&order)
    });

    c.bench_function("domain/load_order_20_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                repo.get(order_id).await.unwrap();
            });
        });
    });

    c.bench_function("domain/commit_new_order", |b| {
        b.iter_batched(
            || (Arc::new(InMemoryDocumentStore::new()), order_with_lines(5)),
            |(store, mut order)| {
                rt.block_on(async {
                    let mut uow = UnitOfWork::new(store);
                    uow.add(&mut order).unwrap();
                    uow.commit().await.unwrap();
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add_item,
    bench_update_quantity,
    bench_commit_and_load,
);
criterion_main!(benches);
