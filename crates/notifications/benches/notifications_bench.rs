use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use document_store::InMemoryDocumentStore;
use domain::{
    Address, Currency, Money, NewProduct, Order, OrderNumber, OrderNumberPrefix, Product,
    ProductDetails, Sku, UnitOfWork, UserId,
};
use notifications::{Dispatcher, LowStockMonitor, OrderActivityView};

/// Commits N orders, each reducing stock of one product by one unit.
async fn populate_store(store: &Arc<InMemoryDocumentStore>, n: u32) {
    let mut product = Product::create(NewProduct {
        sku: Sku::new("WID-001").unwrap(),
        details: ProductDetails {
            name_en: "Widget".to_string(),
            ..Default::default()
        },
        price: Money::parse("100", "BHD").unwrap(),
        stock_quantity: n,
    })
    .unwrap();
    let mut uow = UnitOfWork::new(Arc::clone(store));
    uow.add(&mut product).unwrap();
    uow.commit().await.unwrap();

    let address = Address::new("1 Road", "Manama", "", "", "BH").unwrap();
    for sequence in 1..=n {
        let number = OrderNumber::new(OrderNumberPrefix::Order, 2026, sequence).unwrap();
        let mut order = Order::create(
            number,
            UserId::new(),
            Currency::new("BHD").unwrap(),
            address.clone(),
            address.clone(),
        );
        order
            .add_item(product.product_id(), "Widget", 1, product.price())
            .unwrap();
        product.reduce_stock(1).unwrap();

        let mut uow = UnitOfWork::new(Arc::clone(store));
        uow.update(&mut product).unwrap();
        uow.add(&mut order).unwrap();
        uow.commit().await.unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryDocumentStore::new());
    rt.block_on(populate_store(&store, 200));

    c.bench_function("notifications/catch_up_200_orders", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut dispatcher = Dispatcher::new(Arc::clone(&store));
                dispatcher.register(Box::new(LowStockMonitor::new()));
                dispatcher.register(Box::new(OrderActivityView::new()));
                dispatcher.run_catch_up().await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_catch_up);
criterion_main!(benches);
