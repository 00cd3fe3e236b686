//! Performance benchmarks for dispatch_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::geo::{haversine_km, GeoPoint};
use dispatch_core::ids::DriverId;
use dispatch_core::matching::find_candidates;
use dispatch_core::model::Driver;
use dispatch_core::pricing::{price, PricingConfig};
use dispatch_core::store::memory::MemoryStore;
use dispatch_core::store::Store;

fn bench_pricing(c: &mut Criterion) {
    c.bench_function("price_37_6km", |b| {
        b.iter(|| black_box(price(black_box(37.6), PricingConfig::default())));
    });
}

fn bench_haversine(c: &mut Criterion) {
    let a = GeoPoint::new(32.0853, 34.7818);
    let b_point = GeoPoint::new(31.7683, 35.2137);
    c.bench_function("haversine_km", |b| {
        b.iter(|| black_box(haversine_km(black_box(a), black_box(b_point))));
    });
}

fn bench_find_candidates(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pickup = GeoPoint::new(32.2211, 35.2544);

    let fleet_sizes = [("small", 50), ("medium", 500), ("large", 2_000)];

    let mut group = c.benchmark_group("find_candidates");
    for (name, driver_count) in fleet_sizes {
        let store = runtime.block_on(async {
            let store = MemoryStore::new();
            for i in 0..driver_count {
                let lat = 32.0 + (i as f64 % 100.0) * 0.01;
                let lng = 35.0 + (i as f64 / 100.0) * 0.01;
                let mut driver = Driver::new_offline(chrono::Utc::now());
                driver.is_online = true;
                driver.is_available = true;
                driver.last_location = Some(GeoPoint::new(lat, lng));
                store
                    .put_driver(&DriverId::from(format!("driver_{i}")), driver)
                    .await
                    .unwrap();
            }
            store
        });

        group.bench_with_input(BenchmarkId::from_parameter(name), &store, |b, store| {
            b.iter(|| {
                runtime.block_on(async {
                    black_box(find_candidates(store, pickup, 15.0).await.unwrap());
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pricing, bench_haversine, bench_find_candidates);
criterion_main!(benches);
