use chrono::{Duration, Utc};
use common::{ReservationKey, SellerId, VariantId};
use criterion::{criterion_group, criterion_main, Criterion};
use inventory::{ReservationEngine, ReserveRequest};
use store::{MemoryStore, Outbox};

fn request(variant_id: VariantId, seller_id: SellerId, quantity: i64) -> ReserveRequest {
    ReserveRequest {
        variant_id,
        seller_id,
        quantity,
        reservation_key: ReservationKey::generate(),
        reference_type: "order".to_string(),
        reference_id: "pending-order".to_string(),
        expires_at: Utc::now() + Duration::minutes(30),
        created_by: "bench".to_string(),
    }
}

fn bench_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("reservation_engine/reserve", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = MemoryStore::new();
                let (outbox, mut dispatcher) = Outbox::bounded(16);
                let engine = ReservationEngine::new(store.clone(), outbox);
                let variant_id = VariantId::new();
                let seller_id = SellerId::new();
                store.seed_inventory(variant_id, seller_id, 1_000).await;

                engine
                    .reserve(request(variant_id, seller_id, 1))
                    .await
                    .unwrap();
                dispatcher.drain();
            });
        });
    });
}

fn bench_reserve_release_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("reservation_engine/reserve_release_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = MemoryStore::new();
                let (outbox, mut dispatcher) = Outbox::bounded(16);
                let engine = ReservationEngine::new(store.clone(), outbox);
                let variant_id = VariantId::new();
                let seller_id = SellerId::new();
                store.seed_inventory(variant_id, seller_id, 1_000).await;

                let req = request(variant_id, seller_id, 5);
                let key = req.reservation_key.clone();
                engine.reserve(req).await.unwrap();
                engine.release(&key, "bench", "cycle").await.unwrap();
                dispatcher.drain();
            });
        });
    });
}

criterion_group!(benches, bench_reserve, bench_reserve_release_cycle);
criterion_main!(benches);
