//! Performance benchmarks for a3s-inquisitor
//!
//! Run with: cargo bench

use a3s_inquisitor::model::{Distribution, Origin, Record};
use a3s_inquisitor::store::sync_distribution;
use a3s_inquisitor::{
    ActionMode, Direction, EscalationEngine, EscalationRecord, HijackResolver, Invocation,
    MemoryRelationshipStore, NaturalKey, RelationshipStore, ResourceKind, ResourceRef, Tags,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

const ACCOUNT: &str = "111111111111";

/// `fanout` records pointing at one CDN name, each aliased by one more record
async fn fanout_store(fanout: usize) -> Arc<MemoryRelationshipStore> {
    let store = Arc::new(MemoryRelationshipStore::new());
    let ctx = Invocation::new();
    for i in 0..fanout {
        let name = format!("app{}.example.com", i);
        store
            .upsert(
                &ctx,
                Record::new(ACCOUNT, "Z1", name.as_str(), "CNAME")
                    .with_values(["public.cdn.example.net"])
                    .into(),
            )
            .await
            .unwrap();
        store
            .upsert(
                &ctx,
                Record::new(ACCOUNT, "Z1", format!("www{}.example.com", i), "CNAME")
                    .with_values([name])
                    .into(),
            )
            .await
            .unwrap();
    }
    store
}

fn bench_upsert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("upsert record (new store)", |b| {
        b.to_async(&rt).iter(|| async {
            let store = MemoryRelationshipStore::new();
            store
                .upsert(
                    &Invocation::new(),
                    Record::new(ACCOUNT, "Z1", "www.example.com", "CNAME")
                        .with_values(["public.cdn.example.net"])
                        .into(),
                )
                .await
                .unwrap()
        });
    });

    let store = rt.block_on(fanout_store(100));
    c.bench_function("upsert record (idempotent, 200 rows)", |b| {
        b.to_async(&rt).iter(|| async {
            store
                .upsert(
                    &Invocation::new(),
                    Record::new(ACCOUNT, "Z1", "app0.example.com", "CNAME")
                        .with_values(["public.cdn.example.net"])
                        .into(),
                )
                .await
                .unwrap()
        });
    });
}

fn bench_resolve_upstream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("resolve_upstream");
    for fanout in [10, 100, 1000] {
        let resolver = HijackResolver::new(rt.block_on(fanout_store(fanout)));
        let root = ResourceRef::new("E1", ResourceKind::Distribution);
        let names = vec!["public.cdn.example.net".to_string()];
        group.bench_function(format!("{} referrers", fanout), |b| {
            b.to_async(&rt).iter(|| async {
                resolver
                    .resolve(&Invocation::new(), &root, &names, Direction::Upstream)
                    .await
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_resolve_downstream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let store = rt.block_on(async {
        let store = Arc::new(MemoryRelationshipStore::new());
        let origins = (0..50)
            .map(|i| Origin {
                origin_id: format!("o{}", i),
                account_id: ACCOUNT.to_string(),
                distribution_id: "E1".to_string(),
                domain: format!("bucket{}.s3.us-west-2.amazonaws.com", i),
            })
            .collect();
        sync_distribution(
            store.as_ref(),
            &Invocation::new(),
            Distribution {
                distribution_id: "E1".to_string(),
                account_id: ACCOUNT.to_string(),
                domain: "d1.cloudfront.net".to_string(),
            },
            origins,
            vec![],
        )
        .await
        .unwrap();
        store
    });
    let resolver = HijackResolver::new(store);
    let key = NaturalKey::distribution(ACCOUNT, "E1");

    c.bench_function("resolve_downstream (50 dangling origins)", |b| {
        b.to_async(&rt).iter(|| async {
            resolver
                .resolve_entity(&Invocation::new(), &key, Direction::Downstream)
                .await
                .unwrap()
        });
    });
}

fn bench_audit(c: &mut Criterion) {
    let required: Vec<String> = (0..10).map(|i| format!("Tag{}", i)).collect();
    let engine = EscalationEngine::new(required.clone(), ActionMode::DryRun);

    let compliant: Tags = required
        .iter()
        .map(|t| (t.to_lowercase(), "x".to_string()))
        .collect();
    let missing = Tags::new();

    c.bench_function("audit (compliant)", |b| {
        b.iter(|| {
            engine
                .audit(EscalationRecord::new("db-1"), &compliant)
                .unwrap()
        });
    });

    c.bench_function("audit (non-compliant)", |b| {
        b.iter(|| {
            engine
                .audit(EscalationRecord::new("db-1").with_counter(2), &missing)
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_upsert,
    bench_resolve_upstream,
    bench_resolve_downstream,
    bench_audit,
);
criterion_main!(benches);
