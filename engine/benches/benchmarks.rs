//! Performance benchmarks for offsync-engine

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use offsync_engine::{
    LocalStore, MemoryStore, Reconciler, RecordFilter, RemoteAck, RemoteClient, RemoteError,
    RemotePush, RetryPolicy, Session, StoreSnapshot, SyncOrchestrator, SyncServices,
    SyncableRecord, Tier, User, WatchConnectivity,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

struct AcceptAll;

#[async_trait]
impl RemoteClient for AcceptAll {
    async fn create_remote(&self, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        Ok(RemoteAck {
            id: push.id.clone(),
            revision: None,
        })
    }

    async fn update_remote(&self, id: &str, _push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        Ok(RemoteAck {
            id: id.to_string(),
            revision: None,
        })
    }
}

fn wire(store: Arc<MemoryStore>, online: bool) -> (Arc<SyncServices>, Arc<WatchConnectivity>) {
    let connectivity = Arc::new(WatchConnectivity::new(online));
    let services = SyncServices::new(
        store,
        Arc::new(AcceptAll),
        Arc::new(Session::signed_in(User::new("user-1", "remote-1", Tier::Paid))),
        connectivity.clone(),
    );
    (Arc::new(services), connectivity)
}

fn pending_store(size: usize) -> MemoryStore {
    let mut snapshot = StoreSnapshot::new();
    for i in 0..size {
        snapshot.add_record(SyncableRecord::new(
            format!("rec-{}", i),
            "budgets",
            "user-1",
            json!({"name": format!("Budget {}", i), "limit": i}),
            1000 + i as u64,
        ));
    }
    MemoryStore::from_snapshot(snapshot).unwrap()
}

fn bench_commit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("commit");

    for online in [false, true] {
        let name = if online { "create_online" } else { "create_offline" };
        group.bench_function(name, |b| {
            let (services, _connectivity) = wire(Arc::new(MemoryStore::new()), online);
            let orchestrator = SyncOrchestrator::new(services);
            b.iter(|| {
                rt.block_on(orchestrator.create("budgets", black_box(json!({"name": "Rent"}))))
                    .unwrap()
            })
        });
    }

    group.bench_function("update_online", |b| {
        let (services, _connectivity) = wire(Arc::new(MemoryStore::new()), true);
        let orchestrator = SyncOrchestrator::new(services);
        let record = rt
            .block_on(orchestrator.create("budgets", json!({"limit": 0})))
            .unwrap();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            rt.block_on(orchestrator.update("budgets", record.id.clone(), json!({ "limit": n })))
                .unwrap()
        })
    });

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    for size in [100, 1000].iter() {
        let store = pending_store(*size);

        group.bench_with_input(BenchmarkId::new("get", size), size, |b, &size| {
            let id = format!("rec-{}", size / 2);
            b.iter(|| store.get("budgets", black_box(&id)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("upload_worklist", size), size, |b, _| {
            let filter = RecordFilter::upload_worklist("user-1");
            b.iter(|| store.query(black_box(&filter)).unwrap())
        });
    }

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("sweep", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let (services, _connectivity) = wire(Arc::new(pending_store(size)), true);
                    Reconciler::new(services, RetryPolicy::default())
                },
                |reconciler| rt.block_on(reconciler.reconcile()),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 1000].iter() {
        let store = pending_store(*size);
        let json = store.export_state().unwrap().to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("export", size), size, |b, _| {
            b.iter(|| store.export_state().unwrap().to_json().unwrap())
        });

        group.bench_with_input(BenchmarkId::new("import", size), size, |b, _| {
            b.iter(|| StoreSnapshot::from_json(black_box(&json)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_commit,
    bench_store,
    bench_reconcile,
    bench_snapshot
);
criterion_main!(benches);
