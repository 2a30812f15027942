use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use pairvote::{
    config::CoordinatorConfig,
    coordinator::Coordinator,
    identity::StaticDirectory,
    persist::memory::MemoryKv,
    types::Category,
};

fn coordinator() -> Coordinator {
    Coordinator::new(
        Arc::new(MemoryKv::new()),
        Arc::new(StaticDirectory::new().with_group("club")),
        &CoordinatorConfig::default(),
    )
}

fn bench_pairing(c: &mut Criterion) {
    c.bench_function("pair_10k_joiners", |b| {
        b.iter(|| {
            let coord = coordinator();
            for i in 0..10_000u32 {
                let _ = coord
                    .pairing()
                    .request_pairing(&format!("p{i}"))
                    .expect("join");
            }
        });
    });
}

fn bench_dissolve_churn(c: &mut Criterion) {
    c.bench_function("dissolve_rejoin_1k", |b| {
        b.iter(|| {
            let coord = coordinator();
            let pairing = coord.pairing();
            for i in 0..1_000u32 {
                pairing.request_pairing(&format!("a{i}")).expect("join");
                pairing.request_pairing(&format!("b{i}")).expect("join");
                pairing.dissolve_current(&format!("a{i}")).expect("dissolve");
            }
        });
    });
}

fn bench_voting(c: &mut Criterion) {
    let mut group = c.benchmark_group("vote_with_recompute");

    for candidates in [2usize, 16, 128] {
        let coord = coordinator();
        let events = coord.events();
        let id = events
            .create_event("host", "club", "Bench", "2025-01-01T00:00:00Z", "L0")
            .expect("create")
            .id();
        for n in 1..candidates {
            events
                .add_candidate_location(id, &format!("L{n}"))
                .expect("candidate");
        }
        for v in 0..64 {
            events.add_attendee(id, &format!("v{v}")).expect("attend");
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(candidates),
            &candidates,
            |b, &candidates| {
                let mut n = 0usize;
                b.iter(|| {
                    n += 1;
                    let option = format!("L{}", n % candidates);
                    let voter = format!("v{}", n % 64);
                    events
                        .cast_vote(id, Category::Location, &option, &voter)
                        .expect("vote")
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_pairing, bench_dissolve_churn, bench_voting);
criterion_main!(benches);
