//! # Correlation Benchmarks
//!
//! Hot paths of a provisioning exchange:
//!
//! | Path | What is measured |
//! |------|------------------|
//! | Correlation store | begin, resolve, discard of one call |
//! | Duplicate delivery | resolving an already resolved call |
//! | Topic filters | matching reply topics against subscription filters |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fp_provisioning::{topics_for, CorrelationStore, Operation};
use serde_json::json;
use shared_bus::TopicFilter;
use std::time::Duration;

fn bench_call_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-store");
    group.measurement_time(Duration::from_secs(5));

    let store = CorrelationStore::new();
    let payload = json!({"certificateId": "abc123", "certificateOwnershipToken": "token"});

    group.bench_function("begin_resolve_discard", |b| {
        b.iter(|| {
            let handle = store.begin_call(Operation::IssueCredentials);
            black_box(store.resolve_success(Operation::IssueCredentials, payload.clone()));
            store.discard(&handle)
        })
    });

    let handle = store.begin_call(Operation::RegisterDevice);
    store.resolve_failure(Operation::RegisterDevice, json!({"errorCode": "Throttled"}));
    group.bench_function("duplicate_resolution", |b| {
        b.iter(|| black_box(store.resolve_success(Operation::RegisterDevice, payload.clone())))
    });
    store.discard(&handle);

    group.bench_function("unsolicited_resolution", |b| {
        b.iter(|| black_box(store.resolve_success(Operation::RegisterDevice, payload.clone())))
    });

    group.finish();
}

fn bench_topic_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic-filters");

    let templates = [1usize, 10, 100];
    for count in templates {
        let filters: Vec<TopicFilter> = (0..count)
            .filter_map(|i| topics_for(Operation::RegisterDevice, &format!("Line{i}")).ok())
            .filter_map(|topics| TopicFilter::new(topics.accepted).ok())
            .collect();
        let reply = format!(
            "$aws/provisioning-templates/Line{}/provision/json/accepted",
            count - 1
        );

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("exact_filters", count), &reply, |b, topic| {
            b.iter(|| filters.iter().filter(|f| f.matches(black_box(topic))).count())
        });
    }

    let wildcard = TopicFilter::new("$aws/provisioning-templates/+/provision/json/+").ok();
    group.bench_function("wildcard_filter", |b| {
        b.iter(|| {
            wildcard.as_ref().map(|f| {
                f.matches(black_box(
                    "$aws/provisioning-templates/FactoryLine1/provision/json/rejected",
                ))
            })
        })
    });

    group.finish();
}

criterion_group!(benches, bench_call_lifecycle, bench_topic_matching);
criterion_main!(benches);
