// Criterion benchmarks for Sphynx scoring and ranking

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sphynx::core::{build_query, rank_candidates, score_candidate, score_record};
use sphynx::models::{CandidateRecord, LanguageUsage, ScoringWeights};

const REQUIREMENT: &str = "senior python developer with machine learning and data pipeline experience";

fn create_candidate(id: usize) -> CandidateRecord {
    CandidateRecord {
        login: format!("user{}", id),
        display_name: format!("User {}", id),
        bio: Some(match id % 3 {
            0 => "Python developer building machine learning pipelines".to_string(),
            1 => "Backend engineer, Go and Rust, distributed systems".to_string(),
            _ => "Data engineer. Spark, Airflow, Python".to_string(),
        }),
        location: if id % 2 == 0 { Some("Berlin".to_string()) } else { None },
        public_repo_count: (id % 80) as u32,
        follower_count: (id * 37 % 3000) as u32,
        languages: ["Python", "Rust", "Go", "TypeScript"]
            .iter()
            .take(1 + id % 4)
            .map(|name| LanguageUsage {
                name: name.to_string(),
                weight: 1000,
            })
            .collect(),
        profile_url: format!("https://github.com/user{}", id),
        contribution_count: (id * 113 % 2500) as u64,
        pinned_items: (0..id % 7).map(|i| format!("repo-{}", i)).collect(),
        contribution_streak: "N/A".to_string(),
        score: 0.0,
        explanation: vec![],
    }
}

fn bench_score_candidate(c: &mut Criterion) {
    let weights = ScoringWeights::default();
    let candidate = create_candidate(3);

    c.bench_function("score_candidate", |b| {
        b.iter(|| score_candidate(black_box(&candidate), black_box(REQUIREMENT), black_box(&weights)));
    });
}

fn bench_build_query(c: &mut Criterion) {
    c.bench_function("build_query", |b| {
        b.iter(|| build_query(black_box(REQUIREMENT), black_box(Some("San Francisco")), black_box(Some("python"))));
    });
}

fn bench_score_and_rank(c: &mut Criterion) {
    let weights = ScoringWeights::default();

    let mut group = c.benchmark_group("score_and_rank");

    for candidate_count in [10, 50, 100, 500].iter() {
        let candidates: Vec<CandidateRecord> = (0..*candidate_count).map(create_candidate).collect();

        group.bench_with_input(
            BenchmarkId::new("score_and_rank", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    let scored: Vec<_> = candidates
                        .iter()
                        .cloned()
                        .map(|record| score_record(record, black_box(REQUIREMENT), &weights))
                        .collect();
                    black_box(rank_candidates(scored))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_score_candidate, bench_build_query, bench_score_and_rank);

criterion_main!(benches);
