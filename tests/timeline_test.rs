//! Merge correctness and determinism for the multi-repository timeline.

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retrospect::classify::CommitKind;
use retrospect::timeline::{CommitRecord, merge_timelines};
use std::cmp::Ordering;

fn record(repo: &str, hash: &str, ts: i64) -> CommitRecord {
    CommitRecord {
        repo: repo.to_string(),
        hash: hash.to_string(),
        author: "Test User".to_string(),
        email: "test@example.com".to_string(),
        timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
        message: format!("feat: {hash}"),
        kind: CommitKind::Feat,
        noise: false,
    }
}

/// The full ordering key: timestamp desc, registration order asc, hash asc.
fn key_cmp(a: &(usize, CommitRecord), b: &(usize, CommitRecord)) -> Ordering {
    b.1.timestamp
        .cmp(&a.1.timestamp)
        .then_with(|| a.0.cmp(&b.0))
        .then_with(|| a.1.hash.cmp(&b.1.hash))
}

#[test]
fn merge_is_deterministic_across_runs() {
    let a = vec![
        record("a", "a1", 50),
        record("a", "a2", 40),
        record("a", "a3", 40),
    ];
    let b = vec![record("b", "b1", 40), record("b", "b2", 10)];
    let c = vec![record("c", "c1", 60)];

    let first: Vec<String> = merge_timelines(vec![a.clone(), b.clone(), c.clone()])
        .into_iter()
        .map(|r| r.hash)
        .collect();

    for _ in 0..10 {
        let again: Vec<String> = merge_timelines(vec![a.clone(), b.clone(), c.clone()])
            .into_iter()
            .map(|r| r.hash)
            .collect();
        assert_eq!(first, again);
    }
}

#[test]
fn collisions_resolve_by_registration_order_then_hash() {
    // Three repos, all with a commit at t=40.
    let a = vec![record("a", "ffff", 40)];
    let b = vec![record("b", "0000", 40)];
    let c = vec![record("c", "8888", 40)];

    let merged: Vec<String> = merge_timelines(vec![a, b, c])
        .into_iter()
        .map(|r| r.hash)
        .collect();

    // Registration order decides, not hash or arrival order.
    assert_eq!(merged, ["ffff", "0000", "8888"]);
}

#[test]
fn merge_matches_sorting_the_concatenation_on_random_inputs() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for _ in 0..200 {
        let repo_count = rng.gen_range(1..=5);
        let mut sequences: Vec<Vec<CommitRecord>> = Vec::with_capacity(repo_count);

        for seq in 0..repo_count {
            let len = rng.gen_range(0..=30);
            let mut commits: Vec<CommitRecord> = (0..len)
                .map(|_| {
                    // A tiny timestamp domain forces cross-repo collisions.
                    let ts = rng.gen_range(0..20);
                    let hash = format!("{:08x}", rng.r#gen::<u32>());
                    record(&format!("repo{seq}"), &hash, ts)
                })
                .collect();
            // Each input arrives internally sorted, as the pipeline
            // guarantees.
            commits.sort_by(|a, b| {
                b.timestamp
                    .cmp(&a.timestamp)
                    .then_with(|| a.hash.cmp(&b.hash))
            });
            sequences.push(commits);
        }

        let mut expected: Vec<(usize, CommitRecord)> = sequences
            .iter()
            .enumerate()
            .flat_map(|(order, seq)| seq.iter().cloned().map(move |c| (order, c)))
            .collect();
        expected.sort_by(key_cmp);
        let expected: Vec<String> = expected.into_iter().map(|(_, c)| c.hash).collect();

        let merged: Vec<String> = merge_timelines(sequences)
            .into_iter()
            .map(|c| c.hash)
            .collect();

        assert_eq!(merged, expected);
    }
}

#[test]
fn merged_entries_keep_their_repository_labels() {
    let a = vec![record("backend", "a1", 30)];
    let b = vec![record("frontend", "b1", 20)];

    let merged = merge_timelines(vec![a, b]);

    assert_eq!(merged[0].repo, "backend");
    assert_eq!(merged[1].repo, "frontend");
}
