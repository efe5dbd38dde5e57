use super::*;
use crate::ValidationError;
use serde_json::json;
use tempfile::TempDir;

fn labelled(label: &str) -> VectorMetadata {
    VectorMetadata::Freeform(
        json!({ "text": label, "source": "test" })
            .as_object()
            .cloned()
            .expect("object"),
    )
}

async fn open_temp(dimension: usize) -> (TempDir, VectorIndex) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = VectorIndex::open(temp_dir.path().join("vector_index"), dimension)
        .await
        .expect("index opens");
    (temp_dir, index)
}

fn ids(hits: &[SearchHit]) -> Vec<u64> {
    hits.iter().map(|h| h.id).collect()
}

fn scores(hits: &[SearchHit]) -> Vec<f32> {
    hits.iter().map(|h| h.score).collect()
}

#[tokio::test]
async fn nearest_neighbours_in_distance_order() {
    let (_dir, index) = open_temp(2).await;
    let added = index
        .add(
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]],
            vec![labelled("origin"), labelled("unit"), labelled("far")],
        )
        .await
        .expect("add succeeds");
    assert_eq!(added, vec![0, 1, 2]);

    let results = index
        .search(&[vec![0.0, 0.0]], 2)
        .await
        .expect("search succeeds");
    assert_eq!(results.len(), 1);
    assert_eq!(ids(&results[0]), vec![0, 1]);
    assert_eq!(scores(&results[0]), vec![0.0, 1.0]);
    assert_eq!(results[0][0].metadata.display_text(), "origin");
}

#[tokio::test]
async fn inserted_vector_is_its_own_nearest_neighbour() {
    let (_dir, index) = open_temp(3).await;
    let vectors = vec![vec![0.3, -1.2, 4.0], vec![2.0, 2.0, 2.0], vec![-7.5, 0.0, 1.0]];
    let metadatas = (0..3).map(|i| labelled(&i.to_string())).collect();
    let added = index.add(vectors.clone(), metadatas).await.expect("add");

    let results = index.search(&vectors, 1).await.expect("search");
    for (id, hits) in added.iter().zip(&results) {
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, *id);
        assert_eq!(hits[0].score, 0.0);
    }
}

#[tokio::test]
async fn ties_are_broken_by_lower_id() {
    let (_dir, index) = open_temp(1).await;
    index
        .add(
            vec![vec![2.0], vec![-1.0], vec![1.0], vec![-2.0]],
            (0..4).map(|i| labelled(&i.to_string())).collect(),
        )
        .await
        .expect("add");

    let results = index.search(&[vec![0.0]], 4).await.expect("search");
    assert_eq!(ids(&results[0]), vec![1, 2, 0, 3]);
    assert_eq!(scores(&results[0]), vec![1.0, 1.0, 4.0, 4.0]);
}

#[tokio::test]
async fn empty_index_and_zero_k_give_empty_lists() {
    let (_dir, index) = open_temp(2).await;
    assert!(index.is_empty().await);

    let results = index
        .search(&[vec![1.0, 1.0], vec![0.0, 0.0]], 5)
        .await
        .expect("search");
    assert_eq!(results, vec![Vec::new(), Vec::new()]);

    index
        .add(vec![vec![1.0, 1.0]], vec![labelled("only")])
        .await
        .expect("add");
    let results = index.search(&[vec![1.0, 1.0]], 0).await.expect("search");
    assert_eq!(results, vec![Vec::new()]);
}

#[tokio::test]
async fn k_larger_than_index_returns_everything() {
    let (_dir, index) = open_temp(2).await;
    index
        .add(
            vec![vec![3.0, 0.0], vec![1.0, 0.0]],
            vec![labelled("a"), labelled("b")],
        )
        .await
        .expect("add");

    let results = index.search(&[vec![0.0, 0.0]], 50).await.expect("search");
    assert_eq!(ids(&results[0]), vec![1, 0]);
}

#[tokio::test]
async fn successive_adds_get_contiguous_ids() {
    let (_dir, index) = open_temp(2).await;
    let first = index
        .add(
            vec![vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![labelled("a"), labelled("b")],
        )
        .await
        .expect("add");
    let second = index
        .add(
            vec![vec![2.0, 1.0], vec![3.0, 1.0], vec![4.0, 1.0]],
            vec![labelled("c"), labelled("d"), labelled("e")],
        )
        .await
        .expect("add");

    assert_eq!(first, vec![0, 1]);
    assert_eq!(second, vec![2, 3, 4]);
    assert_eq!(index.len().await, 5);
    assert_eq!(
        index.entries().await.keys().copied().collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
}

#[tokio::test]
async fn reopen_reproduces_search_results() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = temp_dir.path().join("vector_index");
    let queries = vec![vec![0.1, 0.2, 0.3], vec![-4.0, 2.5, 9.0]];

    let before = {
        let index = VectorIndex::open(&dir, 3).await.expect("opens");
        index
            .add(
                vec![
                    vec![0.5, 0.25, 0.125],
                    vec![-3.0, 2.0, 8.5],
                    vec![1.0 / 3.0, 2.0 / 3.0, 1.0],
                    vec![10.0, -10.0, 0.0],
                ],
                (0..4).map(|i| labelled(&format!("v{i}"))).collect(),
            )
            .await
            .expect("add");
        index.search(&queries, 3).await.expect("search")
    };

    let reopened = VectorIndex::open(&dir, 3).await.expect("reopens");
    assert_eq!(reopened.len().await, 4);
    let after = reopened.search(&queries, 3).await.expect("search");
    assert_eq!(before, after);
}

#[tokio::test]
async fn mismatched_batches_are_rejected_without_writing() {
    let (_dir, index) = open_temp(2).await;

    let err = index
        .add(vec![vec![1.0, 2.0]], vec![])
        .await
        .expect_err("count mismatch");
    assert!(matches!(
        err,
        BrainError::Validation(ValidationError::DimensionMismatch(
            DimensionMismatch::Count {
                vectors: 1,
                metadatas: 0
            }
        ))
    ));

    let err = index
        .add(
            vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]],
            vec![labelled("a"), labelled("b")],
        )
        .await
        .expect_err("dimension mismatch");
    assert!(matches!(
        err,
        BrainError::Validation(ValidationError::DimensionMismatch(
            DimensionMismatch::Vector {
                position: 1,
                expected: 2,
                actual: 3
            }
        ))
    ));

    assert!(index.is_empty().await);
}

#[tokio::test]
async fn wrong_query_dimension_is_rejected() {
    let (_dir, index) = open_temp(2).await;
    let err = index
        .search(&[vec![1.0, 2.0, 3.0]], 1)
        .await
        .expect_err("query dimension differs");
    assert!(matches!(err, BrainError::Validation(_)));
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = temp_dir.path().join("vector_index");
    VectorIndex::open(&dir, 4).await.expect("opens");

    let err = VectorIndex::open(&dir, 8)
        .await
        .expect_err("dimension differs");
    assert!(matches!(err, BrainError::Persistence(_)));
}

#[tokio::test]
async fn zero_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    assert!(VectorIndex::open(temp_dir.path(), 0).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn failed_persist_rolls_back_memory() {
    use std::os::unix::fs::PermissionsExt;

    let (temp_dir, index) = open_temp(1).await;
    index
        .add(vec![vec![1.0]], vec![labelled("kept")])
        .await
        .expect("add");

    let dir = temp_dir.path().join("vector_index");
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o500))
        .expect("make read-only");
    let result = index.add(vec![vec![2.0]], vec![labelled("lost")]).await;
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
        .expect("restore permissions");

    // root ignores directory permissions, in which case the write succeeds
    if result.is_err() {
        assert!(matches!(result, Err(BrainError::Persistence(_))));
        assert_eq!(index.len().await, 1);
        assert_eq!(index.metadata(1).await, None);

        let reopened = VectorIndex::open(&dir, 1).await.expect("reopens");
        assert_eq!(reopened.len().await, 1);
    }
}

#[tokio::test]
async fn clones_share_state() {
    let (_dir, index) = open_temp(1).await;
    let other = index.clone();
    other
        .add(vec![vec![4.0]], vec![labelled("shared")])
        .await
        .expect("add");

    assert_eq!(index.len().await, 1);
    assert_eq!(
        index.metadata(0).await.map(|m| m.display_text().to_string()),
        Some("shared".to_string())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn searches_run_alongside_writers() {
    let (_dir, index) = open_temp(1).await;
    index
        .add(vec![vec![0.0]], vec![labelled("seed")])
        .await
        .expect("seed add");

    let writers: Vec<_> = (1..=4)
        .map(|n| {
            let index = index.clone();
            tokio::spawn(async move {
                for step in 0..5 {
                    index
                        .add(vec![vec![(n * 10 + step) as f32]], vec![labelled("w")])
                        .await
                        .expect("add succeeds");
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..16)
        .map(|_| {
            let index = index.clone();
            tokio::spawn(async move {
                let hits = index.search(&[vec![0.0]], 50).await.expect("search");
                hits.into_iter().next().unwrap_or_default()
            })
        })
        .collect();

    for writer in writers {
        writer.await.expect("writer joins");
    }
    for reader in readers {
        let hits = reader.await.expect("reader joins");
        assert!(!hits.is_empty());
        assert_eq!(hits[0].id, 0);
        assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
        assert!(hits.iter().all(|h| h.id < 21));
    }

    assert_eq!(index.len().await, 21);
    let all = index.search(&[vec![0.0]], 50).await.expect("search");
    assert_eq!(all[0].len(), 21);
}
