use super::*;

fn chunk(content: &str, chunk_index: usize) -> Chunk {
    Chunk {
        content: content.to_string(),
        source: "notes.pdf".to_string(),
        page: 1,
        chunk_index,
    }
}

#[tokio::test]
async fn empty_index_returns_no_hits() {
    let index = MemoryIndex::new(3);

    let hits = index.search(&[1.0, 0.0, 0.0], 4).await.expect("search");

    assert!(hits.is_empty());
    assert_eq!(index.count().await.expect("count"), 0);
}

#[tokio::test]
async fn own_vector_ranks_first() {
    let index = MemoryIndex::new(3);
    index
        .insert_many(&[
            (chunk("x", 0), vec![1.0, 0.0, 0.0]),
            (chunk("y", 1), vec![0.0, 1.0, 0.0]),
            (chunk("xy", 2), vec![0.7, 0.7, 0.0]),
        ])
        .await
        .expect("insert");

    let hits = index.search(&[0.0, 1.0, 0.0], 2).await.expect("search");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.content, "y");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert_eq!(hits[1].chunk.content, "xy");
}

#[tokio::test]
async fn ties_keep_insertion_order() {
    let index = MemoryIndex::new(2);
    index
        .insert_many(&[
            (chunk("first", 0), vec![1.0, 1.0]),
            (chunk("second", 1), vec![1.0, 1.0]),
        ])
        .await
        .expect("insert");
    index
        .insert_many(&[(chunk("third", 2), vec![1.0, 1.0])])
        .await
        .expect("insert");

    let hits = index.search(&[1.0, 1.0], 10).await.expect("search");
    let order: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();

    assert_eq!(order, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn duplicates_are_kept() {
    let index = MemoryIndex::new(2);
    let entries = vec![(chunk("same", 0), vec![1.0, 0.0])];

    index.insert_many(&entries).await.expect("insert");
    index.insert_many(&entries).await.expect("insert");

    assert_eq!(index.count().await.expect("count"), 2);
}

#[tokio::test]
async fn wrong_dimension_is_rejected() {
    let index = MemoryIndex::new(3);

    let insert = index.insert_many(&[(chunk("bad", 0), vec![1.0, 0.0])]).await;
    let search = index.search(&[1.0], 1).await;

    assert!(matches!(
        insert,
        Err(SynapseError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
    assert!(matches!(
        search,
        Err(SynapseError::DimensionMismatch { .. })
    ));
    assert_eq!(index.count().await.expect("count"), 0);
}
