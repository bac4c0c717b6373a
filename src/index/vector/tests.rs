use super::*;

fn index_with(rows: &[[f32; 2]]) -> FlatIndex {
    let mut index = FlatIndex::new();
    for row in rows {
        index.add(row).expect("rows share a dimension");
    }
    index
}

#[test]
fn empty_index() {
    let index = FlatIndex::new();

    assert_eq!(index.dimension(), None);
    assert_eq!(index.len(), 0);
    assert!(index.is_empty());
    assert!(
        index
            .search(&[1.0, 2.0, 3.0], 5)
            .expect("empty search is not an error")
            .is_empty()
    );
}

#[test]
fn first_add_fixes_dimension() {
    let mut index = FlatIndex::new();

    assert_eq!(index.add(&[1.0, 2.0, 3.0]).expect("first add"), 0);
    assert_eq!(index.add(&[4.0, 5.0, 6.0]).expect("second add"), 1);
    assert_eq!(index.dimension(), Some(3));
    assert_eq!(index.len(), 2);
    assert_eq!(index.row(1), Some(&[4.0, 5.0, 6.0][..]));
    assert_eq!(index.row(2), None);
}

#[test]
fn mismatched_dimension_is_rejected() {
    let mut index = index_with(&[[0.0, 0.0]]);

    let err = index.add(&[1.0, 2.0, 3.0]).expect_err("longer vector");
    assert!(matches!(
        err,
        MemoryError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
    assert!(index.add(&[1.0]).is_err());
    assert_eq!(index.len(), 1, "rejected adds leave the index untouched");

    assert!(matches!(
        index.search(&[1.0], 1),
        Err(MemoryError::DimensionMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn zero_dimensional_vector_is_rejected() {
    let mut index = FlatIndex::new();
    assert!(matches!(index.add(&[]), Err(MemoryError::InvalidVector(_))));
    assert_eq!(index.dimension(), None);
}

#[test]
fn search_orders_by_ascending_distance() {
    let index = index_with(&[[10.0, 0.0], [1.0, 0.0], [0.0, 3.0], [0.0, 0.5]]);

    let results = index.search(&[0.0, 0.0], 10).expect("search");

    let rows: Vec<usize> = results.iter().map(|n| n.row).collect();
    assert_eq!(rows, vec![3, 1, 2, 0]);
    let distances: Vec<f32> = results.iter().map(|n| n.distance).collect();
    assert_eq!(distances, vec![0.25, 1.0, 9.0, 100.0]);
}

#[test]
fn k_is_clamped_and_truncates() {
    let index = index_with(&[[3.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);

    let top_two = index.search(&[0.0, 0.0], 2).expect("search");
    assert_eq!(top_two.iter().map(|n| n.row).collect::<Vec<_>>(), vec![1, 2]);

    assert_eq!(index.search(&[0.0, 0.0], 100).expect("search").len(), 3);
    assert!(index.search(&[0.0, 0.0], 0).expect("search").is_empty());
}

#[test]
fn ties_break_by_row() {
    let index = index_with(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]]);

    let results = index.search(&[0.0, 0.0], 3).expect("search");
    assert_eq!(
        results.iter().map(|n| n.row).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn snapshot_round_trip() {
    let index = index_with(&[[0.5, -1.5], [2.0, 4.0]]);

    let mut buffer = Vec::new();
    index.write_to(&mut buffer).expect("encode");
    let restored = FlatIndex::read_from(buffer.as_slice()).expect("decode");

    assert_eq!(restored, index);
    assert_eq!(
        restored.search(&[0.0, 0.0], 2).expect("search"),
        index.search(&[0.0, 0.0], 2).expect("search")
    );

    let mut buffer = Vec::new();
    FlatIndex::new().write_to(&mut buffer).expect("encode");
    assert_eq!(
        FlatIndex::read_from(buffer.as_slice()).expect("decode"),
        FlatIndex::new()
    );
}

#[test]
fn corrupt_snapshots_are_rejected() {
    assert!(FlatIndex::read_from(&b"garbage"[..]).is_err());

    let mut truncated = Vec::new();
    index_with(&[[1.0, 2.0]])
        .write_to(&mut truncated)
        .expect("encode");
    truncated.truncate(truncated.len() - 2);
    assert!(FlatIndex::read_from(truncated.as_slice()).is_err());

    let ragged = bincode::serialize(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        dimension: Some(2),
        data: &[1.0, 2.0, 3.0],
    })
    .expect("encode");
    assert!(FlatIndex::read_from(ragged.as_slice()).is_err());

    let future = bincode::serialize(&SnapshotRef {
        version: SNAPSHOT_VERSION + 1,
        dimension: None,
        data: &[],
    })
    .expect("encode");
    assert!(FlatIndex::read_from(future.as_slice()).is_err());
}
