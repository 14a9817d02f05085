//! Integration tests for index mutations, seeks and scans.
//!
//! Every test ends with `verify()` so structural damage is caught where it
//! happens rather than on a later lookup.

use std::sync::Arc;

use pagetree::{
    CountMeasure, Direction, Error, Index, IndexBuilder, MaxMeasure, MemoryPageProvider, MinMeasure,
    PageProvider, Ray, SeekResultType, SumMeasure,
};

type Item = (u32, i64);

fn key_of(item: &Item) -> u32 {
    item.0
}

fn create_index(page_size: usize) -> Index<u32, Item> {
    IndexBuilder::new(key_of)
        .page_size(page_size)
        .measure(CountMeasure)
        .measure(SumMeasure::new("sum", |item: &Item| item.1))
        .measure(MinMeasure::new("min", |item: &Item| item.1))
        .measure(MaxMeasure::new("max", |item: &Item| item.1))
        .build()
        .unwrap()
}

fn keys(index: &Index<u32, Item>, ray: &Ray<u32>) -> Vec<u32> {
    index
        .iter_from(ray)
        .unwrap()
        .map(|entry| entry.unwrap().0)
        .collect()
}

/// Ten ascending inserts into 4-slot pages split the root leaf.
#[test]
fn test_ascending_inserts_grow_a_level() {
    let mut index = create_index(4);
    for k in 1..=10 {
        index.add((k, k as i64 * 10)).unwrap();
    }

    assert_eq!(index.len(), 10);
    assert_eq!(index.height().unwrap(), 2);
    assert_eq!(index.get_item(&7).unwrap(), (7, 70));
    assert!(!index.contains_key(&11).unwrap());
    assert!(matches!(index.get_item(&11), Err(Error::KeyNotFound)));
    index.verify().unwrap();
}

/// Removing the middle of the tree merges leaves back together.
#[test]
fn test_removals_merge_pages() {
    let mut index = create_index(4);
    for k in 1..=10 {
        index.add((k, k as i64)).unwrap();
    }
    let height_before = index.height().unwrap();

    for k in [2, 3, 4, 5, 6] {
        assert_eq!(index.remove(&k).unwrap(), Some((k, k as i64)));
        index.verify().unwrap();
    }

    assert!(index.height().unwrap() <= height_before);
    assert!(index.contains_key(&1).unwrap());
    for k in 7..=10 {
        assert!(index.contains_key(&k).unwrap());
    }
    for k in 2..=6 {
        assert!(!index.contains_key(&k).unwrap());
    }
    assert_eq!(index.len(), 5);
    assert_eq!(index.measure("count").unwrap(), Some(5));
    assert_eq!(index.measure("sum").unwrap(), Some(1 + 7 + 8 + 9 + 10));
    assert_eq!(index.measure("min").unwrap(), Some(1));
}

#[test]
fn test_remove_everything_collapses_to_single_leaf() {
    let mut index = create_index(4);
    for k in 0..100 {
        index.add((k, 1)).unwrap();
    }
    for k in (0..100).rev() {
        index.remove(&k).unwrap();
    }

    assert!(index.is_empty());
    assert_eq!(index.height().unwrap(), 1);
    assert_eq!(index.root_ref(), index.rightmost_ref());
    assert_eq!(index.measure("count").unwrap(), Some(0));
    assert_eq!(index.measure("sum").unwrap(), Some(0));
    index.verify().unwrap();
}

#[test]
fn test_remove_missing_key_is_noop() {
    let mut index = create_index(4);
    for k in 0..20 {
        index.add((k * 2, 1)).unwrap();
    }

    assert_eq!(index.remove(&7).unwrap(), None);
    assert_eq!(index.len(), 20);
    assert_eq!(index.measure("count").unwrap(), Some(20));
    index.verify().unwrap();
}

/// Replacing an item shifts the root sum by exactly the value difference.
#[test]
fn test_replace_updates_sum_by_delta() {
    let mut index = create_index(4);
    for k in 0..50 {
        index.add((k, k as i64)).unwrap();
    }
    let before = index.measure("sum").unwrap().unwrap();

    let old = index.replace((17, 1000)).unwrap();

    assert_eq!(old, (17, 17));
    assert_eq!(index.measure("sum").unwrap().unwrap(), before + 1000 - 17);
    assert_eq!(index.measure("max").unwrap(), Some(1000));
    assert_eq!(index.get_item(&17).unwrap(), (17, 1000));
    assert_eq!(index.len(), 50);
    index.verify().unwrap();
}

#[test]
fn test_replace_extreme_recomputes_min() {
    let mut index = create_index(4);
    for k in 0..30 {
        index.add((k, 100 + k as i64)).unwrap();
    }

    index.replace((0, 500)).unwrap();

    assert_eq!(index.measure("min").unwrap(), Some(101));
    index.verify().unwrap();
}

#[test]
fn test_replace_missing_key_fails() {
    let mut index = create_index(4);
    index.add((1, 1)).unwrap();

    assert!(matches!(index.replace((2, 2)), Err(Error::KeyNotFound)));
    assert_eq!(index.measure("sum").unwrap(), Some(1));
}

/// A duplicate add fails and leaves size and measures untouched.
#[test]
fn test_duplicate_add_leaves_index_unchanged() {
    let mut index = create_index(4);
    for k in 0..25 {
        index.add((k, 3)).unwrap();
    }
    let measures = index.measures().unwrap();

    let result = index.add((12, 99));

    assert!(matches!(result, Err(Error::DuplicateKey)));
    assert_eq!(index.len(), 25);
    assert_eq!(index.measures().unwrap(), measures);
    assert_eq!(index.get_item(&12).unwrap(), (12, 3));
    index.verify().unwrap();
}

#[test]
fn test_seek_result_types() {
    let mut index = create_index(4);
    for k in (1..=39).step_by(2) {
        index.add((k, 0)).unwrap();
    }

    assert_eq!(index.seek(&5).unwrap().result_type, SeekResultType::Exact);
    assert_eq!(index.seek(&6).unwrap().result_type, SeekResultType::Nearest);
    assert_eq!(index.seek(&0).unwrap().result_type, SeekResultType::Nearest);
    assert_eq!(index.seek(&40).unwrap().result_type, SeekResultType::Default);

    let back = index.seek_ray(&Ray::new(0, Direction::Negative)).unwrap();
    assert_eq!(back.result_type, SeekResultType::Default);
    let back = index.seek_ray(&Ray::new(40, Direction::Negative)).unwrap();
    assert_eq!(back.result_type, SeekResultType::Nearest);
}

#[test]
fn test_seek_on_empty_index() {
    let index = create_index(4);

    assert_eq!(index.seek(&1).unwrap().result_type, SeekResultType::Default);
    assert_eq!(index.iter().unwrap().count(), 0);
    assert_eq!(index.iter_rev().unwrap().count(), 0);
}

#[test]
fn test_range_scans_cross_leaves() {
    let mut index = create_index(4);
    for k in (1..=39).step_by(2) {
        index.add((k, 0)).unwrap();
    }
    let odd: Vec<u32> = (1..=39).step_by(2).collect();

    assert_eq!(keys(&index, &Ray::first()), odd);
    assert_eq!(keys(&index, &Ray::last()), odd.iter().rev().copied().collect::<Vec<_>>());

    // Starting between keys lands on the next key in scan direction
    assert_eq!(keys(&index, &Ray::new(10, Direction::Positive)), (11..=39).step_by(2).collect::<Vec<_>>());
    assert_eq!(keys(&index, &Ray::new(10, Direction::Negative)), vec![9, 7, 5, 3, 1]);

    // Starting on a key includes it
    assert_eq!(keys(&index, &Ray::new(35, Direction::Positive)), vec![35, 37, 39]);
    assert_eq!(keys(&index, &Ray::new(3, Direction::Negative)), vec![3, 1]);

    // Starting past either end
    assert!(keys(&index, &Ray::new(40, Direction::Positive)).is_empty());
    assert!(keys(&index, &Ray::new(0, Direction::Negative)).is_empty());
    assert_eq!(keys(&index, &Ray::new(100, Direction::Negative)).len(), 20);
}

#[test]
fn test_random_order_inserts_stay_sorted() {
    let mut index = create_index(5);
    for i in 0..500u32 {
        index.add(((i * 7919) % 500, i as i64)).unwrap();
    }

    let scanned = keys(&index, &Ray::first());
    assert_eq!(scanned, (0..500).collect::<Vec<_>>());
    assert_eq!(index.measure("count").unwrap(), Some(500));
    assert_eq!(index.measure("sum").unwrap(), Some((0..500).sum()));
    index.verify().unwrap();
}

#[test]
fn test_clear_resets_index() {
    let mut index = create_index(4);
    for k in 0..40 {
        index.add((k, 1)).unwrap();
    }

    index.clear().unwrap();

    assert!(index.is_empty());
    assert_eq!(index.height().unwrap(), 1);
    assert_eq!(index.measure("count").unwrap(), Some(0));
    index.verify().unwrap();

    index.add((5, 5)).unwrap();
    assert_eq!(index.get(&5).unwrap(), Some((5, 5)));
}

#[test]
fn test_unknown_measure_name() {
    let index = create_index(4);
    assert_eq!(index.measure("avg").unwrap(), None);
    assert_eq!(index.measure_names().collect::<Vec<_>>(), vec!["count", "sum", "min", "max"]);
}

/// A root that cannot be read is an error, not a missing measure.
#[test]
fn test_measure_reports_provider_errors() {
    let provider: Arc<dyn PageProvider<u32, Item>> = Arc::new(MemoryPageProvider::<u32, Item>::new());
    let mut index = IndexBuilder::new(key_of)
        .measure(CountMeasure)
        .create(Arc::clone(&provider))
        .unwrap();
    index.add((1, 1)).unwrap();
    assert_eq!(index.measure("count").unwrap(), Some(1));

    provider.dispose().unwrap();

    assert!(matches!(index.measure("count"), Err(Error::Disposed)));
    assert!(matches!(index.measure("avg"), Ok(None)));
}
